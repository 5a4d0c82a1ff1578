use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Datelike;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use kestrechner::berechnung::Rechner;
use kestrechner::konfig::Einstellungen;
use kestrechner::schreiber::Schreiber;
use kestrechner::tabellen::{self, Tabelle};
use kestrechner::zusammenfassung::zusammenfassen;
use kestrechner::{tsv, Datum};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// CSV Dateien, Verzeichnisse oder Muster wie `wise/wise*`
    eingaben: Vec<String>,

    /// Für welches Jahr die Berechnung erfolgen soll, standardmäßig das Vorjahr
    #[arg(short, long)]
    jahr: Option<i32>,

    /// Beginn des Berichtszeitraums, statt dem 1. Jänner
    #[arg(long)]
    von: Option<Datum>,

    /// Ende des Berichtszeitraums, statt dem 31. Dezember
    #[arg(long)]
    bis: Option<Datum>,

    /// Einstellungen als YAML
    #[arg(short, long)]
    konfig: Option<PathBuf>,

    /// Datei, in der die Wechselkurse zwischengespeichert werden
    #[arg(long)]
    kurs_cache: Option<PathBuf>,

    /// Wechselkurse neu abrufen, auch wenn die Datei existiert
    #[arg(long)]
    neu_laden: bool,

    /// Wie viele Tage ein Kurs vor der Buchung liegen darf
    #[arg(long)]
    toleranz: Option<u64>,

    /// Eingaben sind XML, jedes Element mit diesem Namen ist eine Zeile
    #[arg(long)]
    xml_element: Option<String>,

    /// Verzeichnis für die CSV Ausgabe
    #[arg(short, long)]
    ausgabe: Option<PathBuf>,

    /// TSV Ausgabe aktivieren
    #[arg(short, long)]
    tsv: bool,

    /// Zusammenfassung als JSON ausgeben
    #[arg(long)]
    json: bool,
}

impl Args {
    fn einstellungen(&self) -> Result<Einstellungen> {
        let mut einstellungen = match &self.konfig {
            Some(pfad) => Einstellungen::laden(pfad)?,
            None => Einstellungen::default(),
        };
        if let Some(kurs_cache) = &self.kurs_cache {
            einstellungen.kurs_cache = kurs_cache.clone();
        }
        einstellungen.neu_laden |= self.neu_laden;
        if let Some(toleranz) = self.toleranz {
            einstellungen.toleranz_tage = toleranz;
        }
        if let Some(ausgabe) = &self.ausgabe {
            einstellungen.ausgabe = Some(ausgabe.clone());
        }
        Ok(einstellungen)
    }

    fn zeitraum(&self, heute: Datum) -> Result<(Datum, Datum)> {
        let jahr = self.jahr.unwrap_or(heute.year() - 1);
        let von = match self.von {
            Some(von) => von,
            None => Datum::from_ymd_opt(jahr, 1, 1).context("Ungültiges Jahr")?,
        };
        let bis = match self.bis {
            Some(bis) => bis,
            None => Datum::from_ymd_opt(jahr, 12, 31).context("Ungültiges Jahr")?,
        };
        anyhow::ensure!(von <= bis, "Zeitraum von {von} bis {bis} ist leer");
        Ok((von, bis))
    }

    fn tabelle(&self) -> Result<Tabelle> {
        anyhow::ensure!(!self.eingaben.is_empty(), "Keine Eingaben angegeben");

        let mut tabelle = Tabelle::default();
        for muster in &self.eingaben {
            let einzeln = match &self.xml_element {
                Some(element) => tabellen::xml_lesen(muster, element),
                None => tabellen::csv_lesen(muster),
            };
            tabelle.anhängen(einzeln.with_context(|| format!("Einlesen von `{muster}`"))?);
        }
        Ok(tabelle)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let rechner = Rechner::new(args.einstellungen()?);
    let (von, bis) = args.zeitraum(rechner.heute)?;
    tracing::info!(%von, %bis, "Berichtszeitraum");

    let tabelle = args.tabelle()?;
    let buchungen: Vec<_> = tabelle
        .buchungen(&rechner.einstellungen().spalten)?
        .into_iter()
        .filter(|b| (von..=bis).contains(&b.datum))
        .collect();
    tracing::info!(
        anzahl = buchungen.len(),
        gelesen = tabelle.zeilen.len(),
        "Buchungen im Zeitraum"
    );

    let kurse = rechner
        .kurse_laden(von, bis)
        .await
        .context("Laden der Wechselkurse")?;
    let versteuert = rechner
        .auswerten(buchungen, &kurse)
        .context("Berechnung der KESt")?;
    let zusammenfassung = zusammenfassen(&versteuert);

    let mut w = std::io::stdout().lock();
    if args.json {
        serde_json::to_writer_pretty(&mut w, &zusammenfassung)?;
        writeln!(w)?;
    } else {
        if args.tsv {
            write!(w, "{}", tsv::TsvErgebnis { zeilen: &versteuert })?;
            writeln!(w)?;
        }
        write!(w, "{}", tsv::TsvZusammenfassung { zusammenfassung: &zusammenfassung })?;
    }

    if let Some(ausgabe) = &rechner.einstellungen().ausgabe {
        let schreiber = Schreiber::new(ausgabe, Some((von, bis)))?;
        schreiber.ergebnis_schreiben(&versteuert, "tax.csv")?;
        schreiber.zusammenfassung_schreiben(&zusammenfassung, "tax_summary.csv")?;
        tracing::info!(verzeichnis = %schreiber.verzeichnis().display(), "Ausgabe abgeschlossen");
    }

    Ok(())
}
