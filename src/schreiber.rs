use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::tsv::Ergebnisspalten;
use crate::zusammenfassung::Zusammenfassung;
use crate::{Datum, VersteuerteBuchung};

/// Schreibt Ergebnisse als CSV in ein Verzeichnis. Ist ein Zeitraum gesetzt,
/// wird er an den Dateinamen angehängt: `dividends__2024-01-01_2024-12-31.csv`.
#[derive(Debug)]
pub struct Schreiber {
    verzeichnis: PathBuf,
    zeitraum: Option<(Datum, Datum)>,
}

impl Schreiber {
    pub fn new(verzeichnis: impl Into<PathBuf>, zeitraum: Option<(Datum, Datum)>) -> Result<Self> {
        let verzeichnis = verzeichnis.into();
        fs::create_dir_all(&verzeichnis)
            .with_context(|| format!("Anlegen von `{}`", verzeichnis.display()))?;
        Ok(Self {
            verzeichnis,
            zeitraum,
        })
    }

    pub fn dateiname(&self, name: &str) -> Result<String> {
        let mut teile = name.split('.');
        let basis = teile.next().unwrap_or_default();
        let endung = teile.next();
        anyhow::ensure!(
            teile.next().is_none(),
            "Dateiname `{name}` darf nur einen `.` vor der Endung enthalten"
        );

        let basis = match self.zeitraum {
            Some((von, bis)) => format!("{basis}__{von}_{bis}"),
            None => basis.to_owned(),
        };
        Ok(match endung {
            Some(endung) => format!("{basis}.{endung}"),
            None => basis,
        })
    }

    pub fn ergebnis_schreiben(&self, zeilen: &[VersteuerteBuchung], name: &str) -> Result<PathBuf> {
        let spalten = Ergebnisspalten::aus(zeilen);
        self.schreiben(name, |wtr| {
            wtr.write_record(spalten.titel())?;
            for zeile in zeilen {
                wtr.write_record(spalten.werte(zeile))?;
            }
            Ok(())
        })
    }

    pub fn zusammenfassung_schreiben(
        &self,
        zusammenfassung: &Zusammenfassung,
        name: &str,
    ) -> Result<PathBuf> {
        self.schreiben(name, |wtr| {
            wtr.write_record([
                "currency",
                "count",
                "amount_total",
                "amount_euro_total",
                "withholding_tax_euro_total",
                "kest_gross_total",
                "kest_net_total",
                "amount_euro_net_total",
            ])?;
            let gesamt = ("total", None, &zusammenfassung.gesamt);
            let zeilen = zusammenfassung
                .je_währung
                .iter()
                .map(|(währung, summe)| (währung.as_str(), Some(summe.betrag), &summe.euro))
                .chain(std::iter::once(gesamt));
            for (währung, betrag, summen) in zeilen {
                wtr.write_record([
                    währung.to_owned(),
                    summen.anzahl.to_string(),
                    betrag.map(|b| b.to_string()).unwrap_or_default(),
                    summen.betrag_euro.to_string(),
                    summen.quellensteuer_euro.to_string(),
                    summen.kest_brutto.to_string(),
                    summen.kest_netto.to_string(),
                    summen.betrag_netto.to_string(),
                ])?;
            }
            Ok(())
        })
    }

    fn schreiben(
        &self,
        name: &str,
        inhalt: impl FnOnce(&mut csv::Writer<fs::File>) -> csv::Result<()>,
    ) -> Result<PathBuf> {
        let pfad = self.verzeichnis.join(self.dateiname(name)?);
        let mut wtr = csv::Writer::from_path(&pfad)
            .with_context(|| format!("Öffnen von `{}`", pfad.display()))?;
        inhalt(&mut wtr).with_context(|| format!("Schreiben von `{}`", pfad.display()))?;
        wtr.flush()?;
        tracing::info!(pfad = %pfad.display(), "Ergebnis geschrieben");
        Ok(pfad)
    }

    pub fn verzeichnis(&self) -> &Path {
        &self.verzeichnis
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steuern::kest_berechnen;
    use crate::umrechnung::umrechnen;
    use crate::zusammenfassung::zusammenfassen;
    use crate::{Buchung, VerknüpfteBuchung};

    fn datum(monat: u32, tag: u32) -> Datum {
        Datum::from_ymd_opt(2024, monat, tag).unwrap()
    }

    #[test]
    fn dateinamen() {
        let verzeichnis = tempfile::tempdir().unwrap();
        let mit = Schreiber::new(verzeichnis.path(), Some((datum(1, 1), datum(12, 31)))).unwrap();
        assert_eq!(
            mit.dateiname("dividends.csv").unwrap(),
            "dividends__2024-01-01_2024-12-31.csv"
        );
        assert_eq!(
            mit.dateiname("summary").unwrap(),
            "summary__2024-01-01_2024-12-31"
        );
        assert!(mit.dateiname("a.b.csv").is_err());

        let ohne = Schreiber::new(verzeichnis.path(), None).unwrap();
        assert_eq!(ohne.dateiname("dividends.csv").unwrap(), "dividends.csv");
    }

    #[test]
    fn csv_schreiben() {
        let verzeichnis = tempfile::tempdir().unwrap();
        let ausgabe = verzeichnis.path().join("ausgabe/ibkr");
        let schreiber = Schreiber::new(&ausgabe, None).unwrap();

        let zeilen = [VerknüpfteBuchung {
            buchung: Buchung::new(datum(1, 10), "EUR").mit_betrag("amount", 100.0),
            kurs_datum: None,
            kurs: None,
        }];
        let umgerechnet = umrechnen(&zeilen, &["amount"]).unwrap();
        let versteuert = kest_berechnen(&umgerechnet, "amount", None).unwrap();

        let pfad = schreiber.ergebnis_schreiben(&versteuert, "tax.csv").unwrap();
        let inhalt = fs::read_to_string(pfad).unwrap();
        assert_eq!(
            inhalt,
            "date,currency,amount,rate_date,exchange_rate,amount_euro,kest_gross,kest_net,amount_euro_net\n\
             2024-01-10,EUR,100,,,100,27.500000000000004,27.500000000000004,72.5\n"
        );

        let pfad = schreiber
            .zusammenfassung_schreiben(&zusammenfassen(&versteuert), "summary.csv")
            .unwrap();
        let inhalt = fs::read_to_string(pfad).unwrap();
        let zeilen: Vec<_> = inhalt.lines().collect();
        assert_eq!(zeilen[1], "EUR,1,100,100,0,27.5,27.5,72.5");
        assert_eq!(zeilen[2], "total,1,,100,0,27.5,27.5,72.5");
    }
}
