use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use globset::GlobBuilder;
use serde::Deserialize;
use walkdir::WalkDir;

use crate::fehler::{Fehler, Result};
use crate::format::{datum_lesen, zahl_lesen};
use crate::{Buchung, String};

pub type Zeile = BTreeMap<String, std::string::String>;

/// Zeilen aus einer oder mehreren Dateien, Spalte für Spalte als Text.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Tabelle {
    pub spalten: Vec<String>,
    pub zeilen: Vec<Zeile>,
}

/// Welche Spalten einer Tabelle eine [`Buchung`] ergeben.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Spaltenzuordnung {
    /// Nach diesem Datum wird der Wechselkurs gesucht.
    pub datum: String,
    #[serde(alias = "waehrung")]
    pub währung: String,
    #[serde(alias = "betraege")]
    pub beträge: Vec<String>,
}

impl Default for Spaltenzuordnung {
    fn default() -> Self {
        Self {
            datum: "date".into(),
            währung: "currency".into(),
            beträge: vec!["amount".into()],
        }
    }
}

impl Tabelle {
    fn spalte_hinzufügen(&mut self, spalte: &str) {
        if !self.spalten.iter().any(|s| s == spalte) {
            self.spalten.push(spalte.into());
        }
    }

    /// Hängt die Zeilen einer weiteren Tabelle an.
    pub fn anhängen(&mut self, andere: Tabelle) {
        for spalte in &andere.spalten {
            self.spalte_hinzufügen(spalte);
        }
        self.zeilen.extend(andere.zeilen);
    }

    /// Macht aus jeder Zeile eine [`Buchung`]. Leere Betragszellen zählen als
    /// null, alle übrigen Spalten bleiben als Merkmale erhalten.
    pub fn buchungen(&self, zuordnung: &Spaltenzuordnung) -> anyhow::Result<Vec<Buchung>> {
        for spalte in [&zuordnung.datum, &zuordnung.währung]
            .into_iter()
            .chain(&zuordnung.beträge)
        {
            if !self.spalten.contains(spalte) {
                return Err(Fehler::FehlendeSpalte(spalte.clone()).into());
            }
        }

        self.zeilen
            .iter()
            .enumerate()
            .map(|(idx, zeile)| {
                buchung_aus_zeile(zeile, zuordnung).with_context(|| format!("Zeile {}", idx + 1))
            })
            .collect()
    }
}

fn buchung_aus_zeile(zeile: &Zeile, zuordnung: &Spaltenzuordnung) -> anyhow::Result<Buchung> {
    let zelle = |spalte: &String| zeile.get(spalte).map(|s| s.trim()).unwrap_or_default();

    let datum = datum_lesen(zelle(&zuordnung.datum))?;
    let währung = zelle(&zuordnung.währung).to_uppercase();
    anyhow::ensure!(!währung.is_empty(), "Währung fehlt");

    let mut buchung = Buchung::new(datum, währung);
    for spalte in &zuordnung.beträge {
        let betrag = match zelle(spalte) {
            "" => 0.0,
            wert => zahl_lesen(wert).with_context(|| format!("Spalte `{spalte}`"))?,
        };
        buchung.beträge.insert(spalte.clone(), betrag);
    }
    for (spalte, wert) in zeile {
        if *spalte != zuordnung.datum
            && *spalte != zuordnung.währung
            && !zuordnung.beträge.contains(spalte)
        {
            buchung.merkmale.insert(spalte.clone(), wert.clone());
        }
    }
    Ok(buchung)
}

/// Alle Dateien zu `muster`. Ein Verzeichnis wird rekursiv nach Dateien mit
/// der Endung `endung` durchsucht, alles andere ist ein Glob wie `wise/wise*`.
pub fn finde_dateien(muster: &str, endung: &str) -> Result<Vec<PathBuf>> {
    let ungültig = |grund: std::string::String| Fehler::Datei {
        pfad: muster.into(),
        grund,
    };

    let mut dateien = vec![];
    if Path::new(muster).is_dir() {
        let glob = GlobBuilder::new(&format!("**/*.{endung}"))
            .case_insensitive(true)
            .build()
            .map_err(|err| ungültig(err.to_string()))?
            .compile_matcher();

        for entry in WalkDir::new(muster) {
            let entry = entry.map_err(|err| ungültig(err.to_string()))?;
            if entry.file_type().is_file() && glob.is_match(entry.path()) {
                dateien.push(entry.into_path());
            }
        }
    } else {
        let pfade = glob::glob(muster).map_err(|err| ungültig(err.to_string()))?;
        for pfad in pfade {
            dateien.push(pfad.map_err(|err| ungültig(err.to_string()))?);
        }
    }

    if dateien.is_empty() {
        return Err(Fehler::KeineDateien(muster.into()));
    }
    dateien.sort();
    Ok(dateien)
}

/// Liest alle CSV Dateien zu `muster` in eine Tabelle.
pub fn csv_lesen(muster: &str) -> Result<Tabelle> {
    let mut tabelle = Tabelle::default();
    for pfad in finde_dateien(muster, "csv")? {
        let einzeln = csv_datei_lesen(&pfad).map_err(|err| Fehler::Datei {
            pfad: pfad.clone(),
            grund: err.to_string(),
        })?;
        tracing::debug!(pfad = %pfad.display(), zeilen = einzeln.zeilen.len(), "CSV gelesen");
        tabelle.anhängen(einzeln);
    }
    Ok(tabelle)
}

fn csv_datei_lesen(pfad: &Path) -> csv::Result<Tabelle> {
    let mut rdr = csv::Reader::from_path(pfad)?;
    let spalten: Vec<String> = rdr.headers()?.iter().map(|s| s.trim().into()).collect();

    let mut zeilen = vec![];
    for record in rdr.records() {
        let record = record?;
        let zeile: Zeile = spalten
            .iter()
            .cloned()
            .zip(record.iter().map(std::string::String::from))
            .collect();
        zeilen.push(zeile);
    }

    Ok(Tabelle { spalten, zeilen })
}

/// Liest aus allen XML Dateien zu `muster` die Attribute jedes `<element …>`
/// als eine Zeile.
pub fn xml_lesen(muster: &str, element: &str) -> Result<Tabelle> {
    let mut tabelle = Tabelle::default();
    for pfad in finde_dateien(muster, "xml")? {
        let fehler = |grund: std::string::String| Fehler::Datei {
            pfad: pfad.clone(),
            grund,
        };
        let inhalt = std::fs::read_to_string(&pfad).map_err(|err| fehler(err.to_string()))?;
        let einzeln = elemente_lesen(&inhalt, element).map_err(fehler)?;
        tracing::debug!(pfad = %pfad.display(), zeilen = einzeln.zeilen.len(), "XML gelesen");
        tabelle.anhängen(einzeln);
    }
    Ok(tabelle)
}

/// Sucht alle Tags `<element …>` bzw. `<element …/>` und liest deren Attribute.
/// Kommentare, CDATA, Verarbeitungsanweisungen und die DOCTYPE werden
/// übersprungen.
pub fn elemente_lesen(
    inhalt: &str,
    element: &str,
) -> std::result::Result<Tabelle, std::string::String> {
    let mut tabelle = Tabelle::default();

    let mut rest = inhalt;
    while let Some(start) = rest.find('<') {
        rest = &rest[start..];
        if let Some(danach) = abschnitt_überspringen(rest)? {
            rest = danach;
            continue;
        }
        rest = &rest[1..];
        let Some(danach) = rest.strip_prefix(element) else {
            continue;
        };
        // `<recordset` ist kein `<record`
        if !danach.starts_with(|c: char| c.is_whitespace() || c == '/' || c == '>') {
            continue;
        }
        let (zeile, danach) = attribute_lesen(danach)?;
        for spalte in zeile.keys() {
            tabelle.spalte_hinzufügen(spalte);
        }
        tabelle.zeilen.push(zeile);
        rest = danach;
    }

    Ok(tabelle)
}

// `<!--` muss vor `<!` stehen
const ABSCHNITTE: [(&str, &str); 4] = [
    ("<!--", "-->"),
    ("<![CDATA[", "]]>"),
    ("<?", "?>"),
    ("<!", ">"),
];

fn abschnitt_überspringen(rest: &str) -> std::result::Result<Option<&str>, std::string::String> {
    for (anfang, ende) in ABSCHNITTE {
        if let Some(innen) = rest.strip_prefix(anfang) {
            let idx = innen
                .find(ende)
                .ok_or_else(|| format!("`{anfang}` ohne `{ende}`"))?;
            return Ok(Some(&innen[idx + ende.len()..]));
        }
    }
    Ok(None)
}

fn attribute_lesen(mut rest: &str) -> std::result::Result<(Zeile, &str), std::string::String> {
    let mut zeile = Zeile::new();
    loop {
        rest = rest.trim_start();
        if let Some(danach) = rest.strip_prefix("/>").or_else(|| rest.strip_prefix('>')) {
            return Ok((zeile, danach));
        }
        let (name, danach) = rest
            .split_once('=')
            .ok_or_else(|| format!("Attribut erwartet bei `{}`", anfang(rest)))?;
        let danach = danach.trim_start();
        let anführung = danach
            .chars()
            .next()
            .filter(|c| *c == '"' || *c == '\'')
            .ok_or_else(|| format!("Wert in Anführungszeichen erwartet bei `{}`", anfang(rest)))?;
        let danach = &danach[1..];
        let ende = danach
            .find(anführung)
            .ok_or_else(|| format!("Wert ohne Ende bei `{}`", anfang(rest)))?;

        zeile.insert(name.trim().into(), entschlüsseln(&danach[..ende])?);
        rest = &danach[ende + 1..];
    }
}

fn anfang(s: &str) -> &str {
    let ende = s.char_indices().nth(30).map(|(idx, _)| idx).unwrap_or(s.len());
    &s[..ende]
}

fn entschlüsseln(wert: &str) -> std::result::Result<std::string::String, std::string::String> {
    let mut ergebnis = std::string::String::with_capacity(wert.len());
    let mut rest = wert;
    while let Some(start) = rest.find('&') {
        ergebnis.push_str(&rest[..start]);
        rest = &rest[start + 1..];
        let ende = rest
            .find(';')
            .ok_or_else(|| format!("Entität ohne `;` bei `&{}`", anfang(rest)))?;
        let name = &rest[..ende];
        let zeichen = match name {
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            "amp" => Some('&'),
            _ => zeichenreferenz(name),
        };
        ergebnis.push(zeichen.ok_or_else(|| format!("Unbekannte Entität `&{name};`"))?);
        rest = &rest[ende + 1..];
    }
    ergebnis.push_str(rest);
    Ok(ergebnis)
}

/// `#38` oder `#x26`
fn zeichenreferenz(name: &str) -> Option<char> {
    let nummer = name.strip_prefix('#')?;
    let code = match nummer.strip_prefix('x').or_else(|| nummer.strip_prefix('X')) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => nummer.parse().ok()?,
    };
    char::from_u32(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Datum;

    const XML_1: &str = r#"<root>
    <record id="1" name="test1" value="10"/>
</root>
"#;

    const XML_2: &str = r#"<root>
    <recordset count='1'>
        <record id="2" name="a &amp; b" value="20"></record>
    </recordset>
</root>
"#;

    fn zeile(paare: &[(&str, &str)]) -> Zeile {
        paare
            .iter()
            .map(|(k, v)| (String::from(*k), v.to_string()))
            .collect()
    }

    #[test]
    fn eine_xml_datei() {
        let verzeichnis = tempfile::tempdir().unwrap();
        std::fs::write(verzeichnis.path().join("single.xml"), XML_1).unwrap();

        let muster = verzeichnis.path().join("single.xml");
        let tabelle = xml_lesen(muster.to_str().unwrap(), "record").unwrap();
        assert_eq!(
            tabelle.zeilen,
            [zeile(&[("id", "1"), ("name", "test1"), ("value", "10")])]
        );
    }

    #[test]
    fn mehrere_xml_dateien() {
        let verzeichnis = tempfile::tempdir().unwrap();
        std::fs::write(verzeichnis.path().join("multi1.xml"), XML_1).unwrap();
        std::fs::write(verzeichnis.path().join("multi2.xml"), XML_2).unwrap();

        let muster = verzeichnis.path().join("multi*.xml");
        let tabelle = xml_lesen(muster.to_str().unwrap(), "record").unwrap();
        assert_eq!(
            tabelle.zeilen,
            [
                zeile(&[("id", "1"), ("name", "test1"), ("value", "10")]),
                zeile(&[("id", "2"), ("name", "a & b"), ("value", "20")]),
            ]
        );
        assert_eq!(tabelle.spalten, ["id", "name", "value"]);
    }

    #[test]
    fn kaputtes_xml() {
        let fehler = elemente_lesen(r#"<record id="1 />"#, "record").unwrap_err();
        assert!(fehler.contains("Wert ohne Ende"));
    }

    #[test]
    fn kommentare_und_cdata_überspringen() {
        let inhalt = r#"<?xml version="1.0"?>
<!DOCTYPE root>
<root>
    <!-- <record id="alt" value="999"/> -->
    <note><![CDATA[ <record id="cdata" value="1"/> ]]></note>
    <?verarbeitung <record id="pi"/> ?>
    <record id="1" value="10"/>
</root>"#;
        let tabelle = elemente_lesen(inhalt, "record").unwrap();
        assert_eq!(tabelle.zeilen, [zeile(&[("id", "1"), ("value", "10")])]);
    }

    #[test]
    fn offener_kommentar() {
        let fehler = elemente_lesen(r#"<root><!-- <record id="1"/>"#, "record").unwrap_err();
        assert!(fehler.contains("-->"));
    }

    #[test]
    fn zeichenreferenzen() {
        let tabelle = elemente_lesen(
            r#"<record name="AT&#38;T" preis="&#x20AC; 5" text="&lt;&amp;amp;&gt;"/>"#,
            "record",
        )
        .unwrap();
        assert_eq!(
            tabelle.zeilen,
            [zeile(&[
                ("name", "AT&T"),
                ("preis", "€ 5"),
                ("text", "<&amp;>")
            ])]
        );

        let fehler = elemente_lesen(r#"<record name="&nbsp;"/>"#, "record").unwrap_err();
        assert!(fehler.contains("&nbsp;"));
    }

    #[test]
    fn keine_dateien() {
        let verzeichnis = tempfile::tempdir().unwrap();
        let muster = verzeichnis.path().join("nichts*.csv");
        let fehler = csv_lesen(muster.to_str().unwrap()).unwrap_err();
        assert!(matches!(fehler, Fehler::KeineDateien(_)));
    }

    #[test]
    fn csv_aus_verzeichnis() {
        let verzeichnis = tempfile::tempdir().unwrap();
        let unter = verzeichnis.path().join("wise");
        std::fs::create_dir(&unter).unwrap();
        std::fs::write(
            unter.join("wise_1.csv"),
            "date,currency,amount,ticker\n2024-01-02,usd,\"1,000.50\",AAPL\n",
        )
        .unwrap();
        std::fs::write(
            unter.join("wise_2.CSV"),
            "date,currency,amount,ticker\n2024-01-03 10:00:00,EUR,,MSFT\n",
        )
        .unwrap();
        std::fs::write(unter.join("notizen.txt"), "nichts").unwrap();

        let tabelle = csv_lesen(verzeichnis.path().to_str().unwrap()).unwrap();
        assert_eq!(tabelle.zeilen.len(), 2);

        let buchungen = tabelle.buchungen(&Spaltenzuordnung::default()).unwrap();
        assert_eq!(
            buchungen,
            [
                Buchung::new(Datum::from_ymd_opt(2024, 1, 2).unwrap(), "USD")
                    .mit_betrag("amount", 1000.5)
                    .mit_merkmal("ticker", "AAPL"),
                Buchung::new(Datum::from_ymd_opt(2024, 1, 3).unwrap(), "EUR")
                    .mit_betrag("amount", 0.0)
                    .mit_merkmal("ticker", "MSFT"),
            ]
        );
    }

    #[test]
    fn fehlende_spalte() {
        let tabelle = Tabelle {
            spalten: vec!["date".into(), "currency".into()],
            zeilen: vec![],
        };
        let fehler = tabelle.buchungen(&Spaltenzuordnung::default()).unwrap_err();
        assert_eq!(fehler.to_string(), "Spalte `amount` fehlt");
    }

    #[test]
    fn falsches_datum() {
        let tabelle = Tabelle {
            spalten: vec!["date".into(), "currency".into(), "amount".into()],
            zeilen: vec![zeile(&[
                ("date", "02.01.2024"),
                ("currency", "USD"),
                ("amount", "1"),
            ])],
        };
        let fehler = tabelle.buchungen(&Spaltenzuordnung::default()).unwrap_err();
        assert_eq!(fehler.to_string(), "Zeile 1");
    }
}
