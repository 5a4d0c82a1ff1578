use std::collections::BTreeMap;

use serde::Deserialize;

use crate::cache::Cache;
use crate::fehler::{Fehler, Result};
use crate::{ist_heimwährung, Datum, String, Wechselkurs, Zahl, HEIMWÄHRUNG};

// https://data.ecb.europa.eu/help/api/data
const ECB_BASE: &str = "https://data-api.ecb.europa.eu/service/data/EXR";

/// Welche Kurse für welchen Zeitraum (inklusive) benötigt werden.
#[derive(Debug, Clone)]
pub struct Kursabfrage {
    pub währungen: Vec<String>,
    pub von: Datum,
    pub bis: Datum,
}

impl Kursabfrage {
    /// Die Abfrage-URL, `None` wenn keine Fremdwährung benötigt wird.
    pub fn url(&self) -> Option<std::string::String> {
        let währungen: Vec<&str> = self
            .währungen
            .iter()
            .map(|w| w.as_str())
            .filter(|w| !ist_heimwährung(w))
            .collect();
        if währungen.is_empty() {
            return None;
        }
        Some(format!(
            "{ECB_BASE}/D.{}.{HEIMWÄHRUNG}.SP00.A?startPeriod={}&endPeriod={}&format=csvdata",
            währungen.join("+"),
            self.von,
            self.bis,
        ))
    }
}

/// Die Tageskurse je Währung, nach Datum geordnet.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Wechselkurse {
    kurse: BTreeMap<String, BTreeMap<Datum, Zahl>>,
}

impl Wechselkurse {
    /// Lädt die Kurse aus der Cache-Datei oder ruft sie bei der EZB ab.
    /// Ohne Fremdwährungen wird nichts abgerufen.
    pub async fn laden(cache: &Cache, abfrage: &Kursabfrage) -> Result<Self> {
        let Some(url) = abfrage.url() else {
            tracing::info!("Keine Fremdwährungen, Wechselkurse werden nicht abgerufen");
            return Ok(Self::default());
        };
        let builder = cache.get(&url);
        let inhalt = cache.get_request(builder).await?;

        let kurse = Self::aus_csv(&inhalt).map_err(|err| match err {
            Fehler::Datei { grund, .. } => Fehler::Datei {
                pfad: cache.pfad().to_owned(),
                grund,
            },
            err => err,
        })?;
        tracing::info!(
            anzahl = kurse.len(),
            waehrungen = kurse.währungen().count(),
            "Wechselkurse geladen"
        );
        Ok(kurse)
    }

    /// Liest das `csvdata` Format der EZB.
    pub fn aus_csv(inhalt: &str) -> Result<Self> {
        let mut rdr = csv::Reader::from_reader(inhalt.as_bytes());
        let mut kurse = Self::default();

        for (idx, zeile) in rdr.deserialize::<raw::Kurs>().enumerate() {
            let zeile = zeile.map_err(|err| Fehler::Datei {
                pfad: Default::default(),
                grund: format!("Zeile {}: {err}", idx + 2),
            })?;

            if zeile.währung_nenner != HEIMWÄHRUNG {
                tracing::debug!(?zeile, "Kurs nicht gegen {HEIMWÄHRUNG}");
                continue;
            }
            let Some(kurs) = zeile.kurs.filter(|kurs| *kurs > 0.0) else {
                tracing::debug!(?zeile, "Kurs ohne Wert");
                continue;
            };

            kurse.einfügen(Wechselkurs {
                kurs_datum: zeile.datum,
                währung: zeile.währung,
                währung_nenner: zeile.währung_nenner,
                kurs,
            });
        }

        Ok(kurse)
    }

    /// Fügt einen Kurs hinzu. Pro Währung und Tag gibt es nur einen Kurs,
    /// ein späterer ersetzt einen früheren.
    pub fn einfügen(&mut self, kurs: Wechselkurs) {
        if ist_heimwährung(&kurs.währung) {
            return;
        }
        let tageskurse = self.kurse.entry(kurs.währung.clone()).or_default();
        if let Some(vorher) = tageskurse.insert(kurs.kurs_datum, kurs.kurs) {
            tracing::warn!(
                waehrung = %kurs.währung,
                datum = %kurs.kurs_datum,
                vorher,
                neu = kurs.kurs,
                "Doppelter Wechselkurs"
            );
        }
    }

    pub fn hat_währung(&self, währung: &str) -> bool {
        self.kurse.contains_key(währung)
    }

    pub fn währungen(&self) -> impl Iterator<Item = &String> {
        self.kurse.keys()
    }

    /// Der letzte veröffentlichte Kurs am oder vor `datum`.
    pub fn kurs_bis(&self, währung: &str, datum: Datum) -> Option<(Datum, Zahl)> {
        self.kurse
            .get(währung)?
            .range(..=datum)
            .next_back()
            .map(|(datum, kurs)| (*datum, *kurs))
    }

    pub fn len(&self) -> usize {
        self.kurse.values().map(|k| k.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.kurse.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Wechselkurs> + '_ {
        self.kurse.iter().flat_map(|(währung, tageskurse)| {
            tageskurse.iter().map(move |(datum, kurs)| Wechselkurs {
                kurs_datum: *datum,
                währung: währung.clone(),
                währung_nenner: HEIMWÄHRUNG.into(),
                kurs: *kurs,
            })
        })
    }
}

impl FromIterator<Wechselkurs> for Wechselkurse {
    fn from_iter<T: IntoIterator<Item = Wechselkurs>>(iter: T) -> Self {
        let mut kurse = Self::default();
        for kurs in iter {
            kurse.einfügen(kurs);
        }
        kurse
    }
}

mod raw {
    use super::*;

    #[derive(Debug, Deserialize)]
    pub struct Kurs {
        #[serde(rename = "TIME_PERIOD")]
        pub datum: Datum,
        #[serde(rename = "CURRENCY")]
        pub währung: String,
        #[serde(rename = "CURRENCY_DENOM")]
        pub währung_nenner: String,
        #[serde(rename = "OBS_VALUE")]
        pub kurs: Option<Zahl>,
    }
}
