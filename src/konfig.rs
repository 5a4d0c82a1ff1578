use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Datelike, Days};
use serde::Deserialize;

use crate::abgleich::TOLERANZ_TAGE;
use crate::tabellen::Spaltenzuordnung;
use crate::waehrungen::Kursabfrage;
use crate::{Datum, String};

/// Einstellungen für einen Lauf, etwa aus `kestrechner.yml`:
///
/// ```yaml
/// waehrungen: [USD, GBP]
/// kurs_cache: data/input/currencies/raw_exchange_rates.csv
/// toleranz_tage: 7
/// spalten:
///   datum: date
///   waehrung: currency
///   betraege: [profit, withholding_tax]
/// steuer:
///   betrag: profit
///   quellensteuer: withholding_tax
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Einstellungen {
    #[serde(alias = "waehrungen")]
    pub währungen: Vec<String>,
    pub kurs_cache: PathBuf,
    pub neu_laden: bool,
    pub toleranz_tage: u64,
    pub ausgabe: Option<PathBuf>,
    pub spalten: Spaltenzuordnung,
    pub steuer: Steuerspalten,
}

/// Welche der umgerechneten Spalten versteuert wird.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Steuerspalten {
    pub betrag: String,
    pub quellensteuer: Option<String>,
}

impl Default for Einstellungen {
    fn default() -> Self {
        Self {
            währungen: vec!["USD".into(), "GBP".into()],
            kurs_cache: "data/input/currencies/raw_exchange_rates.csv".into(),
            neu_laden: false,
            toleranz_tage: TOLERANZ_TAGE,
            ausgabe: None,
            spalten: Default::default(),
            steuer: Default::default(),
        }
    }
}

impl Default for Steuerspalten {
    fn default() -> Self {
        Self {
            betrag: "amount".into(),
            quellensteuer: None,
        }
    }
}

impl Einstellungen {
    pub fn laden(pfad: &Path) -> Result<Self> {
        let rdr = fs::File::open(pfad).with_context(|| format!("Öffnen von `{}`", pfad.display()))?;
        serde_yaml::from_reader(rdr).with_context(|| format!("Einlesen von `{}`", pfad.display()))
    }

    /// Alle Spalten, die in Euro umgerechnet werden müssen.
    pub fn umzurechnende_spalten(&self) -> Vec<String> {
        let mut spalten = self.spalten.beträge.clone();
        for spalte in [Some(&self.steuer.betrag), self.steuer.quellensteuer.as_ref()]
            .into_iter()
            .flatten()
        {
            if !spalten.contains(spalte) {
                spalten.push(spalte.clone());
            }
        }
        spalten
    }

    /// Der Zeitraum, für den Kurse geladen werden.
    ///
    /// Kurse werden ab dem 1. Jänner vor drei Jahren geladen, damit auch ältere
    /// Käufe umgerechnet werden können, und eine Woche über das Ende hinaus.
    pub fn kursabfrage(&self, von: Datum, bis: Datum, heute: Datum) -> Kursabfrage {
        let drei_jahre = Datum::from_ymd_opt(heute.year() - 3, 1, 1).unwrap_or(von);
        Kursabfrage {
            währungen: self.währungen.clone(),
            von: von.min(drei_jahre),
            bis: bis + Days::new(7),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn datum(jahr: i32, monat: u32, tag: u32) -> Datum {
        Datum::from_ymd_opt(jahr, monat, tag).unwrap()
    }

    #[test]
    fn yaml_mit_standardwerten() {
        let einstellungen: Einstellungen = serde_yaml::from_str(
            r#"
waehrungen: [USD, CHF]
toleranz_tage: 3
spalten:
  datum: Date
  betraege: [profit, withholding_tax]
steuer:
  betrag: profit
  quellensteuer: withholding_tax
        "#,
        )
        .unwrap();

        assert_eq!(einstellungen.währungen, ["USD", "CHF"]);
        assert_eq!(einstellungen.toleranz_tage, 3);
        assert_eq!(einstellungen.spalten.datum, "Date");
        assert_eq!(einstellungen.spalten.währung, "currency");
        assert!(!einstellungen.neu_laden);
        assert_eq!(
            einstellungen.umzurechnende_spalten(),
            ["profit", "withholding_tax"]
        );
    }

    #[test]
    fn leere_yaml() {
        let einstellungen: Einstellungen = serde_yaml::from_str("{}").unwrap();
        assert_eq!(einstellungen, Einstellungen::default());
        assert_eq!(einstellungen.umzurechnende_spalten(), ["amount"]);
    }

    #[test]
    fn zeitraum_der_kurse() {
        let einstellungen = Einstellungen::default();
        let abfrage = einstellungen.kursabfrage(
            datum(2025, 1, 1),
            datum(2025, 12, 31),
            datum(2026, 3, 1),
        );
        assert_eq!(abfrage.von, datum(2023, 1, 1));
        assert_eq!(abfrage.bis, datum(2026, 1, 7));

        let abfrage = einstellungen.kursabfrage(
            datum(2015, 1, 1),
            datum(2015, 12, 31),
            datum(2026, 3, 1),
        );
        assert_eq!(abfrage.von, datum(2015, 1, 1));
    }
}
