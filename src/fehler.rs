use std::fmt;
use std::path::PathBuf;

use crate::{Datum, String};

#[derive(Debug, thiserror::Error)]
pub enum Fehler {
    #[error("Abruf der Wechselkurse von `{url}` fehlgeschlagen: {grund}")]
    Abruf { url: std::string::String, grund: Abrufgrund },

    #[error("Für folgende Währungen gibt es keine Wechselkurse: {}", liste(.0))]
    FehlendeWährung(Vec<String>),

    #[error(
        "Für {} Buchungen liegt der Wechselkurs mehr als {toleranz} Tage zurück:\n{}",
        .abweichungen.len(),
        zeilen(.abweichungen)
    )]
    VeralteterKurs {
        toleranz: u64,
        abweichungen: Vec<Abweichung>,
    },

    #[error("Kein gültiger Wechselkurs für {} am {datum}", .währung)]
    Division { währung: String, datum: Datum },

    #[error("Spalte `{0}` fehlt")]
    FehlendeSpalte(String),

    #[error("Keine Dateien gefunden für `{0}`")]
    KeineDateien(std::string::String),

    #[error("Einlesen von `{}` fehlgeschlagen: {grund}", .pfad.display())]
    Datei {
        pfad: PathBuf,
        grund: std::string::String,
    },
}

#[derive(Debug)]
pub enum Abrufgrund {
    Verbindung(reqwest::Error),
    Status(reqwest::StatusCode),
}

impl fmt::Display for Abrufgrund {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Abrufgrund::Verbindung(err) => write!(f, "{err}"),
            Abrufgrund::Status(status) => write!(f, "HTTP Status {status}"),
        }
    }
}

/// Eine Buchung, deren Wechselkurs zu weit vom Buchungsdatum entfernt ist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Abweichung {
    pub währung: String,
    pub datum: Datum,
    pub kurs_datum: Option<Datum>,
}

impl Abweichung {
    /// Abstand in Tagen zwischen Buchung und Kurs, `None` wenn es keinen Kurs gibt.
    pub fn tage(&self) -> Option<i64> {
        self.kurs_datum
            .map(|kurs_datum| (self.datum - kurs_datum).num_days())
    }
}

impl fmt::Display for Abweichung {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} am {}: ", self.währung, self.datum)?;
        match (self.kurs_datum, self.tage()) {
            (Some(kurs_datum), Some(tage)) => write!(f, "Kurs vom {kurs_datum} ({tage} Tage)"),
            _ => f.write_str("kein Kurs"),
        }
    }
}

fn liste(währungen: &[String]) -> std::string::String {
    währungen
        .iter()
        .map(|w| w.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn zeilen(abweichungen: &[Abweichung]) -> std::string::String {
    abweichungen
        .iter()
        .map(|a| format!("  {a}"))
        .collect::<Vec<_>>()
        .join("\n")
}

pub type Result<T, E = Fehler> = std::result::Result<T, E>;
