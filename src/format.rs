use anyhow::{Context, Result};

use crate::{Datum, Zahl};

/// Liest einen Betrag, wie er in Exporten der Broker vorkommt:
/// `1,234.56`, `$12.30`, `€ 4.00` oder `-7`.
pub fn zahl_lesen(s: &str) -> Result<Zahl> {
    let bereinigt: std::string::String = s
        .trim()
        .chars()
        .filter(|c| !matches!(c, ',' | '$' | '€' | '£' | ' ' | '\u{a0}'))
        .collect();
    anyhow::ensure!(!bereinigt.is_empty(), "Zahl erwartet");
    bereinigt
        .parse()
        .with_context(|| format!("`{s}` ist keine Zahl"))
}

/// Liest ein Datum im Format `2024-01-31`. Folgt eine Uhrzeit
/// (`2024-01-31 12:00:00` oder `2024-01-31T12:00:00`), wird diese verworfen.
pub fn datum_lesen(s: &str) -> Result<Datum> {
    let s = s.trim();
    let datum = s.get(..10).unwrap_or(s);
    datum
        .parse()
        .with_context(|| format!("`{s}` ist kein Datum"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zahlen() {
        assert_eq!(zahl_lesen("12.5").unwrap(), 12.5);
        assert_eq!(zahl_lesen(" -7 ").unwrap(), -7.0);
        assert_eq!(zahl_lesen("1,234.56").unwrap(), 1234.56);
        assert_eq!(zahl_lesen("$12.30").unwrap(), 12.3);
        assert_eq!(zahl_lesen("€ 4.00").unwrap(), 4.0);
        assert!(zahl_lesen("").is_err());
        assert!(zahl_lesen("abc").is_err());
    }

    #[test]
    fn daten() {
        let erwartet = Datum::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(datum_lesen("2024-03-01").unwrap(), erwartet);
        assert_eq!(datum_lesen("2024-03-01 23:59:59").unwrap(), erwartet);
        assert_eq!(datum_lesen("2024-03-01T08:00:00").unwrap(), erwartet);
        assert!(datum_lesen("01.03.2024").is_err());
    }
}
