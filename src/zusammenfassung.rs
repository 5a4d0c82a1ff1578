use std::collections::BTreeMap;
use std::ops::AddAssign;

use serde::Serialize;

use crate::{runde, String, VersteuerteBuchung, Zahl};

const STELLEN: u32 = 4;

/// Summen in Euro.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize)]
pub struct Summen {
    pub anzahl: usize,
    pub betrag_euro: Zahl,
    pub quellensteuer_euro: Zahl,
    pub kest_brutto: Zahl,
    pub kest_netto: Zahl,
    pub betrag_netto: Zahl,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize)]
pub struct Währungssumme {
    /// Summe in der ursprünglichen Währung.
    pub betrag: Zahl,
    #[serde(flatten)]
    pub euro: Summen,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct Zusammenfassung {
    pub je_währung: BTreeMap<String, Währungssumme>,
    pub gesamt: Summen,
}

impl AddAssign<&VersteuerteBuchung> for Summen {
    fn add_assign(&mut self, zeile: &VersteuerteBuchung) {
        self.anzahl += 1;
        self.betrag_euro += zeile.betrag_euro();
        self.quellensteuer_euro += zeile.quellensteuer_euro();
        self.kest_brutto += zeile.kest_brutto;
        self.kest_netto += zeile.kest_netto;
        self.betrag_netto += zeile.betrag_netto;
    }
}

impl Summen {
    fn gerundet(self) -> Self {
        Self {
            anzahl: self.anzahl,
            betrag_euro: runde(self.betrag_euro, STELLEN),
            quellensteuer_euro: runde(self.quellensteuer_euro, STELLEN),
            kest_brutto: runde(self.kest_brutto, STELLEN),
            kest_netto: runde(self.kest_netto, STELLEN),
            betrag_netto: runde(self.betrag_netto, STELLEN),
        }
    }
}

/// Summiert die versteuerten Zeilen je Währung und insgesamt, auf vier
/// Nachkommastellen gerundet.
pub fn zusammenfassen(zeilen: &[VersteuerteBuchung]) -> Zusammenfassung {
    let mut zusammenfassung = Zusammenfassung::default();

    for zeile in zeilen {
        let buchung = zeile.buchung();
        let summe = zusammenfassung
            .je_währung
            .entry(buchung.währung.clone())
            .or_default();
        summe.betrag += buchung.betrag(&zeile.betrag_spalte).unwrap_or_default();
        summe.euro += zeile;
        zusammenfassung.gesamt += zeile;
    }

    for summe in zusammenfassung.je_währung.values_mut() {
        summe.betrag = runde(summe.betrag, STELLEN);
        summe.euro = summe.euro.gerundet();
    }
    zusammenfassung.gesamt = zusammenfassung.gesamt.gerundet();

    zusammenfassung
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steuern::kest_berechnen;
    use crate::umrechnung::umrechnen;
    use crate::{Buchung, Datum, VerknüpfteBuchung};

    fn zeile(währung: &str, kurs: Option<Zahl>, betrag: Zahl, steuer: Zahl) -> VerknüpfteBuchung {
        let datum = Datum::from_ymd_opt(2024, 5, 2).unwrap();
        VerknüpfteBuchung {
            buchung: Buchung::new(datum, währung)
                .mit_betrag("amount", betrag)
                .mit_betrag("withholding_tax", steuer),
            kurs_datum: kurs.map(|_| datum),
            kurs,
        }
    }

    #[test]
    fn summen_je_währung() {
        let zeilen = [
            zeile("USD", Some(2.0), 200.0, 30.0),
            zeile("USD", Some(2.0), 100.0, 0.0),
            zeile("EUR", None, 100.0, 9.0),
        ];
        let spalten = ["amount", "withholding_tax"];
        let umgerechnet = umrechnen(&zeilen, &spalten).unwrap();
        let versteuert = kest_berechnen(&umgerechnet, "amount", Some("withholding_tax")).unwrap();

        let zusammenfassung = zusammenfassen(&versteuert);

        let usd = zusammenfassung.je_währung["USD"];
        assert_eq!(usd.betrag, 300.0);
        assert_eq!(
            usd.euro,
            Summen {
                anzahl: 2,
                betrag_euro: 150.0,
                quellensteuer_euro: 15.0,
                kest_brutto: 41.25,
                // 27.5 - 15 + 13.75
                kest_netto: 26.25,
                betrag_netto: 108.75,
            }
        );

        assert_eq!(zusammenfassung.gesamt.anzahl, 3);
        assert_eq!(zusammenfassung.gesamt.betrag_euro, 250.0);
        assert_eq!(zusammenfassung.gesamt.kest_netto, 44.75);
        assert_eq!(zusammenfassung.gesamt.betrag_netto, 181.25);
    }

    #[test]
    fn als_json() {
        let zeilen = [zeile("EUR", None, 100.0, 0.0)];
        let umgerechnet = umrechnen(&zeilen, &["amount"]).unwrap();
        let versteuert = kest_berechnen(&umgerechnet, "amount", None).unwrap();

        let json = serde_json::to_value(zusammenfassen(&versteuert)).unwrap();
        assert_eq!(json["je_währung"]["EUR"]["betrag"], 100.0);
        assert_eq!(json["je_währung"]["EUR"]["kest_netto"], 27.5);
        assert_eq!(json["gesamt"]["anzahl"], 1);
    }
}
