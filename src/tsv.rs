use std::collections::BTreeSet;
use std::fmt;

use crate::zusammenfassung::{Summen, Zusammenfassung};
use crate::{String, VersteuerteBuchung, Zahl};

/// Die Spalten einer Ergebnistabelle. Betrags- und Textspalten kommen aus den
/// Zeilen selbst, daher werden sie aus allen Zeilen gesammelt.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Ergebnisspalten {
    beträge: Vec<String>,
    merkmale: Vec<String>,
    euro: Vec<String>,
    betrag_spalte: Option<String>,
}

impl Ergebnisspalten {
    pub fn aus(zeilen: &[VersteuerteBuchung]) -> Self {
        let mut beträge = BTreeSet::new();
        let mut merkmale = BTreeSet::new();
        let mut euro = BTreeSet::new();
        for zeile in zeilen {
            let buchung = zeile.buchung();
            beträge.extend(buchung.beträge.keys().cloned());
            merkmale.extend(buchung.merkmale.keys().cloned());
            euro.extend(zeile.umgerechnet.euro.keys().cloned());
        }
        Self {
            beträge: beträge.into_iter().collect(),
            merkmale: merkmale.into_iter().collect(),
            euro: euro.into_iter().collect(),
            betrag_spalte: zeilen.first().map(|z| z.betrag_spalte.clone()),
        }
    }

    pub fn titel(&self) -> Vec<std::string::String> {
        let mut titel = vec!["date".to_owned(), "currency".to_owned()];
        titel.extend(self.beträge.iter().map(|s| s.to_string()));
        titel.extend(self.merkmale.iter().map(|s| s.to_string()));
        titel.push("rate_date".to_owned());
        titel.push("exchange_rate".to_owned());
        titel.extend(self.euro.iter().map(|s| format!("{s}_euro")));
        titel.push("kest_gross".to_owned());
        titel.push("kest_net".to_owned());
        let betrag = self.betrag_spalte.as_deref().unwrap_or("amount");
        titel.push(format!("{betrag}_euro_net"));
        titel
    }

    pub fn werte(&self, zeile: &VersteuerteBuchung) -> Vec<std::string::String> {
        let buchung = zeile.buchung();
        let verknüpft = &zeile.umgerechnet.verknüpft;

        let mut werte = vec![buchung.datum.to_string(), buchung.währung.to_string()];
        werte.extend(self.beträge.iter().map(|s| zahl(buchung.betrag(s))));
        werte.extend(
            self.merkmale
                .iter()
                .map(|s| buchung.merkmale.get(s).cloned().unwrap_or_default()),
        );
        werte.push(
            verknüpft
                .kurs_datum
                .map(|d| d.to_string())
                .unwrap_or_default(),
        );
        werte.push(zahl(verknüpft.kurs));
        werte.extend(self.euro.iter().map(|s| zahl(zeile.umgerechnet.euro(s))));
        werte.push(zahl(Some(zeile.kest_brutto)));
        werte.push(zahl(Some(zeile.kest_netto)));
        werte.push(zahl(Some(zeile.betrag_netto)));
        werte
    }
}

fn zahl(zahl: Option<Zahl>) -> std::string::String {
    zahl.map(|z| z.to_string()).unwrap_or_default()
}

pub struct TsvErgebnis<'a> {
    pub zeilen: &'a [VersteuerteBuchung],
}
impl fmt::Display for TsvErgebnis<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        schreibe_ergebnis(f, self.zeilen)
    }
}

pub struct TsvZusammenfassung<'a> {
    pub zusammenfassung: &'a Zusammenfassung,
}
impl fmt::Display for TsvZusammenfassung<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        schreibe_zusammenfassung(f, self.zusammenfassung)
    }
}

pub fn schreibe_ergebnis<W: fmt::Write>(w: &mut W, zeilen: &[VersteuerteBuchung]) -> fmt::Result {
    let spalten = Ergebnisspalten::aus(zeilen);
    writeln!(w, "{}", spalten.titel().join("\t"))?;
    for zeile in zeilen {
        writeln!(w, "{}", spalten.werte(zeile).join("\t"))?;
    }
    Ok(())
}

pub fn schreibe_zusammenfassung<W: fmt::Write>(
    w: &mut W,
    zusammenfassung: &Zusammenfassung,
) -> fmt::Result {
    write!(w, "Währung\tAnzahl\tBetrag\tBetrag (EUR)\tQuellensteuer (EUR)\t")?;
    writeln!(w, "KESt brutto\tKESt netto\tNetto (EUR)")?;

    for (währung, summe) in &zusammenfassung.je_währung {
        write!(w, "{währung}\t{}\t{}\t", summe.euro.anzahl, summe.betrag)?;
        schreibe_summen(w, &summe.euro)?;
    }
    write!(w, "Gesamt\t{}\t\t", zusammenfassung.gesamt.anzahl)?;
    schreibe_summen(w, &zusammenfassung.gesamt)
}

fn schreibe_summen<W: fmt::Write>(w: &mut W, summen: &Summen) -> fmt::Result {
    writeln!(
        w,
        "{}\t{}\t{}\t{}\t{}",
        summen.betrag_euro,
        summen.quellensteuer_euro,
        summen.kest_brutto,
        summen.kest_netto,
        summen.betrag_netto,
    )
}
