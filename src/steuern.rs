use crate::fehler::{Fehler, Result};
use crate::{UmgerechneteBuchung, VersteuerteBuchung, Zahl};

// Laut § 27a (1) 2. EStG beträgt der besondere Steuersatz für Einkünfte aus
// Kapitalvermögen 27,5 %.
pub const KEST_SATZ: Zahl = 0.275;

// Die Doppelbesteuerungsabkommen erlauben die Anrechnung ausländischer
// Quellensteuer höchstens bis zu 15 % des Bruttobetrags.
pub const DBA_HÖCHSTSATZ: Zahl = 0.15;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Kest {
    pub brutto: Zahl,
    pub netto: Zahl,
    /// Was nach ausländischer Quellensteuer und österreichischer KESt bleibt.
    pub betrag_netto: Zahl,
}

impl Kest {
    /// Berechnet die KESt für einen Bruttobetrag.
    ///
    /// Wurde im Ausland Quellensteuer einbehalten, wird diese bis zum
    /// [`DBA_HÖCHSTSATZ`] angerechnet, auch wenn mehr einbehalten wurde.
    /// Negative Beträge werden nicht abgeschnitten.
    pub fn berechnen(betrag: Zahl, quellensteuer: Option<Zahl>) -> Self {
        let brutto = betrag * KEST_SATZ;
        let Some(quellensteuer) = quellensteuer else {
            return Self {
                brutto,
                netto: brutto,
                betrag_netto: betrag - brutto,
            };
        };

        let anrechenbar = quellensteuer.min(betrag * DBA_HÖCHSTSATZ);
        let netto = brutto - anrechenbar;
        Self {
            brutto,
            netto,
            betrag_netto: betrag - netto - quellensteuer,
        }
    }

    /// Wie [`Kest::berechnen`], nur dass Verluste vorher auf null gesetzt
    /// werden, etwa für realisierte Kursgewinne.
    pub fn berechnen_ohne_verlust(betrag: Zahl, quellensteuer: Option<Zahl>) -> Self {
        Self::berechnen(betrag.max(0.0), quellensteuer)
    }
}

/// Berechnet die KESt für die Euro-Spalte `betrag_spalte` jeder Zeile. Mit
/// `quellensteuer_spalte` wird die dort umgerechnete Quellensteuer angerechnet.
pub fn kest_berechnen(
    zeilen: &[UmgerechneteBuchung],
    betrag_spalte: &str,
    quellensteuer_spalte: Option<&str>,
) -> Result<Vec<VersteuerteBuchung>> {
    let fehlt = |spalte: &str| Fehler::FehlendeSpalte(format!("{spalte}_euro").into());

    zeilen
        .iter()
        .map(|zeile| {
            let betrag = zeile
                .euro(betrag_spalte)
                .ok_or_else(|| fehlt(betrag_spalte))?;
            let quellensteuer = quellensteuer_spalte
                .map(|spalte| zeile.euro(spalte).ok_or_else(|| fehlt(spalte)))
                .transpose()?;

            let kest = Kest::berechnen(betrag, quellensteuer);
            Ok(VersteuerteBuchung {
                umgerechnet: zeile.clone(),
                betrag_spalte: betrag_spalte.into(),
                quellensteuer_spalte: quellensteuer_spalte.map(Into::into),
                kest_brutto: kest.brutto,
                kest_netto: kest.netto,
                betrag_netto: kest.betrag_netto,
            })
        })
        .collect()
}
