use crate::fehler::{Fehler, Result};
use crate::{ist_heimwährung, Beträge, UmgerechneteBuchung, VerknüpfteBuchung, Zahl};

/// Rechnet die angegebenen Betragsspalten in Euro um.
///
/// Der Kurs gibt an, wie viele Einheiten der Fremdwährung einem Euro
/// entsprechen, also wird durch den Kurs dividiert. Beträge in Euro bleiben
/// unverändert.
pub fn umrechnen<S: AsRef<str>>(
    zeilen: &[VerknüpfteBuchung],
    spalten: &[S],
) -> Result<Vec<UmgerechneteBuchung>> {
    zeilen
        .iter()
        .map(|zeile| {
            let mut euro = Beträge::new();
            for spalte in spalten {
                let spalte = spalte.as_ref();
                let betrag = zeile
                    .buchung
                    .betrag(spalte)
                    .ok_or_else(|| Fehler::FehlendeSpalte(spalte.into()))?;
                euro.insert(spalte.into(), in_euro(zeile, betrag)?);
            }
            Ok(UmgerechneteBuchung {
                verknüpft: zeile.clone(),
                euro,
            })
        })
        .collect()
}

fn in_euro(zeile: &VerknüpfteBuchung, betrag: Zahl) -> Result<Zahl> {
    if ist_heimwährung(zeile.währung()) {
        return Ok(betrag);
    }
    match zeile.kurs {
        Some(kurs) if kurs != 0.0 => Ok(betrag / kurs),
        _ => Err(Fehler::Division {
            währung: zeile.buchung.währung.clone(),
            datum: zeile.datum(),
        }),
    }
}
