use std::collections::BTreeSet;

use crate::fehler::{Abweichung, Fehler, Result};
use crate::waehrungen::Wechselkurse;
use crate::{ist_heimwährung, Buchung, VerknüpfteBuchung};

/// Um so viele Tage darf der Kurs vor der Buchung liegen, etwa wegen
/// Wochenenden und Feiertagen, an denen die EZB nichts veröffentlicht.
pub const TOLERANZ_TAGE: u64 = 7;

/// Ordnet jeder Buchung den letzten Kurs ihrer Währung zu, der am oder vor
/// dem Buchungsdatum veröffentlicht wurde.
///
/// Das Ergebnis ist nach Währung und Datum sortiert. Buchungen in
/// [`HEIMWÄHRUNG`](crate::HEIMWÄHRUNG) brauchen keinen Kurs und werden nicht
/// geprüft.
pub fn kurse_zuordnen(
    mut buchungen: Vec<Buchung>,
    kurse: &Wechselkurse,
    toleranz_tage: u64,
) -> Result<Vec<VerknüpfteBuchung>> {
    buchungen.sort_by(|a, b| (&a.währung, a.datum).cmp(&(&b.währung, b.datum)));

    let verknüpft: Vec<_> = buchungen
        .into_iter()
        .map(|buchung| {
            let kurs = kurse.kurs_bis(&buchung.währung, buchung.datum);
            VerknüpfteBuchung {
                buchung,
                kurs_datum: kurs.map(|(datum, _)| datum),
                kurs: kurs.map(|(_, kurs)| kurs),
            }
        })
        .collect();

    let fehlende_währungen: BTreeSet<_> = verknüpft
        .iter()
        .map(|v| &v.buchung.währung)
        .filter(|w| !ist_heimwährung(w) && !kurse.hat_währung(w))
        .collect();
    if !fehlende_währungen.is_empty() {
        return Err(Fehler::FehlendeWährung(
            fehlende_währungen.into_iter().cloned().collect(),
        ));
    }

    let mut abweichungen = vec![];
    for v in &verknüpft {
        if ist_heimwährung(v.währung()) || v.kurs_datum == Some(v.datum()) {
            continue;
        }
        let abweichung = Abweichung {
            währung: v.buchung.währung.clone(),
            datum: v.datum(),
            kurs_datum: v.kurs_datum,
        };
        match abweichung.tage() {
            Some(tage) if tage.unsigned_abs() <= toleranz_tage => {
                tracing::warn!(
                    waehrung = %abweichung.währung,
                    datum = %abweichung.datum,
                    tage,
                    "Wechselkurs ist nicht vom Buchungstag"
                );
            }
            _ => abweichungen.push(abweichung),
        }
    }

    if !abweichungen.is_empty() {
        tracing::error!(
            anzahl = abweichungen.len(),
            toleranz_tage,
            "Wechselkurse außerhalb der Toleranz"
        );
        return Err(Fehler::VeralteterKurs {
            toleranz: toleranz_tage,
            abweichungen,
        });
    }

    Ok(verknüpft)
}
