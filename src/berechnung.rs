use crate::abgleich::kurse_zuordnen;
use crate::cache::Cache;
use crate::fehler::Result;
use crate::konfig::Einstellungen;
use crate::steuern::kest_berechnen;
use crate::umrechnung::umrechnen;
use crate::waehrungen::Wechselkurse;
use crate::{Buchung, Datum, VersteuerteBuchung};

/// Führt Buchungen durch Kurszuordnung, Umrechnung und KESt-Berechnung.
#[derive(Debug)]
pub struct Rechner {
    pub heute: Datum,
    einstellungen: Einstellungen,
}

impl Rechner {
    pub fn new(einstellungen: Einstellungen) -> Self {
        let heute = chrono::Local::now().date_naive();
        Self {
            heute,
            einstellungen,
        }
    }

    pub fn einstellungen(&self) -> &Einstellungen {
        &self.einstellungen
    }

    /// Lädt die Kurse für den Berichtszeitraum `von` bis `bis`.
    pub async fn kurse_laden(&self, von: Datum, bis: Datum) -> Result<Wechselkurse> {
        let cache = Cache::new(
            &self.einstellungen.kurs_cache,
            self.einstellungen.neu_laden,
        );
        let abfrage = self.einstellungen.kursabfrage(von, bis, self.heute);
        tracing::info!(von = %abfrage.von, bis = %abfrage.bis, "Zeitraum der Wechselkurse");
        Wechselkurse::laden(&cache, &abfrage).await
    }

    pub fn auswerten(
        &self,
        buchungen: Vec<Buchung>,
        kurse: &Wechselkurse,
    ) -> Result<Vec<VersteuerteBuchung>> {
        let einstellungen = &self.einstellungen;

        let verknüpft = kurse_zuordnen(buchungen, kurse, einstellungen.toleranz_tage)?;
        let umgerechnet = umrechnen(&verknüpft, &einstellungen.umzurechnende_spalten())?;
        kest_berechnen(
            &umgerechnet,
            &einstellungen.steuer.betrag,
            einstellungen.steuer.quellensteuer.as_deref(),
        )
    }
}
