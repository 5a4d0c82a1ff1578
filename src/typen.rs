use std::collections::BTreeMap;

pub use chrono::naive::NaiveDate as Datum;
pub use smol_str::SmolStr as String;

pub type Zahl = f64;

/// Die Berichtswährung, in die alle Beträge umgerechnet werden.
pub const HEIMWÄHRUNG: &str = "EUR";

/// Benannte Betragsspalten einer Zeile, etwa `amount` oder `withholding_tax`.
pub type Beträge = BTreeMap<String, Zahl>;

/// Benannte Textspalten, die unverändert durch die Berechnung gereicht werden.
pub type Merkmale = BTreeMap<String, std::string::String>;

pub fn ist_heimwährung(währung: &str) -> bool {
    währung == HEIMWÄHRUNG
}

/// Ein veröffentlichter Tageskurs: so viele Einheiten der Fremdwährung
/// entsprechen einem Euro.
#[derive(Debug, Clone, PartialEq)]
pub struct Wechselkurs {
    pub kurs_datum: Datum,
    pub währung: String,
    pub währung_nenner: String,
    pub kurs: Zahl,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Buchung {
    /// Das Datum, zu dem der Wechselkurs gesucht wird.
    pub datum: Datum,
    pub währung: String,
    pub beträge: Beträge,
    pub merkmale: Merkmale,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VerknüpfteBuchung {
    pub buchung: Buchung,
    pub kurs_datum: Option<Datum>,
    pub kurs: Option<Zahl>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UmgerechneteBuchung {
    pub verknüpft: VerknüpfteBuchung,
    /// Die umgerechneten Spalten, unter dem Namen der Ausgangsspalte.
    pub euro: Beträge,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VersteuerteBuchung {
    pub umgerechnet: UmgerechneteBuchung,
    pub betrag_spalte: String,
    pub quellensteuer_spalte: Option<String>,
    pub kest_brutto: Zahl,
    pub kest_netto: Zahl,
    pub betrag_netto: Zahl,
}

impl Buchung {
    pub fn new(datum: Datum, währung: impl Into<String>) -> Self {
        Self {
            datum,
            währung: währung.into(),
            beträge: Default::default(),
            merkmale: Default::default(),
        }
    }

    pub fn mit_betrag(mut self, spalte: impl Into<String>, betrag: Zahl) -> Self {
        self.beträge.insert(spalte.into(), betrag);
        self
    }

    pub fn mit_merkmal(
        mut self,
        spalte: impl Into<String>,
        wert: impl Into<std::string::String>,
    ) -> Self {
        self.merkmale.insert(spalte.into(), wert.into());
        self
    }

    pub fn betrag(&self, spalte: &str) -> Option<Zahl> {
        self.beträge.get(spalte).copied()
    }
}

impl VerknüpfteBuchung {
    pub fn datum(&self) -> Datum {
        self.buchung.datum
    }

    pub fn währung(&self) -> &str {
        &self.buchung.währung
    }
}

impl UmgerechneteBuchung {
    pub fn buchung(&self) -> &Buchung {
        &self.verknüpft.buchung
    }

    pub fn euro(&self, spalte: &str) -> Option<Zahl> {
        self.euro.get(spalte).copied()
    }
}

impl VersteuerteBuchung {
    pub fn buchung(&self) -> &Buchung {
        self.umgerechnet.buchung()
    }

    pub fn betrag_euro(&self) -> Zahl {
        self.umgerechnet
            .euro(&self.betrag_spalte)
            .unwrap_or_default()
    }

    pub fn quellensteuer_euro(&self) -> Zahl {
        self.quellensteuer_spalte
            .as_deref()
            .and_then(|spalte| self.umgerechnet.euro(spalte))
            .unwrap_or_default()
    }
}

/// Rundet auf die angegebene Anzahl an Nachkommastellen.
pub fn runde(zahl: Zahl, stellen: u32) -> Zahl {
    let faktor = 10_f64.powi(stellen as i32);
    (zahl * faktor).round() / faktor
}
