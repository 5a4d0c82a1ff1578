pub mod abgleich;
pub mod berechnung;
pub mod cache;
pub mod fehler;
pub mod format;
pub mod konfig;
pub mod schreiber;
pub mod steuern;
pub mod tabellen;
pub mod tsv;
pub mod typen;
pub mod umrechnung;
pub mod waehrungen;
pub mod zusammenfassung;

pub use typen::*;
