//! kybervpn-chat – Raeume und Echtzeit-Verteilung
//!
//! Dieses Crate implementiert:
//! - RaumRegister: Raeume, Teilnehmer und Nachrichten im Speicher
//! - RaumDienst: Direkt- und Gruppenraeume, Nachrichten posten/laden,
//!   Gelesen-Markierung, Verteilung an alle verbundenen Teilnehmer
//! - FrameSenke-Trait + KanalSenke (begrenzte mpsc-Queue pro Verbindung)
//! - Echtzeit-Frames (`message`, `typing` / `message_sent`, `new_message`, ...)
//!
//! Direktraeume bekommen ueber einen eigenen KEM-Handshake einen
//! Raumschluessel; ihre Nachrichten liegen nur versiegelt im Speicher.

pub mod dienst;
pub mod error;
pub mod frames;
pub mod raeume;
pub mod senke;
pub mod types;

#[cfg(test)]
mod tests;

// Bequeme Re-Exporte
pub use dienst::{RaumDienst, FEHLER_NICHT_GESENDET};
pub use error::{ChatError, ChatResult, ZustellFehler};
pub use frames::{AusgangsFrame, EingangsFrame};
pub use raeume::RaumRegister;
pub use senke::{FrameSenke, KanalSenke, SEND_QUEUE_GROESSE};
pub use types::{Nachricht, Raum, ZustellBericht, MAX_LIMIT, STANDARD_LIMIT, STANDARD_RAUM};
