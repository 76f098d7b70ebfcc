//! kybervpn-core – Gemeinsame Typen, Fehler-Taxonomie und Subnetz-Logik
//!
//! Dieses Crate stellt die fundamentalen Bausteine bereit, die von allen
//! anderen Kyber-VPN-Crates gemeinsam genutzt werden.

pub mod error;
pub mod netz;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use error::{FehlerArt, Klassifiziert};
pub use netz::{SubnetzFehler, VpnSubnetz};
pub use types::{Identitaet, NachrichtId, RaumId, ServerId, SessionId};
