//! # kybervpn-tunnel
//!
//! Lebenszyklus einer VPN-Verbindung: Server-Katalog, Adressvergabe im
//! Tunnel-Subnetz, KEM-Handshake bis zum symmetrischen Kanal und die
//! periodische Verbindungs-Telemetrie.
//!
//! ## Module
//! - `katalog` - Statische Server-Liste
//! - `adressen` - Vergabe der Tunnel-Adressen
//! - `lifecycle` - State Machine Getrennt/Verbindend/Verbunden/Trennend
//! - `telemetrie` - Zaehler und Tick-Task pro Verbindung
//! - `error` - Fehlertypen

pub mod adressen;
pub mod error;
pub mod katalog;
pub mod lifecycle;
pub mod telemetrie;

pub use adressen::AdressPool;
pub use error::{TunnelError, TunnelResult};
pub use katalog::{standard_server, ServerEintrag, ServerKatalog, ServerStatus};
pub use lifecycle::{TunnelKonfig, VerbindungsInfo, VerbindungsManager, VerbindungsZustand, VpnStatus};
pub use telemetrie::{Verbindungszaehler, TELEMETRIE_INTERVALL};
