//! Fehlertypen fuer den Verbindungs-Lebenszyklus

use kybervpn_core::{FehlerArt, Klassifiziert};
use kybervpn_crypto::CryptoError;
use thiserror::Error;

/// Fehler beim Auf- und Abbau des Tunnels
#[derive(Debug, Error)]
pub enum TunnelError {
    #[error("Server nicht gefunden: {0}")]
    ServerNichtGefunden(String),

    #[error("Bereits verbunden mit {0}")]
    BereitsVerbunden(String),

    #[error("Verbindungsaufbau laeuft bereits")]
    VerbindungLaeuft,

    #[error("Verbindung wird gerade getrennt")]
    TrennungLaeuft,

    #[error("Keine aktive Verbindung")]
    NichtVerbunden,

    #[error("Verbindungsaufbau wurde abgebrochen")]
    VerbindungAbgebrochen,

    #[error("Adressraum {0} erschoepft")]
    AdressraumErschoepft(String),

    #[error("Kryptografie-Fehler: {0}")]
    Krypto(#[from] CryptoError),

    #[error("Interner Fehler: {0}")]
    Intern(String),
}

impl TunnelError {
    /// Erstellt einen internen Fehler aus einer beliebigen Nachricht
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }
}

impl Klassifiziert for TunnelError {
    fn art(&self) -> FehlerArt {
        match self {
            Self::ServerNichtGefunden(_) => FehlerArt::NichtGefunden,
            Self::BereitsVerbunden(_)
            | Self::VerbindungLaeuft
            | Self::TrennungLaeuft
            | Self::NichtVerbunden
            | Self::VerbindungAbgebrochen
            | Self::AdressraumErschoepft(_) => FehlerArt::Zustandskonflikt,
            Self::Krypto(e) => e.art(),
            Self::Intern(_) => FehlerArt::HandshakeFehlgeschlagen,
        }
    }
}

pub type TunnelResult<T> = Result<T, TunnelError>;
