//! Fehlertypen fuer das Chat-Crate

use kybervpn_core::{FehlerArt, Klassifiziert};
use kybervpn_crypto::CryptoError;
use thiserror::Error;

/// Chat-Fehlertypen
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Raum nicht gefunden: {0}")]
    RaumNichtGefunden(String),

    #[error("Benutzer nicht gefunden: {0}")]
    BenutzerNichtGefunden(String),

    #[error("Nachricht nicht gefunden: {0}")]
    NachrichtNichtGefunden(String),

    #[error("{identitaet} ist kein Teilnehmer von {raum}")]
    KeinTeilnehmer { identitaet: String, raum: String },

    #[error("Session unbekannt oder abgelaufen: {0}")]
    SessionUnbekannt(String),

    #[error("Ungueltige Eingabe: {0}")]
    UngueltigeEingabe(String),

    #[error("Zustellung fehlgeschlagen: {0}")]
    Zustellung(#[from] ZustellFehler),

    #[error("Kryptografie-Fehler: {0}")]
    Krypto(#[from] CryptoError),
}

/// Fehler beim Einreihen eines Frames in eine Senke
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ZustellFehler {
    #[error("Send-Queue voll")]
    QueueVoll,

    #[error("Verbindung geschlossen")]
    Geschlossen,
}

impl Klassifiziert for ChatError {
    fn art(&self) -> FehlerArt {
        match self {
            Self::RaumNichtGefunden(_)
            | Self::BenutzerNichtGefunden(_)
            | Self::NachrichtNichtGefunden(_) => FehlerArt::NichtGefunden,
            Self::KeinTeilnehmer { .. } => FehlerArt::AutorisierungFehlgeschlagen,
            Self::SessionUnbekannt(_) => FehlerArt::AuthentifizierungFehlgeschlagen,
            Self::UngueltigeEingabe(_) => FehlerArt::UngueltigerParameter,
            Self::Zustellung(_) => FehlerArt::ZustellungFehlgeschlagen,
            Self::Krypto(e) => e.art(),
        }
    }
}

impl Klassifiziert for ZustellFehler {
    fn art(&self) -> FehlerArt {
        FehlerArt::ZustellungFehlgeschlagen
    }
}

pub type ChatResult<T> = Result<T, ChatError>;
