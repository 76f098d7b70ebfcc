//! Fehlertypen der Session-Registry

use kybervpn_core::{FehlerArt, Klassifiziert};
use thiserror::Error;

/// Alle moeglichen Fehler der Session-Registry
#[derive(Debug, Error)]
pub enum AuthError {
    // --- Passwort ---
    #[error("Passwort-Hashing fehlgeschlagen: {0}")]
    PasswortHashing(String),

    // --- Registrierung ---
    #[error("Benutzername bereits vergeben: {0}")]
    BenutzernameVergeben(String),

    #[error("Ungueltige Eingabe: {0}")]
    UngueltigeEingabe(String),

    // --- Authentifizierung ---
    #[error("Adresse {0} liegt nicht im VPN-Subnetz")]
    NichtImVpn(String),

    #[error("Ungueltige Adresse: {0}")]
    UngueltigeAdresse(String),

    #[error("Benutzer nicht gefunden: {0}")]
    BenutzerNichtGefunden(String),

    #[error("Benutzername oder Passwort falsch")]
    UngueltigeAnmeldedaten,

    // --- Token / Session ---
    /// Sammelfehler fuer jede fehlgeschlagene Token-Pruefung
    #[error("Token ungueltig oder abgelaufen")]
    TokenUngueltig,

    #[error("Session nicht gefunden: {0}")]
    SessionNichtGefunden(String),

    // --- Intern ---
    #[error("Interner Fehler: {0}")]
    Intern(String),
}

impl AuthError {
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }
}

impl Klassifiziert for AuthError {
    fn art(&self) -> FehlerArt {
        match self {
            Self::BenutzernameVergeben(_) | Self::UngueltigeEingabe(_) => {
                FehlerArt::UngueltigerParameter
            }
            Self::NichtImVpn(_)
            | Self::UngueltigeAdresse(_)
            | Self::UngueltigeAnmeldedaten
            | Self::TokenUngueltig => FehlerArt::AuthentifizierungFehlgeschlagen,
            Self::BenutzerNichtGefunden(_) | Self::SessionNichtGefunden(_) => FehlerArt::NichtGefunden,
            Self::PasswortHashing(_) | Self::Intern(_) => FehlerArt::HandshakeFehlgeschlagen,
        }
    }
}

/// Result-Alias fuer die Session-Registry
pub type AuthResult<T> = Result<T, AuthError>;
