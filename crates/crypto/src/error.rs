//! Fehlertypen fuer das Kryptografie-Subsystem

use kybervpn_core::{FehlerArt, Klassifiziert};
use thiserror::Error;

/// Fehler im Kryptografie-Subsystem
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Ungueltige Sicherheitsstufe: {0} (erlaubt: 1, 3, 5)")]
    UngueltigeStufe(u8),

    #[error("Ungueltige Schluessel-Laenge: erwartet {erwartet}, erhalten {erhalten}")]
    UngueltigeSchluesselLaenge { erwartet: usize, erhalten: usize },

    #[error("Ungueltige Nonce-Laenge: erwartet {erwartet}, erhalten {erhalten}")]
    UngueltigeNonce { erwartet: usize, erhalten: usize },

    #[error("Ungueltiger KEM-Ciphertext: erwartet {erwartet} Bytes, erhalten {erhalten}")]
    UngueltigerCiphertext { erwartet: usize, erhalten: usize },

    #[error("Handshake fehlgeschlagen: {0}")]
    Handshake(String),

    #[error("Verschluesselung fehlgeschlagen: {0}")]
    Verschluesselung(String),

    /// Bewusst ohne Details: Tag-Fehler und manipulierte Daten sind nicht unterscheidbar
    #[error("Entschluesselung fehlgeschlagen")]
    Entschluesselung,

    #[error("Nachrichtenlimit fuer diesen Schluessel erreicht ({limit})")]
    NonceLimitErreicht { limit: u64 },

    #[error("Key Derivation fehlgeschlagen: {0}")]
    KeyDerivation(String),

    #[error("Base64-Dekodierung fehlgeschlagen: {0}")]
    Base64(#[from] base64::DecodeError),
}

pub type CryptoResult<T> = Result<T, CryptoError>;

impl Klassifiziert for CryptoError {
    fn art(&self) -> FehlerArt {
        match self {
            Self::UngueltigeStufe(_)
            | Self::UngueltigeSchluesselLaenge { .. }
            | Self::UngueltigeNonce { .. }
            | Self::Verschluesselung(_)
            | Self::NonceLimitErreicht { .. }
            | Self::Base64(_) => FehlerArt::UngueltigerParameter,
            Self::UngueltigerCiphertext { .. } | Self::Handshake(_) | Self::KeyDerivation(_) => {
                FehlerArt::HandshakeFehlgeschlagen
            }
            Self::Entschluesselung => FehlerArt::AuthentifizierungFehlgeschlagen,
        }
    }
}
