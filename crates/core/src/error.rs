//! Fehler-Taxonomie fuer Kyber-VPN
//!
//! Jedes Crate definiert einen eigenen Fehler-Enum. Ueber den Trait
//! [`Klassifiziert`] ordnet sich jeder Fehler genau einer [`FehlerArt`] zu,
//! sodass die Transportschicht Fehler abbilden kann ohne das Crate zu kennen.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Die sieben Fehlerklassen des Kerns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FehlerArt {
    /// Ungueltige Eingabe (Laenge, Format, Stufe, doppelter Benutzername)
    UngueltigerParameter,
    /// KEM-Handshake fehlgeschlagen, kein Kanal aufgebaut
    HandshakeFehlgeschlagen,
    /// Tag-Pruefung, Passwort oder Netzzugehoerigkeit fehlgeschlagen
    AuthentifizierungFehlgeschlagen,
    /// Identitaet ist nicht berechtigt
    AutorisierungFehlgeschlagen,
    /// Server, Benutzer, Raum oder Session existiert nicht
    NichtGefunden,
    /// Operation im aktuellen Zustand nicht erlaubt
    Zustandskonflikt,
    /// Zustellung an eine einzelne Senke fehlgeschlagen
    ZustellungFehlgeschlagen,
}

impl FehlerArt {
    /// HTTP-Statuscode fuer die REST-Schicht
    pub fn http_status(&self) -> u16 {
        match self {
            Self::UngueltigerParameter => 400,
            Self::AuthentifizierungFehlgeschlagen => 401,
            Self::AutorisierungFehlgeschlagen => 403,
            Self::NichtGefunden => 404,
            Self::Zustandskonflikt => 409,
            Self::HandshakeFehlgeschlagen => 502,
            Self::ZustellungFehlgeschlagen => 503,
        }
    }

    /// Gibt true zurueck wenn der Fehler lokal behandelt wird (loggen, weitermachen)
    pub fn ist_lokal_behebbar(&self) -> bool {
        matches!(self, Self::ZustellungFehlgeschlagen)
    }

    /// Stabiler Bezeichner fuer Logs und JSON-Antworten
    pub fn als_str(&self) -> &'static str {
        match self {
            Self::UngueltigerParameter => "invalid_parameter",
            Self::HandshakeFehlgeschlagen => "handshake_failure",
            Self::AuthentifizierungFehlgeschlagen => "authentication_failure",
            Self::AutorisierungFehlgeschlagen => "authorization_failure",
            Self::NichtGefunden => "not_found",
            Self::Zustandskonflikt => "state_conflict",
            Self::ZustellungFehlgeschlagen => "transient_delivery_failure",
        }
    }
}

impl fmt::Display for FehlerArt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.als_str())
    }
}

/// Ordnet einen crate-spezifischen Fehler seiner [`FehlerArt`] zu
pub trait Klassifiziert {
    fn art(&self) -> FehlerArt;
}
