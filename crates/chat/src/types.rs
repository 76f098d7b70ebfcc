//! Oeffentliche Typen fuer den Raum-Dienst

use chrono::{DateTime, Utc};
use kybervpn_core::{Identitaet, NachrichtId, RaumId};
use serde::{Deserialize, Serialize};

/// ID des Standardraums, dem jeder Benutzer bei der Registrierung beitritt
pub const STANDARD_RAUM: &str = "general";

/// Anzahl Nachrichten, wenn kein Limit angegeben ist
pub const STANDARD_LIMIT: usize = 50;

/// Obergrenze fuer ein Nachrichten-Limit
pub const MAX_LIMIT: usize = 100;

/// Maximale Laenge eines Nachrichteninhalts in Bytes
pub const MAX_INHALT_LAENGE: usize = 4096;

/// Eine Chat-Nachricht wie sie an Clients geht
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nachricht {
    pub id: NachrichtId,
    pub sender: Identitaet,
    pub room_id: RaumId,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub read_by: Vec<Identitaet>,
}

/// Momentaufnahme eines Raums
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Raum {
    pub id: RaumId,
    pub name: String,
    pub is_group: bool,
    pub participants: Vec<Identitaet>,
    pub created_at: DateTime<Utc>,
    /// Nur bei Raeumen mit eigenem Schluessel
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_fingerprint: Option<String>,
}

/// Ergebnis einer Verteilung an mehrere Senken
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ZustellBericht {
    pub zugestellt: usize,
    pub fehlgeschlagen: usize,
}

impl ZustellBericht {
    pub fn zusammenfuehren(self, anderer: ZustellBericht) -> Self {
        Self {
            zugestellt: self.zugestellt + anderer.zugestellt,
            fehlgeschlagen: self.fehlgeschlagen + anderer.fehlgeschlagen,
        }
    }
}
