//! Gemeinsame Identifikationstypen fuer Kyber-VPN
//!
//! Alle IDs verwenden das Newtype-Pattern um Verwechslungen zwischen
//! verschiedenen ID-Arten zur Compilezeit auszuschliessen.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Authentifizierter Prinzipal (entspricht dem Benutzernamen)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identitaet(pub String);

impl Identitaet {
    pub fn neu(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn als_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identitaet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identitaet {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Eindeutige Session-ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Erstellt eine neue zufaellige SessionId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Gibt die innere UUID zurueck
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Raum-ID (`general`, `private_a_b_1f2e3d4c`, `group_...`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RaumId(pub String);

impl RaumId {
    pub fn neu(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn als_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RaumId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Eindeutige Nachrichten-ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NachrichtId(pub Uuid);

impl NachrichtId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NachrichtId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NachrichtId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// ID eines VPN-Servers aus dem Katalog (`server1`, ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerId(pub String);

impl ServerId {
    pub fn neu(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn als_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
