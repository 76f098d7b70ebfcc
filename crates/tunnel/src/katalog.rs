//! Server-Katalog
//!
//! Statische Liste der VPN-Server aus der Konfiguration. Der Katalog
//! aendert sich zur Laufzeit nicht.

use kybervpn_core::ServerId;
use serde::{Deserialize, Serialize};

/// Betriebszustand eines Servers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    #[default]
    Online,
    Offline,
    Maintenance,
}

/// Ein Eintrag im Server-Katalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerEintrag {
    pub id: ServerId,
    pub name: String,
    #[serde(rename = "location")]
    pub standort: String,
    pub ip: String,
    pub port: u16,
    #[serde(default)]
    pub status: ServerStatus,
    /// Basis-Latenz in Millisekunden
    #[serde(rename = "latency")]
    pub basis_latenz_ms: u32,
}

/// Unveraenderliche Liste aller bekannten Server
#[derive(Debug, Clone, Default)]
pub struct ServerKatalog {
    eintraege: Vec<ServerEintrag>,
}

impl ServerKatalog {
    pub fn neu(eintraege: Vec<ServerEintrag>) -> Self {
        Self { eintraege }
    }

    /// Katalog mit den drei Standard-Servern
    pub fn standard() -> Self {
        Self::neu(standard_server())
    }

    /// Sucht einen Server anhand seiner ID
    pub fn finden(&self, id: &ServerId) -> Option<&ServerEintrag> {
        self.eintraege.iter().find(|s| &s.id == id)
    }

    pub fn alle(&self) -> &[ServerEintrag] {
        &self.eintraege
    }

    pub fn len(&self) -> usize {
        self.eintraege.len()
    }

    pub fn is_empty(&self) -> bool {
        self.eintraege.is_empty()
    }
}

/// Standard-Server (auch Default der Konfiguration)
pub fn standard_server() -> Vec<ServerEintrag> {
    [
        ("server1", "Servidor Principal", "Madrid, España", "192.168.1.1", 25),
        ("server2", "Servidor Respaldo", "Barcelona, España", "192.168.1.2", 35),
        ("server3", "Servidor Internacional", "Frankfurt, Alemania", "192.168.1.3", 50),
    ]
    .into_iter()
    .map(|(id, name, standort, ip, latenz)| ServerEintrag {
        id: ServerId::neu(id),
        name: name.to_string(),
        standort: standort.to_string(),
        ip: ip.to_string(),
        port: 1194,
        status: ServerStatus::Online,
        basis_latenz_ms: latenz,
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_katalog() {
        let katalog = ServerKatalog::standard();
        assert_eq!(katalog.len(), 3);
        let s2 = katalog.finden(&ServerId::neu("server2")).unwrap();
        assert_eq!(s2.basis_latenz_ms, 35);
        assert_eq!(s2.port, 1194);
        assert!(katalog.finden(&ServerId::neu("server9")).is_none());
    }

    #[test]
    fn wire_format() {
        let katalog = ServerKatalog::standard();
        let json = serde_json::to_value(&katalog.alle()[0]).unwrap();
        assert_eq!(json["id"], "server1");
        assert_eq!(json["location"], "Madrid, España");
        assert_eq!(json["status"], "online");
        assert_eq!(json["latency"], 25);
    }
}
