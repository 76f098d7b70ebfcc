//! IPv4-Subnetz des VPN (CIDR-Notation)
//!
//! Das Subnetz bestimmt welche Adressen als "im VPN" gelten und aus welchem
//! Bereich Client-Adressen vergeben werden.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use thiserror::Error;

/// Fehler beim Parsen eines Subnetzes
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubnetzFehler {
    #[error("Ungueltige CIDR-Notation: {0}")]
    UngueltigeNotation(String),

    #[error("Ungueltige Praefixlaenge: {0}")]
    UngueltigesPraefix(u8),
}

/// IPv4-Netz, z.B. `10.8.0.0/24`
///
/// Die Netzadresse wird beim Parsen auf die Maske normalisiert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VpnSubnetz {
    netz: Ipv4Addr,
    praefix: u8,
}

impl VpnSubnetz {
    pub fn neu(adresse: Ipv4Addr, praefix: u8) -> Result<Self, SubnetzFehler> {
        if praefix > 32 {
            return Err(SubnetzFehler::UngueltigesPraefix(praefix));
        }
        let maske = maske_fuer(praefix);
        Ok(Self {
            netz: Ipv4Addr::from(u32::from(adresse) & maske),
            praefix,
        })
    }

    pub fn netzadresse(&self) -> Ipv4Addr {
        self.netz
    }

    pub fn praefix(&self) -> u8 {
        self.praefix
    }

    pub fn broadcast(&self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.netz) | !maske_fuer(self.praefix))
    }

    /// Erste Host-Adresse (Gateway / VPN-Server-IP)
    pub fn gateway(&self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.netz).saturating_add(1))
    }

    /// Prueft ob eine IPv4-Adresse im Subnetz liegt
    pub fn enthaelt(&self, adresse: Ipv4Addr) -> bool {
        let maske = maske_fuer(self.praefix);
        u32::from(adresse) & maske == u32::from(self.netz)
    }

    /// Alle nutzbaren Host-Adressen ohne Netz- und Broadcast-Adresse
    pub fn hosts(&self) -> impl Iterator<Item = Ipv4Addr> {
        let start = u32::from(self.netz);
        let ende = u32::from(self.broadcast());
        let (erster, letzter) = if self.praefix >= 31 {
            (start, ende)
        } else {
            (start + 1, ende - 1)
        };
        (erster..=letzter).map(Ipv4Addr::from)
    }
}

fn maske_fuer(praefix: u8) -> u32 {
    if praefix == 0 {
        0
    } else {
        u32::MAX << (32 - u32::from(praefix))
    }
}

impl FromStr for VpnSubnetz {
    type Err = SubnetzFehler;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (adresse, praefix) = s
            .trim()
            .split_once('/')
            .ok_or_else(|| SubnetzFehler::UngueltigeNotation(s.to_string()))?;
        let adresse: Ipv4Addr = adresse
            .parse()
            .map_err(|_| SubnetzFehler::UngueltigeNotation(s.to_string()))?;
        let praefix: u8 = praefix
            .parse()
            .map_err(|_| SubnetzFehler::UngueltigeNotation(s.to_string()))?;
        Self::neu(adresse, praefix)
    }
}

impl TryFrom<String> for VpnSubnetz {
    type Error = SubnetzFehler;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<VpnSubnetz> for String {
    fn from(s: VpnSubnetz) -> Self {
        s.to_string()
    }
}

impl fmt::Display for VpnSubnetz {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.netz, self.praefix)
    }
}
