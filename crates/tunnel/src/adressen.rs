//! Adressvergabe im VPN-Subnetz
//!
//! Vergeben wird immer die niedrigste freie Host-Adresse. Netzadresse,
//! Broadcast und die Gateway-Adresse (VPN-Server) sind ausgenommen.

use std::collections::BTreeSet;
use std::net::Ipv4Addr;

use kybervpn_core::VpnSubnetz;
use parking_lot::Mutex;

use crate::error::{TunnelError, TunnelResult};

#[derive(Debug)]
pub struct AdressPool {
    subnetz: VpnSubnetz,
    gateway: Ipv4Addr,
    vergeben: Mutex<BTreeSet<Ipv4Addr>>,
}

impl AdressPool {
    pub fn neu(subnetz: VpnSubnetz, gateway: Ipv4Addr) -> Self {
        Self {
            subnetz,
            gateway,
            vergeben: Mutex::new(BTreeSet::new()),
        }
    }

    /// Reserviert die niedrigste freie Adresse
    pub fn zuweisen(&self) -> TunnelResult<Ipv4Addr> {
        let mut vergeben = self.vergeben.lock();
        let frei = self
            .subnetz
            .hosts()
            .find(|ip| *ip != self.gateway && !vergeben.contains(ip))
            .ok_or_else(|| TunnelError::AdressraumErschoepft(self.subnetz.to_string()))?;
        vergeben.insert(frei);
        Ok(frei)
    }

    /// Gibt eine Adresse zurueck in den Pool. Unbekannte Adressen werden ignoriert.
    pub fn freigeben(&self, adresse: Ipv4Addr) {
        if !self.vergeben.lock().remove(&adresse) {
            tracing::debug!(adresse = %adresse, "Freigabe einer nicht vergebenen Adresse");
        }
    }

    pub fn anzahl_vergeben(&self) -> usize {
        self.vergeben.lock().len()
    }
}
