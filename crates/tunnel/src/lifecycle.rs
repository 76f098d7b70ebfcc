//! Verbindungs-Lebenszyklus des VPN-Tunnels
//!
//! ## State Machine
//! ```text
//!            connect()                 Handshake ok
//! Getrennt ------------> Verbindend --------------> Verbunden
//!    ^                      |                           |
//!    |   Fehler/Abbruch     |                           | disconnect()
//!    +----------------------+                           v
//!    +--------------------------------------------- Trennend
//! ```
//!
//! - `connect` ist nur aus `Getrennt` erlaubt, sonst `Zustandskonflikt`.
//! - Schlaegt ein Schritt in `connect` fehl, wird alles zurueckgerollt.
//!   Ein halb aufgebauter `Verbunden`-Zustand ist nie sichtbar.
//! - `disconnect` aus `Getrennt` ist ein No-op. Aus `Verbindend` bricht es den
//!   Aufbau ab und kehrt erst zurueck, wenn der Aufbau seine Adresse
//!   zurueckgegeben hat; bis dahin ist der Zustand `Trennend`. Aus `Verbunden`
//!   wird der Telemetrie-Task beendet und abgewartet, bevor Adresse und
//!   Kanalschluessel freigegeben werden.
//!
//! Der Zustand liegt hinter einem `parking_lot::Mutex`, der nie ueber ein
//! `.await` gehalten wird.

use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use kybervpn_core::ServerId;
use kybervpn_crypto::{handshake_durchfuehren, EncryptedPayload, KemManager, SymmetricChannel, KONTEXT_TUNNEL};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::adressen::AdressPool;
use crate::error::{TunnelError, TunnelResult};
use crate::katalog::{ServerEintrag, ServerKatalog};
use crate::telemetrie::{self, Verbindungszaehler};

// ---------------------------------------------------------------------------
// Oeffentliche Typen
// ---------------------------------------------------------------------------

/// Beobachtbarer Zustand der Verbindung
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerbindungsZustand {
    Getrennt,
    Verbindend,
    Verbunden,
    Trennend,
}

/// Ergebnis eines erfolgreichen `connect`
#[derive(Debug, Clone, Serialize)]
pub struct VerbindungsInfo {
    pub server: ServerEintrag,
    pub vpn_ip: Ipv4Addr,
    pub algorithmus: &'static str,
    pub hergestellt_am: DateTime<Utc>,
}

/// Momentaufnahme fuer `GET /status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VpnStatus {
    pub connected: bool,
    /// Sekunden seit Verbindungsaufbau
    pub uptime: u64,
    #[serde(rename = "bytesReceived")]
    pub bytes_received: u64,
    #[serde(rename = "bytesSent")]
    pub bytes_sent: u64,
    pub latency: u32,
    #[serde(rename = "vpnIp")]
    pub vpn_ip: Option<String>,
    pub server_id: Option<ServerId>,
}

impl VpnStatus {
    fn getrennt() -> Self {
        Self {
            connected: false,
            uptime: 0,
            bytes_received: 0,
            bytes_sent: 0,
            latency: 0,
            vpn_ip: None,
            server_id: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Interner Zustand
// ---------------------------------------------------------------------------

enum Zustand {
    Getrennt,
    Verbindend { versuch: u64 },
    Verbunden(Box<AktiveVerbindung>),
    Trennend,
    /// `disconnect` waehrend `Verbindend`; der Rollback-Guard beendet ihn
    Abbrechend { versuch: u64 },
}

impl Zustand {
    fn tag(&self) -> VerbindungsZustand {
        match self {
            Self::Getrennt => VerbindungsZustand::Getrennt,
            Self::Verbindend { .. } => VerbindungsZustand::Verbindend,
            Self::Verbunden(_) => VerbindungsZustand::Verbunden,
            Self::Trennend | Self::Abbrechend { .. } => VerbindungsZustand::Trennend,
        }
    }
}

struct AktiveVerbindung {
    server: ServerEintrag,
    verbunden_seit: Instant,
    vpn_ip: Ipv4Addr,
    kanal: Arc<SymmetricChannel>,
    zaehler: Arc<Verbindungszaehler>,
    abbruch: CancellationToken,
    telemetrie: Option<JoinHandle<()>>,
}

impl Drop for AktiveVerbindung {
    fn drop(&mut self) {
        // Der Telemetrie-Task darf die Verbindung nie ueberleben
        self.abbruch.cancel();
    }
}

// ---------------------------------------------------------------------------
// VerbindungsManager
// ---------------------------------------------------------------------------

/// Konfiguration des Verbindungs-Managers
#[derive(Debug, Clone)]
pub struct TunnelKonfig {
    pub katalog: ServerKatalog,
    pub kem: KemManager,
    pub adressen: Arc<AdressPool>,
    pub telemetrie_intervall: Duration,
}

/// Verwaltet genau eine Tunnel-Verbindung
///
/// Thread-safe. Clone teilt den inneren Zustand.
#[derive(Clone)]
pub struct VerbindungsManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    katalog: ServerKatalog,
    kem: KemManager,
    adressen: Arc<AdressPool>,
    telemetrie_intervall: Duration,
    zustand: Mutex<Zustand>,
    naechster_versuch: AtomicU64,
    /// Meldet das Ende eines abgebrochenen Aufbaus
    abbruch_fertig: Notify,
}

impl VerbindungsManager {
    pub fn neu(konfig: TunnelKonfig) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                katalog: konfig.katalog,
                kem: konfig.kem,
                adressen: konfig.adressen,
                telemetrie_intervall: konfig.telemetrie_intervall,
                zustand: Mutex::new(Zustand::Getrennt),
                naechster_versuch: AtomicU64::new(1),
                abbruch_fertig: Notify::new(),
            }),
        }
    }

    pub fn katalog(&self) -> &ServerKatalog {
        &self.inner.katalog
    }

    pub fn zustand(&self) -> VerbindungsZustand {
        self.inner.zustand.lock().tag()
    }

    /// Baut die Verbindung zum angegebenen Server auf
    pub async fn connect(&self, server_id: &ServerId) -> TunnelResult<VerbindungsInfo> {
        let (versuch, server) = {
            let mut zustand = self.inner.zustand.lock();
            match &*zustand {
                Zustand::Getrennt => {}
                Zustand::Verbindend { .. } => return Err(TunnelError::VerbindungLaeuft),
                Zustand::Verbunden(v) => {
                    return Err(TunnelError::BereitsVerbunden(v.server.id.to_string()))
                }
                Zustand::Trennend | Zustand::Abbrechend { .. } => {
                    return Err(TunnelError::TrennungLaeuft)
                }
            }

            let server = self.inner.katalog.finden(server_id).cloned().ok_or_else(|| {
                tracing::warn!(server_id = %server_id, "Server nicht im Katalog");
                TunnelError::ServerNichtGefunden(server_id.to_string())
            })?;

            let versuch = self.inner.naechster_versuch.fetch_add(1, Ordering::Relaxed);
            *zustand = Zustand::Verbindend { versuch };
            (versuch, server)
        };

        tracing::info!(
            server_id = %server.id,
            server = %server.name,
            ip = %server.ip,
            "Verbindungsaufbau gestartet"
        );

        // Ab hier rollt der Guard bei jedem Abbruch zurueck, auch wenn die
        // Future verworfen wird
        let mut guard = VersuchGuard {
            inner: &self.inner,
            versuch,
            adresse: None,
            abgeschlossen: false,
        };

        let kem = self.inner.kem;
        let kanal = tokio::task::spawn_blocking(move || handshake_durchfuehren(&kem, KONTEXT_TUNNEL))
            .await
            .map_err(|e| TunnelError::intern(format!("Handshake-Task: {e}")))??;

        let vpn_ip = self.inner.adressen.zuweisen()?;
        guard.adresse = Some(vpn_ip);

        let info = {
            let mut zustand = self.inner.zustand.lock();
            if !matches!(&*zustand, Zustand::Verbindend { versuch: v } if *v == versuch) {
                // disconnect() hat den Aufbau abgebrochen
                drop(zustand);
                tracing::info!(server_id = %server.id, "Verbindungsaufbau abgebrochen");
                return Err(TunnelError::VerbindungAbgebrochen);
            }

            let zaehler = Arc::new(Verbindungszaehler::neu(server.basis_latenz_ms));
            let abbruch = CancellationToken::new();
            let task = telemetrie::starten(
                zaehler.clone(),
                server.basis_latenz_ms,
                self.inner.telemetrie_intervall,
                abbruch.clone(),
            );

            let info = VerbindungsInfo {
                server: server.clone(),
                vpn_ip,
                algorithmus: self.inner.kem.details().name,
                hergestellt_am: Utc::now(),
            };

            *zustand = Zustand::Verbunden(Box::new(AktiveVerbindung {
                server,
                verbunden_seit: Instant::now(),
                vpn_ip,
                kanal: Arc::new(kanal),
                zaehler,
                abbruch,
                telemetrie: Some(task),
            }));
            guard.abgeschlossen = true;
            info
        };

        tracing::info!(
            server_id = %info.server.id,
            vpn_ip = %info.vpn_ip,
            algorithmus = info.algorithmus,
            "VPN-Verbindung hergestellt"
        );
        Ok(info)
    }

    /// Trennt die Verbindung. Ohne aktive Verbindung ein No-op.
    pub async fn disconnect(&self) -> TunnelResult<()> {
        // Err(versuch): ein laufender Aufbau wurde abgebrochen
        let aktiv = {
            let mut zustand = self.inner.zustand.lock();
            match std::mem::replace(&mut *zustand, Zustand::Getrennt) {
                Zustand::Getrennt => {
                    tracing::debug!("disconnect ohne aktive Verbindung");
                    return Ok(());
                }
                Zustand::Verbindend { versuch } => {
                    // Der laufende connect() bemerkt den Abbruch und rollt zurueck
                    *zustand = Zustand::Abbrechend { versuch };
                    tracing::info!(versuch, "Verbindungsaufbau durch disconnect abgebrochen");
                    Err(versuch)
                }
                alt @ (Zustand::Trennend | Zustand::Abbrechend { .. }) => {
                    *zustand = alt;
                    return Err(TunnelError::TrennungLaeuft);
                }
                Zustand::Verbunden(v) => {
                    *zustand = Zustand::Trennend;
                    Ok(v)
                }
            }
        };

        let mut verbindung = match aktiv {
            Ok(verbindung) => verbindung,
            Err(versuch) => {
                self.abbruch_abwarten(versuch).await;
                return Ok(());
            }
        };

        // Abbau in eigenem Task: wird der Aufrufer verworfen, endet der
        // Zustand trotzdem in Getrennt
        let inner = self.inner.clone();
        let abbau = tokio::spawn(async move {
            verbindung.abbruch.cancel();
            if let Some(task) = verbindung.telemetrie.take() {
                if let Err(e) = task.await {
                    tracing::warn!(fehler = %e, "Telemetrie-Task endete unsauber");
                }
            }

            inner.adressen.freigeben(verbindung.vpn_ip);
            tracing::info!(
                server_id = %verbindung.server.id,
                vpn_ip = %verbindung.vpn_ip,
                bytes_gesendet = verbindung.zaehler.bytes_gesendet(),
                bytes_empfangen = verbindung.zaehler.bytes_empfangen(),
                "VPN-Verbindung getrennt"
            );

            // Kanal (und damit der Schluessel) wird hier verworfen
            drop(verbindung);
            *inner.zustand.lock() = Zustand::Getrennt;
        });

        abbau
            .await
            .map_err(|e| TunnelError::intern(format!("Abbau-Task: {e}")))
    }

    /// Wartet, bis der Rollback-Guard des Versuchs den Zustand freigegeben hat
    async fn abbruch_abwarten(&self, versuch: u64) {
        loop {
            // Vor der Pruefung registrieren, sonst geht eine Meldung verloren
            let benachrichtigt = self.inner.abbruch_fertig.notified();
            tokio::pin!(benachrichtigt);
            benachrichtigt.as_mut().enable();

            let laeuft = matches!(
                &*self.inner.zustand.lock(),
                Zustand::Abbrechend { versuch: v } if *v == versuch
            );
            if !laeuft {
                return;
            }
            benachrichtigt.await;
        }
    }

    /// Nicht-blockierende Momentaufnahme
    pub fn status(&self) -> VpnStatus {
        let zustand = self.inner.zustand.lock();
        match &*zustand {
            Zustand::Verbunden(v) => VpnStatus {
                connected: true,
                uptime: v.verbunden_seit.elapsed().as_secs(),
                bytes_received: v.zaehler.bytes_empfangen(),
                bytes_sent: v.zaehler.bytes_gesendet(),
                latency: v.zaehler.latenz_ms(),
                vpn_ip: Some(v.vpn_ip.to_string()),
                server_id: Some(v.server.id.clone()),
            },
            _ => VpnStatus::getrennt(),
        }
    }

    /// Verschluesselt ein ausgehendes Paket ueber den Tunnel-Kanal
    pub fn paket_verschluesseln(&self, payload: &[u8]) -> TunnelResult<EncryptedPayload> {
        let (kanal, zaehler) = self.aktiver_kanal()?;
        let paket = kanal.encrypt(payload, None)?;
        if let Err(e) = zaehler.gesendet_addieren(paket.ciphertext.len() as u64) {
            tracing::warn!(fehler = %e, "Sendezaehler nicht aktualisiert");
        }
        Ok(paket)
    }

    /// Entschluesselt ein eingehendes Paket. Manipulierte Pakete werden verworfen.
    pub fn paket_entschluesseln(&self, paket: &EncryptedPayload) -> TunnelResult<Vec<u8>> {
        let (kanal, zaehler) = self.aktiver_kanal()?;
        let klartext = kanal.decrypt_payload(paket, None).map_err(|e| {
            tracing::warn!("Paket mit ungueltigem Auth-Tag verworfen");
            e
        })?;
        if let Err(e) = zaehler.empfangen_addieren(paket.ciphertext.len() as u64) {
            tracing::warn!(fehler = %e, "Empfangszaehler nicht aktualisiert");
        }
        Ok(klartext)
    }

    fn aktiver_kanal(&self) -> TunnelResult<(Arc<SymmetricChannel>, Arc<Verbindungszaehler>)> {
        match &*self.inner.zustand.lock() {
            Zustand::Verbunden(v) => Ok((v.kanal.clone(), v.zaehler.clone())),
            _ => Err(TunnelError::NichtVerbunden),
        }
    }
}

// ---------------------------------------------------------------------------
// Rollback-Guard
// ---------------------------------------------------------------------------

/// Rollt einen unvollstaendigen Verbindungsaufbau zurueck
struct VersuchGuard<'a> {
    inner: &'a ManagerInner,
    versuch: u64,
    adresse: Option<Ipv4Addr>,
    abgeschlossen: bool,
}

impl Drop for VersuchGuard<'_> {
    fn drop(&mut self) {
        if self.abgeschlossen {
            return;
        }
        if let Some(adresse) = self.adresse.take() {
            self.inner.adressen.freigeben(adresse);
        }
        let mut zustand = self.inner.zustand.lock();
        match &*zustand {
            Zustand::Verbindend { versuch } if *versuch == self.versuch => {
                *zustand = Zustand::Getrennt;
                tracing::warn!(versuch = self.versuch, "Verbindungsaufbau zurueckgerollt");
            }
            Zustand::Abbrechend { versuch } if *versuch == self.versuch => {
                *zustand = Zustand::Getrennt;
                drop(zustand);
                self.inner.abbruch_fertig.notify_waiters();
                tracing::info!(versuch = self.versuch, "Abgebrochener Verbindungsaufbau zurueckgerollt");
            }
            _ => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use kybervpn_core::{FehlerArt, Klassifiziert, VpnSubnetz};
    use kybervpn_crypto::SicherheitsStufe;

    fn manager_mit_subnetz(cidr: &str) -> VerbindungsManager {
        let subnetz: VpnSubnetz = cidr.parse().unwrap();
        VerbindungsManager::neu(TunnelKonfig {
            katalog: ServerKatalog::standard(),
            kem: KemManager::neu(SicherheitsStufe::Stufe3),
            adressen: Arc::new(AdressPool::neu(subnetz, subnetz.gateway())),
            telemetrie_intervall: Duration::from_secs(1),
        })
    }

    fn manager() -> VerbindungsManager {
        manager_mit_subnetz("10.8.0.0/24")
    }

    #[tokio::test]
    async fn connect_und_status() {
        let m = manager();
        assert_eq!(m.zustand(), VerbindungsZustand::Getrennt);

        let info = m.connect(&ServerId::neu("server1")).await.unwrap();
        assert_eq!(info.vpn_ip, Ipv4Addr::new(10, 8, 0, 2));
        assert_eq!(info.algorithmus, "ML-KEM-768");
        assert_eq!(m.zustand(), VerbindungsZustand::Verbunden);

        let status = m.status();
        assert!(status.connected);
        assert_eq!(status.vpn_ip.as_deref(), Some("10.8.0.2"));
        assert_eq!(status.server_id, Some(ServerId::neu("server1")));

        m.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn unbekannter_server() {
        let m = manager();
        let err = m.connect(&ServerId::neu("server42")).await.unwrap_err();
        assert_eq!(err.art(), FehlerArt::NichtGefunden);
        assert_eq!(m.zustand(), VerbindungsZustand::Getrennt);
    }

    #[tokio::test]
    async fn zweites_connect_ist_konflikt() {
        let m = manager();
        m.connect(&ServerId::neu("server1")).await.unwrap();
        let err = m.connect(&ServerId::neu("server2")).await.unwrap_err();
        assert!(matches!(err, TunnelError::BereitsVerbunden(ref s) if s == "server1"));
        assert_eq!(err.art(), FehlerArt::Zustandskonflikt);
        m.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn gleichzeitiges_connect_ist_konflikt() {
        let m = manager();
        let id = ServerId::neu("server1");
        let (a, b) = tokio::join!(m.connect(&id), m.connect(&id));
        assert!(a.is_ok());
        assert!(matches!(b, Err(TunnelError::VerbindungLaeuft)));
        m.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn disconnect_ohne_verbindung_ist_noop() {
        let m = manager();
        m.disconnect().await.unwrap();
        m.disconnect().await.unwrap();
        assert_eq!(m.zustand(), VerbindungsZustand::Getrennt);
    }

    #[tokio::test]
    async fn disconnect_setzt_alles_zurueck() {
        let m = manager();
        m.connect(&ServerId::neu("server2")).await.unwrap();
        m.paket_verschluesseln(b"hallo").unwrap();
        assert!(m.status().bytes_sent > 0);

        m.disconnect().await.unwrap();
        assert_eq!(m.zustand(), VerbindungsZustand::Getrennt);
        assert_eq!(m.status(), VpnStatus::getrennt());
        assert_eq!(m.inner.adressen.anzahl_vergeben(), 0);

        // Erneut verbindbar, Adresse wird wiederverwendet
        let info = m.connect(&ServerId::neu("server3")).await.unwrap();
        assert_eq!(info.vpn_ip, Ipv4Addr::new(10, 8, 0, 2));
        m.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn adressraum_erschoepft_rollt_zurueck() {
        // /30: .1 ist Gateway, .2 die einzige Client-Adresse
        let m = manager_mit_subnetz("10.8.0.0/30");
        let belegt = m.inner.adressen.zuweisen().unwrap();
        assert_eq!(belegt, Ipv4Addr::new(10, 8, 0, 2));

        let err = m.connect(&ServerId::neu("server1")).await.unwrap_err();
        assert!(matches!(err, TunnelError::AdressraumErschoepft(_)));
        assert_eq!(err.art(), FehlerArt::Zustandskonflikt);
        assert_eq!(m.zustand(), VerbindungsZustand::Getrennt);
        assert_eq!(m.inner.adressen.anzahl_vergeben(), 1);
    }

    #[tokio::test]
    async fn disconnect_waehrend_verbindend_bricht_ab() {
        let m = manager();
        let id = ServerId::neu("server1");
        let m2 = m.clone();
        let (verbinden, trennen) = tokio::join!(m.connect(&id), async move {
            // connect() steht jetzt im Handshake
            assert_eq!(m2.zustand(), VerbindungsZustand::Verbindend);
            m2.disconnect().await
        });
        assert!(trennen.is_ok());
        assert!(matches!(verbinden, Err(TunnelError::VerbindungAbgebrochen)));
        assert_eq!(m.zustand(), VerbindungsZustand::Getrennt);
        assert_eq!(m.inner.adressen.anzahl_vergeben(), 0);
    }

    #[tokio::test]
    async fn abbruch_bleibt_trennend_bis_zum_rollback() {
        let m = manager();
        let id = ServerId::neu("server1");
        let m2 = m.clone();
        let id2 = id.clone();
        let (verbinden, ()) = tokio::join!(m.connect(&id), async move {
            assert_eq!(m2.zustand(), VerbindungsZustand::Verbindend);

            let trennen = m2.disconnect();
            tokio::pin!(trennen);
            // Einmal pollen: der Abbruch ist angemeldet, der Aufbau laeuft noch
            assert!(tokio::time::timeout(Duration::ZERO, &mut trennen).await.is_err());
            assert_eq!(m2.zustand(), VerbindungsZustand::Trennend);
            assert!(matches!(m2.connect(&id2).await, Err(TunnelError::TrennungLaeuft)));
            assert!(matches!(m2.disconnect().await, Err(TunnelError::TrennungLaeuft)));

            trennen.await.unwrap();
            // disconnect() kehrt erst nach dem Rollback zurueck
            assert_eq!(m2.zustand(), VerbindungsZustand::Getrennt);
            assert_eq!(m2.inner.adressen.anzahl_vergeben(), 0);
        });
        assert!(matches!(verbinden, Err(TunnelError::VerbindungAbgebrochen)));

        assert!(m.connect(&id).await.is_ok());
        m.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn verworfene_connect_future_rollt_zurueck() {
        let m = manager();
        let id = ServerId::neu("server1");

        // Timeout 0: connect() wird genau einmal gepollt und dann verworfen
        let ergebnis = tokio::time::timeout(Duration::ZERO, m.connect(&id)).await;
        assert!(ergebnis.is_err());
        assert_eq!(m.zustand(), VerbindungsZustand::Getrennt);

        assert!(m.connect(&id).await.is_ok());
        m.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn paket_roundtrip_und_manipulation() {
        let m = manager();
        assert!(matches!(
            m.paket_verschluesseln(b"x"),
            Err(TunnelError::NichtVerbunden)
        ));

        m.connect(&ServerId::neu("server1")).await.unwrap();
        let paket = m.paket_verschluesseln(b"IP-Paket").unwrap();
        assert_eq!(m.paket_entschluesseln(&paket).unwrap(), b"IP-Paket");

        let mut manipuliert = paket.clone();
        manipuliert.ciphertext[0] ^= 0x80;
        let err = m.paket_entschluesseln(&manipuliert).unwrap_err();
        assert_eq!(err.art(), FehlerArt::AuthentifizierungFehlgeschlagen);
        m.disconnect().await.unwrap();
    }

    #[test]
    fn status_wire_format() {
        let json = serde_json::to_value(VpnStatus::getrennt()).unwrap();
        assert_eq!(json["connected"], false);
        assert_eq!(json["bytesReceived"], 0);
        assert_eq!(json["bytesSent"], 0);
        assert!(json["vpnIp"].is_null());
        assert!(json["server_id"].is_null());
    }
}
