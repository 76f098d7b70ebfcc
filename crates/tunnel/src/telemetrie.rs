//! Verbindungs-Telemetrie
//!
//! Ein Task pro aktiver Verbindung. Jeder Tick
//! - zieht die Latenz gleichverteilt aus `[max(1, basis-10), basis+10]`
//! - erhoeht den Sendezaehler um 1024..=8192 Bytes
//! - erhoeht den Empfangszaehler um das Doppelte davon
//!
//! Die Zaehler sind Atomics und werden auch von den Paket-Operationen der
//! Verbindung beschrieben. Fehler eines Ticks werden geloggt, der Task laeuft
//! weiter. Abbruch ueber `CancellationToken`, spaetestens nach einem Tick.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Standard-Tick der Telemetrie
pub const TELEMETRIE_INTERVALL: Duration = Duration::from_secs(1);

/// Maximale Abweichung der Latenz von der Basis (ms)
pub const LATENZ_SPANNE_MS: u32 = 10;

/// Fehler innerhalb eines einzelnen Ticks
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TelemetrieFehler {
    #[error("Zaehler-Ueberlauf ({zaehler})")]
    ZaehlerUeberlauf { zaehler: &'static str },
}

// ---------------------------------------------------------------------------
// Zaehler
// ---------------------------------------------------------------------------

/// Gemeinsame, atomar aktualisierte Verbindungszaehler
#[derive(Debug, Default)]
pub struct Verbindungszaehler {
    bytes_gesendet: AtomicU64,
    bytes_empfangen: AtomicU64,
    latenz_ms: AtomicU32,
}

impl Verbindungszaehler {
    pub fn neu(basis_latenz_ms: u32) -> Self {
        Self {
            bytes_gesendet: AtomicU64::new(0),
            bytes_empfangen: AtomicU64::new(0),
            latenz_ms: AtomicU32::new(basis_latenz_ms),
        }
    }

    pub fn bytes_gesendet(&self) -> u64 {
        self.bytes_gesendet.load(Ordering::Relaxed)
    }

    pub fn bytes_empfangen(&self) -> u64 {
        self.bytes_empfangen.load(Ordering::Relaxed)
    }

    pub fn latenz_ms(&self) -> u32 {
        self.latenz_ms.load(Ordering::Relaxed)
    }

    /// Monoton erhoehen; bei Ueberlauf bleibt der Zaehler unveraendert
    pub fn gesendet_addieren(&self, bytes: u64) -> Result<(), TelemetrieFehler> {
        atomar_addieren(&self.bytes_gesendet, bytes, "bytes_gesendet")
    }

    pub fn empfangen_addieren(&self, bytes: u64) -> Result<(), TelemetrieFehler> {
        atomar_addieren(&self.bytes_empfangen, bytes, "bytes_empfangen")
    }

    pub fn latenz_setzen(&self, latenz_ms: u32) {
        self.latenz_ms.store(latenz_ms, Ordering::Relaxed);
    }
}

fn atomar_addieren(
    zaehler: &AtomicU64,
    bytes: u64,
    name: &'static str,
) -> Result<(), TelemetrieFehler> {
    zaehler
        .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |alt| alt.checked_add(bytes))
        .map(|_| ())
        .map_err(|_| TelemetrieFehler::ZaehlerUeberlauf { zaehler: name })
}

// ---------------------------------------------------------------------------
// Tick + Task
// ---------------------------------------------------------------------------

/// Ein einzelner Telemetrie-Schritt
pub fn tick(zaehler: &Verbindungszaehler, basis_latenz_ms: u32) -> Result<(), TelemetrieFehler> {
    let mut rng = rand::thread_rng();

    let untergrenze = basis_latenz_ms.saturating_sub(LATENZ_SPANNE_MS).max(1);
    let obergrenze = basis_latenz_ms.saturating_add(LATENZ_SPANNE_MS).max(untergrenze);
    zaehler.latenz_setzen(rng.gen_range(untergrenze..=obergrenze));

    let zuwachs: u64 = rng.gen_range(1024..=8192);
    zaehler.gesendet_addieren(zuwachs)?;
    zaehler.empfangen_addieren(zuwachs * 2)?;
    Ok(())
}

/// Startet den Telemetrie-Task einer Verbindung
///
/// Der erste Tick erfolgt sofort. Der Task endet sobald `abbruch` ausgeloest wird.
pub fn starten(
    zaehler: Arc<Verbindungszaehler>,
    basis_latenz_ms: u32,
    intervall: Duration,
    abbruch: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(intervall);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = abbruch.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = tick(&zaehler, basis_latenz_ms) {
                        tracing::warn!(fehler = %e, "Telemetrie-Tick uebersprungen");
                    }
                }
            }
        }

        tracing::debug!("Telemetrie-Task beendet");
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
