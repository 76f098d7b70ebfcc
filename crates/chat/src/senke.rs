//! Frame-Senken pro Echtzeit-Verbindung
//!
//! Jede offene Verbindung ist eine unabhaengige Senke. Die Standard-Senke
//! reiht Frames nicht-blockierend in eine begrenzte Queue ein; ein Writer-Task
//! des Transports leert sie. Eine volle oder geschlossene Queue laesst nur
//! diese eine Zustellung scheitern.

use kybervpn_core::SessionId;
use tokio::sync::mpsc;

use crate::error::ZustellFehler;
use crate::frames::AusgangsFrame;

/// Groesse der Send-Queue pro Verbindung
pub const SEND_QUEUE_GROESSE: usize = 64;

/// Ziel fuer ausgehende Frames
pub trait FrameSenke: Send + Sync {
    /// Reiht einen Frame ein, ohne zu blockieren
    fn senden(&self, frame: &AusgangsFrame) -> Result<(), ZustellFehler>;
}

/// Handle auf die Send-Queue einer Verbindung
#[derive(Clone, Debug)]
pub struct KanalSenke {
    session_id: SessionId,
    tx: mpsc::Sender<AusgangsFrame>,
}

impl KanalSenke {
    /// Erstellt Senke und zugehoerige Empfangs-Queue
    pub fn neu(session_id: SessionId) -> (Self, mpsc::Receiver<AusgangsFrame>) {
        Self::mit_kapazitaet(session_id, SEND_QUEUE_GROESSE)
    }

    pub fn mit_kapazitaet(
        session_id: SessionId,
        kapazitaet: usize,
    ) -> (Self, mpsc::Receiver<AusgangsFrame>) {
        let (tx, rx) = mpsc::channel(kapazitaet.max(1));
        (Self { session_id, tx }, rx)
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }
}

impl FrameSenke for KanalSenke {
    fn senden(&self, frame: &AusgangsFrame) -> Result<(), ZustellFehler> {
        match self.tx.try_send(frame.clone()) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(session_id = %self.session_id, "Send-Queue voll, Frame verworfen");
                Err(ZustellFehler::QueueVoll)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(session_id = %self.session_id, "Send-Queue geschlossen (Client getrennt)");
                Err(ZustellFehler::Geschlossen)
            }
        }
    }
}
