//! Echtzeit-Frames (JSON, Feld `type` als Tag)
//!
//! Eingehend: `message`, `typing`.
//! Ausgehend: `message_sent`, `new_message`, `typing`, `error`.

use chrono::{DateTime, Utc};
use kybervpn_core::{Identitaet, NachrichtId, RaumId};
use serde::{Deserialize, Serialize};

use crate::types::Nachricht;

/// Frame vom Client
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EingangsFrame {
    Message { room_id: RaumId, content: String },
    Typing { room_id: RaumId },
}

/// Frame an den Client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AusgangsFrame {
    MessageSent {
        message_id: NachrichtId,
        timestamp: DateTime<Utc>,
    },
    NewMessage {
        message: Nachricht,
    },
    Typing {
        room_id: RaumId,
        username: Identitaet,
    },
    Error {
        message: String,
    },
}

impl AusgangsFrame {
    pub fn fehler(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}
