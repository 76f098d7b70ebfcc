//! WebSocket-Eingang fuer Echtzeit-Frames
//!
//! Pro Verbindung:
//! - Reader: Text-Frames gehen an den Raum-Dienst
//! - Writer-Task: leert die Send-Queue der Senke in den Socket
//!
//! Endet einer der beiden, wird die Verbindung abgehaengt. Unbekannte
//! Sessions werden mit Close-Code 1008 (Policy Violation) abgewiesen.
//!
//! Die Senke gehoert dem Raum-Dienst, der Socket haelt sie nur schwach.
//! Haengt der Dienst die Verbindung ab (Logout, Session-Ablauf), schliesst
//! sich die Queue und der Writer beendet den Socket.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use kybervpn_chat::{AusgangsFrame, FrameSenke, KanalSenke, ZustellBericht};
use kybervpn_core::SessionId;
use tokio::sync::mpsc;

use crate::rest::AppState;

/// GET /api/chat/ws/:session_id
pub async fn chat_ws(
    ws: WebSocketUpgrade,
    Path(session_id): Path<String>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| verbindung_bedienen(socket, session_id, state))
}

async fn verbindung_bedienen(socket: WebSocket, session_roh: String, state: AppState) {
    let Ok(session_id) = session_roh.parse::<SessionId>() else {
        abweisen(socket, "Ungueltige Session-ID").await;
        return;
    };

    let (senke, rx) = KanalSenke::neu(session_id);
    let senke: Arc<dyn FrameSenke> = Arc::new(senke);
    let eigene_senke = Arc::downgrade(&senke);
    let identitaet = match state.chat.anhaengen(session_id, senke) {
        Ok(identitaet) => identitaet,
        Err(e) => {
            tracing::debug!(session_id = %session_id, fehler = %e, "WebSocket abgewiesen");
            abweisen(socket, "Session ungueltig").await;
            return;
        }
    };
    tracing::debug!(username = %identitaet, session_id = %session_id, "WebSocket geoeffnet");

    let (ws_tx, mut ws_rx) = socket.split();
    let mut schreiber = tokio::spawn(schreiben(ws_tx, rx));

    let dienst = state.chat.clone();
    let mut leser = tokio::spawn(async move {
        let mut gesamt = ZustellBericht::default();
        while let Some(Ok(nachricht)) = ws_rx.next().await {
            match nachricht {
                Message::Text(text) => {
                    let bericht = dienst.eingang_text_verarbeiten(&session_id, &text);
                    gesamt = gesamt.zusammenfuehren(bericht);
                    if bericht.fehlgeschlagen > 0 {
                        tracing::debug!(
                            session_id = %session_id,
                            zugestellt = bericht.zugestellt,
                            fehlgeschlagen = bericht.fehlgeschlagen,
                            "Verteilung teilweise fehlgeschlagen"
                        );
                    }
                }
                Message::Close(_) => break,
                // Ping/Pong beantwortet axum selbst, Binaerframes werden ignoriert
                _ => {}
            }
        }
        gesamt
    });

    tokio::select! {
        _ = &mut schreiber => {
            tracing::debug!(session_id = %session_id, "Send-Queue geschlossen");
            leser.abort();
        }
        ergebnis = &mut leser => {
            schreiber.abort();
            if let Ok(gesamt) = ergebnis {
                tracing::debug!(
                    session_id = %session_id,
                    zugestellt = gesamt.zugestellt,
                    fehlgeschlagen = gesamt.fehlgeschlagen,
                    "Client hat den WebSocket geschlossen"
                );
            }
        }
    }

    state.chat.abhaengen_senke(&session_id, &eigene_senke);
}

async fn schreiben(
    mut ws_tx: futures_util::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<AusgangsFrame>,
) {
    while let Some(frame) = rx.recv().await {
        let text = match serde_json::to_string(&frame) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(fehler = %e, "Frame nicht serialisierbar");
                continue;
            }
        };
        if ws_tx.send(Message::Text(text)).await.is_err() {
            break;
        }
    }
    let _ = ws_tx.close().await;
}

async fn abweisen(mut socket: WebSocket, grund: &'static str) {
    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code: close_code::POLICY,
            reason: grund.into(),
        })))
        .await;
}
