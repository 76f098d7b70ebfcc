//! REST- und WebSocket-Schnittstelle des Kyber-VPN-Servers
//!
//! Duenne Schicht ueber den Kern-Diensten: Handler extrahieren Eingaben,
//! rufen genau eine Kern-Operation auf und bilden Fehler ueber
//! [`FehlerArt`] auf HTTP-Statuscodes ab.

pub mod handlers;
pub mod routes;
pub mod ws;

use std::fmt;

use axum::{
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use kybervpn_auth::{AuthError, SessionRegistry, TokenInhaber};
use kybervpn_chat::{ChatError, RaumDienst};
use kybervpn_core::{FehlerArt, Klassifiziert};
use kybervpn_crypto::{CryptoError, SicherheitsStufe};
use kybervpn_tunnel::{TunnelError, VerbindungsManager};
use serde_json::json;

pub use routes::api_router;

/// Axum-State: die Kern-Dienste. Clone teilt den inneren Zustand.
#[derive(Clone)]
pub struct AppState {
    pub tunnel: VerbindungsManager,
    pub sessions: SessionRegistry,
    pub chat: RaumDienst,
    pub kem_stufe: SicherheitsStufe,
}

// ---------------------------------------------------------------------------
// Fehler
// ---------------------------------------------------------------------------

/// Fehlerantwort der API
///
/// Body: `{"error": {"code": 404, "kind": "not_found", "message": "..."}}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiFehler {
    pub art: FehlerArt,
    pub nachricht: String,
}

impl ApiFehler {
    pub fn neu(art: FehlerArt, nachricht: impl Into<String>) -> Self {
        Self {
            art,
            nachricht: nachricht.into(),
        }
    }

    /// Uebernimmt Art und Text eines klassifizierten Kern-Fehlers
    pub fn aus<E: Klassifiziert + fmt::Display>(fehler: &E) -> Self {
        Self::neu(fehler.art(), fehler.to_string())
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.art.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl IntoResponse for ApiFehler {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(art = %self.art, fehler = %self.nachricht, "Anfrage fehlgeschlagen");
        } else {
            tracing::debug!(art = %self.art, fehler = %self.nachricht, "Anfrage abgelehnt");
        }
        (
            status,
            Json(json!({
                "error": {
                    "code": status.as_u16(),
                    "kind": self.art.als_str(),
                    "message": self.nachricht,
                }
            })),
        )
            .into_response()
    }
}

impl From<TunnelError> for ApiFehler {
    fn from(e: TunnelError) -> Self {
        Self::aus(&e)
    }
}

impl From<AuthError> for ApiFehler {
    fn from(e: AuthError) -> Self {
        Self::aus(&e)
    }
}

impl From<ChatError> for ApiFehler {
    fn from(e: ChatError) -> Self {
        Self::aus(&e)
    }
}

impl From<CryptoError> for ApiFehler {
    fn from(e: CryptoError) -> Self {
        Self::aus(&e)
    }
}

pub type ApiResult<T> = Result<T, ApiFehler>;

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

/// Extrahiert Bearer-Token aus Authorization-Header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
}

/// Prueft das Bearer-Token gegen die Session-Registry
pub fn inhaber_aus_headers(headers: &HeaderMap, state: &AppState) -> ApiResult<TokenInhaber> {
    let token = bearer_token(headers).ok_or_else(|| {
        ApiFehler::neu(
            FehlerArt::AuthentifizierungFehlgeschlagen,
            "Authorization-Header fehlt",
        )
    })?;
    Ok(state.sessions.token_pruefen(token)?)
}
