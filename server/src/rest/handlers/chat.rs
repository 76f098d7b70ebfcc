//! REST-Handler fuer Benutzer, Sessions und Raeume
//!
//! Registrierung und Login hashen bzw. pruefen Passwoerter mit Argon2id und
//! laufen deshalb ueber `spawn_blocking`.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use kybervpn_auth::{AuthError, Benutzer};
use kybervpn_chat::{Nachricht, Raum};
use kybervpn_core::{Identitaet, NachrichtId, RaumId, SessionId};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::rest::{inhaber_aus_headers, ApiResult, AppState};

// ---------------------------------------------------------------------------
// Registrierung / Login
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct RegistrierenBody {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub display_name: String,
}

/// POST /api/chat/register
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegistrierenBody>,
) -> ApiResult<Response> {
    let sessions = state.sessions.clone();
    let benutzer = tokio::task::spawn_blocking(move || {
        sessions.registrieren(&body.username, &body.password, &body.display_name)
    })
    .await
    .map_err(|e| AuthError::intern(e.to_string()))??;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Benutzer registriert",
            "user": benutzer,
        })),
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
pub struct AnmeldenBody {
    pub username: String,
    pub password: String,
    pub vpn_ip: String,
}

#[derive(Debug, Serialize)]
pub struct AnmeldeAntwort {
    pub success: bool,
    pub token: String,
    pub message: String,
    pub user_data: Option<Benutzer>,
    pub session_id: SessionId,
}

/// POST /api/chat/login
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<AnmeldenBody>,
) -> ApiResult<Json<AnmeldeAntwort>> {
    let sessions = state.sessions.clone();
    let session = tokio::task::spawn_blocking(move || {
        sessions.authentifizieren(&body.username, &body.password, &body.vpn_ip)
    })
    .await
    .map_err(|e| AuthError::intern(e.to_string()))??;

    Ok(Json(AnmeldeAntwort {
        success: true,
        message: format!("Willkommen, {}", session.identitaet),
        user_data: state.sessions.benutzer(&session.identitaet),
        session_id: session.session_id,
        token: session.token,
    }))
}

/// POST /api/chat/logout
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<StatusCode> {
    let inhaber = inhaber_aus_headers(&headers, &state)?;
    state.chat.abhaengen(&inhaber.session_id);
    state.sessions.abmelden(&inhaber.session_id)?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Raeume
// ---------------------------------------------------------------------------

/// GET /api/chat/rooms
pub async fn list_rooms(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<Raum>>> {
    let inhaber = inhaber_aus_headers(&headers, &state)?;
    Ok(Json(state.chat.raeume_fuer(&inhaber.identitaet)))
}

#[derive(Debug, Deserialize)]
pub struct NachrichtenQuery {
    pub limit: Option<usize>,
}

/// GET /api/chat/rooms/:id/messages?limit=
pub async fn room_messages(
    State(state): State<AppState>,
    Path(raum): Path<String>,
    Query(query): Query<NachrichtenQuery>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<Nachricht>>> {
    let inhaber = inhaber_aus_headers(&headers, &state)?;
    let nachrichten =
        state
            .chat
            .nachrichten_laden_als(&inhaber.identitaet, &RaumId::neu(raum), query.limit)?;
    Ok(Json(nachrichten))
}

#[derive(Debug, Deserialize)]
pub struct PrivatRaumBody {
    pub other_username: String,
}

/// POST /api/chat/rooms/private
pub async fn create_private_room(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<PrivatRaumBody>,
) -> ApiResult<Response> {
    let inhaber = inhaber_aus_headers(&headers, &state)?;
    let anderer = Identitaet::neu(body.other_username.trim());
    let raum = state.chat.direkt_raum_erstellen(&inhaber.identitaet, &anderer)?;
    Ok((StatusCode::CREATED, Json(raum)).into_response())
}

/// POST /api/chat/rooms/:id/messages/:message_id/read
pub async fn mark_read(
    State(state): State<AppState>,
    Path((raum, nachricht)): Path<(String, Uuid)>,
    headers: HeaderMap,
) -> ApiResult<StatusCode> {
    let inhaber = inhaber_aus_headers(&headers, &state)?;
    state.chat.als_gelesen_markieren(
        &inhaber.session_id,
        &RaumId::neu(raum),
        &NachrichtId(nachricht),
    )?;
    Ok(StatusCode::NO_CONTENT)
}
