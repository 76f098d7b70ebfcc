//! REST-Handler, nach Bereich gruppiert

pub mod chat;
pub mod krypto;
pub mod server;
pub mod verbindung;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json},
};

/// GET /api/health
pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}
