//! Route-Definitionen fuer die REST-API (/api/...)

use axum::{
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::rest::{handlers, ws, AppState};

/// Erstellt den vollstaendigen Router inklusive CORS und Tracing
///
/// Leere `cors_origins` erlauben alle Origins.
pub fn api_router(state: AppState, cors_origins: &[String]) -> Router {
    let cors = if cors_origins.is_empty() {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any)
    };

    routen()
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn routen() -> Router<AppState> {
    Router::new()
        .route("/api/health", get(handlers::health))
        // Server-Katalog
        .route("/api/servers", get(handlers::server::list_servers))
        .route("/api/servers/:id", get(handlers::server::get_server))
        // Tunnel
        .route("/api/connection/connect", post(handlers::verbindung::connect))
        .route(
            "/api/connection/disconnect",
            post(handlers::verbindung::disconnect),
        )
        .route("/api/connection/status", get(handlers::verbindung::status))
        // KEM
        .route("/api/crypto/kem", get(handlers::krypto::aktive_stufe))
        .route("/api/crypto/kem/:level", get(handlers::krypto::get_kem_details))
        // Chat
        .route("/api/chat/register", post(handlers::chat::register))
        .route("/api/chat/login", post(handlers::chat::login))
        .route("/api/chat/logout", post(handlers::chat::logout))
        .route("/api/chat/rooms", get(handlers::chat::list_rooms))
        .route(
            "/api/chat/rooms/private",
            post(handlers::chat::create_private_room),
        )
        .route(
            "/api/chat/rooms/:id/messages",
            get(handlers::chat::room_messages),
        )
        .route(
            "/api/chat/rooms/:id/messages/:message_id/read",
            post(handlers::chat::mark_read),
        )
        .route("/api/chat/ws/:session_id", get(ws::chat_ws))
}
