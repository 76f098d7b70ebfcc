//! REST-Handler fuer den Server-Katalog

use axum::{
    extract::{Path, State},
    response::Json,
};
use kybervpn_core::{FehlerArt, ServerId};
use kybervpn_tunnel::ServerEintrag;

use crate::rest::{ApiFehler, ApiResult, AppState};

/// GET /api/servers
pub async fn list_servers(State(state): State<AppState>) -> Json<Vec<ServerEintrag>> {
    Json(state.tunnel.katalog().alle().to_vec())
}

/// GET /api/servers/:id
pub async fn get_server(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ServerEintrag>> {
    state
        .tunnel
        .katalog()
        .finden(&ServerId::neu(id.as_str()))
        .cloned()
        .map(Json)
        .ok_or_else(|| {
            ApiFehler::neu(
                FehlerArt::NichtGefunden,
                format!("Server mit ID {id} nicht gefunden"),
            )
        })
}
