//! REST-Handler fuer den Tunnel-Lebenszyklus

use axum::{extract::State, response::Json};
use kybervpn_core::ServerId;
use kybervpn_tunnel::VpnStatus;
use serde::{Deserialize, Serialize};

use crate::rest::{ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct VerbindenBody {
    #[serde(rename = "serverId")]
    pub server_id: String,
}

/// Antwort auf connect/disconnect
#[derive(Debug, Serialize)]
pub struct VerbindungsAntwort {
    pub success: bool,
    pub message: String,
    #[serde(rename = "vpnIp")]
    pub vpn_ip: Option<String>,
}

/// POST /api/connection/connect
pub async fn connect(
    State(state): State<AppState>,
    Json(body): Json<VerbindenBody>,
) -> ApiResult<Json<VerbindungsAntwort>> {
    let info = state.tunnel.connect(&ServerId::neu(body.server_id)).await?;
    Ok(Json(VerbindungsAntwort {
        success: true,
        message: format!("Verbindung mit {} hergestellt", info.server.name),
        vpn_ip: Some(info.vpn_ip.to_string()),
    }))
}

/// POST /api/connection/disconnect
///
/// Ohne aktive Verbindung ein No-Op.
pub async fn disconnect(State(state): State<AppState>) -> ApiResult<Json<VerbindungsAntwort>> {
    state.tunnel.disconnect().await?;
    Ok(Json(VerbindungsAntwort {
        success: true,
        message: "VPN-Verbindung getrennt".into(),
        vpn_ip: None,
    }))
}

/// GET /api/connection/status
pub async fn status(State(state): State<AppState>) -> Json<VpnStatus> {
    Json(state.tunnel.status())
}
