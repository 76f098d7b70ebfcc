//! REST-Handler fuer KEM-Parameter

use axum::{
    extract::{Path, State},
    response::Json,
};
use kybervpn_crypto::{get_algorithm_details, AlgorithmusDetails, SicherheitsStufe};

use crate::rest::{ApiResult, AppState};

/// GET /api/crypto/kem
///
/// Parameter der Stufe, mit der der Server Tunnel aufbaut.
pub async fn aktive_stufe(State(state): State<AppState>) -> Json<AlgorithmusDetails> {
    Json(get_algorithm_details(state.kem_stufe))
}

/// GET /api/crypto/kem/:level
pub async fn get_kem_details(Path(level): Path<u8>) -> ApiResult<Json<AlgorithmusDetails>> {
    let stufe = SicherheitsStufe::try_from(level)?;
    Ok(Json(get_algorithm_details(stufe)))
}
