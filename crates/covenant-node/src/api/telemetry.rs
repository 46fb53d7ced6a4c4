//! Telemetry intake.

use axum::{extract::State, http::StatusCode, Json};
use covenant_core::VesselTelemetry;

use super::ApiError;
use crate::state::AppState;

/// Queue a telemetry sample for the next tick.
pub async fn post_telemetry(
    State(state): State<AppState>,
    Json(telemetry): Json<VesselTelemetry>,
) -> Result<StatusCode, ApiError> {
    if telemetry.vessel_id.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "vessel_id cannot be empty".to_string()));
    }
    state.push_telemetry(telemetry).await;
    Ok(StatusCode::ACCEPTED)
}
