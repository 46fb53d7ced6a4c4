//! Simulation clock and saving.

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{api_error, ApiError};
use crate::state::{AppState, SimClock};

/// Response after writing a save game.
#[derive(Debug, Serialize)]
pub struct SaveResponse {
    pub saved_at: DateTime<Utc>,
    pub universal_time: f64,
    pub contracts: usize,
    pub checksum: String,
}

/// Current simulation time.
pub async fn get_clock(State(state): State<AppState>) -> Json<SimClock> {
    Json(*state.clock.read().await)
}

/// Write a save game now.
pub async fn save(State(state): State<AppState>) -> Result<Json<SaveResponse>, ApiError> {
    let save = state.save().await.map_err(api_error)?;
    Ok(Json(SaveResponse {
        saved_at: save.saved_at,
        universal_time: save.universal_time,
        contracts: save.len(),
        checksum: save.checksum,
    }))
}
