//! Contract API endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use covenant_engine::ContractSnapshot;
use covenant_state::ContractFilter;
use serde::Deserialize;
use uuid::Uuid;

use super::{api_error, ApiError};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<ContractFilter>,
}

/// Request to offer a blueprint.
#[derive(Debug, Deserialize)]
pub struct OfferRequest {
    pub blueprint_id: String,
}

/// Request to bind a vessel to a contract.
#[derive(Debug, Deserialize)]
pub struct BindRequest {
    pub vessel_id: String,
}

/// List contracts, optionally one collection only.
pub async fn list_contracts(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Json<Vec<ContractSnapshot>> {
    let registry = state.registry.read().await;
    Json(registry.snapshots(query.status))
}

/// Get a contract by ID.
pub async fn get_contract(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ContractSnapshot>, ApiError> {
    let registry = state.registry.read().await;
    registry.snapshot(id).map(Json).map_err(api_error)
}

/// Offer a blueprint now, bypassing its prerequisites.
pub async fn create_offer(
    State(state): State<AppState>,
    Json(req): Json<OfferRequest>,
) -> Result<(StatusCode, Json<ContractSnapshot>), ApiError> {
    let mut registry = state.registry.write().await;
    let now = state.now().await;
    let mut inbox = state.inbox.write().await;

    let id = registry
        .offer(&req.blueprint_id, now, &mut *inbox)
        .map_err(api_error)?;
    let snapshot = registry.snapshot(id).map_err(api_error)?;
    Ok((StatusCode::CREATED, Json(snapshot)))
}

/// Accept an offered contract.
pub async fn accept_contract(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ContractSnapshot>, ApiError> {
    let mut registry = state.registry.write().await;
    let now = state.now().await;
    let mut inbox = state.inbox.write().await;

    registry.accept(id, now, &mut *inbox).map_err(api_error)?;
    registry.snapshot(id).map(Json).map_err(api_error)
}

/// Reject a contract.
///
/// Rejecting an accepted contract that is not rejectable succeeds and leaves
/// it unchanged.
pub async fn reject_contract(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ContractSnapshot>, ApiError> {
    let mut registry = state.registry.write().await;
    let now = state.now().await;
    let mut inbox = state.inbox.write().await;

    registry.reject(id, now, &mut *inbox).map_err(api_error)?;
    registry.snapshot(id).map(Json).map_err(api_error)
}

/// Restrict a contract to telemetry from one vessel.
pub async fn bind_vessel(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<BindRequest>,
) -> Result<StatusCode, ApiError> {
    let mut registry = state.registry.write().await;
    registry.bind_vessel(id, req.vessel_id).map_err(api_error)?;
    Ok(StatusCode::NO_CONTENT)
}
