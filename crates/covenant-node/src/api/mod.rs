//! HTTP API.

pub mod blueprints;
pub mod contracts;
pub mod health;
pub mod notifications;
pub mod session;
pub mod telemetry;

use axum::http::StatusCode;
use covenant_core::CovenantError;

/// Error half of every fallible handler.
pub type ApiError = (StatusCode, String);

/// Map an engine error to its HTTP status.
pub fn api_error(err: CovenantError) -> ApiError {
    let status = match &err {
        CovenantError::ContractNotFound { .. } | CovenantError::UnknownBlueprint { .. } => {
            StatusCode::NOT_FOUND
        }
        CovenantError::InvalidTransition { .. } => StatusCode::CONFLICT,
        CovenantError::BlueprintInvalid { .. } | CovenantError::DuplicateBlueprint { .. } => {
            StatusCode::BAD_REQUEST
        }
        CovenantError::BlueprintNotFound { .. }
        | CovenantError::RequirementNotFound { .. }
        | CovenantError::ChecksumMismatch { .. }
        | CovenantError::Serialization(_)
        | CovenantError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}
