//! # Covenant Core
//!
//! Core data model for the Covenant contract engine.
//!
//! This crate provides the fundamental building blocks:
//! - [`ContractBlueprint`] - Immutable template with a requirement tree and action rules
//! - [`ContractRecord`] - Persisted, id-only shape of a contract instance
//! - [`VesselTelemetry`] - Per-tick snapshot consumed by criterion evaluators
//! - [`CovenantError`] - Error types

pub mod blueprint;
pub mod error;
pub mod record;
pub mod telemetry;
pub mod types;

// Re-exports for convenience
pub use blueprint::{
    Action, BlueprintBuilder, ContractBlueprint, CriterionSpec, Message, OrbitBounds,
    Prerequisite, Requirement, RequirementKind,
};
pub use error::{CovenantError, Result};
pub use record::{contract_id, ContractRecord, LiveState, OrbitLive, RequirementRecord};
pub use telemetry::VesselTelemetry;
pub use types::*;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::blueprint::{
        Action, ContractBlueprint, CriterionSpec, OrbitBounds, Prerequisite, Requirement,
        RequirementKind,
    };
    pub use crate::error::{CovenantError, Result};
    pub use crate::record::{ContractRecord, RequirementRecord};
    pub use crate::telemetry::VesselTelemetry;
    pub use crate::types::{ContractStatus, LifecycleEvent, RequirementStatus, Trigger};
}
