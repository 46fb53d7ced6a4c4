//! Error types for the Covenant engine.

use thiserror::Error;
use uuid::Uuid;

/// Main error type for Covenant operations.
#[derive(Error, Debug, Clone)]
pub enum CovenantError {
    /// A blueprint failed structural validation.
    #[error("Blueprint '{blueprint_id}' is invalid: {message}")]
    BlueprintInvalid {
        blueprint_id: String,
        message: String,
    },

    /// A blueprint with the same id is already registered.
    #[error("Blueprint '{blueprint_id}' is already registered")]
    DuplicateBlueprint { blueprint_id: String },

    /// An offer named a blueprint the store does not know.
    #[error("Blueprint '{blueprint_id}' not found")]
    UnknownBlueprint { blueprint_id: String },

    /// A persisted contract references a blueprint the store does not know.
    #[error("Contract {contract_id} references unknown blueprint '{blueprint_id}'")]
    BlueprintNotFound {
        contract_id: Uuid,
        blueprint_id: String,
    },

    /// A persisted requirement could not be matched at its level of the blueprint tree.
    #[error("Contract {contract_id}: requirement '{requirement_id}' does not resolve against blueprint '{blueprint_id}': {message}")]
    RequirementNotFound {
        contract_id: Uuid,
        blueprint_id: String,
        requirement_id: String,
        message: String,
    },

    /// No contract with this id exists in the registry.
    #[error("Contract {contract_id} not found")]
    ContractNotFound { contract_id: Uuid },

    /// The requested lifecycle operation is not permitted in the current status.
    #[error("Contract {contract_id} cannot {operation} while {status}")]
    InvalidTransition {
        contract_id: Uuid,
        operation: String,
        status: String,
    },

    /// A save game failed its integrity check.
    #[error("Save game checksum mismatch: expected {expected}, computed {computed}")]
    ChecksumMismatch { expected: String, computed: String },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(String),
}

impl CovenantError {
    /// Returns true if the error only affects reconstruction of a single contract.
    pub fn is_resolution_failure(&self) -> bool {
        matches!(
            self,
            CovenantError::BlueprintNotFound { .. } | CovenantError::RequirementNotFound { .. }
        )
    }

    /// Returns the contract id if the error is scoped to one contract.
    pub fn contract_id(&self) -> Option<Uuid> {
        match self {
            CovenantError::BlueprintNotFound { contract_id, .. } => Some(*contract_id),
            CovenantError::RequirementNotFound { contract_id, .. } => Some(*contract_id),
            CovenantError::ContractNotFound { contract_id } => Some(*contract_id),
            CovenantError::InvalidTransition { contract_id, .. } => Some(*contract_id),
            _ => None,
        }
    }
}

/// Convenience Result type for Covenant operations.
pub type Result<T> = std::result::Result<T, CovenantError>;

impl From<serde_json::Error> for CovenantError {
    fn from(err: serde_json::Error) -> Self {
        CovenantError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for CovenantError {
    fn from(err: std::io::Error) -> Self {
        CovenantError::Io(err.to_string())
    }
}
