//! Display snapshots of contracts.

use covenant_core::{ContractStatus, LiveState, RequirementStatus, UniversalTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::lifecycle::Contract;
use crate::status::TrackedRequirement;

/// Read-only view of a contract for presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractSnapshot {
    pub id: Uuid,
    pub blueprint_id: String,
    pub title: String,
    pub synopsis: String,
    pub status: ContractStatus,
    pub offered_at: Option<UniversalTime>,
    pub accepted_at: Option<UniversalTime>,
    pub finished_at: Option<UniversalTime>,
    /// Absolute expiry time while on offer.
    pub expires_at: Option<UniversalTime>,
    /// Absolute deadline once accepted.
    pub deadline_at: Option<UniversalTime>,
    pub requirements: Vec<RequirementSnapshot>,
}

/// Read-only view of a requirement node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequirementSnapshot {
    pub id: String,
    pub title: String,
    pub status: RequirementStatus,
    pub hidden: bool,
    pub live: Option<LiveState>,
    pub children: Vec<RequirementSnapshot>,
}

impl From<&TrackedRequirement> for RequirementSnapshot {
    fn from(node: &TrackedRequirement) -> Self {
        let requirement = node.requirement();
        Self {
            id: requirement.id.clone(),
            title: requirement.title.clone(),
            status: node.status(),
            hidden: requirement.is_hidden,
            live: node.live().cloned(),
            children: node.children().iter().map(RequirementSnapshot::from).collect(),
        }
    }
}

impl From<&Contract> for ContractSnapshot {
    fn from(contract: &Contract) -> Self {
        let blueprint = contract.blueprint();
        let expires_at = match contract.status() {
            ContractStatus::Offered => contract
                .offered_at()
                .zip(blueprint.expiration)
                .map(|(at, seconds)| at + seconds),
            _ => None,
        };
        let deadline_at = contract
            .accepted_at()
            .zip(blueprint.deadline)
            .map(|(at, seconds)| at + seconds);

        Self {
            id: contract.id(),
            blueprint_id: blueprint.id.clone(),
            title: blueprint.title.clone(),
            synopsis: blueprint.synopsis.clone(),
            status: contract.status(),
            offered_at: contract.offered_at(),
            accepted_at: contract.accepted_at(),
            finished_at: contract.finished_at(),
            expires_at,
            deadline_at,
            requirements: contract
                .requirements()
                .iter()
                .map(RequirementSnapshot::from)
                .collect(),
        }
    }
}
