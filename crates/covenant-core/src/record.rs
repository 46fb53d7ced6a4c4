//! Persisted shape of contract instances.
//!
//! Records carry ids, statuses, timestamps and live fields only. Blueprint
//! content is never written; it is resolved again on load.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{ContractStatus, RequirementStatus, UniversalTime};

/// Namespace for deterministic contract ids.
pub const CONTRACT_NAMESPACE: Uuid = Uuid::from_u128(0x6c0f_5a2e_91d4_4b7e_a3c8_2f1e_9d40_b7a1);

/// Derive the instance id for `blueprint_id` offered at `offered_at`.
pub fn contract_id(blueprint_id: &str, offered_at: UniversalTime) -> Uuid {
    let name = format!("{}@{}", blueprint_id, offered_at.to_bits());
    Uuid::new_v5(&CONTRACT_NAMESPACE, name.as_bytes())
}

/// Live fields of a criterion leaf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveState {
    Orbit(OrbitLive),
}

/// Last observed orbit, as altitudes above the body's mean surface.
///
/// Fields stay `None` until the first telemetry refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct OrbitLive {
    #[serde(default)]
    pub apoapsis: Option<f64>,

    #[serde(default)]
    pub periapsis: Option<f64>,

    #[serde(default)]
    pub body_id: Option<String>,
}

/// Persisted contract instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractRecord {
    pub id: Uuid,

    pub blueprint_id: String,

    pub status: ContractStatus,

    #[serde(default)]
    pub offered_at: Option<UniversalTime>,

    #[serde(default)]
    pub accepted_at: Option<UniversalTime>,

    #[serde(default)]
    pub finished_at: Option<UniversalTime>,

    #[serde(default)]
    pub requirements: Vec<RequirementRecord>,

    /// Vessels allowed to progress the contract; empty means any.
    #[serde(default)]
    pub bound_vessels: BTreeSet<String>,
}

/// Persisted requirement node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequirementRecord {
    pub requirement_id: String,

    pub status: RequirementStatus,

    /// Present on criterion leaves.
    #[serde(default)]
    pub live: Option<LiveState>,

    /// Present on groups.
    #[serde(default)]
    pub children: Vec<RequirementRecord>,
}

impl RequirementRecord {
    /// Depth-first walk over this record and its descendants.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a RequirementRecord)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }
}

impl ContractRecord {
    /// Find a requirement record anywhere in the tree.
    pub fn find_requirement(&self, requirement_id: &str) -> Option<&RequirementRecord> {
        let mut found = None;
        for root in &self.requirements {
            root.walk(&mut |record| {
                if found.is_none() && record.requirement_id == requirement_id {
                    found = Some(record);
                }
            });
        }
        found
    }
}
