//! Offer generation.
//!
//! A blueprint is offered when its [`Prerequisite`](covenant_core::Prerequisite)
//! holds against the current contract population: every required blueprint
//! has been completed at least once, the completion cap is not reached and
//! fewer than `max_simultaneous` instances are on offer or in progress.

use std::collections::BTreeMap;
use std::sync::Arc;

use covenant_core::{ContractBlueprint, ContractStatus};
use covenant_engine::Contract;

use crate::templates::BlueprintStore;

/// Per-blueprint contract counts.
#[derive(Debug, Default, Clone)]
pub struct OfferCounts {
    completed: BTreeMap<String, u32>,
    open: BTreeMap<String, u32>,
}

impl OfferCounts {
    /// Count completed and open contracts per blueprint.
    pub fn tally<'a>(contracts: impl IntoIterator<Item = &'a Contract>) -> Self {
        let mut counts = Self::default();
        for contract in contracts {
            let bucket = match contract.status() {
                ContractStatus::Completed => &mut counts.completed,
                ContractStatus::Offered | ContractStatus::Accepted => &mut counts.open,
                ContractStatus::Rejected | ContractStatus::Failed => continue,
            };
            *bucket.entry(contract.blueprint().id.clone()).or_default() += 1;
        }
        counts
    }

    pub fn completed(&self, blueprint_id: &str) -> u32 {
        self.completed.get(blueprint_id).copied().unwrap_or(0)
    }

    /// Offered plus accepted instances.
    pub fn open(&self, blueprint_id: &str) -> u32 {
        self.open.get(blueprint_id).copied().unwrap_or(0)
    }
}

/// Whether `blueprint` may be offered now.
pub fn is_offerable(blueprint: &ContractBlueprint, counts: &OfferCounts) -> bool {
    let rule = &blueprint.prerequisite;

    if counts.open(&blueprint.id) >= rule.max_simultaneous {
        return false;
    }
    if let Some(cap) = rule.max_completions {
        if counts.completed(&blueprint.id) >= cap {
            return false;
        }
    }
    rule.required_completed
        .iter()
        .all(|required| counts.completed(required) > 0)
}

/// Blueprints that may be offered now, ordered by id.
pub fn offerable<'a>(
    store: &'a BlueprintStore,
    counts: &'a OfferCounts,
) -> impl Iterator<Item = &'a Arc<ContractBlueprint>> + 'a {
    store
        .iter()
        .filter(move |blueprint| is_offerable(blueprint, counts))
}
