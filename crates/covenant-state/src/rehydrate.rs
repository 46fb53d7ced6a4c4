//! Rehydration of persisted contracts.
//!
//! A [`ContractRecord`] stores ids only. Rehydration resolves the blueprint by
//! id, then resolves every requirement record against the matching level of
//! the blueprint tree, copying statuses and live fields into a freshly built
//! tree. Any unresolved id fails the whole contract.

use std::sync::Arc;

use covenant_core::{
    ContractRecord, CovenantError, Requirement, RequirementKind, RequirementRecord, Result,
};
use covenant_engine::criterion::initial_live_state;
use covenant_engine::{Contract, ContractParts, TrackedNode, TrackedRequirement};
use uuid::Uuid;

use crate::templates::BlueprintStore;

struct Resolver<'a> {
    contract_id: Uuid,
    blueprint_id: &'a str,
}

impl Resolver<'_> {
    fn unresolved(&self, requirement_id: &str, message: impl Into<String>) -> CovenantError {
        CovenantError::RequirementNotFound {
            contract_id: self.contract_id,
            blueprint_id: self.blueprint_id.to_string(),
            requirement_id: requirement_id.to_string(),
            message: message.into(),
        }
    }

    /// Resolve one sibling level. `parent` names the level in errors.
    fn level(
        &self,
        parent: &str,
        blueprints: &[Arc<Requirement>],
        records: &[RequirementRecord],
    ) -> Result<Vec<TrackedRequirement>> {
        if blueprints.len() != records.len() {
            return Err(self.unresolved(
                parent,
                format!(
                    "expected {} child requirements, found {}",
                    blueprints.len(),
                    records.len()
                ),
            ));
        }

        let mut used = vec![false; blueprints.len()];
        let mut resolved = Vec::with_capacity(records.len());

        for record in records {
            let index = blueprints
                .iter()
                .position(|requirement| requirement.id == record.requirement_id)
                .ok_or_else(|| {
                    self.unresolved(&record.requirement_id, format!("not a child of '{}'", parent))
                })?;
            if std::mem::replace(&mut used[index], true) {
                return Err(self.unresolved(&record.requirement_id, "persisted more than once"));
            }

            let requirement = &blueprints[index];
            let node = match &requirement.kind {
                RequirementKind::Criterion { criterion } => {
                    if !record.children.is_empty() {
                        return Err(self.unresolved(
                            &record.requirement_id,
                            "persisted as a group but defined as a criterion",
                        ));
                    }
                    TrackedNode::Leaf(
                        record
                            .live
                            .clone()
                            .unwrap_or_else(|| initial_live_state(criterion)),
                    )
                }
                RequirementKind::Group { children, .. } => TrackedNode::Group(self.level(
                    &requirement.id,
                    children,
                    &record.children,
                )?),
            };

            resolved.push(TrackedRequirement::from_parts(
                Arc::clone(requirement),
                record.status,
                node,
            ));
        }

        Ok(resolved)
    }
}

/// Rebuild a live contract from its record.
pub fn rehydrate(record: &ContractRecord, store: &BlueprintStore) -> Result<Contract> {
    let blueprint = store
        .resolve(&record.blueprint_id)
        .ok_or_else(|| CovenantError::BlueprintNotFound {
            contract_id: record.id,
            blueprint_id: record.blueprint_id.clone(),
        })?;

    let resolver = Resolver {
        contract_id: record.id,
        blueprint_id: &record.blueprint_id,
    };
    let requirements = resolver.level("<root>", &blueprint.requirements, &record.requirements)?;

    let parts = ContractParts {
        id: record.id,
        status: record.status,
        offered_at: record.offered_at,
        accepted_at: record.accepted_at,
        finished_at: record.finished_at,
        bound_vessels: record.bound_vessels.clone(),
    };
    Ok(Contract::from_parts(blueprint, parts, requirements))
}

#[cfg(test)]
mod tests {
    use super::*;
    use covenant_core::{ContractBlueprint, ContractStatus, OrbitBounds, RequirementStatus};

    fn store() -> BlueprintStore {
        let mut store = BlueprintStore::new();
        store
            .register(
                ContractBlueprint::builder("survey")
                    .requirement(Requirement::orbit("a", OrbitBounds::default()))
                    .requirement(Requirement::group(
                        "g",
                        vec![
                            Requirement::orbit("x", OrbitBounds::default()),
                            Requirement::orbit("y", OrbitBounds::default()),
                        ],
                    ))
                    .build()
                    .unwrap(),
            )
            .unwrap();
        store
    }

    fn offered_record(store: &BlueprintStore) -> ContractRecord {
        let (contract, _) = Contract::offer(store.resolve("survey").unwrap(), 0.0);
        contract.to_record()
    }

    #[test]
    fn test_rehydrate_round_trip() {
        let store = store();
        let record = offered_record(&store);
        let contract = rehydrate(&record, &store).unwrap();

        assert_eq!(contract.to_record(), record);
        assert_eq!(contract.status(), ContractStatus::Offered);
        assert!(Arc::ptr_eq(
            contract.blueprint(),
            &store.resolve("survey").unwrap()
        ));
    }

    #[test]
    fn test_unknown_blueprint_fails() {
        let store = store();
        let mut record = offered_record(&store);
        record.blueprint_id = "gone".to_string();

        let err = rehydrate(&record, &store).unwrap_err();
        assert!(matches!(err, CovenantError::BlueprintNotFound { .. }));
    }

    #[test]
    fn test_unknown_child_fails_whole_contract() {
        let store = store();
        let mut record = offered_record(&store);
        record.requirements[1].children[1].requirement_id = "z".to_string();

        match rehydrate(&record, &store).unwrap_err() {
            CovenantError::RequirementNotFound { requirement_id, .. } => {
                assert_eq!(requirement_id, "z")
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_id_at_wrong_level_fails() {
        let store = store();
        let mut record = offered_record(&store);
        // "x" exists, but only under "g".
        record.requirements[0].requirement_id = "x".to_string();
        assert!(rehydrate(&record, &store).is_err());
    }

    #[test]
    fn test_shape_mismatch_fails() {
        let store = store();
        let mut record = offered_record(&store);
        record.requirements[1].children.pop();
        assert!(rehydrate(&record, &store).is_err());

        let mut record = offered_record(&store);
        let duplicate = record.requirements[0].clone();
        record.requirements[1] = duplicate;
        assert!(rehydrate(&record, &store).is_err());
    }

    #[test]
    fn test_statuses_copied_and_order_preserved() {
        let store = store();
        let mut record = offered_record(&store);
        record.status = ContractStatus::Accepted;
        record.accepted_at = Some(3.0);
        record.requirements[1].children[0].status = RequirementStatus::Maintained;
        record.requirements[1].children.swap(0, 1);

        let contract = rehydrate(&record, &store).unwrap();
        let group = &contract.requirements()[1];
        assert_eq!(group.children()[0].id(), "y");
        assert_eq!(
            contract.find_requirement("x").unwrap().status(),
            RequirementStatus::Maintained
        );
        assert_eq!(contract.accepted_at(), Some(3.0));
    }

    #[test]
    fn test_missing_live_state_defaults() {
        let store = store();
        let mut record = offered_record(&store);
        record.requirements[0].live = None;

        let contract = rehydrate(&record, &store).unwrap();
        assert!(contract.requirements()[0].live().is_some());
    }
}
