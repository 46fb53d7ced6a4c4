//! Template store.
//!
//! Blueprints are registered once per session and shared read-only as
//! `Arc<ContractBlueprint>`. Registration validates each blueprint on its
//! own, so one malformed template never blocks the rest.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use covenant_core::{ContractBlueprint, CovenantError, Result};
use tracing::{info, warn};

/// Outcome of loading a blueprint document.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Ids of the blueprints that were registered.
    pub registered: Vec<String>,

    /// One error per blueprint that was refused.
    pub rejected: Vec<CovenantError>,
}

/// Read-only collection of blueprints addressable by id.
#[derive(Debug, Default, Clone)]
pub struct BlueprintStore {
    blueprints: BTreeMap<String, Arc<ContractBlueprint>>,
}

impl BlueprintStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and register a blueprint.
    pub fn register(&mut self, blueprint: ContractBlueprint) -> Result<Arc<ContractBlueprint>> {
        blueprint.validate()?;
        if self.blueprints.contains_key(&blueprint.id) {
            return Err(CovenantError::DuplicateBlueprint {
                blueprint_id: blueprint.id,
            });
        }
        let blueprint = Arc::new(blueprint);
        self.blueprints
            .insert(blueprint.id.clone(), Arc::clone(&blueprint));
        Ok(blueprint)
    }

    /// Look up a blueprint by id.
    pub fn resolve(&self, id: &str) -> Option<Arc<ContractBlueprint>> {
        self.blueprints.get(id).cloned()
    }

    /// All blueprints, ordered by id.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<ContractBlueprint>> {
        self.blueprints.values()
    }

    pub fn len(&self) -> usize {
        self.blueprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blueprints.is_empty()
    }

    /// Register every blueprint in a JSON array.
    ///
    /// Entries that fail to parse or validate are reported and skipped.
    pub fn load_json(&mut self, json: &str) -> Result<LoadReport> {
        let entries: Vec<serde_json::Value> = serde_json::from_str(json)?;
        let mut report = LoadReport::default();

        for (index, entry) in entries.into_iter().enumerate() {
            let outcome = serde_json::from_value::<ContractBlueprint>(entry)
                .map_err(|err| CovenantError::BlueprintInvalid {
                    blueprint_id: format!("#{}", index),
                    message: err.to_string(),
                })
                .and_then(|blueprint| self.register(blueprint));

            match outcome {
                Ok(blueprint) => report.registered.push(blueprint.id.clone()),
                Err(err) => {
                    warn!("Skipping blueprint: {}", err);
                    report.rejected.push(err);
                }
            }
        }

        info!(
            "Loaded {} blueprints ({} rejected)",
            report.registered.len(),
            report.rejected.len()
        );
        Ok(report)
    }

    /// Register every blueprint in a JSON file.
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<LoadReport> {
        let json = std::fs::read_to_string(path)?;
        self.load_json(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use covenant_core::{OrbitBounds, Requirement};

    fn survey(id: &str) -> ContractBlueprint {
        ContractBlueprint::builder(id)
            .requirement(Requirement::orbit("orbit", OrbitBounds::default()))
            .build()
            .unwrap()
    }

    #[test]
    fn test_register_and_resolve() {
        let mut store = BlueprintStore::new();
        store.register(survey("a")).unwrap();
        store.register(survey("b")).unwrap();

        assert_eq!(store.len(), 2);
        assert!(store.resolve("a").is_some());
        assert!(store.resolve("c").is_none());
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut store = BlueprintStore::new();
        store.register(survey("a")).unwrap();
        let err = store.register(survey("a")).unwrap_err();
        assert!(matches!(err, CovenantError::DuplicateBlueprint { .. }));
    }

    #[test]
    fn test_load_json_isolates_bad_entries() {
        let json = r#"[
            { "id": "good", "requirements": [] },
            { "id": "", "requirements": [] },
            { "title": "no id at all" },
            {
                "id": "bad_action",
                "actions": [
                    { "id": "a", "trigger": "OnContractAccepted", "effect": "deliver_message" }
                ]
            },
            { "id": "also_good" }
        ]"#;

        let mut store = BlueprintStore::new();
        let report = store.load_json(json).unwrap();

        assert_eq!(report.registered, vec!["good", "also_good"]);
        assert_eq!(report.rejected.len(), 3);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_load_json_requires_array() {
        let mut store = BlueprintStore::new();
        assert!(store.load_json("{}").is_err());
    }
}
