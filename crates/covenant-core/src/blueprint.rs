//! Blueprint types and builder for the Covenant engine.
//!
//! A blueprint is the immutable template a contract instance is created from.
//! It owns the requirement tree, the action rules and the offer prerequisite.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{CovenantError, Result};
use crate::types::{CompletionCondition, Effect, Trigger};

fn default_true() -> bool {
    true
}

fn default_max_simultaneous() -> u32 {
    1
}

/// Template a contract is instantiated from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractBlueprint {
    /// Unique identifier within the template store.
    pub id: String,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub synopsis: String,

    #[serde(default)]
    pub description: String,

    /// Seconds after the offer before the contract expires (`None` = never).
    #[serde(default)]
    pub expiration: Option<f64>,

    /// Seconds after acceptance before the contract fails (`None` = never).
    #[serde(default)]
    pub deadline: Option<f64>,

    /// Whether an accepted contract may still be rejected.
    #[serde(default = "default_true")]
    pub is_rejectable: bool,

    /// Accept immediately when offered.
    #[serde(default)]
    pub is_auto_accepted: bool,

    /// Declared but not consulted by aggregation.
    #[serde(default)]
    pub completion_condition: CompletionCondition,

    /// Root requirements, in evaluation order.
    #[serde(default)]
    pub requirements: Vec<Arc<Requirement>>,

    /// Action rules, in firing order.
    #[serde(default)]
    pub actions: Vec<Action>,

    /// Gate consulted by offer generation.
    #[serde(default)]
    pub prerequisite: Prerequisite,
}

/// A node of the blueprint requirement tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    pub id: String,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub synopsis: String,

    #[serde(default)]
    pub description: String,

    /// Start as not-started and wait for the preceding sibling.
    #[serde(default)]
    pub complete_in_order: bool,

    /// Finish on first satisfaction; otherwise the node is only maintained.
    #[serde(default = "default_true")]
    pub is_completed_on_achievement: bool,

    #[serde(default)]
    pub is_hidden: bool,

    pub kind: RequirementKind,
}

/// Leaf criterion or group of child requirements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RequirementKind {
    /// Evaluated directly from telemetry.
    Criterion { criterion: CriterionSpec },

    /// Aggregates its children.
    Group {
        children: Vec<Arc<Requirement>>,
        #[serde(default)]
        completion_condition: CompletionCondition,
    },
}

/// Kind-specific bounds of a criterion leaf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CriterionSpec {
    Orbit(OrbitBounds),
}

/// Orbit altitude bounds. `None` (or NaN) leaves a bound unconstrained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct OrbitBounds {
    #[serde(default)]
    pub min_apoapsis: Option<f64>,

    #[serde(default)]
    pub max_apoapsis: Option<f64>,

    #[serde(default)]
    pub min_periapsis: Option<f64>,

    #[serde(default)]
    pub max_periapsis: Option<f64>,

    /// Body the vessel has to orbit.
    #[serde(default)]
    pub target_body: Option<String>,
}

impl OrbitBounds {
    pub fn apoapsis(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min_apoapsis = min;
        self.max_apoapsis = max;
        self
    }

    pub fn periapsis(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min_periapsis = min;
        self.max_periapsis = max;
        self
    }

    pub fn around(mut self, body: impl Into<String>) -> Self {
        self.target_body = Some(body.into());
        self
    }
}

/// Declarative side-effect rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    pub id: String,

    pub trigger: Trigger,

    pub effect: Effect,

    #[serde(default)]
    pub message: Message,

    /// Requirement the trigger must match, for requirement-scoped triggers.
    #[serde(default)]
    pub requirement_id: Option<String>,
}

impl Action {
    /// Action that delivers a message.
    pub fn message(
        id: impl Into<String>,
        trigger: Trigger,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            trigger,
            effect: Effect::DeliverMessage,
            message: Message {
                title: title.into(),
                body: body.into(),
            },
            requirement_id: None,
        }
    }

    /// Make the message blocking.
    pub fn blocking(mut self) -> Self {
        self.effect = Effect::DeliverBlockingMessage;
        self
    }

    /// Scope the trigger to one requirement.
    pub fn for_requirement(mut self, requirement_id: impl Into<String>) -> Self {
        self.requirement_id = Some(requirement_id.into());
        self
    }
}

/// Notification payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Message {
    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub body: String,
}

impl Message {
    pub fn is_empty(&self) -> bool {
        self.title.trim().is_empty() && self.body.trim().is_empty()
    }
}

/// Offer gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prerequisite {
    /// Blueprints that must each have a completed contract.
    #[serde(default)]
    pub required_completed: Vec<String>,

    /// Stop offering after this many completions.
    #[serde(default)]
    pub max_completions: Option<u32>,

    /// Offered plus accepted instances allowed at once.
    #[serde(default = "default_max_simultaneous")]
    pub max_simultaneous: u32,
}

impl Default for Prerequisite {
    fn default() -> Self {
        Self {
            required_completed: Vec::new(),
            max_completions: None,
            max_simultaneous: default_max_simultaneous(),
        }
    }
}

impl Requirement {
    fn new(id: impl Into<String>, kind: RequirementKind) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            synopsis: String::new(),
            description: String::new(),
            complete_in_order: false,
            is_completed_on_achievement: true,
            is_hidden: false,
            kind,
        }
    }

    /// Orbit criterion leaf.
    pub fn orbit(id: impl Into<String>, bounds: OrbitBounds) -> Self {
        Self::new(
            id,
            RequirementKind::Criterion {
                criterion: CriterionSpec::Orbit(bounds),
            },
        )
    }

    /// Group over `children`.
    pub fn group(id: impl Into<String>, children: Vec<Requirement>) -> Self {
        Self::new(
            id,
            RequirementKind::Group {
                children: children.into_iter().map(Arc::new).collect(),
                completion_condition: CompletionCondition::All,
            },
        )
    }

    pub fn titled(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Wait for the preceding sibling before tracking.
    pub fn in_order(mut self) -> Self {
        self.complete_in_order = true;
        self
    }

    /// Hold instead of finishing on satisfaction.
    pub fn maintained(mut self) -> Self {
        self.is_completed_on_achievement = false;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.is_hidden = true;
        self
    }

    /// Children of a group; empty for a leaf.
    pub fn children(&self) -> &[Arc<Requirement>] {
        match &self.kind {
            RequirementKind::Group { children, .. } => children,
            RequirementKind::Criterion { .. } => &[],
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self.kind, RequirementKind::Group { .. })
    }

    /// Depth-first walk over this node and its descendants.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Requirement)) {
        visit(self);
        for child in self.children() {
            child.walk(visit);
        }
    }
}

/// Builder for creating blueprints with a fluent API.
#[derive(Debug)]
pub struct BlueprintBuilder {
    blueprint: ContractBlueprint,
}

impl BlueprintBuilder {
    /// Create a new builder for the blueprint `id`.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            blueprint: ContractBlueprint {
                id: id.into(),
                title: String::new(),
                synopsis: String::new(),
                description: String::new(),
                expiration: None,
                deadline: None,
                is_rejectable: true,
                is_auto_accepted: false,
                completion_condition: CompletionCondition::All,
                requirements: Vec::new(),
                actions: Vec::new(),
                prerequisite: Prerequisite::default(),
            },
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.blueprint.title = title.into();
        self
    }

    pub fn synopsis(mut self, synopsis: impl Into<String>) -> Self {
        self.blueprint.synopsis = synopsis.into();
        self
    }

    /// Expire `seconds` after the offer.
    pub fn expiration(mut self, seconds: f64) -> Self {
        self.blueprint.expiration = Some(seconds);
        self
    }

    /// Fail `seconds` after acceptance.
    pub fn deadline(mut self, seconds: f64) -> Self {
        self.blueprint.deadline = Some(seconds);
        self
    }

    pub fn rejectable(mut self, rejectable: bool) -> Self {
        self.blueprint.is_rejectable = rejectable;
        self
    }

    pub fn auto_accepted(mut self) -> Self {
        self.blueprint.is_auto_accepted = true;
        self
    }

    pub fn completion_condition(mut self, condition: CompletionCondition) -> Self {
        self.blueprint.completion_condition = condition;
        self
    }

    /// Add a root requirement.
    pub fn requirement(mut self, requirement: Requirement) -> Self {
        self.blueprint.requirements.push(Arc::new(requirement));
        self
    }

    /// Add an action rule.
    pub fn action(mut self, action: Action) -> Self {
        self.blueprint.actions.push(action);
        self
    }

    pub fn prerequisite(mut self, prerequisite: Prerequisite) -> Self {
        self.blueprint.prerequisite = prerequisite;
        self
    }

    /// Validate and build the blueprint.
    pub fn build(self) -> Result<ContractBlueprint> {
        self.blueprint.validate()?;
        Ok(self.blueprint)
    }
}

impl ContractBlueprint {
    /// Create a new BlueprintBuilder.
    pub fn builder(id: impl Into<String>) -> BlueprintBuilder {
        BlueprintBuilder::new(id)
    }

    /// Depth-first walk over every requirement of the blueprint.
    pub fn walk_requirements<'a>(&'a self, visit: &mut impl FnMut(&'a Requirement)) {
        for requirement in &self.requirements {
            requirement.walk(visit);
        }
    }

    fn invalid(&self, message: impl Into<String>) -> CovenantError {
        CovenantError::BlueprintInvalid {
            blueprint_id: self.id.clone(),
            message: message.into(),
        }
    }

    /// Validate the blueprint's structure.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(self.invalid("Blueprint id cannot be empty"));
        }

        for (name, value) in [("expiration", self.expiration), ("deadline", self.deadline)] {
            if let Some(seconds) = value {
                if seconds.is_nan() || seconds < 0.0 {
                    return Err(self.invalid(format!("{} must be a non-negative duration, got {}", name, seconds)));
                }
            }
        }

        let mut requirement_ids = HashSet::new();
        let mut problem = None;
        self.walk_requirements(&mut |requirement| {
            if problem.is_some() {
                return;
            }
            if requirement.id.trim().is_empty() {
                problem = Some("Requirement id cannot be empty".to_string());
            } else if !requirement_ids.insert(requirement.id.as_str()) {
                problem = Some(format!("Duplicate requirement id '{}'", requirement.id));
            } else if requirement.is_group() && requirement.children().is_empty() {
                problem = Some(format!("Group '{}' has no children", requirement.id));
            }
        });
        if let Some(message) = problem {
            return Err(self.invalid(message));
        }

        for action in &self.actions {
            if action.id.trim().is_empty() {
                return Err(self.invalid("Action id cannot be empty"));
            }
            if action.message.is_empty() {
                return Err(self.invalid(format!("Action '{}' has no message", action.id)));
            }
            match (&action.requirement_id, action.trigger.is_requirement_scoped()) {
                (None, true) => {
                    return Err(self.invalid(format!(
                        "Action '{}' uses {:?} without a target requirement",
                        action.id, action.trigger
                    )));
                }
                (Some(target), true) if !requirement_ids.contains(target.as_str()) => {
                    return Err(self.invalid(format!(
                        "Action '{}' targets unknown requirement '{}'",
                        action.id, target
                    )));
                }
                _ => {}
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn low_orbit() -> OrbitBounds {
        OrbitBounds::default()
            .periapsis(Some(70_000.0), None)
            .around("kerbin")
    }

    #[test]
    fn test_blueprint_builder() {
        let blueprint = ContractBlueprint::builder("first_orbit")
            .title("Reach orbit")
            .expiration(3600.0)
            .deadline(86_400.0)
            .requirement(Requirement::orbit("orbit", low_orbit()).titled("Orbit Kerbin"))
            .action(
                Action::message("congrats", Trigger::OnRequirementAchieved, "Orbit!", "Well done")
                    .for_requirement("orbit"),
            )
            .build()
            .unwrap();

        assert_eq!(blueprint.id, "first_orbit");
        assert_eq!(blueprint.requirements.len(), 1);
        assert_eq!(blueprint.expiration, Some(3600.0));
        assert!(blueprint.is_rejectable);
    }

    #[test]
    fn test_empty_id_rejected() {
        let result = ContractBlueprint::builder("  ").build();
        assert!(matches!(result, Err(CovenantError::BlueprintInvalid { .. })));
    }

    #[test]
    fn test_action_without_message_rejected() {
        let mut action = Action::message("a", Trigger::OnContractAccepted, "", "");
        action.message = Message::default();
        let result = ContractBlueprint::builder("bp").action(action).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_scoped_action_needs_known_target() {
        let missing = ContractBlueprint::builder("bp")
            .requirement(Requirement::orbit("orbit", low_orbit()))
            .action(Action::message("a", Trigger::OnRequirementAchieved, "t", "b"))
            .build();
        assert!(missing.is_err());

        let unknown = ContractBlueprint::builder("bp")
            .requirement(Requirement::orbit("orbit", low_orbit()))
            .action(
                Action::message("a", Trigger::OnRequirementAchieved, "t", "b")
                    .for_requirement("elsewhere"),
            )
            .build();
        assert!(unknown.is_err());
    }

    #[test]
    fn test_duplicate_requirement_ids_rejected() {
        let result = ContractBlueprint::builder("bp")
            .requirement(Requirement::group(
                "group",
                vec![
                    Requirement::orbit("orbit", low_orbit()),
                    Requirement::orbit("orbit", low_orbit()),
                ],
            ))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_group_rejected() {
        let result = ContractBlueprint::builder("bp")
            .requirement(Requirement::group("group", vec![]))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_negative_deadline_rejected() {
        let result = ContractBlueprint::builder("bp").deadline(-1.0).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_blueprint_from_json_defaults() {
        let json = r#"{
            "id": "survey",
            "requirements": [
                {
                    "id": "orbit",
                    "kind": {
                        "type": "criterion",
                        "criterion": { "type": "orbit", "min_periapsis": 70000.0 }
                    }
                }
            ]
        }"#;

        let blueprint: ContractBlueprint = serde_json::from_str(json).unwrap();
        assert!(blueprint.validate().is_ok());
        assert!(blueprint.is_rejectable);
        assert_eq!(blueprint.expiration, None);
        assert_eq!(blueprint.prerequisite.max_simultaneous, 1);

        let orbit = &blueprint.requirements[0];
        assert!(orbit.is_completed_on_achievement);
        assert!(!orbit.complete_in_order);
        match &orbit.kind {
            RequirementKind::Criterion {
                criterion: CriterionSpec::Orbit(bounds),
            } => {
                assert_eq!(bounds.min_periapsis, Some(70_000.0));
                assert_eq!(bounds.max_periapsis, None);
            }
            other => panic!("unexpected kind {:?}", other),
        }
    }
}
