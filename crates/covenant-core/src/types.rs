//! Common types used across the Covenant engine.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Simulation time in seconds, as supplied by the host clock.
pub type UniversalTime = f64;

/// Status of a tracked requirement node.
///
/// The declaration order is the aggregation order: the derived `Ord` gives
/// `Failed < NotStarted < Tracked < Maintained < Achieved`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementStatus {
    /// Criterion can no longer be met.
    Failed,
    /// Waiting for an earlier sibling before tracking starts.
    NotStarted,
    /// Actively evaluated against telemetry.
    Tracked,
    /// Currently satisfied, but must keep holding.
    Maintained,
    /// Finished for good.
    Achieved,
}

impl RequirementStatus {
    /// Returns true for the per-node terminal states.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequirementStatus::Failed | RequirementStatus::Achieved)
    }

    /// Returns true while the node is being evaluated each tick.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            RequirementStatus::Tracked | RequirementStatus::Maintained
        )
    }

    /// Returns true once the node is at least held.
    pub fn is_satisfied(&self) -> bool {
        matches!(
            self,
            RequirementStatus::Maintained | RequirementStatus::Achieved
        )
    }

    /// Trigger fired when a node moves from `from` to `self`.
    pub fn transition_trigger(self, from: RequirementStatus) -> Option<Trigger> {
        if from == self {
            return None;
        }
        match self {
            RequirementStatus::Tracked if from == RequirementStatus::Maintained => {
                Some(Trigger::OnRequirementReverted)
            }
            RequirementStatus::Tracked => Some(Trigger::OnRequirementTracked),
            RequirementStatus::Maintained => Some(Trigger::OnRequirementMaintained),
            RequirementStatus::Achieved => Some(Trigger::OnRequirementAchieved),
            RequirementStatus::Failed => Some(Trigger::OnRequirementFailed),
            RequirementStatus::NotStarted => None,
        }
    }
}

impl fmt::Display for RequirementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequirementStatus::Failed => "failed",
            RequirementStatus::NotStarted => "not_started",
            RequirementStatus::Tracked => "tracked",
            RequirementStatus::Maintained => "maintained",
            RequirementStatus::Achieved => "achieved",
        };
        f.write_str(name)
    }
}

/// Worst status across a set of nodes, or `None` for an empty set.
pub fn worst_of<I>(statuses: I) -> Option<RequirementStatus>
where
    I: IntoIterator<Item = RequirementStatus>,
{
    statuses.into_iter().min()
}

/// Status of a contract instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractStatus {
    /// Available to the player, not yet taken.
    Offered,
    /// Taken and being evaluated.
    Accepted,
    /// Declined by the player or expired while on offer.
    Rejected,
    /// All requirements held.
    Completed,
    /// Deadline passed or a requirement failed.
    Failed,
}

impl ContractStatus {
    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ContractStatus::Rejected | ContractStatus::Completed | ContractStatus::Failed
        )
    }
}

impl fmt::Display for ContractStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContractStatus::Offered => "offered",
            ContractStatus::Accepted => "accepted",
            ContractStatus::Rejected => "rejected",
            ContractStatus::Completed => "completed",
            ContractStatus::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Completion condition declared on blueprints and groups.
///
/// Currently inert: aggregation is always worst-of across every child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CompletionCondition {
    #[default]
    All,
    Any,
}

/// Lifecycle events that action rules match against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Trigger {
    OnContractOffered,
    OnContractAccepted,
    OnContractExpired,
    OnContractRejected,
    OnContractCompleted,
    OnContractFailed,
    OnRequirementTracked,
    OnRequirementMaintained,
    OnRequirementReverted,
    OnRequirementAchieved,
    OnRequirementFailed,
}

impl Trigger {
    /// Returns true if the trigger is scoped to a single requirement.
    pub fn is_requirement_scoped(&self) -> bool {
        matches!(
            self,
            Trigger::OnRequirementTracked
                | Trigger::OnRequirementMaintained
                | Trigger::OnRequirementReverted
                | Trigger::OnRequirementAchieved
                | Trigger::OnRequirementFailed
        )
    }
}

/// Side effect of a fired action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    /// Non-blocking notification.
    DeliverMessage,
    /// Notification the player has to dismiss.
    DeliverBlockingMessage,
}

impl Effect {
    pub fn is_blocking(&self) -> bool {
        matches!(self, Effect::DeliverBlockingMessage)
    }
}

/// A lifecycle transition that occurred on a contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    /// What happened.
    pub trigger: Trigger,

    /// The requirement that changed, for requirement-scoped triggers.
    pub requirement_id: Option<String>,

    /// Simulation time of the transition.
    pub at: UniversalTime,
}

impl LifecycleEvent {
    /// A contract-level event.
    pub fn contract(trigger: Trigger, at: UniversalTime) -> Self {
        Self {
            trigger,
            requirement_id: None,
            at,
        }
    }

    /// A requirement-level event.
    pub fn requirement(trigger: Trigger, requirement_id: impl Into<String>, at: UniversalTime) -> Self {
        Self {
            trigger,
            requirement_id: Some(requirement_id.into()),
            at,
        }
    }
}
