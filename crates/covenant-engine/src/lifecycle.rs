//! Contract lifecycle.
//!
//! A [`Contract`] is the runtime instance of a blueprint. It moves through
//! `Offered -> Accepted -> {Completed, Failed}` or ends `Rejected`, driven by
//! explicit player operations, by simulation time, and by the aggregate status
//! of its requirement tree. Terminal contracts are never evaluated again.

use std::collections::BTreeSet;
use std::sync::Arc;

use covenant_core::{
    contract_id, ContractBlueprint, ContractRecord, ContractStatus, CovenantError,
    LifecycleEvent, RequirementStatus, Result, Trigger, UniversalTime, VesselTelemetry,
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::status::{aggregate, update_siblings, StatusPass, TrackedRequirement};

/// Result of a lifecycle operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transition {
    /// Whether the contract's top-level status changed.
    pub status_changed: bool,

    /// Every event produced, in firing order.
    pub events: Vec<LifecycleEvent>,
}

impl Transition {
    fn unchanged() -> Self {
        Self::default()
    }
}

/// Scalar contract state, as restored from a persisted record.
#[derive(Debug, Clone)]
pub struct ContractParts {
    pub id: Uuid,
    pub status: ContractStatus,
    pub offered_at: Option<UniversalTime>,
    pub accepted_at: Option<UniversalTime>,
    pub finished_at: Option<UniversalTime>,
    pub bound_vessels: BTreeSet<String>,
}

/// Runtime contract instance.
#[derive(Debug, Clone)]
pub struct Contract {
    id: Uuid,
    blueprint: Arc<ContractBlueprint>,
    status: ContractStatus,
    offered_at: Option<UniversalTime>,
    accepted_at: Option<UniversalTime>,
    finished_at: Option<UniversalTime>,
    requirements: Vec<TrackedRequirement>,
    bound_vessels: BTreeSet<String>,
}

impl Contract {
    /// Instantiate `blueprint` as an offer at `now`.
    pub fn offer(blueprint: Arc<ContractBlueprint>, now: UniversalTime) -> (Self, Transition) {
        let requirements = blueprint
            .requirements
            .iter()
            .cloned()
            .map(TrackedRequirement::new)
            .collect();

        let contract = Self {
            id: contract_id(&blueprint.id, now),
            blueprint,
            status: ContractStatus::Offered,
            offered_at: Some(now),
            accepted_at: None,
            finished_at: None,
            requirements,
            bound_vessels: BTreeSet::new(),
        };

        info!(contract = %contract.id, blueprint = %contract.blueprint.id, "Contract offered");

        let transition = Transition {
            status_changed: true,
            events: vec![LifecycleEvent::contract(Trigger::OnContractOffered, now)],
        };
        (contract, transition)
    }

    /// Reassemble a contract from resolved parts.
    pub fn from_parts(
        blueprint: Arc<ContractBlueprint>,
        parts: ContractParts,
        requirements: Vec<TrackedRequirement>,
    ) -> Self {
        Self {
            id: parts.id,
            blueprint,
            status: parts.status,
            offered_at: parts.offered_at,
            accepted_at: parts.accepted_at,
            finished_at: parts.finished_at,
            requirements,
            bound_vessels: parts.bound_vessels,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn blueprint(&self) -> &Arc<ContractBlueprint> {
        &self.blueprint
    }

    pub fn status(&self) -> ContractStatus {
        self.status
    }

    pub fn offered_at(&self) -> Option<UniversalTime> {
        self.offered_at
    }

    pub fn accepted_at(&self) -> Option<UniversalTime> {
        self.accepted_at
    }

    pub fn finished_at(&self) -> Option<UniversalTime> {
        self.finished_at
    }

    pub fn requirements(&self) -> &[TrackedRequirement] {
        &self.requirements
    }

    pub fn bound_vessels(&self) -> &BTreeSet<String> {
        &self.bound_vessels
    }

    /// Restrict progress to `vessel_id` (and any other bound vessel).
    ///
    /// Terminal contracts are final and refuse the binding.
    pub fn bind_vessel(&mut self, vessel_id: impl Into<String>) -> Result<()> {
        if self.status.is_terminal() {
            return Err(self.refuse("bind"));
        }
        self.bound_vessels.insert(vessel_id.into());
        Ok(())
    }

    /// Whether telemetry from `vessel_id` may progress this contract.
    pub fn accepts_vessel(&self, vessel_id: &str) -> bool {
        self.bound_vessels.is_empty() || self.bound_vessels.contains(vessel_id)
    }

    /// Find a tracked requirement anywhere in the tree.
    pub fn find_requirement(&self, requirement_id: &str) -> Option<&TrackedRequirement> {
        self.requirements
            .iter()
            .find_map(|requirement| requirement.find(requirement_id))
    }

    /// Worst status across the root requirements.
    pub fn root_status(&self) -> Option<RequirementStatus> {
        aggregate(&self.requirements)
    }

    fn refuse(&self, operation: &str) -> CovenantError {
        CovenantError::InvalidTransition {
            contract_id: self.id,
            operation: operation.to_string(),
            status: self.status.to_string(),
        }
    }

    fn finish(
        &mut self,
        status: ContractStatus,
        trigger: Trigger,
        now: UniversalTime,
        events: &mut Vec<LifecycleEvent>,
    ) {
        info!(
            contract = %self.id,
            blueprint = %self.blueprint.id,
            from = %self.status,
            to = %status,
            at = now,
            "Contract finished"
        );
        self.status = status;
        self.finished_at = Some(now);
        events.push(LifecycleEvent::contract(trigger, now));
    }

    /// Accept an offered contract.
    pub fn accept(&mut self, now: UniversalTime) -> Result<Transition> {
        if self.status != ContractStatus::Offered {
            return Err(self.refuse("accept"));
        }
        self.status = ContractStatus::Accepted;
        self.accepted_at = Some(now);
        info!(contract = %self.id, blueprint = %self.blueprint.id, at = now, "Contract accepted");

        Ok(Transition {
            status_changed: true,
            events: vec![LifecycleEvent::contract(Trigger::OnContractAccepted, now)],
        })
    }

    /// Reject an offered contract, or an accepted one whose blueprint allows it.
    ///
    /// Rejecting a non-rejectable accepted contract is a no-op.
    pub fn reject(&mut self, now: UniversalTime) -> Result<Transition> {
        match self.status {
            ContractStatus::Offered => {}
            ContractStatus::Accepted if self.blueprint.is_rejectable => {}
            ContractStatus::Accepted => {
                debug!(contract = %self.id, "Reject ignored: contract is not rejectable");
                return Ok(Transition::unchanged());
            }
            _ => return Err(self.refuse("reject")),
        }

        let mut events = Vec::new();
        self.finish(ContractStatus::Rejected, Trigger::OnContractRejected, now, &mut events);
        Ok(Transition {
            status_changed: true,
            events,
        })
    }

    fn expired(&self, now: UniversalTime) -> bool {
        match (self.offered_at, self.blueprint.expiration) {
            (Some(offered_at), Some(expiration)) => now > offered_at + expiration,
            _ => false,
        }
    }

    fn past_deadline(&self, now: UniversalTime) -> bool {
        match (self.accepted_at, self.blueprint.deadline) {
            (Some(accepted_at), Some(deadline)) => now > accepted_at + deadline,
            _ => false,
        }
    }

    /// Advance the contract to `now`.
    pub fn tick(&mut self, now: UniversalTime, telemetry: Option<&VesselTelemetry>) -> Transition {
        let mut events = Vec::new();

        match self.status {
            ContractStatus::Offered => {
                if self.expired(now) {
                    self.finish(ContractStatus::Rejected, Trigger::OnContractExpired, now, &mut events);
                }
            }
            ContractStatus::Accepted => {
                if self.past_deadline(now) {
                    let mut pass = StatusPass::new(now, None);
                    for requirement in self.requirements.iter_mut() {
                        requirement.fail_unfinished(&mut pass);
                    }
                    events = pass.into_events();
                    self.finish(ContractStatus::Failed, Trigger::OnContractFailed, now, &mut events);
                } else {
                    let mut pass = StatusPass::new(now, telemetry);
                    update_siblings(&mut self.requirements, &mut pass);
                    events = pass.into_events();

                    match self.root_status() {
                        Some(RequirementStatus::Failed) => {
                            self.finish(ContractStatus::Failed, Trigger::OnContractFailed, now, &mut events)
                        }
                        Some(RequirementStatus::Maintained)
                        | Some(RequirementStatus::Achieved)
                        | None => self.finish(
                            ContractStatus::Completed,
                            Trigger::OnContractCompleted,
                            now,
                            &mut events,
                        ),
                        Some(RequirementStatus::NotStarted) | Some(RequirementStatus::Tracked) => {}
                    }
                }
            }
            ContractStatus::Rejected | ContractStatus::Completed | ContractStatus::Failed => {}
        }

        let status_changed = events.iter().any(|event| !event.trigger.is_requirement_scoped());
        Transition {
            status_changed,
            events,
        }
    }

    /// Advance the contract with telemetry from one vessel.
    ///
    /// Skipped entirely when the contract is bound to other vessels.
    pub fn tick_with_vehicle(&mut self, now: UniversalTime, telemetry: &VesselTelemetry) -> Transition {
        if !self.accepts_vessel(&telemetry.vessel_id) {
            return Transition::unchanged();
        }
        self.tick(now, Some(telemetry))
    }

    /// Persisted form of the contract.
    pub fn to_record(&self) -> ContractRecord {
        ContractRecord {
            id: self.id,
            blueprint_id: self.blueprint.id.clone(),
            status: self.status,
            offered_at: self.offered_at,
            accepted_at: self.accepted_at,
            finished_at: self.finished_at,
            requirements: self
                .requirements
                .iter()
                .map(TrackedRequirement::to_record)
                .collect(),
            bound_vessels: self.bound_vessels.clone(),
        }
    }
}
