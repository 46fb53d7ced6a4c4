//! Requirement status engine.
//!
//! A [`TrackedRequirement`] tree mirrors a blueprint requirement tree and
//! carries the per-node status plus leaf live fields. One engine pass walks
//! each sibling list left to right: active nodes are updated (groups recurse
//! into their children first), then not-started nodes are promoted once their
//! predecessor is held. Status changes are recorded as lifecycle events in
//! the order they happen.

use std::sync::Arc;

use covenant_core::{
    worst_of, LifecycleEvent, LiveState, Requirement, RequirementKind, RequirementRecord,
    RequirementStatus, UniversalTime, VesselTelemetry,
};
use tracing::{debug, warn};

use crate::criterion;

/// Per-kind state of a tracked node.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackedNode {
    /// Criterion leaf with its live fields.
    Leaf(LiveState),
    /// Group with children mirroring the blueprint group 1:1.
    Group(Vec<TrackedRequirement>),
}

/// Runtime instance of a blueprint requirement.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedRequirement {
    requirement: Arc<Requirement>,
    status: RequirementStatus,
    node: TrackedNode,
}

/// Inputs and outputs of one engine pass.
pub struct StatusPass<'a> {
    now: UniversalTime,
    telemetry: Option<&'a VesselTelemetry>,
    events: Vec<LifecycleEvent>,
}

impl<'a> StatusPass<'a> {
    pub fn new(now: UniversalTime, telemetry: Option<&'a VesselTelemetry>) -> Self {
        Self {
            now,
            telemetry,
            events: Vec::new(),
        }
    }

    /// Events recorded so far, in firing order.
    pub fn events(&self) -> &[LifecycleEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<LifecycleEvent> {
        self.events
    }
}

impl TrackedRequirement {
    /// Instantiate `requirement` and its descendants.
    pub fn new(requirement: Arc<Requirement>) -> Self {
        let status = if requirement.complete_in_order {
            RequirementStatus::NotStarted
        } else {
            RequirementStatus::Tracked
        };

        let node = match &requirement.kind {
            RequirementKind::Criterion { criterion } => {
                TrackedNode::Leaf(criterion::initial_live_state(criterion))
            }
            RequirementKind::Group { children, .. } => TrackedNode::Group(
                children.iter().cloned().map(TrackedRequirement::new).collect(),
            ),
        };

        Self {
            requirement,
            status,
            node,
        }
    }

    /// Reassemble a node from already-resolved parts.
    pub fn from_parts(
        requirement: Arc<Requirement>,
        status: RequirementStatus,
        node: TrackedNode,
    ) -> Self {
        Self {
            requirement,
            status,
            node,
        }
    }

    pub fn id(&self) -> &str {
        &self.requirement.id
    }

    pub fn requirement(&self) -> &Arc<Requirement> {
        &self.requirement
    }

    pub fn status(&self) -> RequirementStatus {
        self.status
    }

    pub fn node(&self) -> &TrackedNode {
        &self.node
    }

    /// Live fields of a leaf.
    pub fn live(&self) -> Option<&LiveState> {
        match &self.node {
            TrackedNode::Leaf(live) => Some(live),
            TrackedNode::Group(_) => None,
        }
    }

    /// Children of a group; empty for a leaf.
    pub fn children(&self) -> &[TrackedRequirement] {
        match &self.node {
            TrackedNode::Group(children) => children,
            TrackedNode::Leaf(_) => &[],
        }
    }

    /// Find a node by requirement id in this subtree.
    pub fn find(&self, requirement_id: &str) -> Option<&TrackedRequirement> {
        if self.id() == requirement_id {
            return Some(self);
        }
        self.children().iter().find_map(|child| child.find(requirement_id))
    }

    /// Persisted form of this subtree.
    pub fn to_record(&self) -> RequirementRecord {
        RequirementRecord {
            requirement_id: self.requirement.id.clone(),
            status: self.status,
            live: self.live().cloned(),
            children: self.children().iter().map(TrackedRequirement::to_record).collect(),
        }
    }

    fn set_status(&mut self, next: RequirementStatus, pass: &mut StatusPass<'_>) {
        let previous = self.status;
        if previous == next {
            return;
        }
        self.status = next;
        debug!(
            requirement = %self.requirement.id,
            from = %previous,
            to = %next,
            "Requirement status changed"
        );
        if let Some(trigger) = next.transition_trigger(previous) {
            pass.events
                .push(LifecycleEvent::requirement(trigger, &self.requirement.id, pass.now));
        }
    }

    /// Kind-specific update of an active node.
    fn update(&mut self, pass: &mut StatusPass<'_>) {
        let next = match &mut self.node {
            TrackedNode::Leaf(live) => {
                let RequirementKind::Criterion { criterion } = &self.requirement.kind else {
                    warn!(requirement = %self.requirement.id, "Leaf node bound to a group blueprint");
                    return;
                };
                if let Some(telemetry) = pass.telemetry {
                    criterion::refresh_live_state(criterion, live, telemetry);
                }
                if criterion::is_satisfied(criterion, live) {
                    if self.requirement.is_completed_on_achievement {
                        RequirementStatus::Achieved
                    } else {
                        RequirementStatus::Maintained
                    }
                } else if self.status == RequirementStatus::Maintained {
                    RequirementStatus::Tracked
                } else {
                    self.status
                }
            }
            TrackedNode::Group(children) => {
                update_siblings(children, pass);
                match worst_of(children.iter().map(|child| child.status)) {
                    Some(RequirementStatus::Maintained) => {
                        for child in children
                            .iter_mut()
                            .filter(|child| child.status == RequirementStatus::Maintained)
                        {
                            child.set_status(RequirementStatus::Achieved, pass);
                        }
                        RequirementStatus::Achieved
                    }
                    Some(RequirementStatus::Achieved) | None => RequirementStatus::Achieved,
                    Some(RequirementStatus::Failed) => RequirementStatus::Failed,
                    Some(RequirementStatus::NotStarted) | Some(RequirementStatus::Tracked) => {
                        RequirementStatus::Tracked
                    }
                }
            }
        };
        self.set_status(next, pass);
    }

    /// Fail this subtree's unfinished nodes, children before parents.
    pub fn fail_unfinished(&mut self, pass: &mut StatusPass<'_>) {
        if let TrackedNode::Group(children) = &mut self.node {
            for child in children.iter_mut() {
                child.fail_unfinished(pass);
            }
        }
        if !self.status.is_terminal() {
            self.set_status(RequirementStatus::Failed, pass);
        }
    }
}

/// One engine pass over a sibling list, as a left-to-right fold.
///
/// Promotion runs for every list regardless of the siblings' own
/// `complete_in_order` flags. A node promoted here is first evaluated on the
/// next pass.
pub fn update_siblings(siblings: &mut [TrackedRequirement], pass: &mut StatusPass<'_>) {
    for index in 0..siblings.len() {
        let (before, rest) = siblings.split_at_mut(index);
        let node = &mut rest[0];

        if node.status.is_active() {
            node.update(pass);
        }

        if node.status == RequirementStatus::NotStarted {
            let unlocked = before.last().map_or(true, |prev| prev.status.is_satisfied());
            if unlocked {
                node.set_status(RequirementStatus::Tracked, pass);
            }
        }
    }
}

/// Worst status across a sibling list.
pub fn aggregate(siblings: &[TrackedRequirement]) -> Option<RequirementStatus> {
    worst_of(siblings.iter().map(TrackedRequirement::status))
}
