//! Action dispatch.
//!
//! Lifecycle events are matched against the owning blueprint's action rules
//! and every match delivers its message to a [`NotificationSink`].

use covenant_core::{Action, ContractBlueprint, LifecycleEvent};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

/// One-way notification delivery.
pub trait NotificationSink {
    /// Deliver a message. `uid` identifies the action that produced it.
    fn deliver(&mut self, title: &str, uid: &str, message: &str, blocking: bool);
}

/// Sink that writes notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn deliver(&mut self, title: &str, uid: &str, message: &str, blocking: bool) {
        info!(action = uid, blocking, "📨 {}: {}", title, message);
    }
}

/// A delivered notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub uid: String,
    pub message: String,
    pub blocking: bool,
}

/// Sink that keeps every notification in memory.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    notifications: Vec<Notification>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    /// Remove and return everything delivered so far.
    pub fn drain(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    pub fn len(&self) -> usize {
        self.notifications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifications.is_empty()
    }
}

impl NotificationSink for RecordingSink {
    fn deliver(&mut self, title: &str, uid: &str, message: &str, blocking: bool) {
        self.notifications.push(Notification {
            title: title.to_string(),
            uid: uid.to_string(),
            message: message.to_string(),
            blocking,
        });
    }
}

/// Whether `action` fires for `event`.
pub fn matches(action: &Action, event: &LifecycleEvent) -> bool {
    if action.trigger != event.trigger {
        return false;
    }
    if !action.trigger.is_requirement_scoped() {
        return true;
    }
    action.requirement_id.is_some() && action.requirement_id == event.requirement_id
}

/// Actions of `blueprint` matching `event`, in declared order.
pub fn matching_actions<'a>(
    blueprint: &'a ContractBlueprint,
    event: &'a LifecycleEvent,
) -> impl Iterator<Item = &'a Action> + 'a {
    blueprint
        .actions
        .iter()
        .filter(move |action| matches(action, event))
}

/// Fire the actions of `blueprint` for each event. Returns the number fired.
pub fn dispatch(
    blueprint: &ContractBlueprint,
    contract_id: Uuid,
    events: &[LifecycleEvent],
    sink: &mut dyn NotificationSink,
) -> usize {
    let mut fired = 0;
    for event in events {
        for action in matching_actions(blueprint, event) {
            debug!(
                contract = %contract_id,
                action = %action.id,
                trigger = ?event.trigger,
                "Firing action"
            );
            sink.deliver(
                &action.message.title,
                &action.id,
                &action.message.body,
                action.effect.is_blocking(),
            );
            fired += 1;
        }
    }
    fired
}
