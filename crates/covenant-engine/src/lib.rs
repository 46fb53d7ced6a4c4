//! # Covenant Engine
//!
//! Requirement status engine, contract lifecycle and action dispatch.
//!
//! One tick of a contract refreshes leaf live fields from telemetry, runs the
//! status engine bottom-up over the requirement tree, applies the contract
//! level transition and reports every event in firing order. The caller then
//! hands those events to [`dispatch`] to fire the blueprint's actions.

pub mod criterion;
pub mod dispatch;
pub mod lifecycle;
pub mod snapshot;
pub mod status;

pub use criterion::Criterion;
pub use dispatch::{dispatch, Notification, NotificationSink, RecordingSink, TracingSink};
pub use lifecycle::{Contract, ContractParts, Transition};
pub use snapshot::{ContractSnapshot, RequirementSnapshot};
pub use status::{StatusPass, TrackedNode, TrackedRequirement};
