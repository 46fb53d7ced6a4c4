//! Contract registry.
//!
//! The registry is the session object: it owns the blueprint store and the
//! offered, active and finished contract collections. Every operation that
//! changes a contract dispatches the resulting events to the caller's sink and
//! then moves the contract to the collection matching its new status.

use std::sync::Arc;

use covenant_core::{
    ContractBlueprint, ContractStatus, CovenantError, Result, UniversalTime, VesselTelemetry,
};
use covenant_engine::{dispatch, Contract, ContractSnapshot, NotificationSink, Transition};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::offers::{offerable, OfferCounts};
use crate::persistence::SaveGame;
use crate::rehydrate::rehydrate;
use crate::templates::BlueprintStore;

/// Which collection to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractFilter {
    Offered,
    Active,
    Finished,
}

/// Summary of one registry tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// Contracts whose top-level status changed.
    pub changed: Vec<Uuid>,

    /// Number of actions fired.
    pub actions_fired: usize,
}

/// Outcome of restoring a save game.
#[derive(Debug, Default)]
pub struct RestoreReport {
    pub restored: usize,

    /// One error per contract that could not be rehydrated.
    pub failed: Vec<CovenantError>,
}

/// Session state: templates plus every contract instance.
#[derive(Debug, Default)]
pub struct Registry {
    store: BlueprintStore,
    offered: Vec<Contract>,
    active: Vec<Contract>,
    finished: Vec<Contract>,
}

impl Registry {
    pub fn new(store: BlueprintStore) -> Self {
        Self {
            store,
            ..Self::default()
        }
    }

    pub fn store(&self) -> &BlueprintStore {
        &self.store
    }

    pub fn offered(&self) -> &[Contract] {
        &self.offered
    }

    pub fn active(&self) -> &[Contract] {
        &self.active
    }

    pub fn finished(&self) -> &[Contract] {
        &self.finished
    }

    /// Every contract, offered first, then active, then finished.
    pub fn contracts(&self) -> impl Iterator<Item = &Contract> {
        self.offered
            .iter()
            .chain(self.active.iter())
            .chain(self.finished.iter())
    }

    pub fn len(&self) -> usize {
        self.offered.len() + self.active.len() + self.finished.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: Uuid) -> Option<&Contract> {
        self.contracts().find(|contract| contract.id() == id)
    }

    fn get_mut(&mut self, id: Uuid) -> Result<&mut Contract> {
        self.offered
            .iter_mut()
            .chain(self.active.iter_mut())
            .chain(self.finished.iter_mut())
            .find(|contract| contract.id() == id)
            .ok_or(CovenantError::ContractNotFound { contract_id: id })
    }

    /// Snapshot of one contract.
    pub fn snapshot(&self, id: Uuid) -> Result<ContractSnapshot> {
        self.get(id)
            .map(ContractSnapshot::from)
            .ok_or(CovenantError::ContractNotFound { contract_id: id })
    }

    /// Snapshots of one collection, or of every contract.
    pub fn snapshots(&self, filter: Option<ContractFilter>) -> Vec<ContractSnapshot> {
        let contracts: Box<dyn Iterator<Item = &Contract> + '_> = match filter {
            Some(ContractFilter::Offered) => Box::new(self.offered.iter()),
            Some(ContractFilter::Active) => Box::new(self.active.iter()),
            Some(ContractFilter::Finished) => Box::new(self.finished.iter()),
            None => Box::new(self.contracts()),
        };
        contracts.map(ContractSnapshot::from).collect()
    }

    fn fire(
        blueprint: &ContractBlueprint,
        id: Uuid,
        transition: &Transition,
        sink: &mut dyn NotificationSink,
    ) -> usize {
        dispatch(blueprint, id, &transition.events, sink)
    }

    /// Move contracts whose status no longer matches their collection.
    fn settle(&mut self) {
        let (offered, accepted): (Vec<_>, Vec<_>) = std::mem::take(&mut self.offered)
            .into_iter()
            .partition(|contract| contract.status() == ContractStatus::Offered);
        self.offered = offered;

        let (active, finished): (Vec<_>, Vec<_>) = std::mem::take(&mut self.active)
            .into_iter()
            .chain(accepted)
            .partition(|contract| contract.status() == ContractStatus::Accepted);
        self.active = active;

        for contract in finished {
            debug!(contract = %contract.id(), status = %contract.status(), "Contract archived");
            self.finished.push(contract);
        }
    }

    /// Offer a new instance of `blueprint_id`, accepting it at once when the
    /// blueprint is auto-accepted.
    ///
    /// Prerequisites are not consulted; see [`Registry::generate_offers`].
    pub fn offer(
        &mut self,
        blueprint_id: &str,
        now: UniversalTime,
        sink: &mut dyn NotificationSink,
    ) -> Result<Uuid> {
        let blueprint = self
            .store
            .resolve(blueprint_id)
            .ok_or_else(|| CovenantError::UnknownBlueprint {
                blueprint_id: blueprint_id.to_string(),
            })?;

        let (mut contract, offered) = Contract::offer(Arc::clone(&blueprint), now);
        if let Some(existing) = self.get(contract.id()) {
            return Err(CovenantError::InvalidTransition {
                contract_id: existing.id(),
                operation: "offer".to_string(),
                status: existing.status().to_string(),
            });
        }
        Self::fire(&blueprint, contract.id(), &offered, sink);

        if blueprint.is_auto_accepted {
            let accepted = contract.accept(now)?;
            Self::fire(&blueprint, contract.id(), &accepted, sink);
        }

        let id = contract.id();
        self.offered.push(contract);
        self.settle();
        Ok(id)
    }

    /// Offer every blueprint whose prerequisites currently hold.
    pub fn generate_offers(
        &mut self,
        now: UniversalTime,
        sink: &mut dyn NotificationSink,
    ) -> Vec<Uuid> {
        let counts = OfferCounts::tally(self.contracts());
        let candidates: Vec<String> = offerable(&self.store, &counts)
            .map(|blueprint| blueprint.id.clone())
            .collect();

        let mut offered = Vec::new();
        for blueprint_id in candidates {
            match self.offer(&blueprint_id, now, sink) {
                Ok(id) => offered.push(id),
                Err(err) => warn!(blueprint = %blueprint_id, "Offer skipped: {}", err),
            }
        }
        if !offered.is_empty() {
            info!("📜 Generated {} offers", offered.len());
        }
        offered
    }

    /// Accept an offered contract.
    pub fn accept(
        &mut self,
        id: Uuid,
        now: UniversalTime,
        sink: &mut dyn NotificationSink,
    ) -> Result<Transition> {
        let contract = self.get_mut(id)?;
        let transition = contract.accept(now)?;
        let blueprint = Arc::clone(contract.blueprint());
        Self::fire(&blueprint, id, &transition, sink);
        self.settle();
        Ok(transition)
    }

    /// Reject an offered or accepted contract.
    pub fn reject(
        &mut self,
        id: Uuid,
        now: UniversalTime,
        sink: &mut dyn NotificationSink,
    ) -> Result<Transition> {
        let contract = self.get_mut(id)?;
        let transition = contract.reject(now)?;
        let blueprint = Arc::clone(contract.blueprint());
        Self::fire(&blueprint, id, &transition, sink);
        self.settle();
        Ok(transition)
    }

    /// Restrict a contract's progress to telemetry from `vessel_id`.
    pub fn bind_vessel(&mut self, id: Uuid, vessel_id: impl Into<String>) -> Result<()> {
        self.get_mut(id)?.bind_vessel(vessel_id)
    }

    /// Advance every live contract to `now`.
    ///
    /// Each contract is evaluated on its own; a contract bound to other
    /// vessels ignores the telemetry and is left untouched.
    pub fn tick(
        &mut self,
        now: UniversalTime,
        telemetry: Option<&VesselTelemetry>,
        sink: &mut dyn NotificationSink,
    ) -> TickReport {
        let samples = match telemetry {
            Some(telemetry) => std::slice::from_ref(telemetry),
            None => &[],
        };
        self.tick_samples(now, samples, sink)
    }

    /// Advance every live contract to `now` with several vessels reporting.
    ///
    /// Every contract gets exactly one pass. An accepted contract is fed the
    /// first sample from a vessel it accepts; when none qualifies it is left
    /// untouched.
    pub fn tick_samples(
        &mut self,
        now: UniversalTime,
        samples: &[VesselTelemetry],
        sink: &mut dyn NotificationSink,
    ) -> TickReport {
        let mut report = TickReport::default();

        for contract in self.offered.iter_mut().chain(self.active.iter_mut()) {
            let transition = match contract.status() {
                ContractStatus::Accepted if !samples.is_empty() => {
                    match samples
                        .iter()
                        .find(|sample| contract.accepts_vessel(&sample.vessel_id))
                    {
                        Some(sample) => contract.tick_with_vehicle(now, sample),
                        None => Transition::default(),
                    }
                }
                _ => contract.tick(now, None),
            };
            report.actions_fired +=
                dispatch(contract.blueprint(), contract.id(), &transition.events, sink);
            if transition.status_changed {
                report.changed.push(contract.id());
            }
        }

        if !report.changed.is_empty() {
            self.settle();
        }
        report
    }

    /// Persistable form of the registry.
    pub fn to_save(&self, now: UniversalTime) -> SaveGame {
        SaveGame::new(
            now,
            self.offered.iter().map(Contract::to_record).collect(),
            self.active.iter().map(Contract::to_record).collect(),
            self.finished.iter().map(Contract::to_record).collect(),
        )
    }

    /// Rebuild a registry from a save game.
    ///
    /// Contracts that fail to rehydrate are logged and reported; the rest are
    /// restored into the collection matching their persisted status.
    pub fn restore(store: BlueprintStore, save: &SaveGame) -> Result<(Self, RestoreReport)> {
        save.verify()?;

        let mut registry = Self::new(store);
        let mut report = RestoreReport::default();

        let records = save
            .offered
            .iter()
            .chain(save.active.iter())
            .chain(save.finished.iter());

        for record in records {
            match rehydrate(record, &registry.store) {
                Ok(contract) => {
                    match contract.status() {
                        ContractStatus::Offered => registry.offered.push(contract),
                        ContractStatus::Accepted => registry.active.push(contract),
                        ContractStatus::Rejected
                        | ContractStatus::Completed
                        | ContractStatus::Failed => registry.finished.push(contract),
                    }
                    report.restored += 1;
                }
                Err(err) => {
                    warn!(contract = %record.id, "Dropping contract: {}", err);
                    report.failed.push(err);
                }
            }
        }

        info!(
            restored = report.restored,
            failed = report.failed.len(),
            "Registry restored"
        );
        Ok((registry, report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use covenant_core::{Action, OrbitBounds, Prerequisite, Requirement, RequirementStatus, Trigger};
    use covenant_engine::RecordingSink;

    fn telemetry(vessel: &str, periapsis_alt: f64) -> VesselTelemetry {
        VesselTelemetry {
            vessel_id: vessel.to_string(),
            body_id: "kerbin".to_string(),
            apoapsis: 700_000.0 + periapsis_alt,
            periapsis: 600_000.0 + periapsis_alt,
            body_radius: 600_000.0,
        }
    }

    fn store() -> BlueprintStore {
        let mut store = BlueprintStore::new();
        store
            .register(
                ContractBlueprint::builder("orbit")
                    .expiration(100.0)
                    .requirement(Requirement::orbit(
                        "orbit",
                        OrbitBounds::default().periapsis(Some(70_000.0), None),
                    ))
                    .action(Action::message("hello", Trigger::OnContractOffered, "New", "Go to orbit"))
                    .action(Action::message("done", Trigger::OnContractCompleted, "Done", "Well done"))
                    .build()
                    .unwrap(),
            )
            .unwrap();
        store
            .register(
                ContractBlueprint::builder("tutorial")
                    .auto_accepted()
                    .prerequisite(Prerequisite {
                        max_completions: Some(1),
                        ..Prerequisite::default()
                    })
                    .action(Action::message("start", Trigger::OnContractAccepted, "Tutorial", "Started"))
                    .build()
                    .unwrap(),
            )
            .unwrap();
        store
    }

    #[test]
    fn test_offer_accept_complete() {
        let mut registry = Registry::new(store());
        let mut sink = RecordingSink::new();

        let id = registry.offer("orbit", 0.0, &mut sink).unwrap();
        assert_eq!(registry.offered().len(), 1);
        assert_eq!(sink.drain()[0].uid, "hello");

        registry.accept(id, 1.0, &mut sink).unwrap();
        assert!(registry.offered().is_empty());
        assert_eq!(registry.active().len(), 1);

        let report = registry.tick(2.0, Some(&telemetry("v1", 80_000.0)), &mut sink);
        assert_eq!(report.changed, vec![id]);
        assert_eq!(report.actions_fired, 1);
        assert_eq!(registry.finished().len(), 1);
        assert_eq!(registry.get(id).unwrap().status(), ContractStatus::Completed);
        assert_eq!(sink.drain()[0].uid, "done");
    }

    #[test]
    fn test_unknown_blueprint_and_contract() {
        let mut registry = Registry::new(store());
        let mut sink = RecordingSink::new();

        assert!(matches!(
            registry.offer("nope", 0.0, &mut sink).unwrap_err(),
            CovenantError::UnknownBlueprint { .. }
        ));
        assert!(matches!(
            registry.accept(Uuid::new_v4(), 0.0, &mut sink).unwrap_err(),
            CovenantError::ContractNotFound { .. }
        ));
    }

    #[test]
    fn test_same_instant_offer_refused() {
        let mut registry = Registry::new(store());
        let mut sink = RecordingSink::new();
        registry.offer("orbit", 5.0, &mut sink).unwrap();
        assert!(matches!(
            registry.offer("orbit", 5.0, &mut sink).unwrap_err(),
            CovenantError::InvalidTransition { .. }
        ));
    }

    #[test]
    fn test_auto_accepted_lands_in_active() {
        let mut registry = Registry::new(store());
        let mut sink = RecordingSink::new();

        let id = registry.offer("tutorial", 0.0, &mut sink).unwrap();
        assert_eq!(registry.active().len(), 1);
        assert_eq!(registry.get(id).unwrap().accepted_at(), Some(0.0));
        assert_eq!(sink.notifications()[0].uid, "start");
    }

    #[test]
    fn test_expiry_archives_offer() {
        let mut registry = Registry::new(store());
        let mut sink = RecordingSink::new();
        let id = registry.offer("orbit", 0.0, &mut sink).unwrap();

        assert!(registry.tick(100.0, None, &mut sink).changed.is_empty());
        assert_eq!(registry.tick(101.0, None, &mut sink).changed, vec![id]);
        assert!(registry.offered().is_empty());
        assert_eq!(registry.get(id).unwrap().status(), ContractStatus::Rejected);
    }

    #[test]
    fn test_accept_twice_is_invalid() {
        let mut registry = Registry::new(store());
        let mut sink = RecordingSink::new();
        let id = registry.offer("orbit", 0.0, &mut sink).unwrap();
        registry.accept(id, 1.0, &mut sink).unwrap();

        assert!(matches!(
            registry.accept(id, 2.0, &mut sink).unwrap_err(),
            CovenantError::InvalidTransition { .. }
        ));
    }

    #[test]
    fn test_bound_vessel_isolates_contracts() {
        let mut registry = Registry::new(store());
        let mut sink = RecordingSink::new();
        let id = registry.offer("orbit", 0.0, &mut sink).unwrap();
        registry.accept(id, 0.0, &mut sink).unwrap();
        registry.bind_vessel(id, "v1").unwrap();

        registry.tick(1.0, Some(&telemetry("v2", 80_000.0)), &mut sink);
        assert_eq!(registry.active().len(), 1);

        registry.tick(2.0, Some(&telemetry("v1", 80_000.0)), &mut sink);
        assert_eq!(registry.finished().len(), 1);
    }

    #[test]
    fn test_finished_contract_refuses_binding() {
        let mut registry = Registry::new(store());
        let mut sink = RecordingSink::new();
        let id = registry.offer("orbit", 0.0, &mut sink).unwrap();
        registry.reject(id, 1.0, &mut sink).unwrap();
        let before = registry.get(id).unwrap().to_record();

        assert!(matches!(
            registry.bind_vessel(id, "late").unwrap_err(),
            CovenantError::InvalidTransition { .. }
        ));
        assert_eq!(registry.get(id).unwrap().to_record(), before);
        assert!(registry.get(id).unwrap().bound_vessels().is_empty());
    }

    #[test]
    fn test_several_samples_tick_each_contract_once() {
        let mut store = BlueprintStore::new();
        store
            .register(
                ContractBlueprint::builder("chain")
                    .auto_accepted()
                    .requirement(
                        Requirement::orbit("a", OrbitBounds::default().periapsis(Some(70_000.0), None))
                            .in_order(),
                    )
                    .requirement(
                        Requirement::orbit("b", OrbitBounds::default().periapsis(Some(70_000.0), None))
                            .in_order(),
                    )
                    .build()
                    .unwrap(),
            )
            .unwrap();
        let mut registry = Registry::new(store);
        let mut sink = RecordingSink::new();
        let id = registry.offer("chain", 0.0, &mut sink).unwrap();
        registry.tick(1.0, None, &mut sink);

        let samples = [telemetry("v1", 80_000.0), telemetry("v2", 80_000.0)];
        registry.tick_samples(2.0, &samples, &mut sink);

        let contract = registry.get(id).unwrap();
        assert_eq!(contract.status(), ContractStatus::Accepted);
        assert_eq!(contract.find_requirement("a").unwrap().status(), RequirementStatus::Achieved);
        assert_eq!(contract.find_requirement("b").unwrap().status(), RequirementStatus::Tracked);
    }

    #[test]
    fn test_samples_pick_the_bound_vessel() {
        let mut registry = Registry::new(store());
        let mut sink = RecordingSink::new();
        let id = registry.offer("orbit", 0.0, &mut sink).unwrap();
        registry.accept(id, 0.0, &mut sink).unwrap();
        registry.bind_vessel(id, "v2").unwrap();

        let samples = [telemetry("v1", 10_000.0), telemetry("v2", 80_000.0)];
        let report = registry.tick_samples(1.0, &samples, &mut sink);
        assert_eq!(report.changed, vec![id]);
        assert_eq!(registry.get(id).unwrap().status(), ContractStatus::Completed);

        let mut idle = Registry::new(store());
        let other = idle.offer("orbit", 0.0, &mut sink).unwrap();
        idle.accept(other, 0.0, &mut sink).unwrap();
        idle.bind_vessel(other, "v9").unwrap();
        assert!(idle.tick_samples(1.0, &samples, &mut sink).changed.is_empty());
        assert_eq!(idle.active().len(), 1);
    }

    #[test]
    fn test_generate_offers_honours_prerequisites() {
        let mut registry = Registry::new(store());
        let mut sink = RecordingSink::new();

        let first = registry.generate_offers(0.0, &mut sink);
        assert_eq!(first.len(), 2);
        // One open instance each blocks a second round.
        assert!(registry.generate_offers(1.0, &mut sink).is_empty());

        // The tutorial completes and is capped at one completion.
        registry.tick(2.0, None, &mut sink);
        let tutorial = registry
            .contracts()
            .find(|c| c.blueprint().id == "tutorial")
            .unwrap();
        assert_eq!(tutorial.status(), ContractStatus::Completed);
        assert!(registry.generate_offers(3.0, &mut sink).is_empty());
    }

    #[test]
    fn test_snapshots_filter() {
        let mut registry = Registry::new(store());
        let mut sink = RecordingSink::new();
        registry.offer("orbit", 0.0, &mut sink).unwrap();
        registry.offer("tutorial", 0.0, &mut sink).unwrap();

        assert_eq!(registry.snapshots(None).len(), 2);
        let offered = registry.snapshots(Some(ContractFilter::Offered));
        assert_eq!(offered.len(), 1);
        assert_eq!(offered[0].blueprint_id, "orbit");
        assert_eq!(registry.snapshots(Some(ContractFilter::Finished)).len(), 0);
    }

    #[test]
    fn test_save_and_restore() {
        let mut registry = Registry::new(store());
        let mut sink = RecordingSink::new();
        let id = registry.offer("orbit", 0.0, &mut sink).unwrap();
        registry.accept(id, 1.0, &mut sink).unwrap();
        registry.offer("orbit", 10.0, &mut sink).unwrap();

        let save = registry.to_save(10.0);
        let (restored, report) = Registry::restore(store(), &save).unwrap();

        assert_eq!(report.restored, 2);
        assert!(report.failed.is_empty());
        assert_eq!(restored.active().len(), 1);
        assert_eq!(restored.offered().len(), 1);
        assert_eq!(restored.to_save(10.0).active, save.active);
    }

    #[test]
    fn test_restore_drops_unresolvable_contracts() {
        let mut registry = Registry::new(store());
        let mut sink = RecordingSink::new();
        registry.offer("orbit", 0.0, &mut sink).unwrap();
        registry.offer("tutorial", 0.0, &mut sink).unwrap();
        let save = registry.to_save(0.0);

        let mut partial = BlueprintStore::new();
        partial
            .register(ContractBlueprint::builder("tutorial").build().unwrap())
            .unwrap();

        let (restored, report) = Registry::restore(partial, &save).unwrap();
        assert_eq!(report.restored, 1);
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].is_resolution_failure());
        assert_eq!(restored.len(), 1);
    }
}
