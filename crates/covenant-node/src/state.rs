//! Application state.

use std::collections::BTreeMap;
use std::sync::Arc;

use covenant_core::{Result, UniversalTime, VesselTelemetry};
use covenant_engine::{Notification, NotificationSink, RecordingSink, TracingSink};
use covenant_state::{InMemorySaveStore, Registry, SaveGame, SaveStore};
use serde::Serialize;
use tokio::sync::RwLock;

/// Simulation clock advanced by the engine loop.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SimClock {
    pub universal_time: UniversalTime,
    pub ticks: u64,
}

impl SimClock {
    pub fn starting_at(universal_time: UniversalTime) -> Self {
        Self {
            universal_time,
            ticks: 0,
        }
    }

    /// Advance by `seconds` and return the new time.
    pub fn advance(&mut self, seconds: f64) -> UniversalTime {
        self.universal_time += seconds;
        self.ticks += 1;
        self.universal_time
    }
}

/// Notification sink that logs every message and keeps it for the API.
#[derive(Debug, Default)]
pub struct Inbox {
    log: TracingSink,
    kept: RecordingSink,
}

impl Inbox {
    pub fn notifications(&self) -> &[Notification] {
        self.kept.notifications()
    }

    pub fn drain(&mut self) -> Vec<Notification> {
        self.kept.drain()
    }
}

impl NotificationSink for Inbox {
    fn deliver(&mut self, title: &str, uid: &str, message: &str, blocking: bool) {
        self.log.deliver(title, uid, message, blocking);
        self.kept.deliver(title, uid, message, blocking);
    }
}

/// Shared application state.
///
/// Locks are always taken in field order: registry, clock, telemetry, inbox.
#[derive(Clone)]
pub struct AppState {
    /// Blueprints and every contract instance.
    pub registry: Arc<RwLock<Registry>>,

    pub clock: Arc<RwLock<SimClock>>,

    /// Latest telemetry per vessel, consumed by the next tick.
    pub telemetry: Arc<RwLock<BTreeMap<String, VesselTelemetry>>>,

    /// Delivered notifications.
    pub inbox: Arc<RwLock<Inbox>>,

    /// Save game destination.
    pub saves: Arc<dyn SaveStore>,
}

impl AppState {
    pub fn new(registry: Registry, clock: SimClock, saves: Arc<dyn SaveStore>) -> Self {
        Self {
            registry: Arc::new(RwLock::new(registry)),
            clock: Arc::new(RwLock::new(clock)),
            telemetry: Arc::new(RwLock::new(BTreeMap::new())),
            inbox: Arc::new(RwLock::new(Inbox::default())),
            saves,
        }
    }

    /// State starting at time zero with an in-memory save store.
    pub fn in_memory(registry: Registry) -> Self {
        Self::new(registry, SimClock::default(), Arc::new(InMemorySaveStore::new()))
    }

    /// Current simulation time.
    pub async fn now(&self) -> UniversalTime {
        self.clock.read().await.universal_time
    }

    /// Queue telemetry for the next tick, replacing any earlier sample from the same vessel.
    pub async fn push_telemetry(&self, telemetry: VesselTelemetry) {
        self.telemetry
            .write()
            .await
            .insert(telemetry.vessel_id.clone(), telemetry);
    }

    /// Write a save game of the current registry.
    pub async fn save(&self) -> Result<SaveGame> {
        let save = {
            let registry = self.registry.read().await;
            let now = self.now().await;
            registry.to_save(now)
        };

        let saves = Arc::clone(&self.saves);
        let written = save.clone();
        tokio::task::spawn_blocking(move || saves.save(&written))
            .await
            .map_err(|err| covenant_core::CovenantError::Io(err.to_string()))??;
        Ok(save)
    }
}
