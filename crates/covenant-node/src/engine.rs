//! Tick loop.
//!
//! Each tick advances the simulation clock, offers any newly eligible
//! blueprints, runs one registry pass over the queued telemetry samples and
//! autosaves on its cadence. The registry write lock is
//! held for the whole tick.

use std::sync::Arc;

use covenant_state::TickReport;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::config::NodeConfig;
use crate::state::AppState;

/// The simulation engine.
pub struct Engine {
    state: AppState,
    config: NodeConfig,
}

impl Engine {
    pub fn new(state: AppState, config: NodeConfig) -> Self {
        Self { state, config }
    }

    /// Run the tick loop forever.
    pub async fn run(self: Arc<Self>) {
        info!(
            "🔧 Engine started ({} ms per tick, {} s simulated)",
            self.config.tick_interval_ms, self.config.seconds_per_tick
        );

        let mut ticker = interval(self.config.tick_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.step().await;
        }
    }

    /// Run a single tick.
    pub async fn step(&self) -> TickReport {
        let (report, ticks) = {
            let mut registry = self.state.registry.write().await;
            let (now, ticks) = {
                let mut clock = self.state.clock.write().await;
                let now = clock.advance(self.config.seconds_per_tick);
                (now, clock.ticks)
            };
            let pending = std::mem::take(&mut *self.state.telemetry.write().await);
            let mut inbox = self.state.inbox.write().await;

            if self.config.generate_offers {
                registry.generate_offers(now, &mut *inbox);
            }

            let samples: Vec<_> = pending.into_values().collect();
            let report = registry.tick_samples(now, &samples, &mut *inbox);

            if !report.changed.is_empty() {
                info!(
                    at = now,
                    changed = report.changed.len(),
                    actions = report.actions_fired,
                    "Tick changed contracts"
                );
            } else {
                debug!(at = now, samples = samples.len(), "Tick");
            }
            (report, ticks)
        };

        if self.config.autosave_every > 0 && ticks % self.config.autosave_every == 0 {
            match self.state.save().await {
                Ok(save) => debug!(contracts = save.len(), "💾 Autosaved"),
                Err(err) => error!("❌ Autosave failed: {}", err),
            }
        }

        report
    }
}
