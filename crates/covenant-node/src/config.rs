//! Node configuration.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "COVENANT_LOG";

/// Runtime settings for the node.
///
/// Every field has a default, so a partial JSON file is enough.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Address the HTTP API listens on.
    pub bind_address: SocketAddr,

    /// JSON array of blueprints loaded at startup.
    pub blueprint_path: Option<PathBuf>,

    /// Save game file. Without one, saves are kept in memory only.
    pub save_path: Option<PathBuf>,

    /// Wall-clock time between ticks, in milliseconds.
    pub tick_interval_ms: u64,

    /// Simulation seconds that elapse per tick.
    pub seconds_per_tick: f64,

    /// Save every this many ticks. Zero disables autosave.
    pub autosave_every: u64,

    /// Offer blueprints automatically as their prerequisites are met.
    pub generate_offers: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 3000)),
            blueprint_path: None,
            save_path: None,
            tick_interval_ms: 1000,
            seconds_per_tick: 1.0,
            autosave_every: 60,
            generate_offers: true,
        }
    }
}

impl NodeConfig {
    /// Read a config file, or fall back to defaults when no path is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Self = serde_json::from_str(&json)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.tick_interval_ms > 0, "tick_interval_ms must be positive");
        anyhow::ensure!(
            self.seconds_per_tick.is_finite() && self.seconds_per_tick >= 0.0,
            "seconds_per_tick must be a non-negative number"
        );
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}
