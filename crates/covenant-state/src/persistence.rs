//! Save games.
//!
//! A [`SaveGame`] holds the id-only records of every contract collection plus
//! a SHA-256 digest over them and the simulation time. Blueprint content is
//! never written.

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use covenant_core::{ContractRecord, CovenantError, Result, UniversalTime};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

/// Current save format version.
pub const SAVE_VERSION: u32 = 1;

/// Persisted registry state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveGame {
    pub version: u32,

    /// Wall-clock time the save was written.
    pub saved_at: DateTime<Utc>,

    /// Simulation time the save was taken at.
    pub universal_time: UniversalTime,

    #[serde(default)]
    pub offered: Vec<ContractRecord>,

    #[serde(default)]
    pub active: Vec<ContractRecord>,

    #[serde(default)]
    pub finished: Vec<ContractRecord>,

    /// Hex SHA-256 over the version, simulation time and collections.
    pub checksum: String,
}

impl SaveGame {
    /// Build a save game and seal it with its checksum.
    pub fn new(
        universal_time: UniversalTime,
        offered: Vec<ContractRecord>,
        active: Vec<ContractRecord>,
        finished: Vec<ContractRecord>,
    ) -> Self {
        let mut save = Self {
            version: SAVE_VERSION,
            saved_at: Utc::now(),
            universal_time,
            offered,
            active,
            finished,
            checksum: String::new(),
        };
        save.checksum = save.compute_checksum();
        save
    }

    /// Digest of the format version, simulation time and contract collections.
    pub fn compute_checksum(&self) -> String {
        let content = serde_json::json!({
            "version": self.version,
            "universal_time": self.universal_time,
            "offered": self.offered,
            "active": self.active,
            "finished": self.finished,
        });

        let mut hasher = Sha256::new();
        hasher.update(content.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Check the format version and the stored checksum.
    pub fn verify(&self) -> Result<()> {
        if self.version != SAVE_VERSION {
            return Err(CovenantError::Serialization(format!(
                "unsupported save version {} (expected {})",
                self.version, SAVE_VERSION
            )));
        }
        let computed = self.compute_checksum();
        if computed != self.checksum {
            return Err(CovenantError::ChecksumMismatch {
                expected: self.checksum.clone(),
                computed,
            });
        }
        Ok(())
    }

    /// Total number of contract records.
    pub fn len(&self) -> usize {
        self.offered.len() + self.active.len() + self.finished.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Where save games live.
pub trait SaveStore: Send + Sync {
    /// Load the latest save, if any. A returned save has been verified.
    fn load(&self) -> Result<Option<SaveGame>>;

    /// Replace the stored save.
    fn save(&self, save: &SaveGame) -> Result<()>;
}

/// Save store backed by a single JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SaveStore for JsonFileStore {
    fn load(&self) -> Result<Option<SaveGame>> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "No save game found");
            return Ok(None);
        }

        let json = std::fs::read_to_string(&self.path)?;
        let save: SaveGame = serde_json::from_str(&json)?;
        save.verify()?;

        info!(
            path = %self.path.display(),
            contracts = save.len(),
            "Save game loaded"
        );
        Ok(Some(save))
    }

    fn save(&self, save: &SaveGame) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        // Write beside the target, then swap it in.
        let staging = self.path.with_extension("json.tmp");
        std::fs::write(&staging, serde_json::to_vec_pretty(save)?)?;
        std::fs::rename(&staging, &self.path)?;

        debug!(path = %self.path.display(), contracts = save.len(), "Save game written");
        Ok(())
    }
}

/// Save store that keeps the latest save in memory.
#[derive(Debug, Default)]
pub struct InMemorySaveStore {
    latest: RwLock<Option<SaveGame>>,
}

impl InMemorySaveStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> CovenantError {
    CovenantError::Io("save store lock poisoned".to_string())
}

impl SaveStore for InMemorySaveStore {
    fn load(&self) -> Result<Option<SaveGame>> {
        let latest = self.latest.read().map_err(|_| poisoned())?;
        match latest.as_ref() {
            Some(save) => {
                save.verify()?;
                Ok(Some(save.clone()))
            }
            None => Ok(None),
        }
    }

    fn save(&self, save: &SaveGame) -> Result<()> {
        *self.latest.write().map_err(|_| poisoned())? = Some(save.clone());
        Ok(())
    }
}
