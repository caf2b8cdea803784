mod config;
pub mod database;
pub mod migrations;

pub use config::{
    GoldConfig, PenaltyConfig, PlannerConfig, ProgressionConfig, RecoveryConfig, RulesConfig,
    ScheduleConfig,
};
pub use database::{Database, HistoryEntry};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Mutex;

use crate::engine::GameState;
use crate::error::StoreError;

/// Highest snapshot layout this build reads and the one it writes.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Returns the data directory.
///
/// `QUESTLOG_DATA_DIR` wins if set; otherwise `~/.config/questlog[-dev]/`
/// based on `QUESTLOG_ENV`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, StoreError> {
    let dir = match std::env::var_os("QUESTLOG_DATA_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("QUESTLOG_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("questlog-dev")
            } else {
                base_dir.join("questlog")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| StoreError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}

/// Versioned serialization of the whole aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub state: GameState,
}

impl Snapshot {
    pub fn new(state: GameState, saved_at: DateTime<Utc>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            saved_at,
            state,
        }
    }

    /// # Errors
    /// Fails on malformed JSON or a version newer than [`SNAPSHOT_VERSION`].
    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        #[derive(Deserialize)]
        struct VersionProbe {
            version: u32,
        }
        let probe: VersionProbe = serde_json::from_str(json)?;
        if probe.version > SNAPSHOT_VERSION {
            return Err(StoreError::UnsupportedVersion {
                found: probe.version,
                supported: SNAPSHOT_VERSION,
            });
        }
        Ok(serde_json::from_str(json)?)
    }

    /// # Errors
    /// Fails only if serialization fails.
    pub fn to_json(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Durable home for engine snapshots. Saves are best-effort: the engine
/// logs failures and carries on with its in-memory state.
pub trait StateStore {
    /// # Errors
    /// Returns an error if the backing store cannot be read or decoded.
    fn load(&self) -> Result<Option<Snapshot>, StoreError>;

    /// # Errors
    /// Returns an error if the snapshot could not be written.
    fn save(&self, snapshot: &Snapshot) -> Result<(), StoreError>;
}

/// In-process store holding the last saved snapshot as JSON.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slot: Mutex<Option<String>>,
    saves: Mutex<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        *self.saves.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn raw(&self) -> Option<String> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl StateStore for MemoryStore {
    fn load(&self) -> Result<Option<Snapshot>, StoreError> {
        self.raw().as_deref().map(Snapshot::from_json).transpose()
    }

    fn save(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        let json = snapshot.to_json()?;
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = Some(json);
        *self.saves.lock().unwrap_or_else(|e| e.into_inner()) += 1;
        Ok(())
    }
}

impl<S: StateStore + ?Sized> StateStore for &S {
    fn load(&self) -> Result<Option<Snapshot>, StoreError> {
        (**self).load()
    }

    fn save(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        (**self).save(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::RulesConfig;

    fn snapshot() -> Snapshot {
        let now = Utc::now();
        Snapshot::new(GameState::new("tester", &RulesConfig::default(), now), now)
    }

    #[test]
    fn memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert!(store.load().unwrap().is_none());

        store.save(&snapshot()).unwrap();
        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.version, SNAPSHOT_VERSION);
        assert_eq!(loaded.state.user.name, "tester");
        assert_eq!(store.save_count(), 1);
    }

    #[test]
    fn newer_snapshot_rejected() {
        let mut json: serde_json::Value =
            serde_json::from_str(&snapshot().to_json().unwrap()).unwrap();
        json["version"] = serde_json::json!(SNAPSHOT_VERSION + 1);
        let err = Snapshot::from_json(&json.to_string()).unwrap_err();
        assert!(matches!(err, StoreError::UnsupportedVersion { .. }));
    }

    #[test]
    fn malformed_snapshot_is_an_error() {
        assert!(matches!(
            Snapshot::from_json("{not json"),
            Err(StoreError::Json(_))
        ));
    }
}
