//! Core error types for questlog-core.
//!
//! Rule violations are ordinary values: every mutating engine operation
//! validates first and returns one of these instead of touching state.

use std::path::PathBuf;
use thiserror::Error;

use crate::quest::QuotaSlot;

/// Error returned by the rules engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Operating on an unknown quest, subtask or planner task
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    /// The requested transition is not legal from the current state
    #[error("invalid transition for '{id}': {reason}")]
    InvalidTransition { id: String, reason: String },

    /// Daily quota for the slot is already consumed
    #[error("daily quota exceeded for {slot}")]
    QuotaExceeded { slot: QuotaSlot },

    /// Caller-supplied value rejected before any state change
    #[error("invalid value for '{field}': {message}")]
    InvalidInput { field: String, message: String },

    /// Surfaced from the persistence collaborator
    #[error("persistence unavailable: {0}")]
    PersistenceUnavailable(#[from] StoreError),
}

impl EngineError {
    pub(crate) fn quest_not_found(id: &str) -> Self {
        EngineError::NotFound {
            entity: "quest",
            id: id.to_string(),
        }
    }

    pub(crate) fn invalid(id: &str, reason: impl Into<String>) -> Self {
        EngineError::InvalidTransition {
            id: id.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn input(field: &str, message: impl Into<String>) -> Self {
        EngineError::InvalidInput {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Persistence-specific errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite failure
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Failed to open the database file
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Snapshot (de)serialization failed
    #[error("Snapshot encoding error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot written by a newer build
    #[error("Unsupported snapshot version {found} (this build reads up to {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    /// A stored row could not be decoded
    #[error("Corrupt event log entry {id}: {message}")]
    CorruptEntry { id: i64, message: String },

    /// Data directory could not be resolved or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::ParseFailed(err.to_string())
    }
}

/// Result type alias for EngineError
pub type Result<T, E = EngineError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_message_names_entity() {
        let err = EngineError::quest_not_found("q-1");
        assert_eq!(err.to_string(), "quest 'q-1' not found");
    }

    #[test]
    fn quota_message_names_slot() {
        let err = EngineError::QuotaExceeded {
            slot: QuotaSlot::Main,
        };
        assert_eq!(err.to_string(), "daily quota exceeded for main quest");
    }

    #[test]
    fn store_error_converts_into_engine_error() {
        let err: EngineError = StoreError::UnsupportedVersion {
            found: 9,
            supported: 1,
        }
        .into();
        assert!(matches!(err, EngineError::PersistenceUnavailable(_)));
    }
}
