//! Core error types for teaready-core.
//!
//! Only user-initiated operations surface errors. Stale or half-written
//! session state is recovered inside the session machine and never shows up
//! here.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for teaready-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// The deferred-event scheduler refused a request
    #[error("Scheduling error: {0}")]
    Scheduling(#[from] SchedulingError),

    /// Key-value persistence errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// The scheduler did not hand out a usable wakeup id.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulingError {
    /// Scheduler returned a non-positive id (slot exhaustion, time conflict, ...)
    #[error("scheduler refused wakeup at {at} (code {code})")]
    Refused {
        at: chrono::DateTime<chrono::Utc>,
        code: i32,
    },
}

/// Persistent store errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Failed to open the backing database
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// A stored value could not be decoded
    #[error("Corrupt value for key '{key}': {value}")]
    Corrupt { key: String, value: String },

    /// Database is locked
    #[error("Database is locked")]
    Locked,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Could not determine or create the data directory
    #[error("Data directory unavailable: {0}")]
    DataDir(String),

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("unknown config key: {0}")]
    UnknownKey(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Catalog lookup out of range
    #[error("Index {index} out of bounds for {collection} (length: {len})")]
    OutOfBounds {
        collection: String,
        index: usize,
        len: usize,
    },

    /// No catalog entry with that name
    #[error("No tea named '{0}'")]
    UnknownTea(String),

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },

    /// Operation not valid in the current phase
    #[error("Cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: String,
    },
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(err, _msg) => {
                if matches!(
                    err.code,
                    rusqlite::ErrorCode::DatabaseLocked | rusqlite::ErrorCode::DatabaseBusy
                ) {
                    StorageError::Locked
                } else {
                    StorageError::QueryFailed(err.to_string())
                }
            }
            _ => StorageError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Storage(err.into())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
