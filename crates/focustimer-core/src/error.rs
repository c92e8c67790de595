//! Core error types for focustimer-core.
//!
//! Storage failures are split into write and read failures so callers can
//! tell a lost contribution apart from an unreadable aggregate. Neither is
//! retried here.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for focustimer-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The timer service task is gone.
    #[error("Timer service stopped")]
    ServiceStopped,
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// A session record could not be appended.
    #[error("Failed to save session for {date}: {message}")]
    WriteFailed { date: String, message: String },

    /// Records for a date could not be read.
    #[error("Failed to read sessions for {date}: {message}")]
    ReadFailed { date: String, message: String },

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,
}

impl DatabaseError {
    pub(crate) fn write(date: &str, err: impl std::fmt::Display) -> Self {
        DatabaseError::WriteFailed {
            date: date.to_string(),
            message: err.to_string(),
        }
    }

    pub(crate) fn read(date: &str, err: impl std::fmt::Display) -> Self {
        DatabaseError::ReadFailed {
            date: date.to_string(),
            message: err.to_string(),
        }
    }
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

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Could not determine or create the data directory
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Unknown timer type key
    #[error("Unknown timer type '{0}' (expected focus, short-break or long-break)")]
    UnknownTimerType(String),
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
