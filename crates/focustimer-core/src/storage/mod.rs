mod aggregate;
mod config;
pub mod database;
pub mod migrations;
mod repository;

pub use aggregate::{date_key, DailyAggregate, DailyAggregateStore};
pub use config::{Config, LoggingConfig, StorageConfig, TimerConfig};
pub use database::Database;
pub use repository::{MemoryRepository, SessionRecord, SessionRepository};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns `~/.config/focustimer[-dev]/` based on FOCUSTIMER_ENV.
///
/// Set FOCUSTIMER_ENV=dev to use the development data directory, or
/// FOCUSTIMER_DATA_DIR to point somewhere else entirely.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("FOCUSTIMER_DATA_DIR") {
        Some(custom) => PathBuf::from(custom),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("FOCUSTIMER_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("focustimer-dev")
            } else {
                base_dir.join("focustimer")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
