//! TOML-based application configuration.
//!
//! Stored at `~/.config/focustimer/config.toml`. Keys are addressed with
//! dot paths (`timer.adjust_step_min`) by `get`/`set`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

use super::data_dir;
use super::database::DEFAULT_DATABASE_FILE;
use crate::error::{ConfigError, CoreError};
use crate::timer::TimerType;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerConfig {
    /// Minutes added or removed by one adjust step.
    #[serde(default = "default_adjust_step")]
    pub adjust_step_min: u32,
    /// Type the CLI starts on when `--type` is not given.
    #[serde(default)]
    pub default_type: TimerType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Database file name, relative to the data directory.
    #[serde(default = "default_database_file")]
    pub database_file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing` filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub timer: TimerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_adjust_step() -> u32 {
    1
}
fn default_database_file() -> String {
    DEFAULT_DATABASE_FILE.into()
}
fn default_log_filter() -> String {
    "info".into()
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            adjust_step_min: default_adjust_step(),
            default_type: TimerType::Focus,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_file: default_database_file(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

impl Config {
    fn lookup<'a>(root: &'a Value, key: &str) -> Option<&'a Value> {
        if key.is_empty() {
            return None;
        }
        key.split('.').try_fold(root, |current, part| current.get(part))
    }

    /// Replace the leaf at `key`, parsing `value` according to the type
    /// already stored there.
    fn assign(root: &mut Value, key: &str, value: &str) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let (parent_path, leaf) = match key.rsplit_once('.') {
            Some((parent, leaf)) => (Some(parent), leaf),
            None => (None, key),
        };
        if leaf.is_empty() {
            return Err(unknown());
        }

        let mut parent = root;
        if let Some(path) = parent_path {
            for part in path.split('.') {
                parent = parent.get_mut(part).ok_or_else(unknown)?;
            }
        }
        let obj = parent.as_object_mut().ok_or_else(unknown)?;
        let existing = obj.get(leaf).ok_or_else(unknown)?;

        let parsed = match existing {
            Value::Bool(_) => Value::Bool(
                value
                    .parse::<bool>()
                    .map_err(|e| invalid(e.to_string()))?,
            ),
            Value::Number(_) => Value::Number(
                value
                    .parse::<u64>()
                    .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?
                    .into(),
            ),
            Value::Object(_) | Value::Array(_) => {
                serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
            }
            _ => Value::String(value.into()),
        };
        obj.insert(leaf.to_string(), parsed);
        Ok(())
    }

    fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk, writing the defaults if no file exists yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, CoreError> {
        let path = Self::path()?;
        match std::fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content).map_err(|e| {
                CoreError::from(ConfigError::LoadFailed {
                    path,
                    message: e.to_string(),
                })
            }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save()?;
                Ok(cfg)
            }
            Err(err) => Err(ConfigError::LoadFailed {
                path,
                message: err.to_string(),
            }
            .into()),
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), CoreError> {
        let path = Self::path()?;
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.clone(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(&path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        match Self::lookup(&json, key)? {
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a value by dot-separated key and save.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value does not parse
    /// for that key, or the config cannot be saved.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), CoreError> {
        self.apply(key, value)?;
        self.save()
    }

    /// Set a value by dot-separated key without touching disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value does not parse.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<(), CoreError> {
        let mut json = serde_json::to_value(&*self)?;
        Self::assign(&mut json, key, value)?;
        *self = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// Absolute path of the session database.
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory is unavailable.
    pub fn database_path(&self) -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join(&self.storage.database_file))
    }
}
