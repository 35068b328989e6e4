//! Configuration loading for Ager.
//!
//! Configuration is loaded from a TOML file (default: `ager.toml`).

use serde::Deserialize;
use std::path::PathBuf;

/// Root configuration for Ager.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Ledger storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Frame configuration.
    #[serde(default)]
    pub frames: FramesConfig,
    /// Periodic scheduler configuration.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

/// Which ledger store to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// SQLite database file.
    Sqlite,
    /// Process-local memory (lost on exit).
    Memory,
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Store backend (default: sqlite).
    #[serde(default = "default_backend")]
    pub backend: Backend,
    /// Path to SQLite database file (default: ager.db).
    #[serde(default = "default_database_path")]
    pub database: PathBuf,
}

/// Frame configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FramesConfig {
    /// Smallest frame length in seconds (default: 0 = real time).
    ///
    /// Above 1, every batched partition's frame length must be a multiple of
    /// it, and the scheduler walks frames at this stride.
    #[serde(default)]
    pub min_frame_length: u32,
}

/// Periodic scheduler configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between scheduler runs (default: 60).
    #[serde(default = "default_scheduler_interval")]
    pub interval_secs: u64,
    /// Enable the periodic scheduler in `serve` (default: true).
    #[serde(default = "default_scheduler_enabled")]
    pub enabled: bool,
}

// Default value functions
fn default_backend() -> Backend {
    Backend::Sqlite
}

fn default_database_path() -> PathBuf {
    PathBuf::from("ager.db")
}

fn default_scheduler_interval() -> u64 {
    60
}

fn default_scheduler_enabled() -> bool {
    true
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            database: default_database_path(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_scheduler_interval(),
            enabled: default_scheduler_enabled(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            frames: FramesConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that parse fine but cannot be used.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scheduler.enabled && self.scheduler.interval_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "scheduler.interval_secs",
                reason: "must be > 0 when the scheduler is enabled".to_string(),
            });
        }
        Ok(())
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// A value is out of range.
    #[error("invalid config value {field}: {reason}")]
    Invalid {
        /// Dotted field name.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}
