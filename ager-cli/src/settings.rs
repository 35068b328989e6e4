//! Configuration resolution for the ager CLI.
//!
//! Order: built-in defaults, then the TOML file, then command line flags.
//! A relative database path is taken relative to the data directory.

use ager_service::{Ager, Config};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Config file looked up in the data directory when `--config` is absent.
pub const CONFIG_FILE: &str = "ager.toml";

/// Resolve the effective configuration.
pub fn load(
    data_dir: &Path,
    config_path: Option<&Path>,
    database: Option<PathBuf>,
    min_frame_length: Option<u32>,
) -> Result<Config> {
    let mut config = match config_path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => {
            let default_path = data_dir.join(CONFIG_FILE);
            if default_path.exists() {
                Config::from_file(&default_path)
                    .with_context(|| format!("Failed to load config {}", default_path.display()))?
            } else {
                Config::default()
            }
        }
    };

    if let Some(database) = database {
        config.storage.database = database;
    }
    if config.storage.database.is_relative() {
        config.storage.database = data_dir.join(&config.storage.database);
    }
    if let Some(min) = min_frame_length {
        config.frames.min_frame_length = min;
    }

    tracing::debug!(?config, "Configuration resolved");
    Ok(config)
}

/// Open the configured store and build a tracker.
pub async fn open(config: &Config) -> Result<Ager> {
    Ager::from_config(config)
        .await
        .context("Failed to open ledger store")
}
