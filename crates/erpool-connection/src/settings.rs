//! Settings file utilities
//!
//! Pool options live under a `[pool]` table in a TOML file:
//!
//! ```toml
//! [pool]
//! max_pool_size = 20
//! max_idle_time_ms = 600000
//! enable_health_checks = true
//! ```
//!
//! Keys left out keep their defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{PoolError, PoolResult};
use crate::pool::PoolOptions;

/// Top-level layout of the settings file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    pub pool: PoolOptions,
}

pub fn config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .context("Could not determine config directory")
        .map(|p| p.join("erpool"))
}

pub fn default_settings_file() -> Result<PathBuf> {
    config_dir().map(|p| p.join("pool.toml"))
}

/// Parse and validate pool options from TOML text
pub fn parse_options(content: &str) -> PoolResult<PoolOptions> {
    let settings: PoolSettings =
        toml::from_str(content).map_err(|e| PoolError::Configuration(e.to_string()))?;
    settings.pool.validate()?;
    Ok(settings.pool)
}

/// Load pool options from a settings file
pub fn load_options(path: &Path) -> Result<PoolOptions> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings file: {:?}", path))?;
    let options = parse_options(&content)
        .with_context(|| format!("Invalid settings file: {:?}", path))?;
    tracing::debug!(path = ?path, max_pool_size = options.max_pool_size(), "pool options loaded");
    Ok(options)
}

/// Load pool options, falling back to defaults when the file does not exist
pub fn load_options_or_default(path: &Path) -> Result<PoolOptions> {
    if path.exists() {
        load_options(path)
    } else {
        tracing::debug!(path = ?path, "settings file not found, using default pool options");
        Ok(PoolOptions::default())
    }
}
