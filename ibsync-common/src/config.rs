//! Configuration loading and data folder resolution
//!
//! Resolution priority for the data folder:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable `IBSYNC_DATA_DIR`
//! 3. TOML config file (`data_dir`)
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing or unreadable TOML file never aborts startup; defaults are used
//! and a warning is logged.

use crate::{Error, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Environment variable overriding the data folder
pub const DATA_DIR_ENV: &str = "IBSYNC_DATA_DIR";

/// Quiet period between the last mutation and the remote flush attempt
pub const DEFAULT_DEBOUNCE_MS: u64 = 2_000;

/// Age under which a local copy is preferred over an undated remote copy
pub const DEFAULT_FRESHNESS_HOURS: i64 = 24;

/// Undo entries kept per dataset
pub const DEFAULT_HISTORY_DEPTH: usize = 50;

/// Logging section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Persistence timing and history bounds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    pub debounce_ms: u64,
    pub freshness_hours: i64,
    pub history_depth: usize,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            freshness_hours: DEFAULT_FRESHNESS_HOURS,
            history_depth: DEFAULT_HISTORY_DEPTH,
        }
    }
}

impl SyncSettings {
    pub fn debounce(&self) -> std::time::Duration {
        crate::time::millis_to_duration(self.debounce_ms)
    }

    /// Age after which a local copy no longer beats the remote one
    ///
    /// Negative or out-of-range hours fall back to the default.
    pub fn freshness(&self) -> chrono::Duration {
        chrono::Duration::try_hours(self.freshness_hours)
            .filter(|d| *d >= chrono::Duration::zero())
            .unwrap_or_else(|| {
                warn!(
                    freshness_hours = self.freshness_hours,
                    fallback = DEFAULT_FRESHNESS_HOURS,
                    "Invalid freshness window, using default"
                );
                chrono::Duration::hours(DEFAULT_FRESHNESS_HOURS)
            })
    }
}

/// On-disk configuration (`config.toml`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub data_dir: Option<PathBuf>,
    /// Base URL of the remote store, e.g. `http://127.0.0.1:5740`
    pub remote_url: Option<String>,
    /// Fixed assignment date; today when unset
    pub assignment_date: Option<NaiveDate>,
    pub logging: LoggingConfig,
    pub sync: SyncSettings,
}

/// Default location of the config file for the platform
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("ibsync").join("config.toml"))
}

/// Load a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    let config = toml::from_str(&content)?;
    Ok(config)
}

/// Load config from `path` (or the platform default), falling back to defaults
pub fn load_or_default(path: Option<&Path>) -> TomlConfig {
    let path = match path.map(Path::to_path_buf).or_else(default_config_path) {
        Some(p) => p,
        None => return TomlConfig::default(),
    };

    if !path.exists() {
        tracing::debug!(path = %path.display(), "No config file, using defaults");
        return TomlConfig::default();
    }

    match load_toml_config(&path) {
        Ok(config) => config,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Unreadable config file, using defaults");
            TomlConfig::default()
        }
    }
}

/// Write config atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp = path.with_extension("toml.tmp");
    std::fs::write(&tmp, content)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Resolve the data folder following the documented priority order
pub fn resolve_data_dir(cli_arg: Option<&Path>, config: &TomlConfig) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(DATA_DIR_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(path) = &config.data_dir {
        return path.clone();
    }

    // Priority 4: OS-dependent compiled default
    default_data_dir()
}

/// OS-dependent default data folder
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("ibsync"))
        .unwrap_or_else(|| PathBuf::from("./ibsync_data"))
}
