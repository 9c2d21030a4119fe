//! Configuration file support for medrem.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/medrem/config.toml`.

use crate::{Error, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub history: HistoryConfig,

    #[serde(default)]
    pub display: DisplayConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Path of the medicines/reminders document inside a data directory
pub fn registry_path(data_dir: &Path) -> PathBuf {
    data_dir.join("registry.json")
}

/// Path of the dose record log inside a data directory
pub fn records_path(data_dir: &Path) -> PathBuf {
    data_dir.join("doses.jsonl")
}

/// Dose history retention
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Records older than this are removed by `purge` without an explicit age
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
        }
    }
}

/// Output formatting
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// chrono strftime pattern used when printing dose times
    #[serde(default = "default_time_format")]
    pub time_format: String,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            time_format: default_time_format(),
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));
    base.join("medrem")
}

fn default_retention_days() -> u32 {
    90
}

fn default_time_format() -> String {
    "%Y-%m-%d %H:%M".into()
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
            .unwrap_or_else(|| PathBuf::from("."));
        base.join("medrem").join("config.toml")
    }

    /// Reject values that would make commands misbehave
    pub fn validate(&self) -> Result<()> {
        if self.history.retention_days == 0 {
            return Err(Error::Config(
                "history.retention_days must be at least 1".into(),
            ));
        }
        let format = &self.display.time_format;
        if format.trim().is_empty() {
            return Err(Error::Config("display.time_format is empty".into()));
        }
        // Formatting fails for unknown specifiers and for ones that need a
        // timezone, which a wall-clock time doesn't carry
        let sample = NaiveDate::from_ymd_opt(2024, 1, 1)
            .and_then(|d| d.and_hms_opt(8, 0, 0))
            .ok_or_else(|| Error::Config("invalid sample time".into()))?;
        let mut rendered = String::new();
        if write!(rendered, "{}", sample.format(format)).is_err() {
            return Err(Error::Config(format!(
                "display.time_format {:?} is not a valid strftime pattern for local times",
                format
            )));
        }
        Ok(())
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}
