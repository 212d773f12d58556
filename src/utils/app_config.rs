/// Application configuration management
/// Stores monitor tuning in ~/.config/pulsemon/config.toml

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::ChannelPolicy;
use crate::utils::constants::*;

/// Durations are written as human strings ("200ms", "1s")
mod human_duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}

/// Periods and cadences: same format, but "0s" is refused
mod period {
    use serde::{Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        super::human_duration::serialize(value, serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let value = super::human_duration::deserialize(deserializer)?;
        if value.is_zero() {
            return Err(serde::de::Error::custom("period must be greater than zero"));
        }
        Ok(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CpuSettings {
    #[serde(with = "period")]
    pub interval: Duration,
    /// Moving-average window; "0s" disables smoothing
    #[serde(with = "human_duration")]
    pub smoothing: Duration,
    pub history_length: usize,
}

impl Default for CpuSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_CPU_INTERVAL,
            smoothing: DEFAULT_CPU_SMOOTHING,
            history_length: DEFAULT_HISTORY_LENGTH,
        }
    }
}

/// Shared shape for the memory and process monitors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    #[serde(with = "period")]
    pub interval: Duration,
    pub history_length: usize,
}

impl MonitorSettings {
    fn memory() -> Self {
        Self {
            interval: DEFAULT_MEMORY_INTERVAL,
            history_length: DEFAULT_HISTORY_LENGTH,
        }
    }

    fn process() -> Self {
        Self {
            interval: DEFAULT_PROCESS_INTERVAL,
            history_length: DEFAULT_HISTORY_LENGTH,
        }
    }
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self::memory()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelSettings {
    /// Snapshots held between polls; 0 means unbounded
    pub capacity: usize,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl ChannelSettings {
    pub fn policy(&self) -> ChannelPolicy {
        ChannelPolicy::from_capacity(self.capacity)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiSettings {
    #[serde(with = "period")]
    pub poll_cadence: Duration,
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            poll_cadence: DEFAULT_POLL_CADENCE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub cpu: CpuSettings,
    pub memory: MonitorSettings,
    pub process: MonitorSettings,
    pub channel: ChannelSettings,
    pub ui: UiSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cpu: CpuSettings::default(),
            memory: MonitorSettings::memory(),
            process: MonitorSettings::process(),
            channel: ChannelSettings::default(),
            ui: UiSettings::default(),
        }
    }
}

impl AppConfig {
    /// Get config file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine the user config directory")?
            .join(APP_NAME);
        Ok(config_dir.join("config.toml"))
    }

    /// Load from the default location, falling back to defaults if absent
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from file
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(config)
    }

    /// Save configuration to file, creating the directory if needed
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, contents).context("Failed to write config file")?;

        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }
}
