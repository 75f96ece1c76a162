use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::constants;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub tracking: TrackingConfig,

    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// Debounce window between watermark writes, in milliseconds. Zero
    /// disables debouncing entirely.
    #[serde(default = "default_debounce_interval_ms")]
    pub debounce_interval_ms: u64,

    /// Playback sampling cadence in samples per second.
    #[serde(default = "default_sample_rate_hz")]
    pub sample_rate_hz: u32,

    /// Stored progress above this percentage restarts playback from zero.
    #[serde(default = "default_restart_threshold_percent")]
    pub restart_threshold_percent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            debug!("Loading config from {:?}", path);
            let contents = fs::read_to_string(path).context("Failed to read config file")?;
            let config: Config = toml::from_str(&contents).context("Failed to parse config file")?;
            Ok(config)
        } else {
            info!("No config file found, using defaults");
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, contents).context("Failed to write config file")?;

        debug!("Config saved to {:?}", path);
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Failed to get config directory")?;
        Ok(config_dir.join("watchmark").join("config.toml"))
    }
}

impl TrackingConfig {
    pub fn debounce_interval(&self) -> Duration {
        Duration::from_millis(self.debounce_interval_ms)
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.sample_rate_hz.max(1)))
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            debounce_interval_ms: default_debounce_interval_ms(),
            sample_rate_hz: default_sample_rate_hz(),
            restart_threshold_percent: default_restart_threshold_percent(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            auth_token: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_debounce_interval_ms() -> u64 {
    constants::DEFAULT_DEBOUNCE_INTERVAL.as_millis() as u64
}

fn default_sample_rate_hz() -> u32 {
    constants::DEFAULT_SAMPLE_RATE_HZ
}

fn default_restart_threshold_percent() -> f64 {
    constants::RESTART_THRESHOLD_PERCENT
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_request_timeout() -> u64 {
    10
}
