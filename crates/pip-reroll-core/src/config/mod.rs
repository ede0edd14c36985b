//! Configuration for pip-reroll

mod live;

pub use live::{LiveSettings, SharedSettings};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::criteria::StopCriteria;
use crate::error::{Error, Result};
use crate::notify::{DEFAULT_SLOTS_PORT, DEFAULT_TOP_K};
use crate::vision::{CaptureGeometry, PaletteConfig};

/// Configuration for pip-reroll
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Record confirmed stops to the decision log
    pub enable_logging: bool,
    /// Forward detected ranks to the slot display
    pub enable_slots_socket: bool,
    /// Port the slot display listens on
    pub slots_socket_port: u16,
    /// Initial stop criteria
    pub criteria: StopCriteria,
    /// Initial capture region
    pub region: Option<CaptureGeometry>,
    /// Loop timing
    pub timing: TimingConfig,
    /// Built-in classifier settings
    pub classifier: PaletteConfig,
    /// Ranks forwarded to the slot display per update
    pub top_k: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enable_logging: false,
            enable_slots_socket: false,
            slots_socket_port: DEFAULT_SLOTS_PORT,
            criteria: StopCriteria::default(),
            region: None,
            timing: TimingConfig::default(),
            classifier: PaletteConfig::default(),
            top_k: DEFAULT_TOP_K,
        }
    }
}

/// Processing loop timing, all in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Sleep between iterations
    pub poll_delay_ms: u64,
    /// Wait before re-checking a stop condition
    pub confirm_delay_ms: u64,
    /// Sleep after a failed capture
    pub capture_retry_ms: u64,
    /// Sleep while no capture region is set
    pub idle_wait_ms: u64,
    /// Sleep after an iteration error
    pub error_backoff_ms: u64,
    /// Connect/write bound for slot display updates
    pub notify_timeout_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            poll_delay_ms: 20,
            confirm_delay_ms: 50,
            capture_retry_ms: 100,
            idle_wait_ms: 100,
            error_backoff_ms: 500,
            notify_timeout_ms: 50,
        }
    }
}

impl TimingConfig {
    pub fn poll_delay(&self) -> Duration {
        Duration::from_millis(self.poll_delay_ms)
    }

    pub fn confirm_delay(&self) -> Duration {
        Duration::from_millis(self.confirm_delay_ms)
    }

    pub fn capture_retry(&self) -> Duration {
        Duration::from_millis(self.capture_retry_ms)
    }

    pub fn idle_wait(&self) -> Duration {
        Duration::from_millis(self.idle_wait_ms)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }

    pub fn notify_timeout(&self) -> Duration {
        Duration::from_millis(self.notify_timeout_ms)
    }
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("pip-reroll").join("config.json"))
    }

    /// Load config from disk, falling back to defaults if not found or unreadable
    pub fn load() -> Self {
        Self::config_path()
            .and_then(|path| Self::load_from(&path).ok())
            .unwrap_or_default()
    }

    /// Load and validate config from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()
            .ok_or_else(|| Error::Config("No config directory available".into()))?;
        self.save_to(&path)
    }

    /// Save config to a specific file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject settings the processing loop cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(Error::Config("top_k must be at least 1".into()));
        }
        if self.classifier.min_area == 0 {
            return Err(Error::Config("classifier.min_area must be at least 1".into()));
        }
        if let Some(region) = &self.region {
            if !region.is_valid() {
                return Err(Error::Config(format!(
                    "region {} must have positive width and height",
                    region
                )));
            }
        }
        Ok(())
    }

    /// Live settings seeded from this config
    pub fn live_settings(&self) -> SharedSettings {
        SharedSettings::new(LiveSettings {
            criteria: self.criteria,
            region: self.region,
            poll_delay: self.timing.poll_delay(),
        })
    }
}
