//! # Arbiter Configuration
//!
//! Tuning for the polling loop, persisted as TOML under the user's config
//! directory. A missing file is not an error: every field has a default and
//! the loop runs with those until a file is written.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::controller::axis_debouncer::{DEFAULT_DEADZONE, DEFAULT_REPEAT_DELAY_MS};

pub const CONFIG_DIR: &str = "input-arbiter";
pub const CONFIG_FILE: &str = "arbiter.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Polling loop settings.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ArbiterSettings {
    /// Stick magnitude at or below which the axis counts as centered
    pub deadzone: f32,
    /// Minimum time between two steps of the same axis for one listener
    pub repeat_delay_ms: u64,
    /// Frame period of the host driver (~60 Hz)
    pub frame_interval_ms: u64,
    /// Ticks between two diagnostic log lines
    pub stats_interval_ticks: u64,
    /// Name substrings of peripherals that expose a gamepad profile but are not controllers
    pub excluded_devices: Vec<String>,
}

impl Default for ArbiterSettings {
    fn default() -> Self {
        Self {
            deadzone: DEFAULT_DEADZONE,
            repeat_delay_ms: DEFAULT_REPEAT_DELAY_MS,
            frame_interval_ms: 16,
            stats_interval_ticks: 180,
            excluded_devices: vec!["Jabra".to_string(), "Evolve".to_string()],
        }
    }
}

impl ArbiterSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..1.0).contains(&self.deadzone) {
            return Err(ConfigError::Invalid(format!(
                "deadzone must be in [0, 1), got {}",
                self.deadzone
            )));
        }
        if self.repeat_delay_ms == 0 {
            return Err(ConfigError::Invalid(
                "repeat_delay_ms must be greater than zero".to_string(),
            ));
        }
        if self.frame_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "frame_interval_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| {
            warn!("Could not determine config directory, using current directory");
            PathBuf::from(".")
        });
        path.push(CONFIG_DIR);
        path.push(CONFIG_FILE);
        path
    }

    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            warn!(
                "Config file {} does not exist, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Self = toml::from_str(&content)?;
        settings.validate()?;
        debug!("Loaded settings from {}: {:?}", path.display(), settings);
        Ok(settings)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Settings saved to {}", path.display());
        Ok(())
    }

    /// Writes the default settings to `path` unless a file already exists there.
    pub fn ensure_default_config(path: &Path) -> Result<(), ConfigError> {
        if path.exists() {
            return Ok(());
        }
        info!("Creating default configuration at {}", path.display());
        Self::default().save_to(path)
    }
}
