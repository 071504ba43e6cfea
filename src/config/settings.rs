//! Application configuration

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use zen_sens_core::DEFAULT_UPDATE_INTERVAL_MS;
use zen_sens_types::SourcesConfig;

fn default_version() -> u32 {
    1
}

fn default_update_interval_ms() -> u64 {
    DEFAULT_UPDATE_INTERVAL_MS
}

/// Application-wide configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    /// Version of the config format
    #[serde(default = "default_version")]
    pub version: u32,
    /// Delay between update cycles
    #[serde(default = "default_update_interval_ms")]
    pub update_interval_ms: u64,
    /// Sensor source settings
    #[serde(default)]
    pub sources: SourcesConfig,
}

impl AppConfig {
    /// Load configuration from disk, or defaults if there is none yet
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            return Ok(Self::default());
        }

        Self::load_from_path(&config_path)
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;
        self.save_to_path(&config_path)
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("com", "github.zen_sens", "zen-sens")
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

        Ok(dirs.config_dir().join("config.json"))
    }

    /// Load configuration from a specific file path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a specific file path
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Update interval, never shorter than one millisecond
    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms.max(1))
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            update_interval_ms: default_update_interval_ms(),
            sources: SourcesConfig::default(),
        }
    }
}
