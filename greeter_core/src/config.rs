//! Configuration file support for Greeter.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/greeter/config.toml`.

use crate::catalog::{get_default_content_table, get_default_registry_table};
use crate::{ContentTable, Error, RegistryTable, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub registry: TableConfig,

    #[serde(default)]
    pub content: TableConfig,
}

/// Selection engine tuning
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Per-predicate deadline in milliseconds
    #[serde(default = "default_predicate_timeout_ms")]
    pub predicate_timeout_ms: u64,

    /// Fixed sampling seed; unset means a fresh OS seed per call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            predicate_timeout_ms: default_predicate_timeout_ms(),
            seed: None,
        }
    }
}

/// Location of an operator-supplied table; built-in table when unset
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct TableConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

// Default value functions
fn default_predicate_timeout_ms() -> u64 {
    3000
}

impl EngineConfig {
    pub fn predicate_timeout(&self) -> Duration {
        Duration::from_millis(self.predicate_timeout_ms)
    }
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_path
            );
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
        let base = dirs::config_dir().unwrap_or_else(|| {
            std::env::var_os("HOME")
                .map(PathBuf::from)
                .unwrap_or_default()
                .join(".config")
        });
        base.join("greeter").join("config.toml")
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.engine.predicate_timeout_ms == 0 {
            return Err(Error::Config(
                "engine.predicate_timeout_ms must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Registry table from `registry.path`, or the built-in table
    pub fn registry_table(&self) -> Result<RegistryTable> {
        match &self.registry.path {
            Some(path) => RegistryTable::load_from(path),
            None => Ok(get_default_registry_table().clone()),
        }
    }

    /// Content table from `content.path`, or the built-in table
    pub fn content_table(&self) -> Result<ContentTable> {
        match &self.content.path {
            Some(path) => ContentTable::load_from(path),
            None => Ok(get_default_content_table().clone()),
        }
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
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
