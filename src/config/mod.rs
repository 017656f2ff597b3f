//! Configuration management for repocache

pub mod schema;

pub use schema::Config;

use crate::error::{RepoCacheError, RepoCacheResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("repocache")
            .join("config.toml")
    }

    /// Load configuration, falling back to defaults if the file is missing
    pub async fn load(&self) -> RepoCacheResult<Config> {
        if !self.config_path.exists() {
            debug!("Config file not found, using defaults");
            return Ok(Config::default());
        }

        self.load_from_file(&self.config_path).await
    }

    /// Load configuration from a specific file
    pub async fn load_from_file(&self, path: &Path) -> RepoCacheResult<Config> {
        let content = fs::read_to_string(path).await.map_err(|e| {
            RepoCacheError::io(format!("reading config from {}", path.display()), e)
        })?;

        let config: Config =
            toml::from_str(&content).map_err(|e| RepoCacheError::ConfigInvalid {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        for repository in &config.repositories {
            repository
                .validate()
                .map_err(|e| RepoCacheError::ConfigInvalid {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })?;
        }
        if config.cache.concurrency == 0 {
            return Err(RepoCacheError::ConfigInvalid {
                path: path.to_path_buf(),
                reason: "cache.concurrency must be at least 1".to_string(),
            });
        }

        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self, config: &Config) -> RepoCacheResult<()> {
        self.ensure_config_dir().await?;

        let content = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, content).await.map_err(|e| {
            RepoCacheError::io(
                format!("writing config to {}", self.config_path.display()),
                e,
            )
        })?;

        info!("Configuration saved to {}", self.config_path.display());
        Ok(())
    }

    /// Ensure the config directory exists
    async fn ensure_config_dir(&self) -> RepoCacheResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| RepoCacheError::ConfigDirCreate {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }
        Ok(())
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}
