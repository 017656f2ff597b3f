//! Configuration schema for repocache
//!
//! Configuration is stored at `~/.config/repocache/config.toml`

use crate::cache::manager::DEFAULT_CONCURRENCY;
use crate::repository::{default_remote_repositories, RemoteRepository};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Cache location and populate tuning
    pub cache: CacheConfig,

    /// Remote repositories consulted by populate, in order
    pub repositories: Vec<RemoteRepository>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            cache: CacheConfig::default(),
            repositories: default_remote_repositories(),
        }
    }
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,

    /// Enable audit logging
    pub audit_log: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
            audit_log: true,
        }
    }
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache root directory (default: `<data dir>/repocache`)
    pub root: Option<PathBuf>,

    /// Maximum concurrent resolutions during populate
    pub concurrency: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: None,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl CacheConfig {
    /// Configured root, or the per-user data directory
    pub fn root_or_default(&self) -> PathBuf {
        self.root.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("repocache")
        })
    }
}
