//! Error types for repocache
//!
//! All modules use `RepoCacheResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for repocache operations
pub type RepoCacheResult<T> = Result<T, RepoCacheError>;

/// All errors that can occur in repocache
#[derive(Error, Debug)]
pub enum RepoCacheError {
    // Coordinate errors
    #[error("Invalid artifact coordinate '{input}': {reason}")]
    InvalidCoordinate { input: String, reason: String },

    // Index / store errors
    #[error("Corrupt cache index {path}{}: {reason}", line_suffix(.line))]
    CorruptIndex {
        path: PathBuf,
        line: Option<usize>,
        reason: String,
    },

    #[error("Unable to cache resolved artifacts: {reason}")]
    CachePopulation { reason: String },

    #[error("Unable to deploy artifacts to rebuild repository: {reason}")]
    Rebuild { reason: String },

    #[error("Failed to lock cache at {path}: {source}")]
    CacheLock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid cache root {path}: {reason}")]
    CacheRootInvalid { path: PathBuf, reason: String },

    // Repository errors
    #[error("Invalid repository URL '{url}': {reason}")]
    RepositoryInvalid { url: String, reason: String },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

fn line_suffix(line: &Option<usize>) -> String {
    line.map(|l| format!(" (line {l})")).unwrap_or_default()
}

impl RepoCacheError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create an invalid coordinate error
    pub fn invalid_coordinate(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidCoordinate {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Create a corrupt index error
    pub fn corrupt_index(
        path: impl Into<PathBuf>,
        line: Option<usize>,
        reason: impl Into<String>,
    ) -> Self {
        Self::CorruptIndex {
            path: path.into(),
            line,
            reason: reason.into(),
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::CachePopulation { .. } | Self::CacheLock { .. }
        )
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::CorruptIndex { .. } => Some(
                "Restore the missing files or remove the broken lines from cache.properties, then run: repocache populate",
            ),
            Self::CachePopulation { .. } => {
                Some("The cache store may be incomplete; the index was not updated. Re-run populate")
            }
            Self::InvalidCoordinate { .. } => {
                Some("Coordinates use the form group:name:extension:classifier:version")
            }
            Self::CacheLock { .. } => Some("Another repocache process may be using this cache"),
            _ => None,
        }
    }
}
