//! Repository collaborators
//!
//! The cache core never talks to a network or lays out files itself. It
//! drives two capabilities:
//! - [`ArtifactResolver`]: coordinate + remote repositories -> local file
//! - [`ArtifactDeployer`]: resolved files -> repository-shaped directory

mod deployer;
mod remote;
mod resolver;

pub use deployer::LayoutDeployer;
pub use remote::{default_remote_repositories, RemoteRepository};
pub use resolver::HttpResolver;

use crate::coordinate::ArtifactCoordinate;
use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// An artifact whose bytes are available in a local file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedArtifact {
    pub coordinate: ArtifactCoordinate,
    pub file: PathBuf,
}

impl ResolvedArtifact {
    pub fn new(coordinate: ArtifactCoordinate, file: impl Into<PathBuf>) -> Self {
        Self {
            coordinate,
            file: file.into(),
        }
    }
}

/// Where the deployer put an artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployedArtifact {
    pub coordinate: ArtifactCoordinate,
    /// Absolute path of the written file
    pub path: PathBuf,
}

/// A single coordinate that could not be resolved from any repository
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Failed to resolve {coordinate}: {reason}")]
pub struct ResolutionFailure {
    pub coordinate: ArtifactCoordinate,
    pub reason: String,
}

impl ResolutionFailure {
    pub fn new(coordinate: ArtifactCoordinate, reason: impl Into<String>) -> Self {
        Self {
            coordinate,
            reason: reason.into(),
        }
    }
}

/// A batch deploy that failed as a whole
#[derive(Error, Debug)]
pub struct DeployFailure {
    pub reason: String,
    #[source]
    pub source: Option<std::io::Error>,
}

impl DeployFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            source: None,
        }
    }

    pub fn io(reason: impl Into<String>, source: std::io::Error) -> Self {
        Self {
            reason: reason.into(),
            source: Some(source),
        }
    }
}

impl fmt::Display for DeployFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{}: {}", self.reason, source),
            None => write!(f, "{}", self.reason),
        }
    }
}

/// Resolves a coordinate against remote repositories
///
/// Implementations own their own timeouts and retries. A failure for one
/// coordinate must not affect others.
#[async_trait]
pub trait ArtifactResolver: Send + Sync {
    /// Fetch the artifact and return a local file holding its bytes
    async fn resolve(
        &self,
        coordinate: &ArtifactCoordinate,
        repositories: &[RemoteRepository],
    ) -> Result<ResolvedArtifact, ResolutionFailure>;
}

/// Writes artifacts into a repository-shaped directory
#[async_trait]
pub trait ArtifactDeployer: Send + Sync {
    /// Deploy the whole batch under `target_root`
    ///
    /// Either every artifact is reported as deployed or the call fails.
    async fn deploy(
        &self,
        target_root: &Path,
        artifacts: &[ResolvedArtifact],
    ) -> Result<Vec<DeployedArtifact>, DeployFailure>;
}
