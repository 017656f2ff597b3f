//! Resolver fetching artifacts from standard-layout repositories over HTTP(S)
//! or from local `file://` repositories

use super::{ArtifactResolver, RemoteRepository, ResolutionFailure, ResolvedArtifact};
use crate::coordinate::ArtifactCoordinate;
use async_trait::async_trait;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Default timeout for a single artifact download
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Tries each repository in order; the first one holding the artifact wins.
///
/// Downloads land in `staging_dir` under the artifact's layout path. The
/// staging directory only needs to live until the artifacts are deployed.
#[derive(Clone)]
pub struct HttpResolver {
    agent: ureq::Agent,
    staging_dir: PathBuf,
}

impl HttpResolver {
    pub fn new(staging_dir: impl Into<PathBuf>) -> Self {
        Self::with_timeout(staging_dir, DEFAULT_DOWNLOAD_TIMEOUT)
    }

    pub fn with_timeout(staging_dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        Self {
            agent,
            staging_dir: staging_dir.into(),
        }
    }

    async fn fetch(
        &self,
        repository: &RemoteRepository,
        coordinate: &ArtifactCoordinate,
        dest: &Path,
    ) -> Result<(), String> {
        if let Some(root) = repository.file_path() {
            let source = root.join(coordinate.layout_path());
            if !source.is_file() {
                return Err("not found".to_string());
            }
            return copy_into(&source, dest).await.map_err(|e| e.to_string());
        }

        let url = repository.artifact_url(&coordinate.layout_url_path());
        let agent = self.agent.clone();
        let dest = dest.to_path_buf();
        tokio::task::spawn_blocking(move || download(&agent, &url, &dest))
            .await
            .map_err(|e| format!("download task failed: {}", e))?
    }
}

#[async_trait]
impl ArtifactResolver for HttpResolver {
    async fn resolve(
        &self,
        coordinate: &ArtifactCoordinate,
        repositories: &[RemoteRepository],
    ) -> Result<ResolvedArtifact, ResolutionFailure> {
        if repositories.is_empty() {
            return Err(ResolutionFailure::new(
                coordinate.clone(),
                "no repositories configured",
            ));
        }

        let dest = self.staging_dir.join(coordinate.layout_path());
        let mut reasons = Vec::with_capacity(repositories.len());

        for repository in repositories {
            match self.fetch(repository, coordinate, &dest).await {
                Ok(()) => {
                    debug!("Resolved {} from {}", coordinate, repository.id);
                    return Ok(ResolvedArtifact::new(coordinate.clone(), dest));
                }
                Err(reason) => {
                    debug!("{} not available from {}: {}", coordinate, repository.id, reason);
                    reasons.push(format!("{}: {}", repository.id, reason));
                }
            }
        }

        Err(ResolutionFailure::new(coordinate.clone(), reasons.join("; ")))
    }
}

/// Copy `source` to `dest` via a `.part` file
async fn copy_into(source: &Path, dest: &Path) -> io::Result<()> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let part = part_path(dest);
    tokio::fs::copy(source, &part).await?;
    tokio::fs::rename(&part, dest).await?;
    Ok(())
}

/// In-progress sibling of `dest`; the full file name is kept so artifacts
/// differing only by extension never share one
fn part_path(dest: &Path) -> PathBuf {
    let mut part = dest.as_os_str().to_owned();
    part.push(".part");
    PathBuf::from(part)
}

/// Blocking download of `url` to `dest`, via a `.part` file
fn download(agent: &ureq::Agent, url: &str, dest: &Path) -> Result<(), String> {
    let response = agent.get(url).call().map_err(|e| match e {
        ureq::Error::StatusCode(404) => "not found".to_string(),
        ureq::Error::StatusCode(code) => format!("HTTP {}", code),
        other => other.to_string(),
    })?;

    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("creating {}: {}", parent.display(), e))?;
    }

    let part = part_path(dest);
    let mut file =
        File::create(&part).map_err(|e| format!("creating {}: {}", part.display(), e))?;
    let mut reader = response.into_body().into_reader();
    io::copy(&mut reader, &mut file).map_err(|e| format!("reading {}: {}", url, e))?;
    std::fs::rename(&part, dest).map_err(|e| format!("moving into {}: {}", dest.display(), e))?;
    Ok(())
}
