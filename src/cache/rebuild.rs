//! Rebuilding a standalone repository from the cache
//!
//! The rebuild replays the index through the deployer instead of copying the
//! store, so the result has exactly the layout a live deploy would produce.

use crate::cache::index::CacheIndex;
use crate::cache::root::CacheRoot;
use crate::coordinate::ArtifactCoordinate;
use crate::error::{RepoCacheError, RepoCacheResult};
use crate::repository::{ArtifactDeployer, ResolvedArtifact};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// Prefix of rebuilt repository directories in the system temp dir
pub const REBUILD_DIR_PREFIX: &str = "repocache-rebuild-";

/// A rebuilt repository in a temporary directory
///
/// The caller owns it: dropping the handle deletes the directory, [`keep`]
/// detaches it and hands the path over.
///
/// [`keep`]: TemporaryRepository::keep
#[derive(Debug)]
pub struct TemporaryRepository {
    dir: TempDir,
    artifacts: usize,
}

impl TemporaryRepository {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Number of artifacts deployed into the repository
    pub fn artifact_count(&self) -> usize {
        self.artifacts
    }

    /// Path where `coordinate` lives in this repository's layout
    pub fn artifact_path(&self, coordinate: &ArtifactCoordinate) -> PathBuf {
        self.dir.path().join(coordinate.layout_path())
    }

    /// Standard layout lookup
    pub fn contains(&self, coordinate: &ArtifactCoordinate) -> bool {
        self.artifact_path(coordinate).is_file()
    }

    /// Stop managing the directory and return its path
    pub fn keep(self) -> PathBuf {
        self.dir.keep()
    }

    /// Delete the directory now, reporting failures
    pub fn close(self) -> RepoCacheResult<()> {
        let path = self.dir.path().to_path_buf();
        self.dir
            .close()
            .map_err(|e| RepoCacheError::io(format!("removing {}", path.display()), e))
    }
}

/// Deploy every entry of `index` into a fresh temporary repository
///
/// The index must already have been checked with
/// [`CacheIndex::ensure_files_exist`].
pub async fn replay(
    root: &CacheRoot,
    index: &CacheIndex,
    deployer: &dyn ArtifactDeployer,
) -> RepoCacheResult<TemporaryRepository> {
    let dir = tempfile::Builder::new()
        .prefix(REBUILD_DIR_PREFIX)
        .tempdir()
        .map_err(|e| RepoCacheError::io("creating rebuild repository", e))?;
    debug!("Rebuilding repository in {}", dir.path().display());

    let artifacts: Vec<ResolvedArtifact> = index
        .entries()
        .iter()
        .map(|entry| {
            ResolvedArtifact::new(
                entry.coordinate.clone(),
                root.resolve_entry_path(&entry.relative_path),
            )
        })
        .collect();

    let deployed = deployer
        .deploy(dir.path(), &artifacts)
        .await
        .map_err(|e| RepoCacheError::Rebuild {
            reason: e.to_string(),
        })?;

    if deployed.len() != artifacts.len() {
        return Err(RepoCacheError::Rebuild {
            reason: format!(
                "deployer reported {} of {} artifacts",
                deployed.len(),
                artifacts.len()
            ),
        });
    }

    info!(
        "Rebuilt repository with {} artifacts at {}",
        artifacts.len(),
        dir.path().display()
    );

    Ok(TemporaryRepository {
        dir,
        artifacts: artifacts.len(),
    })
}
