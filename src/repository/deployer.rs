//! Deploys artifacts into the standard repository layout

use super::{ArtifactDeployer, DeployFailure, DeployedArtifact, ResolvedArtifact};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Suffix of the checksum file written next to every deployed artifact
pub const CHECKSUM_SUFFIX: &str = "sha256";

/// Copies each artifact to `target_root/<layout path>` and writes a
/// `.sha256` checksum next to it.
///
/// Files are written to a `.part` sibling and renamed into place, so a
/// reader never sees a half-written artifact at its layout path.
#[derive(Debug, Clone, Default)]
pub struct LayoutDeployer;

impl LayoutDeployer {
    pub fn new() -> Self {
        Self
    }

    async fn deploy_one(
        &self,
        target_root: &Path,
        artifact: &ResolvedArtifact,
    ) -> Result<DeployedArtifact, DeployFailure> {
        let dest = target_root.join(artifact.coordinate.layout_path());

        let bytes = fs::read(&artifact.file).await.map_err(|e| {
            DeployFailure::io(
                format!(
                    "reading {} for {}",
                    artifact.file.display(),
                    artifact.coordinate
                ),
                e,
            )
        })?;

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                DeployFailure::io(format!("creating directory {}", parent.display()), e)
            })?;
        }

        let part = sibling(&dest, "part");
        fs::write(&part, &bytes)
            .await
            .map_err(|e| DeployFailure::io(format!("writing {}", part.display()), e))?;
        fs::rename(&part, &dest)
            .await
            .map_err(|e| DeployFailure::io(format!("moving into {}", dest.display()), e))?;

        let checksum = hex::encode(Sha256::digest(&bytes));
        let checksum_path = sibling(&dest, CHECKSUM_SUFFIX);
        fs::write(&checksum_path, checksum)
            .await
            .map_err(|e| DeployFailure::io(format!("writing {}", checksum_path.display()), e))?;

        debug!("Deployed {} to {}", artifact.coordinate, dest.display());

        Ok(DeployedArtifact {
            coordinate: artifact.coordinate.clone(),
            path: dest,
        })
    }
}

#[async_trait]
impl ArtifactDeployer for LayoutDeployer {
    async fn deploy(
        &self,
        target_root: &Path,
        artifacts: &[ResolvedArtifact],
    ) -> Result<Vec<DeployedArtifact>, DeployFailure> {
        let mut deployed = Vec::with_capacity(artifacts.len());
        for artifact in artifacts {
            deployed.push(self.deploy_one(target_root, artifact).await?);
        }
        Ok(deployed)
    }
}

/// `dir/name.ext` -> `dir/name.ext.<suffix>`
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}
