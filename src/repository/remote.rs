//! Remote repository endpoints

use crate::error::{RepoCacheError, RepoCacheResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

const SUPPORTED_SCHEMES: &[&str] = &["https://", "http://", "file://"];

/// A remote repository to resolve artifacts from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRepository {
    /// Short identifier used in logs and failure reports
    pub id: String,

    /// Base URL of a repository in the standard layout
    pub url: String,
}

impl RemoteRepository {
    /// Create a repository, validating the URL scheme
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> RepoCacheResult<Self> {
        let repo = Self {
            id: id.into(),
            url: url.into(),
        };
        repo.validate()?;
        Ok(repo)
    }

    /// Parse a comma-separated list of URLs, as given on the command line.
    ///
    /// Ids are assigned by position: `repo-0`, `repo-1`, ...
    pub fn parse_list(s: &str) -> RepoCacheResult<Vec<Self>> {
        s.split(',')
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .enumerate()
            .map(|(i, url)| Self::new(format!("repo-{}", i), url))
            .collect()
    }

    /// Check the URL uses a supported scheme and has something after it
    pub fn validate(&self) -> RepoCacheResult<()> {
        if self.id.trim().is_empty() {
            return Err(RepoCacheError::RepositoryInvalid {
                url: self.url.clone(),
                reason: "repository id must not be blank".to_string(),
            });
        }

        let Some(scheme) = SUPPORTED_SCHEMES
            .iter()
            .find(|scheme| self.url.starts_with(**scheme))
        else {
            return Err(RepoCacheError::RepositoryInvalid {
                url: self.url.clone(),
                reason: "expected an http://, https:// or file:// URL".to_string(),
            });
        };

        if self.url[scheme.len()..].trim_matches('/').is_empty() {
            return Err(RepoCacheError::RepositoryInvalid {
                url: self.url.clone(),
                reason: "URL has no host or path".to_string(),
            });
        }

        Ok(())
    }

    /// Local directory for `file://` repositories
    pub fn file_path(&self) -> Option<PathBuf> {
        self.url.strip_prefix("file://").map(PathBuf::from)
    }

    /// Full URL of a path relative to the repository root
    pub fn artifact_url(&self, relative: &str) -> String {
        format!("{}/{}", self.url.trim_end_matches('/'), relative)
    }
}

impl fmt::Display for RemoteRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.url)
    }
}

/// Repositories used when neither the CLI nor the config names any
pub fn default_remote_repositories() -> Vec<RemoteRepository> {
    [
        ("maven-central", "https://repo1.maven.org/maven2/"),
        (
            "nexus",
            "https://repository.jboss.org/nexus/content/groups/public-jboss",
        ),
        ("maven-redhat-ga", "https://maven.repository.redhat.com/ga"),
    ]
    .into_iter()
    .map(|(id, url)| RemoteRepository {
        id: id.to_string(),
        url: url.to_string(),
    })
    .collect()
}
