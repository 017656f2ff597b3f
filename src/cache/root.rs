//! Cache root handle and cross-process locking
//!
//! Layout under a cache root:
//!
//! ```text
//! <root>/cache.properties   index, one entry per line
//! <root>/cache/             artifact store, repository-shaped
//! <root>/.lock              advisory lock file
//! <root>/audit.log          JSON-lines audit log
//! ```

use crate::error::{RepoCacheError, RepoCacheResult};
use fs2::FileExt as _;
use std::fs::{File, OpenOptions};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

pub const INDEX_FILE: &str = "cache.properties";
pub const STORE_DIR: &str = "cache";
pub const LOCK_FILE: &str = ".lock";
pub const AUDIT_FILE: &str = "audit.log";

/// Handle to a cache directory
///
/// Index entries store paths relative to the *parent* of the root, so the
/// root must be a named directory with a parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRoot {
    root: PathBuf,
    parent: PathBuf,
    name: String,
}

impl CacheRoot {
    pub fn new(path: impl AsRef<Path>) -> RepoCacheResult<Self> {
        let path = path.as_ref();
        let root = std::path::absolute(path)
            .map_err(|e| RepoCacheError::io(format!("resolving {}", path.display()), e))?;

        let invalid = |reason: &str| RepoCacheError::CacheRootInvalid {
            path: root.clone(),
            reason: reason.to_string(),
        };

        let parent = root
            .parent()
            .ok_or_else(|| invalid("cache root must have a parent directory"))?
            .to_path_buf();
        let name = root
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| invalid("cache root must have a UTF-8 directory name"))?
            .to_string();
        if name.contains(':') {
            return Err(invalid("cache root name must not contain ':'"));
        }

        Ok(Self { root, parent, name })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE)
    }

    pub fn store_dir(&self) -> PathBuf {
        self.root.join(STORE_DIR)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.root.join(LOCK_FILE)
    }

    pub fn audit_log_path(&self) -> PathBuf {
        self.root.join(AUDIT_FILE)
    }

    /// Absolute path of an index entry's relative path
    pub fn resolve_entry_path(&self, relative: &str) -> PathBuf {
        let mut path = self.parent.clone();
        path.extend(relative.split('/'));
        path
    }

    /// Relative path (from the root's parent, `/`-separated) of a file
    /// inside the store
    pub fn relative_entry_path(&self, path: &Path) -> RepoCacheResult<String> {
        let relative = path.strip_prefix(&self.root).map_err(|_| {
            RepoCacheError::Internal(format!(
                "{} is outside cache root {}",
                path.display(),
                self.root.display()
            ))
        })?;

        let mut parts = vec![self.name.clone()];
        for component in relative.components() {
            match component {
                Component::Normal(part) => {
                    let part = part.to_str().ok_or_else(|| {
                        RepoCacheError::Internal(format!("non UTF-8 path {}", path.display()))
                    })?;
                    if part.contains(':') {
                        return Err(RepoCacheError::Internal(format!(
                            "path {} contains ':'",
                            path.display()
                        )));
                    }
                    parts.push(part.to_string());
                }
                _ => {
                    return Err(RepoCacheError::Internal(format!(
                        "unexpected component in {}",
                        path.display()
                    )))
                }
            }
        }
        Ok(parts.join("/"))
    }

    /// Block until this process holds the exclusive cache lock
    pub async fn lock_exclusive(&self) -> RepoCacheResult<CacheLock> {
        self.lock(LockMode::Exclusive).await
    }

    /// Block until this process holds a shared cache lock
    pub async fn lock_shared(&self) -> RepoCacheResult<CacheLock> {
        self.lock(LockMode::Shared).await
    }

    async fn lock(&self, mode: LockMode) -> RepoCacheResult<CacheLock> {
        let path = self.lock_path();
        let lock_path = path.clone();
        tokio::task::spawn_blocking(move || CacheLock::acquire(&lock_path, mode))
            .await
            .map_err(|e| RepoCacheError::Internal(format!("lock task failed: {}", e)))?
            .map_err(|source| RepoCacheError::CacheLock { path, source })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LockMode {
    Shared,
    Exclusive,
}

/// An advisory lock on `<root>/.lock`, released on drop
///
/// Writers (populate) take it exclusively; readers (rebuild, status) share it.
#[derive(Debug)]
pub struct CacheLock {
    file: File,
}

impl CacheLock {
    fn acquire(path: &Path, mode: LockMode) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)?;
        match mode {
            LockMode::Shared => file.lock_shared()?,
            LockMode::Exclusive => file.lock_exclusive()?,
        }
        debug!("Acquired {:?} cache lock {}", mode, path.display());

        Ok(Self { file })
    }
}

impl Drop for CacheLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}
