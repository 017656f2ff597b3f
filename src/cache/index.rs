//! Durable cache index
//!
//! One line per cached artifact:
//!
//! ```text
//! group:name:extension:classifier:version:relativePath
//! ```
//!
//! `relativePath` is relative to the cache root's parent and `/`-separated.
//! Keys (the first five fields) are unique. The file is only ever replaced
//! as a whole: written to a temporary sibling, synced, then renamed.

use crate::cache::root::CacheRoot;
use crate::coordinate::{ArtifactCoordinate, COORDINATE_FIELDS};
use crate::error::{RepoCacheError, RepoCacheResult};
use std::collections::{HashMap, HashSet};
use std::io::ErrorKind;
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Fields per index line: the coordinate plus the relative path
pub const INDEX_FIELDS: usize = COORDINATE_FIELDS + 1;

/// A single cached artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub coordinate: ArtifactCoordinate,
    /// Path relative to the cache root's parent, `/`-separated
    pub relative_path: String,
}

impl CacheEntry {
    pub fn new(coordinate: ArtifactCoordinate, relative_path: impl Into<String>) -> Self {
        Self {
            coordinate,
            relative_path: relative_path.into(),
        }
    }

    /// Parse one index line. Returns the reason on failure.
    fn parse_line(line: &str) -> Result<Self, String> {
        let fields: Vec<&str> = line.split(':').collect();
        if fields.len() != INDEX_FIELDS {
            return Err(format!(
                "expected {} ':'-separated fields, found {}",
                INDEX_FIELDS,
                fields.len()
            ));
        }

        let coordinate = ArtifactCoordinate::new(
            fields[0], fields[1], fields[2], fields[3], fields[4],
        )
        .map_err(|e| e.to_string())?;

        let relative_path = fields[5];
        validate_relative_path(relative_path)?;

        Ok(Self::new(coordinate, relative_path))
    }

    fn to_line(&self) -> String {
        format!("{}:{}", self.coordinate, self.relative_path)
    }
}

fn validate_relative_path(path: &str) -> Result<(), String> {
    if path.trim().is_empty() {
        return Err("empty artifact path".to_string());
    }
    if path.starts_with('/') || path.contains('\\') {
        return Err(format!("artifact path '{}' must be relative", path));
    }
    if path.split('/').any(|part| part.is_empty() || part == "." || part == "..") {
        return Err(format!("artifact path '{}' is not normalized", path));
    }
    Ok(())
}

/// In-memory view of `cache.properties`, in file order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheIndex {
    entries: Vec<CacheEntry>,
    positions: HashMap<String, usize>,
}

impl CacheIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the index of `root`
    ///
    /// A missing index file is an empty cache. Blank lines are ignored.
    /// Malformed lines and duplicate keys are [`RepoCacheError::CorruptIndex`].
    pub async fn load(root: &CacheRoot) -> RepoCacheResult<Self> {
        let path = root.index_path();
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No index at {}, treating cache as empty", path.display());
                return Ok(Self::new());
            }
            Err(e) => {
                return Err(RepoCacheError::corrupt_index(
                    &path,
                    None,
                    format!("unable to read index: {}", e),
                ))
            }
        };

        let index = Self::parse(&path, &content)?;
        debug!("Loaded {} index entries from {}", index.len(), path.display());
        Ok(index)
    }

    fn parse(path: &Path, content: &str) -> RepoCacheResult<Self> {
        let mut index = Self::new();
        for (number, line) in content.lines().enumerate() {
            let line_number = number + 1;
            if line.trim().is_empty() {
                continue;
            }

            let entry = CacheEntry::parse_line(line)
                .map_err(|reason| RepoCacheError::corrupt_index(path, Some(line_number), reason))?;

            let key = entry.coordinate.key();
            if index.positions.contains_key(&key) {
                return Err(RepoCacheError::corrupt_index(
                    path,
                    Some(line_number),
                    format!("duplicate entry for {}", key),
                ));
            }
            index.positions.insert(key, index.entries.len());
            index.entries.push(entry);
        }
        Ok(index)
    }

    /// Fail with [`RepoCacheError::CorruptIndex`] on the first entry whose
    /// file is missing from the store
    pub async fn ensure_files_exist(&self, root: &CacheRoot) -> RepoCacheResult<()> {
        for entry in &self.entries {
            let file = root.resolve_entry_path(&entry.relative_path);
            let exists = fs::metadata(&file)
                .await
                .map(|m| m.is_file())
                .unwrap_or(false);
            if !exists {
                return Err(RepoCacheError::corrupt_index(
                    root.index_path(),
                    None,
                    format!(
                        "cached file for {} is missing: {}",
                        entry.coordinate,
                        file.display()
                    ),
                ));
            }
        }
        Ok(())
    }

    /// Entries whose files are missing from the store
    pub async fn missing_files(&self, root: &CacheRoot) -> Vec<&CacheEntry> {
        let mut missing = Vec::new();
        for entry in &self.entries {
            let file = root.resolve_entry_path(&entry.relative_path);
            if !fs::metadata(&file).await.map(|m| m.is_file()).unwrap_or(false) {
                missing.push(entry);
            }
        }
        missing
    }

    /// Full `group:name:extension:classifier:version` keys, for diffing
    pub fn coordinate_key_set(&self) -> HashSet<String> {
        self.positions.keys().cloned().collect()
    }

    pub fn contains(&self, coordinate: &ArtifactCoordinate) -> bool {
        self.positions.contains_key(&coordinate.key())
    }

    pub fn get(&self, coordinate: &ArtifactCoordinate) -> Option<&CacheEntry> {
        self.positions
            .get(&coordinate.key())
            .map(|&i| &self.entries[i])
    }

    pub fn entries(&self) -> &[CacheEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add or replace the entry for a coordinate. Replacement keeps the
    /// original position.
    pub fn insert(&mut self, entry: CacheEntry) {
        let key = entry.coordinate.key();
        match self.positions.get(&key) {
            Some(&i) => self.entries[i] = entry,
            None => {
                self.positions.insert(key, self.entries.len());
                self.entries.push(entry);
            }
        }
    }

    /// Serialized form, `\n`-terminated lines
    pub fn to_text(&self) -> String {
        let mut text = String::new();
        for entry in &self.entries {
            text.push_str(&entry.to_line());
            text.push('\n');
        }
        text
    }

    /// Atomically replace the index file of `root` with this index
    pub async fn save(&self, root: &CacheRoot) -> RepoCacheResult<()> {
        let path = root.index_path();
        let tmp = path.with_extension("properties.tmp");

        fs::create_dir_all(root.path()).await.map_err(|e| {
            RepoCacheError::io(format!("creating cache root {}", root.path().display()), e)
        })?;

        let mut file = fs::File::create(&tmp)
            .await
            .map_err(|e| RepoCacheError::io(format!("creating {}", tmp.display()), e))?;
        file.write_all(self.to_text().as_bytes())
            .await
            .map_err(|e| RepoCacheError::io(format!("writing {}", tmp.display()), e))?;
        file.sync_all()
            .await
            .map_err(|e| RepoCacheError::io(format!("syncing {}", tmp.display()), e))?;
        drop(file);

        fs::rename(&tmp, &path)
            .await
            .map_err(|e| RepoCacheError::io(format!("replacing {}", path.display()), e))?;

        debug!("Wrote {} index entries to {}", self.len(), path.display());
        Ok(())
    }

    /// Merge `new_entries` into the index on disk and save it
    ///
    /// Nothing is written when `new_entries` is empty.
    pub async fn append(root: &CacheRoot, new_entries: Vec<CacheEntry>) -> RepoCacheResult<Self> {
        let mut index = Self::load(root).await?;
        if new_entries.is_empty() {
            return Ok(index);
        }
        for entry in new_entries {
            index.insert(entry);
        }
        index.save(root).await?;
        Ok(index)
    }
}
