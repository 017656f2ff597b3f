//! Artifact coordinates
//!
//! A coordinate identifies one artifact file: `group:name:extension:classifier:version`.
//! The colon-joined form is the record key of the cache index, so no field may
//! contain `:`. Fields are also checked against path traversal because every
//! coordinate maps onto a path in a repository layout.

use crate::error::{RepoCacheError, RepoCacheResult};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Number of fields in the full coordinate key
pub const COORDINATE_FIELDS: usize = 5;

/// An immutable group/name/extension/classifier/version identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArtifactCoordinate {
    group: String,
    name: String,
    extension: String,
    classifier: String,
    version: String,
}

impl ArtifactCoordinate {
    /// Create a validated coordinate. `classifier` may be empty.
    pub fn new(
        group: impl Into<String>,
        name: impl Into<String>,
        extension: impl Into<String>,
        classifier: impl Into<String>,
        version: impl Into<String>,
    ) -> RepoCacheResult<Self> {
        let coordinate = Self {
            group: group.into(),
            name: name.into(),
            extension: extension.into(),
            classifier: classifier.into(),
            version: version.into(),
        };
        coordinate.validate()?;
        Ok(coordinate)
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn classifier(&self) -> &str {
        &self.classifier
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// The full index key, `group:name:extension:classifier:version`
    pub fn key(&self) -> String {
        self.to_string()
    }

    /// The version-less key, `group:name:extension:classifier`
    pub fn resolution_key(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.group, self.name, self.extension, self.classifier
        )
    }

    /// File name in the standard layout: `name-version[-classifier].extension`
    pub fn file_name(&self) -> String {
        if self.classifier.is_empty() {
            format!("{}-{}.{}", self.name, self.version, self.extension)
        } else {
            format!(
                "{}-{}-{}.{}",
                self.name, self.version, self.classifier, self.extension
            )
        }
    }

    /// Relative path of this artifact in a standard repository layout:
    /// `group/as/dirs/name/version/name-version[-classifier].extension`
    pub fn layout_path(&self) -> PathBuf {
        let mut path: PathBuf = self.group.split('.').collect();
        path.push(&self.name);
        path.push(&self.version);
        path.push(self.file_name());
        path
    }

    /// Same as [`layout_path`](Self::layout_path), always `/`-separated (for URLs)
    pub fn layout_url_path(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.group.replace('.', "/"),
            self.name,
            self.version,
            self.file_name()
        )
    }

    fn validate(&self) -> RepoCacheResult<()> {
        let fields = [
            ("group", &self.group, true),
            ("name", &self.name, true),
            ("extension", &self.extension, true),
            ("classifier", &self.classifier, false),
            ("version", &self.version, true),
        ];

        for (label, value, required) in fields {
            validate_field(label, value, required).map_err(|reason| {
                RepoCacheError::invalid_coordinate(self.to_string(), reason)
            })?;
        }

        if self.group.split('.').any(|segment| segment.trim().is_empty()) {
            return Err(RepoCacheError::invalid_coordinate(
                self.to_string(),
                "group must not contain empty segments",
            ));
        }

        Ok(())
    }
}

/// Check a single field. Returns the reason on failure.
fn validate_field(label: &str, value: &str, required: bool) -> Result<(), String> {
    if value.trim().is_empty() {
        if required {
            return Err(format!("{} must not be blank", label));
        }
        if !value.is_empty() {
            return Err(format!("{} must be empty or non-blank", label));
        }
        return Ok(());
    }
    if value.contains(':') {
        return Err(format!("{} must not contain ':'", label));
    }
    if value.contains('/') || value.contains('\\') || value.contains('\0') {
        return Err(format!("{} must not contain path separators", label));
    }
    if value == "." || value == ".." {
        return Err(format!("{} must not be '.' or '..'", label));
    }
    if value.chars().any(char::is_control) {
        return Err(format!("{} must not contain control characters", label));
    }
    Ok(())
}

impl fmt::Display for ArtifactCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}:{}",
            self.group, self.name, self.extension, self.classifier, self.version
        )
    }
}

impl FromStr for ArtifactCoordinate {
    type Err = RepoCacheError;

    /// Parse `group:name:extension:classifier:version`. Splitting on every
    /// `:` is exact because no field may contain one.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != COORDINATE_FIELDS {
            return Err(RepoCacheError::invalid_coordinate(
                s,
                format!(
                    "expected {} ':'-separated fields (group:name:extension:classifier:version), found {}",
                    COORDINATE_FIELDS,
                    parts.len()
                ),
            ));
        }

        let coordinate = Self {
            group: parts[0].to_string(),
            name: parts[1].to_string(),
            extension: parts[2].to_string(),
            classifier: parts[3].to_string(),
            version: parts[4].to_string(),
        };
        coordinate.validate()?;
        Ok(coordinate)
    }
}
