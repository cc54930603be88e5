//! Document identity and stored metadata
//!
//! A document is keyed by its normalized path. Two spellings of the same
//! path (`docs/./a.txt`, `docs//a.txt`) normalize to the same `DocId`, so a
//! re-index always finds the earlier version.

use crate::error::{IndexError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Name of the stored field that holds the document path.
pub const PATH_FIELD: &str = "path";

// ============================================================================
// DocId
// ============================================================================

/// Unique, immutable document key.
///
/// Equal to the normalized path the document was read from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocId(String);

impl DocId {
    /// Build a key from an arbitrary string without normalization.
    pub fn new(key: impl Into<String>) -> Self {
        DocId(key.into())
    }

    /// Build a key from a filesystem path.
    ///
    /// `.` components and redundant separators are removed. Paths that are
    /// not valid UTF-8 are rejected, since a lossy conversion could map two
    /// distinct files onto one key.
    pub fn from_path(path: &Path) -> Result<Self> {
        let normalized: PathBuf = path
            .components()
            .filter(|c| !matches!(c, Component::CurDir))
            .collect();
        let normalized = if normalized.as_os_str().is_empty() {
            PathBuf::from(".")
        } else {
            normalized
        };
        match normalized.to_str() {
            Some(s) => Ok(DocId(s.to_string())),
            None => Err(IndexError::InvalidOperation(format!(
                "path is not valid UTF-8: {}",
                path.display()
            ))),
        }
    }

    /// The key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the key, returning the inner string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocId {
    fn from(s: &str) -> Self {
        DocId(s.to_string())
    }
}

impl From<String> for DocId {
    fn from(s: String) -> Self {
        DocId(s)
    }
}

impl AsRef<str> for DocId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// StoredFields
// ============================================================================

/// Metadata retained for a document.
///
/// Only fields the caller asks for are kept; document content is indexed,
/// never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFields {
    fields: BTreeMap<String, String>,
}

impl StoredFields {
    /// Create an empty field set
    pub fn new() -> Self {
        Self::default()
    }

    /// Field set holding only the document path
    pub fn with_path(doc_id: &DocId) -> Self {
        let mut fields = Self::new();
        fields.insert(PATH_FIELD, doc_id.as_str());
        fields
    }

    /// Insert or overwrite a field
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Get a field value
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Shortcut for the `path` field
    pub fn path(&self) -> Option<&str> {
        self.get(PATH_FIELD)
    }

    /// Iterate fields in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True when no fields are stored
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
