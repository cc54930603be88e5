//! Error types for docindex
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! Only `DocumentRead` is recovered locally (the document is skipped and the
//! batch continues); every other variant is terminal for the operation that
//! raised it and never corrupts already-committed data.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for docindex operations
pub type Result<T> = std::result::Result<T, IndexError>;

/// Error types for the index engine and its drivers
#[derive(Debug, Error)]
pub enum IndexError {
    /// Bad or missing command-line arguments
    #[error("Usage error: {0}")]
    Usage(String),

    /// Document source root is missing or unreadable
    #[error("Document source '{}' does not exist or is not readable: {reason}", path.display())]
    SourceUnreadable {
        /// Source root supplied by the caller
        path: PathBuf,
        /// Underlying cause
        reason: String,
    },

    /// A single document could not be read or decoded
    #[error("Cannot read document '{}': {reason}", path.display())]
    DocumentRead {
        /// Path of the document
        path: PathBuf,
        /// Underlying cause
        reason: String,
    },

    /// Another writer holds the index location
    #[error("Index at '{}' is locked by another writer", path.display())]
    LockHeld {
        /// Index location
        path: PathBuf,
    },

    /// A durable write failed while publishing a commit
    #[error("Commit of generation {generation} failed: {source}")]
    CommitIo {
        /// Generation that was being published
        generation: u64,
        /// Underlying I/O failure
        #[source]
        source: io::Error,
    },

    /// On-disk data failed validation (magic, version, checksum, bounds)
    #[error("Data corruption: {0}")]
    Corruption(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration file could not be read or is invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid operation or state
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// I/O error (file operations)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl IndexError {
    /// Build a `Corruption` error
    pub fn corruption(msg: impl Into<String>) -> Self {
        IndexError::Corruption(msg.into())
    }

    /// Build a `DocumentRead` error
    pub fn document_read(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        IndexError::DocumentRead {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error only affects a single document.
    ///
    /// Drivers use this to decide between skip-and-continue and abort.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, IndexError::DocumentRead { .. })
    }
}
