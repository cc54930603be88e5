//! Core types for docindex
//!
//! This crate defines the foundational types shared by the engine and CLI:
//! - DocId: normalized document key (the document's path)
//! - StoredFields: retained per-document metadata
//! - IndexError: error type hierarchy
//! - IndexConfig: TOML configuration for writers and the tokenizer

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod types;

pub use config::{
    IndexConfig, InvalidUtf8Policy, TokenizerConfig, CONFIG_FILE_NAME, MAX_TERM_BYTES,
    MAX_TOKEN_LEN_LIMIT,
};
pub use error::{IndexError, Result};
pub use types::{DocId, StoredFields, PATH_FIELD};
