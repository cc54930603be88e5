//! Document decoding and analysis
//!
//! Analysis is the pure half of indexing a document: bytes in, tokens and
//! stored fields out. It touches no shared state, so the ingestion driver
//! runs it in parallel and hands the results to the writer serially.

use std::borrow::Cow;
use std::fmt;

use docindex_core::{DocId, IndexConfig, InvalidUtf8Policy, Result, StoredFields};

use crate::tokenizer::{Token, Tokenizer};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Why a document was not indexed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The file could not be read
    Unreadable(String),
    /// Content is not valid UTF-8 and the policy is `skip`
    InvalidUtf8,
    /// File exceeds `max_file_bytes`
    TooLarge {
        /// Actual size in bytes
        size: u64,
        /// Configured limit
        limit: u64,
    },
    /// Path cannot be represented as a UTF-8 key
    NonUtf8Path,
    /// Symlink points back at one of its ancestors
    SymlinkLoop,
    /// Directory traversal error at this path
    Walk(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Unreadable(e) => write!(f, "unreadable: {}", e),
            SkipReason::InvalidUtf8 => f.write_str("invalid UTF-8"),
            SkipReason::TooLarge { size, limit } => {
                write!(f, "too large ({} bytes, limit {})", size, limit)
            }
            SkipReason::NonUtf8Path => f.write_str("path is not valid UTF-8"),
            SkipReason::SymlinkLoop => f.write_str("symlink loop"),
            SkipReason::Walk(e) => write!(f, "walk error: {}", e),
        }
    }
}

/// Decode document bytes to text.
///
/// A leading UTF-8 BOM is dropped. Returns the text and whether any
/// replacement took place.
pub fn decode_text(
    bytes: &[u8],
    policy: InvalidUtf8Policy,
) -> std::result::Result<(Cow<'_, str>, bool), SkipReason> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => Ok((Cow::Borrowed(text), false)),
        Err(_) => match policy {
            InvalidUtf8Policy::Replace => Ok((String::from_utf8_lossy(bytes), true)),
            InvalidUtf8Policy::Skip => Err(SkipReason::InvalidUtf8),
        },
    }
}

/// Tokens and stored fields for one document, ready to apply to a writer.
#[derive(Debug, Clone)]
pub struct AnalyzedDocument {
    /// Document key
    pub doc_id: DocId,
    /// Retained metadata
    pub fields: StoredFields,
    /// Normalized tokens in document order
    pub tokens: Vec<Token>,
    /// True if invalid bytes were replaced with U+FFFD
    pub lossy: bool,
}

/// Stateless document analyzer; cheap to clone and `Sync`.
#[derive(Debug, Clone, Default)]
pub struct DocumentAnalyzer {
    tokenizer: Tokenizer,
    policy: InvalidUtf8Policy,
}

impl DocumentAnalyzer {
    /// Analyzer with an explicit tokenizer and decoding policy.
    pub fn new(tokenizer: Tokenizer, policy: InvalidUtf8Policy) -> Self {
        DocumentAnalyzer { tokenizer, policy }
    }

    /// Analyzer built from configuration.
    pub fn from_config(config: &IndexConfig) -> Result<Self> {
        Ok(DocumentAnalyzer {
            tokenizer: Tokenizer::from_config(&config.tokenizer)?,
            policy: config.invalid_utf8,
        })
    }

    /// The tokenizer in use
    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    /// Decode and tokenize a document.
    pub fn analyze(
        &self,
        doc_id: DocId,
        bytes: &[u8],
    ) -> std::result::Result<AnalyzedDocument, SkipReason> {
        let (text, lossy) = decode_text(bytes, self.policy)?;
        let tokens = self.tokenizer.tokenize(&text);
        Ok(AnalyzedDocument {
            fields: StoredFields::with_path(&doc_id),
            doc_id,
            tokens,
            lossy,
        })
    }
}
