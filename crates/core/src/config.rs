//! Index configuration via `docindex.toml`
//!
//! Every setting has a default, so an absent file or an empty table yields a
//! working configuration. Values are validated eagerly on load.

use crate::error::{IndexError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Conventional config file name.
pub const CONFIG_FILE_NAME: &str = "docindex.toml";

/// Longest term, in UTF-8 bytes, a segment's dictionary can record.
pub const MAX_TERM_BYTES: usize = u16::MAX as usize;

/// Largest accepted `tokenizer.max_token_len`: a token of that many
/// characters still fits in [`MAX_TERM_BYTES`] at four bytes per char.
pub const MAX_TOKEN_LEN_LIMIT: usize = MAX_TERM_BYTES / 4;

/// What to do with byte sequences that are not valid UTF-8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InvalidUtf8Policy {
    /// Substitute U+FFFD and index the rest of the document
    #[default]
    Replace,
    /// Skip the whole document and report it
    Skip,
}

/// Tokenizer settings (`[tokenizer]` table).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenizerConfig {
    /// Tokens longer than this many characters are dropped.
    #[serde(default = "default_max_token_len")]
    pub max_token_len: usize,
    /// Inline stop words.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop_words: Vec<String>,
    /// File with one stop word per line (`#` starts a comment).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_words_file: Option<PathBuf>,
    /// Stop-word filtering is inactive unless this is set.
    #[serde(default)]
    pub apply_stop_words: bool,
}

fn default_max_token_len() -> usize {
    255
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            max_token_len: default_max_token_len(),
            stop_words: Vec::new(),
            stop_words_file: None,
            apply_stop_words: false,
        }
    }
}

impl TokenizerConfig {
    /// Whether any stop words were configured, applied or not.
    pub fn has_stop_words(&self) -> bool {
        !self.stop_words.is_empty() || self.stop_words_file.is_some()
    }

    /// Collect inline stop words plus those read from `stop_words_file`,
    /// lower-cased.
    ///
    /// # Errors
    ///
    /// Returns an error if the stop-word file cannot be read.
    pub fn load_stop_words(&self) -> Result<Vec<String>> {
        let mut words: Vec<String> = self.stop_words.iter().map(|w| w.to_lowercase()).collect();
        if let Some(path) = &self.stop_words_file {
            let content = std::fs::read_to_string(path).map_err(|e| {
                IndexError::Config(format!(
                    "Failed to read stop-word file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
            for line in content.lines() {
                let word = line.split('#').next().unwrap_or("").trim();
                if !word.is_empty() {
                    words.push(word.to_lowercase());
                }
            }
        }
        words.sort();
        words.dedup();
        Ok(words)
    }
}

/// Writer and ingestion configuration loaded from `docindex.toml`.
///
/// # Example
///
/// ```toml
/// # Buffered documents before an automatic flush to an unpublished segment
/// max_buffered_docs = 10000
///
/// # Merge all segments at commit once there are more than this many
/// merge_threshold = 10
///
/// # "replace" (default) or "skip"
/// invalid_utf8 = "replace"
///
/// [tokenizer]
/// max_token_len = 255
/// apply_stop_words = false
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexConfig {
    /// Buffered documents that trigger an automatic flush.
    #[serde(default = "default_max_buffered_docs")]
    pub max_buffered_docs: usize,
    /// Segment count above which a commit merges everything into one segment.
    /// `0` disables automatic merging.
    #[serde(default = "default_merge_threshold")]
    pub merge_threshold: usize,
    /// Handling of undecodable byte runs.
    #[serde(default)]
    pub invalid_utf8: InvalidUtf8Policy,
    /// Files larger than this are skipped by the ingestion driver.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_file_bytes: Option<u64>,
    /// Documents read and tokenized in parallel per batch during ingestion.
    #[serde(default = "default_ingest_batch_size")]
    pub ingest_batch_size: usize,
    /// Tokenizer settings.
    #[serde(default)]
    pub tokenizer: TokenizerConfig,
}

fn default_max_buffered_docs() -> usize {
    10_000
}

fn default_merge_threshold() -> usize {
    10
}

fn default_ingest_batch_size() -> usize {
    256
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            max_buffered_docs: default_max_buffered_docs(),
            merge_threshold: default_merge_threshold(),
            invalid_utf8: InvalidUtf8Policy::default(),
            max_file_bytes: None,
            ingest_batch_size: default_ingest_batch_size(),
            tokenizer: TokenizerConfig::default(),
        }
    }
}

impl IndexConfig {
    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns `Config` if a count that must be positive is zero, or if
    /// `tokenizer.max_token_len` exceeds [`MAX_TOKEN_LEN_LIMIT`].
    pub fn validate(&self) -> Result<()> {
        if self.max_buffered_docs == 0 {
            return Err(IndexError::Config(
                "max_buffered_docs must be at least 1".to_string(),
            ));
        }
        if self.ingest_batch_size == 0 {
            return Err(IndexError::Config(
                "ingest_batch_size must be at least 1".to_string(),
            ));
        }
        if self.tokenizer.max_token_len == 0 {
            return Err(IndexError::Config(
                "tokenizer.max_token_len must be at least 1".to_string(),
            ));
        }
        if self.tokenizer.max_token_len > MAX_TOKEN_LEN_LIMIT {
            return Err(IndexError::Config(format!(
                "tokenizer.max_token_len must be at most {}",
                MAX_TOKEN_LEN_LIMIT
            )));
        }
        Ok(())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# docindex configuration
#
# Buffered documents before an automatic flush to an unpublished segment.
max_buffered_docs = 10000

# Merge all segments into one at commit once there are more than this many.
# 0 disables automatic merging.
merge_threshold = 10

# Undecodable byte runs: "replace" (U+FFFD, default) or "skip" the document.
invalid_utf8 = "replace"

# Files larger than this many bytes are skipped (unset = no limit).
# max_file_bytes = 104857600

# Documents read and tokenized in parallel per batch.
ingest_batch_size = 256

[tokenizer]
# Longer tokens are dropped. At most 16383.
max_token_len = 255
# stop_words = ["a", "an", "the"]
# stop_words_file = "stopwords.txt"
# Stop words are loaded but not applied unless this is true.
apply_stop_words = false
"#
    }

    /// Parse config from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string cannot be parsed or fails validation.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: IndexConfig = toml::from_str(content)
            .map_err(|e| IndexError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse config from a file path.
    ///
    /// A relative `stop_words_file` is resolved against the config file's
    /// directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            IndexError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let mut config: IndexConfig = toml::from_str(&content).map_err(|e| {
            IndexError::Config(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        if let (Some(file), Some(base)) = (&config.tokenizer.stop_words_file, path.parent()) {
            if file.is_relative() {
                config.tokenizer.stop_words_file = Some(base.join(file));
            }
        }
        config.validate()?;
        Ok(config)
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| IndexError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            IndexError::Config(format!(
                "Failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }
}
