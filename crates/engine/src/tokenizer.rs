//! Text tokenizer for indexing
//!
//! Pipeline: UAX#29 word boundaries → split on non-alphanumeric characters
//!           → drop empty pieces → lowercase → drop over-long tokens
//!           → (optional) remove stop words
//!
//! Word boundaries follow UAX#29, so Han ideographs and hiragana become one
//! token per character while katakana and Hangul runs stay whole:
//! `東京 タワー` yields `東`, `京`, `タワー`. No dictionary segmentation
//! is done.
//!
//! No stemming is applied. Every token that survives splitting consumes a
//! position, including over-long tokens and stop words that are removed
//! later, so phrase distances stay faithful to the source text.

use docindex_core::{Result, TokenizerConfig, MAX_TERM_BYTES};
use rustc_hash::FxHashSet;
use std::sync::Arc;
use tracing::warn;
use unicode_segmentation::{UnicodeSegmentation, UnicodeWords};

/// A normalized term and its ordinal position in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Normalized term text
    pub term: String,
    /// Zero-based token position
    pub position: u32,
}

impl Token {
    /// Create a token
    pub fn new(term: impl Into<String>, position: u32) -> Self {
        Token {
            term: term.into(),
            position,
        }
    }
}

/// Stateless tokenizer.
///
/// Cheap to clone; the stop-word set is shared.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    max_token_len: usize,
    stop_words: Option<Arc<FxHashSet<String>>>,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tokenizer {
    /// Tokenizer with default settings and no stop-word filtering.
    pub fn new() -> Self {
        Tokenizer {
            max_token_len: TokenizerConfig::default().max_token_len,
            stop_words: None,
        }
    }

    /// Build a tokenizer from configuration.
    ///
    /// Stop words are loaded whenever configured but only applied when
    /// `apply_stop_words` is set; otherwise a warning is logged so the
    /// inactive list does not go unnoticed.
    pub fn from_config(config: &TokenizerConfig) -> Result<Self> {
        let mut tokenizer = Tokenizer::new().with_max_token_len(config.max_token_len);
        if config.has_stop_words() {
            let words = config.load_stop_words()?;
            if config.apply_stop_words {
                tokenizer = tokenizer.with_stop_words(words);
            } else {
                warn!(
                    target: "docindex::tokenizer",
                    count = words.len(),
                    "Stop words configured but apply_stop_words is false; filtering is inactive"
                );
            }
        }
        Ok(tokenizer)
    }

    /// Set the maximum token length in characters
    pub fn with_max_token_len(mut self, max_token_len: usize) -> Self {
        self.max_token_len = max_token_len.max(1);
        self
    }

    /// Enable stop-word filtering with the given (already lower-cased) words
    pub fn with_stop_words<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set: FxHashSet<String> = words.into_iter().map(Into::into).collect();
        self.stop_words = if set.is_empty() {
            None
        } else {
            Some(Arc::new(set))
        };
        self
    }

    /// Whether stop-word filtering is active
    pub fn filters_stop_words(&self) -> bool {
        self.stop_words.is_some()
    }

    /// Restartable token sequence over `text`.
    ///
    /// The stream is `Copy`; every call to [`TokenStream::iter`] starts a
    /// fresh lazy pass from the beginning.
    pub fn stream<'a>(&'a self, text: &'a str) -> TokenStream<'a> {
        TokenStream {
            tokenizer: self,
            text,
        }
    }

    /// Lazily tokenize `text`.
    pub fn tokens<'a>(&'a self, text: &'a str) -> Tokens<'a> {
        Tokens {
            tokenizer: self,
            words: text.unicode_words(),
            pieces: None,
            position: 0,
        }
    }

    /// Tokenize eagerly into a vector.
    ///
    /// # Example
    ///
    /// ```
    /// use docindex_engine::tokenizer::{Token, Tokenizer};
    ///
    /// let tokens = Tokenizer::new().tokenize("Hello, World! Hello");
    /// assert_eq!(
    ///     tokens,
    ///     vec![Token::new("hello", 0), Token::new("world", 1), Token::new("hello", 2)]
    /// );
    /// ```
    pub fn tokenize(&self, text: &str) -> Vec<Token> {
        self.tokens(text).collect()
    }

    /// Terms only, in document order.
    pub fn terms(&self, text: &str) -> Vec<String> {
        self.tokens(text).map(|t| t.term).collect()
    }

    fn is_stop_word(&self, term: &str) -> bool {
        match &self.stop_words {
            Some(set) => set.contains(term),
            None => false,
        }
    }
}

fn is_separator(c: char) -> bool {
    !c.is_alphanumeric()
}

/// A finite token sequence that can be iterated any number of times.
#[derive(Debug, Clone, Copy)]
pub struct TokenStream<'a> {
    tokenizer: &'a Tokenizer,
    text: &'a str,
}

impl<'a> TokenStream<'a> {
    /// Start a new pass over the text
    pub fn iter(&self) -> Tokens<'a> {
        self.tokenizer.tokens(self.text)
    }
}

impl<'a> IntoIterator for TokenStream<'a> {
    type Item = Token;
    type IntoIter = Tokens<'a>;

    fn into_iter(self) -> Tokens<'a> {
        self.iter()
    }
}

/// Lazy token iterator produced by [`Tokenizer::tokens`].
pub struct Tokens<'a> {
    tokenizer: &'a Tokenizer,
    words: UnicodeWords<'a>,
    pieces: Option<std::str::Split<'a, fn(char) -> bool>>,
    position: u32,
}

impl<'a> Iterator for Tokens<'a> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        loop {
            if let Some(pieces) = self.pieces.as_mut() {
                for piece in pieces.by_ref() {
                    if piece.is_empty() {
                        continue;
                    }
                    let position = self.position;
                    self.position = self.position.saturating_add(1);

                    if piece.chars().count() > self.tokenizer.max_token_len {
                        continue;
                    }
                    let term = piece.to_lowercase();
                    // Lowercasing can grow a term past what a segment records.
                    if term.len() > MAX_TERM_BYTES {
                        continue;
                    }
                    if self.tokenizer.is_stop_word(&term) {
                        continue;
                    }
                    return Some(Token { term, position });
                }
                self.pieces = None;
            }

            let word = self.words.next()?;
            self.pieces = Some(word.split(is_separator as fn(char) -> bool));
        }
    }
}
