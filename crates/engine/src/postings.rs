//! Term dictionary and postings accumulation
//!
//! This module provides:
//! - `PostingEntry`: one document's occurrences of a term (frequency + positions)
//! - `PostingList`: entries for a term, unique per document
//! - `PostingsBuffer`: the mutable, in-memory side of the index that absorbs
//!   writes until it is flushed into an immutable segment
//!
//! # Document ordinals
//!
//! Posting entries carry a compact `u32` ordinal instead of a cloned `DocId`.
//! The buffer keeps one copy of each key in a bidirectional map. Removing a
//! document retires its ordinal; re-adding the key assigns a fresh one. On
//! flush the surviving documents are renumbered densely in `DocId` order, so
//! a segment's ordinal order is also its key order.

use docindex_core::DocId;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;

use crate::tokenizer::Token;

// ============================================================================
// PostingEntry
// ============================================================================

/// Occurrences of one term in one document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostingEntry {
    /// Document ordinal (buffer- or segment-local)
    pub doc: u32,
    /// Token positions, strictly ascending
    pub positions: Vec<u32>,
}

impl PostingEntry {
    /// Create a new posting entry
    pub fn new(doc: u32, positions: Vec<u32>) -> Self {
        PostingEntry { doc, positions }
    }

    /// Term frequency in this document
    pub fn frequency(&self) -> u32 {
        self.positions.len() as u32
    }

    fn add_position(&mut self, position: u32) {
        match self.positions.last() {
            Some(&last) if last < position => self.positions.push(position),
            None => self.positions.push(position),
            _ => {
                if let Err(at) = self.positions.binary_search(&position) {
                    self.positions.insert(at, position);
                }
            }
        }
    }
}

// ============================================================================
// PostingList
// ============================================================================

/// List of documents containing a term
#[derive(Debug, Clone, Default)]
pub struct PostingList {
    /// Document entries, at most one per ordinal
    pub entries: Vec<PostingEntry>,
}

impl PostingList {
    /// Create a new empty posting list
    pub fn new() -> Self {
        PostingList { entries: vec![] }
    }

    /// Record an occurrence, merging into the document's existing entry.
    pub fn add_occurrence(&mut self, doc: u32, position: u32) {
        if let Some(last) = self.entries.last_mut() {
            if last.doc == doc {
                last.add_position(position);
                return;
            }
        }
        match self.entries.iter_mut().rev().find(|e| e.doc == doc) {
            Some(entry) => entry.add_position(position),
            None => self.entries.push(PostingEntry::new(doc, vec![position])),
        }
    }

    /// Remove entries matching a document ordinal
    pub fn remove_doc(&mut self, doc: u32) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| e.doc != doc);
        before - self.entries.len()
    }

    /// Number of documents containing this term
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if posting list is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// FlushedPostings
// ============================================================================

/// Immutable image of the buffer, ready to be encoded as a segment.
///
/// `docs[i]` is the key for ordinal `i`; `docs` is sorted, and every posting
/// list is sorted by ordinal.
#[derive(Debug, Clone, Default)]
pub struct FlushedPostings {
    /// Document keys by ordinal
    pub docs: Vec<DocId>,
    /// Term → postings, in term order
    pub terms: BTreeMap<String, Vec<PostingEntry>>,
}

impl FlushedPostings {
    /// True when the image holds no documents
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}

// ============================================================================
// PostingsBuffer
// ============================================================================

/// Mutable in-memory postings store.
///
/// Single-writer: all mutation goes through `&mut self`, so there is no
/// internal locking.
#[derive(Debug, Default)]
pub struct PostingsBuffer {
    /// ordinal → key (None once removed)
    docs: Vec<Option<DocId>>,
    /// key → ordinal for live documents
    ordinals: FxHashMap<DocId, u32>,
    /// term → postings
    postings: FxHashMap<String, PostingList>,
    /// Total positions recorded for live documents
    token_count: u64,
}

impl PostingsBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live documents
    pub fn num_docs(&self) -> usize {
        self.ordinals.len()
    }

    /// Number of distinct terms with at least one live posting
    pub fn num_terms(&self) -> usize {
        self.postings.len()
    }

    /// Total tokens recorded
    pub fn token_count(&self) -> u64 {
        self.token_count
    }

    /// True when no live documents are buffered
    pub fn is_empty(&self) -> bool {
        self.ordinals.is_empty()
    }

    /// Whether a document is buffered
    pub fn contains(&self, doc_id: &DocId) -> bool {
        self.ordinals.contains_key(doc_id)
    }

    fn ordinal_for(&mut self, doc_id: &DocId) -> u32 {
        if let Some(&ord) = self.ordinals.get(doc_id) {
            return ord;
        }
        let ord = self.docs.len() as u32;
        self.docs.push(Some(doc_id.clone()));
        self.ordinals.insert(doc_id.clone(), ord);
        ord
    }

    /// Append one occurrence of `term` in `doc_id`.
    pub fn add_posting(&mut self, term: &str, doc_id: &DocId, position: u32) {
        let ord = self.ordinal_for(doc_id);
        match self.postings.get_mut(term) {
            Some(list) => list.add_occurrence(ord, position),
            None => {
                let mut list = PostingList::new();
                list.add_occurrence(ord, position);
                self.postings.insert(term.to_string(), list);
            }
        }
        self.token_count += 1;
    }

    /// Replace a document's postings with the given tokens.
    ///
    /// Returns true if an earlier buffered version was dropped. A document
    /// with no tokens is still registered, so it is stored and counted.
    pub fn add_document(&mut self, doc_id: &DocId, tokens: &[Token]) -> bool {
        let replaced = self.remove_document(doc_id);
        self.ordinal_for(doc_id);
        for token in tokens {
            self.add_posting(&token.term, doc_id, token.position);
        }
        replaced
    }

    /// Drop every buffered posting for `doc_id`.
    ///
    /// Returns false if the document was not buffered.
    pub fn remove_document(&mut self, doc_id: &DocId) -> bool {
        let ord = match self.ordinals.remove(doc_id) {
            Some(ord) => ord,
            None => return false,
        };
        if let Some(slot) = self.docs.get_mut(ord as usize) {
            *slot = None;
        }

        let mut removed_tokens = 0u64;
        self.postings.retain(|_, list| {
            if let Some(entry) = list.entries.iter().find(|e| e.doc == ord) {
                removed_tokens += entry.positions.len() as u64;
            }
            list.remove_doc(ord);
            !list.is_empty()
        });
        self.token_count = self.token_count.saturating_sub(removed_tokens);
        true
    }

    /// Documents containing `term`, in key order.
    pub fn lookup(&self, term: &str) -> Vec<DocId> {
        let mut docs: Vec<DocId> = match self.postings.get(term) {
            Some(list) => list
                .entries
                .iter()
                .filter_map(|e| self.docs.get(e.doc as usize).cloned().flatten())
                .collect(),
            None => Vec::new(),
        };
        docs.sort();
        docs
    }

    /// Term frequency of `term` in `doc_id` (0 if absent).
    pub fn frequency(&self, term: &str, doc_id: &DocId) -> u32 {
        let ord = match self.ordinals.get(doc_id) {
            Some(&ord) => ord,
            None => return 0,
        };
        self.postings
            .get(term)
            .and_then(|list| list.entries.iter().find(|e| e.doc == ord))
            .map(PostingEntry::frequency)
            .unwrap_or(0)
    }

    /// Live document keys, sorted
    pub fn doc_ids(&self) -> Vec<DocId> {
        let mut ids: Vec<DocId> = self.ordinals.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Build an immutable image without resetting the buffer.
    ///
    /// Live documents are renumbered densely in key order.
    pub fn snapshot(&self) -> FlushedPostings {
        let docs = self.doc_ids();
        let remap: FxHashMap<u32, u32> = docs
            .iter()
            .enumerate()
            .filter_map(|(new_ord, id)| self.ordinals.get(id).map(|&old| (old, new_ord as u32)))
            .collect();

        let mut terms = BTreeMap::new();
        for (term, list) in &self.postings {
            let mut entries: Vec<PostingEntry> = list
                .entries
                .iter()
                .filter_map(|e| {
                    remap
                        .get(&e.doc)
                        .map(|&doc| PostingEntry::new(doc, e.positions.clone()))
                })
                .collect();
            if entries.is_empty() {
                continue;
            }
            entries.sort_by_key(|e| e.doc);
            terms.insert(term.clone(), entries);
        }

        FlushedPostings { docs, terms }
    }

    /// Discard all buffered state
    pub fn clear(&mut self) {
        self.docs.clear();
        self.ordinals.clear();
        self.postings.clear();
        self.token_count = 0;
    }

    /// Materialize the buffer and reset it.
    pub fn flush(&mut self) -> FlushedPostings {
        let image = self.snapshot();
        self.clear();
        image
    }
}

// ============================================================================
// Tests
// ============================================================================
