//! Read-only view of a committed generation
//!
//! A reader loads the generation named by `CURRENT` at open time and never
//! changes afterwards. Uncommitted writer state is invisible to it.

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};

use docindex_core::{DocId, IndexError, Result, StoredFields};
use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use crate::directory::IndexDirectory;
use crate::doc_store::read_stored_fields;
use crate::manifest::{load_manifest, read_current, ManifestData};
use crate::segment::Segment;

/// Attempts to load a generation when a concurrent commit sweeps it away.
const OPEN_ATTEMPTS: usize = 3;

/// A live posting in the committed view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostingHit {
    /// Document containing the term
    pub doc_id: DocId,
    /// Occurrences in the document
    pub frequency: u32,
    /// Token positions, ascending
    pub positions: Vec<u32>,
}

struct ReaderSegment {
    segment: Segment,
    stored: Vec<StoredFields>,
}

/// Immutable view of one committed generation.
pub struct IndexReader {
    path: PathBuf,
    generation: u64,
    segments: Vec<ReaderSegment>,
    /// Live key → (segment index, ordinal); newest segment wins
    live: FxHashMap<DocId, (usize, u32)>,
}

impl IndexReader {
    /// Open the committed generation at `path`.
    ///
    /// A location that has never been committed yields an empty reader at
    /// generation 0.
    pub fn open(path: &Path) -> Result<Self> {
        let dir = IndexDirectory::existing(path);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let generation = match read_current(&dir)? {
                Some(generation) => generation,
                None => return Ok(Self::empty(path)),
            };
            match Self::load(&dir, generation) {
                Ok(reader) => return Ok(reader),
                Err(IndexError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
                    let now = read_current(&dir)?;
                    if attempt >= OPEN_ATTEMPTS || now == Some(generation) {
                        return Err(IndexError::Io(e));
                    }
                    warn!(
                        target: "docindex::reader",
                        generation,
                        attempt,
                        "Generation replaced while opening; retrying"
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn empty(path: &Path) -> Self {
        IndexReader {
            path: path.to_path_buf(),
            generation: 0,
            segments: Vec::new(),
            live: FxHashMap::default(),
        }
    }

    fn load(dir: &IndexDirectory, generation: u64) -> Result<Self> {
        let manifest: ManifestData = load_manifest(dir, generation)?;
        let mut segments = Vec::with_capacity(manifest.segments.len());
        let mut live = FxHashMap::default();

        for (idx, entry) in manifest.segments.iter().enumerate() {
            let segment = Segment::open(&dir.segment_path(entry.segment_id))?;
            let stored =
                read_stored_fields(&dir.stored_fields_path(entry.segment_id), entry.segment_id)?;
            if segment.doc_count() != entry.doc_count || stored.len() != segment.docs().len() {
                return Err(IndexError::corruption(format!(
                    "segment {} does not match manifest_{}",
                    entry.segment_id, generation
                )));
            }
            for (ord, doc_id) in segment.docs().iter().enumerate() {
                let ord = ord as u32;
                if !entry.tombstones.contains(&ord) {
                    live.insert(doc_id.clone(), (idx, ord));
                }
            }
            segments.push(ReaderSegment { segment, stored });
        }

        debug!(
            target: "docindex::reader",
            generation,
            segments = segments.len(),
            docs = live.len(),
            "Opened reader"
        );
        Ok(IndexReader {
            path: dir.path().to_path_buf(),
            generation,
            segments,
            live,
        })
    }

    /// Index location
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Generation this reader observes
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Live documents
    pub fn num_docs(&self) -> usize {
        self.live.len()
    }

    /// Segments in the generation
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Whether `doc_id` is live
    pub fn contains(&self, doc_id: &DocId) -> bool {
        self.live.contains_key(doc_id)
    }

    /// Stored fields for a live document
    pub fn document(&self, doc_id: &DocId) -> Option<&StoredFields> {
        let &(idx, ord) = self.live.get(doc_id)?;
        self.segments.get(idx)?.stored.get(ord as usize)
    }

    /// Live document keys, sorted
    pub fn docs(&self) -> Vec<DocId> {
        let mut docs: Vec<DocId> = self.live.keys().cloned().collect();
        docs.sort();
        docs
    }

    /// Live postings for `term`, ordered by document key.
    ///
    /// `term` is matched exactly; callers normalize it with the tokenizer.
    pub fn postings(&self, term: &str) -> Vec<PostingHit> {
        let mut hits: BTreeMap<&DocId, PostingHit> = BTreeMap::new();
        for (idx, rs) in self.segments.iter().enumerate() {
            let iter = match rs.segment.posting_iter(term) {
                Some(iter) => iter,
                None => continue,
            };
            for entry in iter {
                let doc_id = match rs.segment.doc_id(entry.doc) {
                    Some(doc_id) => doc_id,
                    None => continue,
                };
                if self.live.get(doc_id) != Some(&(idx, entry.doc)) {
                    continue;
                }
                hits.insert(
                    doc_id,
                    PostingHit {
                        doc_id: doc_id.clone(),
                        frequency: entry.frequency(),
                        positions: entry.positions,
                    },
                );
            }
        }
        hits.into_values().collect()
    }

    /// Documents containing `term`, ordered by key.
    pub fn lookup(&self, term: &str) -> Vec<DocId> {
        self.postings(term).into_iter().map(|hit| hit.doc_id).collect()
    }

    /// Number of live documents containing `term`
    pub fn doc_freq(&self, term: &str) -> usize {
        self.postings(term).len()
    }

    /// Frequency of `term` in `doc_id` (0 if absent)
    pub fn frequency(&self, term: &str, doc_id: &DocId) -> u32 {
        let &(idx, ord) = match self.live.get(doc_id) {
            Some(location) => location,
            None => return 0,
        };
        self.segments
            .get(idx)
            .and_then(|rs| rs.segment.posting_iter(term))
            .and_then(|mut iter| iter.find(|e| e.doc == ord))
            .map(|e| e.frequency())
            .unwrap_or(0)
    }

    /// Terms with at least one live posting, sorted
    pub fn terms(&self) -> BTreeSet<String> {
        let candidates: BTreeSet<&str> = self
            .segments
            .iter()
            .flat_map(|rs| rs.segment.terms())
            .collect();
        candidates
            .into_iter()
            .filter(|term| self.doc_freq(term) > 0)
            .map(str::to_string)
            .collect()
    }
}

impl std::fmt::Debug for IndexReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexReader")
            .field("path", &self.path)
            .field("generation", &self.generation)
            .field("segments", &self.segments.len())
            .field("docs", &self.live.len())
            .finish()
    }
}
