//! Index writer and commit manager
//!
//! The writer owns an index location for its whole lifetime (exclusive
//! `write.lock`). Mutations land in the in-memory postings buffer and
//! document store; `flush` turns them into an unpublished segment; `commit`
//! publishes everything written so far as a new generation.
//!
//! # Commit protocol
//!
//! 1. flush the buffer to `seg_<id>.sidx` + `seg_<id>.sdoc` (fsynced)
//! 2. merge if the segment count exceeds `merge_threshold`
//! 3. write `manifest_<gen>` (fsynced, not yet visible)
//! 4. swap `CURRENT` to `manifest_<gen>` (temp + fsync + rename + dir fsync)
//! 5. delete files the new generation does not reference
//!
//! Steps 1–3 are `prepare_commit`. A crash anywhere before step 4 leaves the
//! previous generation as the committed state; the leftovers are swept by
//! the next writer to open the location.

use std::collections::BTreeSet;
use std::path::Path;

use docindex_core::{DocId, IndexConfig, IndexError, Result, StoredFields};
use rustc_hash::FxHashMap;
use tracing::{debug, info, warn};

use crate::analysis::{AnalyzedDocument, DocumentAnalyzer, SkipReason};
use crate::directory::IndexDirectory;
use crate::doc_store::{read_stored_fields, write_stored_fields, DocStore};
use crate::lock::IndexLock;
use crate::manifest::{
    load_current, publish_current, write_manifest, ManifestData, SegmentManifestEntry,
};
use crate::merge::{merge_segments, MergeInput};
use crate::postings::{FlushedPostings, PostingsBuffer};
use crate::segment::{build_segment, Segment};

/// How an existing index at the location is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Start from an empty view; the first commit replaces prior contents.
    Create,
    /// Keep prior contents; every add replaces an existing entry for its key.
    Update,
}

impl std::fmt::Display for OpenMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpenMode::Create => f.write_str("create"),
            OpenMode::Update => f.write_str("update"),
        }
    }
}

/// Result of indexing a single document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentOutcome {
    /// Document was buffered; `replaced` if an earlier version was superseded
    Indexed {
        /// An existing version (buffered or committed) was replaced
        replaced: bool,
    },
    /// Document was not indexed and left no trace
    Skipped(SkipReason),
}

/// Summary of a published (or no-op) commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitInfo {
    /// Generation now named by `CURRENT`
    pub generation: u64,
    /// Segments in the generation
    pub segments: usize,
    /// Live documents in the generation
    pub live_docs: u64,
}

/// Counters for the lifetime of a writer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterStats {
    /// Documents added for the first time
    pub added: u64,
    /// Documents that replaced an earlier version
    pub replaced: u64,
    /// Explicit deletions that found a document
    pub deleted: u64,
    /// Documents skipped during analysis
    pub skipped: u64,
    /// Segments flushed from the buffer
    pub flushes: u64,
    /// Merges performed
    pub merges: u64,
    /// Generations published
    pub commits: u64,
}

struct WriterSegment {
    segment: Segment,
    tombstones: BTreeSet<u32>,
}

impl WriterSegment {
    fn is_dead(&self) -> bool {
        self.tombstones.len() >= self.segment.doc_count() as usize
    }
}

/// Single writer over an index location.
pub struct IndexWriter {
    dir: IndexDirectory,
    mode: OpenMode,
    config: IndexConfig,
    analyzer: DocumentAnalyzer,
    /// Generation currently named by `CURRENT` (0 = never committed)
    generation: u64,
    next_generation: u64,
    next_segment_id: u64,
    /// Writer's view, oldest first
    segments: Vec<WriterSegment>,
    buffer: PostingsBuffer,
    doc_store: DocStore,
    /// Live documents held in segments → (segment_id, ordinal)
    locations: FxHashMap<DocId, (u64, u32)>,
    prepared: Option<ManifestData>,
    dirty: bool,
    stats: WriterStats,
    _lock: IndexLock,
}

impl IndexWriter {
    /// Open a writer, taking the location's exclusive lock.
    ///
    /// The directory is created if needed. Files left behind by an
    /// interrupted writer are swept.
    ///
    /// # Errors
    ///
    /// `LockHeld` if another writer is active, `Corruption` if the committed
    /// state cannot be loaded in `Update` mode, `Config` for invalid settings.
    pub fn open(path: &Path, mode: OpenMode, config: IndexConfig) -> Result<Self> {
        config.validate()?;
        let dir = IndexDirectory::create(path)?;
        let lock = IndexLock::acquire(&dir.lock_path())?;
        let analyzer = DocumentAnalyzer::from_config(&config)?;

        let (manifest, readable) = match load_current(&dir) {
            Ok(manifest) => (manifest, true),
            Err(e) if mode == OpenMode::Create => {
                warn!(
                    target: "docindex::writer",
                    path = %path.display(),
                    error = %e,
                    "Committed state unreadable; create mode will replace it"
                );
                (None, false)
            }
            Err(e) => return Err(e),
        };

        let generation = manifest.as_ref().map(|m| m.generation).unwrap_or(0);
        let next_generation = generation.max(dir.max_generation()?.unwrap_or(0)) + 1;
        let on_disk_next = dir.max_segment_id()?.map(|id| id + 1).unwrap_or(0);
        let next_segment_id = manifest
            .as_ref()
            .map(|m| m.next_segment_id)
            .unwrap_or(0)
            .max(on_disk_next);

        if readable {
            let keep = manifest
                .as_ref()
                .map(ManifestData::referenced_files)
                .unwrap_or_default();
            let removed = dir.sweep(&keep)?;
            if removed > 0 {
                info!(target: "docindex::writer", removed, "Swept files from an interrupted run");
            }
        }

        let mut writer = IndexWriter {
            dir,
            mode,
            config,
            analyzer,
            generation,
            next_generation,
            next_segment_id,
            segments: Vec::new(),
            buffer: PostingsBuffer::new(),
            doc_store: DocStore::new(),
            locations: FxHashMap::default(),
            prepared: None,
            dirty: mode == OpenMode::Create || manifest.is_none(),
            stats: WriterStats::default(),
            _lock: lock,
        };

        if mode == OpenMode::Update {
            if let Some(manifest) = &manifest {
                writer.load_segments(manifest)?;
            }
        }

        info!(
            target: "docindex::writer",
            path = %path.display(),
            mode = %mode,
            generation,
            segments = writer.segments.len(),
            docs = writer.locations.len(),
            "Opened index writer"
        );
        Ok(writer)
    }

    fn load_segments(&mut self, manifest: &ManifestData) -> Result<()> {
        for entry in &manifest.segments {
            let segment = Segment::open(&self.dir.segment_path(entry.segment_id))?;
            if segment.segment_id() != entry.segment_id || segment.doc_count() != entry.doc_count
            {
                return Err(IndexError::corruption(format!(
                    "segment {} does not match manifest_{}",
                    entry.segment_id, manifest.generation
                )));
            }
            let mut ws = WriterSegment {
                segment,
                tombstones: entry.tombstones.clone(),
            };
            for (ord, doc_id) in ws.segment.docs().iter().enumerate() {
                let ord = ord as u32;
                if ws.tombstones.contains(&ord) {
                    continue;
                }
                // Newer segment wins; mask the older copy.
                if let Some((old_id, old_ord)) =
                    self.locations.insert(doc_id.clone(), (entry.segment_id, ord))
                {
                    if let Some(older) = self
                        .segments
                        .iter_mut()
                        .find(|s| s.segment.segment_id() == old_id)
                    {
                        older.tombstones.insert(old_ord);
                    }
                }
            }
            ws.tombstones.retain(|&ord| ord < ws.segment.doc_count());
            self.segments.push(ws);
        }
        Ok(())
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Index location
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Open mode
    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    /// Generation currently published (0 if none)
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Live documents in the writer's view, committed or not
    pub fn num_docs(&self) -> usize {
        self.locations.len() + self.buffer.num_docs()
    }

    /// Documents waiting in the buffer
    pub fn pending_docs(&self) -> usize {
        self.buffer.num_docs()
    }

    /// Segments in the writer's view
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Lifetime counters
    pub fn stats(&self) -> WriterStats {
        self.stats
    }

    /// Active configuration
    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Analyzer used by `index_document`; clone it to analyze off-thread.
    pub fn analyzer(&self) -> &DocumentAnalyzer {
        &self.analyzer
    }

    /// Whether the writer's view contains `doc_id`
    pub fn contains(&self, doc_id: &DocId) -> bool {
        self.buffer.contains(doc_id) || self.locations.contains_key(doc_id)
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    /// Decode, tokenize, and buffer a document, replacing any earlier version.
    ///
    /// Undecodable content is reported as `Skipped`; an earlier version of
    /// the document, if any, is left as it was.
    pub fn index_document(&mut self, doc_id: &DocId, content: &[u8]) -> Result<DocumentOutcome> {
        match self.analyze(doc_id.clone(), content) {
            Ok(doc) => {
                let replaced = self.add_analyzed(doc)?;
                Ok(DocumentOutcome::Indexed { replaced })
            }
            Err(reason) => {
                self.record_skip(Path::new(doc_id.as_str()), &reason);
                Ok(DocumentOutcome::Skipped(reason))
            }
        }
    }

    /// Pure analysis step of `index_document`.
    pub fn analyze(
        &self,
        doc_id: DocId,
        content: &[u8],
    ) -> std::result::Result<AnalyzedDocument, SkipReason> {
        self.analyzer.analyze(doc_id, content)
    }

    /// Count a document skipped before it reached the writer.
    pub fn record_skip(&mut self, path: &Path, reason: &SkipReason) {
        self.stats.skipped += 1;
        warn!(target: "docindex::writer", path = %path.display(), reason = %reason, "Skipping document");
    }

    /// Apply an analyzed document. Returns true if it replaced an earlier
    /// version.
    pub fn add_analyzed(&mut self, doc: AnalyzedDocument) -> Result<bool> {
        let AnalyzedDocument {
            doc_id,
            fields,
            tokens,
            lossy,
        } = doc;

        let replaced_buffered = self.buffer.add_document(&doc_id, &tokens);
        let replaced_committed = self.tombstone(&doc_id);
        self.doc_store.put(doc_id.clone(), fields);
        let replaced = replaced_buffered || replaced_committed;

        if replaced {
            self.stats.replaced += 1;
            info!(target: "docindex::writer", doc_id = %doc_id, tokens = tokens.len(), "updating");
        } else {
            self.stats.added += 1;
            info!(target: "docindex::writer", doc_id = %doc_id, tokens = tokens.len(), "adding");
        }
        if lossy {
            debug!(target: "docindex::writer", doc_id = %doc_id, "Replaced invalid UTF-8 sequences");
        }

        self.touch();
        if self.buffer.num_docs() >= self.config.max_buffered_docs {
            self.flush()?;
        }
        Ok(replaced)
    }

    /// Remove a document from the writer's view. Returns false if absent.
    pub fn delete_document(&mut self, doc_id: &DocId) -> Result<bool> {
        let buffered = self.buffer.remove_document(doc_id);
        self.doc_store.remove(doc_id);
        let committed = self.tombstone(doc_id);
        let found = buffered || committed;
        if found {
            self.stats.deleted += 1;
            self.touch();
            info!(target: "docindex::writer", doc_id = %doc_id, "deleting");
        }
        Ok(found)
    }

    fn tombstone(&mut self, doc_id: &DocId) -> bool {
        let (segment_id, ord) = match self.locations.remove(doc_id) {
            Some(location) => location,
            None => return false,
        };
        if let Some(ws) = self
            .segments
            .iter_mut()
            .find(|s| s.segment.segment_id() == segment_id)
        {
            ws.tombstones.insert(ord);
        }
        true
    }

    fn touch(&mut self) {
        self.dirty = true;
        if self.prepared.take().is_some() {
            debug!(target: "docindex::writer", "Discarding prepared commit after further changes");
        }
    }

    /// Write the buffer as an unpublished segment.
    ///
    /// Returns the new segment id, or `None` if the buffer was empty. The
    /// buffer is only cleared once both files are durable.
    pub fn flush(&mut self) -> Result<Option<u64>> {
        if self.buffer.is_empty() {
            self.doc_store.clear();
            return Ok(None);
        }

        let image = self.buffer.snapshot();
        let segment_id = self.next_segment_id;
        let stored = self.doc_store.ordered(&image.docs);
        let segment = self.write_segment(segment_id, &image, &stored)?;
        self.next_segment_id += 1;

        for (ord, doc_id) in image.docs.iter().enumerate() {
            self.locations.insert(doc_id.clone(), (segment_id, ord as u32));
        }
        self.segments.push(WriterSegment {
            segment,
            tombstones: BTreeSet::new(),
        });
        self.buffer.clear();
        self.doc_store.clear();
        self.stats.flushes += 1;
        self.dirty = true;

        info!(
            target: "docindex::writer",
            segment_id,
            docs = image.docs.len(),
            terms = image.terms.len(),
            "Flushed segment"
        );
        Ok(Some(segment_id))
    }

    fn write_segment(
        &self,
        segment_id: u64,
        image: &FlushedPostings,
        stored: &[StoredFields],
    ) -> Result<Segment> {
        let segment_path = self.dir.segment_path(segment_id);
        build_segment(segment_id, image)?.write_to_file(&segment_path)?;
        write_stored_fields(&self.dir.stored_fields_path(segment_id), segment_id, stored)?;
        Segment::open(&segment_path)
    }

    /// Merge every segment into one, dropping tombstoned documents.
    ///
    /// Flushes first. Returns the merged segment's id, or `None` if there
    /// was nothing to merge. The result is published by the next commit.
    pub fn force_merge(&mut self) -> Result<Option<u64>> {
        self.flush()?;
        self.merge_all()
    }

    fn merge_all(&mut self) -> Result<Option<u64>> {
        let needs_merge = self.segments.len() > 1
            || self.segments.iter().any(|s| !s.tombstones.is_empty());
        if !needs_merge {
            return Ok(None);
        }

        let mut stored = Vec::with_capacity(self.segments.len());
        for ws in &self.segments {
            let id = ws.segment.segment_id();
            stored.push(read_stored_fields(&self.dir.stored_fields_path(id), id)?);
        }
        let inputs: Vec<MergeInput<'_>> = self
            .segments
            .iter()
            .zip(&stored)
            .map(|(ws, stored)| MergeInput {
                segment: &ws.segment,
                tombstones: &ws.tombstones,
                stored,
            })
            .collect();
        let merged = merge_segments(&inputs)?;
        let merged_from = inputs.len();
        drop(inputs);

        if merged.image.is_empty() {
            self.stats.merges += 1;
            self.touch();
            self.locations.clear();
            self.segments.clear();
            info!(target: "docindex::writer", merged_from, "Merged away all documents");
            return Ok(None);
        }

        // Writer state is only replaced once the merged segment is on disk;
        // a failed write leaves the inputs and their tombstones authoritative.
        let segment_id = self.next_segment_id;
        let segment = self.write_segment(segment_id, &merged.image, &merged.stored)?;
        self.next_segment_id += 1;
        self.stats.merges += 1;
        self.touch();

        self.locations = merged
            .image
            .docs
            .iter()
            .enumerate()
            .map(|(ord, doc_id)| (doc_id.clone(), (segment_id, ord as u32)))
            .collect();
        self.segments = vec![WriterSegment {
            segment,
            tombstones: BTreeSet::new(),
        }];

        info!(
            target: "docindex::writer",
            segment_id,
            merged_from,
            docs = merged.image.docs.len(),
            dropped = merged.dropped,
            "Merged segments"
        );
        Ok(Some(segment_id))
    }

    // ========================================================================
    // Commit
    // ========================================================================

    /// Phase one of a commit: make everything durable without publishing.
    ///
    /// Returns the generation that `commit` will publish. Calling it again
    /// without intervening changes is a no-op.
    pub fn prepare_commit(&mut self) -> Result<u64> {
        if let Some(prepared) = &self.prepared {
            return Ok(prepared.generation);
        }
        let generation = self.next_generation;
        let manifest = self
            .prepare_manifest(generation)
            .map_err(|e| commit_error(generation, e))?;
        debug!(
            target: "docindex::writer",
            generation,
            segments = manifest.segments.len(),
            "Prepared commit"
        );
        self.prepared = Some(manifest);
        Ok(generation)
    }

    fn prepare_manifest(&mut self, generation: u64) -> Result<ManifestData> {
        self.flush()?;
        let threshold = self.config.merge_threshold;
        if threshold > 0 && self.segments.len() > threshold {
            self.merge_all()?;
        }
        self.segments.retain(|ws| !ws.is_dead());

        let segments = self
            .segments
            .iter()
            .map(|ws| SegmentManifestEntry {
                segment_id: ws.segment.segment_id(),
                doc_count: ws.segment.doc_count(),
                tombstones: ws.tombstones.clone(),
            })
            .collect();
        let manifest = ManifestData::new(
            generation,
            self.next_segment_id,
            segments,
            self.locations.len() as u64,
        );
        write_manifest(&self.dir, &manifest)?;
        Ok(manifest)
    }

    /// Publish all changes as a new generation.
    ///
    /// On error the previously committed generation stays current and the
    /// writer keeps its changes, so the commit can be retried.
    pub fn commit(&mut self) -> Result<CommitInfo> {
        if !self.dirty && self.prepared.is_none() {
            debug!(target: "docindex::writer", generation = self.generation, "Nothing to commit");
            return Ok(CommitInfo {
                generation: self.generation,
                segments: self.segments.len(),
                live_docs: self.locations.len() as u64,
            });
        }

        let generation = self.prepare_commit()?;
        publish_current(&self.dir, generation).map_err(|source| {
            warn!(target: "docindex::writer", generation, error = %source, "Publishing commit failed");
            IndexError::CommitIo { generation, source }
        })?;

        let manifest = match self.prepared.take() {
            Some(manifest) => manifest,
            None => return Err(IndexError::InvalidOperation("prepared commit vanished".into())),
        };
        self.generation = generation;
        self.next_generation = generation + 1;
        self.dirty = false;
        self.stats.commits += 1;

        if let Err(e) = self.dir.sweep(&manifest.referenced_files()) {
            warn!(target: "docindex::writer", generation, error = %e, "Sweeping unreferenced files failed");
        }

        info!(
            target: "docindex::writer",
            generation,
            segments = manifest.segments.len(),
            live_docs = manifest.live_docs,
            "Committed"
        );
        Ok(CommitInfo {
            generation,
            segments: manifest.segments.len(),
            live_docs: manifest.live_docs,
        })
    }

    /// Discard all uncommitted work and release the lock.
    ///
    /// Unpublished files written by this writer are deleted; the committed
    /// generation is untouched.
    pub fn rollback(self) -> Result<()> {
        match load_current(&self.dir) {
            Ok(manifest) => {
                let keep = manifest
                    .as_ref()
                    .map(ManifestData::referenced_files)
                    .unwrap_or_default();
                self.dir.sweep(&keep)?;
            }
            Err(e) => {
                warn!(target: "docindex::writer", error = %e, "Committed state unreadable; leaving files in place");
            }
        }
        info!(
            target: "docindex::writer",
            generation = self.generation,
            discarded = self.buffer.num_docs(),
            "Rolled back"
        );
        Ok(())
    }

    /// Commit and release the lock.
    pub fn close(mut self) -> Result<CommitInfo> {
        let info = self.commit()?;
        info!(target: "docindex::writer", generation = info.generation, "Closed index writer");
        Ok(info)
    }
}

impl std::fmt::Debug for IndexWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexWriter")
            .field("path", &self.dir.path())
            .field("mode", &self.mode)
            .field("generation", &self.generation)
            .field("segments", &self.segments.len())
            .field("pending_docs", &self.buffer.num_docs())
            .finish()
    }
}

/// Durable-write failures while preparing become `CommitIo`.
fn commit_error(generation: u64, e: IndexError) -> IndexError {
    match e {
        IndexError::Io(source) => IndexError::CommitIo { generation, source },
        other => other,
    }
}
