//! Ingestion driver: walk a filesystem tree into an index writer
//!
//! Files are discovered in sorted walk order, read and analyzed in parallel
//! batches, and applied to the writer serially in walk order. Per-file
//! problems become `Skipped` entries in the report; only writer failures
//! abort the run.

use std::fs;
use std::path::{Path, PathBuf};

use docindex_core::{DocId, IndexConfig, IndexError, Result};
use rayon::prelude::*;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::analysis::{AnalyzedDocument, DocumentAnalyzer, SkipReason};
use crate::writer::IndexWriter;

/// Knobs for `index_path`.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Files read and analyzed in parallel per batch
    pub batch_size: usize,
    /// Files larger than this are skipped
    pub max_file_bytes: Option<u64>,
    /// Subtrees never visited (typically the index itself)
    pub exclude: Vec<PathBuf>,
}

impl Default for IngestOptions {
    fn default() -> Self {
        IngestOptions::from_config(&IndexConfig::default())
    }
}

impl IngestOptions {
    /// Options taken from the index configuration
    pub fn from_config(config: &IndexConfig) -> Self {
        IngestOptions {
            batch_size: config.ingest_batch_size.max(1),
            max_file_bytes: config.max_file_bytes,
            exclude: Vec::new(),
        }
    }

    /// Add a subtree to skip
    pub fn exclude(mut self, path: impl Into<PathBuf>) -> Self {
        self.exclude.push(path.into());
        self
    }
}

/// A document the driver did not index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedDocument {
    /// Path as discovered
    pub path: PathBuf,
    /// Why it was skipped
    pub reason: SkipReason,
}

/// Aggregated per-document outcomes of one `index_path` run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Documents indexed (new or replacing)
    pub indexed: usize,
    /// Of `indexed`, how many replaced an earlier version
    pub replaced: usize,
    /// Documents not indexed
    pub skipped: Vec<SkippedDocument>,
}

impl IngestReport {
    /// Documents indexed for the first time
    pub fn added(&self) -> usize {
        self.indexed - self.replaced
    }

    /// Every file the walk produced an outcome for
    pub fn visited(&self) -> usize {
        self.indexed + self.skipped.len()
    }
}

/// Verify the source root exists and can be read.
///
/// Drivers call this before opening a writer so a bad root never touches
/// the index.
pub fn check_source(root: &Path) -> Result<()> {
    let unreadable = |e: std::io::Error| IndexError::SourceUnreadable {
        path: root.to_path_buf(),
        reason: e.to_string(),
    };
    let meta = fs::metadata(root).map_err(unreadable)?;
    if meta.is_dir() {
        fs::read_dir(root).map_err(unreadable)?;
    } else {
        fs::File::open(root).map_err(unreadable)?;
    }
    Ok(())
}

enum Candidate {
    File { path: PathBuf, doc_id: DocId },
    Skip { path: PathBuf, reason: SkipReason },
}

/// Index a single file or every regular file beneath a directory.
///
/// Symlinks are followed; a link back to one of its ancestors is reported
/// as skipped instead of being walked forever.
pub fn index_path(
    writer: &mut IndexWriter,
    root: &Path,
    options: &IngestOptions,
) -> Result<IngestReport> {
    check_source(root)?;
    info!(target: "docindex::ingest", root = %root.display(), "Indexing documents");

    let excluded: Vec<PathBuf> = options
        .exclude
        .iter()
        .filter_map(|p| p.canonicalize().ok())
        .collect();
    let is_excluded = |path: &Path| -> bool {
        !excluded.is_empty()
            && path
                .canonicalize()
                .map(|c| excluded.iter().any(|e| e == &c))
                .unwrap_or(false)
    };

    let mut walk = WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !(entry.file_type().is_dir() && is_excluded(entry.path())))
        .filter_map(|entry| classify(entry, options))
        .peekable();

    let analyzer = writer.analyzer().clone();
    let batch_size = options.batch_size.max(1);
    let mut report = IngestReport::default();

    while walk.peek().is_some() {
        let batch: Vec<Candidate> = walk.by_ref().take(batch_size).collect();
        let analyzed: Vec<(PathBuf, std::result::Result<AnalyzedDocument, SkipReason>)> = batch
            .into_par_iter()
            .map(|candidate| analyze_candidate(&analyzer, candidate))
            .collect();

        for (path, result) in analyzed {
            match result {
                Ok(doc) => {
                    let replaced = writer.add_analyzed(doc)?;
                    report.indexed += 1;
                    if replaced {
                        report.replaced += 1;
                    }
                }
                Err(reason) => {
                    writer.record_skip(&path, &reason);
                    report.skipped.push(SkippedDocument { path, reason });
                }
            }
        }
    }

    info!(
        target: "docindex::ingest",
        root = %root.display(),
        indexed = report.indexed,
        replaced = report.replaced,
        skipped = report.skipped.len(),
        "Finished indexing documents"
    );
    Ok(report)
}

fn classify(
    entry: walkdir::Result<walkdir::DirEntry>,
    options: &IngestOptions,
) -> Option<Candidate> {
    let entry = match entry {
        Ok(entry) => entry,
        Err(err) => {
            let path = err.path().map(Path::to_path_buf).unwrap_or_default();
            let reason = if err.loop_ancestor().is_some() {
                SkipReason::SymlinkLoop
            } else {
                SkipReason::Walk(err.to_string())
            };
            return Some(Candidate::Skip { path, reason });
        }
    };

    if !entry.file_type().is_file() {
        if !entry.file_type().is_dir() {
            debug!(target: "docindex::ingest", path = %entry.path().display(), "Ignoring non-regular file");
        }
        return None;
    }

    let path = entry.path().to_path_buf();
    if let Some(limit) = options.max_file_bytes {
        match entry.metadata() {
            Ok(meta) if meta.len() > limit => {
                return Some(Candidate::Skip {
                    path,
                    reason: SkipReason::TooLarge {
                        size: meta.len(),
                        limit,
                    },
                });
            }
            Ok(_) => {}
            Err(e) => {
                return Some(Candidate::Skip {
                    path,
                    reason: SkipReason::Unreadable(e.to_string()),
                })
            }
        }
    }

    match DocId::from_path(&path) {
        Ok(doc_id) => Some(Candidate::File { path, doc_id }),
        Err(_) => Some(Candidate::Skip {
            path,
            reason: SkipReason::NonUtf8Path,
        }),
    }
}

fn analyze_candidate(
    analyzer: &DocumentAnalyzer,
    candidate: Candidate,
) -> (PathBuf, std::result::Result<AnalyzedDocument, SkipReason>) {
    match candidate {
        Candidate::Skip { path, reason } => (path, Err(reason)),
        Candidate::File { path, doc_id } => {
            let result = match fs::read(&path) {
                Ok(bytes) => analyzer.analyze(doc_id, &bytes),
                Err(e) => {
                    warn!(target: "docindex::ingest", path = %path.display(), error = %e, "Failed to read document");
                    Err(SkipReason::Unreadable(e.to_string()))
                }
            };
            (path, result)
        }
    }
}
