//! Index engine for docindex
//!
//! This crate owns everything between raw document bytes and committed
//! files on disk:
//! - Tokenizer and document analysis
//! - Postings buffer and document store (in-memory, single writer)
//! - Segment, stored-fields, and manifest formats
//! - IndexWriter: create/update semantics, flush, two-phase commit, merge
//! - IndexReader: committed-view lookups
//! - Ingestion driver: parallel analysis of a filesystem tree
//!
//! Only the writer mutates an index location, and only `CURRENT` decides
//! what is committed.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod analysis;
pub mod directory;
pub mod doc_store;
pub mod ingest;
pub mod lock;
pub mod manifest;
pub mod merge;
pub mod postings;
pub mod reader;
pub mod segment;
pub mod tokenizer;
pub mod writer;

pub use analysis::{decode_text, AnalyzedDocument, DocumentAnalyzer, SkipReason};
pub use doc_store::DocStore;
pub use ingest::{check_source, index_path, IngestOptions, IngestReport, SkippedDocument};
pub use postings::{FlushedPostings, PostingEntry, PostingList, PostingsBuffer};
pub use reader::{IndexReader, PostingHit};
pub use segment::Segment;
pub use tokenizer::{Token, TokenStream, Tokenizer};
pub use writer::{CommitInfo, DocumentOutcome, IndexWriter, OpenMode, WriterStats};
