//! docindex - persistent segmented full-text index for document collections
//!
//! Documents are read from a filesystem tree, tokenized into positional
//! postings, and written as immutable segments. A manifest names the live
//! segments and their deletions; the `CURRENT` pointer file decides which
//! manifest is committed, so readers never observe a partial commit.
//!
//! # Quick Start
//!
//! ```no_run
//! use docindex::{index_path, IndexConfig, IndexReader, IndexWriter, IngestOptions, OpenMode};
//! use std::path::Path;
//!
//! # fn main() -> docindex::Result<()> {
//! let index = Path::new("index");
//! let mut writer = IndexWriter::open(index, OpenMode::Create, IndexConfig::default())?;
//! let options = IngestOptions::default().exclude(index);
//! index_path(&mut writer, Path::new("docs"), &options)?;
//! writer.close()?;
//!
//! let reader = IndexReader::open(index)?;
//! for doc in reader.lookup("hello") {
//!     println!("{}", doc);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - `docindex-core`: document keys, stored fields, errors, configuration
//! - `docindex-engine`: tokenizer, postings, segment formats, writer, reader,
//!   and the ingestion driver
//! - `docindex-cli`: the `docindex` binary

pub use docindex_core::*;
pub use docindex_engine::*;
