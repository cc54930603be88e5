//! Shared test utilities for the integration suites.
//!
//! Import via `#[path = "../common/mod.rs"] mod common;` from a suite's main.rs.

#![allow(dead_code)]
#![allow(unused_imports)]

use std::fs::{self, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

pub use docindex::{
    index_path, DocId, IndexConfig, IndexError, IndexReader, IndexWriter, IngestOptions,
    IngestReport, OpenMode, SkipReason,
};
use tempfile::TempDir;

// ============================================================================
// TestIndex - a document tree plus an index location in one temp dir
// ============================================================================

/// Temp directory holding `docs/` and `index/`.
pub struct TestIndex {
    pub dir: TempDir,
    pub docs: PathBuf,
    pub index: PathBuf,
}

impl TestIndex {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let docs = dir.path().join("docs");
        let index = dir.path().join("index");
        fs::create_dir_all(&docs).unwrap();
        TestIndex { dir, docs, index }
    }

    /// Write a document under `docs/`, creating parent directories.
    pub fn write_doc(&self, rel: &str, content: impl AsRef<[u8]>) -> PathBuf {
        let path = self.docs.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    pub fn remove_doc(&self, rel: &str) {
        fs::remove_file(self.docs.join(rel)).unwrap();
    }

    /// Key the ingestion driver assigns to `docs/<rel>`.
    pub fn id(&self, rel: &str) -> DocId {
        DocId::from_path(&self.docs.join(rel)).unwrap()
    }

    pub fn writer(&self, mode: OpenMode) -> IndexWriter {
        self.writer_with(mode, IndexConfig::default())
    }

    pub fn writer_with(&self, mode: OpenMode, config: IndexConfig) -> IndexWriter {
        IndexWriter::open(&self.index, mode, config).unwrap()
    }

    pub fn reader(&self) -> IndexReader {
        IndexReader::open(&self.index).unwrap()
    }

    /// One full driver run: open, walk `docs/`, close.
    pub fn run(&self, mode: OpenMode) -> IngestReport {
        self.run_with(mode, IndexConfig::default())
    }

    pub fn run_with(&self, mode: OpenMode, config: IndexConfig) -> IngestReport {
        let options = IngestOptions::from_config(&config).exclude(&self.index);
        let mut writer = self.writer_with(mode, config);
        let report = index_path(&mut writer, &self.docs, &options).unwrap();
        writer.close().unwrap();
        report
    }

    /// Names of the files at the index location, sorted.
    pub fn index_files(&self) -> Vec<String> {
        list_files(&self.index)
    }

    pub fn current(&self) -> String {
        fs::read_to_string(self.index.join("CURRENT")).unwrap()
    }
}

/// Observable committed state: every live doc with its stored path, and
/// every term with its postings.
pub fn snapshot(reader: &IndexReader) -> Vec<(String, Vec<(DocId, u32, Vec<u32>)>)> {
    reader
        .terms()
        .into_iter()
        .map(|term| {
            let hits = reader
                .postings(&term)
                .into_iter()
                .map(|h| (h.doc_id, h.frequency, h.positions))
                .collect();
            (term, hits)
        })
        .collect()
}

// ============================================================================
// File helpers
// ============================================================================

pub fn list_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = match fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    };
    names.sort();
    names
}

pub fn files_with_suffix(dir: &Path, suffix: &str) -> Vec<PathBuf> {
    list_files(dir)
        .into_iter()
        .filter(|name| name.ends_with(suffix))
        .map(|name| dir.join(name))
        .collect()
}

pub fn file_size(path: &Path) -> u64 {
    fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

pub fn corrupt_file_at_offset(path: &Path, offset: u64, bytes: &[u8]) {
    let mut file = OpenOptions::new().write(true).open(path).unwrap();
    file.seek(SeekFrom::Start(offset)).unwrap();
    file.write_all(bytes).unwrap();
    file.sync_all().unwrap();
}

/// Invert one byte in place.
pub fn flip_byte(path: &Path, offset: u64) {
    let bytes = fs::read(path).unwrap();
    let byte = bytes[offset as usize];
    corrupt_file_at_offset(path, offset, &[!byte]);
}

pub fn truncate_file(path: &Path, new_size: u64) {
    let file = OpenOptions::new().write(true).open(path).unwrap();
    file.set_len(new_size).unwrap();
}
