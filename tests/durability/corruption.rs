//! Corruption Tests
//!
//! Damaged files are reported as `Corruption`, never silently read.

use std::fs;

use crate::common::*;

fn committed_index() -> TestIndex {
    let t = TestIndex::new();
    t.write_doc("a.txt", "some indexed words");
    t.write_doc("b.txt", "more indexed words");
    t.run(OpenMode::Create);
    t
}

fn assert_corruption<T: std::fmt::Debug>(result: docindex::Result<T>) {
    match result {
        Err(IndexError::Corruption(_)) => {}
        other => panic!("expected corruption, got {:?}", other),
    }
}

#[test]
fn flipped_segment_byte_detected() {
    let t = committed_index();
    let segment = files_with_suffix(&t.index, ".sidx").remove(0);
    flip_byte(&segment, 60);

    assert_corruption(IndexReader::open(&t.index));
    assert_corruption(IndexWriter::open(&t.index, OpenMode::Update, IndexConfig::default()));
}

#[test]
fn truncated_segment_detected() {
    let t = committed_index();
    let segment = files_with_suffix(&t.index, ".sidx").remove(0);
    truncate_file(&segment, file_size(&segment) / 2);

    assert_corruption(IndexReader::open(&t.index));
}

#[test]
fn damaged_stored_fields_detected() {
    let t = committed_index();
    let stored = files_with_suffix(&t.index, ".sdoc").remove(0);
    let size = file_size(&stored);
    flip_byte(&stored, size - 6);

    assert_corruption(IndexReader::open(&t.index));
}

#[test]
fn damaged_current_pointer_detected() {
    let t = committed_index();
    fs::write(t.index.join("CURRENT"), "manifest_7\n00000000\n").unwrap();

    assert_corruption(IndexReader::open(&t.index));
}

#[test]
fn damaged_manifest_detected() {
    let t = committed_index();
    let manifest = t.index.join("manifest_1");
    flip_byte(&manifest, 8);

    assert_corruption(IndexReader::open(&t.index));
}

#[test]
fn create_mode_replaces_corrupted_index() {
    let t = committed_index();
    let segment = files_with_suffix(&t.index, ".sidx").remove(0);
    flip_byte(&segment, 60);

    t.remove_doc("b.txt");
    t.run(OpenMode::Create);

    let reader = t.reader();
    assert_eq!(reader.docs(), vec![t.id("a.txt")]);
    assert_eq!(reader.generation(), 2);
}
