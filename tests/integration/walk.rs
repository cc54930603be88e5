//! Directory Walk Tests

use std::fs;

use crate::common::*;

#[test]
fn nested_tree_indexed() {
    let t = TestIndex::new();
    t.write_doc("a.txt", "root level");
    t.write_doc("sub/b.txt", "nested level");
    t.write_doc("sub/deeper/c.txt", "deepest level");
    fs::create_dir_all(t.docs.join("empty/dir")).unwrap();

    let report = t.run(OpenMode::Create);
    assert_eq!(report.indexed, 3);
    assert!(report.skipped.is_empty());

    let reader = t.reader();
    assert_eq!(
        reader.lookup("level"),
        vec![t.id("a.txt"), t.id("sub/b.txt"), t.id("sub/deeper/c.txt")]
    );
}

#[test]
fn single_file_root() {
    let t = TestIndex::new();
    let file = t.write_doc("only.txt", "solitary document");

    let options = IngestOptions::default();
    let mut writer = t.writer(OpenMode::Create);
    let report = index_path(&mut writer, &file, &options).unwrap();
    writer.close().unwrap();

    assert_eq!(report.indexed, 1);
    assert_eq!(t.reader().lookup("solitary"), vec![t.id("only.txt")]);
}

#[test]
fn missing_root_is_source_error_and_writes_nothing() {
    let t = TestIndex::new();
    let missing = t.dir.path().join("nope");

    let err = docindex::check_source(&missing).unwrap_err();
    assert!(matches!(err, IndexError::SourceUnreadable { .. }));
    assert!(!t.index.exists());
}

#[test]
fn oversized_files_skipped() {
    let t = TestIndex::new();
    t.write_doc("small.txt", "tiny");
    t.write_doc("big.txt", "x ".repeat(1000));

    let mut config = IndexConfig::default();
    config.max_file_bytes = Some(100);
    let report = t.run_with(OpenMode::Create, config);

    assert_eq!(report.indexed, 1);
    assert_eq!(report.skipped.len(), 1);
    assert!(matches!(report.skipped[0].reason, SkipReason::TooLarge { .. }));
    assert!(!t.reader().contains(&t.id("big.txt")));
}

#[test]
fn small_batches_match_single_batch() {
    let a = TestIndex::new();
    let b = TestIndex::new();
    for t in [&a, &b] {
        for i in 0..20 {
            t.write_doc(&format!("d{:02}.txt", i), format!("common word{}", i % 3));
        }
    }

    let mut small = IndexConfig::default();
    small.ingest_batch_size = 3;
    small.max_buffered_docs = 4;
    a.run_with(OpenMode::Create, small);
    b.run(OpenMode::Create);

    let ra = a.reader();
    let rb = b.reader();
    assert_eq!(ra.num_docs(), 20);
    assert_eq!(ra.doc_freq("common"), rb.doc_freq("common"));
    assert_eq!(ra.doc_freq("word1"), rb.doc_freq("word1"));
    assert_eq!(ra.terms(), rb.terms());
}

#[cfg(unix)]
#[test]
fn symlink_cycle_terminates() {
    let t = TestIndex::new();
    t.write_doc("sub/file.txt", "reachable");
    std::os::unix::fs::symlink(&t.docs, t.docs.join("sub/loop")).unwrap();

    let report = t.run(OpenMode::Create);
    assert_eq!(report.indexed, 1);
    assert!(report
        .skipped
        .iter()
        .any(|s| s.reason == SkipReason::SymlinkLoop));
    assert_eq!(t.reader().lookup("reachable"), vec![t.id("sub/file.txt")]);
}

#[cfg(unix)]
#[test]
fn symlinked_file_followed() {
    let t = TestIndex::new();
    let outside = t.dir.path().join("outside.txt");
    fs::write(&outside, "linked content").unwrap();
    std::os::unix::fs::symlink(&outside, t.docs.join("link.txt")).unwrap();

    let report = t.run(OpenMode::Create);
    assert_eq!(report.indexed, 1);
    assert_eq!(t.reader().lookup("linked"), vec![t.id("link.txt")]);
}
