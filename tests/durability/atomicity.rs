//! Atomicity Tests
//!
//! Nothing becomes visible until `CURRENT` is swapped, and an interrupted
//! writer leaves only files that the next writer sweeps.

use std::fs;

use crate::common::*;

#[test]
fn prepared_but_unpublished_is_invisible() {
    let t = TestIndex::new();
    t.write_doc("a.txt", "committed content");
    t.run(OpenMode::Create);
    let current = t.current();

    let mut writer = t.writer(OpenMode::Update);
    writer.index_document(&DocId::from("extra"), b"pending content").unwrap();
    let generation = writer.prepare_commit().unwrap();
    assert_eq!(generation, 2);
    drop(writer);

    assert_eq!(t.current(), current);
    let reader = t.reader();
    assert_eq!(reader.generation(), 1);
    assert!(reader.lookup("pending").is_empty());
    assert!(t.index_files().contains(&"manifest_2".to_string()));

    // Next writer sweeps the orphaned generation.
    let writer = t.writer(OpenMode::Update);
    assert!(!t.index_files().contains(&"manifest_2".to_string()));
    assert_eq!(writer.num_docs(), 1);
}

#[test]
fn prepare_then_commit_publishes_prepared_generation() {
    let t = TestIndex::new();
    let mut writer = t.writer(OpenMode::Create);
    writer.index_document(&DocId::from("d"), b"two phase").unwrap();
    let prepared = writer.prepare_commit().unwrap();
    assert_eq!(t.reader().generation(), 0);

    let info = writer.commit().unwrap();
    assert_eq!(info.generation, prepared);
    assert_eq!(t.reader().lookup("phase"), vec![DocId::from("d")]);
}

#[test]
fn dropped_writer_loses_only_uncommitted_work() {
    let t = TestIndex::new();
    t.write_doc("a.txt", "durable");
    t.run(OpenMode::Create);
    let before = snapshot(&t.reader());

    let mut writer = t.writer(OpenMode::Update);
    writer.index_document(&DocId::from("lost"), b"flushed never committed").unwrap();
    writer.flush().unwrap();
    drop(writer);

    assert_eq!(snapshot(&t.reader()), before);

    let _writer = t.writer(OpenMode::Update);
    let segments = files_with_suffix(&t.index, ".sidx");
    assert_eq!(segments.len(), 1, "orphan segment should be swept");
}

#[test]
fn failed_publish_keeps_prior_generation_and_retries() {
    let t = TestIndex::new();
    t.write_doc("a.txt", "first generation");
    t.run(OpenMode::Create);
    let current = t.current();

    let mut writer = t.writer(OpenMode::Update);

    // A directory squatting on the temp name makes the pointer write fail.
    let blocker = t.index.join("CURRENT.tmp");
    fs::create_dir(&blocker).unwrap();

    writer.index_document(&DocId::from("b"), b"second generation").unwrap();
    let err = writer.commit().unwrap_err();
    assert!(
        matches!(err, IndexError::CommitIo { generation: 2, .. }),
        "{:?}",
        err
    );
    assert_eq!(t.current(), current);
    assert!(t.reader().lookup("second").is_empty());

    fs::remove_dir(&blocker).unwrap();
    let info = writer.commit().unwrap();
    assert_eq!(info.generation, 2);
    drop(writer);

    let reader = t.reader();
    assert_eq!(reader.generation(), 2);
    assert_eq!(reader.lookup("second"), vec![DocId::from("b")]);
    assert_eq!(reader.lookup("first"), vec![t.id("a.txt")]);
}

#[test]
fn reader_keeps_its_generation_across_commits() {
    let t = TestIndex::new();
    t.write_doc("a.txt", "old view");
    t.run(OpenMode::Create);
    let reader = t.reader();

    t.write_doc("b.txt", "new view");
    t.run(OpenMode::Update);

    assert_eq!(reader.generation(), 1);
    assert_eq!(reader.num_docs(), 1);
    assert_eq!(reader.lookup("view"), vec![t.id("a.txt")]);
    assert_eq!(t.reader().num_docs(), 2);
}

#[test]
fn stale_temp_files_swept_on_open() {
    let t = TestIndex::new();
    t.write_doc("a.txt", "content");
    t.run(OpenMode::Create);
    fs::write(t.index.join("seg_99.sidx.tmp"), b"half written").unwrap();
    fs::write(t.index.join("notes.txt"), b"not ours").unwrap();

    let _writer = t.writer(OpenMode::Update);
    let files = t.index_files();
    assert!(!files.contains(&"seg_99.sidx.tmp".to_string()));
    assert!(files.contains(&"notes.txt".to_string()));
}
