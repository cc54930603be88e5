//! Lock Exclusivity Tests

use std::fs;

use crate::common::*;

#[test]
fn second_writer_rejected() {
    let t = TestIndex::new();
    let _writer = t.writer(OpenMode::Create);

    let err = IndexWriter::open(&t.index, OpenMode::Update, IndexConfig::default()).unwrap_err();
    assert!(matches!(err, IndexError::LockHeld { .. }), "{:?}", err);
}

#[test]
fn rejected_writer_leaves_index_untouched() {
    let t = TestIndex::new();
    t.write_doc("a.txt", "stable");
    t.run(OpenMode::Create);
    let current = t.current();
    let files = t.index_files();

    let _writer = t.writer(OpenMode::Update);
    let result = IndexWriter::open(&t.index, OpenMode::Create, IndexConfig::default());
    assert!(matches!(result, Err(IndexError::LockHeld { .. })));

    assert_eq!(t.current(), current);
    assert_eq!(t.index_files(), files);
}

#[test]
fn lock_released_on_close_and_rollback() {
    let t = TestIndex::new();
    t.writer(OpenMode::Create).close().unwrap();
    t.writer(OpenMode::Update).rollback().unwrap();
    let writer = t.writer(OpenMode::Update);
    drop(writer);
    t.writer(OpenMode::Update);
}

#[test]
fn readers_do_not_take_the_lock() {
    let t = TestIndex::new();
    t.write_doc("a.txt", "shared access");
    t.run(OpenMode::Create);

    let _writer = t.writer(OpenMode::Update);
    let reader = t.reader();
    assert_eq!(reader.lookup("shared"), vec![t.id("a.txt")]);
}

#[test]
fn lock_contention_across_threads() {
    let t = TestIndex::new();
    fs::create_dir_all(&t.index).unwrap();
    let writer = t.writer(OpenMode::Create);

    let index = t.index.clone();
    let handle = std::thread::spawn(move || {
        IndexWriter::open(&index, OpenMode::Update, IndexConfig::default()).map(|_| ())
    });
    let result = handle.join().unwrap();
    assert!(matches!(result, Err(IndexError::LockHeld { .. })));
    drop(writer);
}
