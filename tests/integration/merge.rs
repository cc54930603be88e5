//! Merge Tests
//!
//! Merging compacts segments and is the only path that physically drops
//! tombstoned postings; it never changes what a reader observes.

use crate::common::*;

#[test]
fn force_merge_drops_tombstoned_versions() {
    let t = TestIndex::new();
    t.write_doc("a.txt", "stale words");
    t.write_doc("b.txt", "steady");
    t.run(OpenMode::Create);

    t.write_doc("a.txt", "fresh words");
    let mut writer = t.writer(OpenMode::Update);
    let options = IngestOptions::default().exclude(&t.index);
    index_path(&mut writer, &t.docs, &options).unwrap();
    writer.flush().unwrap();
    assert_eq!(writer.segment_count(), 2);

    assert!(writer.force_merge().unwrap().is_some());
    assert_eq!(writer.segment_count(), 1);
    writer.close().unwrap();

    let reader = t.reader();
    assert_eq!(reader.segment_count(), 1);
    assert_eq!(reader.num_docs(), 2);
    assert!(reader.lookup("stale").is_empty());
    assert_eq!(reader.lookup("fresh"), vec![t.id("a.txt")]);
    assert_eq!(files_with_suffix(&t.index, ".sidx").len(), 1);
}

#[test]
fn merge_preserves_committed_view() {
    let t = TestIndex::new();
    for i in 0..6 {
        t.write_doc(&format!("{}.txt", i), format!("shared term{} extra{}", i, i % 2));
    }
    let mut config = IndexConfig::default();
    config.max_buffered_docs = 2;
    config.merge_threshold = 0;
    t.run_with(OpenMode::Create, config);

    let before = t.reader();
    assert_eq!(before.segment_count(), 3);
    let expected = snapshot(&before);

    let mut writer = t.writer(OpenMode::Update);
    writer.force_merge().unwrap();
    writer.close().unwrap();

    let after = t.reader();
    assert_eq!(after.segment_count(), 1);
    assert_eq!(snapshot(&after), expected);
}

#[test]
fn auto_merge_above_threshold() {
    let t = TestIndex::new();
    let mut config = IndexConfig::default();
    config.merge_threshold = 2;

    for round in 0..4 {
        t.write_doc(&format!("r{}.txt", round), format!("round{} common", round));
        t.run_with(OpenMode::Update, config.clone());
        assert!(t.reader().segment_count() <= 2, "round {}", round);
    }

    let reader = t.reader();
    assert_eq!(reader.num_docs(), 4);
    assert_eq!(reader.doc_freq("common"), 4);
    assert_eq!(
        files_with_suffix(&t.index, ".sidx").len(),
        reader.segment_count()
    );
}

#[test]
fn deleting_everything_leaves_no_segments() {
    let t = TestIndex::new();
    t.write_doc("a.txt", "gone soon");
    t.run(OpenMode::Create);

    let mut writer = t.writer(OpenMode::Update);
    writer.delete_document(&t.id("a.txt")).unwrap();
    writer.close().unwrap();

    let reader = t.reader();
    assert_eq!(reader.num_docs(), 0);
    assert_eq!(reader.segment_count(), 0);
    assert!(files_with_suffix(&t.index, ".sidx").is_empty());
}
