//! Create vs Update Tests
//!
//! Create replaces whatever the location held; Update keeps it and lets
//! each added document supersede the earlier version with the same key.

use crate::common::*;

#[test]
fn create_replaces_prior_contents() {
    let t = TestIndex::new();
    t.write_doc("old.txt", "ancient");
    t.run(OpenMode::Create);

    t.remove_doc("old.txt");
    t.write_doc("new.txt", "modern");
    t.run(OpenMode::Create);

    let reader = t.reader();
    assert_eq!(reader.docs(), vec![t.id("new.txt")]);
    assert!(reader.lookup("ancient").is_empty());
}

#[test]
fn update_adds_to_prior_contents() {
    let t = TestIndex::new();
    t.write_doc("a.txt", "first");
    t.run(OpenMode::Create);

    t.write_doc("b.txt", "second");
    let report = t.run(OpenMode::Update);
    assert_eq!(report.added(), 1);
    assert_eq!(report.replaced, 1);

    let reader = t.reader();
    assert_eq!(reader.num_docs(), 2);
    assert_eq!(reader.lookup("first"), vec![t.id("a.txt")]);
    assert_eq!(reader.lookup("second"), vec![t.id("b.txt")]);
}

#[test]
fn update_replaces_changed_document() {
    let t = TestIndex::new();
    t.write_doc("a.txt", "before edit");
    t.run(OpenMode::Create);

    t.write_doc("a.txt", "after edit");
    t.run(OpenMode::Update);

    let reader = t.reader();
    assert_eq!(reader.num_docs(), 1);
    assert!(reader.lookup("before").is_empty());
    assert_eq!(reader.lookup("after"), vec![t.id("a.txt")]);
    assert_eq!(reader.doc_freq("edit"), 1);
}

#[test]
fn update_keeps_documents_missing_from_source() {
    let t = TestIndex::new();
    t.write_doc("a.txt", "persisting");
    t.write_doc("b.txt", "other");
    t.run(OpenMode::Create);

    t.remove_doc("a.txt");
    t.run(OpenMode::Update);

    assert_eq!(t.reader().lookup("persisting"), vec![t.id("a.txt")]);
}

#[test]
fn update_on_empty_location_behaves_like_create() {
    let t = TestIndex::new();
    t.write_doc("a.txt", "fresh");
    let report = t.run(OpenMode::Update);

    assert_eq!(report.added(), 1);
    let reader = t.reader();
    assert_eq!(reader.generation(), 1);
    assert_eq!(reader.lookup("fresh"), vec![t.id("a.txt")]);
}

#[test]
fn duplicate_add_in_one_run_keeps_last() {
    let t = TestIndex::new();
    let doc = DocId::from("same");

    let mut writer = t.writer(OpenMode::Create);
    writer.index_document(&doc, b"first take").unwrap();
    writer.index_document(&doc, b"second take").unwrap();
    writer.close().unwrap();

    let reader = t.reader();
    assert_eq!(reader.num_docs(), 1);
    assert!(reader.lookup("first").is_empty());
    assert_eq!(reader.frequency("take", &doc), 1);
}

#[test]
fn create_writer_hides_prior_contents_before_commit() {
    let t = TestIndex::new();
    t.write_doc("a.txt", "kept until commit");
    t.run(OpenMode::Create);

    let writer = t.writer(OpenMode::Create);
    assert_eq!(writer.num_docs(), 0);
    assert!(!writer.contains(&t.id("a.txt")));

    // Nothing committed yet; readers still see the old generation.
    assert_eq!(t.reader().num_docs(), 1);
    writer.rollback().unwrap();
    assert_eq!(t.reader().num_docs(), 1);
}
