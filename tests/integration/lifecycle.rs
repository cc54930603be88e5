//! Lifecycle Tests
//!
//! Open → index → commit → reopen, idempotence, and stored-field round trips.

use crate::common::*;

#[test]
fn tokenized_frequency_visible_after_commit() {
    let t = TestIndex::new();
    t.write_doc("greeting.txt", "Hello, World! Hello");
    t.run(OpenMode::Create);

    let reader = t.reader();
    let doc = t.id("greeting.txt");
    assert_eq!(reader.lookup("hello"), vec![doc.clone()]);
    assert_eq!(reader.frequency("hello", &doc), 2);
    assert_eq!(reader.frequency("world", &doc), 1);
    assert_eq!(reader.postings("hello")[0].positions, vec![0, 2]);
}

#[test]
fn stored_fields_round_trip() {
    let t = TestIndex::new();
    t.write_doc("notes/a.txt", "alpha beta");
    t.run(OpenMode::Create);

    let reader = t.reader();
    let doc = t.id("notes/a.txt");
    let fields = reader.document(&doc).expect("document stored");
    assert_eq!(fields.path(), Some(doc.as_str()));
}

#[test]
fn every_term_of_a_document_is_retrievable() {
    let t = TestIndex::new();
    let text = "the quick brown fox jumps over the lazy dog";
    t.write_doc("fox.txt", text);
    t.run(OpenMode::Create);

    let reader = t.reader();
    let doc = t.id("fox.txt");
    for term in text.split_whitespace() {
        assert_eq!(reader.lookup(term), vec![doc.clone()], "term {}", term);
    }
    assert_eq!(reader.frequency("the", &doc), 2);
    assert_eq!(reader.terms().len(), 8);
}

#[test]
fn rerunning_create_is_idempotent() {
    let t = TestIndex::new();
    t.write_doc("a.txt", "one two three");
    t.write_doc("sub/b.txt", "two three four");

    t.run(OpenMode::Create);
    let first = t.reader();
    let first_snapshot = snapshot(&first);
    let first_docs = first.docs();

    t.run(OpenMode::Create);
    let second = t.reader();
    assert!(second.generation() > first.generation());
    assert_eq!(snapshot(&second), first_snapshot);
    assert_eq!(second.docs(), first_docs);
}

#[test]
fn rerunning_update_is_idempotent() {
    let t = TestIndex::new();
    t.write_doc("a.txt", "one two");
    t.write_doc("b.txt", "two three");

    t.run(OpenMode::Create);
    let before = snapshot(&t.reader());

    let report = t.run(OpenMode::Update);
    assert_eq!(report.replaced, 2);
    assert_eq!(report.added(), 0);

    let reader = t.reader();
    assert_eq!(snapshot(&reader), before);
    assert_eq!(reader.num_docs(), 2);
}

#[test]
fn commit_without_changes_keeps_generation() {
    let t = TestIndex::new();
    t.write_doc("a.txt", "content");
    t.run(OpenMode::Create);
    let generation = t.reader().generation();

    let mut writer = t.writer(OpenMode::Update);
    let info = writer.commit().unwrap();
    assert_eq!(info.generation, generation);
    drop(writer);
    assert_eq!(t.reader().generation(), generation);
}

#[test]
fn committed_files_only() {
    let t = TestIndex::new();
    t.write_doc("a.txt", "content");
    t.run(OpenMode::Create);
    t.write_doc("b.txt", "more content");
    t.run(OpenMode::Update);

    let files = t.index_files();
    assert!(files.iter().all(|f| !f.ends_with(".tmp")), "{:?}", files);
    let manifests: Vec<&String> = files.iter().filter(|f| f.starts_with("manifest_")).collect();
    assert_eq!(manifests.len(), 1, "{:?}", files);
    assert!(t.current().starts_with(manifests[0].as_str()));
}

#[test]
fn explicit_delete_removes_document() {
    let t = TestIndex::new();
    t.write_doc("a.txt", "keep");
    t.write_doc("b.txt", "drop");
    t.run(OpenMode::Create);

    let mut writer = t.writer(OpenMode::Update);
    assert!(writer.delete_document(&t.id("b.txt")).unwrap());
    assert!(!writer.delete_document(&t.id("missing.txt")).unwrap());
    writer.close().unwrap();

    let reader = t.reader();
    assert_eq!(reader.docs(), vec![t.id("a.txt")]);
    assert!(reader.lookup("drop").is_empty());
}
