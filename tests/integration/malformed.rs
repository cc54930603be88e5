//! Malformed Input Tests
//!
//! Bad bytes in one document never abort a run or disturb other documents.

use docindex::InvalidUtf8Policy;

use crate::common::*;

fn skip_policy() -> IndexConfig {
    let mut config = IndexConfig::default();
    config.invalid_utf8 = InvalidUtf8Policy::Skip;
    config
}

#[test]
fn invalid_utf8_replaced_by_default() {
    let t = TestIndex::new();
    t.write_doc("mixed.txt", b"caf\xFF latte".as_slice());
    t.write_doc("clean.txt", "latte art");

    let report = t.run(OpenMode::Create);
    assert_eq!(report.indexed, 2);
    assert!(report.skipped.is_empty());

    let reader = t.reader();
    assert_eq!(reader.lookup("caf"), vec![t.id("mixed.txt")]);
    assert_eq!(reader.doc_freq("latte"), 2);
}

#[test]
fn invalid_utf8_skipped_with_skip_policy() {
    let t = TestIndex::new();
    t.write_doc("bad.txt", b"\xC3\x28 broken".as_slice());
    t.write_doc("good.txt", "intact");

    let report = t.run_with(OpenMode::Create, skip_policy());
    assert_eq!(report.indexed, 1);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].reason, SkipReason::InvalidUtf8);

    let reader = t.reader();
    assert!(!reader.contains(&t.id("bad.txt")));
    assert!(reader.lookup("broken").is_empty());
    assert_eq!(reader.lookup("intact"), vec![t.id("good.txt")]);
}

#[test]
fn skipped_update_keeps_committed_version() {
    let t = TestIndex::new();
    t.write_doc("a.txt", "readable original");
    t.run_with(OpenMode::Create, skip_policy());

    t.write_doc("a.txt", b"\xFF\xFE garbage".as_slice());
    let report = t.run_with(OpenMode::Update, skip_policy());
    assert_eq!(report.skipped.len(), 1);

    let reader = t.reader();
    assert_eq!(reader.lookup("original"), vec![t.id("a.txt")]);
}

#[test]
fn empty_file_indexed_without_terms() {
    let t = TestIndex::new();
    t.write_doc("empty.txt", "");
    t.write_doc("punct.txt", "!!! ... ???");

    let report = t.run(OpenMode::Create);
    assert_eq!(report.indexed, 2);

    let reader = t.reader();
    assert!(reader.contains(&t.id("empty.txt")));
    assert!(reader.contains(&t.id("punct.txt")));
    assert!(reader.terms().is_empty());
}

#[test]
fn binary_content_does_not_abort() {
    let t = TestIndex::new();
    let bytes: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
    t.write_doc("blob.bin", &bytes);
    t.write_doc("text.txt", "after the blob");

    let report = t.run(OpenMode::Create);
    assert_eq!(report.indexed, 2);
    assert_eq!(t.reader().lookup("blob"), vec![t.id("text.txt")]);
}

#[test]
fn byte_order_mark_not_part_of_first_term() {
    let t = TestIndex::new();
    t.write_doc("bom.txt", b"\xEF\xBB\xBFfirst word".as_slice());
    t.run(OpenMode::Create);

    let reader = t.reader();
    assert_eq!(reader.lookup("first"), vec![t.id("bom.txt")]);
    assert_eq!(reader.postings("first")[0].positions, vec![0]);
}
