//! Segment merging
//!
//! Rewrites a set of segments into one image, dropping tombstoned documents.
//! This is the only way tombstoned postings ever leave the index.
//!
//! When the same key is live in more than one input, the newest input wins;
//! older copies are discarded like tombstoned ones.

use std::collections::{BTreeMap, BTreeSet};

use docindex_core::{DocId, Result, StoredFields};
use tracing::debug;

use crate::postings::{FlushedPostings, PostingEntry};
use crate::segment::Segment;

/// One segment to merge, with its deletions and stored fields.
pub struct MergeInput<'a> {
    /// Segment to read
    pub segment: &'a Segment,
    /// Ordinals to drop
    pub tombstones: &'a BTreeSet<u32>,
    /// Stored fields by ordinal
    pub stored: &'a [StoredFields],
}

/// Merged image plus stored fields in the new ordinal order.
#[derive(Debug, Default)]
pub struct MergedSegment {
    /// Postings for the new segment
    pub image: FlushedPostings,
    /// Stored fields, index = new ordinal
    pub stored: Vec<StoredFields>,
    /// Documents dropped (tombstoned or superseded)
    pub dropped: usize,
}

/// Merge `inputs` (oldest first) into a single image.
pub fn merge_segments(inputs: &[MergeInput<'_>]) -> Result<MergedSegment> {
    for input in inputs {
        input.segment.validate()?;
    }

    // Newest input claims a key first.
    let mut live: BTreeMap<&DocId, (usize, u32)> = BTreeMap::new();
    let mut total = 0usize;
    for (idx, input) in inputs.iter().enumerate().rev() {
        for (ord, doc_id) in input.segment.docs().iter().enumerate() {
            total += 1;
            let ord = ord as u32;
            if input.tombstones.contains(&ord) {
                continue;
            }
            live.entry(doc_id).or_insert((idx, ord));
        }
    }

    // Old (input, ordinal) → new ordinal, in key order.
    let mut remap: Vec<Vec<Option<u32>>> = inputs
        .iter()
        .map(|input| vec![None; input.segment.doc_count() as usize])
        .collect();
    let mut docs = Vec::with_capacity(live.len());
    let mut stored = Vec::with_capacity(live.len());
    for (new_ord, (doc_id, (idx, ord))) in live.iter().enumerate() {
        remap[*idx][*ord as usize] = Some(new_ord as u32);
        docs.push((*doc_id).clone());
        let fields = inputs[*idx]
            .stored
            .get(*ord as usize)
            .cloned()
            .unwrap_or_else(|| StoredFields::with_path(doc_id));
        stored.push(fields);
    }

    let mut terms: BTreeMap<String, Vec<PostingEntry>> = BTreeMap::new();
    for (idx, input) in inputs.iter().enumerate() {
        for term in input.segment.terms() {
            let iter = match input.segment.posting_iter(term) {
                Some(iter) => iter,
                None => continue,
            };
            let mut kept = iter
                .filter_map(|entry| {
                    let new_ord = remap[idx].get(entry.doc as usize).copied().flatten()?;
                    Some(PostingEntry::new(new_ord, entry.positions))
                })
                .peekable();
            if kept.peek().is_none() {
                continue;
            }
            terms.entry(term.to_string()).or_default().extend(kept);
        }
    }
    for entries in terms.values_mut() {
        entries.sort_by_key(|e| e.doc);
    }

    let dropped = total - docs.len();
    debug!(
        target: "docindex::merge",
        inputs = inputs.len(),
        docs = docs.len(),
        terms = terms.len(),
        dropped,
        "Merged segments"
    );

    Ok(MergedSegment {
        image: FlushedPostings { docs, terms },
        stored,
        dropped,
    })
}
