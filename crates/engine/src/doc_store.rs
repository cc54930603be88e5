//! Document store: retained per-document metadata
//!
//! The in-memory `DocStore` mirrors the postings buffer, keyed by `DocId`
//! with overwrite-by-key semantics. On flush its entries are written next to
//! the segment as `seg_<id>.sdoc`, in the segment's ordinal order.
//!
//! File layout: magic "DSTO", version u32 LE, MessagePack payload, CRC32
//! u32 LE over everything before it.

use std::collections::BTreeMap;
use std::path::Path;

use docindex_core::{DocId, IndexError, Result, StoredFields};
use serde::{Deserialize, Serialize};

use crate::directory::write_atomic;

/// Magic bytes for stored-fields files
const SDOC_MAGIC: &[u8; 4] = b"DSTO";
/// Current stored-fields format version
const SDOC_VERSION: u32 = 1;

/// Buffered stored fields for documents not yet flushed.
#[derive(Debug, Default)]
pub struct DocStore {
    entries: BTreeMap<DocId, StoredFields>,
}

impl DocStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite fields for a document.
    ///
    /// Returns the previous fields if the key was present.
    pub fn put(&mut self, doc_id: DocId, fields: StoredFields) -> Option<StoredFields> {
        self.entries.insert(doc_id, fields)
    }

    /// Fields for a document, if buffered
    pub fn get(&self, doc_id: &DocId) -> Option<&StoredFields> {
        self.entries.get(doc_id)
    }

    /// Remove a document's fields
    pub fn remove(&mut self, doc_id: &DocId) -> Option<StoredFields> {
        self.entries.remove(doc_id)
    }

    /// Number of buffered documents
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is buffered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fields for `docs` in the given order, without removing them.
    ///
    /// A key with no buffered fields gets an entry holding only its path.
    pub fn ordered(&self, docs: &[DocId]) -> Vec<StoredFields> {
        docs.iter()
            .map(|id| {
                self.entries
                    .get(id)
                    .cloned()
                    .unwrap_or_else(|| StoredFields::with_path(id))
            })
            .collect()
    }

    /// Discard all buffered entries
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

// ============================================================================
// On-disk stored fields
// ============================================================================

#[derive(Serialize, Deserialize)]
struct StoredFieldsPayload {
    segment_id: u64,
    docs: Vec<StoredFields>,
}

/// Write a segment's stored fields, one entry per ordinal.
pub fn write_stored_fields(path: &Path, segment_id: u64, docs: &[StoredFields]) -> Result<()> {
    let payload = StoredFieldsPayload {
        segment_id,
        docs: docs.to_vec(),
    };
    let body = rmp_serde::to_vec(&payload)
        .map_err(|e| IndexError::Serialization(format!("stored fields encode: {}", e)))?;

    let mut buf = Vec::with_capacity(12 + body.len());
    buf.extend_from_slice(SDOC_MAGIC);
    buf.extend_from_slice(&SDOC_VERSION.to_le_bytes());
    buf.extend_from_slice(&body);
    let crc = crc32fast::hash(&buf);
    buf.extend_from_slice(&crc.to_le_bytes());

    write_atomic(path, &buf)?;
    Ok(())
}

/// Read a segment's stored fields, verifying the checksum and segment id.
pub fn read_stored_fields(path: &Path, segment_id: u64) -> Result<Vec<StoredFields>> {
    let buf = std::fs::read(path)?;
    if buf.len() < 12 {
        return Err(IndexError::corruption(format!(
            "stored fields for segment {} too small",
            segment_id
        )));
    }
    if &buf[0..4] != SDOC_MAGIC {
        return Err(IndexError::corruption("bad stored fields magic"));
    }
    let body_end = buf.len() - 4;
    let stored = u32::from_le_bytes([
        buf[body_end],
        buf[body_end + 1],
        buf[body_end + 2],
        buf[body_end + 3],
    ]);
    if crc32fast::hash(&buf[..body_end]) != stored {
        return Err(IndexError::corruption(format!(
            "stored fields for segment {}: checksum mismatch",
            segment_id
        )));
    }
    let version = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
    if version != SDOC_VERSION {
        return Err(IndexError::corruption(format!(
            "unsupported stored fields version {}",
            version
        )));
    }
    let payload: StoredFieldsPayload = rmp_serde::from_slice(&buf[8..body_end])
        .map_err(|e| IndexError::corruption(format!("stored fields decode: {}", e)))?;
    if payload.segment_id != segment_id {
        return Err(IndexError::corruption(format!(
            "stored fields file belongs to segment {}, expected {}",
            payload.segment_id, segment_id
        )));
    }
    Ok(payload.docs)
}
