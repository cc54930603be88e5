//! Commit manifests and the `CURRENT` pointer
//!
//! Each commit writes an immutable `manifest_<gen>` holding:
//! - Segment list (segment_id, doc_count)
//! - Per-segment tombstone sets (deleted ordinals)
//! - Next segment id and live document count
//!
//! and then swaps `CURRENT` to name it. The swap is the single linearization
//! point of a commit: a reader sees either the old generation or the new one.
//!
//! Manifest layout: magic "DMNF", version u32 LE, MessagePack payload,
//! CRC32 u32 LE over everything before it. `CURRENT` holds the manifest
//! file name and its CRC32 in hex, one per line.

use std::collections::BTreeSet;
use std::time::{SystemTime, UNIX_EPOCH};

use docindex_core::{IndexError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::directory::{
    manifest_file_name, segment_file_name, stored_fields_file_name, sync_dir, write_atomic,
    IndexDirectory,
};

/// Magic bytes for manifests
const MANIFEST_MAGIC: &[u8; 4] = b"DMNF";
/// Current manifest version
pub(crate) const MANIFEST_VERSION: u32 = 1;

// ============================================================================
// Manifest Data (serializable)
// ============================================================================

/// Serializable representation of one committed generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestData {
    /// Format version
    pub version: u32,
    /// Commit generation
    pub generation: u64,
    /// Next segment ID to assign
    pub next_segment_id: u64,
    /// Segments, oldest first
    pub segments: Vec<SegmentManifestEntry>,
    /// Live documents across all segments
    pub live_docs: u64,
    /// Commit time, milliseconds since the Unix epoch
    #[serde(default)]
    pub committed_at_ms: u64,
}

/// Manifest entry for a single segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentManifestEntry {
    /// Unique segment identifier
    pub segment_id: u64,
    /// Number of documents in this segment
    pub doc_count: u32,
    /// Deleted ordinals
    pub tombstones: BTreeSet<u32>,
}

impl SegmentManifestEntry {
    /// Documents not masked by a tombstone
    pub fn live_count(&self) -> u32 {
        self.doc_count.saturating_sub(self.tombstones.len() as u32)
    }
}

impl ManifestData {
    /// Manifest for a generation with the given segments.
    pub fn new(
        generation: u64,
        next_segment_id: u64,
        segments: Vec<SegmentManifestEntry>,
        live_docs: u64,
    ) -> Self {
        let committed_at_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        ManifestData {
            version: MANIFEST_VERSION,
            generation,
            next_segment_id,
            segments,
            live_docs,
            committed_at_ms,
        }
    }

    /// Names of every file this generation needs, including itself.
    pub fn referenced_files(&self) -> BTreeSet<String> {
        let mut files = BTreeSet::new();
        files.insert(manifest_file_name(self.generation));
        for seg in &self.segments {
            files.insert(segment_file_name(seg.segment_id));
            files.insert(stored_fields_file_name(seg.segment_id));
        }
        files
    }
}

// ============================================================================
// Encode / Decode
// ============================================================================

fn encode_manifest(data: &ManifestData) -> Result<Vec<u8>> {
    let payload = rmp_serde::to_vec(data)
        .map_err(|e| IndexError::Serialization(format!("manifest encode: {}", e)))?;

    let mut buf = Vec::with_capacity(12 + payload.len());
    buf.extend_from_slice(MANIFEST_MAGIC);
    buf.extend_from_slice(&MANIFEST_VERSION.to_le_bytes());
    buf.extend_from_slice(&payload);
    let crc = crc32fast::hash(&buf);
    buf.extend_from_slice(&crc.to_le_bytes());
    Ok(buf)
}

fn decode_manifest(buf: &[u8]) -> Result<ManifestData> {
    if buf.len() < 12 {
        return Err(IndexError::corruption("manifest too small"));
    }
    if &buf[0..4] != MANIFEST_MAGIC {
        return Err(IndexError::corruption("bad manifest magic"));
    }
    let body_end = buf.len() - 4;
    let stored = u32::from_le_bytes([
        buf[body_end],
        buf[body_end + 1],
        buf[body_end + 2],
        buf[body_end + 3],
    ]);
    if crc32fast::hash(&buf[..body_end]) != stored {
        return Err(IndexError::corruption("manifest checksum mismatch"));
    }
    let version = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
    if version != MANIFEST_VERSION {
        return Err(IndexError::corruption(format!(
            "unsupported manifest version {}",
            version
        )));
    }
    rmp_serde::from_slice(&buf[8..body_end])
        .map_err(|e| IndexError::corruption(format!("manifest decode: {}", e)))
}

// ============================================================================
// Read / Write
// ============================================================================

/// Write `manifest_<gen>` durably. Does not publish it.
pub fn write_manifest(dir: &IndexDirectory, data: &ManifestData) -> Result<()> {
    let buf = encode_manifest(data)?;
    write_atomic(&dir.manifest_path(data.generation), &buf)?;
    sync_dir(dir.path())?;
    debug!(
        target: "docindex::manifest",
        generation = data.generation,
        segments = data.segments.len(),
        "Wrote manifest"
    );
    Ok(())
}

/// Load a manifest by generation.
pub fn load_manifest(dir: &IndexDirectory, generation: u64) -> Result<ManifestData> {
    let buf = std::fs::read(dir.manifest_path(generation))?;
    let data = decode_manifest(&buf)?;
    if data.generation != generation {
        return Err(IndexError::corruption(format!(
            "manifest_{} records generation {}",
            generation, data.generation
        )));
    }
    Ok(data)
}

fn current_content(generation: u64) -> String {
    let name = manifest_file_name(generation);
    let crc = crc32fast::hash(name.as_bytes());
    format!("{}\n{:08x}\n", name, crc)
}

/// Atomically point `CURRENT` at a generation and sync the directory.
///
/// This is the commit point.
pub fn publish_current(dir: &IndexDirectory, generation: u64) -> std::io::Result<()> {
    write_atomic(&dir.current_path(), current_content(generation).as_bytes())?;
    sync_dir(dir.path())
}

/// Generation named by `CURRENT`, or `None` if the index has never committed.
pub fn read_current(dir: &IndexDirectory) -> Result<Option<u64>> {
    let content = match std::fs::read_to_string(dir.current_path()) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let mut lines = content.lines();
    let name = lines.next().unwrap_or("").trim();
    let crc = lines.next().unwrap_or("").trim();
    let expected = format!("{:08x}", crc32fast::hash(name.as_bytes()));
    if crc != expected {
        return Err(IndexError::corruption("CURRENT checksum mismatch"));
    }
    name.strip_prefix("manifest_")
        .and_then(|g| g.parse().ok())
        .map(Some)
        .ok_or_else(|| IndexError::corruption(format!("CURRENT names '{}'", name)))
}

/// Load the committed manifest, if any.
pub fn load_current(dir: &IndexDirectory) -> Result<Option<ManifestData>> {
    match read_current(dir)? {
        Some(generation) => load_manifest(dir, generation).map(Some),
        None => Ok(None),
    }
}

// ============================================================================
// Tests
// ============================================================================
