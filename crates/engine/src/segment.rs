//! Immutable segment file format (.sidx)
//!
//! A segment is the unit of publication: once written it is never modified.
//! Deletions against it are recorded as tombstones in the manifest.
//!
//! ## File Format
//!
//! ```text
//! HEADER (56 bytes):
//!   magic "DIDX"            4B
//!   version                 u32 LE
//!   segment_id              u64 LE
//!   doc_count               u32 LE
//!   term_count              u32 LE
//!   docs_offset             u64 LE    → byte offset of document table
//!   term_dict_offset        u64 LE    → byte offset of term dictionary
//!   term_offsets_offset     u64 LE    → byte offset of term offset table
//!   postings_offset         u64 LE    → byte offset of postings section
//!
//! DOCUMENT TABLE (doc_count entries, sorted by key; index = ordinal):
//!   key_len                 varint
//!   key_bytes               [u8; key_len]
//!
//! TERM DICTIONARY (sorted by term):
//!   term_len                u16 LE
//!   term_bytes              [u8; term_len]
//!   df                      u32 LE
//!   posting_offset          u32 LE    → relative to postings section start
//!   posting_byte_len        u32 LE
//!
//! TERM OFFSET TABLE (term_count × 4 bytes):
//!   offset                  u32 LE    → relative to term dictionary start
//!
//! POSTINGS SECTION:
//!   per term:
//!     num_entries           u32 LE
//!     per entry: delta_ordinal varint, freq varint,
//!                freq × delta_position varint
//!
//! TRAILER:
//!   crc32                   u32 LE    → over every preceding byte
//! ```

use std::path::Path;

use docindex_core::{DocId, IndexError, Result};

use crate::directory::write_atomic;
use crate::postings::{FlushedPostings, PostingEntry};

/// Magic bytes for .sidx files
const SIDX_MAGIC: &[u8; 4] = b"DIDX";
/// Current format version
const SIDX_VERSION: u32 = 1;
/// Header size in bytes
const HEADER_SIZE: usize = 56;
/// CRC trailer size in bytes
const TRAILER_SIZE: usize = 4;
/// Fixed bytes following a term in its dictionary entry
const DICT_ENTRY_TAIL: usize = 12;

// ============================================================================
// Varint (LEB128) Codec
// ============================================================================

/// Encode a u32 as a variable-length integer (LEB128).
pub(crate) fn encode_varint(mut value: u32, buf: &mut Vec<u8>) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if value == 0 {
            break;
        }
    }
}

/// Decode a varint from a byte slice, returning (value, bytes_consumed).
pub(crate) fn decode_varint(data: &[u8]) -> Option<(u32, usize)> {
    let mut value: u32 = 0;
    let mut shift = 0;
    for (i, &byte) in data.iter().enumerate() {
        value |= ((byte & 0x7F) as u32) << shift;
        if byte & 0x80 == 0 {
            return Some((value, i + 1));
        }
        shift += 7;
        if shift >= 35 {
            return None; // overflow
        }
    }
    None // truncated
}

fn read_u16(bytes: &[u8], pos: usize) -> Option<u16> {
    let raw = bytes.get(pos..pos.checked_add(2)?)?;
    Some(u16::from_le_bytes(raw.try_into().ok()?))
}

fn read_u32(bytes: &[u8], pos: usize) -> Option<u32> {
    let raw = bytes.get(pos..pos.checked_add(4)?)?;
    Some(u32::from_le_bytes(raw.try_into().ok()?))
}

fn read_u64(bytes: &[u8], pos: usize) -> Option<u64> {
    let raw = bytes.get(pos..pos.checked_add(8)?)?;
    Some(u64::from_le_bytes(raw.try_into().ok()?))
}

fn corrupt(segment_id: u64, what: &str) -> IndexError {
    IndexError::corruption(format!("segment {}: {}", segment_id, what))
}

// ============================================================================
// SegmentData
// ============================================================================

/// Underlying storage for a segment.
enum SegmentData {
    /// In-memory owned data (freshly built)
    Owned(Vec<u8>),
    /// Memory-mapped file data
    Mmap(memmap2::Mmap),
}

impl SegmentData {
    fn as_bytes(&self) -> &[u8] {
        match self {
            SegmentData::Owned(v) => v,
            SegmentData::Mmap(m) => m,
        }
    }
}

impl std::fmt::Debug for SegmentData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SegmentData::Owned(v) => write!(f, "Owned({} bytes)", v.len()),
            SegmentData::Mmap(m) => write!(f, "Mmap({} bytes)", m.len()),
        }
    }
}

// ============================================================================
// Segment
// ============================================================================

/// An immutable, searchable segment of the index.
///
/// Holds a sorted document table, a sorted term dictionary, and
/// delta-encoded posting lists with positions. Backed by either owned
/// memory or an mmap'd file. Tombstones live in the manifest, not here.
#[derive(Debug)]
pub struct Segment {
    data: SegmentData,
    segment_id: u64,
    term_count: u32,
    term_dict_offset: usize,
    term_offsets_offset: usize,
    postings_offset: usize,
    postings_end: usize,
    /// Decoded document table; index is the ordinal
    docs: Vec<DocId>,
}

impl Segment {
    /// Parse and verify a segment from raw bytes.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Self::load(SegmentData::Owned(data), true)
    }

    /// Open a segment file via mmap, verifying its checksum.
    pub fn open(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let len = file.metadata()?.len() as usize;
        if len < HEADER_SIZE + TRAILER_SIZE {
            return Err(IndexError::corruption(format!(
                "segment file '{}' too small ({} bytes)",
                path.display(),
                len
            )));
        }
        // SAFETY: segment files are write-once; nothing modifies a published file.
        let mmap = unsafe { memmap2::Mmap::map(&file)? };
        Self::load(SegmentData::Mmap(mmap), true)
    }

    fn load(data: SegmentData, verify: bool) -> Result<Self> {
        let bytes = data.as_bytes();
        if bytes.len() < HEADER_SIZE + TRAILER_SIZE {
            return Err(IndexError::corruption("segment too small"));
        }
        if &bytes[0..4] != SIDX_MAGIC {
            return Err(IndexError::corruption("bad segment magic"));
        }
        let version = read_u32(bytes, 4).unwrap_or(0);
        if version != SIDX_VERSION {
            return Err(IndexError::corruption(format!(
                "unsupported segment version {}",
                version
            )));
        }
        let header = |pos| read_u64(bytes, pos).unwrap_or(u64::MAX);
        let segment_id = header(8);

        let body_end = bytes.len() - TRAILER_SIZE;
        if verify {
            let stored = read_u32(bytes, body_end).unwrap_or(0);
            let actual = crc32fast::hash(&bytes[..body_end]);
            if stored != actual {
                return Err(corrupt(segment_id, "checksum mismatch"));
            }
        }

        let doc_count = read_u32(bytes, 16).unwrap_or(0);
        let term_count = read_u32(bytes, 20).unwrap_or(0);
        let docs_offset = header(24) as usize;
        let term_dict_offset = header(32) as usize;
        let term_offsets_offset = header(40) as usize;
        let postings_offset = header(48) as usize;

        let ordered = docs_offset == HEADER_SIZE
            && docs_offset <= term_dict_offset
            && term_dict_offset <= term_offsets_offset
            && term_offsets_offset <= postings_offset
            && postings_offset <= body_end;
        if !ordered {
            return Err(corrupt(segment_id, "section offsets out of bounds"));
        }
        let offsets_len = term_count as usize * 4;
        if term_offsets_offset + offsets_len != postings_offset {
            return Err(corrupt(segment_id, "term offset table size mismatch"));
        }

        let docs = decode_doc_table(&bytes[docs_offset..term_dict_offset], doc_count)
            .ok_or_else(|| corrupt(segment_id, "malformed document table"))?;

        Ok(Segment {
            data,
            segment_id,
            term_count,
            term_dict_offset,
            term_offsets_offset,
            postings_offset,
            postings_end: body_end,
            docs,
        })
    }

    /// Segment ID
    pub fn segment_id(&self) -> u64 {
        self.segment_id
    }

    /// Number of documents in this segment (including tombstoned)
    pub fn doc_count(&self) -> u32 {
        self.docs.len() as u32
    }

    /// Number of distinct terms
    pub fn term_count(&self) -> u32 {
        self.term_count
    }

    /// Size of the encoded segment in bytes
    pub fn byte_len(&self) -> usize {
        self.data.as_bytes().len()
    }

    /// Document keys in ordinal order (sorted)
    pub fn docs(&self) -> &[DocId] {
        &self.docs
    }

    /// Key for an ordinal
    pub fn doc_id(&self, ordinal: u32) -> Option<&DocId> {
        self.docs.get(ordinal as usize)
    }

    /// Ordinal for a key
    pub fn ordinal(&self, doc_id: &DocId) -> Option<u32> {
        self.docs.binary_search(doc_id).ok().map(|i| i as u32)
    }

    // ========================================================================
    // Term Dictionary Access
    // ========================================================================

    /// Get document frequency for a term in this segment.
    ///
    /// Counts tombstoned documents too.
    pub fn doc_freq(&self, term: &str) -> u32 {
        match self.find_term(term) {
            Some(info) => info.df,
            None => 0,
        }
    }

    /// Decode posting entries for a term.
    ///
    /// Does NOT filter tombstones; the caller must check.
    pub fn posting_entries(&self, term: &str) -> Option<Vec<PostingEntry>> {
        Some(self.posting_iter(term)?.collect())
    }

    /// Lazy iterator over posting entries for a term.
    ///
    /// Does NOT filter tombstones; the caller must check.
    pub fn posting_iter(&self, term: &str) -> Option<PostingIter<'_>> {
        let info = self.find_term(term)?;
        self.posting_iter_at(&info)
    }

    /// Terms in sorted order
    pub fn terms(&self) -> TermIter<'_> {
        TermIter {
            segment: self,
            index: 0,
        }
    }

    /// Verify every term entry and posting list decodes within bounds.
    ///
    /// `load` only checks the header, the document table, and the checksum;
    /// this walks the whole dictionary.
    pub fn validate(&self) -> Result<()> {
        let mut prev: Option<&str> = None;
        for index in 0..self.term_count as usize {
            let info = self
                .term_at(index)
                .ok_or_else(|| corrupt(self.segment_id, "malformed term dictionary"))?;
            if let Some(prev) = prev {
                if prev >= info.term {
                    return Err(corrupt(self.segment_id, "term dictionary not sorted"));
                }
            }
            let mut iter = self
                .posting_iter_at(&info)
                .ok_or_else(|| corrupt(self.segment_id, "posting list out of bounds"))?;
            let mut count = 0u32;
            for entry in iter.by_ref() {
                if entry.doc >= self.doc_count() {
                    return Err(corrupt(self.segment_id, "posting ordinal out of range"));
                }
                count += 1;
            }
            if iter.failed || count != info.df {
                return Err(corrupt(self.segment_id, "posting list truncated"));
            }
            prev = Some(info.term);
        }
        Ok(())
    }

    fn posting_iter_at(&self, info: &TermInfo<'_>) -> Option<PostingIter<'_>> {
        let bytes = self.data.as_bytes();
        let start = self.postings_offset.checked_add(info.posting_offset as usize)?;
        let end = start.checked_add(info.posting_len as usize)?;
        if end > self.postings_end {
            return None;
        }
        let posting_bytes = &bytes[start..end];
        let num_entries = read_u32(posting_bytes, 0)?;
        Some(PostingIter {
            data: posting_bytes,
            pos: 4,
            remaining: num_entries,
            prev_doc: 0,
            failed: false,
        })
    }

    /// Read the dictionary entry at a sorted index.
    fn term_at(&self, index: usize) -> Option<TermInfo<'_>> {
        let bytes = self.data.as_bytes();
        if index >= self.term_count as usize {
            return None;
        }
        let dict_offset = read_u32(bytes, self.term_offsets_offset + index * 4)? as usize;
        let abs_pos = self.term_dict_offset.checked_add(dict_offset)?;
        if abs_pos >= self.term_offsets_offset {
            return None;
        }
        let term_len = read_u16(bytes, abs_pos)? as usize;
        let term_start = abs_pos + 2;
        let term_end = term_start + term_len;
        if term_end + DICT_ENTRY_TAIL > self.term_offsets_offset {
            return None;
        }
        let term = std::str::from_utf8(&bytes[term_start..term_end]).ok()?;
        Some(TermInfo {
            term,
            df: read_u32(bytes, term_end)?,
            posting_offset: read_u32(bytes, term_end + 4)?,
            posting_len: read_u32(bytes, term_end + 8)?,
        })
    }

    /// Binary search the term dictionary for a term.
    fn find_term(&self, term: &str) -> Option<TermInfo<'_>> {
        let mut lo = 0usize;
        let mut hi = self.term_count as usize;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let info = self.term_at(mid)?;
            match info.term.cmp(term) {
                std::cmp::Ordering::Equal => return Some(info),
                std::cmp::Ordering::Less => lo = mid + 1,
                std::cmp::Ordering::Greater => hi = mid,
            }
        }
        None
    }

    /// Write this segment's bytes to a file (atomic temp+rename, fsynced).
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        write_atomic(path, self.data.as_bytes())?;
        Ok(())
    }
}

/// Decoded term dictionary entry.
struct TermInfo<'a> {
    term: &'a str,
    df: u32,
    posting_offset: u32,
    posting_len: u32,
}

fn decode_doc_table(data: &[u8], doc_count: u32) -> Option<Vec<DocId>> {
    let mut docs = Vec::with_capacity(doc_count as usize);
    let mut pos = 0usize;
    for _ in 0..doc_count {
        let (len, n) = decode_varint(data.get(pos..)?)?;
        pos += n;
        let end = pos.checked_add(len as usize)?;
        let key = std::str::from_utf8(data.get(pos..end)?).ok()?;
        docs.push(DocId::new(key));
        pos = end;
    }
    if pos != data.len() {
        return None;
    }
    Some(docs)
}

// ============================================================================
// Iterators
// ============================================================================

/// Sorted iterator over a segment's terms.
pub struct TermIter<'a> {
    segment: &'a Segment,
    index: usize,
}

impl<'a> Iterator for TermIter<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let info = self.segment.term_at(self.index)?;
        self.index += 1;
        Some(info.term)
    }
}

/// Iterator that lazily decodes delta-encoded posting entries from segment data.
pub struct PostingIter<'a> {
    data: &'a [u8],
    pos: usize,
    remaining: u32,
    prev_doc: u32,
    failed: bool,
}

impl<'a> PostingIter<'a> {
    fn read_varint(&mut self) -> Option<u32> {
        let (value, n) = decode_varint(self.data.get(self.pos..)?)?;
        self.pos += n;
        Some(value)
    }

    fn decode_entry(&mut self) -> Option<PostingEntry> {
        let doc = self.prev_doc.checked_add(self.read_varint()?)?;
        let freq = self.read_varint()?;
        let mut positions = Vec::with_capacity(freq.min(1024) as usize);
        let mut prev = 0u32;
        for i in 0..freq {
            let d = self.read_varint()?;
            let position = if i == 0 { d } else { prev.checked_add(d)? };
            positions.push(position);
            prev = position;
        }
        self.prev_doc = doc;
        Some(PostingEntry::new(doc, positions))
    }
}

impl<'a> Iterator for PostingIter<'a> {
    type Item = PostingEntry;

    fn next(&mut self) -> Option<PostingEntry> {
        if self.remaining == 0 || self.failed {
            return None;
        }
        self.remaining -= 1;
        let entry = self.decode_entry();
        if entry.is_none() {
            self.failed = true;
        }
        entry
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let r = self.remaining as usize;
        (0, Some(r))
    }
}

// ============================================================================
// Segment Builder
// ============================================================================

/// Build a segment from a flushed buffer image.
///
/// `image.docs` must be sorted and every posting list sorted by ordinal,
/// which `PostingsBuffer::snapshot` guarantees.
pub fn build_segment(segment_id: u64, image: &FlushedPostings) -> Result<Segment> {
    let too_large = |what: &str| {
        IndexError::InvalidOperation(format!("segment {}: {} too large", segment_id, what))
    };

    let mut docs_buf: Vec<u8> = Vec::new();
    for doc in &image.docs {
        let key = doc.as_str().as_bytes();
        let key_len = u32::try_from(key.len()).map_err(|_| too_large("document key"))?;
        encode_varint(key_len, &mut docs_buf);
        docs_buf.extend_from_slice(key);
    }

    let mut dict_buf: Vec<u8> = Vec::new();
    let mut postings_buf: Vec<u8> = Vec::new();
    let mut term_offsets: Vec<u32> = Vec::with_capacity(image.terms.len());

    for (term, entries) in &image.terms {
        let term_offset =
            u32::try_from(dict_buf.len()).map_err(|_| too_large("term dictionary"))?;
        term_offsets.push(term_offset);

        let posting_offset =
            u32::try_from(postings_buf.len()).map_err(|_| too_large("postings section"))?;
        encode_posting_list(entries, &mut postings_buf);
        let posting_byte_len = u32::try_from(postings_buf.len())
            .map_err(|_| too_large("postings section"))?
            - posting_offset;

        let term_bytes = term.as_bytes();
        let term_len = u16::try_from(term_bytes.len()).map_err(|_| too_large("term"))?;
        dict_buf.extend_from_slice(&term_len.to_le_bytes());
        dict_buf.extend_from_slice(term_bytes);
        dict_buf.extend_from_slice(&(entries.len() as u32).to_le_bytes());
        dict_buf.extend_from_slice(&posting_offset.to_le_bytes());
        dict_buf.extend_from_slice(&posting_byte_len.to_le_bytes());
    }

    let docs_offset = HEADER_SIZE as u64;
    let term_dict_offset = docs_offset + docs_buf.len() as u64;
    let term_offsets_offset = term_dict_offset + dict_buf.len() as u64;
    let postings_offset = term_offsets_offset + (term_offsets.len() * 4) as u64;
    let total_size = postings_offset as usize + postings_buf.len() + TRAILER_SIZE;

    let mut buf = Vec::with_capacity(total_size);

    // Header (56 bytes)
    buf.extend_from_slice(SIDX_MAGIC);
    buf.extend_from_slice(&SIDX_VERSION.to_le_bytes());
    buf.extend_from_slice(&segment_id.to_le_bytes());
    buf.extend_from_slice(&(image.docs.len() as u32).to_le_bytes());
    buf.extend_from_slice(&(image.terms.len() as u32).to_le_bytes());
    buf.extend_from_slice(&docs_offset.to_le_bytes());
    buf.extend_from_slice(&term_dict_offset.to_le_bytes());
    buf.extend_from_slice(&term_offsets_offset.to_le_bytes());
    buf.extend_from_slice(&postings_offset.to_le_bytes());
    debug_assert_eq!(buf.len(), HEADER_SIZE);

    buf.extend_from_slice(&docs_buf);
    buf.extend_from_slice(&dict_buf);
    for offset in &term_offsets {
        buf.extend_from_slice(&offset.to_le_bytes());
    }
    buf.extend_from_slice(&postings_buf);

    let crc = crc32fast::hash(&buf);
    buf.extend_from_slice(&crc.to_le_bytes());
    debug_assert_eq!(buf.len(), total_size);

    Segment::load(SegmentData::Owned(buf), false)
}

/// Encode a posting list: count, then per entry delta ordinal, frequency,
/// and delta positions.
fn encode_posting_list(entries: &[PostingEntry], buf: &mut Vec<u8>) {
    buf.extend_from_slice(&(entries.len() as u32).to_le_bytes());
    let mut prev_doc: u32 = 0;
    for entry in entries {
        encode_varint(entry.doc - prev_doc, buf);
        encode_varint(entry.frequency(), buf);
        let mut prev_pos = 0u32;
        for &position in &entry.positions {
            encode_varint(position - prev_pos, buf);
            prev_pos = position;
        }
        prev_doc = entry.doc;
    }
}

// ============================================================================
// Tests
// ============================================================================
