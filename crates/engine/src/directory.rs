//! Index directory layout and durable file primitives
//!
//! ```text
//! <index>/write.lock          advisory writer lock
//! <index>/CURRENT             names the committed manifest
//! <index>/manifest_<gen>      immutable commit record
//! <index>/seg_<id>.sidx       postings segment
//! <index>/seg_<id>.sdoc       stored fields for the segment
//! ```
//!
//! Every file is written with temp + fsync + rename. Published files are
//! never rewritten in place.

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use docindex_core::Result;
use tracing::{debug, warn};

/// Writer lock file name
pub const LOCK_FILE: &str = "write.lock";
/// Commit pointer file name
pub const CURRENT_FILE: &str = "CURRENT";
/// Suffix for in-progress writes
pub const TEMP_SUFFIX: &str = ".tmp";

const MANIFEST_PREFIX: &str = "manifest_";
const SEGMENT_PREFIX: &str = "seg_";
const SEGMENT_EXT: &str = ".sidx";
const STORED_EXT: &str = ".sdoc";

/// File name of a segment's postings file
pub fn segment_file_name(segment_id: u64) -> String {
    format!("{}{}{}", SEGMENT_PREFIX, segment_id, SEGMENT_EXT)
}

/// File name of a segment's stored-fields file
pub fn stored_fields_file_name(segment_id: u64) -> String {
    format!("{}{}{}", SEGMENT_PREFIX, segment_id, STORED_EXT)
}

/// File name of a generation's manifest
pub fn manifest_file_name(generation: u64) -> String {
    format!("{}{}", MANIFEST_PREFIX, generation)
}

/// Classification of a file found in the index directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexFile {
    /// `seg_<id>.sidx`
    Segment(u64),
    /// `seg_<id>.sdoc`
    StoredFields(u64),
    /// `manifest_<gen>`
    Manifest(u64),
    /// Leftover `*.tmp` from an interrupted write
    Temp,
    /// `CURRENT`
    Current,
    /// `write.lock`
    Lock,
    /// Anything the index does not own
    Foreign,
}

impl IndexFile {
    /// Classify a bare file name.
    pub fn parse(name: &str) -> IndexFile {
        if name == CURRENT_FILE {
            return IndexFile::Current;
        }
        if name == LOCK_FILE {
            return IndexFile::Lock;
        }
        if name.ends_with(TEMP_SUFFIX) {
            return IndexFile::Temp;
        }
        if let Some(rest) = name.strip_prefix(MANIFEST_PREFIX) {
            return match rest.parse() {
                Ok(generation) => IndexFile::Manifest(generation),
                Err(_) => IndexFile::Foreign,
            };
        }
        if let Some(rest) = name.strip_prefix(SEGMENT_PREFIX) {
            if let Some(id) = rest.strip_suffix(SEGMENT_EXT) {
                if let Ok(id) = id.parse() {
                    return IndexFile::Segment(id);
                }
            }
            if let Some(id) = rest.strip_suffix(STORED_EXT) {
                if let Ok(id) = id.parse() {
                    return IndexFile::StoredFields(id);
                }
            }
        }
        IndexFile::Foreign
    }

    /// Whether the sweeper may delete this file when unreferenced.
    pub fn is_sweepable(&self) -> bool {
        matches!(
            self,
            IndexFile::Segment(_)
                | IndexFile::StoredFields(_)
                | IndexFile::Manifest(_)
                | IndexFile::Temp
        )
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(TEMP_SUFFIX);
    path.with_file_name(name)
}

/// Write `bytes` to `path` atomically: temp file, fsync, rename.
///
/// The parent directory is not synced; callers that publish call
/// [`sync_dir`] once after their last rename.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let temp_path = temp_path_for(path);

    if temp_path.exists() {
        warn!(target: "docindex::directory", path = %temp_path.display(), "Removing stale temp file");
        let _ = fs::remove_file(&temp_path);
    }

    let result = (|| {
        let mut file = File::create(&temp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&temp_path, path)
    })();

    match result {
        Ok(()) => {
            debug!(target: "docindex::directory", path = %path.display(), bytes = bytes.len(), "Atomic write completed");
            Ok(())
        }
        Err(e) => {
            warn!(
                target: "docindex::directory",
                temp_path = %temp_path.display(),
                error = %e,
                "Atomic write failed, cleaning up temp file"
            );
            let _ = fs::remove_file(&temp_path);
            Err(e)
        }
    }
}

/// Flush directory entries (renames, unlinks) to stable storage.
#[cfg(unix)]
pub fn sync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

/// Flush directory entries (renames, unlinks) to stable storage.
#[cfg(not(unix))]
pub fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

/// Handle on an index location.
#[derive(Debug, Clone)]
pub struct IndexDirectory {
    root: PathBuf,
}

impl IndexDirectory {
    /// Open (creating if needed) an index directory.
    pub fn create(root: &Path) -> Result<Self> {
        fs::create_dir_all(root)?;
        Ok(IndexDirectory {
            root: root.to_path_buf(),
        })
    }

    /// Wrap an existing location without touching the filesystem.
    pub fn existing(root: &Path) -> Self {
        IndexDirectory {
            root: root.to_path_buf(),
        }
    }

    /// Index root
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Path of a segment's postings file
    pub fn segment_path(&self, segment_id: u64) -> PathBuf {
        self.root.join(segment_file_name(segment_id))
    }

    /// Path of a segment's stored-fields file
    pub fn stored_fields_path(&self, segment_id: u64) -> PathBuf {
        self.root.join(stored_fields_file_name(segment_id))
    }

    /// Path of a generation's manifest
    pub fn manifest_path(&self, generation: u64) -> PathBuf {
        self.root.join(manifest_file_name(generation))
    }

    /// Path of the commit pointer
    pub fn current_path(&self) -> PathBuf {
        self.root.join(CURRENT_FILE)
    }

    /// Path of the writer lock
    pub fn lock_path(&self) -> PathBuf {
        self.root.join(LOCK_FILE)
    }

    /// List and classify every entry in the directory.
    pub fn list(&self) -> Result<Vec<(String, IndexFile)>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                files.push((name.to_string(), IndexFile::parse(name)));
            }
        }
        files.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(files)
    }

    /// Highest segment id present on disk, published or not.
    pub fn max_segment_id(&self) -> Result<Option<u64>> {
        Ok(self
            .list()?
            .into_iter()
            .filter_map(|(_, file)| match file {
                IndexFile::Segment(id) | IndexFile::StoredFields(id) => Some(id),
                _ => None,
            })
            .max())
    }

    /// Highest manifest generation present on disk.
    pub fn max_generation(&self) -> Result<Option<u64>> {
        Ok(self
            .list()?
            .into_iter()
            .filter_map(|(_, file)| match file {
                IndexFile::Manifest(generation) => Some(generation),
                _ => None,
            })
            .max())
    }

    /// Delete index-owned files whose names are not in `keep`.
    ///
    /// Foreign files, `CURRENT`, and the lock are never touched. Failures
    /// are logged and skipped; returns the number of files removed.
    pub fn sweep(&self, keep: &BTreeSet<String>) -> Result<usize> {
        let mut removed = 0;
        for (name, file) in self.list()? {
            if !file.is_sweepable() || keep.contains(&name) {
                continue;
            }
            let path = self.root.join(&name);
            match fs::remove_file(&path) {
                Ok(()) => {
                    debug!(target: "docindex::directory", file = %name, "Removed unreferenced file");
                    removed += 1;
                }
                Err(e) => {
                    warn!(
                        target: "docindex::directory",
                        file = %name,
                        error = %e,
                        "Failed to remove unreferenced file"
                    );
                }
            }
        }
        if removed > 0 {
            sync_dir(&self.root)?;
        }
        Ok(removed)
    }
}
