//! The working-tree index: a sorted table of path → (stat, mode, blob id)
//! records with the git index v2 on-disk encoding.
//!
//! The repository layer reads and writes per-path entries here and calls
//! [`Index::commit`] to fold the table into tree objects.

mod codec;
mod tree_builder;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use bstr::{BStr, BString};
use rgit_hash::ObjectId;
use rgit_object::FileMode;
use rgit_odb::{ObjectStore, OdbError};

/// Errors from index operations.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("invalid index header: {0}")]
    InvalidHeader(String),

    #[error("unsupported index version: {0}")]
    UnsupportedVersion(u32),

    #[error("corrupt index entry at offset {offset}: {reason}")]
    InvalidEntry { offset: usize, reason: String },

    #[error("index checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("unable to lock index at {path}")]
    LockFailed { path: PathBuf },

    #[error(transparent)]
    Odb(#[from] OdbError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// File system stat data cached per entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatData {
    pub ctime_secs: u32,
    pub ctime_nsecs: u32,
    pub mtime_secs: u32,
    pub mtime_nsecs: u32,
    pub dev: u32,
    pub ino: u32,
    pub uid: u32,
    pub gid: u32,
    pub size: u32,
}

impl StatData {
    /// Capture from file system metadata.
    #[cfg(unix)]
    pub fn from_metadata(meta: &std::fs::Metadata) -> Self {
        use std::os::unix::fs::MetadataExt;
        Self {
            ctime_secs: meta.ctime() as u32,
            ctime_nsecs: meta.ctime_nsec() as u32,
            mtime_secs: meta.mtime() as u32,
            mtime_nsecs: meta.mtime_nsec() as u32,
            dev: meta.dev() as u32,
            ino: meta.ino() as u32,
            uid: meta.uid(),
            gid: meta.gid(),
            size: meta.len() as u32,
        }
    }

    /// Capture from file system metadata (non-Unix fallback).
    #[cfg(not(unix))]
    pub fn from_metadata(meta: &std::fs::Metadata) -> Self {
        use std::time::UNIX_EPOCH;
        let mtime = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .unwrap_or_default();
        Self {
            ctime_secs: mtime.as_secs() as u32,
            ctime_nsecs: mtime.subsec_nanos(),
            mtime_secs: mtime.as_secs() as u32,
            mtime_nsecs: mtime.subsec_nanos(),
            dev: 0,
            ino: 0,
            uid: 0,
            gid: 0,
            size: meta.len() as u32,
        }
    }
}

/// A single index record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// Path relative to the repository root.
    pub path: BString,
    /// Blob id.
    pub oid: ObjectId,
    /// File mode.
    pub mode: FileMode,
    /// Cached stat data.
    pub stat: StatData,
}

/// The index: entries keyed by path, bound to an on-disk file.
#[derive(Debug)]
pub struct Index {
    path: PathBuf,
    entries: BTreeMap<BString, IndexEntry>,
}

impl Index {
    /// Open the index at `path`, reading it when present.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, IndexError> {
        let path = path.as_ref().to_path_buf();
        let entries = match std::fs::read(&path) {
            Ok(data) => codec::parse_index(&data)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(IndexError::Io(e)),
        };
        Ok(Self { path, entries })
    }

    /// The backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Look up an entry by path.
    pub fn get(&self, path: &[u8]) -> Option<&IndexEntry> {
        self.entries.get(BStr::new(path))
    }

    /// Insert or replace an entry.
    pub fn insert(&mut self, entry: IndexEntry) {
        self.entries.insert(entry.path.clone(), entry);
    }

    /// Remove an entry. Returns true when it existed.
    pub fn remove(&mut self, path: &[u8]) -> bool {
        self.entries.remove(BStr::new(path)).is_some()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in path order.
    pub fn iter(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.values()
    }

    /// Write the index back to its file (locked, atomic replace).
    pub fn write(&self) -> Result<(), IndexError> {
        codec::write_index(self)
    }

    /// Finalize the index into tree objects, bottom-up. All referenced
    /// blobs must already be present in `store`. Returns the root tree id.
    pub fn commit<S: ObjectStore>(&self, store: &S) -> Result<ObjectId, IndexError> {
        tree_builder::build_trees(store, self)
    }
}
