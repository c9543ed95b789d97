//! # File Records
//!
//! Uniform view of a file for reconciliation, whether it was found on disk or
//! recorded in the metadata database as an uploaded archive.
//!
//! ## Identity
//!
//! Two records are equal when their paths are equal, regardless of variant or
//! timestamp. This is what pairs a local file with its remote counterpart.
//! Ordering and hashing follow the same rule; use
//! [`is_newer_than`](FileRecord::is_newer_than) for timestamp comparisons.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Anything that carries a modification time in Unix seconds
pub trait Timestamped {
    fn last_modified(&self) -> i64;
}

impl Timestamped for i64 {
    fn last_modified(&self) -> i64 {
        *self
    }
}

/// A file found by enumerating a local root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFileRecord {
    pub path: String,
    /// Modification time observed at enumeration
    pub last_modified: i64,
}

/// An archive entry stored in the metadata database
///
/// Serializes to the `files` entries of the persisted document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFileRecord {
    pub path: String,
    /// Modification time of the local file when it was uploaded
    pub last_modified: i64,
    /// When the upload finished
    pub uploaded_at: i64,
    /// Permanent archive id in the remote store
    pub uuid: String,
}

/// A file on either side of a sync, identified by its path
///
/// Equality, hashing and `Ord` all use the path alone, so sorting yields path
/// order. Use [`is_newer_than`](FileRecord::is_newer_than) to compare
/// modification times.
#[derive(Debug, Clone)]
pub enum FileRecord {
    Local(LocalFileRecord),
    Remote(RemoteFileRecord),
}

impl FileRecord {
    pub fn local(path: impl Into<String>, last_modified: i64) -> Self {
        FileRecord::Local(LocalFileRecord {
            path: path.into(),
            last_modified,
        })
    }

    pub fn path(&self) -> &str {
        match self {
            FileRecord::Local(record) => &record.path,
            FileRecord::Remote(record) => &record.path,
        }
    }

    pub fn last_modified(&self) -> i64 {
        match self {
            FileRecord::Local(record) => record.last_modified,
            FileRecord::Remote(record) => record.last_modified,
        }
    }

    /// Archive id for remote records
    pub fn archive_id(&self) -> Option<&str> {
        match self {
            FileRecord::Local(_) => None,
            FileRecord::Remote(record) => Some(&record.uuid),
        }
    }

    pub fn as_remote(&self) -> Option<&RemoteFileRecord> {
        match self {
            FileRecord::Remote(record) => Some(record),
            FileRecord::Local(_) => None,
        }
    }

    /// Strictly newer modification time than `other`
    pub fn is_newer_than(&self, other: &FileRecord) -> bool {
        self.last_modified() > other.last_modified()
    }
}

impl From<RemoteFileRecord> for FileRecord {
    fn from(record: RemoteFileRecord) -> Self {
        FileRecord::Remote(record)
    }
}

impl From<LocalFileRecord> for FileRecord {
    fn from(record: LocalFileRecord) -> Self {
        FileRecord::Local(record)
    }
}

impl From<bridge_traits::LocalFileEntry> for FileRecord {
    fn from(entry: bridge_traits::LocalFileEntry) -> Self {
        FileRecord::local(entry.path, entry.last_modified)
    }
}

impl Timestamped for FileRecord {
    fn last_modified(&self) -> i64 {
        FileRecord::last_modified(self)
    }
}

impl PartialEq for FileRecord {
    fn eq(&self, other: &Self) -> bool {
        self.path() == other.path()
    }
}

impl Eq for FileRecord {}

impl Hash for FileRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path().hash(state);
    }
}

impl PartialOrd for FileRecord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FileRecord {
    fn cmp(&self, other: &Self) -> Ordering {
        self.path().cmp(other.path())
    }
}

impl fmt::Display for FileRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileRecord::Local(record) => write!(f, "local://{}", record.path),
            FileRecord::Remote(record) => write!(f, "cloud://{}", record.uuid),
        }
    }
}
