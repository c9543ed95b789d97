//! Local File System Abstractions
//!
//! Provides the platform-agnostic view of the directories being archived:
//! a restartable enumeration of regular files with their modification times.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// A regular file discovered under one of the configured roots
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFileEntry {
    /// Full path of the file (root joined with the entry name)
    pub path: String,
    /// Modification time in Unix seconds
    pub last_modified: i64,
}

impl LocalFileEntry {
    pub fn new(path: impl Into<String>, last_modified: i64) -> Self {
        Self {
            path: path.into(),
            last_modified,
        }
    }
}

/// An entry that could not be inspected during enumeration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnreadableEntry {
    pub path: PathBuf,
    pub reason: String,
}

/// Result of one enumeration pass over all configured roots
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryListing {
    /// Regular files, in no particular order
    pub files: Vec<LocalFileEntry>,
    /// Entries skipped because they could not be stat'ed or named
    pub unreadable: Vec<UnreadableEntry>,
}

/// Local file system source trait
///
/// Abstracts enumeration of the directories being synchronized. Every call to
/// [`list_files`](LocalFilesystemSource::list_files) performs a fresh pass, so
/// the sequence can be materialized as many times as a run needs.
///
/// Implementations must:
/// - Yield regular files only (subdirectories and other entries are skipped)
/// - Fail the whole listing when a configured root cannot be read, since an
///   empty listing would look like every archived file had been deleted
/// - Report individual unreadable entries in [`DirectoryListing::unreadable`]
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::LocalFilesystemSource;
///
/// async fn count(source: &dyn LocalFilesystemSource) -> Result<usize> {
///     Ok(source.list_files().await?.files.len())
/// }
/// ```
#[async_trait]
pub trait LocalFilesystemSource: Send + Sync {
    /// Enumerate regular files across every configured root
    async fn list_files(&self) -> Result<DirectoryListing>;

    /// Read the current modification time of a file in Unix seconds
    ///
    /// This is a live read, not a cached value from the last listing.
    async fn last_modified(&self, path: &Path) -> Result<i64>;

    /// Roots this source enumerates
    fn roots(&self) -> Vec<PathBuf>;
}
