//! Directory Source Implementation using Tokio

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::{DirectoryListing, LocalFileEntry, LocalFilesystemSource, UnreadableEntry},
};
use chrono::{DateTime, Utc};
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// Tokio-based directory source
///
/// Enumerates the direct children of each configured root; subdirectories are
/// not descended into. Symlinks are followed, so a link to a regular file is
/// listed and a dangling link is reported as unreadable.
#[derive(Debug, Clone)]
pub struct TokioDirectorySource {
    roots: Vec<PathBuf>,
}

impl TokioDirectorySource {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }

    fn map_io_error(e: std::io::Error) -> BridgeError {
        BridgeError::Io(e)
    }

    async fn list_root(&self, root: &Path, listing: &mut DirectoryListing) -> Result<()> {
        let mut read_dir = fs::read_dir(root).await.map_err(|e| {
            BridgeError::NotAvailable(format!("cannot read {}: {}", root.display(), e))
        })?;

        while let Some(entry) = read_dir.next_entry().await.map_err(|e| {
            BridgeError::NotAvailable(format!("cannot read {}: {}", root.display(), e))
        })? {
            let path = entry.path();

            let metadata = match fs::metadata(&path).await {
                Ok(metadata) => metadata,
                Err(e) => {
                    warn!(path = ?path, error = %e, "Cannot stat entry");
                    listing.unreadable.push(UnreadableEntry {
                        path,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            if !metadata.is_file() {
                continue;
            }

            let Some(name) = path.to_str() else {
                listing.unreadable.push(UnreadableEntry {
                    path,
                    reason: "path is not valid UTF-8".to_string(),
                });
                continue;
            };

            match modified_seconds(&metadata) {
                Ok(last_modified) => {
                    listing.files.push(LocalFileEntry::new(name, last_modified));
                }
                Err(e) => listing.unreadable.push(UnreadableEntry {
                    path,
                    reason: e.to_string(),
                }),
            }
        }

        Ok(())
    }
}

fn modified_seconds(metadata: &Metadata) -> std::io::Result<i64> {
    let modified = metadata.modified()?;
    Ok(DateTime::<Utc>::from(modified).timestamp())
}

#[async_trait]
impl LocalFilesystemSource for TokioDirectorySource {
    async fn list_files(&self) -> Result<DirectoryListing> {
        let mut listing = DirectoryListing::default();

        for root in &self.roots {
            self.list_root(root, &mut listing).await?;
        }

        debug!(
            roots = self.roots.len(),
            files = listing.files.len(),
            unreadable = listing.unreadable.len(),
            "Listed directories"
        );
        Ok(listing)
    }

    async fn last_modified(&self, path: &Path) -> Result<i64> {
        let metadata = fs::metadata(path).await.map_err(Self::map_io_error)?;
        modified_seconds(&metadata).map_err(Self::map_io_error)
    }

    fn roots(&self) -> Vec<PathBuf> {
        self.roots.clone()
    }
}
