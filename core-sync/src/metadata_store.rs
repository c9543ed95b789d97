//! # Metadata Store
//!
//! Local, authoritative record of what has been archived remotely.
//!
//! ## Document
//!
//! ```text
//! {
//!   "files":        [ { "path", "last_modified", "uploaded_at", "uuid" }, ... ],
//!   "pending_jobs": [ { "__job_type", "uuid", ... }, ... ]
//! }
//! ```
//!
//! A missing backing file is an empty store; it is written on the first
//! mutation. Missing top-level keys default to empty lists.
//!
//! ## Durability
//!
//! Every mutation serializes the whole next document to a `.tmp` sibling,
//! syncs it, and renames it over the backing file. Only after the rename
//! succeeds does the in-memory state change, so a failed write leaves both the
//! file and the handle on the previous document.

use crate::job::{JobEntry, PendingJob};
use crate::record::{FileRecord, RemoteFileRecord};
use crate::{Result, SyncError};
use bridge_traits::{Clock, InventoryPayload, SystemClock};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct StoreDocument {
    #[serde(default)]
    files: Vec<RemoteFileRecord>,
    #[serde(default)]
    pending_jobs: Vec<JobEntry>,
}

pub struct MetadataStore {
    path: PathBuf,
    clock: Arc<dyn Clock>,
    document: StoreDocument,
}

impl MetadataStore {
    /// Open the store at `path` using the system clock
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        Self::open_with_clock(path, Arc::new(SystemClock)).await
    }

    #[instrument(skip_all)]
    pub async fn open_with_clock(path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Result<Self> {
        let path = path.into();

        let document = match fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<StoreDocument>(&bytes).map_err(|e| {
                SyncError::CorruptMetadataStore {
                    path: path.clone(),
                    reason: e.to_string(),
                }
            })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!(path = ?path, "Metadata store not found, starting empty");
                StoreDocument::default()
            }
            Err(source) => {
                return Err(SyncError::MetadataStoreIo { path, source });
            }
        };

        debug!(
            path = ?path,
            files = document.files.len(),
            pending_jobs = document.pending_jobs.len(),
            "Metadata store loaded"
        );

        Ok(Self {
            path,
            clock,
            document,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Archived files, in insertion order
    pub fn files(&self) -> &[RemoteFileRecord] {
        &self.document.files
    }

    /// Archived files as reconciliation records
    pub fn remote_records(&self) -> Vec<FileRecord> {
        self.document
            .files
            .iter()
            .cloned()
            .map(FileRecord::Remote)
            .collect()
    }

    pub fn find_by_archive_id(&self, archive_id: &str) -> Option<&RemoteFileRecord> {
        self.document.files.iter().find(|f| f.uuid == archive_id)
    }

    /// Record a completed upload; `uploaded_at` is taken from the clock
    #[instrument(skip(self))]
    pub async fn add_file(
        &mut self,
        path: &str,
        last_modified: i64,
        archive_id: &str,
    ) -> Result<RemoteFileRecord> {
        let record = RemoteFileRecord {
            path: path.to_string(),
            last_modified,
            uploaded_at: self.clock.unix_timestamp(),
            uuid: archive_id.to_string(),
        };

        let mut next = self.document.clone();
        next.files.push(record.clone());
        self.commit(next).await?;

        Ok(record)
    }

    /// Remove every file entry carrying `archive_id`
    ///
    /// Returns `false` without touching the backing file when nothing matched.
    #[instrument(skip(self))]
    pub async fn delete_file(&mut self, archive_id: &str) -> Result<bool> {
        let mut next = self.document.clone();
        next.files.retain(|f| f.uuid != archive_id);

        if next.files.len() == self.document.files.len() {
            debug!(archive_id, "No file entry for archive id");
            return Ok(false);
        }

        self.commit(next).await?;
        Ok(true)
    }

    /// Replace the file list with the contents of a remote inventory
    ///
    /// Pending jobs are left untouched. Both `last_modified` and
    /// `uploaded_at` are set to the archive creation date, which is the only
    /// time the inventory carries.
    #[instrument(skip(self, inventory), fields(archives = inventory.archive_list.len()))]
    pub async fn restore(&mut self, inventory: &InventoryPayload) -> Result<usize> {
        let files: Vec<RemoteFileRecord> = inventory
            .archive_list
            .iter()
            .map(|archive| {
                let created = archive.creation_date.timestamp();
                RemoteFileRecord {
                    path: archive.archive_description.clone(),
                    last_modified: created,
                    uploaded_at: created,
                    uuid: archive.archive_id.clone(),
                }
            })
            .collect();
        let count = files.len();

        let mut next = self.document.clone();
        next.files = files;
        self.commit(next).await?;

        info!(count, "File list restored from inventory");
        Ok(count)
    }

    /// Decode every pending job
    ///
    /// Fails with [`SyncError::UnknownPendingJobKind`] if any stored tag is
    /// not recognized.
    pub fn pending_jobs(&self) -> Result<Vec<PendingJob>> {
        self.document
            .pending_jobs
            .iter()
            .map(PendingJob::from_entry)
            .collect()
    }

    /// Append a pending job; a job whose uuid is already stored is ignored
    #[instrument(skip(self, job), fields(uuid = %job.uuid, kind = %job.kind))]
    pub async fn add_pending_job(&mut self, job: &PendingJob) -> Result<()> {
        if self.document.pending_jobs.iter().any(|j| j.uuid == job.uuid) {
            debug!("Pending job already recorded");
            return Ok(());
        }

        let mut next = self.document.clone();
        next.pending_jobs.push(job.to_entry());
        self.commit(next).await
    }

    #[instrument(skip(self))]
    pub async fn delete_pending_job(&mut self, uuid: &str) -> Result<bool> {
        let mut next = self.document.clone();
        next.pending_jobs.retain(|j| j.uuid != uuid);

        if next.pending_jobs.len() == self.document.pending_jobs.len() {
            return Ok(false);
        }

        self.commit(next).await?;
        Ok(true)
    }

    async fn commit(&mut self, next: StoreDocument) -> Result<()> {
        self.persist(&next).await?;
        self.document = next;
        Ok(())
    }

    async fn persist(&self, document: &StoreDocument) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(document).map_err(|e| self.io_error(e.into()))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|e| self.io_error(e))?;
            }
        }

        let tmp = tmp_path(&self.path);
        let mut file = fs::File::create(&tmp).await.map_err(|e| self.io_error(e))?;
        file.write_all(&bytes).await.map_err(|e| self.io_error(e))?;
        file.sync_all().await.map_err(|e| self.io_error(e))?;
        drop(file);

        fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.io_error(e))?;

        debug!(path = ?self.path, bytes = bytes.len(), "Metadata store written");
        Ok(())
    }

    fn io_error(&self, source: io::Error) -> SyncError {
        SyncError::MetadataStoreIo {
            path: self.path.clone(),
            source,
        }
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}
