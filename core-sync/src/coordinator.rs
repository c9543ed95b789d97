//! # Sync Coordinator
//!
//! Drives one synchronization pass from the local directories to the remote
//! archive store.
//!
//! ## Workflow
//!
//! 1. List local files through the `LocalFilesystemSource`
//! 2. Load archived files from the `MetadataStore`
//! 3. Reconcile both sides with the configured modification policies
//! 4. Upload new files
//! 5. Delete archives of removed files (and superseded duplicates)
//! 6. Replace modified files: upload the new version, then delete the old
//!
//! Each remote operation is followed by the matching metadata write before
//! the file counts as done. A remote failure is recorded against its file and
//! the batch continues; a metadata write failure aborts the pass.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_sync::{MetadataStore, SyncConfig, SyncCoordinator};
//! use std::sync::Arc;
//! use tokio::sync::Mutex;
//!
//! let store = Arc::new(Mutex::new(MetadataStore::open("glacsync.files").await?));
//! let coordinator = SyncCoordinator::new(SyncConfig::default(), source, vault, store);
//!
//! let report = coordinator.sync().await?;
//! println!("{} uploaded, {} deleted", report.uploaded.len(), report.deleted.len());
//! ```

use crate::{
    metadata_store::MetadataStore,
    policy::ModificationPolicy,
    reconcile::ReconciliationRunner,
    record::{FileRecord, RemoteFileRecord},
    Result, SyncError,
};
use bridge_traits::{LocalFilesystemSource, RemoteArchiveStore};
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

/// Outcome of one file operation: the outer error aborts the pass, the inner
/// one is recorded against the file.
type Step<T> = Result<std::result::Result<T, FileFailure>>;

/// Sync coordinator configuration
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Maximum remote transfers in flight at once
    pub max_concurrent_transfers: usize,

    /// Compute and report the plan without touching the remote store or the
    /// metadata database
    pub dry_run: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_concurrent_transfers: 4,
            dry_run: false,
        }
    }
}

/// A file whose remote operation did not complete
#[derive(Debug)]
pub struct FileFailure {
    pub path: String,
    pub error: SyncError,
}

/// Summary of a sync pass
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Paths of new files uploaded
    pub uploaded: Vec<String>,
    /// Paths whose archives were deleted
    pub deleted: Vec<String>,
    /// Paths replaced with a newer upload
    pub modified: Vec<String>,
    /// Archive ids of older duplicates removed
    pub superseded: Vec<String>,
    /// Local entries that could not be inspected
    pub unreadable: Vec<PathBuf>,
    pub failures: Vec<FileFailure>,
    /// Whether the pass only planned its actions
    pub dry_run: bool,
}

impl SyncReport {
    /// Some files were skipped or failed; the next pass will retry them
    pub fn is_partial_failure(&self) -> bool {
        !self.failures.is_empty() || !self.unreadable.is_empty()
    }

    fn sort(&mut self) {
        self.uploaded.sort();
        self.deleted.sort();
        self.modified.sort();
        self.superseded.sort();
        self.failures.sort_by(|a, b| a.path.cmp(&b.path));
    }
}

/// Sync coordinator for one local tree and one archive store
pub struct SyncCoordinator {
    config: SyncConfig,

    /// Source of local files
    local: Arc<dyn LocalFilesystemSource>,

    /// Remote archive store
    remote: Arc<dyn RemoteArchiveStore>,

    /// Metadata database; the mutex serializes writes
    store: Arc<Mutex<MetadataStore>>,

    runner: ReconciliationRunner<FileRecord>,
}

impl SyncCoordinator {
    /// Create a coordinator using the default `last_modified` policy
    pub fn new(
        config: SyncConfig,
        local: Arc<dyn LocalFilesystemSource>,
        remote: Arc<dyn RemoteArchiveStore>,
        store: Arc<Mutex<MetadataStore>>,
    ) -> Self {
        Self {
            config,
            local,
            remote,
            store,
            runner: ReconciliationRunner::with_default_policies(),
        }
    }

    /// Replace the modification policies
    pub fn with_policies(mut self, policies: Vec<Arc<dyn ModificationPolicy<FileRecord>>>) -> Self {
        self.runner = ReconciliationRunner::new(policies);
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Run one synchronization pass
    #[instrument(skip(self), fields(dry_run = self.config.dry_run))]
    pub async fn sync(&self) -> Result<SyncReport> {
        let mut report = SyncReport {
            dry_run: self.config.dry_run,
            ..SyncReport::default()
        };

        // Jobs this build cannot interpret mean the database is not ours to act on
        self.store.lock().await.pending_jobs()?;

        // Phase 1: Gather both sides
        info!("Phase 1: Listing local files under {:?}", self.local.roots());
        let listing = self.local.list_files().await?;

        for entry in &listing.unreadable {
            warn!(path = ?entry.path, reason = %entry.reason, "Skipping unreadable local file");
        }
        report.unreadable = listing.unreadable.iter().map(|e| e.path.clone()).collect();

        // An unreadable file still exists; its archive must survive this pass.
        let unreadable: HashSet<&Path> =
            listing.unreadable.iter().map(|e| e.path.as_path()).collect();
        let remote_records: Vec<FileRecord> = self
            .store
            .lock()
            .await
            .remote_records()
            .into_iter()
            .filter(|record| !unreadable.contains(Path::new(record.path())))
            .collect();

        info!(
            "Phase 2: Reconciling {} local files against {} archived files",
            listing.files.len(),
            remote_records.len()
        );
        let local_records = listing.files.iter().cloned().map(FileRecord::from);
        let plan = self.runner.reconcile(local_records, remote_records);

        let deleted: Vec<&RemoteFileRecord> =
            plan.deleted.iter().filter_map(FileRecord::as_remote).collect();
        let superseded: Vec<&RemoteFileRecord> =
            plan.superseded.iter().filter_map(FileRecord::as_remote).collect();
        let modified: Vec<(&str, &RemoteFileRecord)> = plan
            .modified
            .iter()
            .filter_map(|(local, remote)| remote.as_remote().map(|r| (local.path(), r)))
            .collect();

        info!(
            new = plan.new.len(),
            deleted = deleted.len(),
            modified = modified.len(),
            superseded = superseded.len(),
            "Reconciliation complete"
        );

        if self.config.dry_run {
            report.uploaded = plan.new.iter().map(|r| r.path().to_string()).collect();
            report.deleted = deleted.iter().map(|r| r.path.clone()).collect();
            report.modified = modified.iter().map(|(path, _)| path.to_string()).collect();
            report.superseded = superseded.iter().map(|r| r.uuid.clone()).collect();
            report.sort();
            info!("Dry run: no remote operations performed");
            return Ok(report);
        }

        // Phase 3: New files
        info!("Phase 3: Uploading {} new files", plan.new.len());
        let results = self
            .run_batch(plan.new.iter().map(|record| self.upload_file(record.path())))
            .await;
        for result in results {
            match result? {
                Ok(record) => report.uploaded.push(record.path),
                Err(failure) => report.failures.push(failure),
            }
        }

        // Phase 4: Deleted files and superseded duplicates
        info!(
            "Phase 4: Removing {} deleted and {} superseded archives",
            deleted.len(),
            superseded.len()
        );
        let results = self
            .run_batch(deleted.iter().map(|record| self.delete_archive(record)))
            .await;
        for result in results {
            match result? {
                Ok(record) => report.deleted.push(record.path),
                Err(failure) => report.failures.push(failure),
            }
        }

        let results = self
            .run_batch(superseded.iter().map(|record| self.delete_archive(record)))
            .await;
        for result in results {
            match result? {
                Ok(record) => report.superseded.push(record.uuid),
                Err(failure) => report.failures.push(failure),
            }
        }

        // Phase 5: Modified files
        info!("Phase 5: Replacing {} modified files", modified.len());
        let results = self
            .run_batch(
                modified
                    .iter()
                    .map(|(path, previous)| self.replace_file(path, previous)),
            )
            .await;
        for result in results {
            match result? {
                Ok(path) => report.modified.push(path),
                Err(failure) => report.failures.push(failure),
            }
        }

        report.sort();

        if report.is_partial_failure() {
            warn!(
                failures = report.failures.len(),
                unreadable = report.unreadable.len(),
                "Sync completed with errors"
            );
        } else {
            info!(
                uploaded = report.uploaded.len(),
                deleted = report.deleted.len(),
                modified = report.modified.len(),
                "Sync completed"
            );
        }

        Ok(report)
    }

    async fn run_batch<I, F, T>(&self, operations: I) -> Vec<T>
    where
        I: IntoIterator<Item = F>,
        F: Future<Output = T>,
    {
        stream::iter(operations)
            .buffer_unordered(self.config.max_concurrent_transfers.max(1))
            .collect()
            .await
    }

    /// Upload the current contents of `path` and record the new archive
    async fn upload_file(&self, path: &str) -> Step<RemoteFileRecord> {
        let local_path = Path::new(path);

        let last_modified = match self.local.last_modified(local_path).await {
            Ok(timestamp) => timestamp,
            Err(e) => {
                warn!(path, error = %e, "Local file vanished or became unreadable");
                return Ok(Err(FileFailure {
                    path: path.to_string(),
                    error: SyncError::UnreadableLocalFile {
                        path: local_path.to_path_buf(),
                        reason: e.to_string(),
                    },
                }));
            }
        };

        info!("Uploading {}", path);
        let archive_id = match self.remote.upload(local_path, path).await {
            Ok(id) => id,
            Err(e) => {
                error!("Failed to upload {}: {}", path, e);
                return Ok(Err(FileFailure {
                    path: path.to_string(),
                    error: SyncError::remote("upload", path, e),
                }));
            }
        };

        let record = self
            .store
            .lock()
            .await
            .add_file(path, last_modified, &archive_id)
            .await?;

        debug!(path, archive_id = %record.uuid, "Upload recorded");
        Ok(Ok(record))
    }

    /// Delete an archive and drop its metadata entry
    async fn delete_archive(&self, record: &RemoteFileRecord) -> Step<RemoteFileRecord> {
        info!("Removing archive {} for {}", record.uuid, record.path);

        if let Err(e) = self.remote.delete(&record.uuid).await {
            error!("Failed to delete archive {}: {}", record.uuid, e);
            return Ok(Err(FileFailure {
                path: record.path.clone(),
                error: SyncError::remote("delete", &record.uuid, e),
            }));
        }

        self.store.lock().await.delete_file(&record.uuid).await?;
        Ok(Ok(record.clone()))
    }

    /// Upload the new version, then delete the previous archive
    ///
    /// If the delete fails, both archives remain and the next pass removes
    /// the older one as superseded.
    async fn replace_file(&self, path: &str, previous: &RemoteFileRecord) -> Step<String> {
        info!("File {} has changed", path);

        if let Err(failure) = self.upload_file(path).await? {
            return Ok(Err(failure));
        }

        match self.delete_archive(previous).await? {
            Ok(_) => Ok(Ok(path.to_string())),
            Err(failure) => Ok(Err(failure)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::{
        error::Result as BridgeResult, BridgeError, DirectoryListing, JobPoll, LocalFileEntry,
        UnreadableEntry,
    };
    use mockall::{mock, predicate::eq, Sequence};
    use tempfile::TempDir;

    mock! {
        Source {}

        #[async_trait]
        impl LocalFilesystemSource for Source {
            async fn list_files(&self) -> BridgeResult<DirectoryListing>;
            async fn last_modified(&self, path: &Path) -> BridgeResult<i64>;
            fn roots(&self) -> Vec<PathBuf>;
        }
    }

    mock! {
        Vault {}

        #[async_trait]
        impl RemoteArchiveStore for Vault {
            async fn upload(&self, local_path: &Path, description: &str) -> BridgeResult<String>;
            async fn delete(&self, archive_id: &str) -> BridgeResult<()>;
            async fn request_inventory(&self) -> BridgeResult<String>;
            async fn poll_job(&self, job_id: &str) -> BridgeResult<JobPoll>;
        }
    }

    fn source(listing: DirectoryListing) -> MockSource {
        let mut source = MockSource::new();
        source.expect_roots().returning(Vec::new);
        source
            .expect_list_files()
            .times(1)
            .returning(move || Ok(listing.clone()));
        source
    }

    fn listing(files: &[(&str, i64)]) -> DirectoryListing {
        DirectoryListing {
            files: files
                .iter()
                .map(|(path, ts)| LocalFileEntry::new(*path, *ts))
                .collect(),
            unreadable: Vec::new(),
        }
    }

    async fn store_with(dir: &TempDir, files: &[(&str, i64, &str)]) -> Arc<Mutex<MetadataStore>> {
        let mut store = MetadataStore::open(dir.path().join("db.files")).await.unwrap();
        for (path, ts, id) in files {
            store.add_file(path, *ts, id).await.unwrap();
        }
        Arc::new(Mutex::new(store))
    }

    fn coordinator(
        config: SyncConfig,
        source: MockSource,
        vault: MockVault,
        store: Arc<Mutex<MetadataStore>>,
    ) -> SyncCoordinator {
        SyncCoordinator::new(config, Arc::new(source), Arc::new(vault), store)
    }

    #[tokio::test]
    async fn test_modified_file_uploads_before_delete() {
        let dir = TempDir::new().unwrap();
        let store = store_with(&dir, &[("c.txt", 100, "c-old")]).await;

        let mut source = source(listing(&[("c.txt", 300)]));
        source.expect_last_modified().returning(|_| Ok(300));

        let mut seq = Sequence::new();
        let mut vault = MockVault::new();
        vault
            .expect_upload()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok("c-new".to_string()));
        vault
            .expect_delete()
            .with(eq("c-old"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let coordinator = coordinator(SyncConfig::default(), source, vault, store.clone());
        let report = coordinator.sync().await.unwrap();

        assert_eq!(report.modified, vec!["c.txt"]);
        assert!(report.uploaded.is_empty());
        assert!(!report.is_partial_failure());

        let store = store.lock().await;
        assert_eq!(store.files().len(), 1);
        assert_eq!(store.files()[0].uuid, "c-new");
        assert_eq!(store.files()[0].last_modified, 300);
    }

    #[tokio::test]
    async fn test_failed_upload_keeps_old_archive() {
        let dir = TempDir::new().unwrap();
        let store = store_with(&dir, &[("c.txt", 100, "c-old")]).await;

        let mut source = source(listing(&[("c.txt", 300)]));
        source.expect_last_modified().returning(|_| Ok(300));

        let mut vault = MockVault::new();
        vault
            .expect_upload()
            .returning(|_, _| Err(BridgeError::OperationFailed("timeout".to_string())));
        vault.expect_delete().never();

        let coordinator = coordinator(SyncConfig::default(), source, vault, store.clone());
        let report = coordinator.sync().await.unwrap();

        assert!(report.modified.is_empty());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].path, "c.txt");
        assert!(matches!(
            report.failures[0].error,
            SyncError::RemoteOperation { ref operation, .. } if operation == "upload"
        ));
        assert_eq!(store.lock().await.files()[0].uuid, "c-old");
    }

    #[tokio::test]
    async fn test_one_failure_does_not_block_others() {
        let dir = TempDir::new().unwrap();
        let store = store_with(&dir, &[]).await;

        let mut source = source(listing(&[("a.txt", 1), ("bad.txt", 2), ("z.txt", 3)]));
        source.expect_last_modified().returning(|_| Ok(5));

        let mut vault = MockVault::new();
        vault.expect_upload().times(3).returning(|path, _| {
            if path.ends_with("bad.txt") {
                Err(BridgeError::OperationFailed("rejected".to_string()))
            } else {
                Ok(format!("id-{}", path.display()))
            }
        });

        let coordinator = coordinator(SyncConfig::default(), source, vault, store.clone());
        let report = coordinator.sync().await.unwrap();

        assert_eq!(report.uploaded, vec!["a.txt", "z.txt"]);
        assert_eq!(report.failures.len(), 1);
        assert!(report.is_partial_failure());
        assert_eq!(store.lock().await.files().len(), 2);
    }

    #[tokio::test]
    async fn test_unreadable_file_is_not_deleted() {
        let dir = TempDir::new().unwrap();
        let store = store_with(&dir, &[("b.txt", 100, "b-1")]).await;

        let source = source(DirectoryListing {
            files: Vec::new(),
            unreadable: vec![UnreadableEntry {
                path: PathBuf::from("b.txt"),
                reason: "permission denied".to_string(),
            }],
        });

        let mut vault = MockVault::new();
        vault.expect_delete().never();

        let coordinator = coordinator(SyncConfig::default(), source, vault, store.clone());
        let report = coordinator.sync().await.unwrap();

        assert!(report.deleted.is_empty());
        assert_eq!(report.unreadable, vec![PathBuf::from("b.txt")]);
        assert_eq!(store.lock().await.files().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_pending_job_halts_before_remote_calls() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("db.files");
        std::fs::write(
            &db_path,
            r#"{
                "files": [{"path": "b.txt", "last_modified": 1, "uploaded_at": 1, "uuid": "b-1"}],
                "pending_jobs": [{"__job_type": "Struct", "uuid": "job-1"}]
            }"#,
        )
        .unwrap();
        let store = Arc::new(Mutex::new(MetadataStore::open(&db_path).await.unwrap()));

        let mut source = MockSource::new();
        source.expect_roots().returning(Vec::new);
        source.expect_list_files().never();
        let mut vault = MockVault::new();
        vault.expect_upload().never();
        vault.expect_delete().never();

        let coordinator = coordinator(SyncConfig::default(), source, vault, store.clone());
        let err = coordinator.sync().await.unwrap_err();

        assert!(matches!(err, SyncError::UnknownPendingJobKind { ref tag } if tag == "Struct"));
        assert!(err.is_fatal());
        assert_eq!(store.lock().await.files().len(), 1);
    }

    #[tokio::test]
    async fn test_vanished_file_is_reported_unreadable() {
        let dir = TempDir::new().unwrap();
        let store = store_with(&dir, &[]).await;

        let mut source = source(listing(&[("gone.txt", 1)]));
        source
            .expect_last_modified()
            .returning(|_| Err(BridgeError::OperationFailed("not found".to_string())));

        let mut vault = MockVault::new();
        vault.expect_upload().never();

        let coordinator = coordinator(SyncConfig::default(), source, vault, store);
        let report = coordinator.sync().await.unwrap();

        assert!(matches!(
            report.failures[0].error,
            SyncError::UnreadableLocalFile { .. }
        ));
    }

    #[tokio::test]
    async fn test_superseded_duplicates_are_deleted() {
        let dir = TempDir::new().unwrap();
        let store = store_with(&dir, &[("c.txt", 100, "c-old"), ("c.txt", 300, "c-new")]).await;

        let source = source(listing(&[("c.txt", 300)]));

        let mut vault = MockVault::new();
        vault
            .expect_delete()
            .with(eq("c-old"))
            .times(1)
            .returning(|_| Ok(()));
        vault.expect_upload().never();

        let coordinator = coordinator(SyncConfig::default(), source, vault, store.clone());
        let report = coordinator.sync().await.unwrap();

        assert_eq!(report.superseded, vec!["c-old"]);
        assert!(report.modified.is_empty());

        let store = store.lock().await;
        assert_eq!(store.files().len(), 1);
        assert_eq!(store.files()[0].uuid, "c-new");
    }

    #[tokio::test]
    async fn test_dry_run_touches_nothing() {
        let dir = TempDir::new().unwrap();
        let store = store_with(&dir, &[("b.txt", 1, "b-1"), ("c.txt", 1, "c-1")]).await;

        let source = source(listing(&[("a.txt", 1), ("c.txt", 9)]));
        let vault = MockVault::new();

        let config = SyncConfig {
            dry_run: true,
            ..SyncConfig::default()
        };
        let coordinator = coordinator(config, source, vault, store.clone());
        let report = coordinator.sync().await.unwrap();

        assert!(report.dry_run);
        assert_eq!(report.uploaded, vec!["a.txt"]);
        assert_eq!(report.deleted, vec!["b.txt"]);
        assert_eq!(report.modified, vec!["c.txt"]);
        assert_eq!(store.lock().await.files().len(), 2);
    }

    #[tokio::test]
    async fn test_listing_failure_aborts() {
        let dir = TempDir::new().unwrap();
        let store = store_with(&dir, &[("b.txt", 1, "b-1")]).await;

        let mut source = MockSource::new();
        source.expect_roots().returning(Vec::new);
        source
            .expect_list_files()
            .returning(|| Err(BridgeError::NotAvailable("root missing".to_string())));

        let mut vault = MockVault::new();
        vault.expect_delete().never();

        let coordinator = coordinator(SyncConfig::default(), source, vault, store);
        let err = coordinator.sync().await.unwrap_err();

        assert!(matches!(err, SyncError::Bridge(BridgeError::NotAvailable(_))));
    }

    #[tokio::test]
    async fn test_custom_policies_replace_default() {
        struct Always;

        impl ModificationPolicy<FileRecord> for Always {
            fn name(&self) -> &str {
                "always"
            }

            fn is_modified(&self, _local: &FileRecord, _remote: &FileRecord) -> bool {
                true
            }
        }

        let dir = TempDir::new().unwrap();
        let store = store_with(&dir, &[("c.txt", 100, "c-1")]).await;
        let source = source(listing(&[("c.txt", 100)]));

        let config = SyncConfig {
            dry_run: true,
            ..SyncConfig::default()
        };
        let coordinator = coordinator(config, source, MockVault::new(), store)
            .with_policies(vec![Arc::new(Always)]);
        let report = coordinator.sync().await.unwrap();

        assert_eq!(report.modified, vec!["c.txt"]);
    }
}
