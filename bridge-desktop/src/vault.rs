//! Directory-backed Archive Vault
//!
//! Stands in for a remote archival service on a local or mounted disk.
//!
//! ```text
//! <root>/archives/<id>        archived bytes
//! <root>/archives/<id>.json   archive description and creation date
//! <root>/jobs/<job id>.json   inventory jobs and when they become ready
//! ```
//!
//! Inventory jobs complete after a configurable delay, which exercises the
//! same request-then-poll flow as a remote service.

use async_trait::async_trait;
use bridge_traits::{
    archive::{InventoryArchive, InventoryPayload, JobPoll, RemoteArchiveStore},
    error::{BridgeError, Result},
    time::{Clock, SystemClock},
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

const ARCHIVES_DIR: &str = "archives";
const JOBS_DIR: &str = "jobs";

#[derive(Debug, Serialize, Deserialize)]
struct JobFile {
    job_id: String,
    requested_at: DateTime<Utc>,
    ready_at: DateTime<Utc>,
}

pub struct LocalVaultStore {
    root: PathBuf,
    clock: Arc<dyn Clock>,
    inventory_delay: Duration,
}

impl LocalVaultStore {
    /// Vault rooted at `root`; directories are created on first write
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            clock: Arc::new(SystemClock),
            inventory_delay: Duration::zero(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// How long an inventory job stays in progress after it is requested
    pub fn with_inventory_delay(mut self, delay: Duration) -> Self {
        self.inventory_delay = delay;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Ids of every stored archive, sorted
    pub async fn archive_ids(&self) -> Result<Vec<String>> {
        let mut ids: Vec<String> = self
            .load_archives()
            .await?
            .into_iter()
            .map(|a| a.archive_id)
            .collect();
        ids.sort();
        Ok(ids)
    }

    fn archives_dir(&self) -> PathBuf {
        self.root.join(ARCHIVES_DIR)
    }

    fn jobs_dir(&self) -> PathBuf {
        self.root.join(JOBS_DIR)
    }

    async fn load_archives(&self) -> Result<Vec<InventoryArchive>> {
        let dir = self.archives_dir();
        let mut archives = Vec::new();

        let mut read_dir = match fs::read_dir(&dir).await {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(archives),
            Err(e) => return Err(BridgeError::Io(e)),
        };

        while let Some(entry) = read_dir.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            let bytes = fs::read(&path).await?;
            let archive: InventoryArchive = serde_json::from_slice(&bytes).map_err(|e| {
                BridgeError::MalformedPayload(format!("{}: {}", path.display(), e))
            })?;
            archives.push(archive);
        }

        archives.sort_by(|a, b| {
            a.creation_date
                .cmp(&b.creation_date)
                .then_with(|| a.archive_id.cmp(&b.archive_id))
        });
        Ok(archives)
    }
}

/// Ids become file names, so anything that could escape the directory is refused.
fn check_id(id: &str) -> Result<()> {
    if id.is_empty() || id.contains(['/', '\\']) || id.starts_with('.') {
        return Err(BridgeError::OperationFailed(format!("invalid id: {:?}", id)));
    }
    Ok(())
}

#[async_trait]
impl RemoteArchiveStore for LocalVaultStore {
    async fn upload(&self, local_path: &Path, description: &str) -> Result<String> {
        let dir = self.archives_dir();
        fs::create_dir_all(&dir).await?;

        let archive_id = Uuid::new_v4().to_string();
        let data_path = dir.join(&archive_id);
        let size = fs::copy(local_path, &data_path).await?;

        let mut archive = InventoryArchive::new(&archive_id, description, self.clock.now());
        archive.size = Some(size);

        let json = serde_json::to_vec_pretty(&archive)
            .map_err(|e| BridgeError::OperationFailed(e.to_string()))?;
        fs::write(dir.join(format!("{}.json", archive_id)), json).await?;

        debug!(path = ?local_path, archive_id = %archive_id, size, "Archived file");
        Ok(archive_id)
    }

    async fn delete(&self, archive_id: &str) -> Result<()> {
        check_id(archive_id)?;
        let dir = self.archives_dir();

        match fs::remove_file(dir.join(format!("{}.json", archive_id))).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(BridgeError::OperationFailed(format!(
                    "no archive with id {}",
                    archive_id
                )));
            }
            Err(e) => return Err(BridgeError::Io(e)),
        }

        match fs::remove_file(dir.join(archive_id)).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(BridgeError::Io(e)),
        }

        debug!(archive_id, "Deleted archive");
        Ok(())
    }

    async fn request_inventory(&self) -> Result<String> {
        let dir = self.jobs_dir();
        fs::create_dir_all(&dir).await?;

        let now = self.clock.now();
        let job = JobFile {
            job_id: Uuid::new_v4().to_string(),
            requested_at: now,
            ready_at: now + self.inventory_delay,
        };

        let json = serde_json::to_vec_pretty(&job)
            .map_err(|e| BridgeError::OperationFailed(e.to_string()))?;
        fs::write(dir.join(format!("{}.json", job.job_id)), json).await?;

        info!(job_id = %job.job_id, ready_at = %job.ready_at, "Inventory job started");
        Ok(job.job_id)
    }

    async fn poll_job(&self, job_id: &str) -> Result<JobPoll> {
        check_id(job_id)?;

        let bytes = match fs::read(self.jobs_dir().join(format!("{}.json", job_id))).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(BridgeError::UnknownJob(job_id.to_string()));
            }
            Err(e) => return Err(BridgeError::Io(e)),
        };
        let job: JobFile = serde_json::from_slice(&bytes)
            .map_err(|e| BridgeError::MalformedPayload(e.to_string()))?;

        let now = self.clock.now();
        if now < job.ready_at {
            debug!(job_id, ready_at = %job.ready_at, "Inventory job still running");
            return Ok(JobPoll::InProgress);
        }

        let mut inventory = InventoryPayload::new(self.load_archives().await?);
        inventory.inventory_date = Some(now);
        Ok(JobPoll::Complete(inventory))
    }
}
