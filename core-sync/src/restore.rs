//! # Restore Coordinator
//!
//! Rebuilds the metadata database from the remote store's inventory.
//!
//! Inventory retrieval runs remotely for hours, so the restore is a state
//! machine advanced by repeated invocations rather than a blocking call:
//!
//! ```text
//! NoJobQueued --request_inventory--> JobQueued --poll (not ready)--> JobQueued
//!                                        |
//!                                        +--poll (complete)--> file list replaced,
//!                                        |                     job removed
//!                                        +--poll (unknown job)--> job removed,
//!                                                                 InventoryJobLost
//! ```
//!
//! Each call performs at most one remote request and never waits on the
//! remote side.

use crate::{job::PendingJob, metadata_store::MetadataStore, Result, SyncError};
use bridge_traits::{BridgeError, Clock, JobPoll, RemoteArchiveStore, SystemClock};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

/// Restore progress as recorded in the metadata database
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreState {
    NoJobQueued,
    JobQueued(PendingJob),
}

/// Result of advancing the restore by one step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// An inventory job was started and recorded
    Requested(PendingJob),
    /// The queued job has not finished remotely; try again later
    NotReady(PendingJob),
    /// The file list was replaced with this many archives
    Restored { archives: usize },
}

pub struct RestoreCoordinator {
    remote: Arc<dyn RemoteArchiveStore>,
    store: Arc<Mutex<MetadataStore>>,
    clock: Arc<dyn Clock>,
}

impl RestoreCoordinator {
    pub fn new(remote: Arc<dyn RemoteArchiveStore>, store: Arc<Mutex<MetadataStore>>) -> Self {
        Self {
            remote,
            store,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Inspect the queued inventory job, if any
    ///
    /// Fails if any stored job has an unknown kind, or if more than one
    /// inventory job is queued.
    pub async fn state(&self) -> Result<RestoreState> {
        let mut jobs: Vec<PendingJob> = self
            .store
            .lock()
            .await
            .pending_jobs()?
            .into_iter()
            .filter(PendingJob::is_inventory_retrieval)
            .collect();

        match jobs.len() {
            0 => Ok(RestoreState::NoJobQueued),
            1 => Ok(RestoreState::JobQueued(jobs.remove(0))),
            count => Err(SyncError::MultipleInventoryJobs { count }),
        }
    }

    /// Start an inventory retrieval and record it
    ///
    /// An already queued job is returned instead of starting another one.
    #[instrument(skip(self))]
    pub async fn request_inventory(&self) -> Result<PendingJob> {
        if let RestoreState::JobQueued(job) = self.state().await? {
            info!("Inventory job {} already queued", job.uuid);
            return Ok(job);
        }

        let job_id = self
            .remote
            .request_inventory()
            .await
            .map_err(|e| SyncError::remote("request_inventory", "vault", e))?;

        let job = PendingJob::inventory_retrieval(job_id, self.clock.unix_timestamp());
        self.store.lock().await.add_pending_job(&job).await?;

        info!("Inventory job {} requested", job.uuid);
        Ok(job)
    }

    /// Check the queued job once; on completion replace the file list
    #[instrument(skip(self))]
    pub async fn poll(&self) -> Result<RestoreOutcome> {
        match self.state().await? {
            RestoreState::NoJobQueued => Err(SyncError::NoInventoryJob),
            RestoreState::JobQueued(job) => self.poll_job(job).await,
        }
    }

    /// Advance the restore by one step
    ///
    /// Requests an inventory when none is queued, otherwise polls the queued
    /// job.
    #[instrument(skip(self))]
    pub async fn restore_db(&self) -> Result<RestoreOutcome> {
        match self.state().await? {
            RestoreState::NoJobQueued => Ok(RestoreOutcome::Requested(
                self.request_inventory().await?,
            )),
            RestoreState::JobQueued(job) => self.poll_job(job).await,
        }
    }

    async fn poll_job(&self, job: PendingJob) -> Result<RestoreOutcome> {
        let status = match self.remote.poll_job(&job.uuid).await {
            Ok(status) => status,
            Err(BridgeError::UnknownJob(_)) => {
                warn!("Inventory job {} expired or was lost remotely; dropping it", job.uuid);
                self.store.lock().await.delete_pending_job(&job.uuid).await?;
                return Err(SyncError::InventoryJobLost { uuid: job.uuid });
            }
            Err(e) => return Err(SyncError::remote("poll_job", &job.uuid, e)),
        };

        let inventory = match status {
            JobPoll::InProgress => {
                info!("Inventory job {} is not ready yet", job.uuid);
                return Ok(RestoreOutcome::NotReady(job));
            }
            JobPoll::Complete(inventory) => inventory,
        };

        let mut store = self.store.lock().await;
        let archives = store.restore(&inventory).await?;
        store.delete_pending_job(&job.uuid).await?;

        info!("Restored {} archives from inventory job {}", archives, job.uuid);
        Ok(RestoreOutcome::Restored { archives })
    }
}
