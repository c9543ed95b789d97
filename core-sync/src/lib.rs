//! # Sync & Reconciliation Module
//!
//! Keeps a remote archive store in step with a set of local directories.
//!
//! ## Overview
//!
//! The remote store cannot be listed cheaply, so a local metadata database
//! mirrors what has been archived. Each sync pass:
//! - Lists local files through a `LocalFilesystemSource`
//! - Diffs them by path against the database
//! - Decides which matched pairs changed via pluggable policies
//! - Uploads and deletes through a `RemoteArchiveStore`, recording each
//!   completed operation in the database
//!
//! When the database is lost or out of date, it is rebuilt from a remote
//! inventory job that may take hours to finish.
//!
//! ## Components
//!
//! - **File Records** (`record`): Path-identified view of local and archived files
//! - **Change Set** (`changeset`): Pure new/deleted/maybe-modified diff
//! - **Modification Policies** (`policy`): Pluggable "has this pair changed" decisions
//! - **Reconciliation Runner** (`reconcile`): Change set plus policies
//! - **Metadata Store** (`metadata_store`): Durable JSON database of archives and pending jobs
//! - **Pending Jobs** (`job`): Closed set of long-running remote job kinds
//! - **Sync Coordinator** (`coordinator`): Executes a reconciliation against the remote store
//! - **Restore Coordinator** (`restore`): Rebuilds the database from a remote inventory

pub mod changeset;
pub mod coordinator;
pub mod error;
pub mod job;
pub mod metadata_store;
pub mod policy;
pub mod reconcile;
pub mod record;
pub mod restore;

pub use changeset::ChangeSet;
pub use coordinator::{FileFailure, SyncConfig, SyncCoordinator, SyncReport};
pub use error::{Result, SyncError};
pub use job::{PendingJob, PendingJobKind};
pub use metadata_store::MetadataStore;
pub use policy::{LastModifiedDiffer, ModificationPolicy};
pub use reconcile::{Reconciliation, ReconciliationRunner};
pub use record::{FileRecord, LocalFileRecord, RemoteFileRecord, Timestamped};
pub use restore::{RestoreCoordinator, RestoreOutcome, RestoreState};
