use bridge_traits::BridgeError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Unreadable local file {path}: {reason}")]
    UnreadableLocalFile { path: PathBuf, reason: String },

    #[error("Remote {operation} failed for {target}: {message}")]
    RemoteOperation {
        operation: String,
        target: String,
        message: String,
    },

    #[error("Metadata store {path} is corrupt: {reason}")]
    CorruptMetadataStore { path: PathBuf, reason: String },

    #[error("Metadata store {path} I/O failure: {source}")]
    MetadataStoreIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unknown pending job kind: {tag}")]
    UnknownPendingJobKind { tag: String },

    #[error("{count} inventory retrieval jobs are queued; expected at most one")]
    MultipleInventoryJobs { count: usize },

    #[error("No inventory retrieval job is queued")]
    NoInventoryJob,

    #[error("Inventory job {uuid} is unknown to the remote store; it was dropped, request a new inventory")]
    InventoryJobLost { uuid: String },

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),
}

impl SyncError {
    /// Structural errors mean the local database cannot be trusted and the
    /// operator has to intervene before any further remote operation.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SyncError::CorruptMetadataStore { .. }
                | SyncError::MetadataStoreIo { .. }
                | SyncError::UnknownPendingJobKind { .. }
                | SyncError::MultipleInventoryJobs { .. }
        )
    }

    pub(crate) fn remote(operation: &str, target: &str, error: impl std::fmt::Display) -> Self {
        SyncError::RemoteOperation {
            operation: operation.to_string(),
            target: target.to_string(),
            message: error.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
