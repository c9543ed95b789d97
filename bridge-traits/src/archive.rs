//! Remote Archive Store Abstractions
//!
//! The remote store keeps uploaded files as opaque archives. It offers no
//! cheap listing; the only way to learn its contents is an inventory retrieval
//! job that completes asynchronously on the remote side (minutes to hours).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{BridgeError, Result};

/// One archive as reported by an inventory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InventoryArchive {
    /// Permanent archive identifier
    pub archive_id: String,
    /// Description given at upload time; holds the original file path
    pub archive_description: String,
    /// When the archive was created in the remote store
    pub creation_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(
        default,
        rename = "SHA256TreeHash",
        skip_serializing_if = "Option::is_none"
    )]
    pub sha256_tree_hash: Option<String>,
}

impl InventoryArchive {
    pub fn new(
        archive_id: impl Into<String>,
        archive_description: impl Into<String>,
        creation_date: DateTime<Utc>,
    ) -> Self {
        Self {
            archive_id: archive_id.into(),
            archive_description: archive_description.into(),
            creation_date,
            size: None,
            sha256_tree_hash: None,
        }
    }
}

/// Output of a completed inventory retrieval job
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InventoryPayload {
    #[serde(default, rename = "VaultARN", skip_serializing_if = "Option::is_none")]
    pub vault_arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inventory_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub archive_list: Vec<InventoryArchive>,
}

impl InventoryPayload {
    pub fn new(archive_list: Vec<InventoryArchive>) -> Self {
        Self {
            vault_arn: None,
            inventory_date: None,
            archive_list,
        }
    }

    /// Parse the inventory document returned by the remote store
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| BridgeError::MalformedPayload(e.to_string()))
    }
}

/// Status of a remote job at the time of polling
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobPoll {
    /// The remote side has not finished yet; ask again later
    InProgress,
    /// The job finished and its inventory is available
    Complete(InventoryPayload),
}

impl JobPoll {
    pub fn is_complete(&self) -> bool {
        matches!(self, JobPoll::Complete(_))
    }
}

/// Remote archive store trait
///
/// Implemented by the transport to the archival service. Every call is a
/// single request; none of them wait for remote-side job completion.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::archive::RemoteArchiveStore;
///
/// async fn archive(store: &dyn RemoteArchiveStore, path: &Path) -> Result<String> {
///     store.upload(path, &path.to_string_lossy()).await
/// }
/// ```
#[async_trait]
pub trait RemoteArchiveStore: Send + Sync {
    /// Upload a local file and return its permanent archive id
    async fn upload(&self, local_path: &Path, description: &str) -> Result<String>;

    /// Delete an archive by id
    async fn delete(&self, archive_id: &str) -> Result<()>;

    /// Start an inventory retrieval job and return its job id
    async fn request_inventory(&self) -> Result<String>;

    /// Check a job once without blocking for completion
    async fn poll_job(&self, job_id: &str) -> Result<JobPoll>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_inventory_document() {
        let body = br#"{
            "VaultARN": "arn:aws:glacier:eu-west-1:0123456789:vaults/backup",
            "InventoryDate": "2014-06-25T10:00:00Z",
            "ArchiveList": [
                {
                    "ArchiveId": "archive-1",
                    "ArchiveDescription": "share/1.txt",
                    "CreationDate": "2014-06-24T12:30:10Z",
                    "Size": 1024,
                    "SHA256TreeHash": "abc"
                },
                {
                    "ArchiveId": "archive-2",
                    "ArchiveDescription": "share/2.txt",
                    "CreationDate": "2014-06-24T12:31:00Z"
                }
            ]
        }"#;

        let payload = InventoryPayload::from_json(body).unwrap();

        assert_eq!(payload.archive_list.len(), 2);
        assert_eq!(payload.archive_list[0].archive_id, "archive-1");
        assert_eq!(payload.archive_list[0].archive_description, "share/1.txt");
        assert_eq!(payload.archive_list[0].creation_date.timestamp(), 1403613010);
        assert_eq!(payload.archive_list[0].size, Some(1024));
        assert_eq!(payload.archive_list[1].size, None);
        assert!(payload.vault_arn.is_some());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let result = InventoryPayload::from_json(b"not json");
        assert!(matches!(result, Err(BridgeError::MalformedPayload(_))));
    }

    #[test]
    fn test_job_poll_is_complete() {
        assert!(!JobPoll::InProgress.is_complete());
        assert!(JobPoll::Complete(InventoryPayload::default()).is_complete());
    }
}
