//! # Pending Jobs
//!
//! Long-running remote operations that outlive a single process run.
//!
//! ## Overview
//!
//! Archival stores execute some requests (inventory retrieval in particular)
//! over minutes or hours. The job id is recorded in the metadata database so a
//! later invocation can pick it up again.
//!
//! ## Persisted form
//!
//! ```text
//! { "__job_type": "InventoryRetrievalJob", "uuid": "<job id>", ...extra fields }
//! ```
//!
//! `__job_type` is resolved through a closed table. An unrecognized tag is an
//! error: a database that claims to be running automation this program does
//! not understand must not be acted upon.

use crate::{Result, SyncError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::hash::{Hash, Hasher};
use std::str::FromStr;

const REQUESTED_AT: &str = "requested_at";

// ============================================================================
// Job Kinds
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PendingJobKind {
    /// A job with no behavior attached; kept for databases that record one
    Generic,
    /// Remote inventory retrieval used to rebuild the file list
    InventoryRetrieval,
}

impl PendingJobKind {
    /// Tag written to `__job_type`
    pub fn as_str(&self) -> &'static str {
        match self {
            PendingJobKind::Generic => "PendingJob",
            PendingJobKind::InventoryRetrieval => "InventoryRetrievalJob",
        }
    }
}

impl FromStr for PendingJobKind {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "PendingJob" => Ok(PendingJobKind::Generic),
            // Older databases spell the inventory job this way.
            "InventoryRetrievalJob" | "RetreiveInvetoryJob" => {
                Ok(PendingJobKind::InventoryRetrieval)
            }
            _ => Err(SyncError::UnknownPendingJobKind { tag: s.to_string() }),
        }
    }
}

impl std::fmt::Display for PendingJobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Pending Job Entity
// ============================================================================

/// An outstanding remote job; identity is the job uuid
#[derive(Debug, Clone)]
pub struct PendingJob {
    pub kind: PendingJobKind,
    pub uuid: String,
    /// Additional fields carried through the database unchanged
    pub extra: Map<String, Value>,
}

impl PendingJob {
    pub fn new(kind: PendingJobKind, uuid: impl Into<String>) -> Self {
        Self {
            kind,
            uuid: uuid.into(),
            extra: Map::new(),
        }
    }

    pub fn inventory_retrieval(uuid: impl Into<String>, requested_at: i64) -> Self {
        let mut job = Self::new(PendingJobKind::InventoryRetrieval, uuid);
        job.extra
            .insert(REQUESTED_AT.to_string(), Value::from(requested_at));
        job
    }

    pub fn is_inventory_retrieval(&self) -> bool {
        self.kind == PendingJobKind::InventoryRetrieval
    }

    /// When the job was handed to the remote store, if recorded
    pub fn requested_at(&self) -> Option<i64> {
        self.extra.get(REQUESTED_AT).and_then(Value::as_i64)
    }

    pub(crate) fn to_entry(&self) -> JobEntry {
        JobEntry {
            job_type: self.kind.as_str().to_string(),
            uuid: self.uuid.clone(),
            extra: self.extra.clone(),
        }
    }

    pub(crate) fn from_entry(entry: &JobEntry) -> Result<Self> {
        Ok(Self {
            kind: entry.job_type.parse()?,
            uuid: entry.uuid.clone(),
            extra: entry.extra.clone(),
        })
    }
}

impl PartialEq for PendingJob {
    fn eq(&self, other: &Self) -> bool {
        self.uuid == other.uuid
    }
}

impl Eq for PendingJob {}

impl Hash for PendingJob {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.uuid.hash(state);
    }
}

/// Storage projection of a pending job
///
/// The tag is kept as a raw string so a database with an unknown job kind can
/// still be opened; the error surfaces when jobs are enumerated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct JobEntry {
    #[serde(rename = "__job_type")]
    pub job_type: String,
    pub uuid: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ============================================================================
// Tests
// ============================================================================
