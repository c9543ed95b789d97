//! # Host Bridge Traits
//!
//! Collaborator contracts the sync core depends on but does not implement.
//!
//! ## Overview
//!
//! This crate defines the seam between the reconciliation engine and the
//! outside world. Each trait represents a capability the core requires but
//! whose implementation depends on where it runs and which archival service
//! sits on the other end.
//!
//! ## Traits
//!
//! - [`LocalFilesystemSource`](storage::LocalFilesystemSource) - Restartable enumeration of regular files with mtimes
//! - [`RemoteArchiveStore`](archive::RemoteArchiveStore) - Upload, delete, and inventory retrieval against the archive vault
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//!
//! ## Implementations
//!
//! | Platform | Implementation Crate | Notes |
//! |----------|---------------------|-------|
//! | Desktop  | `bridge-desktop`    | tokio::fs sources, directory-backed vault |
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Implementations should:
//!
//! - Convert transport-specific errors to `BridgeError`
//! - Include error context (file paths, archive ids, job ids)
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so the core can share them across
//! async tasks.

pub mod archive;
pub mod error;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use archive::{InventoryArchive, InventoryPayload, JobPoll, RemoteArchiveStore};
pub use storage::{DirectoryListing, LocalFileEntry, LocalFilesystemSource, UnreadableEntry};
pub use time::{Clock, FixedClock, LogLevel, SystemClock};
