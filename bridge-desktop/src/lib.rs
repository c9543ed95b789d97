//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `LocalFilesystemSource` using `tokio::fs` over the configured roots
//! - `RemoteArchiveStore` as a vault directory on a local or mounted disk
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{LocalVaultStore, TokioDirectorySource};
//! use std::path::PathBuf;
//!
//! #[tokio::main]
//! async fn main() {
//!     let source = TokioDirectorySource::new(vec![PathBuf::from("/srv/share")]);
//!     let vault = LocalVaultStore::new("/mnt/backup/vault");
//!
//!     // Hand both to the sync coordinator
//! }
//! ```

mod filesystem;
mod vault;

pub use filesystem::TokioDirectorySource;
pub use vault::LocalVaultStore;
