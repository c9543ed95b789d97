//! # Configuration Module
//!
//! Provides configuration management for glacsync.
//!
//! ## Overview
//!
//! A `GlacsyncConfig` is built either programmatically with
//! [`GlacsyncConfig::builder()`] or from a TOML file with
//! [`GlacsyncConfig::from_file()`]. Both paths end in the same fail-fast
//! [`validate()`](GlacsyncConfig::validate).
//!
//! ## File format
//!
//! ```toml
//! [general]
//! db_file = "<auto>"                  # "<auto>" = next to this file, with ".files" appended
//! dirs_to_sync = ["/srv/share", "/srv/photos"]
//! use_delayed_delete = false
//!
//! [vault]
//! path = "/mnt/backup/vault"
//! inventory_delay_secs = 0
//!
//! [sync]
//! max_concurrent_transfers = 4
//! dry_run = false
//!
//! [logging]
//! level = "info"
//! format = "compact"
//! # filter = "warn,core_sync=trace"   # replaces `level` when set
//! spans = false
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::GlacsyncConfig;
//!
//! let config = GlacsyncConfig::builder()
//!     .database_path("/var/lib/glacsync/share.files")
//!     .dir_to_sync("/srv/share")
//!     .vault_path("/mnt/backup/vault")
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use crate::logging::{LogFormat, LoggingConfig};
use bridge_traits::time::LogLevel;
use serde::Deserialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Placeholder for a database stored beside the configuration file
pub const AUTO_VALUE: &str = "<auto>";

const MAX_CONCURRENT_TRANSFERS: usize = 64;

/// Thirty days
const MAX_INVENTORY_DELAY_SECS: u64 = 30 * 24 * 60 * 60;

/// Settings for one synchronized set of directories
#[derive(Debug, Clone, PartialEq)]
pub struct GlacsyncConfig {
    /// Metadata database document
    pub database_path: PathBuf,

    /// Root directories whose files are archived
    pub dirs_to_sync: Vec<PathBuf>,

    /// Root of the archive vault
    pub vault_path: PathBuf,

    /// Seconds before a requested inventory becomes available
    pub inventory_delay_secs: u64,

    /// Delayed deletion of archives; not supported and rejected when set
    pub use_delayed_delete: bool,

    /// Maximum transfers in flight at once
    pub max_concurrent_transfers: usize,

    /// Plan only; no remote or database writes
    pub dry_run: bool,

    pub log_level: LogLevel,

    pub log_format: LogFormat,

    /// `EnvFilter` directives replacing the level-based default
    pub log_filter: Option<String>,

    /// Log span open and close events
    pub log_spans: bool,
}

impl GlacsyncConfig {
    pub fn builder() -> GlacsyncConfigBuilder {
        GlacsyncConfigBuilder::default()
    }

    /// Load and validate a TOML configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config = Self::from_toml(&contents, path)?;
        debug!(
            path = %path.display(),
            database = %config.database_path.display(),
            dirs = config.dirs_to_sync.len(),
            "Configuration file loaded"
        );
        Ok(config)
    }

    /// Parse a TOML document; `config_path` anchors the `<auto>` database path
    pub fn from_toml(contents: &str, config_path: &Path) -> Result<Self> {
        let file: ConfigFile = toml::from_str(contents).map_err(|e| {
            Error::Config(format!("Invalid config {}: {}", config_path.display(), e))
        })?;

        let database_path = if file.general.db_file == AUTO_VALUE {
            auto_database_path(config_path)
        } else {
            PathBuf::from(file.general.db_file)
        };

        let mut builder = Self::builder()
            .database_path(database_path)
            .dirs_to_sync(file.general.dirs_to_sync)
            .vault_path(file.vault.path)
            .inventory_delay_secs(file.vault.inventory_delay_secs)
            .use_delayed_delete(file.general.use_delayed_delete)
            .dry_run(file.sync.dry_run)
            .log_level(file.logging.level);

        if let Some(n) = file.sync.max_concurrent_transfers {
            builder = builder.max_concurrent_transfers(n);
        }
        if let Some(format) = file.logging.format {
            builder = builder.log_format(format);
        }
        if let Some(filter) = file.logging.filter {
            builder = builder.log_filter(filter);
        }
        builder = builder.log_spans(file.logging.spans);

        builder.build()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Database and vault paths are not empty
    /// - At least one directory is configured, none of them empty
    /// - Delayed delete is off
    /// - Transfer concurrency is between 1 and 64
    /// - Inventory delay is at most thirty days
    pub fn validate(&self) -> Result<()> {
        if self.database_path.as_os_str().is_empty() {
            return Err(Error::Config("Database path cannot be empty".to_string()));
        }

        if self.vault_path.as_os_str().is_empty() {
            return Err(Error::Config("Vault path cannot be empty".to_string()));
        }

        if self.dirs_to_sync.is_empty() {
            return Err(Error::Config(
                "No directories to sync. Set dirs_to_sync to at least one directory.".to_string(),
            ));
        }

        if self.dirs_to_sync.iter().any(|d| d.as_os_str().is_empty()) {
            return Err(Error::Config(
                "dirs_to_sync contains an empty path".to_string(),
            ));
        }

        if self.use_delayed_delete {
            return Err(Error::Config(
                "use_delayed_delete is not supported. Set it to false; archives of deleted \
                 files are removed on the next sync."
                    .to_string(),
            ));
        }

        if self.max_concurrent_transfers == 0 {
            return Err(Error::Config(
                "max_concurrent_transfers must be at least 1".to_string(),
            ));
        }

        if self.max_concurrent_transfers > MAX_CONCURRENT_TRANSFERS {
            return Err(Error::Config(format!(
                "max_concurrent_transfers exceeds maximum of {}",
                MAX_CONCURRENT_TRANSFERS
            )));
        }

        if self.inventory_delay_secs > MAX_INVENTORY_DELAY_SECS {
            return Err(Error::Config(format!(
                "inventory_delay_secs exceeds maximum of {}",
                MAX_INVENTORY_DELAY_SECS
            )));
        }

        Ok(())
    }

    pub fn logging_config(&self) -> LoggingConfig {
        let logging = LoggingConfig::default()
            .with_level(self.log_level)
            .with_format(self.log_format)
            .with_spans(self.log_spans);

        match &self.log_filter {
            Some(filter) => logging.with_filter(filter.clone()),
            None => logging,
        }
    }
}

/// `<config path>.files`
fn auto_database_path(config_path: &Path) -> PathBuf {
    let mut name: OsString = config_path.as_os_str().to_owned();
    name.push(".files");
    PathBuf::from(name)
}

/// Builder for constructing [`GlacsyncConfig`] instances.
///
/// Call [`build()`](GlacsyncConfigBuilder::build) to validate and create
/// the final config.
#[derive(Default)]
pub struct GlacsyncConfigBuilder {
    database_path: Option<PathBuf>,
    dirs_to_sync: Vec<PathBuf>,
    vault_path: Option<PathBuf>,
    inventory_delay_secs: u64,
    use_delayed_delete: bool,
    max_concurrent_transfers: Option<usize>,
    dry_run: bool,
    log_level: Option<LogLevel>,
    log_format: Option<LogFormat>,
    log_filter: Option<String>,
    log_spans: bool,
}

impl GlacsyncConfigBuilder {
    pub fn database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.database_path = Some(path.into());
        self
    }

    /// Adds one directory to sync
    pub fn dir_to_sync<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.dirs_to_sync.push(path.into());
        self
    }

    /// Replaces the directories to sync
    pub fn dirs_to_sync<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.dirs_to_sync = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn vault_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.vault_path = Some(path.into());
        self
    }

    pub fn inventory_delay_secs(mut self, secs: u64) -> Self {
        self.inventory_delay_secs = secs;
        self
    }

    pub fn use_delayed_delete(mut self, enabled: bool) -> Self {
        self.use_delayed_delete = enabled;
        self
    }

    pub fn max_concurrent_transfers(mut self, n: usize) -> Self {
        self.max_concurrent_transfers = Some(n);
        self
    }

    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.log_level = Some(level);
        self
    }

    pub fn log_format(mut self, format: LogFormat) -> Self {
        self.log_format = Some(format);
        self
    }

    pub fn log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = Some(filter.into());
        self
    }

    pub fn log_spans(mut self, enabled: bool) -> Self {
        self.log_spans = enabled;
        self
    }

    /// Builds the final `GlacsyncConfig` instance.
    ///
    /// Returns an error if a required path is missing or any value fails
    /// [`GlacsyncConfig::validate`].
    pub fn build(self) -> Result<GlacsyncConfig> {
        let database_path = self.database_path.ok_or_else(|| {
            Error::Config("Database path is required. Use .database_path() to set it.".to_string())
        })?;

        let vault_path = self.vault_path.ok_or_else(|| {
            Error::Config("Vault path is required. Use .vault_path() to set it.".to_string())
        })?;

        let config = GlacsyncConfig {
            database_path,
            dirs_to_sync: self.dirs_to_sync,
            vault_path,
            inventory_delay_secs: self.inventory_delay_secs,
            use_delayed_delete: self.use_delayed_delete,
            max_concurrent_transfers: self.max_concurrent_transfers.unwrap_or(4),
            dry_run: self.dry_run,
            log_level: self.log_level.unwrap_or(LogLevel::Info),
            log_format: self.log_format.unwrap_or_default(),
            log_filter: self.log_filter,
            log_spans: self.log_spans,
        };

        config.validate()?;

        Ok(config)
    }
}

// ============================================================================
// File representation
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    general: GeneralSection,
    vault: VaultSection,
    #[serde(default)]
    sync: SyncSection,
    #[serde(default)]
    logging: LoggingSection,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct GeneralSection {
    db_file: String,
    dirs_to_sync: Vec<PathBuf>,
    #[serde(default)]
    use_delayed_delete: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct VaultSection {
    path: PathBuf,
    #[serde(default)]
    inventory_delay_secs: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SyncSection {
    max_concurrent_transfers: Option<usize>,
    #[serde(default)]
    dry_run: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LoggingSection {
    #[serde(default = "default_log_level")]
    level: LogLevel,
    format: Option<LogFormat>,
    filter: Option<String>,
    #[serde(default)]
    spans: bool,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: None,
            filter: None,
            spans: false,
        }
    }
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> GlacsyncConfigBuilder {
        GlacsyncConfig::builder()
            .database_path("/tmp/db.files")
            .dir_to_sync("/srv/share")
            .vault_path("/mnt/vault")
    }

    #[test]
    fn test_builder_defaults() {
        let config = minimal().build().unwrap();

        assert_eq!(config.max_concurrent_transfers, 4);
        assert!(!config.dry_run);
        assert!(!config.use_delayed_delete);
        assert_eq!(config.inventory_delay_secs, 0);
        assert_eq!(config.log_level, LogLevel::Info);
        assert_eq!(config.dirs_to_sync, vec![PathBuf::from("/srv/share")]);
    }

    #[test]
    fn test_builder_requires_database_path() {
        let err = GlacsyncConfig::builder()
            .dir_to_sync("/srv/share")
            .vault_path("/mnt/vault")
            .build()
            .unwrap_err();

        assert!(matches!(err, Error::Config(msg) if msg.contains("Database path")));
    }

    #[test]
    fn test_builder_requires_vault_path() {
        let err = GlacsyncConfig::builder()
            .database_path("/tmp/db.files")
            .dir_to_sync("/srv/share")
            .build()
            .unwrap_err();

        assert!(matches!(err, Error::Config(msg) if msg.contains("Vault path")));
    }

    #[test]
    fn test_validation_rejects_no_directories() {
        let err = GlacsyncConfig::builder()
            .database_path("/tmp/db.files")
            .vault_path("/mnt/vault")
            .build()
            .unwrap_err();

        assert!(matches!(err, Error::Config(msg) if msg.contains("No directories")));
    }

    #[test]
    fn test_validation_rejects_delayed_delete() {
        let err = minimal().use_delayed_delete(true).build().unwrap_err();

        assert!(matches!(err, Error::Config(msg) if msg.contains("use_delayed_delete")));
    }

    #[test]
    fn test_validation_rejects_zero_concurrency() {
        assert!(minimal().max_concurrent_transfers(0).build().is_err());
        assert!(minimal().max_concurrent_transfers(65).build().is_err());
        assert!(minimal().max_concurrent_transfers(64).build().is_ok());
    }

    #[test]
    fn test_validation_caps_inventory_delay() {
        assert!(minimal().inventory_delay_secs(4 * 60 * 60).build().is_ok());
        assert!(minimal().inventory_delay_secs(u64::MAX).build().is_err());
    }

    #[test]
    fn test_from_toml_with_auto_database() {
        let contents = r#"
            [general]
            db_file = "<auto>"
            dirs_to_sync = ["/srv/share", "/srv/photos"]
            use_delayed_delete = false

            [vault]
            path = "/mnt/vault"
        "#;

        let config = GlacsyncConfig::from_toml(contents, Path::new("/etc/glacsync/share.toml"))
            .unwrap();

        assert_eq!(
            config.database_path,
            PathBuf::from("/etc/glacsync/share.toml.files")
        );
        assert_eq!(config.dirs_to_sync.len(), 2);
        assert_eq!(config.vault_path, PathBuf::from("/mnt/vault"));
        assert_eq!(config.max_concurrent_transfers, 4);
    }

    #[test]
    fn test_from_toml_explicit_values() {
        let contents = r#"
            [general]
            db_file = "/var/lib/glacsync/db.files"
            dirs_to_sync = ["/srv/share"]

            [vault]
            path = "/mnt/vault"
            inventory_delay_secs = 14400

            [sync]
            max_concurrent_transfers = 8
            dry_run = true

            [logging]
            level = "debug"
            format = "json"
            filter = "warn,core_sync=trace"
            spans = true
        "#;

        let config = GlacsyncConfig::from_toml(contents, Path::new("share.toml")).unwrap();

        assert_eq!(config.database_path, PathBuf::from("/var/lib/glacsync/db.files"));
        assert_eq!(config.inventory_delay_secs, 14400);
        assert_eq!(config.max_concurrent_transfers, 8);
        assert!(config.dry_run);
        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.log_format, LogFormat::Json);

        let logging = config.logging_config();
        assert_eq!(logging.level, LogLevel::Debug);
        assert_eq!(logging.format, LogFormat::Json);
        assert_eq!(logging.filter.as_deref(), Some("warn,core_sync=trace"));
        assert!(logging.enable_spans);
    }

    #[test]
    fn test_from_toml_rejects_delayed_delete() {
        let contents = r#"
            [general]
            db_file = "<auto>"
            dirs_to_sync = ["/srv/share"]
            use_delayed_delete = true

            [vault]
            path = "/mnt/vault"
        "#;

        let err = GlacsyncConfig::from_toml(contents, Path::new("c.toml")).unwrap_err();

        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_from_toml_rejects_unknown_keys() {
        let contents = r#"
            [general]
            db_file = "<auto>"
            dirs_to_sync = ["/srv/share"]
            db_fil = "typo"

            [vault]
            path = "/mnt/vault"
        "#;

        assert!(GlacsyncConfig::from_toml(contents, Path::new("c.toml")).is_err());
    }

    #[test]
    fn test_from_toml_missing_section() {
        let contents = r#"
            [general]
            db_file = "<auto>"
            dirs_to_sync = ["/srv/share"]
        "#;

        let err = GlacsyncConfig::from_toml(contents, Path::new("c.toml")).unwrap_err();

        assert!(matches!(err, Error::Config(msg) if msg.contains("vault")));
    }
}
