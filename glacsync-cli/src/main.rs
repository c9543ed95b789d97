//! glacsync command-line entry point
//!
//! ```text
//! glacsync sync <config>        archive new and changed files, drop deleted ones
//! glacsync restoredb <config>   rebuild the metadata database from a vault inventory
//! ```
//!
//! Exit status is 0 on success, 1 on a fatal error and 2 when a sync finished
//! with per-file failures.

mod commands;

use anyhow::{Context, Result};
use bridge_traits::time::LogLevel;
use clap::{Parser, Subcommand, ValueEnum};
use core_runtime::logging::{init_logging, LogFormat};
use core_runtime::GlacsyncConfig;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(author, version, about = "Keep an archive vault in step with local directories", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log output format, overriding the config file
    #[arg(long, global = true, value_enum)]
    log_format: Option<FormatArg>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    /// tracing filter directives, e.g. "warn,core_sync=trace"
    #[arg(long, global = true)]
    log_filter: Option<String>,

    /// Print file names only in reports
    #[arg(long, global = true)]
    redact_paths: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Upload new and changed files, delete archives of removed files
    Sync {
        /// Path to the configuration file
        config: PathBuf,

        /// Show what would change without touching the vault or database
        #[arg(long)]
        dry_run: bool,
    },
    /// Request or collect a vault inventory and rebuild the database from it
    Restoredb {
        /// Path to the configuration file
        config: PathBuf,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FormatArg {
    Pretty,
    Json,
    Compact,
}

impl From<FormatArg> for LogFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Pretty => LogFormat::Pretty,
            FormatArg::Json => LogFormat::Json,
            FormatArg::Compact => LogFormat::Compact,
        }
    }
}

impl Cli {
    fn config_path(&self) -> &PathBuf {
        match &self.command {
            Commands::Sync { config, .. } | Commands::Restoredb { config } => config,
        }
    }

    /// Load the config file and fold command-line overrides into it
    fn load_config(&self) -> Result<GlacsyncConfig> {
        let path = self.config_path();
        let mut config = GlacsyncConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?;

        if let Some(format) = self.log_format {
            config.log_format = format.into();
        }
        if self.verbose {
            config.log_level = LogLevel::Debug;
        }
        if let Some(filter) = &self.log_filter {
            config.log_filter = Some(filter.clone());
        }
        if let Commands::Sync { dry_run: true, .. } = self.command {
            config.dry_run = true;
        }

        Ok(config)
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = cli.load_config()?;
    let logging = config
        .logging_config()
        .with_path_redaction(cli.redact_paths);

    init_logging(logging.clone()).context("Failed to initialize logging")?;
    tracing::debug!(config = %cli.config_path().display(), "Configuration loaded");

    let mut stdout = std::io::stdout().lock();
    match cli.command {
        Commands::Sync { .. } => commands::sync(&config, &logging, &mut stdout).await,
        Commands::Restoredb { .. } => commands::restore_db(&config, &mut stdout).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("share.toml");
        let contents = format!(
            "[general]\ndb_file = \"<auto>\"\ndirs_to_sync = [{:?}]\n\n[vault]\npath = {:?}\n",
            dir.path().join("files"),
            dir.path().join("vault"),
        );
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_parse_sync() {
        let cli = Cli::try_parse_from(["glacsync", "sync", "share.toml", "--dry-run"]).unwrap();

        assert!(matches!(
            cli.command,
            Commands::Sync { ref config, dry_run: true } if config == &PathBuf::from("share.toml")
        ));
    }

    #[test]
    fn test_parse_restoredb_with_global_flags() {
        let cli = Cli::try_parse_from([
            "glacsync",
            "--log-format",
            "json",
            "restoredb",
            "share.toml",
            "-v",
        ])
        .unwrap();

        assert!(matches!(cli.command, Commands::Restoredb { .. }));
        assert!(matches!(cli.log_format, Some(FormatArg::Json)));
        assert!(cli.verbose);
    }

    #[test]
    fn test_unknown_action_rejected() {
        assert!(Cli::try_parse_from(["glacsync", "restore", "share.toml"]).is_err());
        assert!(Cli::try_parse_from(["glacsync", "sync"]).is_err());
    }

    #[test]
    fn test_overrides_applied_to_config() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir);
        let path_arg = path.to_string_lossy().into_owned();

        let cli = Cli::try_parse_from([
            "glacsync",
            "sync",
            path_arg.as_str(),
            "--dry-run",
            "--verbose",
            "--log-format",
            "compact",
            "--log-filter",
            "core_sync=trace",
        ])
        .unwrap();
        let config = cli.load_config().unwrap();

        assert!(config.dry_run);
        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.log_format, LogFormat::Compact);
        assert_eq!(
            config.logging_config().filter.as_deref(),
            Some("core_sync=trace")
        );
        assert_eq!(config.database_path, dir.path().join("share.toml.files"));
    }

    #[test]
    fn test_missing_config_has_context() {
        let cli = Cli::try_parse_from(["glacsync", "sync", "/nonexistent/share.toml"]).unwrap();

        let err = cli.load_config().unwrap_err();

        assert!(format!("{:#}", err).contains("Failed to load config /nonexistent/share.toml"));
    }
}
