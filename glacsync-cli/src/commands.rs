//! Action implementations behind the `sync` and `restoredb` subcommands

use anyhow::{Context, Result};
use bridge_desktop::{LocalVaultStore, TokioDirectorySource};
use core_runtime::logging::LoggingConfig;
use core_runtime::GlacsyncConfig;
use core_sync::{
    MetadataStore, RestoreCoordinator, RestoreOutcome, SyncConfig, SyncCoordinator, SyncReport,
};
use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

const PARTIAL_FAILURE: u8 = 2;

async fn open_store(config: &GlacsyncConfig) -> Result<Arc<Mutex<MetadataStore>>> {
    let store = MetadataStore::open(&config.database_path)
        .await
        .with_context(|| {
            format!(
                "Failed to open metadata database {}",
                config.database_path.display()
            )
        })?;
    Ok(Arc::new(Mutex::new(store)))
}

fn open_vault(config: &GlacsyncConfig) -> LocalVaultStore {
    // validate() caps the delay well inside chrono's range
    let delay = chrono::Duration::seconds(config.inventory_delay_secs as i64);
    LocalVaultStore::new(&config.vault_path).with_inventory_delay(delay)
}

/// Run one sync pass and print its report
pub async fn sync(
    config: &GlacsyncConfig,
    logging: &LoggingConfig,
    out: &mut impl Write,
) -> Result<ExitCode> {
    let store = open_store(config).await?;
    let coordinator = SyncCoordinator::new(
        SyncConfig {
            max_concurrent_transfers: config.max_concurrent_transfers,
            dry_run: config.dry_run,
        },
        Arc::new(TokioDirectorySource::new(config.dirs_to_sync.clone())),
        Arc::new(open_vault(config)),
        store,
    );

    let report = coordinator.sync().await.context("Sync aborted")?;
    print_report(&report, logging, out)?;

    if report.is_partial_failure() {
        Ok(ExitCode::from(PARTIAL_FAILURE))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

/// Advance the database restore by one step
pub async fn restore_db(config: &GlacsyncConfig, out: &mut impl Write) -> Result<ExitCode> {
    let store = open_store(config).await?;
    let coordinator = RestoreCoordinator::new(Arc::new(open_vault(config)), store);

    match coordinator.restore_db().await.context("Restore failed")? {
        RestoreOutcome::Requested(job) => writeln!(
            out,
            "Requested inventory job {}. Run restoredb again once it completes.",
            job.uuid
        )?,
        RestoreOutcome::NotReady(job) => writeln!(
            out,
            "Inventory job {} is still in progress. Try again later.",
            job.uuid
        )?,
        RestoreOutcome::Restored { archives } => {
            info!(archives, "Metadata database rebuilt");
            writeln!(out, "Restored {} archives into the metadata database.", archives)?
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn print_report(report: &SyncReport, logging: &LoggingConfig, out: &mut impl Write) -> Result<()> {
    let verb = if report.dry_run { "Would" } else { "Did" };

    for path in &report.uploaded {
        writeln!(out, "upload   {}", logging.display_path(path))?;
    }
    for path in &report.modified {
        writeln!(out, "replace  {}", logging.display_path(path))?;
    }
    for path in &report.deleted {
        writeln!(out, "delete   {}", logging.display_path(path))?;
    }
    for archive_id in &report.superseded {
        writeln!(out, "drop     archive {}", archive_id)?;
    }
    for path in &report.unreadable {
        let path = path.to_string_lossy();
        writeln!(out, "skipped  {} (unreadable)", logging.display_path(&path))?;
    }
    for failure in &report.failures {
        writeln!(
            out,
            "FAILED   {}: {}",
            logging.display_path(&failure.path),
            failure.error
        )?;
    }

    writeln!(
        out,
        "{} upload {}, replace {}, delete {}, drop {} superseded; {} failed, {} unreadable",
        verb,
        report.uploaded.len(),
        report.modified.len(),
        report.deleted.len(),
        report.superseded.len(),
        report.failures.len(),
        report.unreadable.len(),
    )?;
    Ok(())
}
