//! Tender-Harvest main entry point
//!
//! This is the command-line interface for the Tender-Harvest procurement
//! harvester.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tender_harvest::config::{load_config_with_hash, Config};
use tender_harvest::reconcile::reconcile;
use tender_harvest::schedule::run_daily;
use tender_harvest::storage::open_store;
use tender_harvest::{harvest, HarvestError, Shutdown};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Tender-Harvest: an incremental procurement-listing harvester
///
/// Tender-Harvest walks the procedure listings of a procurement site,
/// downloads the documents of every procedure it has not seen yet and
/// appends one row per procedure to a CSV table.
#[derive(Parser, Debug)]
#[command(name = "tender-harvest")]
#[command(version = "1.0.0")]
#[command(about = "An incremental procurement-listing harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one harvest pass over all sections
    Run,

    /// Harvest now, then every day at the configured time
    Schedule,

    /// Compare table rows with procedure folders
    Reconcile,

    /// Validate the configuration and show what would be harvested
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;

    setup_logging(cli.verbose, cli.quiet, Path::new(&config.logging.file))?;
    tracing::info!(
        "Configuration loaded from {} (hash: {})",
        cli.config.display(),
        config_hash
    );

    match cli.command {
        Command::Run => handle_run(config).await,
        Command::Schedule => handle_schedule(config).await,
        Command::Reconcile => handle_reconcile(&config).await,
        Command::Check => handle_check(&config),
    }
}

/// Sets up the tracing subscriber: console plus an appending log file
fn setup_logging(verbose: u8, quiet: bool, log_file: &Path) -> anyhow::Result<()> {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("tender_harvest=info,warn"),
            1 => EnvFilter::new("tender_harvest=debug,info"),
            2 => EnvFilter::new("tender_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    if let Some(parent) = log_file.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log folder {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .with_context(|| format!("Failed to open log file {}", log_file.display()))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .init();

    Ok(())
}

/// Handles the `run` command
async fn handle_run(config: Config) -> anyhow::Result<()> {
    tracing::info!(
        "Starting harvest of {} sections from {}",
        config.site.sections.len(),
        config.site.base_url
    );

    let shutdown = Shutdown::new();
    shutdown.listen_for_ctrl_c();

    match harvest(config, shutdown).await {
        Ok(reports) => {
            let appended: usize = reports.iter().map(|r| r.appended).sum();
            let documents: usize = reports.iter().map(|r| r.documents).sum();
            tracing::info!(
                "Harvest completed: {} rows appended, {} documents downloaded",
                appended,
                documents
            );
            Ok(())
        }
        Err(HarvestError::Interrupted) => {
            tracing::warn!("Harvest interrupted; stored rows are complete");
            Err(HarvestError::Interrupted.into())
        }
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            Err(e.into())
        }
    }
}

/// Handles the `schedule` command
async fn handle_schedule(config: Config) -> anyhow::Result<()> {
    tracing::info!("Scheduling daily harvest at {}", config.schedule.daily_at);

    let shutdown = Shutdown::new();
    shutdown.listen_for_ctrl_c();

    run_daily(config, shutdown).await.map_err(|e| {
        tracing::error!("Scheduled harvest failed: {}", e);
        anyhow::Error::from(e)
    })
}

/// Handles the `reconcile` command
async fn handle_reconcile(config: &Config) -> anyhow::Result<()> {
    let store = open_store(&config.output, Shutdown::new());
    let report = reconcile(&store, Path::new(&config.output.procedures_dir))
        .await
        .context("Reconciliation failed")?;

    println!("=== Tender-Harvest Reconcile ===\n");
    println!("Table: {}", config.output.table_path().display());
    println!("Folders: {}\n", config.output.procedures_dir);

    println!(
        "Folders without rows ({}):",
        report.folders_without_rows.len()
    );
    for name in &report.folders_without_rows {
        println!("  - {}", name);
    }

    println!(
        "\nRows without folders ({}):",
        report.rows_without_folders.len()
    );
    for id in &report.rows_without_folders {
        println!("  - {}", id);
    }

    if report.is_consistent() {
        println!("\n✓ Table and folders match");
    }

    Ok(())
}

/// Handles the `check` command: validates config and shows what would be harvested
fn handle_check(config: &Config) -> anyhow::Result<()> {
    println!("=== Tender-Harvest Check ===\n");

    println!("Site: {}", config.site.base_url);
    println!("  Page size: {}", config.site.page_size);
    println!("  Sort: {}", config.site.sort);
    println!("  Headers: {}", config.site.headers.len());

    println!("\nSections ({}):", config.site.sections.len());
    for section in &config.site.sections {
        println!("  - {}", config.site.section_url(section));
    }

    println!("\nRetry:");
    println!(
        "  Pages: {} attempts, {}-{}s between attempts",
        config.retry.max_attempts, config.retry.sleep_min_secs, config.retry.sleep_max_secs
    );
    println!(
        "  Every {} failures: {}-{}s",
        config.retry.long_sleep_every,
        config.retry.long_sleep_min_secs,
        config.retry.long_sleep_max_secs
    );
    println!(
        "  Documents: {} attempts, {} at a time",
        config.retry.download_max_attempts, config.http.max_concurrent_downloads
    );

    println!("\nOutput:");
    println!("  Procedures: {}", config.output.procedures_dir);
    println!("  Table: {}", config.output.table_path().display());
    println!("  Log: {}", config.logging.file);
    println!("  Daily at: {}", config.schedule.daily_at);

    println!("\n✓ Configuration is valid");

    Ok(())
}
