//! Reservation sync CLI - run the reconciliation job or inspect past runs.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use notify::Notifier;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use reservation_sync::{
    AssignmentService, FileStore, HttpAssignmentClient, HttpFeedClient, ReservationSync,
    SyncConfig, SyncLedger, SyncOptions, SyncStore,
};

/// Reconcile vacation-rental reservations into cleaning tasks.
#[derive(Parser)]
#[command(name = "reservation-sync")]
#[command(about = "Reservation-to-task reconciliation job")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true, env = "SYNC_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one reconciliation over the next 14 days (for CronJob use)
    Run {
        /// Work on an in-memory copy of the store; nothing is written or sent
        #[arg(long)]
        dry_run: bool,

        /// First day of the window (defaults to today, UTC)
        #[arg(long)]
        today: Option<NaiveDate>,
    },

    /// Show recent sync runs
    History {
        /// Number of runs to show
        #[arg(long, default_value = "10")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    let config = SyncConfig::from_env();

    match cli.command {
        Commands::Run { dry_run, today } => run(&config, dry_run, today).await,
        Commands::History { limit } => history(&config, limit).await,
    }
}

fn init_tracing(verbose: bool, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("reservation_sync=debug,notify=debug,info")
        } else {
            EnvFilter::new("reservation_sync=info,notify=info,warn")
        }
    });

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

async fn run(config: &SyncConfig, dry_run: bool, today: Option<NaiveDate>) -> Result<()> {
    let file_store = FileStore::open(&config.data_dir, &config.tenant_id)
        .await
        .with_context(|| format!("Failed to open store in {}", config.data_dir.display()))?;

    let feed = Arc::new(
        HttpFeedClient::new(config.feed.clone(), config.retry)
            .context("Failed to create feed client")?,
    );

    let (store, notifier, assignment) = if dry_run {
        warn!("Dry run: changes stay in memory and no notifications are sent");
        let copy = file_store
            .detached_copy()
            .await
            .context("Failed to read store for dry run")?;
        let store: Arc<dyn SyncStore> = Arc::new(copy);
        (store, Notifier::disabled(), None)
    } else {
        let store: Arc<dyn SyncStore> = Arc::new(file_store);
        (store, Notifier::from_env(), assignment_client(config)?)
    };

    let sync = ReservationSync::new(
        store,
        feed,
        Arc::new(notifier),
        assignment,
        SyncOptions::from(config),
    );

    let report = match today {
        Some(day) => sync.run_for(day).await,
        None => sync.run().await,
    }
    .context("Sync run failed")?;

    let run = &report.run;
    info!(run_id = %run.id, status = run.status.as_str(), "Done");

    println!(
        "Run {} {}: {} processed, {} created, {} updated, {} cancelled, {} duplicates removed",
        run.id,
        run.status.as_str(),
        run.counters.processed,
        run.counters.created,
        run.counters.updated,
        run.counters.cancelled,
        report.cleanup.removed.len(),
    );
    for message in &run.errors {
        println!("  - {message}");
    }

    Ok(())
}

fn assignment_client(config: &SyncConfig) -> Result<Option<Arc<dyn AssignmentService>>> {
    let Some(settings) = &config.assignment else {
        info!("ASSIGNMENT_URL not set, new tasks will not be auto-assigned");
        return Ok(None);
    };

    let client: Arc<dyn AssignmentService> = Arc::new(
        HttpAssignmentClient::new(settings.clone(), config.retry)
            .context("Failed to create assignment client")?,
    );
    Ok(Some(client))
}

async fn history(config: &SyncConfig, limit: usize) -> Result<()> {
    let store = Arc::new(
        FileStore::open(&config.data_dir, &config.tenant_id)
            .await
            .with_context(|| format!("Failed to open store in {}", config.data_dir.display()))?,
    );
    let ledger = SyncLedger::new(store, config.tenant_id.clone());

    let runs = ledger.recent(limit).await.context("Failed to read run history")?;
    if runs.is_empty() {
        println!("No sync runs recorded");
        return Ok(());
    }

    for run in runs {
        let completed = run
            .completed_at
            .map_or_else(|| "-".to_string(), |t| t.format("%Y-%m-%d %H:%M:%S").to_string());
        println!(
            "{}  {:<9}  started {}  completed {}  window {}..{}  processed {} created {} updated {} cancelled {} errors {}",
            run.id,
            run.status.as_str(),
            run.started_at.format("%Y-%m-%d %H:%M:%S"),
            completed,
            run.window.start,
            run.window.end,
            run.counters.processed,
            run.counters.created,
            run.counters.updated,
            run.counters.cancelled,
            run.errors.len(),
        );
    }

    Ok(())
}
