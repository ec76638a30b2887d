//! FieldMark command-line interface.
//!
//! Hosts the sync engine outside a mobile shell: a foreground scheduler loop
//! for development, a one-shot budgeted cycle for headless/cron activation,
//! and read-only inspection of the persisted state.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use url::Url;

use fieldmark_location::FileFixProvider;
use fieldmark_report::{HttpReporter, StaticCredential};
use fieldmark_sync::{
    run_headless, BackgroundScheduler, CycleOutcome, FileStateStore, StateStore, SyncConfig,
    SyncEngine, TaskStatus,
};

#[derive(Parser)]
#[command(name = "fieldmark", version, about = "FieldMark attendance sync")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "fieldmark.json")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the foreground scheduler until interrupted
    Run,
    /// Run exactly one budgeted cycle, as a headless activation would
    Cycle {
        /// Task id assigned by the host scheduler
        #[arg(long, default_value = "cli")]
        task_id: String,
    },
    /// Trigger one cycle immediately, without the background budget
    SyncNow,
    /// Show the persisted sync state
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    let config = SyncConfig::load(&cli.config)
        .with_context(|| format!("Loading config from {}", cli.config.display()))?;

    match cli.command {
        Command::Run => run_scheduler(config).await,
        Command::Cycle { task_id } => run_cycle(config, &task_id).await,
        Command::SyncNow => sync_now(config).await,
        Command::Status => show_status(config).await,
    }
}

fn build_engine(config: &SyncConfig) -> Result<SyncEngine> {
    let employee = config.employee_code().context("Invalid employee code")?;
    let endpoint =
        Url::parse(&config.attendance_endpoint).context("Invalid attendance endpoint")?;

    let provider = Arc::new(FileFixProvider::new(
        config.paths.fix_path(),
        config.engine.fix_max_age_secs as i64,
    ));
    let credentials = Arc::new(StaticCredential::new(config.auth_token.clone()));
    let reporter = Arc::new(HttpReporter::new(
        endpoint,
        credentials,
        Duration::from_secs(config.engine.submit_timeout_secs),
    )?);
    let store = Arc::new(FileStateStore::new(
        config.paths.state_path(),
        employee.clone(),
    ));

    Ok(SyncEngine::new(
        provider,
        reporter,
        store,
        config.regions.clone(),
        employee,
        config.paths.lock_path(),
        config.evaluator,
        config.engine.to_engine_config(),
    ))
}

/// Foreground scheduler loop, stopped with Ctrl-C.
async fn run_scheduler(config: SyncConfig) -> Result<()> {
    let engine = Arc::new(build_engine(&config)?);
    let (scheduler, handle) = BackgroundScheduler::new(config.scheduler.to_scheduler_config());

    let loop_task = tokio::spawn(handle.run(move || {
        let engine = engine.clone();
        async move { engine.run_cycle().await }
    }));

    tokio::signal::ctrl_c()
        .await
        .context("Waiting for shutdown signal")?;
    info!("Shutting down");
    scheduler.shutdown().await;
    loop_task.await.context("Scheduler loop panicked")?;
    Ok(())
}

/// One budgeted cycle, exiting non-zero when the task fails.
async fn run_cycle(config: SyncConfig, task_id: &str) -> Result<()> {
    let engine = build_engine(&config)?;
    let budget = Duration::from_secs(config.scheduler.cycle_budget_secs);

    let completion = run_headless(task_id, budget, || engine.run_cycle()).await;
    println!(
        "task {} finished: {:?} in {}ms",
        completion.task_id,
        completion.status,
        completion.duration.as_millis()
    );

    if completion.status == TaskStatus::Failure {
        bail!("Cycle failed");
    }
    Ok(())
}

/// One unbudgeted cycle, for operator-initiated sync.
async fn sync_now(config: SyncConfig) -> Result<()> {
    let engine = build_engine(&config)?;
    match engine.run_cycle().await? {
        CycleOutcome::Skipped => {
            println!("skipped: another cycle is already in flight");
        }
        CycleOutcome::Completed(report) => {
            println!(
                "completed: {} region(s) evaluated, {} submitted, {} deferred",
                report.regions_evaluated, report.events_submitted, report.events_deferred
            );
            if let Some(failure) = report.failure {
                println!("last failure: {}", failure);
            }
        }
    }
    Ok(())
}

/// Print the persisted state without mutating it.
async fn show_status(config: SyncConfig) -> Result<()> {
    let employee = config.employee_code().context("Invalid employee code")?;
    let store = FileStateStore::new(config.paths.state_path(), employee);
    let state = store.load().await.context("Reading sync state")?;

    println!("employee:   {}", state.employee_code);
    println!("updated at: {}", state.updated_at.to_rfc3339());
    match state.last_failure {
        Some(failure) => println!("last error: {}", failure),
        None => println!("last error: none"),
    }
    match &state.last_fix {
        Some(fix) => println!(
            "last fix:   {} (±{:.0}m at {})",
            fix.coordinate,
            fix.accuracy_m,
            fix.timestamp.to_rfc3339()
        ),
        None => println!("last fix:   none"),
    }

    let mut entries: Vec<_> = state.entries().collect();
    entries.sort_by(|a, b| a.region_id.as_str().cmp(b.region_id.as_str()));
    for entry in entries {
        println!(
            "region {}: {:?}, last key {}, pending {}, retries {}",
            entry.region_id,
            entry.status,
            entry.last_submitted_key.as_deref().unwrap_or("-"),
            if entry.has_pending() { "yes" } else { "no" },
            entry.retry_count
        );
    }
    Ok(())
}
