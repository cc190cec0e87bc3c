//! convoy scheduler
//!
//! Holds cluster state in memory, evaluates every job on an interval, and
//! applies the resulting plans.

use std::sync::Arc;

use anyhow::Result;
use convoy_scheduler::{
    config,
    scheduler::{InMemoryApplier, SchedulerWorker, WorkerConfig},
    state::{self, StateStore},
};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = config::Config::from_env()?;

    // Initialize tracing (prefer RUST_LOG, fallback to CONVOY_LOG_LEVEL)
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting convoy scheduler");
    info!(
        eval_interval_secs = config.eval_interval.as_secs(),
        max_concurrent_evals = config.max_concurrent_evals,
        "Configuration loaded"
    );

    // Seed state
    let store = StateStore::new();
    if let Some(path) = &config.snapshot_path {
        match state::read_snapshot(path) {
            Ok(snapshot) => {
                store.load(snapshot).await;
            }
            Err(e) => {
                error!(error = %e, path = %path.display(), "Failed to load snapshot");
                return Err(e.into());
            }
        }
    }

    // Create shutdown channel for graceful shutdown
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Start scheduler worker in background
    let applier = Arc::new(InMemoryApplier::new(store.clone()));
    let scheduler_worker = SchedulerWorker::new(store, applier, WorkerConfig::from(&config));
    let scheduler_handle = tokio::spawn(async move {
        scheduler_worker.run(shutdown_rx).await;
    });

    // Wait for shutdown signal (Ctrl+C)
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Received shutdown signal");

    // Signal shutdown to the worker
    let _ = shutdown_tx.send(true);

    info!("Waiting for worker to shut down...");
    if let Err(e) = tokio::time::timeout(config.shutdown_timeout, scheduler_handle).await {
        warn!(error = %e, "Scheduler worker did not shut down in time");
    }

    info!("Scheduler shutdown complete");
    Ok(())
}
