//! Portal aggregation server
//!
//! Wires configuration, logging, the PostgreSQL store and the aggregation
//! engine together, then runs the change listener, the safety sweep and the
//! worker until a shutdown signal arrives.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, fmt};

use portal_aggregation::{AggregationCoordinator, AggregationEngine};
use portal_core::config::AppConfig;
use portal_core::error::AppError;
use portal_database::{DatabasePool, PgNotificationStore};
use portal_worker::jobs::{AggregationSweepHandler, AggregationTriggerHandler, SlotPruneHandler};
use portal_worker::{CronScheduler, JobExecutor, NotificationListener, TaskQueue, WorkerRunner};

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "Server error");
        std::process::exit(1);
    }
}

/// Load configuration from file and environment
fn load_configuration() -> Result<AppConfig, AppError> {
    let base = std::env::var("PORTAL_CONFIG").unwrap_or_else(|_| "config/default".to_string());
    let env = std::env::var("PORTAL_ENV").unwrap_or_else(|_| "development".to_string());

    AppConfig::load_from(&base, &env)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main server run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting portal aggregation v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Database connection + migrations ─────────────────
    let db_pool = DatabasePool::connect(&config.database).await?;
    portal_database::migration::run_migrations(db_pool.pool()).await?;

    // ── Step 2: Aggregation engine ───────────────────────────────
    let store = Arc::new(PgNotificationStore::new(db_pool.pool().clone()));
    let engine = Arc::new(AggregationEngine::new(store, &config.aggregation));
    let coordinator = Arc::new(AggregationCoordinator::new(engine, &config.aggregation));
    tracing::info!(
        sweep_cron = %config.aggregation.sweep_cron,
        grace_period_seconds = config.aggregation.grace_period_seconds,
        "Aggregation engine initialized"
    );

    if !config.worker.enabled {
        tracing::warn!("Background worker disabled; aggregation runs only on demand");
        shutdown_signal().await;
        db_pool.close().await;
        return Ok(());
    }

    // ── Step 3: Job executor ─────────────────────────────────────
    let mut executor = JobExecutor::new();
    executor.register(Arc::new(AggregationTriggerHandler::new(Arc::clone(
        &coordinator,
    ))));
    executor.register(Arc::new(AggregationSweepHandler::new(Arc::clone(
        &coordinator,
    ))));
    executor.register(Arc::new(SlotPruneHandler::new(Arc::clone(&coordinator))));
    let executor = Arc::new(executor);

    let (queue, receiver) = TaskQueue::new(config.worker.queue_capacity);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Step 4: Worker runner ────────────────────────────────────
    let worker_id = format!("worker-{}", &uuid::Uuid::new_v4().simple().to_string()[..8]);
    let runner = WorkerRunner::new(
        receiver,
        queue.clone(),
        executor,
        &config.worker,
        worker_id,
    );
    let worker_handle = tokio::spawn(runner.run(shutdown_rx.clone()));

    // ── Step 5: Cron scheduler ───────────────────────────────────
    let mut scheduler = CronScheduler::new(queue.clone()).await?;
    scheduler.register_default_tasks(&config.aggregation).await?;
    scheduler.start().await?;

    // ── Step 6: Change listener ──────────────────────────────────
    let listener_handle = if config.worker.listen_enabled {
        let listener = NotificationListener::new(db_pool.pool().clone(), queue);
        Some(tokio::spawn(listener.run(shutdown_rx.clone())))
    } else {
        tracing::info!("Notification listener disabled; relying on the safety sweep");
        None
    };

    tracing::info!("Portal aggregation server running");

    // ── Step 7: Graceful shutdown ────────────────────────────────
    shutdown_signal().await;
    tracing::info!("Shutdown signal received, starting graceful shutdown...");
    let _ = shutdown_tx.send(true);

    if let Err(e) = scheduler.shutdown().await {
        tracing::warn!(error = %e, "Scheduler shutdown failed");
    }
    if let Some(handle) = listener_handle {
        let _ = tokio::time::timeout(Duration::from_secs(10), handle).await;
    }
    let _ = tokio::time::timeout(Duration::from_secs(30), worker_handle).await;

    db_pool.close().await;
    tracing::info!("Portal aggregation server shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
