//! Cron scheduler for the periodic reconciliation sweep.

use tokio_cron_scheduler::{Job as CronJob, JobScheduler};

use portal_core::config::AggregationConfig;
use portal_core::error::AppError;

use crate::jobs::{AGGREGATION_SWEEP, SLOT_PRUNE};
use crate::queue::{ScheduledTask, TaskQueue};

/// Hourly schedule of coordinator slot pruning.
const SLOT_PRUNE_CRON: &str = "0 30 * * * *";

/// Cron-based scheduler for periodic background tasks
pub struct CronScheduler {
    /// The underlying job scheduler
    scheduler: JobScheduler,
    /// Task queue for enqueuing scheduled work
    queue: TaskQueue,
}

impl std::fmt::Debug for CronScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CronScheduler").finish()
    }
}

impl CronScheduler {
    /// Create a new cron scheduler
    pub async fn new(queue: TaskQueue) -> Result<Self, AppError> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::internal(format!("Failed to create scheduler: {e}")))?;

        Ok(Self { scheduler, queue })
    }

    /// Register all default scheduled tasks
    pub async fn register_default_tasks(&self, config: &AggregationConfig) -> Result<(), AppError> {
        self.register(
            AGGREGATION_SWEEP,
            &config.sweep_cron,
            || ScheduledTask::new(AGGREGATION_SWEEP, serde_json::json!({})).with_max_attempts(2),
        )
        .await?;
        self.register(SLOT_PRUNE, SLOT_PRUNE_CRON, || {
            ScheduledTask::new(SLOT_PRUNE, serde_json::Value::Null)
        })
        .await?;

        tracing::info!("All scheduled tasks registered");
        Ok(())
    }

    /// Start the scheduler
    pub async fn start(&self) -> Result<(), AppError> {
        self.scheduler
            .start()
            .await
            .map_err(|e| AppError::internal(format!("Failed to start scheduler: {e}")))?;

        tracing::info!("Cron scheduler started");
        Ok(())
    }

    /// Shutdown the scheduler
    pub async fn shutdown(&mut self) -> Result<(), AppError> {
        self.scheduler
            .shutdown()
            .await
            .map_err(|e| AppError::internal(format!("Failed to shutdown scheduler: {e}")))?;

        tracing::info!("Cron scheduler shut down");
        Ok(())
    }

    /// Enqueue the task built by `make_task` on every tick of `schedule`.
    async fn register<F>(&self, name: &str, schedule: &str, make_task: F) -> Result<(), AppError>
    where
        F: Fn() -> ScheduledTask + Send + Sync + 'static,
    {
        let queue = self.queue.clone();
        let job_name = name.to_string();
        let job = CronJob::new_async(schedule, move |_uuid, _lock| {
            let queue = queue.clone();
            let task = make_task();
            let job_name = job_name.clone();
            Box::pin(async move {
                tracing::debug!(job_type = %job_name, "Scheduling task");
                if let Err(e) = queue.enqueue(task).await {
                    tracing::error!(job_type = %job_name, error = %e, "Failed to enqueue task");
                }
            })
        })
        .map_err(|e| AppError::internal(format!("Failed to create {name} schedule: {e}")))?;

        self.scheduler
            .add(job)
            .await
            .map_err(|e| AppError::internal(format!("Failed to add {name} schedule: {e}")))?;

        tracing::info!(job_type = %name, schedule = %schedule, "Registered scheduled task");
        Ok(())
    }
}
