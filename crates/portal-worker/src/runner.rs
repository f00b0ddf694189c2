//! Worker runner: the main loop draining the task queue.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Semaphore, mpsc, watch};

use portal_core::config::WorkerConfig;

use crate::executor::{JobExecutionError, JobExecutor};
use crate::queue::{ScheduledTask, TaskQueue};

/// How long shutdown waits for in-flight tasks.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Main worker runner that receives queued tasks and executes them
#[derive(Debug)]
pub struct WorkerRunner {
    /// Receiving half of the task queue
    receiver: mpsc::Receiver<ScheduledTask>,
    /// Sending half, for re-enqueuing transient failures
    queue: TaskQueue,
    /// Job executor for dispatching
    executor: Arc<JobExecutor>,
    /// Maximum concurrently executing tasks
    concurrency: usize,
    /// Worker identifier
    worker_id: String,
}

impl WorkerRunner {
    /// Create a new worker runner
    pub fn new(
        receiver: mpsc::Receiver<ScheduledTask>,
        queue: TaskQueue,
        executor: Arc<JobExecutor>,
        config: &WorkerConfig,
        worker_id: impl Into<String>,
    ) -> Self {
        Self {
            receiver,
            queue,
            executor,
            concurrency: config.concurrency.max(1),
            worker_id: worker_id.into(),
        }
    }

    /// Start the worker runner; runs until the cancel signal is received
    pub async fn run(mut self, mut cancel: watch::Receiver<bool>) {
        tracing::info!(
            worker_id = %self.worker_id,
            concurrency = self.concurrency,
            job_types = ?self.executor.registered_types(),
            "Worker started"
        );

        let semaphore = Arc::new(Semaphore::new(self.concurrency));

        loop {
            tokio::select! {
                _ = cancel.changed() => {
                    if *cancel.borrow() {
                        tracing::info!(worker_id = %self.worker_id, "Worker received shutdown signal");
                        break;
                    }
                }
                task = self.receiver.recv() => {
                    let Some(task) = task else {
                        tracing::info!(worker_id = %self.worker_id, "Task queue closed");
                        break;
                    };
                    let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                        break;
                    };
                    let executor = Arc::clone(&self.executor);
                    let queue = self.queue.clone();
                    tokio::spawn(async move {
                        let _permit = permit;
                        process(&executor, &queue, task).await;
                    });
                }
            }
        }

        tracing::info!(worker_id = %self.worker_id, "Waiting for in-flight tasks to complete");

        let max_permits = u32::try_from(self.concurrency).unwrap_or(u32::MAX);
        if tokio::time::timeout(DRAIN_TIMEOUT, semaphore.acquire_many(max_permits))
            .await
            .is_err()
        {
            tracing::warn!(worker_id = %self.worker_id, "In-flight tasks did not finish in time");
        }

        tracing::info!(worker_id = %self.worker_id, "Worker shut down complete");
    }
}

/// Execute one task and apply the retry policy to its outcome.
async fn process(executor: &JobExecutor, queue: &TaskQueue, mut task: ScheduledTask) {
    match executor.execute(&task).await {
        Ok(result) => {
            tracing::debug!(
                task_id = %task.id,
                job_type = %task.job_type,
                result = ?result,
                "Task completed"
            );
        }
        Err(JobExecutionError::Transient(msg)) => {
            if task.can_retry() {
                tracing::warn!(task_id = %task.id, job_type = %task.job_type, error = %msg, "Task failed, retrying");
                task.attempts += 1;
                if let Err(e) = queue.try_enqueue(task) {
                    tracing::error!(error = %e, "Failed to re-enqueue task");
                }
            } else {
                tracing::error!(task_id = %task.id, job_type = %task.job_type, error = %msg, "Task failed after final attempt");
            }
        }
        Err(JobExecutionError::Permanent(msg)) => {
            tracing::error!(task_id = %task.id, job_type = %task.job_type, error = %msg, "Task failed permanently");
        }
        Err(JobExecutionError::Internal(err)) => {
            tracing::error!(task_id = %task.id, job_type = %task.job_type, error = %err, "Task internal error");
        }
    }
}
