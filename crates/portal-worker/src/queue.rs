//! In-process task queue between producers (cron, listener) and the runner.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use portal_core::error::AppError;

/// A unit of background work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledTask {
    /// Task identifier, for logs.
    pub id: Uuid,
    /// Handler key, e.g. `"aggregation_sweep"`.
    pub job_type: String,
    /// Handler-specific payload.
    pub payload: serde_json::Value,
    /// Attempts already made.
    pub attempts: u32,
    /// Maximum attempts before giving up on transient failures.
    pub max_attempts: u32,
    /// When the task was enqueued.
    pub enqueued_at: DateTime<Utc>,
}

impl ScheduledTask {
    /// Create a task with a single attempt.
    pub fn new(job_type: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_type: job_type.into(),
            payload,
            attempts: 0,
            max_attempts: 1,
            enqueued_at: Utc::now(),
        }
    }

    /// Allow up to `max_attempts` attempts.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Whether another attempt is allowed after the current one failed.
    pub fn can_retry(&self) -> bool {
        self.attempts + 1 < self.max_attempts
    }
}

/// Sending half of the task queue.
#[derive(Debug, Clone)]
pub struct TaskQueue {
    tx: mpsc::Sender<ScheduledTask>,
}

impl TaskQueue {
    /// Create a queue holding at most `capacity` pending tasks.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<ScheduledTask>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Enqueue a task, waiting for room if the queue is full.
    pub async fn enqueue(&self, task: ScheduledTask) -> Result<(), AppError> {
        let id = task.id;
        let job_type = task.job_type.clone();
        self.tx
            .send(task)
            .await
            .map_err(|_| AppError::internal("Task queue is closed"))?;

        tracing::debug!(task_id = %id, job_type = %job_type, "Enqueued task");
        Ok(())
    }

    /// Enqueue a task without waiting; fails when the queue is full.
    pub fn try_enqueue(&self, task: ScheduledTask) -> Result<(), AppError> {
        self.tx.try_send(task).map_err(|e| match e {
            mpsc::error::TrySendError::Full(task) => AppError::internal(format!(
                "Task queue is full, dropping '{}' task",
                task.job_type
            )),
            mpsc::error::TrySendError::Closed(_) => AppError::internal("Task queue is closed"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_enqueue_and_receive() {
        let (queue, mut rx) = TaskQueue::new(2);
        queue
            .enqueue(ScheduledTask::new("slot_prune", serde_json::Value::Null))
            .await
            .expect("enqueue");

        let task = rx.recv().await.expect("task");
        assert_eq!(task.job_type, "slot_prune");
        assert!(!task.can_retry());
    }

    #[test]
    fn test_try_enqueue_full_queue() {
        let (queue, _rx) = TaskQueue::new(1);
        queue
            .try_enqueue(ScheduledTask::new("a", serde_json::Value::Null))
            .expect("first fits");
        assert!(
            queue
                .try_enqueue(ScheduledTask::new("b", serde_json::Value::Null))
                .is_err()
        );
    }

    #[test]
    fn test_can_retry_counts_attempts() {
        let mut task = ScheduledTask::new("aggregation_trigger", serde_json::Value::Null)
            .with_max_attempts(3);
        assert!(task.can_retry());
        task.attempts = 2;
        assert!(!task.can_retry());
    }
}
