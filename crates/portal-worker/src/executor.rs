//! Job executor: dispatches tasks to registered handlers.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use portal_core::error::AppError;

use crate::queue::ScheduledTask;

/// Trait for job handler implementations
#[async_trait]
pub trait JobHandler: Send + Sync + std::fmt::Debug {
    /// Get the job type this handler processes
    fn job_type(&self) -> &str;

    /// Execute the task, returning an optional result summary
    async fn execute(&self, task: &ScheduledTask) -> Result<Option<Value>, JobExecutionError>;
}

/// Error from job execution
#[derive(Debug, thiserror::Error)]
pub enum JobExecutionError {
    /// Permanent failure, not retried
    #[error("Permanent job failure: {0}")]
    Permanent(String),

    /// Transient failure, may be retried
    #[error("Transient job failure: {0}")]
    Transient(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] AppError),
}

/// Dispatches tasks to the appropriate handler based on job_type
#[derive(Debug, Default)]
pub struct JobExecutor {
    /// Registered job handlers by type
    handlers: HashMap<String, Arc<dyn JobHandler>>,
}

impl JobExecutor {
    /// Create a new job executor
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job handler
    pub fn register(&mut self, handler: Arc<dyn JobHandler>) {
        let job_type = handler.job_type().to_string();
        tracing::info!(job_type = %job_type, "Registered job handler");
        self.handlers.insert(job_type, handler);
    }

    /// Execute a task by dispatching to the correct handler
    pub async fn execute(&self, task: &ScheduledTask) -> Result<Option<Value>, JobExecutionError> {
        let handler = self.handlers.get(&task.job_type).ok_or_else(|| {
            JobExecutionError::Permanent(format!(
                "No handler registered for job type '{}'",
                task.job_type
            ))
        })?;

        tracing::debug!(
            task_id = %task.id,
            job_type = %task.job_type,
            attempt = task.attempts + 1,
            max_attempts = task.max_attempts,
            "Executing task"
        );

        handler.execute(task).await
    }

    /// Check if a handler is registered for a job type
    pub fn has_handler(&self, job_type: &str) -> bool {
        self.handlers.contains_key(job_type)
    }

    /// Get the list of registered job types
    pub fn registered_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.handlers.keys().cloned().collect();
        types.sort();
        types
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct EchoHandler;

    #[async_trait]
    impl JobHandler for EchoHandler {
        fn job_type(&self) -> &str {
            "echo"
        }

        async fn execute(&self, task: &ScheduledTask) -> Result<Option<Value>, JobExecutionError> {
            Ok(Some(task.payload.clone()))
        }
    }

    #[tokio::test]
    async fn test_dispatch_by_job_type() {
        let mut executor = JobExecutor::new();
        executor.register(Arc::new(EchoHandler));
        assert!(executor.has_handler("echo"));

        let task = ScheduledTask::new("echo", serde_json::json!({"n": 1}));
        let result = executor.execute(&task).await.expect("execute");
        assert_eq!(result, Some(serde_json::json!({"n": 1})));
    }

    #[tokio::test]
    async fn test_unknown_job_type_is_permanent() {
        let executor = JobExecutor::new();
        let task = ScheduledTask::new("missing", Value::Null);
        let err = executor.execute(&task).await.expect_err("no handler");
        assert!(matches!(err, JobExecutionError::Permanent(_)));
    }
}
