//! Background worker configuration.

use serde::{Deserialize, Serialize};

/// Background worker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Whether the worker (cron sweep + listener) is enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Whether to listen for store change events via PostgreSQL NOTIFY.
    #[serde(default = "default_true")]
    pub listen_enabled: bool,
    /// Number of concurrently processed trigger events.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Capacity of the in-process task queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen_enabled: true,
            concurrency: default_concurrency(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_concurrency() -> usize {
    4
}

fn default_queue_capacity() -> usize {
    1024
}
