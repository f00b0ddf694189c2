//! Aggregation engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tuning for the parent/child aggregation engine and its safety sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationConfig {
    /// Cron expression (with seconds) for the periodic reconciliation sweep.
    #[serde(default = "default_sweep_cron")]
    pub sweep_cron: String,
    /// How long an aggregatable notification may stay unlinked before the
    /// sweep forces a fresh pass for its owner.
    #[serde(default = "default_grace_period")]
    pub grace_period_seconds: u64,
    /// How many times a lost create race is retried as an update.
    #[serde(default = "default_max_conflict_retries")]
    pub max_conflict_retries: u32,
    /// Number of actors swept in parallel.
    #[serde(default = "default_sweep_concurrency")]
    pub sweep_concurrency: usize,
    /// Upper bound on waiting for an in-flight pass of the same actor.
    #[serde(default = "default_lock_wait")]
    pub lock_wait_seconds: u64,
}

impl AggregationConfig {
    /// Grace period as a std duration.
    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_seconds)
    }

    /// Lock wait bound as a std duration.
    pub fn lock_wait(&self) -> Duration {
        Duration::from_secs(self.lock_wait_seconds)
    }
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            sweep_cron: default_sweep_cron(),
            grace_period_seconds: default_grace_period(),
            max_conflict_retries: default_max_conflict_retries(),
            sweep_concurrency: default_sweep_concurrency(),
            lock_wait_seconds: default_lock_wait(),
        }
    }
}

fn default_sweep_cron() -> String {
    "0 */10 * * * *".to_string()
}

fn default_grace_period() -> u64 {
    300
}

fn default_max_conflict_retries() -> u32 {
    3
}

fn default_sweep_concurrency() -> usize {
    8
}

fn default_lock_wait() -> u64 {
    10
}
