//! Coordinator housekeeping.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use portal_aggregation::AggregationCoordinator;

use super::SLOT_PRUNE;
use crate::executor::{JobExecutionError, JobHandler};
use crate::queue::ScheduledTask;

/// Drops per-owner coordinator slots with nothing in flight.
#[derive(Debug)]
pub struct SlotPruneHandler {
    coordinator: Arc<AggregationCoordinator>,
}

impl SlotPruneHandler {
    /// Create a new slot prune handler
    pub fn new(coordinator: Arc<AggregationCoordinator>) -> Self {
        Self { coordinator }
    }
}

#[async_trait]
impl JobHandler for SlotPruneHandler {
    fn job_type(&self) -> &str {
        SLOT_PRUNE
    }

    async fn execute(&self, _task: &ScheduledTask) -> Result<Option<Value>, JobExecutionError> {
        let pruned = self.coordinator.prune_idle_slots();
        Ok(Some(serde_json::json!({
            "task": SLOT_PRUNE,
            "pruned": pruned,
            "remaining": self.coordinator.slot_count(),
        })))
    }
}
