//! Aggregation trigger and reconciliation sweep handlers.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use portal_aggregation::{AggregationCoordinator, TriggerOutcome, TriggerReason};
use portal_core::error::{AppError, ErrorKind};
use portal_core::types::ActorId;
use portal_entity::{ActorType, Owner};

use super::{AGGREGATION_SWEEP, AGGREGATION_TRIGGER};
use crate::executor::{JobExecutionError, JobHandler};
use crate::queue::ScheduledTask;

/// Payload of an `aggregation_trigger` task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerPayload {
    /// Owning actor.
    pub actor_id: ActorId,
    /// Owning actor's type.
    pub actor_type: ActorType,
    /// Why the pass is requested.
    pub reason: TriggerReason,
}

impl TriggerPayload {
    /// The owner to aggregate.
    pub fn owner(&self) -> Owner {
        Owner::new(self.actor_id, self.actor_type)
    }
}

/// Payload of an `aggregation_sweep` task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepPayload {
    /// Restrict the sweep to one actor type.
    #[serde(default)]
    pub actor_type: Option<ActorType>,
}

/// Store and lock errors are worth another attempt; the rest are not.
fn classify(err: AppError) -> JobExecutionError {
    match err.kind {
        ErrorKind::Database | ErrorKind::Timeout | ErrorKind::Conflict => {
            JobExecutionError::Transient(err.to_string())
        }
        _ => JobExecutionError::Internal(err),
    }
}

/// Runs a pass for the owner named in the task payload.
#[derive(Debug)]
pub struct AggregationTriggerHandler {
    coordinator: Arc<AggregationCoordinator>,
}

impl AggregationTriggerHandler {
    /// Create a new trigger handler
    pub fn new(coordinator: Arc<AggregationCoordinator>) -> Self {
        Self { coordinator }
    }
}

#[async_trait]
impl JobHandler for AggregationTriggerHandler {
    fn job_type(&self) -> &str {
        AGGREGATION_TRIGGER
    }

    async fn execute(&self, task: &ScheduledTask) -> Result<Option<Value>, JobExecutionError> {
        let payload: TriggerPayload = serde_json::from_value(task.payload.clone())
            .map_err(|e| JobExecutionError::Permanent(format!("Invalid trigger payload: {e}")))?;

        let outcome = self
            .coordinator
            .trigger(payload.owner(), payload.reason)
            .await
            .map_err(classify)?;

        match outcome {
            TriggerOutcome::Ran(report) => {
                let value = serde_json::to_value(report).map_err(AppError::from)?;
                Ok(Some(value))
            }
            TriggerOutcome::Coalesced => Ok(None),
        }
    }
}

/// Sweeps every owner for orphaned parents and unlinked notifications.
#[derive(Debug)]
pub struct AggregationSweepHandler {
    coordinator: Arc<AggregationCoordinator>,
}

impl AggregationSweepHandler {
    /// Create a new sweep handler
    pub fn new(coordinator: Arc<AggregationCoordinator>) -> Self {
        Self { coordinator }
    }
}

#[async_trait]
impl JobHandler for AggregationSweepHandler {
    fn job_type(&self) -> &str {
        AGGREGATION_SWEEP
    }

    async fn execute(&self, task: &ScheduledTask) -> Result<Option<Value>, JobExecutionError> {
        let payload: SweepPayload = if task.payload.is_null() {
            SweepPayload::default()
        } else {
            serde_json::from_value(task.payload.clone())
                .map_err(|e| JobExecutionError::Permanent(format!("Invalid sweep payload: {e}")))?
        };

        let report = self
            .coordinator
            .sweep_all(payload.actor_type)
            .await
            .map_err(classify)?;

        Ok(Some(serde_json::to_value(report).map_err(AppError::from)?))
    }
}
