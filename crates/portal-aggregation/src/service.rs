//! Aggregation operations exposed to the rest of the portal.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use portal_core::error::AppError;
use portal_core::result::AppResult;
use portal_core::types::{GroupKey, NotificationId};
use portal_entity::{
    ActorType, LifecycleStatus, NewNotification, Notification, Owner, SummaryDetails,
};

use crate::coordinator::{
    AggregationCoordinator, SweepAllReport, SweepOutcome, TriggerOutcome, TriggerReason,
};
use crate::engine::PassReport;

/// Which owners a sweep covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepScope {
    /// One owner.
    Actor(Owner),
    /// Every owner, optionally of one actor type.
    All(Option<ActorType>),
}

/// Result of [`AggregationService::sweep_orphans`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SweepResult {
    /// Sweep of one owner.
    Actor(SweepOutcome),
    /// Sweep of many owners.
    All(SweepAllReport),
}

/// Read-only projection of one parent and its active children.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateView {
    /// The parent row.
    pub parent: Notification,
    /// Its stored summary.
    pub summary: Option<SummaryDetails>,
    /// Active children, oldest first.
    pub children: Vec<Notification>,
}

/// Entry point for producers, status endpoints, the worker and the CLI.
#[derive(Debug, Clone)]
pub struct AggregationService {
    coordinator: Arc<AggregationCoordinator>,
}

impl AggregationService {
    /// Create a service over `coordinator`.
    pub fn new(coordinator: Arc<AggregationCoordinator>) -> Self {
        Self { coordinator }
    }

    /// The coordinator behind this service.
    pub fn coordinator(&self) -> &Arc<AggregationCoordinator> {
        &self.coordinator
    }

    /// Request a pass for `owner`.
    pub async fn trigger_aggregation(&self, owner: Owner) -> AppResult<TriggerOutcome> {
        self.coordinator.trigger(owner, TriggerReason::Manual).await
    }

    /// Run reconciliation for `scope`.
    pub async fn sweep_orphans(&self, scope: SweepScope) -> AppResult<SweepResult> {
        match scope {
            SweepScope::Actor(owner) => self.coordinator.sweep(owner).await.map(SweepResult::Actor),
            SweepScope::All(actor_type) => self
                .coordinator
                .sweep_all(actor_type)
                .await
                .map(SweepResult::All),
        }
    }

    /// The active parent of `(owner, group_key)` with its active children.
    ///
    /// Prefers the unread parent; falls back to a read one still holding
    /// children.
    pub async fn get_aggregate(
        &self,
        owner: Owner,
        group_key: &GroupKey,
    ) -> AppResult<Option<AggregateView>> {
        let store = self.coordinator.engine().store();

        let parent = match store.find_active_parent(&owner, group_key).await? {
            Some(parent) => Some(parent),
            None => store
                .list_active_parents(&owner)
                .await?
                .into_iter()
                .rev()
                .find(|p| p.group_key.as_ref() == Some(group_key)),
        };

        let Some(parent) = parent else {
            return Ok(None);
        };

        let children = store
            .list_children(parent.id)
            .await?
            .into_iter()
            .filter(Notification::is_active)
            .collect();

        Ok(Some(AggregateView {
            summary: parent.payload.summary().cloned(),
            parent,
            children,
        }))
    }

    /// Store a producer's notification and aggregate its owner.
    pub async fn publish(&self, new: &NewNotification) -> AppResult<Notification> {
        let notification = self.coordinator.engine().store().insert(new).await?;
        self.coordinator
            .trigger(new.owner, TriggerReason::Created)
            .await?;
        Ok(notification)
    }

    /// Change the status of one of `owner`'s notifications and wait for
    /// the owner's parents to reflect it.
    pub async fn set_status(
        &self,
        owner: Owner,
        id: NotificationId,
        status: LifecycleStatus,
    ) -> AppResult<PassReport> {
        let changed = self
            .coordinator
            .engine()
            .store()
            .set_status(&owner, id, status)
            .await?;
        if !changed {
            return Err(AppError::not_found(format!(
                "Notification {id} of {owner} not found or already {status}"
            )));
        }

        info!(
            actor_id = %owner.actor_id,
            actor_type = %owner.actor_type,
            notification_id = %id,
            status = %status,
            "Notification status changed"
        );
        self.coordinator.trigger_and_wait(owner).await
    }
}
