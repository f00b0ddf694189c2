//! Write-side shapes for inserting and updating notifications.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use portal_core::types::GroupKey;

use super::payload::NotificationPayload;
use super::priority::Priority;
use crate::actor::Owner;

/// A standalone notification emitted by a producer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewNotification {
    /// Recipient.
    pub owner: Owner,
    /// Kind code.
    pub kind: String,
    /// Priority level.
    pub priority: Priority,
    /// Typed payload.
    pub payload: NotificationPayload,
    /// Creation time override, for backfills and tests.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// A parent summary about to be created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewParent {
    /// Recipient.
    pub owner: Owner,
    /// Summary kind of the owner's policy.
    pub kind: String,
    /// Grouping key.
    pub group_key: GroupKey,
    /// Computed fields.
    pub fields: ParentUpdate,
}

/// The aggregate-derived fields of a parent, rewritten in place on update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParentUpdate {
    /// Highest child priority.
    pub priority: Priority,
    /// Number of active children.
    pub children_count: i32,
    /// Summary payload.
    pub payload: NotificationPayload,
}
