//! Notification entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;

use portal_core::types::{ActorId, GroupKey, NotificationId};

use super::payload::NotificationPayload;
use super::priority::Priority;
use super::status::{LifecycleStatus, NotificationRole};
use crate::actor::{ActorType, Owner};

/// A notification row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Notification {
    /// Unique notification identifier.
    pub id: NotificationId,
    /// The owning actor.
    pub actor_id: ActorId,
    /// The owning actor's type.
    pub actor_type: ActorType,
    /// Kind code from the actor type's vocabulary.
    pub kind: String,
    /// Priority level.
    pub priority: Priority,
    /// Lifecycle status.
    pub lifecycle_status: LifecycleStatus,
    /// Structural role.
    pub role: NotificationRole,
    /// Business grouping key, set on parents and linked children.
    pub group_key: Option<GroupKey>,
    /// Owning parent, only for children.
    pub parent_ref: Option<NotificationId>,
    /// Cached number of active children, only meaningful on parents.
    pub children_count: i32,
    /// Whether the row shows in primary listings.
    pub visible: bool,
    /// Typed payload.
    pub payload: Json<NotificationPayload>,
    /// When the notification was created.
    pub created_at: DateTime<Utc>,
    /// When the notification was last modified.
    pub updated_at: DateTime<Utc>,
}

impl Notification {
    /// The owner of this notification.
    pub fn owner(&self) -> Owner {
        Owner::new(self.actor_id, self.actor_type)
    }

    /// Whether the notification still counts for aggregation.
    pub fn is_active(&self) -> bool {
        self.lifecycle_status.is_active()
    }

    /// Whether this is a parent summary.
    pub fn is_parent(&self) -> bool {
        self.role == NotificationRole::Parent
    }

    /// Age in whole days at `now`, floored, never negative.
    pub fn age_days(&self, now: DateTime<Utc>) -> i64 {
        (now - self.created_at).num_days().max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::payload::NotificationPayload;
    use chrono::Duration;

    fn sample(created_at: DateTime<Utc>) -> Notification {
        Notification {
            id: NotificationId::new(),
            actor_id: ActorId::new(),
            actor_type: ActorType::Client,
            kind: "client_document_validated".into(),
            priority: Priority::Low,
            lifecycle_status: LifecycleStatus::Read,
            role: NotificationRole::Standalone,
            group_key: None,
            parent_ref: None,
            children_count: 0,
            visible: true,
            payload: Json(NotificationPayload::event("t", "m", None)),
            created_at,
            updated_at: created_at,
        }
    }

    #[test]
    fn test_age_is_floored() {
        let now = Utc::now();
        let n = sample(now - Duration::hours(47));
        assert_eq!(n.age_days(now), 1);
    }

    #[test]
    fn test_future_creation_has_zero_age() {
        let now = Utc::now();
        let n = sample(now + Duration::minutes(5));
        assert_eq!(n.age_days(now), 0);
        assert!(n.is_active());
    }
}
