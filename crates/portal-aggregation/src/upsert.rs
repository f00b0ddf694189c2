//! Idempotent create-or-update of the live parent of a group.

use std::sync::Arc;

use tracing::debug;

use portal_core::error::AppError;
use portal_core::result::AppResult;
use portal_core::types::{GroupKey, NotificationId};
use portal_database::NotificationStore;
use portal_entity::{NewParent, Notification, Owner, ParentUpdate};

use crate::policy::AggregationPolicy;

/// Which branch an upsert ended in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertAction {
    /// A new parent was inserted.
    Created,
    /// The existing parent was rewritten.
    Updated,
    /// The existing parent already held these fields; nothing was written.
    Unchanged,
}

/// Outcome of [`ParentUpsertEngine::upsert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome {
    /// The live parent's id.
    pub parent_id: NotificationId,
    /// Branch taken.
    pub action: UpsertAction,
    /// Insert attempts lost to a concurrent writer.
    pub conflicts: u32,
}

/// Creates or updates the one unread parent per `(owner, group_key)`.
#[derive(Debug, Clone)]
pub struct ParentUpsertEngine {
    store: Arc<dyn NotificationStore>,
    max_conflict_retries: u32,
}

impl ParentUpsertEngine {
    /// Create an upsert engine retrying lost inserts up to
    /// `max_conflict_retries` times, and always at least once.
    pub fn new(store: Arc<dyn NotificationStore>, max_conflict_retries: u32) -> Self {
        Self {
            store,
            max_conflict_retries: max_conflict_retries.max(1),
        }
    }

    /// Make the live parent of `group_key` hold `fields`.
    ///
    /// An insert that loses to a concurrent writer (unique violation) is
    /// retried as a lookup-and-update against the winner's row.
    pub async fn upsert(
        &self,
        owner: &Owner,
        policy: &AggregationPolicy,
        group_key: &GroupKey,
        fields: &ParentUpdate,
    ) -> AppResult<UpsertOutcome> {
        let mut conflicts = 0;

        loop {
            if let Some(existing) = self.store.find_active_parent(owner, group_key).await? {
                let action = self.update_existing(&existing, fields).await?;
                return Ok(UpsertOutcome {
                    parent_id: existing.id,
                    action,
                    conflicts,
                });
            }

            let new_parent = NewParent {
                owner: *owner,
                kind: policy.summary_kind.to_string(),
                group_key: group_key.clone(),
                fields: fields.clone(),
            };

            match self.store.insert_parent(&new_parent).await {
                Ok(parent) => {
                    return Ok(UpsertOutcome {
                        parent_id: parent.id,
                        action: UpsertAction::Created,
                        conflicts,
                    });
                }
                Err(e) if e.is_conflict() && conflicts < self.max_conflict_retries => {
                    conflicts += 1;
                    debug!(
                        actor_id = %owner.actor_id,
                        actor_type = %owner.actor_type,
                        group_key = %group_key,
                        attempt = conflicts,
                        "Lost parent insert race, retrying as update"
                    );
                }
                Err(e) if e.is_conflict() => {
                    return Err(AppError::conflict(format!(
                        "Parent for {owner} / {group_key} still conflicting after {conflicts} retries"
                    )));
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn update_existing(
        &self,
        existing: &Notification,
        fields: &ParentUpdate,
    ) -> AppResult<UpsertAction> {
        let unchanged = existing.priority == fields.priority
            && existing.children_count == fields.children_count
            && existing.payload.0 == fields.payload;
        if unchanged {
            return Ok(UpsertAction::Unchanged);
        }

        self.store.update_parent(existing.id, fields).await?;
        Ok(UpsertAction::Updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::CLIENT_POLICY;
    use portal_core::types::ActorId;
    use portal_database::MemoryNotificationStore;
    use portal_entity::{ActorType, NotificationPayload, Priority};

    fn fields(priority: Priority, count: i32) -> ParentUpdate {
        ParentUpdate {
            priority,
            children_count: count,
            payload: NotificationPayload::event("title", "label", None),
        }
    }

    #[tokio::test]
    async fn test_create_then_update_keeps_identity() {
        let store = Arc::new(MemoryNotificationStore::new());
        let engine = ParentUpsertEngine::new(store.clone(), 3);
        let owner = Owner::new(ActorId::new(), ActorType::Client);
        let key = GroupKey::parse("case-1").expect("key");

        let created = engine
            .upsert(&owner, &CLIENT_POLICY, &key, &fields(Priority::Low, 1))
            .await
            .expect("create");
        assert_eq!(created.action, UpsertAction::Created);

        let updated = engine
            .upsert(&owner, &CLIENT_POLICY, &key, &fields(Priority::High, 2))
            .await
            .expect("update");
        assert_eq!(updated.action, UpsertAction::Updated);
        assert_eq!(updated.parent_id, created.parent_id);

        let parent = store
            .find_by_id(created.parent_id)
            .await
            .expect("find")
            .expect("parent");
        assert_eq!(parent.priority, Priority::High);
        assert_eq!(parent.children_count, 2);
        assert_eq!(parent.kind, CLIENT_POLICY.summary_kind);
    }

    #[tokio::test]
    async fn test_identical_fields_skip_write() {
        let store = Arc::new(MemoryNotificationStore::new());
        let engine = ParentUpsertEngine::new(store.clone(), 3);
        let owner = Owner::new(ActorId::new(), ActorType::Client);
        let key = GroupKey::parse("case-1").expect("key");

        engine
            .upsert(&owner, &CLIENT_POLICY, &key, &fields(Priority::Low, 1))
            .await
            .expect("create");
        let writes = store.write_count();

        let again = engine
            .upsert(&owner, &CLIENT_POLICY, &key, &fields(Priority::Low, 1))
            .await
            .expect("noop");
        assert_eq!(again.action, UpsertAction::Unchanged);
        assert_eq!(store.write_count(), writes);
    }

    #[tokio::test]
    async fn test_lost_race_is_retried_with_zero_configured_retries() {
        let store = Arc::new(MemoryNotificationStore::interleaving());
        let engine = ParentUpsertEngine::new(store.clone(), 0);
        let owner = Owner::new(ActorId::new(), ActorType::Client);
        let key = GroupKey::parse("case-1").expect("key");
        let f = fields(Priority::Medium, 2);

        let (a, b) = tokio::join!(
            engine.upsert(&owner, &CLIENT_POLICY, &key, &f),
            engine.upsert(&owner, &CLIENT_POLICY, &key, &f),
        );
        let (a, b) = (a.expect("first"), b.expect("second"));

        assert_eq!(a.parent_id, b.parent_id);
        assert_eq!(a.conflicts + b.conflicts, 1);
        assert_eq!(store.list_active_parents(&owner).await.expect("list").len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_upserts_converge_on_one_parent() {
        let store = Arc::new(MemoryNotificationStore::interleaving());
        let engine = ParentUpsertEngine::new(store.clone(), 3);
        let owner = Owner::new(ActorId::new(), ActorType::Client);
        let key = GroupKey::parse("case-1").expect("key");
        let f = fields(Priority::Medium, 2);

        let (a, b) = tokio::join!(
            engine.upsert(&owner, &CLIENT_POLICY, &key, &f),
            engine.upsert(&owner, &CLIENT_POLICY, &key, &f),
        );
        let (a, b) = (a.expect("first"), b.expect("second"));

        assert_eq!(a.parent_id, b.parent_id);
        let (winner, loser) = if a.action == UpsertAction::Created { (a, b) } else { (b, a) };
        assert_eq!(winner.action, UpsertAction::Created);
        assert_eq!(loser.action, UpsertAction::Unchanged);
        assert_eq!(loser.conflicts, 1);
        assert_eq!(store.list_active_parents(&owner).await.expect("list").len(), 1);
    }
}
