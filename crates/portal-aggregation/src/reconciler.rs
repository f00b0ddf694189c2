//! Orphan reconciliation sweep.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use portal_core::result::AppResult;
use portal_database::NotificationStore;
use portal_entity::{NotificationRole, Owner};

use crate::policy::policy_for;
use crate::resolver::{GroupingKeyResolver, Resolution};

/// What one sweep of one owner found.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Active parents inspected.
    pub parents_checked: usize,
    /// Parents archived for having no active child.
    pub parents_archived: usize,
    /// Live parents whose stored children count disagrees with their
    /// active children.
    pub parents_drifted: usize,
    /// Aggregatable notifications still standalone after the grace period.
    pub stale_standalone: usize,
}

impl SweepReport {
    /// Whether the sweep found state only a pass can repair.
    pub fn found_drift(&self) -> bool {
        self.stale_standalone > 0 || self.parents_drifted > 0
    }

    /// Whether the sweep changed or found anything.
    pub fn is_noop(&self) -> bool {
        self.parents_archived == 0 && !self.found_drift()
    }
}

/// Repairs drift between passes: empty parents and unlinked children.
#[derive(Debug, Clone)]
pub struct OrphanReconciler {
    store: Arc<dyn NotificationStore>,
    grace_period: Duration,
}

impl OrphanReconciler {
    /// Create a reconciler; standalone rows younger than `grace_period`
    /// are left to the regular trigger path.
    pub fn new(store: Arc<dyn NotificationStore>, grace_period: Duration) -> Self {
        Self {
            store,
            grace_period,
        }
    }

    /// Sweep one owner at `now`.
    ///
    /// Archives every active parent without an active child, counts the
    /// remaining ones whose stored count drifted, then counts aggregatable
    /// notifications that should have been linked by now.
    pub async fn sweep(&self, owner: &Owner, now: DateTime<Utc>) -> AppResult<SweepReport> {
        let mut report = SweepReport::default();

        for parent in self.store.list_active_parents(owner).await? {
            report.parents_checked += 1;
            if self.store.archive_if_childless(parent.id).await? {
                report.parents_archived += 1;
                info!(
                    actor_id = %owner.actor_id,
                    actor_type = %owner.actor_type,
                    parent_id = %parent.id,
                    group_key = ?parent.group_key,
                    "Archived childless parent"
                );
                continue;
            }

            let active = self.store.count_active_children(parent.id).await?;
            if active != i64::from(parent.children_count) {
                report.parents_drifted += 1;
                warn!(
                    actor_id = %owner.actor_id,
                    actor_type = %owner.actor_type,
                    parent_id = %parent.id,
                    stored = parent.children_count,
                    active,
                    "Parent children count drifted"
                );
            }
        }

        let resolver = GroupingKeyResolver::new(policy_for(owner.actor_type));
        let cutoff = now
            .checked_sub_signed(self.grace_period)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        report.stale_standalone = self
            .store
            .list_candidates(owner)
            .await?
            .iter()
            .filter(|n| n.role == NotificationRole::Standalone && n.created_at <= cutoff)
            .filter(|n| matches!(resolver.resolve(n), Resolution::Grouped { .. }))
            .count();

        if report.is_noop() {
            debug!(
                actor_id = %owner.actor_id,
                actor_type = %owner.actor_type,
                parents_checked = report.parents_checked,
                "Reconciliation sweep found nothing to do"
            );
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portal_core::types::{ActorId, GroupKey};
    use portal_database::MemoryNotificationStore;
    use portal_entity::{
        ActorType, LifecycleStatus, NewNotification, NewParent, NotificationPayload,
        ParentUpdate, Priority, Subject,
    };

    fn dossier_event(owner: Owner, age: Duration) -> NewNotification {
        NewNotification {
            owner,
            kind: "client_document_validated".into(),
            priority: Priority::Low,
            payload: NotificationPayload::event(
                "t",
                "m",
                Some(Subject::Dossier {
                    dossier_id: "case-1".into(),
                    product_name: None,
                    product_type: None,
                }),
            ),
            created_at: Some(Utc::now() - age),
        }
    }

    #[tokio::test]
    async fn test_archives_empty_parent() {
        let store = Arc::new(MemoryNotificationStore::new());
        let reconciler = OrphanReconciler::new(store.clone(), Duration::minutes(5));
        let owner = Owner::new(ActorId::new(), ActorType::Client);
        let parent = store
            .insert_parent(&NewParent {
                owner,
                kind: "client_dossier_actions_summary".into(),
                group_key: GroupKey::parse("case-1").expect("key"),
                fields: ParentUpdate {
                    priority: Priority::Low,
                    children_count: 1,
                    payload: NotificationPayload::event("t", "m", None),
                },
            })
            .await
            .expect("parent");

        let report = reconciler.sweep(&owner, Utc::now()).await.expect("sweep");
        assert_eq!(report.parents_archived, 1);

        let archived = store.find_by_id(parent.id).await.expect("find").expect("row");
        assert_eq!(archived.lifecycle_status, LifecycleStatus::Archived);

        let again = reconciler.sweep(&owner, Utc::now()).await.expect("sweep");
        assert!(again.is_noop());
        assert_eq!(again.parents_checked, 0);
    }

    #[tokio::test]
    async fn test_grace_period_for_standalone() {
        let store = Arc::new(MemoryNotificationStore::new());
        let reconciler = OrphanReconciler::new(store.clone(), Duration::minutes(5));
        let owner = Owner::new(ActorId::new(), ActorType::Client);

        store
            .insert(&dossier_event(owner, Duration::seconds(10)))
            .await
            .expect("fresh");
        let report = reconciler.sweep(&owner, Utc::now()).await.expect("sweep");
        assert!(!report.found_drift());

        store
            .insert(&dossier_event(owner, Duration::hours(1)))
            .await
            .expect("stale");
        let report = reconciler.sweep(&owner, Utc::now()).await.expect("sweep");
        assert_eq!(report.stale_standalone, 1);
        assert!(report.found_drift());
    }

    #[tokio::test]
    async fn test_counts_drifted_parent() {
        let store = Arc::new(MemoryNotificationStore::new());
        let reconciler = OrphanReconciler::new(store.clone(), Duration::minutes(5));
        let owner = Owner::new(ActorId::new(), ActorType::Client);
        let key = GroupKey::parse("case-1").expect("key");
        let parent = store
            .insert_parent(&NewParent {
                owner,
                kind: "client_dossier_actions_summary".into(),
                group_key: key.clone(),
                fields: ParentUpdate {
                    priority: Priority::Low,
                    children_count: 2,
                    payload: NotificationPayload::event("t", "m", None),
                },
            })
            .await
            .expect("parent");
        let child = store
            .insert(&dossier_event(owner, Duration::seconds(1)))
            .await
            .expect("child");
        store
            .link_children(parent.id, &key, &[child.id])
            .await
            .expect("link");

        let report = reconciler.sweep(&owner, Utc::now()).await.expect("sweep");
        assert_eq!(report.parents_archived, 0);
        assert_eq!(report.parents_drifted, 1);
        assert!(report.found_drift());
    }
}
