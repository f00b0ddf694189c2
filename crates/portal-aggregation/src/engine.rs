//! One aggregation pass for one owner.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use portal_core::config::AggregationConfig;
use portal_core::result::AppResult;
use portal_core::types::{GroupKey, NotificationId};
use portal_database::NotificationStore;
use portal_entity::{Notification, Owner, SubjectKind};

use crate::aggregate::summarize;
use crate::linker::ChildLinker;
use crate::policy::{AggregationPolicy, policy_for};
use crate::reconciler::{OrphanReconciler, SweepReport};
use crate::resolver::{GroupingKeyResolver, Resolution};
use crate::upsert::{ParentUpsertEngine, UpsertAction};

/// Counters of one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassReport {
    /// Active non-parent notifications read.
    pub candidates: usize,
    /// Groups aggregated.
    pub groups: usize,
    /// Parents inserted.
    pub parents_created: usize,
    /// Parents rewritten in place.
    pub parents_updated: usize,
    /// Parents already up to date.
    pub parents_unchanged: usize,
    /// Children newly linked.
    pub children_linked: u64,
    /// Aggregatable notifications without a usable grouping key.
    pub missing_key: usize,
    /// Groups skipped after a store error.
    pub failed_groups: usize,
    /// Parent insert races absorbed.
    pub conflicts_absorbed: u32,
    /// Parents archived for having no active child.
    pub parents_archived: usize,
}

impl PassReport {
    /// Whether the pass wrote anything.
    pub fn wrote(&self) -> bool {
        self.parents_created > 0
            || self.parents_updated > 0
            || self.children_linked > 0
            || self.parents_archived > 0
    }
}

struct Group {
    dimension: SubjectKind,
    children: Vec<Notification>,
}

struct GroupOutcome {
    parent_id: NotificationId,
    action: UpsertAction,
    conflicts: u32,
    linked: u64,
}

/// Runs resolve, summarize, upsert and link for one owner.
///
/// Callers serialize passes per owner; see
/// [`AggregationCoordinator`](crate::coordinator::AggregationCoordinator).
#[derive(Debug, Clone)]
pub struct AggregationEngine {
    store: Arc<dyn NotificationStore>,
    upserter: ParentUpsertEngine,
    linker: ChildLinker,
    reconciler: OrphanReconciler,
}

impl AggregationEngine {
    /// Build an engine over `store`.
    pub fn new(store: Arc<dyn NotificationStore>, config: &AggregationConfig) -> Self {
        let grace_period =
            Duration::from_std(config.grace_period()).unwrap_or_else(|_| Duration::days(1));

        Self {
            upserter: ParentUpsertEngine::new(store.clone(), config.max_conflict_retries),
            linker: ChildLinker::new(store.clone()),
            reconciler: OrphanReconciler::new(store.clone(), grace_period),
            store,
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<dyn NotificationStore> {
        &self.store
    }

    /// Run one full pass for `owner` as of `now`.
    ///
    /// Group failures are logged and counted; only a failure to read the
    /// candidate set aborts the pass.
    pub async fn run_pass(&self, owner: &Owner, now: DateTime<Utc>) -> AppResult<PassReport> {
        let policy = policy_for(owner.actor_type);
        let candidates = self.store.list_candidates(owner).await?;

        let mut report = PassReport {
            candidates: candidates.len(),
            ..PassReport::default()
        };

        let groups = self.group_candidates(owner, policy, candidates, &mut report);
        report.groups = groups.len();

        let mut live_parents = HashSet::new();
        for (key, group) in &groups {
            match self.apply_group(owner, policy, key, group, now).await {
                Ok(outcome) => {
                    live_parents.insert(outcome.parent_id);
                    match outcome.action {
                        UpsertAction::Created => report.parents_created += 1,
                        UpsertAction::Updated => report.parents_updated += 1,
                        UpsertAction::Unchanged => report.parents_unchanged += 1,
                    }
                    report.conflicts_absorbed += outcome.conflicts;
                    report.children_linked += outcome.linked;
                }
                Err(e) => {
                    report.failed_groups += 1;
                    error!(
                        actor_id = %owner.actor_id,
                        actor_type = %owner.actor_type,
                        group_key = %key,
                        error = %e,
                        "Failed to aggregate group"
                    );
                }
            }
        }

        report.parents_archived = self.archive_stale_parents(owner, &live_parents).await;

        if report.wrote() || report.failed_groups > 0 {
            info!(
                actor_id = %owner.actor_id,
                actor_type = %owner.actor_type,
                candidates = report.candidates,
                groups = report.groups,
                created = report.parents_created,
                updated = report.parents_updated,
                linked = report.children_linked,
                archived = report.parents_archived,
                failed = report.failed_groups,
                "Aggregation pass completed"
            );
        }

        Ok(report)
    }

    /// Sweep `owner` for orphans at `now`.
    pub async fn sweep(&self, owner: &Owner, now: DateTime<Utc>) -> AppResult<SweepReport> {
        self.reconciler.sweep(owner, now).await
    }

    fn group_candidates(
        &self,
        owner: &Owner,
        policy: &'static AggregationPolicy,
        candidates: Vec<Notification>,
        report: &mut PassReport,
    ) -> BTreeMap<GroupKey, Group> {
        let resolver = GroupingKeyResolver::new(policy);
        let mut groups: BTreeMap<GroupKey, Group> = BTreeMap::new();

        for notification in candidates {
            match resolver.resolve(&notification) {
                Resolution::Grouped { key, dimension } => {
                    groups
                        .entry(key)
                        .or_insert_with(|| Group {
                            dimension,
                            children: Vec::new(),
                        })
                        .children
                        .push(notification);
                }
                Resolution::NotAggregatable => {}
                Resolution::MissingKey => {
                    report.missing_key += 1;
                    warn!(
                        actor_id = %owner.actor_id,
                        actor_type = %owner.actor_type,
                        notification_id = %notification.id,
                        kind = %notification.kind,
                        "Aggregatable notification has no grouping key, leaving it standalone"
                    );
                }
            }
        }

        groups
    }

    async fn apply_group(
        &self,
        owner: &Owner,
        policy: &AggregationPolicy,
        key: &GroupKey,
        group: &Group,
        now: DateTime<Utc>,
    ) -> AppResult<GroupOutcome> {
        let aggregate = summarize(policy, group.dimension, &group.children, now);
        let fields = aggregate.to_parent_update(policy, key, group.dimension);

        let upsert = self.upserter.upsert(owner, policy, key, &fields).await?;

        let linked = self
            .linker
            .link(upsert.parent_id, key, &group.children)
            .await
            .inspect_err(|e| {
                error!(
                    actor_id = %owner.actor_id,
                    parent_id = %upsert.parent_id,
                    group_key = %key,
                    error = %e,
                    "Parent written but children not linked, leaving it to the next sweep"
                );
            })?;

        Ok(GroupOutcome {
            parent_id: upsert.parent_id,
            action: upsert.action,
            conflicts: upsert.conflicts,
            linked,
        })
    }

    async fn archive_stale_parents(
        &self,
        owner: &Owner,
        live_parents: &HashSet<NotificationId>,
    ) -> usize {
        let parents = match self.store.list_active_parents(owner).await {
            Ok(parents) => parents,
            Err(e) => {
                error!(
                    actor_id = %owner.actor_id,
                    actor_type = %owner.actor_type,
                    error = %e,
                    "Failed to list parents for archival"
                );
                return 0;
            }
        };

        let mut archived = 0;
        for parent in parents.iter().filter(|p| !live_parents.contains(&p.id)) {
            match self.store.archive_if_childless(parent.id).await {
                Ok(true) => archived += 1,
                Ok(false) => {}
                Err(e) => error!(
                    actor_id = %owner.actor_id,
                    parent_id = %parent.id,
                    error = %e,
                    "Failed to archive parent"
                ),
            }
        }
        archived
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portal_core::types::ActorId;
    use portal_database::MemoryNotificationStore;
    use portal_entity::{
        ActorType, LifecycleStatus, NewNotification, NotificationPayload, NotificationRole,
        Priority, Subject,
    };

    fn engine(store: Arc<MemoryNotificationStore>) -> AggregationEngine {
        AggregationEngine::new(store, &AggregationConfig::default())
    }

    fn event(owner: Owner, kind: &str, dossier: Option<&str>) -> NewNotification {
        NewNotification {
            owner,
            kind: kind.into(),
            priority: Priority::Medium,
            payload: NotificationPayload::event(
                "t",
                "m",
                dossier.map(|id| Subject::Dossier {
                    dossier_id: id.into(),
                    product_name: Some("URSSAF".into()),
                    product_type: None,
                }),
            ),
            created_at: None,
        }
    }

    #[tokio::test]
    async fn test_pass_groups_per_dossier() {
        let store = Arc::new(MemoryNotificationStore::new());
        let engine = engine(store.clone());
        let owner = Owner::new(ActorId::new(), ActorType::Client);

        for dossier in ["case-1", "case-1", "case-2"] {
            store
                .insert(&event(owner, "client_document_validated", Some(dossier)))
                .await
                .expect("insert");
        }
        store
            .insert(&event(owner, "client_newsletter", Some("case-1")))
            .await
            .expect("insert");

        let report = engine.run_pass(&owner, Utc::now()).await.expect("pass");
        assert_eq!(report.candidates, 4);
        assert_eq!(report.groups, 2);
        assert_eq!(report.parents_created, 2);
        assert_eq!(report.children_linked, 3);

        let visible = store.list_visible(&owner, 50).await.expect("visible");
        assert_eq!(visible.len(), 3);
        assert_eq!(
            visible.iter().filter(|n| n.role == NotificationRole::Parent).count(),
            2
        );
    }

    #[tokio::test]
    async fn test_missing_key_stays_visible() {
        let store = Arc::new(MemoryNotificationStore::new());
        let engine = engine(store.clone());
        let owner = Owner::new(ActorId::new(), ActorType::Client);

        let orphan = store
            .insert(&event(owner, "client_document_validated", None))
            .await
            .expect("insert");
        store
            .insert(&event(owner, "client_document_validated", Some("case-1")))
            .await
            .expect("insert");

        let report = engine.run_pass(&owner, Utc::now()).await.expect("pass");
        assert_eq!(report.missing_key, 1);
        assert_eq!(report.groups, 1);

        let row = store.find_by_id(orphan.id).await.expect("find").expect("row");
        assert_eq!(row.role, NotificationRole::Standalone);
        assert!(row.visible);
    }

    #[tokio::test]
    async fn test_read_parent_is_replaced_by_unread_one() {
        let store = Arc::new(MemoryNotificationStore::new());
        let engine = engine(store.clone());
        let owner = Owner::new(ActorId::new(), ActorType::Client);
        store
            .insert(&event(owner, "client_document_validated", Some("case-1")))
            .await
            .expect("insert");
        engine.run_pass(&owner, Utc::now()).await.expect("pass");

        let first = store.list_active_parents(&owner).await.expect("parents");
        store
            .set_status(&owner, first[0].id, LifecycleStatus::Read)
            .await
            .expect("read");

        let report = engine.run_pass(&owner, Utc::now()).await.expect("pass");
        assert_eq!(report.parents_created, 1);
        assert_eq!(report.children_linked, 1);
        assert_eq!(report.parents_archived, 1);

        let parents = store.list_active_parents(&owner).await.expect("parents");
        assert_eq!(parents.len(), 1);
        assert_eq!(parents[0].lifecycle_status, LifecycleStatus::Unread);
        assert_ne!(parents[0].id, first[0].id);
    }
}
