//! Per-actor serialization and coalescing of aggregation passes.
//!
//! Passes for different owners run in parallel with no shared lock. For
//! one owner, at most one pass runs at a time; a trigger arriving while a
//! pass is in flight sets a rerun flag and returns immediately, and the
//! in-flight runner re-checks that flag before giving up the slot.
//!
//! The slot only orders passes inside this process. Each pass also holds
//! the store's lease on the owner, which other processes sharing the store
//! contend for too.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, error, info};

use portal_core::config::AggregationConfig;
use portal_core::error::AppError;
use portal_core::result::AppResult;
use portal_database::OwnerLease;
use portal_entity::{ActorType, Owner};

use crate::engine::{AggregationEngine, PassReport};
use crate::reconciler::SweepReport;

/// Interval between attempts on a lease held elsewhere.
const LEASE_POLL: Duration = Duration::from_millis(50);

/// Why a pass was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerReason {
    /// A notification was created for the owner.
    Created,
    /// One of the owner's notifications was read, archived or dismissed.
    StatusChanged,
    /// The periodic reconciliation sweep.
    Sweep,
    /// An operator or API call.
    Manual,
}

impl fmt::Display for TriggerReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::StatusChanged => "status_changed",
            Self::Sweep => "sweep",
            Self::Manual => "manual",
        };
        f.write_str(s)
    }
}

/// Result of [`AggregationCoordinator::trigger`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TriggerOutcome {
    /// This caller ran the pass; the report is from the last pass it ran.
    Ran(PassReport),
    /// A pass was in flight; it will run again on this caller's behalf.
    Coalesced,
}

/// Result of sweeping one owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepOutcome {
    /// What the reconciler found.
    pub sweep: SweepReport,
    /// The full pass that followed.
    pub pass: TriggerOutcome,
}

/// Totals of a sweep over many owners.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepAllReport {
    /// Owners swept.
    pub owners: usize,
    /// Parents archived across all owners.
    pub parents_archived: usize,
    /// Owners where the reconciler found drifted counts or stale
    /// unlinked notifications.
    pub owners_drifted: usize,
    /// Passes that rewrote at least one parent or link.
    pub passes_wrote: usize,
    /// Owners whose sweep failed.
    pub failures: usize,
}

#[derive(Debug, Default)]
struct ActorSlot {
    lock: Mutex<()>,
    rerun: AtomicBool,
}

/// Serializes passes per owner and coalesces concurrent triggers.
pub struct AggregationCoordinator {
    engine: Arc<AggregationEngine>,
    slots: DashMap<Owner, Arc<ActorSlot>>,
    lock_wait: Duration,
    sweep_concurrency: usize,
}

impl fmt::Debug for AggregationCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AggregationCoordinator")
            .field("slots", &self.slots.len())
            .field("lock_wait", &self.lock_wait)
            .field("sweep_concurrency", &self.sweep_concurrency)
            .finish()
    }
}

impl AggregationCoordinator {
    /// Create a coordinator driving `engine`.
    pub fn new(engine: Arc<AggregationEngine>, config: &AggregationConfig) -> Self {
        Self {
            engine,
            slots: DashMap::new(),
            lock_wait: config.lock_wait(),
            sweep_concurrency: config.sweep_concurrency.max(1),
        }
    }

    /// The engine this coordinator drives.
    pub fn engine(&self) -> &Arc<AggregationEngine> {
        &self.engine
    }

    /// Request a pass for `owner` without waiting on an in-flight one.
    pub async fn trigger(&self, owner: Owner, reason: TriggerReason) -> AppResult<TriggerOutcome> {
        let slot = self.slot(owner);
        slot.rerun.store(true, Ordering::SeqCst);

        let Ok(guard) = slot.lock.try_lock() else {
            debug!(
                actor_id = %owner.actor_id,
                actor_type = %owner.actor_type,
                reason = %reason,
                "Pass in flight, trigger coalesced"
            );
            return Ok(TriggerOutcome::Coalesced);
        };

        debug!(
            actor_id = %owner.actor_id,
            actor_type = %owner.actor_type,
            reason = %reason,
            "Running aggregation pass"
        );

        match self.drain(owner, &slot, guard).await {
            Some(Ok(report)) => Ok(TriggerOutcome::Ran(report)),
            Some(Err(e)) => Err(e),
            None => Ok(TriggerOutcome::Coalesced),
        }
    }

    /// Run a pass for `owner` that starts after this call, waiting for an
    /// in-flight pass if needed.
    ///
    /// Used after a status change so the next read of the owner's parents
    /// reflects it. Fails with a timeout error after `lock_wait_seconds`.
    pub async fn trigger_and_wait(&self, owner: Owner) -> AppResult<PassReport> {
        let slot = self.slot(owner);
        let guard = tokio::time::timeout(self.lock_wait, slot.lock.lock())
            .await
            .map_err(|_| {
                AppError::timeout(format!(
                    "Timed out waiting for the aggregation pass of {owner}"
                ))
            })?;
        slot.rerun.store(true, Ordering::SeqCst);

        self.drain(owner, &slot, guard)
            .await
            .unwrap_or_else(|| Err(AppError::internal("Aggregation pass did not run")))
    }

    /// Sweep `owner` for orphans, then run a full pass so every parent's
    /// count, priority and links are recomputed from its children.
    pub async fn sweep(&self, owner: Owner) -> AppResult<SweepOutcome> {
        let sweep = self.engine.sweep(&owner, Utc::now()).await?;
        if sweep.found_drift() {
            info!(
                actor_id = %owner.actor_id,
                actor_type = %owner.actor_type,
                stale = sweep.stale_standalone,
                drifted = sweep.parents_drifted,
                "Sweep found drift, repairing with a full pass"
            );
        }
        let pass = self.trigger(owner, TriggerReason::Sweep).await?;
        Ok(SweepOutcome { sweep, pass })
    }

    /// Sweep every owner holding active notifications, optionally of one
    /// actor type, `sweep_concurrency` owners at a time.
    pub async fn sweep_all(&self, actor_type: Option<ActorType>) -> AppResult<SweepAllReport> {
        let owners = self.engine.store().list_owners(actor_type).await?;
        let mut report = SweepAllReport {
            owners: owners.len(),
            ..SweepAllReport::default()
        };

        let results: Vec<(Owner, AppResult<SweepOutcome>)> = stream::iter(owners)
            .map(|owner| async move { (owner, self.sweep(owner).await) })
            .buffer_unordered(self.sweep_concurrency)
            .collect()
            .await;

        for (owner, result) in results {
            match result {
                Ok(outcome) => {
                    report.parents_archived += outcome.sweep.parents_archived;
                    if outcome.sweep.found_drift() {
                        report.owners_drifted += 1;
                    }
                    if matches!(&outcome.pass, TriggerOutcome::Ran(pass) if pass.wrote()) {
                        report.passes_wrote += 1;
                    }
                }
                Err(e) => {
                    report.failures += 1;
                    error!(
                        actor_id = %owner.actor_id,
                        actor_type = %owner.actor_type,
                        error = %e,
                        "Reconciliation sweep failed"
                    );
                }
            }
        }

        info!(
            owners = report.owners,
            archived = report.parents_archived,
            drifted = report.owners_drifted,
            wrote = report.passes_wrote,
            failures = report.failures,
            "Reconciliation sweep completed"
        );
        Ok(report)
    }

    /// Drop slots of owners with no pass in flight or pending.
    pub fn prune_idle_slots(&self) -> usize {
        let before = self.slots.len();
        self.slots.retain(|_, slot| {
            Arc::strong_count(slot) > 1
                || slot.rerun.load(Ordering::SeqCst)
                || slot.lock.try_lock().is_err()
        });
        let pruned = before.saturating_sub(self.slots.len());
        if pruned > 0 {
            debug!(pruned, "Pruned idle aggregation slots");
        }
        pruned
    }

    /// Number of owners with a slot.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    fn slot(&self, owner: Owner) -> Arc<ActorSlot> {
        Arc::clone(self.slots.entry(owner).or_default().value())
    }

    /// Run passes while the rerun flag is set, then release the slot and
    /// take it back if a trigger landed in between.
    async fn drain<'a>(
        &self,
        owner: Owner,
        slot: &'a ActorSlot,
        guard: MutexGuard<'a, ()>,
    ) -> Option<AppResult<PassReport>> {
        let mut last = None;
        let mut guard = Some(guard);

        while guard.is_some() {
            while slot.rerun.swap(false, Ordering::SeqCst) {
                let result = self.run_leased(&owner).await;
                if let Err(e) = &result {
                    error!(
                        actor_id = %owner.actor_id,
                        actor_type = %owner.actor_type,
                        error = %e,
                        "Aggregation pass failed"
                    );
                }
                last = Some(result);
            }

            drop(guard.take());
            if slot.rerun.load(Ordering::SeqCst) {
                guard = slot.lock.try_lock().ok();
            }
        }

        last
    }

    /// One pass under the store's lease on `owner`.
    async fn run_leased(&self, owner: &Owner) -> AppResult<PassReport> {
        let lease = self.acquire_lease(owner).await?;
        let result = self.engine.run_pass(owner, Utc::now()).await;
        lease.release().await;
        result
    }

    /// Wait up to `lock_wait` for the owner's lease.
    async fn acquire_lease(&self, owner: &Owner) -> AppResult<OwnerLease> {
        let deadline = tokio::time::Instant::now() + self.lock_wait;
        loop {
            if let Some(lease) = self.engine.store().try_lease_owner(owner).await? {
                return Ok(lease);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(AppError::timeout(format!(
                    "Aggregation lease of {owner} held elsewhere"
                )));
            }
            debug!(
                actor_id = %owner.actor_id,
                actor_type = %owner.actor_type,
                "Aggregation lease held elsewhere, waiting"
            );
            tokio::time::sleep(LEASE_POLL).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portal_core::types::ActorId;
    use portal_database::{MemoryNotificationStore, NotificationStore};
    use portal_entity::{NewNotification, NotificationPayload, Priority, Subject};

    fn coordinator(store: Arc<MemoryNotificationStore>) -> AggregationCoordinator {
        let config = AggregationConfig::default();
        let engine = Arc::new(AggregationEngine::new(store, &config));
        AggregationCoordinator::new(engine, &config)
    }

    async fn seed(store: &MemoryNotificationStore, owner: Owner, dossier: &str) {
        store
            .insert(&NewNotification {
                owner,
                kind: "client_workflow_stuck".into(),
                priority: Priority::High,
                payload: NotificationPayload::event(
                    "t",
                    "m",
                    Some(Subject::Dossier {
                        dossier_id: dossier.into(),
                        product_name: None,
                        product_type: None,
                    }),
                ),
                created_at: None,
            })
            .await
            .expect("insert");
    }

    #[tokio::test]
    async fn test_trigger_runs_when_idle() {
        let store = Arc::new(MemoryNotificationStore::new());
        let coordinator = coordinator(store.clone());
        let owner = Owner::new(ActorId::new(), ActorType::Client);
        seed(&store, owner, "case-1").await;

        let outcome = coordinator
            .trigger(owner, TriggerReason::Created)
            .await
            .expect("trigger");
        let TriggerOutcome::Ran(report) = outcome else {
            panic!("expected a pass to run");
        };
        assert_eq!(report.parents_created, 1);
    }

    #[tokio::test]
    async fn test_trigger_while_locked_is_coalesced() {
        let store = Arc::new(MemoryNotificationStore::new());
        let coordinator = coordinator(store.clone());
        let owner = Owner::new(ActorId::new(), ActorType::Client);
        seed(&store, owner, "case-1").await;

        let slot = coordinator.slot(owner);
        let guard = slot.lock.try_lock().expect("idle slot");

        let outcome = coordinator
            .trigger(owner, TriggerReason::StatusChanged)
            .await
            .expect("trigger");
        assert_eq!(outcome, TriggerOutcome::Coalesced);
        assert!(slot.rerun.load(Ordering::SeqCst));

        let report = coordinator.drain(owner, &slot, guard).await;
        assert!(matches!(report, Some(Ok(ref r)) if r.parents_created == 1));
        assert!(!slot.rerun.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_trigger_and_wait_times_out() {
        let store = Arc::new(MemoryNotificationStore::new());
        let config = AggregationConfig {
            lock_wait_seconds: 0,
            ..AggregationConfig::default()
        };
        let engine = Arc::new(AggregationEngine::new(store, &config));
        let coordinator = AggregationCoordinator::new(engine, &config);
        let owner = Owner::new(ActorId::new(), ActorType::Client);

        let slot = coordinator.slot(owner);
        let _guard = slot.lock.try_lock().expect("idle slot");
        let err = coordinator
            .trigger_and_wait(owner)
            .await
            .expect_err("slot is held");
        assert_eq!(err.kind, portal_core::error::ErrorKind::Timeout);
    }

    #[tokio::test]
    async fn test_prune_idle_slots() {
        let store = Arc::new(MemoryNotificationStore::new());
        let coordinator = coordinator(store.clone());
        let owner = Owner::new(ActorId::new(), ActorType::Client);
        seed(&store, owner, "case-1").await;

        coordinator
            .trigger(owner, TriggerReason::Manual)
            .await
            .expect("trigger");
        assert_eq!(coordinator.slot_count(), 1);
        assert_eq!(coordinator.prune_idle_slots(), 1);
        assert_eq!(coordinator.slot_count(), 0);
    }

    #[tokio::test]
    async fn test_sweep_all_covers_every_owner() {
        let store = Arc::new(MemoryNotificationStore::new());
        let coordinator = coordinator(store.clone());
        for _ in 0..3 {
            let owner = Owner::new(ActorId::new(), ActorType::Client);
            seed(&store, owner, "case-1").await;
            coordinator
                .trigger(owner, TriggerReason::Created)
                .await
                .expect("trigger");
        }

        let report = coordinator.sweep_all(None).await.expect("sweep");
        assert_eq!(report.owners, 3);
        assert_eq!(report.failures, 0);
        assert_eq!(report.parents_archived, 0);
    }

    #[tokio::test]
    async fn test_pass_waits_for_lease_held_elsewhere() {
        let store = Arc::new(MemoryNotificationStore::new());
        let coordinator = Arc::new(coordinator(store.clone()));
        let owner = Owner::new(ActorId::new(), ActorType::Client);
        seed(&store, owner, "case-1").await;

        let lease = store
            .try_lease_owner(&owner)
            .await
            .expect("lease")
            .expect("free owner");
        let waiting = tokio::spawn({
            let coordinator = Arc::clone(&coordinator);
            async move { coordinator.trigger_and_wait(owner).await }
        });

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(store.list_active_parents(&owner).await.expect("parents").is_empty());

        lease.release().await;
        let report = waiting.await.expect("join").expect("pass");
        assert_eq!(report.parents_created, 1);
    }

    #[tokio::test]
    async fn test_lease_wait_times_out() {
        let store = Arc::new(MemoryNotificationStore::new());
        let config = AggregationConfig {
            lock_wait_seconds: 0,
            ..AggregationConfig::default()
        };
        let engine = Arc::new(AggregationEngine::new(store.clone(), &config));
        let coordinator = AggregationCoordinator::new(engine, &config);
        let owner = Owner::new(ActorId::new(), ActorType::Client);
        seed(&store, owner, "case-1").await;

        let _lease = store.try_lease_owner(&owner).await.expect("lease");
        let err = coordinator
            .trigger(owner, TriggerReason::Created)
            .await
            .expect_err("lease is held");
        assert_eq!(err.kind, portal_core::error::ErrorKind::Timeout);
    }

    #[tokio::test]
    async fn test_sweep_always_runs_a_pass() {
        let store = Arc::new(MemoryNotificationStore::new());
        let coordinator = coordinator(store.clone());
        let owner = Owner::new(ActorId::new(), ActorType::Client);
        seed(&store, owner, "case-1").await;

        let outcome = coordinator.sweep(owner).await.expect("sweep");
        assert!(!outcome.sweep.found_drift());
        let TriggerOutcome::Ran(report) = outcome.pass else {
            panic!("expected a pass to run");
        };
        assert_eq!(report.parents_created, 1);
    }
}
