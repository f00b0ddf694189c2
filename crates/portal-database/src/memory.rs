//! In-memory notification store.
//!
//! Mirrors the PostgreSQL store's semantics, including the unique unread
//! parent per `(owner, group_key)`, so the engine can run without a
//! database in tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use sqlx::types::Json;
use tokio::sync::RwLock;

use portal_core::error::AppError;
use portal_core::result::AppResult;
use portal_core::types::{GroupKey, NotificationId};
use portal_entity::{
    ActorType, LifecycleStatus, NewNotification, NewParent, Notification, NotificationRole, Owner,
    ParentUpdate,
};

use crate::lease::{HeldOwners, OwnerLease};
use crate::store::NotificationStore;

/// Notification store held in a process-local map.
#[derive(Debug, Default)]
pub struct MemoryNotificationStore {
    rows: RwLock<HashMap<NotificationId, Notification>>,
    leases: HeldOwners,
    writes: AtomicU64,
    interleave: bool,
}

impl MemoryNotificationStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store that yields to the scheduler before every
    /// operation, so concurrent callers interleave between calls.
    pub fn interleaving() -> Self {
        Self {
            interleave: true,
            ..Self::default()
        }
    }

    /// Number of mutating calls that changed at least one row.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Snapshot of every row, oldest first.
    pub async fn all(&self) -> Vec<Notification> {
        let mut rows: Vec<Notification> = self.rows.read().await.values().cloned().collect();
        sort_oldest_first(&mut rows);
        rows
    }

    async fn pause(&self) {
        if self.interleave {
            tokio::task::yield_now().await;
        }
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

fn sort_oldest_first(rows: &mut [Notification]) {
    rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
}

fn owned_by(row: &Notification, owner: &Owner) -> bool {
    row.actor_id == owner.actor_id && row.actor_type == owner.actor_type
}

fn is_live_parent(row: &Notification, owner: &Owner, group_key: &GroupKey) -> bool {
    owned_by(row, owner)
        && row.role == NotificationRole::Parent
        && row.lifecycle_status == LifecycleStatus::Unread
        && row.group_key.as_ref() == Some(group_key)
}

#[async_trait]
impl NotificationStore for MemoryNotificationStore {
    async fn insert(&self, new: &NewNotification) -> AppResult<Notification> {
        self.pause().await;
        let now = Utc::now();
        let row = Notification {
            id: NotificationId::new(),
            actor_id: new.owner.actor_id,
            actor_type: new.owner.actor_type,
            kind: new.kind.clone(),
            priority: new.priority,
            lifecycle_status: LifecycleStatus::Unread,
            role: NotificationRole::Standalone,
            group_key: None,
            parent_ref: None,
            children_count: 0,
            visible: true,
            payload: Json(new.payload.clone()),
            created_at: new.created_at.unwrap_or(now),
            updated_at: now,
        };
        self.rows.write().await.insert(row.id, row.clone());
        self.record_write();
        Ok(row)
    }

    async fn find_by_id(&self, id: NotificationId) -> AppResult<Option<Notification>> {
        self.pause().await;
        Ok(self.rows.read().await.get(&id).cloned())
    }

    async fn list_candidates(&self, owner: &Owner) -> AppResult<Vec<Notification>> {
        self.pause().await;
        let mut rows: Vec<Notification> = self
            .rows
            .read()
            .await
            .values()
            .filter(|n| owned_by(n, owner) && !n.is_parent() && n.is_active())
            .cloned()
            .collect();
        sort_oldest_first(&mut rows);
        Ok(rows)
    }

    async fn find_active_parent(
        &self,
        owner: &Owner,
        group_key: &GroupKey,
    ) -> AppResult<Option<Notification>> {
        self.pause().await;
        Ok(self
            .rows
            .read()
            .await
            .values()
            .find(|n| is_live_parent(n, owner, group_key))
            .cloned())
    }

    async fn insert_parent(&self, parent: &NewParent) -> AppResult<Notification> {
        self.pause().await;
        let mut rows = self.rows.write().await;
        if rows
            .values()
            .any(|n| is_live_parent(n, &parent.owner, &parent.group_key))
        {
            return Err(AppError::conflict(format!(
                "Unread parent already exists for {} / {}",
                parent.owner, parent.group_key
            )));
        }

        let now = Utc::now();
        let row = Notification {
            id: NotificationId::new(),
            actor_id: parent.owner.actor_id,
            actor_type: parent.owner.actor_type,
            kind: parent.kind.clone(),
            priority: parent.fields.priority,
            lifecycle_status: LifecycleStatus::Unread,
            role: NotificationRole::Parent,
            group_key: Some(parent.group_key.clone()),
            parent_ref: None,
            children_count: parent.fields.children_count,
            visible: true,
            payload: Json(parent.fields.payload.clone()),
            created_at: now,
            updated_at: now,
        };
        rows.insert(row.id, row.clone());
        self.record_write();
        Ok(row)
    }

    async fn update_parent(
        &self,
        id: NotificationId,
        update: &ParentUpdate,
    ) -> AppResult<Notification> {
        self.pause().await;
        let mut rows = self.rows.write().await;
        let row = rows
            .get_mut(&id)
            .filter(|n| n.is_parent())
            .ok_or_else(|| AppError::not_found(format!("Parent notification {id} not found")))?;

        row.priority = update.priority;
        row.children_count = update.children_count;
        row.payload = Json(update.payload.clone());
        row.updated_at = Utc::now();
        self.record_write();
        Ok(row.clone())
    }

    async fn link_children(
        &self,
        parent_id: NotificationId,
        group_key: &GroupKey,
        child_ids: &[NotificationId],
    ) -> AppResult<u64> {
        self.pause().await;
        let mut rows = self.rows.write().await;
        let now = Utc::now();
        let mut changed = 0;

        for id in child_ids {
            let Some(row) = rows.get_mut(id) else {
                continue;
            };
            if row.is_parent() {
                continue;
            }
            let already_linked = row.parent_ref == Some(parent_id)
                && row.role == NotificationRole::Child
                && !row.visible;
            if already_linked {
                continue;
            }
            row.parent_ref = Some(parent_id);
            row.role = NotificationRole::Child;
            row.visible = false;
            row.group_key = Some(group_key.clone());
            row.updated_at = now;
            changed += 1;
        }

        if changed > 0 {
            self.record_write();
        }
        Ok(changed)
    }

    async fn list_active_parents(&self, owner: &Owner) -> AppResult<Vec<Notification>> {
        self.pause().await;
        let mut rows: Vec<Notification> = self
            .rows
            .read()
            .await
            .values()
            .filter(|n| owned_by(n, owner) && n.is_parent() && n.is_active())
            .cloned()
            .collect();
        sort_oldest_first(&mut rows);
        Ok(rows)
    }

    async fn count_active_children(&self, parent_id: NotificationId) -> AppResult<i64> {
        self.pause().await;
        let count = self
            .rows
            .read()
            .await
            .values()
            .filter(|n| n.parent_ref == Some(parent_id) && n.is_active())
            .count();
        Ok(count as i64)
    }

    async fn archive_if_childless(&self, parent_id: NotificationId) -> AppResult<bool> {
        self.pause().await;
        let mut rows = self.rows.write().await;
        let has_child = rows
            .values()
            .any(|n| n.parent_ref == Some(parent_id) && n.is_active());
        if has_child {
            return Ok(false);
        }

        match rows.get_mut(&parent_id) {
            Some(row) if row.is_parent() && row.is_active() => {
                row.lifecycle_status = LifecycleStatus::Archived;
                row.updated_at = Utc::now();
                self.record_write();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_status(
        &self,
        owner: &Owner,
        id: NotificationId,
        status: LifecycleStatus,
    ) -> AppResult<bool> {
        self.pause().await;
        let mut rows = self.rows.write().await;

        let revives_parent = rows.get(&id).filter(|row| {
            row.is_parent() && owned_by(row, owner) && status == LifecycleStatus::Unread
        });
        if let Some(key) = revives_parent.and_then(|row| row.group_key.clone()) {
            let taken = rows
                .values()
                .any(|n| n.id != id && is_live_parent(n, owner, &key));
            if taken {
                return Err(AppError::conflict(format!(
                    "Unread parent already exists for {owner} / {key}"
                )));
            }
        }

        match rows.get_mut(&id) {
            Some(row) if owned_by(row, owner) && row.lifecycle_status != status => {
                row.lifecycle_status = status;
                row.updated_at = Utc::now();
                self.record_write();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_visible(&self, owner: &Owner, limit: i64) -> AppResult<Vec<Notification>> {
        self.pause().await;
        let mut rows: Vec<Notification> = self
            .rows
            .read()
            .await
            .values()
            .filter(|n| owned_by(n, owner) && n.visible && n.is_active())
            .cloned()
            .collect();
        sort_oldest_first(&mut rows);
        rows.reverse();
        rows.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(rows)
    }

    async fn list_children(&self, parent_id: NotificationId) -> AppResult<Vec<Notification>> {
        self.pause().await;
        let mut rows: Vec<Notification> = self
            .rows
            .read()
            .await
            .values()
            .filter(|n| n.parent_ref == Some(parent_id))
            .cloned()
            .collect();
        sort_oldest_first(&mut rows);
        Ok(rows)
    }

    async fn list_owners(&self, actor_type: Option<ActorType>) -> AppResult<Vec<Owner>> {
        self.pause().await;
        let mut owners: Vec<Owner> = self
            .rows
            .read()
            .await
            .values()
            .filter(|n| n.is_active() && actor_type.is_none_or(|t| n.actor_type == t))
            .map(Notification::owner)
            .collect();
        owners.sort();
        owners.dedup();
        Ok(owners)
    }

    async fn try_lease_owner(&self, owner: &Owner) -> AppResult<Option<OwnerLease>> {
        self.pause().await;
        let inserted = self
            .leases
            .lock()
            .map_err(|_| AppError::internal("Lease registry poisoned"))?
            .insert(*owner);
        Ok(inserted.then(|| OwnerLease::memory(*owner, Arc::clone(&self.leases))))
    }
}
