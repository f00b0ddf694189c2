//! PostgreSQL notification store.

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

use portal_core::error::AppError;
use portal_core::result::AppResult;
use portal_core::types::{GroupKey, NotificationId};
use portal_entity::{
    ActorType, LifecycleStatus, NewNotification, NewParent, Notification, Owner, ParentUpdate,
};

use crate::error::db_error;
use crate::lease::{OwnerLease, advisory_key};
use crate::store::NotificationStore;

/// Notification store backed by the `notifications` table.
#[derive(Debug, Clone)]
pub struct PgNotificationStore {
    pool: PgPool,
}

impl PgNotificationStore {
    /// Create a new store over `pool`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationStore for PgNotificationStore {
    async fn insert(&self, new: &NewNotification) -> AppResult<Notification> {
        sqlx::query_as::<_, Notification>(
            "INSERT INTO notifications \
                (id, actor_id, actor_type, kind, priority, lifecycle_status, role, visible, payload, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, 'unread', 'standalone', TRUE, $6, COALESCE($7, NOW()), NOW()) \
             RETURNING *",
        )
        .bind(NotificationId::new())
        .bind(new.owner.actor_id)
        .bind(new.owner.actor_type)
        .bind(&new.kind)
        .bind(new.priority)
        .bind(Json(&new.payload))
        .bind(new.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("Failed to insert notification", e))
    }

    async fn find_by_id(&self, id: NotificationId) -> AppResult<Option<Notification>> {
        sqlx::query_as::<_, Notification>("SELECT * FROM notifications WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to find notification", e))
    }

    async fn list_candidates(&self, owner: &Owner) -> AppResult<Vec<Notification>> {
        sqlx::query_as::<_, Notification>(
            "SELECT * FROM notifications \
             WHERE actor_id = $1 AND actor_type = $2 \
               AND role <> 'parent' \
               AND lifecycle_status IN ('unread', 'read') \
             ORDER BY created_at ASC, id ASC",
        )
        .bind(owner.actor_id)
        .bind(owner.actor_type)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list aggregation candidates", e))
    }

    async fn find_active_parent(
        &self,
        owner: &Owner,
        group_key: &GroupKey,
    ) -> AppResult<Option<Notification>> {
        sqlx::query_as::<_, Notification>(
            "SELECT * FROM notifications \
             WHERE actor_id = $1 AND actor_type = $2 AND group_key = $3 \
               AND role = 'parent' AND lifecycle_status = 'unread'",
        )
        .bind(owner.actor_id)
        .bind(owner.actor_type)
        .bind(group_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to find parent notification", e))
    }

    async fn insert_parent(&self, parent: &NewParent) -> AppResult<Notification> {
        sqlx::query_as::<_, Notification>(
            "INSERT INTO notifications \
                (id, actor_id, actor_type, kind, priority, lifecycle_status, role, group_key, \
                 children_count, visible, payload, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, 'unread', 'parent', $6, $7, TRUE, $8, NOW(), NOW()) \
             RETURNING *",
        )
        .bind(NotificationId::new())
        .bind(parent.owner.actor_id)
        .bind(parent.owner.actor_type)
        .bind(&parent.kind)
        .bind(parent.fields.priority)
        .bind(&parent.group_key)
        .bind(parent.fields.children_count)
        .bind(Json(&parent.fields.payload))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("Failed to create parent notification", e))
    }

    async fn update_parent(
        &self,
        id: NotificationId,
        update: &ParentUpdate,
    ) -> AppResult<Notification> {
        sqlx::query_as::<_, Notification>(
            "UPDATE notifications \
             SET priority = $2, children_count = $3, payload = $4, updated_at = NOW() \
             WHERE id = $1 AND role = 'parent' \
             RETURNING *",
        )
        .bind(id)
        .bind(update.priority)
        .bind(update.children_count)
        .bind(Json(&update.payload))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to update parent notification", e))?
        .ok_or_else(|| AppError::not_found(format!("Parent notification {id} not found")))
    }

    async fn link_children(
        &self,
        parent_id: NotificationId,
        group_key: &GroupKey,
        child_ids: &[NotificationId],
    ) -> AppResult<u64> {
        if child_ids.is_empty() {
            return Ok(0);
        }
        let ids: Vec<Uuid> = child_ids.iter().map(|id| id.into_uuid()).collect();

        let result = sqlx::query(
            "UPDATE notifications \
             SET parent_ref = $1, role = 'child', visible = FALSE, group_key = $2, updated_at = NOW() \
             WHERE id = ANY($3) \
               AND role <> 'parent' \
               AND (parent_ref IS DISTINCT FROM $1 OR role <> 'child' OR visible)",
        )
        .bind(parent_id)
        .bind(group_key)
        .bind(&ids)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to link children", e))?;

        Ok(result.rows_affected())
    }

    async fn list_active_parents(&self, owner: &Owner) -> AppResult<Vec<Notification>> {
        sqlx::query_as::<_, Notification>(
            "SELECT * FROM notifications \
             WHERE actor_id = $1 AND actor_type = $2 \
               AND role = 'parent' AND lifecycle_status IN ('unread', 'read') \
             ORDER BY created_at ASC",
        )
        .bind(owner.actor_id)
        .bind(owner.actor_type)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list parent notifications", e))
    }

    async fn count_active_children(&self, parent_id: NotificationId) -> AppResult<i64> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM notifications \
             WHERE parent_ref = $1 AND lifecycle_status IN ('unread', 'read')",
        )
        .bind(parent_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("Failed to count children", e))
    }

    async fn archive_if_childless(&self, parent_id: NotificationId) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE notifications p \
             SET lifecycle_status = 'archived', updated_at = NOW() \
             WHERE p.id = $1 AND p.role = 'parent' \
               AND p.lifecycle_status IN ('unread', 'read') \
               AND NOT EXISTS ( \
                   SELECT 1 FROM notifications c \
                   WHERE c.parent_ref = p.id AND c.lifecycle_status IN ('unread', 'read'))",
        )
        .bind(parent_id)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to archive parent", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_status(
        &self,
        owner: &Owner,
        id: NotificationId,
        status: LifecycleStatus,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE notifications SET lifecycle_status = $4, updated_at = NOW() \
             WHERE id = $1 AND actor_id = $2 AND actor_type = $3 AND lifecycle_status <> $4",
        )
        .bind(id)
        .bind(owner.actor_id)
        .bind(owner.actor_type)
        .bind(status)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to update notification status", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_visible(&self, owner: &Owner, limit: i64) -> AppResult<Vec<Notification>> {
        sqlx::query_as::<_, Notification>(
            "SELECT * FROM notifications \
             WHERE actor_id = $1 AND actor_type = $2 AND visible \
               AND lifecycle_status IN ('unread', 'read') \
             ORDER BY created_at DESC LIMIT $3",
        )
        .bind(owner.actor_id)
        .bind(owner.actor_type)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list notifications", e))
    }

    async fn list_children(&self, parent_id: NotificationId) -> AppResult<Vec<Notification>> {
        sqlx::query_as::<_, Notification>(
            "SELECT * FROM notifications WHERE parent_ref = $1 ORDER BY created_at ASC, id ASC",
        )
        .bind(parent_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list children", e))
    }

    async fn list_owners(&self, actor_type: Option<ActorType>) -> AppResult<Vec<Owner>> {
        sqlx::query_as::<_, Owner>(
            "SELECT DISTINCT actor_id, actor_type FROM notifications \
             WHERE ($1::actor_type IS NULL OR actor_type = $1) \
               AND lifecycle_status IN ('unread', 'read') \
             ORDER BY actor_type, actor_id",
        )
        .bind(actor_type)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to list owners", e))
    }

    async fn try_lease_owner(&self, owner: &Owner) -> AppResult<Option<OwnerLease>> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| db_error("Failed to acquire lease connection", e))?;
        let key = advisory_key(owner);

        let acquired = sqlx::query_scalar::<_, bool>(
            "SELECT pg_try_advisory_lock(hashtextextended($1, 0))",
        )
        .bind(key.as_str())
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| db_error("Failed to take aggregation lease", e))?;

        Ok(acquired.then(|| OwnerLease::postgres(*owner, conn, key)))
    }
}
