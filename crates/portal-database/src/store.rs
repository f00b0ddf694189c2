//! The notification store abstraction the aggregation engine runs against.

use async_trait::async_trait;

use portal_core::result::AppResult;
use portal_core::types::{GroupKey, NotificationId};
use portal_entity::{
    ActorType, LifecycleStatus, NewNotification, NewParent, Notification, Owner, ParentUpdate,
};

use crate::lease::OwnerLease;

/// Repository over the single notification table.
///
/// "Active" means `lifecycle_status` is `unread` or `read`. The one live
/// parent of an `(owner, group_key)` pair is the parent whose status is
/// `unread`; implementations must reject a second one with an
/// [`ErrorKind::Conflict`](portal_core::error::ErrorKind::Conflict) error.
#[async_trait]
pub trait NotificationStore: Send + Sync + std::fmt::Debug {
    /// Insert a standalone notification on behalf of a producer.
    async fn insert(&self, new: &NewNotification) -> AppResult<Notification>;

    /// Find a notification by id.
    async fn find_by_id(&self, id: NotificationId) -> AppResult<Option<Notification>>;

    /// Active, non-parent notifications of `owner`, oldest first.
    async fn list_candidates(&self, owner: &Owner) -> AppResult<Vec<Notification>>;

    /// The unread parent for `(owner, group_key)`, if any.
    async fn find_active_parent(
        &self,
        owner: &Owner,
        group_key: &GroupKey,
    ) -> AppResult<Option<Notification>>;

    /// Create an unread, visible parent.
    ///
    /// Returns a `Conflict` error when an unread parent already exists for
    /// the same owner and group key.
    async fn insert_parent(&self, parent: &NewParent) -> AppResult<Notification>;

    /// Rewrite a parent's aggregate fields in place.
    async fn update_parent(
        &self,
        id: NotificationId,
        update: &ParentUpdate,
    ) -> AppResult<Notification>;

    /// Attach `child_ids` to `parent_id`: role child, hidden, grouped.
    ///
    /// Returns how many rows changed.
    async fn link_children(
        &self,
        parent_id: NotificationId,
        group_key: &GroupKey,
        child_ids: &[NotificationId],
    ) -> AppResult<u64>;

    /// Parents of `owner` that are unread or read.
    async fn list_active_parents(&self, owner: &Owner) -> AppResult<Vec<Notification>>;

    /// Number of active children pointing at `parent_id`.
    async fn count_active_children(&self, parent_id: NotificationId) -> AppResult<i64>;

    /// Archive the parent if, at write time, it has no active child.
    ///
    /// Returns whether the parent was archived.
    async fn archive_if_childless(&self, parent_id: NotificationId) -> AppResult<bool>;

    /// Set the lifecycle status of one of `owner`'s notifications.
    async fn set_status(
        &self,
        owner: &Owner,
        id: NotificationId,
        status: LifecycleStatus,
    ) -> AppResult<bool>;

    /// Visible, active notifications of `owner`, newest first.
    async fn list_visible(&self, owner: &Owner, limit: i64) -> AppResult<Vec<Notification>>;

    /// All children pointing at `parent_id`, oldest first.
    async fn list_children(&self, parent_id: NotificationId) -> AppResult<Vec<Notification>>;

    /// Owners holding at least one active notification.
    async fn list_owners(&self, actor_type: Option<ActorType>) -> AppResult<Vec<Owner>>;

    /// Take the store-wide lease on `owner`'s aggregation without waiting.
    ///
    /// Returns `None` while any holder, in this process or another, has it.
    async fn try_lease_owner(&self, owner: &Owner) -> AppResult<Option<OwnerLease>>;
}
