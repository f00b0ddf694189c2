//! Attaching snapshot children to their parent.

use std::sync::Arc;

use portal_core::result::AppResult;
use portal_core::types::{GroupKey, NotificationId};
use portal_database::NotificationStore;
use portal_entity::{Notification, NotificationRole};

/// Links the children of one aggregate snapshot to their parent.
#[derive(Debug, Clone)]
pub struct ChildLinker {
    store: Arc<dyn NotificationStore>,
}

impl ChildLinker {
    /// Create a linker over `store`.
    pub fn new(store: Arc<dyn NotificationStore>) -> Self {
        Self { store }
    }

    /// Make every notification of `snapshot` a hidden child of `parent_id`.
    ///
    /// Only rows of the snapshot are touched, and rows already linked are
    /// skipped. Returns how many rows changed.
    pub async fn link(
        &self,
        parent_id: NotificationId,
        group_key: &GroupKey,
        snapshot: &[Notification],
    ) -> AppResult<u64> {
        let pending: Vec<NotificationId> = snapshot
            .iter()
            .filter(|n| !is_linked_to(n, parent_id))
            .map(|n| n.id)
            .collect();

        if pending.is_empty() {
            return Ok(0);
        }

        self.store
            .link_children(parent_id, group_key, &pending)
            .await
    }
}

fn is_linked_to(notification: &Notification, parent_id: NotificationId) -> bool {
    notification.role == NotificationRole::Child
        && notification.parent_ref == Some(parent_id)
        && !notification.visible
}
