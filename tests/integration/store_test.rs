//! PostgreSQL store contract: the live-parent uniqueness rule, linking
//! and atomic archiving.

use chrono::Utc;

use portal_database::{NotificationStore, PgNotificationStore};
use portal_entity::{ActorType, LifecycleStatus, NotificationRole, Priority};

use crate::helpers::TestDb;

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_second_unread_parent_is_a_conflict() {
    let db = TestDb::new(ActorType::Client).await;

    db.store
        .insert_parent(&db.new_parent("case-1"))
        .await
        .expect("first parent");
    let err = db
        .store
        .insert_parent(&db.new_parent("case-1"))
        .await
        .expect_err("duplicate parent");

    assert!(err.is_conflict());
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_read_parent_frees_the_group_key() {
    let db = TestDb::new(ActorType::Client).await;

    let first = db
        .store
        .insert_parent(&db.new_parent("case-2"))
        .await
        .expect("first parent");
    db.store
        .set_status(&db.owner, first.id, LifecycleStatus::Read)
        .await
        .expect("mark read");

    let second = db
        .store
        .insert_parent(&db.new_parent("case-2"))
        .await
        .expect("unread parent after read one");
    assert_ne!(first.id, second.id);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_link_children_is_idempotent() {
    let db = TestDb::new(ActorType::Client).await;
    let now = Utc::now();
    let a = db
        .add_dossier_event("document_validated", Priority::Low, "case-3", now)
        .await;
    let b = db
        .add_dossier_event("document_rejected", Priority::High, "case-3", now)
        .await;
    let parent = db
        .store
        .insert_parent(&db.new_parent("case-3"))
        .await
        .expect("parent");
    let key = parent.group_key.clone().expect("group key");

    let linked = db
        .store
        .link_children(parent.id, &key, &[a.id, b.id])
        .await
        .expect("link");
    let relinked = db
        .store
        .link_children(parent.id, &key, &[a.id, b.id])
        .await
        .expect("relink");

    assert_eq!(linked, 2);
    assert_eq!(relinked, 0);

    let children = db.store.list_children(parent.id).await.expect("children");
    assert_eq!(children.len(), 2);
    assert!(children.iter().all(|c| c.role == NotificationRole::Child && !c.visible));

    let candidates = db.store.list_candidates(&db.owner).await.expect("candidates");
    assert!(candidates.iter().all(|c| c.role != NotificationRole::Parent));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_archive_only_when_childless() {
    let db = TestDb::new(ActorType::Client).await;
    let child = db
        .add_dossier_event("document_validated", Priority::Low, "case-4", Utc::now())
        .await;
    let parent = db
        .store
        .insert_parent(&db.new_parent("case-4"))
        .await
        .expect("parent");
    let key = parent.group_key.clone().expect("group key");
    db.store
        .link_children(parent.id, &key, &[child.id])
        .await
        .expect("link");

    assert!(!db.store.archive_if_childless(parent.id).await.expect("archive"));

    db.store
        .set_status(&db.owner, child.id, LifecycleStatus::Archived)
        .await
        .expect("archive child");
    assert_eq!(db.store.count_active_children(parent.id).await.expect("count"), 0);
    assert!(db.store.archive_if_childless(parent.id).await.expect("archive"));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_set_status_reports_no_change() {
    let db = TestDb::new(ActorType::Client).await;
    let n = db
        .add_dossier_event("document_validated", Priority::Low, "case-5", Utc::now())
        .await;

    assert!(
        db.store
            .set_status(&db.owner, n.id, LifecycleStatus::Read)
            .await
            .expect("first change")
    );
    assert!(
        !db.store
            .set_status(&db.owner, n.id, LifecycleStatus::Read)
            .await
            .expect("second change")
    );
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_owner_lease_excludes_other_sessions() {
    let db = TestDb::new(ActorType::Client).await;
    let other = PgNotificationStore::new(db.pool.clone());

    let lease = db
        .store
        .try_lease_owner(&db.owner)
        .await
        .expect("lease")
        .expect("free owner");
    assert!(other.try_lease_owner(&db.owner).await.expect("lease").is_none());

    lease.release().await;
    let again = other
        .try_lease_owner(&db.owner)
        .await
        .expect("lease")
        .expect("released owner");
    again.release().await;
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_reviving_parent_conflicts_with_live_one() {
    let db = TestDb::new(ActorType::Client).await;

    let first = db
        .store
        .insert_parent(&db.new_parent("case-5"))
        .await
        .expect("first parent");
    db.store
        .set_status(&db.owner, first.id, LifecycleStatus::Archived)
        .await
        .expect("archive");
    db.store
        .insert_parent(&db.new_parent("case-5"))
        .await
        .expect("replacement parent");

    let err = db
        .store
        .set_status(&db.owner, first.id, LifecycleStatus::Unread)
        .await
        .expect_err("second live parent");
    assert!(err.is_conflict());
}
