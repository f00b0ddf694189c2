//! The notification trigger publishes change events for the listener.

use std::time::Duration;

use chrono::Utc;
use sqlx::postgres::PgListener;

use portal_database::NotificationStore;
use portal_database::migration::NOTIFICATION_CHANNEL as CHANNEL;
use portal_entity::{ActorType, LifecycleStatus, Priority};
use portal_worker::listener::{EventOp, parse_event};

use crate::helpers::TestDb;

async fn next_event_for(
    listener: &mut PgListener,
    db: &TestDb,
) -> portal_worker::listener::NotificationEvent {
    loop {
        let notification = tokio::time::timeout(Duration::from_secs(5), listener.recv())
            .await
            .expect("event within timeout")
            .expect("receive");
        let event = parse_event(notification.payload()).expect("parse event");
        if event.actor_id == db.owner.actor_id {
            return event;
        }
    }
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_insert_and_status_change_are_published() {
    let db = TestDb::new(ActorType::Expert).await;
    let mut listener = PgListener::connect_with(&db.pool).await.expect("listener");
    listener.listen(CHANNEL).await.expect("listen");

    let n = db
        .add_dossier_event("expert_new_assignment", Priority::High, "case-9", Utc::now())
        .await;
    let created = next_event_for(&mut listener, &db).await;
    assert_eq!(created.op, EventOp::Created);
    assert_eq!(created.actor_type, ActorType::Expert);

    db.store
        .set_status(&db.owner, n.id, LifecycleStatus::Read)
        .await
        .expect("mark read");
    let changed = next_event_for(&mut listener, &db).await;
    assert_eq!(changed.op, EventOp::StatusChanged);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_parent_insert_is_not_published() {
    let db = TestDb::new(ActorType::Client).await;
    let mut listener = PgListener::connect_with(&db.pool).await.expect("listener");
    listener.listen(CHANNEL).await.expect("listen");

    db.store
        .insert_parent(&db.new_parent("case-10"))
        .await
        .expect("parent");

    let received = tokio::time::timeout(Duration::from_millis(500), listener.recv()).await;
    if let Ok(Ok(notification)) = received {
        let event = parse_event(notification.payload()).expect("parse event");
        assert_ne!(event.actor_id, db.owner.actor_id);
    }
}
