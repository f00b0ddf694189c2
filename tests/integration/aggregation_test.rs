//! Aggregation passes racing across independent coordinators, the way two
//! server processes would share one database.

use chrono::{Duration, Utc};

use portal_aggregation::TriggerOutcome;
use portal_database::NotificationStore;
use portal_entity::{ActorType, LifecycleStatus, Priority};

use crate::helpers::TestDb;

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_racing_processes_leave_one_parent() {
    let db = TestDb::new(ActorType::Client).await;
    let now = Utc::now();
    for (i, kind) in ["document_validated", "document_rejected", "deadline_approaching"]
        .iter()
        .enumerate()
    {
        db.add_dossier_event(kind, Priority::Medium, "case-42", now - Duration::hours(i as i64))
            .await;
    }

    let first = db.service();
    let second = db.service();
    let (a, b) = tokio::join!(
        first.trigger_aggregation(db.owner),
        second.trigger_aggregation(db.owner)
    );
    let a = a.expect("first pass");
    let b = b.expect("second pass");

    let parents = db.store.list_active_parents(&db.owner).await.expect("parents");
    assert_eq!(parents.len(), 1);
    assert_eq!(parents[0].children_count, 3);

    let created = [a, b]
        .iter()
        .filter(|o| matches!(o, TriggerOutcome::Ran(r) if r.parents_created == 1))
        .count();
    assert_eq!(created, 1);

    let visible = db.store.list_visible(&db.owner, 50).await.expect("visible");
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].id, parents[0].id);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_status_change_archives_emptied_parent() {
    let db = TestDb::new(ActorType::Client).await;
    let service = db.service();
    let child = db
        .add_dossier_event("document_validated", Priority::Low, "case-7", Utc::now())
        .await;

    service
        .trigger_aggregation(db.owner)
        .await
        .expect("aggregate");

    let report = service
        .set_status(db.owner, child.id, LifecycleStatus::Archived)
        .await
        .expect("archive child");
    assert_eq!(report.parents_archived, 1);

    let parents = db.store.list_active_parents(&db.owner).await.expect("parents");
    assert!(parents.is_empty());
}
