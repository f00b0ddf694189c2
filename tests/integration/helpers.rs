//! Shared test helpers for integration tests.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use portal_aggregation::{AggregationCoordinator, AggregationEngine, AggregationService};
use portal_core::config::{AggregationConfig, DatabaseConfig};
use portal_core::types::{ActorId, GroupKey};
use portal_database::{DatabasePool, NotificationStore, PgNotificationStore};
use portal_entity::{
    ActorType, NewNotification, NewParent, Notification, NotificationPayload, Owner,
    ParentUpdate, Priority, Subject,
};

/// A migrated database and a fresh owner per test.
pub struct TestDb {
    /// Database pool for direct queries
    pub pool: PgPool,
    /// Store under test
    pub store: Arc<PgNotificationStore>,
    /// Owner of every row this test writes
    pub owner: Owner,
}

impl TestDb {
    /// Connect to `DATABASE_URL` and apply migrations
    pub async fn new(actor_type: ActorType) -> Self {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let config = DatabaseConfig {
            max_connections: 10,
            ..DatabaseConfig::for_url(url)
        };
        let pool = DatabasePool::connect(&config)
            .await
            .expect("Failed to connect to test database")
            .into_pool();

        portal_database::migration::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        Self {
            store: Arc::new(PgNotificationStore::new(pool.clone())),
            pool,
            owner: Owner::new(ActorId::new(), actor_type),
        }
    }

    /// A service with its own engine and coordinator, as a separate process would have
    pub fn service(&self) -> AggregationService {
        let config = AggregationConfig::default();
        let engine = Arc::new(AggregationEngine::new(self.store.clone(), &config));
        let coordinator = Arc::new(AggregationCoordinator::new(engine, &config));
        AggregationService::new(coordinator)
    }

    /// Insert a dossier event for the test owner
    pub async fn add_dossier_event(
        &self,
        kind: &str,
        priority: Priority,
        dossier: &str,
        created_at: DateTime<Utc>,
    ) -> Notification {
        self.store
            .insert(&NewNotification {
                owner: self.owner,
                kind: kind.into(),
                priority,
                payload: NotificationPayload::event(
                    "Événement",
                    "Détail",
                    Some(Subject::Dossier {
                        dossier_id: dossier.into(),
                        product_name: Some("TICPE".into()),
                        product_type: Some("ticpe".into()),
                    }),
                ),
                created_at: Some(created_at),
            })
            .await
            .expect("insert notification")
    }

    /// A bare parent for `key`
    pub fn new_parent(&self, key: &str) -> NewParent {
        NewParent {
            owner: self.owner,
            kind: "client_dossier_actions_summary".into(),
            group_key: GroupKey::parse(key).expect("group key"),
            fields: ParentUpdate {
                priority: Priority::Medium,
                children_count: 0,
                payload: NotificationPayload::event("📋 Dossier - 0 action(s)", "", None),
            },
        }
    }
}
