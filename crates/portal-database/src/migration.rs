//! Schema migrations embedded from the workspace `migrations/` directory.

use serde::Serialize;
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use tracing::info;

use portal_core::error::{AppError, ErrorKind};

use crate::error::db_error;

static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

/// Channel the migrated `notify_notification_event` trigger publishes on.
pub const NOTIFICATION_CHANNEL: &str = "notification_events";

/// Whether one embedded migration has been applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationStatus {
    /// Migration version (file prefix).
    pub version: i64,
    /// Migration description (file name without prefix).
    pub description: String,
    /// Whether the database records it as successfully applied.
    pub applied: bool,
}

/// Apply every pending migration.
pub async fn run_migrations(pool: &PgPool) -> Result<(), AppError> {
    info!(embedded = MIGRATOR.iter().count(), "Running database migrations");

    MIGRATOR.run(pool).await.map_err(|e| {
        AppError::with_source(
            ErrorKind::Database,
            format!("Failed to run migrations: {e}"),
            e,
        )
    })?;

    info!("Database migrations completed");
    Ok(())
}

/// Compare the embedded migrations with the ones recorded in the database.
pub async fn migration_status(pool: &PgPool) -> Result<Vec<MigrationStatus>, AppError> {
    let tracked: bool =
        sqlx::query_scalar("SELECT to_regclass('_sqlx_migrations') IS NOT NULL")
            .fetch_one(pool)
            .await
            .map_err(|e| db_error("Failed to inspect migration table", e))?;

    let applied: Vec<i64> = if tracked {
        sqlx::query_scalar("SELECT version FROM _sqlx_migrations WHERE success ORDER BY version")
            .fetch_all(pool)
            .await
            .map_err(|e| db_error("Failed to read applied migrations", e))?
    } else {
        Vec::new()
    };

    Ok(MIGRATOR
        .iter()
        .filter(|m| !m.migration_type.is_down_migration())
        .map(|m| MigrationStatus {
            version: m.version,
            description: m.description.to_string(),
            applied: applied.contains(&m.version),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_publishes_on_notification_channel() {
        let quoted = format!("'{NOTIFICATION_CHANNEL}'");
        assert!(
            MIGRATOR
                .iter()
                .any(|m| m.sql.contains("pg_notify") && m.sql.contains(quoted.as_str()))
        );
    }

    #[test]
    fn test_embedded_migrations_are_ordered() {
        let versions: Vec<i64> = MIGRATOR.iter().map(|m| m.version).collect();
        assert!(!versions.is_empty());
        assert!(versions.windows(2).all(|w| w[0] < w[1]));
    }
}
