//! Store-wide exclusive lease on one owner's aggregation.
//!
//! Every process running passes against the same store takes the owner's
//! lease first, so passes of one owner never overlap even across a server,
//! its replicas and the CLI. On PostgreSQL the lease is a session advisory
//! lock held on a dedicated pooled connection.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex};

use sqlx::Postgres;
use sqlx::pool::PoolConnection;

use portal_entity::Owner;

/// Advisory lock key text for `owner`; hashed server side.
pub(crate) fn advisory_key(owner: &Owner) -> String {
    format!("notification-aggregation:{owner}")
}

/// Owners currently leased from an in-memory store.
pub(crate) type HeldOwners = Arc<Mutex<HashSet<Owner>>>;

/// An exclusive lease on one owner, released on [`OwnerLease::release`]
/// or drop.
pub struct OwnerLease {
    owner: Owner,
    inner: LeaseInner,
}

enum LeaseInner {
    Postgres {
        conn: Option<PoolConnection<Postgres>>,
        key: String,
    },
    Memory {
        held: HeldOwners,
    },
}

impl OwnerLease {
    pub(crate) fn postgres(owner: Owner, conn: PoolConnection<Postgres>, key: String) -> Self {
        Self {
            owner,
            inner: LeaseInner::Postgres {
                conn: Some(conn),
                key,
            },
        }
    }

    pub(crate) fn memory(owner: Owner, held: HeldOwners) -> Self {
        Self {
            owner,
            inner: LeaseInner::Memory { held },
        }
    }

    /// The leased owner.
    pub fn owner(&self) -> Owner {
        self.owner
    }

    /// Release the lease and return its connection to the pool.
    pub async fn release(mut self) {
        let LeaseInner::Postgres { conn, key } = &mut self.inner else {
            return;
        };
        if let Some(mut held) = conn.take() {
            let unlocked = sqlx::query_scalar::<_, bool>(
                "SELECT pg_advisory_unlock(hashtextextended($1, 0))",
            )
            .bind(key.as_str())
            .fetch_one(&mut *held)
            .await;

            match unlocked {
                Ok(true) => {}
                Ok(false) => {
                    tracing::warn!(owner = %self.owner, "Advisory lock was not held at release");
                }
                Err(e) => {
                    tracing::warn!(owner = %self.owner, error = %e, "Failed to release advisory lock, closing connection");
                    drop(held.detach());
                }
            }
        }
    }
}

impl Drop for OwnerLease {
    fn drop(&mut self) {
        match &mut self.inner {
            // Closing the session frees its advisory locks.
            LeaseInner::Postgres { conn, .. } => {
                if let Some(held) = conn.take() {
                    drop(held.detach());
                }
            }
            LeaseInner::Memory { held } => {
                if let Ok(mut owners) = held.lock() {
                    owners.remove(&self.owner);
                }
            }
        }
    }
}

impl fmt::Debug for OwnerLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let backend = match self.inner {
            LeaseInner::Postgres { .. } => "postgres",
            LeaseInner::Memory { .. } => "memory",
        };
        f.debug_struct("OwnerLease")
            .field("owner", &self.owner)
            .field("backend", &backend)
            .finish()
    }
}
