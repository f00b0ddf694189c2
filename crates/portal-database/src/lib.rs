//! # portal-database
//!
//! PostgreSQL connection management, migrations, and the notification
//! store: the [`NotificationStore`] repository trait plus a PostgreSQL and
//! an in-memory implementation.

pub mod connection;
mod error;
pub mod lease;
pub mod memory;
pub mod migration;
pub mod repositories;
pub mod store;

pub use connection::DatabasePool;
pub use lease::OwnerLease;
pub use memory::MemoryNotificationStore;
pub use repositories::PgNotificationStore;
pub use store::NotificationStore;
