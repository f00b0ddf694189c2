//! Table and JSON output formatting for CLI commands.

use serde::Serialize;
use tabled::{Table, Tabled};

use portal_entity::Notification;

/// Output format selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// JSON output
    Json,
}

/// One notification as a table row.
#[derive(Debug, Serialize, Tabled)]
pub struct NotificationRow {
    /// Notification id
    pub id: String,
    /// Kind code
    pub kind: String,
    /// Priority
    pub priority: String,
    /// Lifecycle status
    pub status: String,
    /// Structural role
    pub role: String,
    /// Grouping key, if aggregated
    pub group_key: String,
    /// Children of a parent
    pub children: i32,
    /// Display title
    pub title: String,
    /// Creation time
    pub created_at: String,
}

impl From<&Notification> for NotificationRow {
    fn from(n: &Notification) -> Self {
        Self {
            id: n.id.to_string(),
            kind: n.kind.clone(),
            priority: n.priority.to_string(),
            status: n.lifecycle_status.to_string(),
            role: n.role.to_string(),
            group_key: n
                .group_key
                .as_ref()
                .map(|k| k.as_str().to_string())
                .unwrap_or_default(),
            children: n.children_count,
            title: n.payload.title.clone(),
            created_at: n.created_at.format("%Y-%m-%d %H:%M").to_string(),
        }
    }
}

/// Print a list of items in the selected format
pub fn print_list<T: Serialize + Tabled>(items: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if items.is_empty() {
                println!("No results found.");
            } else {
                println!("{}", Table::new(items));
            }
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(items).unwrap_or_else(|_| "[]".to_string());
            println!("{json}");
        }
    }
}

/// Print a single item in the selected format
///
/// In table mode, top-level fields are printed as key/value lines and
/// nested values as compact JSON.
pub fn print_item<T: Serialize>(item: &T, format: OutputFormat) {
    let value = serde_json::to_value(item).unwrap_or(serde_json::Value::Null);
    match format {
        OutputFormat::Table => match value {
            serde_json::Value::Object(fields) => {
                for (key, field) in &fields {
                    match field {
                        serde_json::Value::String(s) => print_kv(key, s),
                        serde_json::Value::Null => print_kv(key, "-"),
                        other => print_kv(key, &other.to_string()),
                    }
                }
            }
            other => println!("{other}"),
        },
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&value).unwrap_or_else(|_| "{}".to_string());
            println!("{json}");
        }
    }
}

/// Print a success message
pub fn print_success(msg: &str) {
    println!("✓ {msg}");
}

/// Print an error message
pub fn print_error(msg: &str) {
    eprintln!("✗ {msg}");
}

/// Print a key-value pair
pub fn print_kv(key: &str, value: &str) {
    println!("  {:<24} {}", format!("{key}:"), value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use portal_core::types::{ActorId, GroupKey, NotificationId};
    use portal_entity::{
        ActorType, LifecycleStatus, NotificationPayload, NotificationRole, Priority,
    };
    use sqlx::types::Json;

    #[test]
    fn test_row_from_parent() {
        let now = Utc::now();
        let parent = Notification {
            id: NotificationId::new(),
            actor_id: ActorId::new(),
            actor_type: ActorType::Client,
            kind: "client_dossier_actions_summary".into(),
            priority: Priority::High,
            lifecycle_status: LifecycleStatus::Unread,
            role: NotificationRole::Parent,
            group_key: GroupKey::parse("case-42"),
            parent_ref: None,
            children_count: 3,
            visible: true,
            payload: Json(NotificationPayload::event("📋 TICPE - 3 action(s)", "", None)),
            created_at: now,
            updated_at: now,
        };

        let row = NotificationRow::from(&parent);
        assert_eq!(row.group_key, "case-42");
        assert_eq!(row.role, "parent");
        assert_eq!(row.priority, "high");
        assert_eq!(row.children, 3);
    }
}
