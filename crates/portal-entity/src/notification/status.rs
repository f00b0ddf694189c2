//! Lifecycle status and structural role of a notification.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle status of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "lifecycle_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LifecycleStatus {
    /// Not yet seen.
    Unread,
    /// Seen but still pending.
    Read,
    /// Resolved or dismissed; kept as history.
    Archived,
    /// Superseded by a newer notification.
    Replaced,
}

impl LifecycleStatus {
    /// Whether a notification in this status still counts toward its parent.
    ///
    /// Read notifications remain active.
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Archived | Self::Replaced)
    }

    /// Return the status as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unread => "unread",
            Self::Read => "read",
            Self::Archived => "archived",
            Self::Replaced => "replaced",
        }
    }
}

impl fmt::Display for LifecycleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for LifecycleStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "unread" => Ok(Self::Unread),
            "read" => Ok(Self::Read),
            "archived" => Ok(Self::Archived),
            "replaced" => Ok(Self::Replaced),
            other => Err(format!("unknown lifecycle status '{other}'")),
        }
    }
}

/// Structural role of a notification. Mutually exclusive by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "notification_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum NotificationRole {
    /// Shown on its own.
    Standalone,
    /// Summary of a group of children.
    Parent,
    /// Folded into a parent and hidden from primary listings.
    Child,
}

impl NotificationRole {
    /// Return the role as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standalone => "standalone",
            Self::Parent => "parent",
            Self::Child => "child",
        }
    }
}

impl fmt::Display for NotificationRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_notifications_stay_active() {
        assert!(LifecycleStatus::Unread.is_active());
        assert!(LifecycleStatus::Read.is_active());
        assert!(!LifecycleStatus::Archived.is_active());
        assert!(!LifecycleStatus::Replaced.is_active());
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("Read".parse::<LifecycleStatus>(), Ok(LifecycleStatus::Read));
        assert!("deleted".parse::<LifecycleStatus>().is_err());
    }
}
