//! Business grouping key.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The business entity id (case file, prospect, client) a notification is
/// aggregated under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type), sqlx(transparent))]
#[serde(transparent)]
pub struct GroupKey(String);

impl GroupKey {
    /// Build a key, rejecting blank values.
    pub fn parse(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else if trimmed.len() == value.len() {
            Some(Self(value))
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// Borrow the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_keys_are_rejected() {
        assert!(GroupKey::parse("").is_none());
        assert!(GroupKey::parse("   ").is_none());
    }

    #[test]
    fn test_keys_are_trimmed() {
        let key = GroupKey::parse(" case-42 ").expect("non-blank");
        assert_eq!(key.as_str(), "case-42");
    }
}
