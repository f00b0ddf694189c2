//! Actor types and notification ownership.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use portal_core::types::ActorId;

/// The kind of portal user a notification belongs to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "actor_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ActorType {
    /// A company owning one or more fiscal-optimization case files.
    Client,
    /// An expert assigned to client case files.
    Expert,
    /// A business referrer bringing prospects.
    Apporteur,
    /// A platform administrator.
    Admin,
}

impl ActorType {
    /// Every actor type, in a stable order.
    pub const ALL: [ActorType; 4] = [Self::Client, Self::Expert, Self::Apporteur, Self::Admin];

    /// Return the actor type as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Expert => "expert",
            Self::Apporteur => "apporteur",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for ActorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ActorType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "client" => Ok(Self::Client),
            "expert" => Ok(Self::Expert),
            "apporteur" => Ok(Self::Apporteur),
            "admin" => Ok(Self::Admin),
            other => Err(format!("unknown actor type '{other}'")),
        }
    }
}

/// Who sees a notification: one actor of one actor type.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, FromRow,
)]
pub struct Owner {
    /// The owning actor.
    pub actor_id: ActorId,
    /// The owning actor's type.
    pub actor_type: ActorType,
}

impl Owner {
    /// Create an owner.
    pub fn new(actor_id: ActorId, actor_type: ActorType) -> Self {
        Self {
            actor_id,
            actor_type,
        }
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.actor_type, self.actor_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actor_type_parse() {
        assert_eq!("Apporteur".parse::<ActorType>(), Ok(ActorType::Apporteur));
        assert!("partner".parse::<ActorType>().is_err());
    }
}
