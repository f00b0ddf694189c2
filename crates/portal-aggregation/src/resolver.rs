//! Grouping key resolution.

use portal_core::types::GroupKey;
use portal_entity::{Notification, SubjectKind};

use crate::policy::AggregationPolicy;

/// Result of resolving one notification against a policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The notification belongs under `key`.
    Grouped {
        /// Business grouping key.
        key: GroupKey,
        /// Dimension the key was taken from.
        dimension: SubjectKind,
    },
    /// The kind does not take part in aggregation; stays standalone.
    NotAggregatable,
    /// The kind is aggregatable but the payload names no usable subject.
    MissingKey,
}

impl Resolution {
    /// The grouping key, when grouped.
    pub fn key(&self) -> Option<&GroupKey> {
        match self {
            Self::Grouped { key, .. } => Some(key),
            _ => None,
        }
    }
}

/// Derives the grouping key of notifications for one actor type.
#[derive(Debug, Clone, Copy)]
pub struct GroupingKeyResolver {
    policy: &'static AggregationPolicy,
}

impl GroupingKeyResolver {
    /// Create a resolver for `policy`.
    pub fn new(policy: &'static AggregationPolicy) -> Self {
        Self { policy }
    }

    /// Resolve the grouping key of `notification`.
    ///
    /// The subject must match one of the policy's dimensions, tried in
    /// order; a matching subject with a blank id counts as missing.
    pub fn resolve(&self, notification: &Notification) -> Resolution {
        if !self.policy.is_aggregatable(&notification.kind) {
            return Resolution::NotAggregatable;
        }

        let Some(subject) = notification.payload.subject() else {
            return Resolution::MissingKey;
        };

        self.policy
            .dimensions
            .iter()
            .find(|dimension| **dimension == subject.kind())
            .and_then(|dimension| {
                GroupKey::parse(subject.id()).map(|key| Resolution::Grouped {
                    key,
                    dimension: *dimension,
                })
            })
            .unwrap_or(Resolution::MissingKey)
    }
}
