//! Pure computation of a parent summary from its children.

use chrono::{DateTime, Utc};

use portal_core::types::GroupKey;
use portal_entity::{
    Notification, NotificationPayload, ParentUpdate, PayloadBody, Priority, SubjectKind,
    SummaryDetails, SummaryEntry,
};

use crate::policy::AggregationPolicy;

/// Number of kind labels listed before the overflow suffix.
const LABEL_LIMIT: usize = 3;

/// Age at which the parent title gets the warning badge.
const WARNING_AGE_DAYS: i64 = 2;

/// Age at which the parent title gets the urgent badge.
const URGENT_AGE_DAYS: i64 = 5;

/// Summary fields of one group at one evaluation time.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    /// Number of children.
    pub count: usize,
    /// Highest child priority.
    pub priority: Priority,
    /// Age in whole days of the oldest child.
    pub max_age_days: i64,
    /// Short list of child kind labels.
    pub label: String,
    /// Display name of the grouped entity.
    pub display_name: String,
    /// Per-child lines, oldest first.
    pub entries: Vec<SummaryEntry>,
}

impl Aggregate {
    /// Title shown on the parent.
    pub fn title(&self, policy: &AggregationPolicy) -> String {
        format!(
            "{} {} - {} {}(s)",
            age_badge(self.max_age_days),
            self.display_name,
            self.count,
            policy.noun
        )
    }

    /// The parent fields this aggregate produces.
    pub fn to_parent_update(
        &self,
        policy: &AggregationPolicy,
        group_key: &GroupKey,
        dimension: SubjectKind,
    ) -> ParentUpdate {
        ParentUpdate {
            priority: self.priority,
            children_count: i32::try_from(self.count).unwrap_or(i32::MAX),
            payload: NotificationPayload {
                title: self.title(policy),
                message: self.label.clone(),
                action_url: Some(policy.action_url(group_key)),
                body: PayloadBody::Summary(SummaryDetails {
                    group_key: group_key.clone(),
                    grouped_by: dimension,
                    display_name: self.display_name.clone(),
                    max_age_days: self.max_age_days,
                    entries: self.entries.clone(),
                }),
            },
        }
    }
}

/// Badge prefixed to the parent title, by age of the oldest child.
pub fn age_badge(max_age_days: i64) -> &'static str {
    if max_age_days >= URGENT_AGE_DAYS {
        "🚨"
    } else if max_age_days >= WARNING_AGE_DAYS {
        "⚠️"
    } else {
        "📋"
    }
}

/// Summarize `children` as of `now`.
///
/// Children are ordered oldest first (ties broken by id) so the result
/// depends only on the child set and `now`.
pub fn summarize(
    policy: &AggregationPolicy,
    dimension: SubjectKind,
    children: &[Notification],
    now: DateTime<Utc>,
) -> Aggregate {
    let mut ordered: Vec<&Notification> = children.iter().collect();
    ordered.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

    let priority = ordered
        .iter()
        .map(|n| n.priority)
        .max()
        .unwrap_or_default();

    let max_age_days = ordered
        .iter()
        .map(|n| n.age_days(now))
        .max()
        .unwrap_or(0);

    let display_name = ordered
        .iter()
        .filter_map(|n| n.payload.subject())
        .filter(|subject| subject.kind() == dimension)
        .find_map(|subject| subject.display_name())
        .unwrap_or(dimension.fallback_name())
        .to_string();

    let entries = ordered
        .iter()
        .map(|n| SummaryEntry {
            notification_id: n.id,
            kind: n.kind.clone(),
            priority: n.priority,
            age_days: n.age_days(now),
        })
        .collect();

    Aggregate {
        count: ordered.len(),
        priority,
        max_age_days,
        label: build_label(policy, &ordered),
        display_name,
        entries,
    }
}

fn build_label(policy: &AggregationPolicy, ordered: &[&Notification]) -> String {
    let mut labels: Vec<&str> = Vec::with_capacity(LABEL_LIMIT);
    for notification in ordered {
        let label = policy.label_for(&notification.kind);
        if !labels.contains(&label) {
            labels.push(label);
            if labels.len() == LABEL_LIMIT {
                break;
            }
        }
    }

    let mut label = labels.join(", ");
    if ordered.len() > LABEL_LIMIT {
        label.push_str(&format!(" +{} autre(s)", ordered.len() - LABEL_LIMIT));
    }
    label
}
