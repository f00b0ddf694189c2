//! Typed notification payload.
//!
//! Stored as a single JSONB column. Producers write [`PayloadBody::Event`]
//! with the business [`Subject`] the event is about; the aggregation engine
//! writes [`PayloadBody::Summary`] on parents.

use serde::{Deserialize, Serialize};

use portal_core::types::{GroupKey, NotificationId};

use super::priority::Priority;

/// Display data shared by every notification plus a per-role body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPayload {
    /// Title text.
    pub title: String,
    /// Message text.
    pub message: String,
    /// Deep-link target in the portal UI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_url: Option<String>,
    /// Role-specific body.
    pub body: PayloadBody,
}

impl NotificationPayload {
    /// Build an event payload about `subject`.
    pub fn event(
        title: impl Into<String>,
        message: impl Into<String>,
        subject: Option<Subject>,
    ) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            action_url: None,
            body: PayloadBody::Event {
                subject,
                metadata: serde_json::Value::Null,
            },
        }
    }

    /// The business subject of an event payload.
    pub fn subject(&self) -> Option<&Subject> {
        match &self.body {
            PayloadBody::Event { subject, .. } => subject.as_ref(),
            PayloadBody::Summary(_) => None,
        }
    }

    /// The summary details of a parent payload.
    pub fn summary(&self) -> Option<&SummaryDetails> {
        match &self.body {
            PayloadBody::Summary(details) => Some(details),
            PayloadBody::Event { .. } => None,
        }
    }
}

/// Role-specific payload body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PayloadBody {
    /// An event produced by a workflow, upload handler, commission job, etc.
    Event {
        /// The business entity the event concerns.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        subject: Option<Subject>,
        /// Free-form producer metadata, never read by the engine.
        #[serde(default)]
        metadata: serde_json::Value,
    },
    /// Aggregate summary written on parent notifications.
    Summary(SummaryDetails),
}

/// Which kind of business entity a subject is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectKind {
    /// A fiscal-optimization case file.
    Dossier,
    /// A prospect brought by an apporteur.
    Prospect,
    /// A client company.
    Client,
}

impl SubjectKind {
    /// Name shown when the subject carries no display name.
    pub fn fallback_name(&self) -> &'static str {
        match self {
            Self::Dossier => "Dossier",
            Self::Prospect => "Prospect",
            Self::Client => "Client",
        }
    }

    /// Return the subject kind as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dossier => "dossier",
            Self::Prospect => "prospect",
            Self::Client => "client",
        }
    }
}

/// The business entity an event notification is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Subject {
    /// A case file (client produit).
    Dossier {
        /// Case-file identifier.
        dossier_id: String,
        /// Product name, e.g. "TICPE".
        #[serde(default)]
        product_name: Option<String>,
        /// Product type code.
        #[serde(default)]
        product_type: Option<String>,
    },
    /// A prospect.
    Prospect {
        /// Prospect identifier.
        prospect_id: String,
        /// Contact name.
        #[serde(default)]
        name: Option<String>,
        /// Company name.
        #[serde(default)]
        company: Option<String>,
    },
    /// A client company.
    Client {
        /// Client identifier.
        client_id: String,
        /// Contact name.
        #[serde(default)]
        name: Option<String>,
        /// Company name.
        #[serde(default)]
        company: Option<String>,
    },
}

impl Subject {
    /// The subject's kind.
    pub fn kind(&self) -> SubjectKind {
        match self {
            Self::Dossier { .. } => SubjectKind::Dossier,
            Self::Prospect { .. } => SubjectKind::Prospect,
            Self::Client { .. } => SubjectKind::Client,
        }
    }

    /// The subject's identifier, as written by the producer.
    pub fn id(&self) -> &str {
        match self {
            Self::Dossier { dossier_id, .. } => dossier_id,
            Self::Prospect { prospect_id, .. } => prospect_id,
            Self::Client { client_id, .. } => client_id,
        }
    }

    /// Human-readable name: company first, then contact or product name.
    pub fn display_name(&self) -> Option<&str> {
        match self {
            Self::Dossier { product_name, .. } => product_name.as_deref(),
            Self::Prospect { name, company, .. } | Self::Client { name, company, .. } => {
                company.as_deref().or(name.as_deref())
            }
        }
    }
}

/// Aggregate data stored on a parent notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryDetails {
    /// Grouping key of the children.
    pub group_key: GroupKey,
    /// Dimension the children were grouped by.
    pub grouped_by: SubjectKind,
    /// Display name of the grouped entity.
    pub display_name: String,
    /// Age in whole days of the oldest child at aggregation time.
    pub max_age_days: i64,
    /// One entry per aggregated child, oldest first.
    pub entries: Vec<SummaryEntry>,
}

/// Per-child line of a summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryEntry {
    /// The child notification.
    pub notification_id: NotificationId,
    /// The child's kind code.
    pub kind: String,
    /// The child's priority.
    pub priority: Priority,
    /// The child's age in whole days.
    pub age_days: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_payload_json_shape() {
        let payload = NotificationPayload::event(
            "Document validé",
            "Votre Kbis a été validé",
            Some(Subject::Dossier {
                dossier_id: "case-42".into(),
                product_name: Some("TICPE".into()),
                product_type: None,
            }),
        );
        let json = serde_json::to_value(&payload).expect("serialize");
        assert_eq!(json["body"]["type"], "event");
        assert_eq!(json["body"]["subject"]["kind"], "dossier");
        assert_eq!(json["body"]["subject"]["dossier_id"], "case-42");
        assert!(json.get("action_url").is_none());
    }

    #[test]
    fn test_display_name_prefers_company() {
        let subject = Subject::Prospect {
            prospect_id: "p-1".into(),
            name: Some("Jeanne Martin".into()),
            company: Some("Transports Martin".into()),
        };
        assert_eq!(subject.display_name(), Some("Transports Martin"));
        assert_eq!(subject.kind(), SubjectKind::Prospect);
    }

    #[test]
    fn test_event_without_subject_parses() {
        let payload: NotificationPayload = serde_json::from_value(serde_json::json!({
            "title": "t",
            "message": "m",
            "body": { "type": "event" }
        }))
        .expect("deserialize");
        assert!(payload.subject().is_none());
        assert!(payload.summary().is_none());
    }
}
