//! Notification domain entities.

pub mod draft;
pub mod model;
pub mod payload;
pub mod priority;
pub mod status;

pub use draft::{NewNotification, NewParent, ParentUpdate};
pub use model::Notification;
pub use payload::{
    NotificationPayload, PayloadBody, Subject, SubjectKind, SummaryDetails, SummaryEntry,
};
pub use priority::Priority;
pub use status::{LifecycleStatus, NotificationRole};
