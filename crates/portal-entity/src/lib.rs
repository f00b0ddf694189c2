//! # portal-entity
//!
//! Domain entity models for the portal notification engine. `Notification`
//! is the only persisted entity; everything else in this crate is a closed
//! enum or value object stored inside it.

pub mod actor;
pub mod notification;

pub use actor::{ActorType, Owner};
pub use notification::{
    LifecycleStatus, NewNotification, NewParent, Notification, NotificationPayload,
    NotificationRole, ParentUpdate, PayloadBody, Priority, Subject, SubjectKind, SummaryDetails,
    SummaryEntry,
};
