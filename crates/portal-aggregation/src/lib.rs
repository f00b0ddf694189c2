//! # portal-aggregation
//!
//! Folds fine-grained notifications about the same business entity into
//! one parent summary per owner, keeps that summary in step with its
//! children, and archives parents left without children.
//!
//! A pass for one owner runs [`GroupingKeyResolver`] over the owner's
//! active notifications, [`summarize`] per group, then
//! [`ParentUpsertEngine`] and [`ChildLinker`]. [`AggregationCoordinator`]
//! serializes passes per owner; [`OrphanReconciler`] repairs drift.

pub mod aggregate;
pub mod coordinator;
pub mod engine;
pub mod linker;
pub mod policy;
pub mod reconciler;
pub mod resolver;
pub mod service;
pub mod upsert;

pub use aggregate::{Aggregate, summarize};
pub use coordinator::{
    AggregationCoordinator, SweepAllReport, SweepOutcome, TriggerOutcome, TriggerReason,
};
pub use engine::{AggregationEngine, PassReport};
pub use linker::ChildLinker;
pub use policy::{AggregationPolicy, policy_for};
pub use reconciler::{OrphanReconciler, SweepReport};
pub use resolver::{GroupingKeyResolver, Resolution};
pub use service::{AggregateView, AggregationService, SweepResult, SweepScope};
pub use upsert::{ParentUpsertEngine, UpsertAction, UpsertOutcome};
