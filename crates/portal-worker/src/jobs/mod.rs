//! Built-in job handler implementations.

pub mod aggregation;
pub mod maintenance;

pub use aggregation::{AggregationSweepHandler, AggregationTriggerHandler, TriggerPayload};
pub use maintenance::SlotPruneHandler;

/// Job type of per-owner aggregation triggers.
pub const AGGREGATION_TRIGGER: &str = "aggregation_trigger";

/// Job type of the reconciliation safety sweep.
pub const AGGREGATION_SWEEP: &str = "aggregation_sweep";

/// Job type of coordinator slot pruning.
pub const SLOT_PRUNE: &str = "slot_prune";
