//! Core type definitions used across the portal workspace.

pub mod group_key;
pub mod id;

pub use group_key::GroupKey;
pub use id::*;
