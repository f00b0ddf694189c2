//! Background processing for the portal aggregation engine.
//!
//! This crate provides:
//! - An in-process task queue fed by the cron scheduler and the listener
//! - A worker runner that drains the queue with bounded concurrency
//! - A job executor that dispatches tasks to the correct handler
//! - A PostgreSQL LISTEN loop turning store changes into aggregation triggers
//! - Job implementations for aggregation triggers, sweeps, and slot pruning

pub mod executor;
pub mod jobs;
pub mod listener;
pub mod queue;
pub mod runner;
pub mod scheduler;

pub use executor::{JobExecutionError, JobExecutor, JobHandler};
pub use listener::NotificationListener;
pub use queue::{ScheduledTask, TaskQueue};
pub use runner::WorkerRunner;
pub use scheduler::CronScheduler;
