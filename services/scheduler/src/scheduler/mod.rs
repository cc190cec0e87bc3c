//! Evaluation scheduling and plan application.
//!
//! The scheduler is responsible for:
//! - Snapshotting cluster state on every tick
//! - Reconciling each job against that snapshot, several at a time
//! - Submitting non-empty plans through a [`PlanApplier`]

mod applier;
mod worker;

pub use applier::{ApplyResult, InMemoryApplier, PlanApplier};
pub use worker::{EvalStats, SchedulerWorker, WorkerConfig};
