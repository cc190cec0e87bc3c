//! Scheduler error types.

use convoy_id::{NodeId, StateIndex};
use convoy_reconcile::SnapshotFileError;
use thiserror::Error;

/// State store errors.
#[derive(Debug, Error)]
pub enum StateError {
    #[error(transparent)]
    Snapshot(#[from] SnapshotFileError),

    #[error("node not found: {0}")]
    NodeNotFound(NodeId),
}

/// Plan application errors.
#[derive(Debug, Error)]
pub enum PlanApplyError {
    /// The job changed after the plan's snapshot was taken.
    #[error("stale plan for job {job_id}: computed at index {plan_index}, job modified at {modify_index}")]
    Stale {
        job_id: String,
        plan_index: StateIndex,
        modify_index: StateIndex,
    },
}

impl PlanApplyError {
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::Stale { .. })
    }
}
