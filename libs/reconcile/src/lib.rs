//! Allocation reconciliation.
//!
//! Given a job's desired task group counts and the allocations currently in
//! the cluster, the reconciler decides what to place, stop, migrate, and
//! ignore. Key concepts:
//!
//! - **Taint**: a node that is down, draining, or unknown. Live allocations
//!   on it either migrate (on request) or are lost (node down).
//! - **Terminal policy**: finished allocations are kept, ignored, or
//!   rescheduled depending on the job type.
//! - **Stable naming**: every allocation is `{job}.{group}[{index}]`, and
//!   replacements reuse the index of the allocation they replace.
//!
//! # Invariants
//!
//! - Reconciliation is a pure function of its snapshot and never fails
//! - Every allocation lands in exactly one category per pass
//! - Reconciling a converged snapshot yields an empty plan

mod alloc_set;
mod name;
mod name_index;
mod plan;
mod reconciler;
mod snapshot_file;
mod structs;
mod taint;
mod terminal;

pub use alloc_set::AllocSet;
pub use name::{alloc_name, AllocName, AllocNameError};
pub use name_index::{bitmap_from, Bitmap, NameIndex};
pub use plan::{
    DesiredUpdates, GroupPlan, MigrateIntent, Placement, PlacementReason, Plan, StopIntent,
    StopReason,
};
pub use reconciler::{AllocCategory, GroupClassification, Reconciler};
pub use snapshot_file::{read_snapshot, SnapshotFileError};
pub use structs::{
    Allocation, ClientStatus, DesiredStatus, DesiredTransition, DrainStrategy, Job, JobType, Node,
    NodeStatus, Snapshot, TaskGroup, TaskLifecycle, TaskState,
};
pub use taint::{classify_taint, NodeLookup, NodeTable, Taint, TaintReason, TaintSplit};
pub use terminal::{should_filter, TerminalOutcome};

/// Reconciles one job in a snapshot.
pub fn reconcile(snapshot: &Snapshot, job_id: &str) -> Plan {
    let nodes = snapshot.node_table();
    Reconciler::from_snapshot(snapshot, job_id, &nodes).compute()
}
