//! Reconciliation plans.
//!
//! A [`Plan`] is the only output of a reconciliation pass: per task group,
//! what to place, what to stop, what to migrate, and what was ignored.
//! Applying it is the job of the plan-application layer.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use convoy_id::{AllocId, EvalId, StateIndex};
use serde::{Deserialize, Serialize};

use crate::structs::ClientStatus;
use crate::taint::TaintReason;

/// Why a new allocation is being placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementReason {
    /// The group is below its desired count.
    New,
    /// Replaces an allocation lost with its node.
    ReplaceLost,
    /// Replaces an allocation that failed.
    Reschedule,
}

impl PlacementReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::ReplaceLost => "replace-lost",
            Self::Reschedule => "reschedule",
        }
    }
}

impl std::fmt::Display for PlacementReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Intent to create an allocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub task_group: String,
    pub name: String,
    pub index: u32,

    /// Allocation this placement replaces.
    pub previous_alloc: Option<AllocId>,

    pub reason: PlacementReason,
}

/// Why an allocation is being stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The group has more allocations than desired.
    ScaleDown,
    /// The allocation's node is down.
    Lost,
    /// The job was stopped or deregistered.
    JobStopped,
    /// The task group no longer exists in the job.
    GroupRemoved,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ScaleDown => "alloc not needed due to task group count decrease",
            Self::Lost => "alloc is lost since its node is down",
            Self::JobStopped => "alloc not needed as job is stopped",
            Self::GroupRemoved => "alloc not needed as task group was removed",
        }
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Intent to stop an allocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopIntent {
    pub alloc_id: AllocId,
    pub reason: StopReason,

    /// Client status to record alongside the stop, e.g. `lost`.
    pub client_status: Option<ClientStatus>,
}

/// Intent to drain an allocation off its node and reschedule it under the
/// same name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrateIntent {
    pub alloc_id: AllocId,
    pub task_group: String,
    pub name: String,
    pub index: Option<u32>,
    pub reason: TaintReason,
}

/// Per-group counts of what the plan does.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredUpdates {
    pub place: u64,
    pub stop: u64,
    pub migrate: u64,
    pub ignore: u64,
    pub lost: u64,
    pub reschedule: u64,
    /// Untainted allocations left as they are.
    pub in_place: u64,
}

impl std::ops::AddAssign for DesiredUpdates {
    fn add_assign(&mut self, rhs: Self) {
        self.place += rhs.place;
        self.stop += rhs.stop;
        self.migrate += rhs.migrate;
        self.ignore += rhs.ignore;
        self.lost += rhs.lost;
        self.reschedule += rhs.reschedule;
        self.in_place += rhs.in_place;
    }
}

/// The plan for one task group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupPlan {
    pub place: Vec<Placement>,
    pub stop: Vec<StopIntent>,
    pub migrate: Vec<MigrateIntent>,

    /// Informational only.
    pub ignore: Vec<AllocId>,

    pub summary: DesiredUpdates,
}

impl GroupPlan {
    /// Returns true if the group plan has nothing to act on.
    pub fn is_noop(&self) -> bool {
        self.place.is_empty() && self.stop.is_empty() && self.migrate.is_empty()
    }
}

/// The plan for one job.
///
/// The reconciler fills in everything but the evaluation stamp, so the
/// same snapshot always yields an equal plan. Whoever runs the evaluation
/// stamps it with [`Plan::stamped`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub job_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eval_id: Option<EvalId>,

    /// State index of the snapshot the plan was computed from.
    pub snapshot_index: StateIndex,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    pub groups: BTreeMap<String, GroupPlan>,
}

impl Plan {
    pub fn new(job_id: impl Into<String>, snapshot_index: StateIndex) -> Self {
        Self {
            job_id: job_id.into(),
            eval_id: None,
            snapshot_index,
            created_at: None,
            groups: BTreeMap::new(),
        }
    }

    /// Records the evaluation that produced the plan.
    pub fn stamped(mut self, eval_id: EvalId, created_at: DateTime<Utc>) -> Self {
        self.eval_id = Some(eval_id);
        self.created_at = Some(created_at);
        self
    }

    /// Returns true if no group has anything to place, stop, or migrate.
    pub fn is_empty(&self) -> bool {
        self.groups.values().all(GroupPlan::is_noop)
    }

    pub fn placements(&self) -> impl Iterator<Item = &Placement> {
        self.groups.values().flat_map(|g| g.place.iter())
    }

    pub fn stops(&self) -> impl Iterator<Item = &StopIntent> {
        self.groups.values().flat_map(|g| g.stop.iter())
    }

    pub fn migrations(&self) -> impl Iterator<Item = &MigrateIntent> {
        self.groups.values().flat_map(|g| g.migrate.iter())
    }

    /// Sums the per-group summaries.
    pub fn totals(&self) -> DesiredUpdates {
        let mut totals = DesiredUpdates::default();
        for group in self.groups.values() {
            totals += group.summary;
        }
        totals
    }
}
