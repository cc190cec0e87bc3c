//! Cluster data model read by the reconciler.
//!
//! Everything here is an input snapshot: the reconciler reads jobs, nodes,
//! and allocations but never mutates them. Durable changes happen
//! downstream, after a [`Plan`](crate::Plan) has been applied.

use std::collections::{BTreeMap, BTreeSet};

use convoy_id::{AllocId, NodeId, StateIndex};
use serde::{Deserialize, Serialize};

use crate::name;

// =============================================================================
// Jobs
// =============================================================================

/// Scheduling semantics of a job.
///
/// The terminal policy is keyed by this tag, see
/// [`should_filter`](crate::should_filter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    /// Long-running work that is replaced whenever it exits.
    Service,
    /// Run-to-completion work; a clean exit is final.
    Batch,
    /// Node-level daemons. Reconciled with service semantics.
    System,
}

impl JobType {
    /// Returns true for run-to-completion jobs.
    pub fn is_batch(&self) -> bool {
        matches!(self, Self::Batch)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Service => "service",
            Self::Batch => "batch",
            Self::System => "system",
        }
    }
}

impl std::fmt::Display for JobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named, horizontally scaled unit within a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskGroup {
    pub name: String,
    /// Desired number of instances.
    pub count: u32,
}

impl TaskGroup {
    pub fn new(name: impl Into<String>, count: u32) -> Self {
        Self {
            name: name.into(),
            count,
        }
    }
}

/// What the operator asked to run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// User-chosen job name; also the prefix of every allocation name.
    pub id: String,

    #[serde(rename = "type")]
    pub job_type: JobType,

    #[serde(default)]
    pub task_groups: Vec<TaskGroup>,

    /// Set when the operator stopped the job without purging it.
    #[serde(default)]
    pub stop: bool,
}

impl Job {
    /// Looks up a task group by name.
    pub fn task_group(&self, name: &str) -> Option<&TaskGroup> {
        self.task_groups.iter().find(|tg| tg.name == name)
    }
}

// =============================================================================
// Nodes
// =============================================================================

/// Node health as reported by the node's heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Initializing,
    Ready,
    Down,
    Disconnected,
}

impl NodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::Down => "down",
            Self::Disconnected => "disconnected",
        }
    }
}

impl std::fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Present on a node while it is being drained.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrainStrategy {
    /// Seconds allowed for the drain before remaining allocations are
    /// force-stopped. `None` means no deadline.
    #[serde(default)]
    pub deadline_secs: Option<u64>,

    /// Leave system job allocations in place.
    #[serde(default)]
    pub ignore_system_jobs: bool,
}

/// A cluster member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,

    #[serde(default)]
    pub name: String,

    pub status: NodeStatus,

    #[serde(default)]
    pub drain_strategy: Option<DrainStrategy>,
}

impl Node {
    /// Returns true while a drain is in progress.
    pub fn is_draining(&self) -> bool {
        self.drain_strategy.is_some()
    }

    /// Returns true if the node's status is final (down).
    pub fn is_down(&self) -> bool {
        self.status == NodeStatus::Down
    }

    /// Returns true if new work may be placed on this node.
    pub fn is_eligible(&self) -> bool {
        self.status == NodeStatus::Ready && !self.is_draining()
    }
}

// =============================================================================
// Allocations
// =============================================================================

/// Status reported by the client running the allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientStatus {
    Pending,
    Running,
    Complete,
    Failed,
    Lost,
}

impl ClientStatus {
    /// Returns true once the client will never run the allocation again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed | Self::Lost)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Complete => "complete",
            Self::Failed => "failed",
            Self::Lost => "lost",
        }
    }
}

impl std::fmt::Display for ClientStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status the servers want the allocation to have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DesiredStatus {
    Run,
    Stop,
    Evict,
}

impl DesiredStatus {
    /// Returns true if the servers no longer want the allocation running.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stop | Self::Evict)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Run => "run",
            Self::Stop => "stop",
            Self::Evict => "evict",
        }
    }
}

impl std::fmt::Display for DesiredStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transition intent set on an allocation by an operator or controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredTransition {
    #[serde(default)]
    pub migrate: Option<bool>,
}

impl DesiredTransition {
    /// A transition requesting migration.
    pub fn migrate() -> Self {
        Self {
            migrate: Some(true),
        }
    }

    pub fn should_migrate(&self) -> bool {
        self.migrate.unwrap_or(false)
    }
}

/// Lifecycle state of a single task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskLifecycle {
    Pending,
    Running,
    Dead,
}

/// Execution state of one task in an allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskState {
    pub state: TaskLifecycle,
    #[serde(default)]
    pub failed: bool,
}

impl TaskState {
    /// A task that exited cleanly.
    pub fn succeeded() -> Self {
        Self {
            state: TaskLifecycle::Dead,
            failed: false,
        }
    }

    /// A task that exited with a failure.
    pub fn failed() -> Self {
        Self {
            state: TaskLifecycle::Dead,
            failed: true,
        }
    }

    pub fn running() -> Self {
        Self {
            state: TaskLifecycle::Running,
            failed: false,
        }
    }

    /// Returns true if the task finished without failing.
    pub fn successful(&self) -> bool {
        self.state == TaskLifecycle::Dead && !self.failed
    }
}

/// A unit of placed work: one task group instance bound to a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub id: AllocId,
    pub job_id: String,
    pub task_group: String,

    /// `{job}.{group}[{index}]`; never changes for the allocation's lifetime.
    pub name: String,

    /// Node the allocation is or was placed on.
    #[serde(default)]
    pub node_id: Option<NodeId>,

    pub client_status: ClientStatus,
    pub desired_status: DesiredStatus,

    #[serde(default)]
    pub desired_transition: DesiredTransition,

    #[serde(default)]
    pub task_states: BTreeMap<String, TaskState>,

    /// State index at which the allocation was created.
    #[serde(default)]
    pub create_index: u64,

    /// Replacement created for this allocation, if any.
    #[serde(default)]
    pub next_allocation: Option<AllocId>,

    /// Allocation this one replaced, if any.
    #[serde(default)]
    pub previous_allocation: Option<AllocId>,
}

impl Allocation {
    /// Returns the instance index embedded in the name.
    ///
    /// Malformed names, or names whose prefix belongs to another job or
    /// group, carry no index.
    pub fn index(&self) -> Option<u32> {
        name::index_of(&self.job_id, &self.task_group, &self.name)
    }

    /// Returns true if either the servers or the client consider the
    /// allocation finished.
    pub fn is_terminal(&self) -> bool {
        self.desired_status.is_terminal() || self.client_status.is_terminal()
    }

    /// Returns true if every task ran to a clean exit.
    ///
    /// An allocation the client never started has no task states and did
    /// not run successfully.
    pub fn ran_successfully(&self) -> bool {
        !self.task_states.is_empty() && self.task_states.values().all(TaskState::successful)
    }

    /// Returns true if any task ended in failure.
    pub fn is_failed(&self) -> bool {
        self.client_status == ClientStatus::Failed || self.task_states.values().any(|t| t.failed)
    }
}

// =============================================================================
// Snapshot
// =============================================================================

/// Point-in-time view of the cluster handed to one evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// State index the snapshot was taken at.
    #[serde(default)]
    pub index: StateIndex,

    #[serde(default)]
    pub jobs: Vec<Job>,

    #[serde(default)]
    pub nodes: Vec<Node>,

    #[serde(default)]
    pub allocations: Vec<Allocation>,
}

impl Snapshot {
    pub fn job(&self, job_id: &str) -> Option<&Job> {
        self.jobs.iter().find(|j| j.id == job_id)
    }

    /// Allocations belonging to a job.
    pub fn job_allocs<'a>(&'a self, job_id: &'a str) -> impl Iterator<Item = &'a Allocation> + 'a {
        self.allocations.iter().filter(move |a| a.job_id == job_id)
    }

    /// Every job that needs evaluating: registered jobs plus jobs that only
    /// survive through their allocations.
    pub fn job_ids(&self) -> BTreeSet<&str> {
        self.jobs
            .iter()
            .map(|j| j.id.as_str())
            .chain(self.allocations.iter().map(|a| a.job_id.as_str()))
            .collect()
    }
}
