//! Mock cluster objects.
//!
//! Defaults mirror a small healthy cluster: a service job `example` with one
//! task group `web` of ten instances, ready nodes, and running allocations.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use convoy_id::{AllocId, NodeId, StateIndex};
use convoy_reconcile::{
    alloc_name, Allocation, ClientStatus, DesiredStatus, DesiredTransition, DrainStrategy, Job,
    JobType, Node, NodeStatus, Snapshot, TaskGroup, TaskState,
};

/// Job ID used by [`job`], [`batch_job`], and [`system_job`].
pub const JOB_ID: &str = "example";

/// Task group used by the mock jobs.
pub const TASK_GROUP: &str = "web";

/// Instance count of the mock task group.
pub const COUNT: u32 = 10;

static CREATE_INDEX: AtomicU64 = AtomicU64::new(1);

fn next_create_index() -> u64 {
    CREATE_INDEX.fetch_add(1, Ordering::Relaxed)
}

fn job_of(job_type: JobType) -> Job {
    Job {
        id: JOB_ID.to_string(),
        job_type,
        task_groups: vec![TaskGroup::new(TASK_GROUP, COUNT)],
        stop: false,
    }
}

/// A service job with one task group of [`COUNT`] instances.
pub fn job() -> Job {
    job_of(JobType::Service)
}

pub fn batch_job() -> Job {
    job_of(JobType::Batch)
}

pub fn system_job() -> Job {
    job_of(JobType::System)
}

/// A ready, eligible node.
pub fn node() -> Node {
    let id = NodeId::new();
    Node {
        id,
        name: format!("node-{}", id.short()),
        status: NodeStatus::Ready,
        drain_strategy: None,
    }
}

/// A ready node with a drain in progress.
pub fn drain_node() -> Node {
    Node {
        drain_strategy: Some(DrainStrategy::default()),
        ..node()
    }
}

pub fn down_node() -> Node {
    Node {
        status: NodeStatus::Down,
        ..node()
    }
}

/// A running allocation of the job's first task group at `index`, with no
/// node assigned.
pub fn alloc(job: &Job, index: u32) -> Allocation {
    let task_group = job
        .task_groups
        .first()
        .map_or(TASK_GROUP, |tg| tg.name.as_str());

    Allocation {
        id: AllocId::new(),
        job_id: job.id.clone(),
        task_group: task_group.to_string(),
        name: alloc_name(&job.id, task_group, index),
        node_id: None,
        client_status: ClientStatus::Running,
        desired_status: DesiredStatus::Run,
        desired_transition: DesiredTransition::default(),
        task_states: BTreeMap::from([("web".to_string(), TaskState::running())]),
        create_index: next_create_index(),
        next_allocation: None,
        previous_allocation: None,
    }
}

/// Like [`alloc`], placed on `node`.
pub fn alloc_on(job: &Job, index: u32, node: &Node) -> Allocation {
    Allocation {
        node_id: Some(node.id),
        ..alloc(job, index)
    }
}

/// Running allocations for indices `0..count`, all on `node`.
pub fn allocs(job: &Job, node: &Node, count: u32) -> Vec<Allocation> {
    (0..count).map(|i| alloc_on(job, i, node)).collect()
}

/// Marks an allocation as finished by the client.
pub fn complete(mut alloc: Allocation) -> Allocation {
    alloc.client_status = ClientStatus::Complete;
    for state in alloc.task_states.values_mut() {
        *state = TaskState::succeeded();
    }
    alloc
}

/// Marks an allocation as failed by the client.
pub fn failed(mut alloc: Allocation) -> Allocation {
    alloc.client_status = ClientStatus::Failed;
    for state in alloc.task_states.values_mut() {
        *state = TaskState::failed();
    }
    alloc
}

/// Requests migration of an allocation.
pub fn migrating(mut alloc: Allocation) -> Allocation {
    alloc.desired_transition = DesiredTransition::migrate();
    alloc
}

/// Builds a snapshot at index 1.
pub fn snapshot(jobs: Vec<Job>, nodes: Vec<Node>, allocations: Vec<Allocation>) -> Snapshot {
    Snapshot {
        index: StateIndex::new(1),
        jobs,
        nodes,
        allocations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_alloc_is_well_named() {
        let job = job();
        let a = alloc(&job, 4);
        assert_eq!(a.name, "example.web[4]");
        assert_eq!(a.index(), Some(4));
        assert!(!a.is_terminal());
    }

    #[test]
    fn test_create_indexes_increase() {
        let job = job();
        let first = alloc(&job, 0);
        let second = alloc(&job, 1);
        assert!(second.create_index > first.create_index);
    }

    #[test]
    fn test_node_variants() {
        assert!(node().is_eligible());
        assert!(drain_node().is_draining());
        assert!(down_node().is_down());
    }

    #[test]
    fn test_complete_and_failed() {
        let job = batch_job();
        assert!(complete(alloc(&job, 0)).ran_successfully());
        assert!(failed(alloc(&job, 0)).is_failed());
    }
}
