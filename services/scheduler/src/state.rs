//! In-memory cluster state.
//!
//! The store holds jobs, nodes, and allocations behind a single lock and
//! stamps every write with a monotonically increasing [`StateIndex`].
//! Evaluations never read the store directly: they take an owned
//! [`Snapshot`] and reconcile against that.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use convoy_id::{AllocId, NodeId, StateIndex};
use convoy_reconcile::{Allocation, ClientStatus, DrainStrategy, Job, Node, NodeStatus, Snapshot};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::StateError;

/// Shared, versioned cluster state.
#[derive(Clone, Default)]
pub struct StateStore {
    inner: Arc<RwLock<StateInner>>,
}

#[derive(Default)]
struct StateInner {
    index: StateIndex,
    jobs: BTreeMap<String, Job>,
    nodes: BTreeMap<NodeId, Node>,
    allocs: BTreeMap<AllocId, Allocation>,

    /// Index of the last write that touched each job.
    job_modify_index: BTreeMap<String, StateIndex>,
}

impl StateInner {
    fn bump(&mut self) -> StateIndex {
        self.index = self.index.next();
        self.index
    }

    fn touch_job(&mut self, job_id: &str, index: StateIndex) {
        self.job_modify_index.insert(job_id.to_string(), index);
    }
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store seeded from a snapshot.
    pub async fn from_snapshot(snapshot: Snapshot) -> Self {
        let store = Self::new();
        store.load(snapshot).await;
        store
    }

    /// Current state index.
    pub async fn index(&self) -> StateIndex {
        self.inner.read().await.index
    }

    /// Returns an owned point-in-time copy of the whole cluster.
    pub async fn snapshot(&self) -> Snapshot {
        let inner = self.inner.read().await;
        Snapshot {
            index: inner.index,
            jobs: inner.jobs.values().cloned().collect(),
            nodes: inner.nodes.values().cloned().collect(),
            allocations: inner.allocs.values().cloned().collect(),
        }
    }

    /// Replaces the store contents with a snapshot.
    ///
    /// The index never moves backwards: the store resumes after the larger
    /// of its own index and the snapshot's.
    pub async fn load(&self, snapshot: Snapshot) -> StateIndex {
        let mut inner = self.inner.write().await;
        inner.index = inner.index.max(snapshot.index);
        let index = inner.bump();

        inner.job_modify_index = snapshot
            .jobs
            .iter()
            .map(|j| j.id.clone())
            .chain(snapshot.allocations.iter().map(|a| a.job_id.clone()))
            .map(|job_id| (job_id, index))
            .collect();
        inner.jobs = snapshot.jobs.into_iter().map(|j| (j.id.clone(), j)).collect();
        inner.nodes = snapshot.nodes.into_iter().map(|n| (n.id, n)).collect();
        inner.allocs = snapshot
            .allocations
            .into_iter()
            .map(|a| (a.id, a))
            .collect();

        info!(
            index = %index,
            jobs = inner.jobs.len(),
            nodes = inner.nodes.len(),
            allocations = inner.allocs.len(),
            "State loaded"
        );
        index
    }

    /// Registers or updates a job.
    pub async fn upsert_job(&self, job: Job) -> StateIndex {
        let mut inner = self.inner.write().await;
        let index = inner.bump();
        debug!(job_id = %job.id, index = %index, "Job upserted");
        inner.touch_job(&job.id, index);
        inner.jobs.insert(job.id.clone(), job);
        index
    }

    /// Deregisters a job. Its allocations stay until the next evaluation
    /// stops them.
    pub async fn delete_job(&self, job_id: &str) -> StateIndex {
        let mut inner = self.inner.write().await;
        let index = inner.bump();
        inner.jobs.remove(job_id);
        inner.touch_job(job_id, index);
        index
    }

    pub async fn job(&self, job_id: &str) -> Option<Job> {
        self.inner.read().await.jobs.get(job_id).cloned()
    }

    /// Index of the last write that touched the job.
    pub async fn job_modify_index(&self, job_id: &str) -> StateIndex {
        self.inner
            .read()
            .await
            .job_modify_index
            .get(job_id)
            .copied()
            .unwrap_or_default()
    }

    pub async fn upsert_node(&self, node: Node) -> StateIndex {
        let mut inner = self.inner.write().await;
        let index = inner.bump();
        inner.nodes.insert(node.id, node);
        index
    }

    pub async fn set_node_status(
        &self,
        node_id: NodeId,
        status: NodeStatus,
    ) -> Result<StateIndex, StateError> {
        let mut inner = self.inner.write().await;
        let node = inner
            .nodes
            .get_mut(&node_id)
            .ok_or(StateError::NodeNotFound(node_id))?;
        node.status = status;
        let index = inner.bump();
        info!(node_id = %node_id, status = %status, index = %index, "Node status updated");
        Ok(index)
    }

    /// Starts (`Some`) or ends (`None`) a drain.
    pub async fn set_node_drain(
        &self,
        node_id: NodeId,
        drain: Option<DrainStrategy>,
    ) -> Result<StateIndex, StateError> {
        let mut inner = self.inner.write().await;
        let node = inner
            .nodes
            .get_mut(&node_id)
            .ok_or(StateError::NodeNotFound(node_id))?;
        let draining = drain.is_some();
        node.drain_strategy = drain;
        let index = inner.bump();
        info!(node_id = %node_id, draining, index = %index, "Node drain updated");
        Ok(index)
    }

    /// Writes an allocation. Plans for its job computed before this write
    /// become stale.
    pub async fn upsert_alloc(&self, alloc: Allocation) -> StateIndex {
        let mut inner = self.inner.write().await;
        let index = inner.bump();
        inner.touch_job(&alloc.job_id, index);
        inner.allocs.insert(alloc.id, alloc);
        index
    }

    pub async fn alloc(&self, id: &AllocId) -> Option<Allocation> {
        self.inner.read().await.allocs.get(id).cloned()
    }

    /// Records a status reported by the client running an allocation.
    /// Returns `None` for unknown allocations.
    pub async fn set_client_status(&self, id: &AllocId, status: ClientStatus) -> Option<StateIndex> {
        let mut inner = self.inner.write().await;
        let alloc = inner.allocs.get_mut(id)?;
        alloc.client_status = status;
        let job_id = alloc.job_id.clone();
        let index = inner.bump();
        inner.touch_job(&job_id, index);
        Some(index)
    }

    /// Runs `f` against the state under the write lock.
    ///
    /// Every change made through the transaction commits at a single new
    /// index; a transaction that changes nothing leaves the index alone.
    pub async fn update<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&mut StateTxn<'_>) -> T,
    {
        let mut inner = self.inner.write().await;
        let next = inner.index.next();
        let mut txn = StateTxn {
            inner: &mut *inner,
            index: next,
            dirty: false,
        };
        let out = f(&mut txn);
        if txn.dirty {
            inner.index = next;
        }
        out
    }
}

/// Write access to the store for the duration of [`StateStore::update`].
pub struct StateTxn<'a> {
    inner: &'a mut StateInner,
    index: StateIndex,
    dirty: bool,
}

impl StateTxn<'_> {
    /// Index the transaction commits at.
    pub fn index(&self) -> StateIndex {
        self.index
    }

    pub fn job_modify_index(&self, job_id: &str) -> StateIndex {
        self.inner
            .job_modify_index
            .get(job_id)
            .copied()
            .unwrap_or_default()
    }

    /// Marks the job as modified by this transaction.
    pub fn touch_job(&mut self, job_id: &str) {
        self.inner.touch_job(job_id, self.index);
        self.dirty = true;
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.inner.nodes.values()
    }

    pub fn allocs(&self) -> impl Iterator<Item = &Allocation> {
        self.inner.allocs.values()
    }

    pub fn alloc(&self, id: &AllocId) -> Option<&Allocation> {
        self.inner.allocs.get(id)
    }

    pub fn alloc_mut(&mut self, id: &AllocId) -> Option<&mut Allocation> {
        let alloc = self.inner.allocs.get_mut(id)?;
        self.dirty = true;
        Some(alloc)
    }

    pub fn insert_alloc(&mut self, alloc: Allocation) {
        self.inner.allocs.insert(alloc.id, alloc);
        self.dirty = true;
    }
}

/// Reads a snapshot from a `.json` or `.toml` file.
pub fn read_snapshot(path: &Path) -> Result<Snapshot, StateError> {
    Ok(convoy_reconcile::read_snapshot(path)?)
}
