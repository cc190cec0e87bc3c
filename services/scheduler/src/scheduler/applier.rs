//! Plan application.
//!
//! [`PlanApplier`] is the seam between evaluation and whatever commits
//! plans. [`InMemoryApplier`] commits straight into a [`StateStore`].

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use convoy_id::{AllocId, NodeId, StateIndex};
use convoy_reconcile::{Allocation, ClientStatus, DesiredStatus, DesiredTransition, Plan};
use tokio::sync::Mutex;
use tracing::{debug, field, info, instrument, warn, Span};

use crate::error::PlanApplyError;
use crate::state::{StateStore, StateTxn};

/// What applying a plan changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyResult {
    /// Index the changes were committed at.
    pub index: StateIndex,
    /// Allocations created by placements and migrations.
    pub created: Vec<AllocId>,
    pub stopped: usize,
    pub migrated: usize,
    /// Placements and migrations skipped for lack of an eligible node.
    pub unplaced: usize,
}

impl ApplyResult {
    fn changed(&self) -> bool {
        !self.created.is_empty() || self.stopped > 0
    }
}

/// Commits reconciliation plans.
#[async_trait]
pub trait PlanApplier: Send + Sync {
    async fn apply(&self, plan: &Plan) -> Result<ApplyResult, PlanApplyError>;
}

/// Applies plans to an in-memory store, one plan per job at a time.
pub struct InMemoryApplier {
    store: StateStore,
    job_locks: Mutex<BTreeMap<String, Arc<Mutex<()>>>>,
}

impl InMemoryApplier {
    pub fn new(store: StateStore) -> Self {
        Self {
            store,
            job_locks: Mutex::new(BTreeMap::new()),
        }
    }

    async fn job_lock(&self, job_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.job_locks.lock().await;
        Arc::clone(locks.entry(job_id.to_string()).or_default())
    }
}

#[async_trait]
impl PlanApplier for InMemoryApplier {
    #[instrument(skip(self, plan), fields(job_id = %plan.job_id, eval_id = field::Empty))]
    async fn apply(&self, plan: &Plan) -> Result<ApplyResult, PlanApplyError> {
        if let Some(eval_id) = plan.eval_id {
            Span::current().record("eval_id", field::display(eval_id));
        }
        let lock = self.job_lock(&plan.job_id).await;
        let _guard = lock.lock().await;

        let result = self.store.update(|txn| commit(txn, plan)).await?;
        info!(
            index = %result.index,
            created = result.created.len(),
            stopped = result.stopped,
            migrated = result.migrated,
            unplaced = result.unplaced,
            "Plan applied"
        );
        Ok(result)
    }
}

fn commit(txn: &mut StateTxn<'_>, plan: &Plan) -> Result<ApplyResult, PlanApplyError> {
    let modify_index = txn.job_modify_index(&plan.job_id);
    if modify_index > plan.snapshot_index {
        return Err(PlanApplyError::Stale {
            job_id: plan.job_id.clone(),
            plan_index: plan.snapshot_index,
            modify_index,
        });
    }

    let mut result = ApplyResult {
        index: txn.index(),
        ..Default::default()
    };

    for stop in plan.stops() {
        let Some(alloc) = txn.alloc_mut(&stop.alloc_id) else {
            warn!(alloc_id = %stop.alloc_id, "Stop for unknown allocation skipped");
            continue;
        };
        alloc.desired_status = DesiredStatus::Stop;
        if let Some(status) = stop.client_status {
            alloc.client_status = status;
        }
        debug!(alloc_id = %stop.alloc_id, reason = %stop.reason, "Allocation stopped");
        result.stopped += 1;
    }

    let mut nodes = NodeLoad::new(txn);

    for migration in plan.migrations() {
        let Some(old) = txn.alloc(&migration.alloc_id).cloned() else {
            warn!(alloc_id = %migration.alloc_id, "Migration for unknown allocation skipped");
            continue;
        };
        let Some(node_id) = nodes.pick() else {
            warn!(alloc_id = %old.id, name = %old.name, "No eligible node for migration");
            result.unplaced += 1;
            continue;
        };

        let replacement = new_alloc(
            txn,
            &plan.job_id,
            &old.task_group,
            &old.name,
            node_id,
            Some(old.id),
        );
        if let Some(old) = txn.alloc_mut(&old.id) {
            old.desired_status = DesiredStatus::Stop;
            old.next_allocation = Some(replacement);
        }
        debug!(alloc_id = %migration.alloc_id, reason = %migration.reason, "Allocation migrated");
        result.created.push(replacement);
        result.migrated += 1;
    }

    for placement in plan.placements() {
        let Some(node_id) = nodes.pick() else {
            warn!(name = %placement.name, "No eligible node for placement");
            result.unplaced += 1;
            continue;
        };

        let id = new_alloc(
            txn,
            &plan.job_id,
            &placement.task_group,
            &placement.name,
            node_id,
            placement.previous_alloc,
        );
        if let Some(previous) = placement.previous_alloc {
            if let Some(previous) = txn.alloc_mut(&previous) {
                previous.next_allocation = Some(id);
            }
        }
        result.created.push(id);
    }

    if result.changed() {
        txn.touch_job(&plan.job_id);
    }
    Ok(result)
}

fn new_alloc(
    txn: &mut StateTxn<'_>,
    job_id: &str,
    task_group: &str,
    name: &str,
    node_id: NodeId,
    previous: Option<AllocId>,
) -> AllocId {
    let alloc = Allocation {
        id: AllocId::new(),
        job_id: job_id.to_string(),
        task_group: task_group.to_string(),
        name: name.to_string(),
        node_id: Some(node_id),
        client_status: ClientStatus::Pending,
        desired_status: DesiredStatus::Run,
        desired_transition: DesiredTransition::default(),
        task_states: BTreeMap::new(),
        create_index: txn.index().value(),
        next_allocation: None,
        previous_allocation: previous,
    };
    let id = alloc.id;
    txn.insert_alloc(alloc);
    id
}

/// Live allocation counts per eligible node.
struct NodeLoad {
    load: BTreeMap<NodeId, usize>,
}

impl NodeLoad {
    fn new(txn: &StateTxn<'_>) -> Self {
        let mut load: BTreeMap<NodeId, usize> = txn
            .nodes()
            .filter(|n| n.is_eligible())
            .map(|n| (n.id, 0))
            .collect();
        for alloc in txn.allocs().filter(|a| !a.is_terminal()) {
            let Some(node_id) = alloc.node_id else {
                continue;
            };
            if let Some(count) = load.get_mut(&node_id) {
                *count += 1;
            }
        }
        Self { load }
    }

    /// Picks the least-loaded node, lowest ID first on ties, and charges
    /// it one allocation.
    fn pick(&mut self) -> Option<NodeId> {
        let (id, count) = self
            .load
            .iter_mut()
            .min_by_key(|(id, count)| (**count, **id))?;
        *count += 1;
        Some(*id)
    }
}

#[cfg(test)]
mod tests {
    use convoy_reconcile::{Node, NodeStatus, Placement, PlacementReason, StopIntent, StopReason};
    use convoy_testing::mock;

    use super::*;

    fn node(id: u128, status: NodeStatus) -> Node {
        Node {
            id: NodeId::from_u128(id),
            name: String::new(),
            status,
            drain_strategy: None,
        }
    }

    fn placement(index: u32) -> Placement {
        Placement {
            task_group: "web".into(),
            name: format!("example.web[{index}]"),
            index,
            previous_alloc: None,
            reason: PlacementReason::New,
        }
    }

    async fn plan_for(store: &StateStore, placements: Vec<Placement>) -> Plan {
        let mut plan = Plan::new("example", store.index().await);
        plan.groups.entry("web".into()).or_default().place = placements;
        plan
    }

    #[tokio::test]
    async fn test_spreads_over_least_loaded_nodes() {
        let store = StateStore::new();
        store.upsert_node(node(2, NodeStatus::Ready)).await;
        store.upsert_node(node(1, NodeStatus::Ready)).await;
        store.upsert_node(node(3, NodeStatus::Down)).await;

        let applier = InMemoryApplier::new(store.clone());
        let plan = plan_for(&store, (0..3).map(placement).collect()).await;
        let result = applier.apply(&plan).await.unwrap();
        assert_eq!(result.created.len(), 3);

        let snapshot = store.snapshot().await;
        let on = |id: u128| {
            snapshot
                .allocations
                .iter()
                .filter(|a| a.node_id == Some(NodeId::from_u128(id)))
                .count()
        };
        // Ties go to the lowest node ID.
        assert_eq!(on(1), 2);
        assert_eq!(on(2), 1);
        assert_eq!(on(3), 0);
        assert!(snapshot
            .allocations
            .iter()
            .all(|a| a.client_status == ClientStatus::Pending
                && a.create_index == result.index.value()));
    }

    #[tokio::test]
    async fn test_rejects_stale_plan() {
        let store = StateStore::new();
        store.upsert_node(node(1, NodeStatus::Ready)).await;
        let plan = plan_for(&store, vec![placement(0)]).await;

        store.upsert_job(mock::job()).await;

        let applier = InMemoryApplier::new(store.clone());
        let err = applier.apply(&plan).await.unwrap_err();
        assert!(err.is_stale());
        assert!(store.snapshot().await.allocations.is_empty());
    }

    #[tokio::test]
    async fn test_same_snapshot_applies_once() {
        let store = StateStore::new();
        store.upsert_node(node(1, NodeStatus::Ready)).await;
        let plan = plan_for(&store, vec![placement(0)]).await;

        let applier = InMemoryApplier::new(store.clone());
        applier.apply(&plan).await.unwrap();
        assert!(applier.apply(&plan).await.unwrap_err().is_stale());
        assert_eq!(store.snapshot().await.allocations.len(), 1);
    }

    #[tokio::test]
    async fn test_alloc_written_after_snapshot_makes_plan_stale() {
        let node = mock::node();
        let mut job = mock::job();
        job.task_groups[0].count = 1;

        let store = StateStore::new();
        store.upsert_node(node.clone()).await;
        store.upsert_job(job.clone()).await;

        let plan = convoy_reconcile::reconcile(&store.snapshot().await, &job.id);
        assert_eq!(plan.placements().count(), 1);

        store.upsert_alloc(mock::alloc_on(&job, 0, &node)).await;

        let applier = InMemoryApplier::new(store.clone());
        assert!(applier.apply(&plan).await.unwrap_err().is_stale());

        let live: Vec<_> = store
            .snapshot()
            .await
            .allocations
            .into_iter()
            .filter(|a| !a.is_terminal())
            .map(|a| a.name)
            .collect();
        assert_eq!(live, vec!["example.web[0]".to_string()]);
    }

    #[tokio::test]
    async fn test_unplaced_without_eligible_nodes() {
        let store = StateStore::new();
        store.upsert_node(node(1, NodeStatus::Down)).await;
        let before = store.index().await;

        let applier = InMemoryApplier::new(store.clone());
        let plan = plan_for(&store, vec![placement(0), placement(1)]).await;
        let result = applier.apply(&plan).await.unwrap();

        assert_eq!(result.unplaced, 2);
        assert!(result.created.is_empty());
        assert_eq!(store.index().await, before);
    }

    #[tokio::test]
    async fn test_stop_and_replace_links_allocations() {
        let store = StateStore::new();
        store.upsert_node(node(1, NodeStatus::Ready)).await;
        let old = Allocation {
            id: AllocId::from_u128(7),
            job_id: "example".into(),
            task_group: "web".into(),
            name: "example.web[0]".into(),
            node_id: Some(NodeId::from_u128(9)),
            client_status: ClientStatus::Running,
            desired_status: DesiredStatus::Run,
            desired_transition: DesiredTransition::default(),
            task_states: BTreeMap::new(),
            create_index: 1,
            next_allocation: None,
            previous_allocation: None,
        };
        store.upsert_alloc(old.clone()).await;

        let mut plan = plan_for(
            &store,
            vec![Placement {
                previous_alloc: Some(old.id),
                reason: PlacementReason::ReplaceLost,
                ..placement(0)
            }],
        )
        .await;
        plan.groups
            .get_mut("web")
            .unwrap()
            .stop
            .push(StopIntent {
                alloc_id: old.id,
                reason: StopReason::Lost,
                client_status: Some(ClientStatus::Lost),
            });

        let applier = InMemoryApplier::new(store.clone());
        let result = applier.apply(&plan).await.unwrap();
        let new_id = result.created[0];

        let old = store.alloc(&old.id).await.unwrap();
        assert_eq!(old.desired_status, DesiredStatus::Stop);
        assert_eq!(old.client_status, ClientStatus::Lost);
        assert_eq!(old.next_allocation, Some(new_id));

        let new = store.alloc(&new_id).await.unwrap();
        assert_eq!(new.name, "example.web[0]");
        assert_eq!(new.previous_allocation, Some(old.id));
    }
}
