//! Allocation reconciler.
//!
//! The reconciler diffs a job's desired task group counts against the
//! allocations in a snapshot and emits a [`Plan`]. It is a pure function of
//! its inputs: it performs no I/O and mutates nothing, so any number of
//! evaluations can run side by side on their own snapshots.
//!
//! Per task group a pass:
//! 1. splits allocations into terminal and live
//! 2. runs the terminal policy over terminal allocations and the taint
//!    classifier over live ones
//! 3. stops the surplus when the group is over its count
//! 4. migrates allocations flagged for migration off tainted nodes
//! 5. stops lost allocations and fills the group back up, reusing the
//!    indices of lost and failed allocations before allocating new ones

use std::collections::{BTreeMap, BTreeSet};

use convoy_id::{AllocId, StateIndex};
use tracing::debug;

use crate::alloc_set::AllocSet;
use crate::name::alloc_name;
use crate::name_index::NameIndex;
use crate::plan::{
    DesiredUpdates, GroupPlan, MigrateIntent, Placement, PlacementReason, Plan, StopIntent,
    StopReason,
};
use crate::structs::{Allocation, ClientStatus, Job, JobType, Snapshot, TaskGroup};
use crate::taint::{NodeTable, TaintReason, TaintSplit};
use crate::terminal::{should_filter, TerminalOutcome};

/// Where the reconciler put an allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AllocCategory {
    Untainted,
    Migrate,
    Lost,
    Reschedule,
    Ignore,
    /// Live allocation of a stopped job or removed task group.
    Orphaned,
}

impl AllocCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Untainted => "untainted",
            Self::Migrate => "migrate",
            Self::Lost => "lost",
            Self::Reschedule => "reschedule",
            Self::Ignore => "ignore",
            Self::Orphaned => "orphaned",
        }
    }
}

impl std::fmt::Display for AllocCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The allocations of one task group, classified for a pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupClassification<'a> {
    pub untainted: AllocSet<'a>,
    pub migrate: AllocSet<'a>,
    pub lost: AllocSet<'a>,
    pub reschedule: AllocSet<'a>,
    pub ignore: AllocSet<'a>,
}

impl<'a> GroupClassification<'a> {
    pub fn classify(allocs: &AllocSet<'a>, job_type: JobType, nodes: &NodeTable) -> Self {
        let (terminal, live) = allocs.split_terminal();
        let TaintSplit {
            untainted,
            migrate,
            lost,
        } = live.filter_by_tainted(nodes);

        let mut kept = Vec::new();
        let mut reschedule = Vec::new();
        let mut ignore = Vec::new();
        for alloc in terminal.iter() {
            // Already replaced by an earlier pass.
            if alloc.next_allocation.is_some() {
                ignore.push(alloc);
                continue;
            }
            match should_filter(alloc, job_type) {
                TerminalOutcome::Untainted => kept.push(alloc),
                TerminalOutcome::Ignore => ignore.push(alloc),
                TerminalOutcome::Reschedule => reschedule.push(alloc),
            }
        }

        let kept: AllocSet = kept.into_iter().collect();
        Self {
            untainted: untainted.union(&[&kept]),
            migrate,
            lost,
            reschedule: reschedule.into_iter().collect(),
            ignore: ignore.into_iter().collect(),
        }
    }

    /// Allocations that count toward the group's desired count.
    ///
    /// Migrating allocations count until they are replaced. Terminal
    /// allocations the servers already stopped stay untainted as history
    /// but no longer count.
    pub fn current_count(&self) -> usize {
        let counted = self
            .untainted
            .iter()
            .filter(|a| !(a.is_terminal() && a.desired_status.is_terminal()))
            .count();
        counted + self.migrate.len()
    }

    pub fn category_of(&self, id: &AllocId) -> Option<AllocCategory> {
        [
            (&self.untainted, AllocCategory::Untainted),
            (&self.migrate, AllocCategory::Migrate),
            (&self.lost, AllocCategory::Lost),
            (&self.reschedule, AllocCategory::Reschedule),
            (&self.ignore, AllocCategory::Ignore),
        ]
        .into_iter()
        .find(|(set, _)| set.contains(id))
        .map(|(_, category)| category)
    }
}

/// Orders stop candidates: highest name index first, then the most
/// recently created, then the highest ID. Malformed names go first.
fn victim_order<'a>(set: &AllocSet<'a>) -> Vec<&'a Allocation> {
    let mut out: Vec<_> = set.iter().collect();
    out.sort_by_key(|a| {
        std::cmp::Reverse((a.index().map_or(u64::MAX, u64::from), a.create_index, a.id))
    });
    out
}

/// Reconciles one job against a snapshot.
#[derive(Debug, Clone)]
pub struct Reconciler<'a> {
    job_id: &'a str,
    job: Option<&'a Job>,
    allocs: AllocSet<'a>,
    nodes: &'a NodeTable,
    snapshot_index: StateIndex,
}

impl<'a> Reconciler<'a> {
    /// Creates a reconciler for `job_id`. `job` is `None` when the job has
    /// been deregistered; allocations of other jobs are ignored.
    pub fn new<I>(job_id: &'a str, job: Option<&'a Job>, allocs: I, nodes: &'a NodeTable) -> Self
    where
        I: IntoIterator<Item = &'a Allocation>,
    {
        Self {
            job_id,
            job,
            allocs: allocs.into_iter().filter(|a| a.job_id == job_id).collect(),
            nodes,
            snapshot_index: StateIndex::ZERO,
        }
    }

    /// Creates a reconciler reading everything from a snapshot.
    pub fn from_snapshot(snapshot: &'a Snapshot, job_id: &'a str, nodes: &'a NodeTable) -> Self {
        Self::new(job_id, snapshot.job(job_id), &snapshot.allocations, nodes)
            .at_index(snapshot.index)
    }

    /// Records the state index the inputs were read at.
    pub fn at_index(mut self, snapshot_index: StateIndex) -> Self {
        self.snapshot_index = snapshot_index;
        self
    }

    fn active_job(&self) -> Option<&'a Job> {
        self.job.filter(|job| !job.stop)
    }

    /// Computes the plan for the job.
    pub fn compute(&self) -> Plan {
        let mut plan = Plan::new(self.job_id, self.snapshot_index);
        let groups = self.allocs.by_task_group();

        let Some(job) = self.active_job() else {
            for (name, set) in &groups {
                plan.groups
                    .insert(name.to_string(), self.stop_all(set, StopReason::JobStopped));
            }
            return plan;
        };

        let empty = AllocSet::new();
        for tg in &job.task_groups {
            let set = groups.get(tg.name.as_str()).unwrap_or(&empty);
            plan.groups
                .insert(tg.name.clone(), self.compute_group(job.job_type, tg, set));
        }
        for (name, set) in &groups {
            if job.task_group(name).is_none() {
                plan.groups
                    .insert(name.to_string(), self.stop_all(set, StopReason::GroupRemoved));
            }
        }

        plan
    }

    /// Reports where each allocation of the job lands in a pass.
    pub fn classify(&self) -> BTreeMap<AllocId, AllocCategory> {
        let mut out = BTreeMap::new();
        let job = self.active_job();

        for (name, set) in self.allocs.by_task_group() {
            match job.filter(|j| j.task_group(name).is_some()) {
                Some(job) => {
                    let class = GroupClassification::classify(&set, job.job_type, self.nodes);
                    for id in set.ids() {
                        if let Some(category) = class.category_of(&id) {
                            out.insert(id, category);
                        }
                    }
                }
                None => {
                    for alloc in set.iter() {
                        let category = if alloc.is_terminal() {
                            AllocCategory::Ignore
                        } else {
                            AllocCategory::Orphaned
                        };
                        out.insert(alloc.id, category);
                    }
                }
            }
        }

        out
    }

    /// Stops every live allocation in the set.
    fn stop_all(&self, set: &AllocSet<'a>, reason: StopReason) -> GroupPlan {
        let (terminal, live) = set.split_terminal();
        let split = live.filter_by_tainted(self.nodes);

        let mut group = GroupPlan {
            ignore: terminal.ids().collect(),
            ..Default::default()
        };
        for alloc in split.untainted.union(&[&split.migrate]).name_order() {
            group.stop.push(StopIntent {
                alloc_id: alloc.id,
                reason,
                client_status: None,
            });
        }
        for alloc in split.lost.name_order() {
            group.stop.push(StopIntent {
                alloc_id: alloc.id,
                reason: StopReason::Lost,
                client_status: Some(ClientStatus::Lost),
            });
        }

        group.summary = DesiredUpdates {
            stop: group.stop.len() as u64,
            ignore: group.ignore.len() as u64,
            lost: split.lost.len() as u64,
            ..Default::default()
        };
        group
    }

    fn compute_group(&self, job_type: JobType, tg: &TaskGroup, set: &AllocSet<'a>) -> GroupPlan {
        let class = GroupClassification::classify(set, job_type, self.nodes);
        let desired = tg.count as usize;
        let existing = class.current_count();

        let mut group = GroupPlan {
            ignore: class.ignore.ids().collect(),
            ..Default::default()
        };

        // Over capacity: stop live untainted allocations first, then
        // migrating ones instead of moving them.
        let mut stopped = BTreeSet::new();
        if existing > desired {
            let live = class.untainted.filter(|a| !a.is_terminal());
            let victims = victim_order(&live)
                .into_iter()
                .chain(victim_order(&class.migrate))
                .take(existing - desired);
            for alloc in victims {
                stopped.insert(alloc.id);
                group.stop.push(StopIntent {
                    alloc_id: alloc.id,
                    reason: StopReason::ScaleDown,
                    client_status: None,
                });
            }
        }

        for alloc in class.migrate.name_order() {
            if stopped.contains(&alloc.id) {
                continue;
            }
            let reason = TaintReason::of(self.nodes.lookup(alloc.node_id.as_ref()))
                .unwrap_or(TaintReason::NodeUnresolved);
            group.migrate.push(MigrateIntent {
                alloc_id: alloc.id,
                task_group: tg.name.clone(),
                name: alloc.name.clone(),
                index: alloc.index(),
                reason,
            });
        }

        let mut room = desired.saturating_sub(existing);
        let live = class.untainted.union(&[&class.migrate]);
        let mut names = NameIndex::new(self.job_id, &tg.name, tg.count, &live);

        // Lost allocations are always stopped; replacements reuse their
        // index while the group has room.
        for alloc in class.lost.name_order() {
            group.stop.push(StopIntent {
                alloc_id: alloc.id,
                reason: StopReason::Lost,
                client_status: Some(ClientStatus::Lost),
            });
            if let Some(placement) = self.replace(
                tg,
                alloc,
                PlacementReason::ReplaceLost,
                &mut room,
                &mut names,
            ) {
                group.place.push(placement);
            }
        }

        for alloc in class.reschedule.name_order() {
            if let Some(placement) = self.replace(
                tg,
                alloc,
                PlacementReason::Reschedule,
                &mut room,
                &mut names,
            ) {
                group.place.push(placement);
            }
        }

        // Indices of lost and failed allocations stay reserved whether or
        // not they were replaced.
        for index in class.lost.union(&[&class.reschedule]).indexes() {
            names.claim(index);
        }

        for _ in 0..room {
            let (index, name) = names.next_name();
            group.place.push(Placement {
                task_group: tg.name.clone(),
                name,
                index,
                previous_alloc: None,
                reason: PlacementReason::New,
            });
        }

        let stopped_untainted = stopped
            .iter()
            .filter(|id| class.untainted.contains(id))
            .count();
        group.summary = DesiredUpdates {
            place: group.place.len() as u64,
            stop: group.stop.len() as u64,
            migrate: group.migrate.len() as u64,
            ignore: group.ignore.len() as u64,
            lost: class.lost.len() as u64,
            reschedule: group
                .place
                .iter()
                .filter(|p| p.reason == PlacementReason::Reschedule)
                .count() as u64,
            in_place: (class.untainted.len() - stopped_untainted) as u64,
        };

        debug!(
            job_id = %self.job_id,
            task_group = %tg.name,
            desired,
            existing,
            untainted = class.untainted.len(),
            migrate = class.migrate.len(),
            lost = class.lost.len(),
            reschedule = class.reschedule.len(),
            ignore = class.ignore.len(),
            place = group.place.len(),
            stop = group.stop.len(),
            "Reconciled task group"
        );

        group
    }

    /// Places a replacement for `alloc` under its own index, if the group
    /// has room and nothing has claimed that index yet.
    fn replace(
        &self,
        tg: &TaskGroup,
        alloc: &Allocation,
        reason: PlacementReason,
        room: &mut usize,
        names: &mut NameIndex,
    ) -> Option<Placement> {
        if *room == 0 {
            return None;
        }
        let index = alloc.index().filter(|i| !names.is_used(*i))?;

        names.claim(index);
        *room -= 1;
        Some(Placement {
            task_group: tg.name.clone(),
            name: alloc_name(self.job_id, &tg.name, index),
            index,
            previous_alloc: Some(alloc.id),
            reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use convoy_id::NodeId;

    use super::*;
    use crate::structs::{
        DesiredStatus, DesiredTransition, DrainStrategy, Node, NodeStatus, TaskState,
    };

    const READY: NodeId = NodeId::from_u128(100);
    const DOWN: NodeId = NodeId::from_u128(101);
    const DRAINING: NodeId = NodeId::from_u128(102);

    fn nodes() -> NodeTable {
        [
            (READY, NodeStatus::Ready, None),
            (DOWN, NodeStatus::Down, None),
            (DRAINING, NodeStatus::Ready, Some(DrainStrategy::default())),
        ]
        .into_iter()
        .map(|(id, status, drain_strategy)| Node {
            id,
            name: String::new(),
            status,
            drain_strategy,
        })
        .collect()
    }

    fn job(job_type: JobType, count: u32) -> Job {
        Job {
            id: "web".into(),
            job_type,
            task_groups: vec![TaskGroup::new("frontend", count)],
            stop: false,
        }
    }

    fn alloc(id: u128, index: u32) -> Allocation {
        Allocation {
            id: AllocId::from_u128(id),
            job_id: "web".into(),
            task_group: "frontend".into(),
            name: alloc_name("web", "frontend", index),
            node_id: Some(READY),
            client_status: ClientStatus::Running,
            desired_status: DesiredStatus::Run,
            desired_transition: DesiredTransition::default(),
            task_states: BTreeMap::from([("main".to_string(), TaskState::running())]),
            create_index: id as u64,
            next_allocation: None,
            previous_allocation: None,
        }
    }

    fn on(mut a: Allocation, node: NodeId) -> Allocation {
        a.node_id = Some(node);
        a
    }

    fn compute(job: &Job, allocs: &[Allocation], nodes: &NodeTable) -> Plan {
        Reconciler::new("web", Some(job), allocs, nodes).compute()
    }

    fn group(plan: &Plan) -> &GroupPlan {
        &plan.groups["frontend"]
    }

    #[test]
    fn test_places_fresh_group() {
        let nodes = nodes();
        let plan = compute(&job(JobType::Service, 3), &[], &nodes);

        let indexes: Vec<_> = plan.placements().map(|p| p.index).collect();
        assert_eq!(indexes, vec![0, 1, 2]);
        assert!(plan
            .placements()
            .all(|p| p.reason == PlacementReason::New && p.previous_alloc.is_none()));
        assert_eq!(group(&plan).summary.place, 3);
    }

    #[test]
    fn test_fills_holes_in_numbering() {
        let nodes = nodes();
        let allocs = [alloc(1, 0), alloc(2, 2)];
        let plan = compute(&job(JobType::Service, 4), &allocs, &nodes);

        let names: Vec<_> = plan.placements().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["web.frontend[1]", "web.frontend[3]"]);
    }

    #[test]
    fn test_scale_down_stops_highest_index_first() {
        let nodes = nodes();
        // Creation order deliberately disagrees with index order.
        let allocs = [alloc(3, 0), alloc(1, 1), alloc(2, 2), alloc(4, 3)];
        let plan = compute(&job(JobType::Service, 2), &allocs, &nodes);

        let stopped: Vec<_> = plan.stops().map(|s| s.alloc_id).collect();
        assert_eq!(stopped, vec![AllocId::from_u128(4), AllocId::from_u128(2)]);
        assert!(plan.stops().all(|s| s.reason == StopReason::ScaleDown));
        assert_eq!(plan.placements().count(), 0);
        assert_eq!(group(&plan).summary.in_place, 2);
    }

    #[test]
    fn test_scale_down_tie_breaks_on_newest() {
        let nodes = nodes();
        // Two allocations share an index (e.g. a replacement racing the
        // original); the newer one goes.
        let mut older = alloc(7, 1);
        older.create_index = 10;
        let mut newer = alloc(5, 1);
        newer.create_index = 20;
        let allocs = [alloc(1, 0), older, newer];

        let plan = compute(&job(JobType::Service, 2), &allocs, &nodes);
        let stopped: Vec<_> = plan.stops().map(|s| s.alloc_id).collect();
        assert_eq!(stopped, vec![AllocId::from_u128(5)]);
    }

    #[test]
    fn test_lost_alloc_is_replaced_under_same_index() {
        let nodes = nodes();
        let allocs = [alloc(1, 0), alloc(2, 1), alloc(3, 2), on(alloc(4, 3), DOWN)];
        let plan = compute(&job(JobType::Service, 4), &allocs, &nodes);

        let g = group(&plan);
        assert_eq!(g.stop.len(), 1);
        assert_eq!(g.stop[0].alloc_id, AllocId::from_u128(4));
        assert_eq!(g.stop[0].reason, StopReason::Lost);
        assert_eq!(g.stop[0].client_status, Some(ClientStatus::Lost));

        assert_eq!(g.place.len(), 1);
        assert_eq!(g.place[0].index, 3);
        assert_eq!(g.place[0].name, "web.frontend[3]");
        assert_eq!(g.place[0].previous_alloc, Some(AllocId::from_u128(4)));
        assert_eq!(g.place[0].reason, PlacementReason::ReplaceLost);
        assert_eq!(g.summary.lost, 1);
    }

    #[test]
    fn test_lost_index_held_by_live_alloc_is_not_reused() {
        let nodes = nodes();
        let allocs = [
            alloc(1, 0),
            alloc(2, 1),
            on(alloc(3, 1), DOWN),
            on(alloc(4, 4), DOWN),
        ];
        let plan = compute(&job(JobType::Service, 4), &allocs, &nodes);

        let placed: Vec<_> = plan
            .placements()
            .map(|p| (p.index, p.reason, p.previous_alloc))
            .collect();
        assert_eq!(
            placed,
            vec![
                (4, PlacementReason::ReplaceLost, Some(AllocId::from_u128(4))),
                (2, PlacementReason::New, None),
            ]
        );
        assert_eq!(plan.stops().filter(|s| s.reason == StopReason::Lost).count(), 2);
    }

    #[test]
    fn test_lost_alloc_not_replaced_when_over_count() {
        let nodes = nodes();
        let allocs = [alloc(1, 0), alloc(2, 1), on(alloc(3, 2), DOWN)];
        let plan = compute(&job(JobType::Service, 2), &allocs, &nodes);

        assert_eq!(plan.placements().count(), 0);
        let stops: Vec<_> = plan.stops().map(|s| (s.alloc_id, s.reason)).collect();
        assert_eq!(stops, vec![(AllocId::from_u128(3), StopReason::Lost)]);
    }

    #[test]
    fn test_migrate_keeps_count_and_name() {
        let nodes = nodes();
        let mut migrating = on(alloc(2, 1), DRAINING);
        migrating.desired_transition = DesiredTransition::migrate();
        let allocs = [alloc(1, 0), migrating];
        let plan = compute(&job(JobType::Service, 2), &allocs, &nodes);

        let g = group(&plan);
        assert!(g.place.is_empty());
        assert!(g.stop.is_empty());
        assert_eq!(g.migrate.len(), 1);
        assert_eq!(g.migrate[0].alloc_id, AllocId::from_u128(2));
        assert_eq!(g.migrate[0].name, "web.frontend[1]");
        assert_eq!(g.migrate[0].reason, TaintReason::NodeDraining);
    }

    #[test]
    fn test_surplus_migrations_are_stopped_instead() {
        let nodes = nodes();
        let mut m1 = on(alloc(1, 0), DRAINING);
        m1.desired_transition = DesiredTransition::migrate();
        let mut m2 = on(alloc(2, 1), DRAINING);
        m2.desired_transition = DesiredTransition::migrate();
        let allocs = [m1, m2];
        let plan = compute(&job(JobType::Service, 1), &allocs, &nodes);

        let g = group(&plan);
        assert_eq!(g.stop.len(), 1);
        assert_eq!(g.stop[0].alloc_id, AllocId::from_u128(2));
        assert_eq!(g.migrate.len(), 1);
        assert_eq!(g.migrate[0].alloc_id, AllocId::from_u128(1));
    }

    #[test]
    fn test_failed_service_alloc_is_rescheduled_in_place() {
        let nodes = nodes();
        let mut failed = alloc(2, 1);
        failed.client_status = ClientStatus::Failed;
        failed.task_states.insert("main".into(), TaskState::failed());
        let allocs = [alloc(1, 0), failed];
        let plan = compute(&job(JobType::Service, 2), &allocs, &nodes);

        let g = group(&plan);
        assert!(g.stop.is_empty());
        assert_eq!(g.place.len(), 1);
        assert_eq!(g.place[0].index, 1);
        assert_eq!(g.place[0].reason, PlacementReason::Reschedule);
        assert_eq!(g.place[0].previous_alloc, Some(AllocId::from_u128(2)));
        assert_eq!(g.summary.reschedule, 1);
    }

    #[test]
    fn test_replaced_alloc_is_ignored() {
        let nodes = nodes();
        let mut failed = alloc(2, 1);
        failed.client_status = ClientStatus::Failed;
        failed.next_allocation = Some(AllocId::from_u128(3));
        let allocs = [alloc(1, 0), failed, alloc(3, 1)];
        let plan = compute(&job(JobType::Service, 2), &allocs, &nodes);

        assert!(plan.is_empty());
        assert_eq!(group(&plan).ignore, vec![AllocId::from_u128(2)]);
    }

    #[test]
    fn test_completed_batch_allocs_count() {
        let nodes = nodes();
        let mut done = alloc(1, 0);
        done.client_status = ClientStatus::Complete;
        done.task_states.insert("main".into(), TaskState::succeeded());
        let allocs = [done, alloc(2, 1)];

        let plan = compute(&job(JobType::Batch, 2), &allocs, &nodes);
        assert!(plan.is_empty());
        assert_eq!(group(&plan).summary.in_place, 2);

        // The same allocation in a service job is ignored and replaced.
        let plan = compute(&job(JobType::Service, 2), &allocs, &nodes);
        assert_eq!(group(&plan).ignore, vec![AllocId::from_u128(1)]);
        assert_eq!(plan.placements().map(|p| p.index).collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn test_completed_batch_history_is_never_a_victim() {
        let nodes = nodes();
        let mut done = alloc(1, 2);
        done.client_status = ClientStatus::Complete;
        done.task_states.insert("main".into(), TaskState::succeeded());
        let allocs = [done, alloc(2, 0), alloc(3, 1)];

        let plan = compute(&job(JobType::Batch, 2), &allocs, &nodes);
        let stopped: Vec<_> = plan.stops().map(|s| s.alloc_id).collect();
        assert_eq!(stopped, vec![AllocId::from_u128(3)]);
    }

    #[test]
    fn test_stopped_batch_history_does_not_count() {
        let nodes = nodes();
        // Stopped by an earlier scale-down, then exited cleanly.
        let mut history = alloc(3, 2);
        history.desired_status = DesiredStatus::Stop;
        history.client_status = ClientStatus::Complete;
        history.task_states.insert("main".into(), TaskState::succeeded());
        let allocs = [alloc(1, 0), alloc(2, 1), history];

        let plan = compute(&job(JobType::Batch, 2), &allocs, &nodes);
        assert!(plan.is_empty());
        assert_eq!(group(&plan).summary.in_place, 3);
    }

    #[test]
    fn test_stopped_job_stops_everything_live() {
        let nodes = nodes();
        let mut stopped_job = job(JobType::Service, 3);
        stopped_job.stop = true;
        let mut done = alloc(3, 2);
        done.client_status = ClientStatus::Complete;
        let allocs = [alloc(1, 0), on(alloc(2, 1), DOWN), done];

        let plan = compute(&stopped_job, &allocs, &nodes);
        let g = group(&plan);
        assert!(g.place.is_empty());
        let stops: Vec<_> = g.stop.iter().map(|s| (s.alloc_id, s.reason)).collect();
        assert_eq!(
            stops,
            vec![
                (AllocId::from_u128(1), StopReason::JobStopped),
                (AllocId::from_u128(2), StopReason::Lost),
            ]
        );
        assert_eq!(g.ignore, vec![AllocId::from_u128(3)]);
    }

    #[test]
    fn test_deregistered_job_stops_everything_live() {
        let nodes = nodes();
        let allocs = [alloc(1, 0), alloc(2, 1)];
        let plan = Reconciler::new("web", None, &allocs, &nodes).compute();

        assert_eq!(plan.stops().count(), 2);
        assert!(plan.stops().all(|s| s.reason == StopReason::JobStopped));
    }

    #[test]
    fn test_removed_group_is_stopped() {
        let nodes = nodes();
        let mut old = alloc(9, 0);
        old.task_group = "legacy".into();
        old.name = alloc_name("web", "legacy", 0);
        let allocs = [alloc(1, 0), old];

        let plan = compute(&job(JobType::Service, 1), &allocs, &nodes);
        assert!(group(&plan).is_noop());
        let legacy = &plan.groups["legacy"];
        assert_eq!(legacy.stop.len(), 1);
        assert_eq!(legacy.stop[0].reason, StopReason::GroupRemoved);
    }

    #[test]
    fn test_other_jobs_are_ignored() {
        let nodes = nodes();
        let mut foreign = alloc(9, 0);
        foreign.job_id = "api".into();
        let allocs = [foreign];
        let plan = compute(&job(JobType::Service, 1), &allocs, &nodes);
        assert_eq!(plan.placements().count(), 1);
        assert_eq!(plan.stops().count(), 0);
    }

    #[test]
    fn test_classify_reports_categories() {
        let nodes = nodes();
        let mut lost = on(alloc(2, 1), DOWN);
        lost.client_status = ClientStatus::Pending;
        let mut stopped = alloc(3, 2);
        stopped.desired_status = DesiredStatus::Stop;
        let mut legacy = alloc(4, 0);
        legacy.task_group = "legacy".into();
        let allocs = [alloc(1, 0), lost, stopped, legacy];

        let job = job(JobType::Service, 2);
        let categories = Reconciler::new("web", Some(&job), &allocs, &nodes).classify();
        assert_eq!(categories[&AllocId::from_u128(1)], AllocCategory::Untainted);
        assert_eq!(categories[&AllocId::from_u128(2)], AllocCategory::Lost);
        assert_eq!(categories[&AllocId::from_u128(3)], AllocCategory::Ignore);
        assert_eq!(categories[&AllocId::from_u128(4)], AllocCategory::Orphaned);
    }
}
