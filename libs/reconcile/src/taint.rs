//! Node taint classification.
//!
//! A node is tainted when it is down, draining, or missing from the
//! snapshot. Live allocations on tainted nodes either migrate (when a
//! migration was requested) or are lost (when the node is down).

use std::collections::BTreeMap;

use convoy_id::NodeId;
use serde::{Deserialize, Serialize};

use crate::alloc_set::AllocSet;
use crate::structs::{Allocation, Node, Snapshot};

/// Result of looking up an allocation's node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeLookup<'a> {
    Resolved(&'a Node),
    /// No node ID, or the node record is missing from the snapshot.
    Unresolved,
}

impl NodeLookup<'_> {
    /// Returns true if allocations on this node can no longer be trusted.
    pub fn is_tainted(&self) -> bool {
        match self {
            Self::Resolved(node) => node.is_down() || node.is_draining(),
            Self::Unresolved => true,
        }
    }

    /// Returns true if the node is known and down.
    pub fn is_down(&self) -> bool {
        matches!(self, Self::Resolved(node) if node.is_down())
    }
}

/// Node records keyed for O(1)-ish lookup by ID.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeTable {
    nodes: BTreeMap<NodeId, Node>,
}

impl NodeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, node: Node) {
        self.nodes.insert(node.id, node);
    }

    pub fn get(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Resolves the node an allocation runs on.
    pub fn lookup(&self, node_id: Option<&NodeId>) -> NodeLookup<'_> {
        node_id
            .and_then(|id| self.nodes.get(id))
            .map_or(NodeLookup::Unresolved, NodeLookup::Resolved)
    }
}

impl Snapshot {
    /// Indexes the snapshot's nodes by ID.
    pub fn node_table(&self) -> NodeTable {
        self.nodes.iter().cloned().collect()
    }
}

impl FromIterator<Node> for NodeTable {
    fn from_iter<I: IntoIterator<Item = Node>>(iter: I) -> Self {
        Self {
            nodes: iter.into_iter().map(|n| (n.id, n)).collect(),
        }
    }
}

/// Why a tainted allocation is being moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaintReason {
    NodeDraining,
    NodeDown,
    NodeUnresolved,
}

impl TaintReason {
    /// Returns the taint reason for a node, or `None` if it is healthy.
    pub fn of(lookup: NodeLookup<'_>) -> Option<Self> {
        match lookup {
            NodeLookup::Unresolved => Some(Self::NodeUnresolved),
            NodeLookup::Resolved(node) if node.is_down() => Some(Self::NodeDown),
            NodeLookup::Resolved(node) if node.is_draining() => Some(Self::NodeDraining),
            NodeLookup::Resolved(_) => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NodeDraining => "node is draining",
            Self::NodeDown => "node is down",
            Self::NodeUnresolved => "node is unknown",
        }
    }
}

impl std::fmt::Display for TaintReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Taint category of a single allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Taint {
    Untainted,
    Migrate,
    Lost,
}

/// Classifies one allocation against the node table.
///
/// Terminal allocations are always untainted: node state cannot affect work
/// that has already finished.
pub fn classify_taint(alloc: &Allocation, nodes: &NodeTable) -> Taint {
    if alloc.is_terminal() {
        return Taint::Untainted;
    }

    let node = nodes.lookup(alloc.node_id.as_ref());
    if alloc.desired_transition.should_migrate() && node.is_tainted() {
        Taint::Migrate
    } else if node.is_down() {
        Taint::Lost
    } else {
        Taint::Untainted
    }
}

/// An allocation set split by taint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaintSplit<'a> {
    pub untainted: AllocSet<'a>,
    pub migrate: AllocSet<'a>,
    pub lost: AllocSet<'a>,
}

impl<'a> AllocSet<'a> {
    /// Partitions the set into untainted, migrate, and lost. Every input
    /// allocation lands in exactly one of the three.
    pub fn filter_by_tainted(&self, nodes: &NodeTable) -> TaintSplit<'a> {
        let mut untainted = Vec::new();
        let mut migrate = Vec::new();
        let mut lost = Vec::new();

        for alloc in self.iter() {
            match classify_taint(alloc, nodes) {
                Taint::Untainted => untainted.push(alloc),
                Taint::Migrate => migrate.push(alloc),
                Taint::Lost => lost.push(alloc),
            }
        }

        TaintSplit {
            untainted: untainted.into_iter().collect(),
            migrate: migrate.into_iter().collect(),
            lost: lost.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use convoy_id::AllocId;
    use proptest::prelude::*;

    use super::*;
    use crate::structs::{
        ClientStatus, DesiredStatus, DesiredTransition, DrainStrategy, NodeStatus,
    };

    struct Fixture {
        nodes: NodeTable,
        draining: NodeId,
        down: NodeId,
        ready: NodeId,
        missing: NodeId,
    }

    fn fixture() -> Fixture {
        let draining = NodeId::from_u128(1);
        let down = NodeId::from_u128(2);
        let ready = NodeId::from_u128(3);
        let missing = NodeId::from_u128(4);

        let nodes = [
            Node {
                id: draining,
                name: "draining".into(),
                status: NodeStatus::Ready,
                drain_strategy: Some(DrainStrategy::default()),
            },
            Node {
                id: down,
                name: "down".into(),
                status: NodeStatus::Down,
                drain_strategy: None,
            },
            Node {
                id: ready,
                name: "ready".into(),
                status: NodeStatus::Ready,
                drain_strategy: None,
            },
        ]
        .into_iter()
        .collect();

        Fixture {
            nodes,
            draining,
            down,
            ready,
            missing,
        }
    }

    fn alloc(id: u128, node: NodeId, status: ClientStatus, migrate: bool) -> Allocation {
        Allocation {
            id: AllocId::from_u128(id),
            job_id: "foo".into(),
            task_group: "bar".into(),
            name: format!("foo.bar[{id}]"),
            node_id: Some(node),
            client_status: status,
            desired_status: DesiredStatus::Run,
            desired_transition: if migrate {
                DesiredTransition::migrate()
            } else {
                DesiredTransition::default()
            },
            task_states: Default::default(),
            create_index: 0,
            next_allocation: None,
            previous_allocation: None,
        }
    }

    #[test]
    fn test_filter_by_tainted() {
        let f = fixture();
        let allocs = [
            // Live alloc asked to migrate off a draining node.
            alloc(1, f.draining, ClientStatus::Running, true),
            // Live alloc asked to migrate off a node missing from the snapshot.
            alloc(2, f.missing, ClientStatus::Running, true),
            alloc(3, f.ready, ClientStatus::Running, false),
            // Terminal allocs stay untainted whatever the node state.
            alloc(4, f.ready, ClientStatus::Complete, false),
            alloc(5, f.draining, ClientStatus::Complete, false),
            alloc(6, f.down, ClientStatus::Complete, false),
            // Live allocs on down nodes are lost.
            alloc(7, f.down, ClientStatus::Pending, false),
            alloc(8, f.down, ClientStatus::Running, false),
        ];
        let set: AllocSet = allocs.iter().collect();

        let split = set.filter_by_tainted(&f.nodes);

        let ids = |s: &AllocSet| s.ids().map(|id| id.ulid().0).collect::<Vec<_>>();
        assert_eq!(ids(&split.untainted), vec![3, 4, 5, 6]);
        assert_eq!(ids(&split.migrate), vec![1, 2]);
        assert_eq!(ids(&split.lost), vec![7, 8]);
    }

    #[test]
    fn test_migrate_flag_on_healthy_node_is_noop() {
        let f = fixture();
        let a = alloc(1, f.ready, ClientStatus::Running, true);
        assert_eq!(classify_taint(&a, &f.nodes), Taint::Untainted);
    }

    #[test]
    fn test_migrate_beats_lost() {
        let f = fixture();
        let a = alloc(1, f.down, ClientStatus::Running, true);
        assert_eq!(classify_taint(&a, &f.nodes), Taint::Migrate);
    }

    #[test]
    fn test_draining_or_unresolved_without_migrate_is_untainted() {
        let f = fixture();
        let on_drain = alloc(1, f.draining, ClientStatus::Running, false);
        let mut nowhere = alloc(2, f.missing, ClientStatus::Running, false);
        assert_eq!(classify_taint(&on_drain, &f.nodes), Taint::Untainted);
        assert_eq!(classify_taint(&nowhere, &f.nodes), Taint::Untainted);

        nowhere.node_id = None;
        assert_eq!(classify_taint(&nowhere, &f.nodes), Taint::Untainted);
    }

    #[test]
    fn test_taint_reason() {
        let f = fixture();
        assert_eq!(
            TaintReason::of(f.nodes.lookup(Some(&f.draining))),
            Some(TaintReason::NodeDraining)
        );
        assert_eq!(
            TaintReason::of(f.nodes.lookup(Some(&f.down))),
            Some(TaintReason::NodeDown)
        );
        assert_eq!(
            TaintReason::of(f.nodes.lookup(Some(&f.missing))),
            Some(TaintReason::NodeUnresolved)
        );
        assert_eq!(TaintReason::of(f.nodes.lookup(Some(&f.ready))), None);
        assert_eq!(TaintReason::of(f.nodes.lookup(None)), Some(TaintReason::NodeUnresolved));
    }

    proptest! {
        #[test]
        fn prop_filter_by_tainted_is_a_partition(
            cases in proptest::collection::vec((0u8..4, 0u8..5, any::<bool>()), 0..40)
        ) {
            let f = fixture();
            let node_for = |n: u8| match n {
                0 => f.draining,
                1 => f.down,
                2 => f.ready,
                _ => f.missing,
            };
            let status_for = |s: u8| match s {
                0 => ClientStatus::Pending,
                1 => ClientStatus::Running,
                2 => ClientStatus::Complete,
                3 => ClientStatus::Failed,
                _ => ClientStatus::Lost,
            };

            let allocs: Vec<_> = cases
                .iter()
                .enumerate()
                .map(|(i, (n, s, m))| alloc(i as u128 + 1, node_for(*n), status_for(*s), *m))
                .collect();
            let set: AllocSet = allocs.iter().collect();
            let split = set.filter_by_tainted(&f.nodes);

            prop_assert_eq!(
                split.untainted.len() + split.migrate.len() + split.lost.len(),
                set.len()
            );
            prop_assert!(split.untainted.difference(&[&split.migrate, &split.lost]) == split.untainted);
            prop_assert!(split.migrate.difference(&[&split.lost]) == split.migrate);
            prop_assert_eq!(
                split.untainted.union(&[&split.migrate, &split.lost]),
                set
            );
        }
    }
}
