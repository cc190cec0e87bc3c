//! Typed ID definitions for scheduler resources.
//!
//! Each ID type has a unique prefix that identifies the resource type.
//! IDs are ULID-based for sortability and uniqueness.

use serde::{Deserialize, Serialize};

use crate::define_id;

// =============================================================================
// Cluster Resources
// =============================================================================

define_id!(
    /// Identifies one allocation (a task group instance bound to a node).
    AllocId,
    "alloc"
);
define_id!(
    /// Identifies a cluster member.
    NodeId,
    "node"
);

// =============================================================================
// Scheduling
// =============================================================================

define_id!(
    /// Identifies one evaluation (a single reconciliation pass for a job).
    EvalId,
    "eval"
);

// =============================================================================
// State Index
// =============================================================================

/// Monotonic index of the state store.
///
/// Every write to the cluster state bumps the index, so a snapshot taken at
/// index `n` reflects exactly the writes numbered `1..=n`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct StateIndex(u64);

impl StateIndex {
    /// The index of an empty store.
    pub const ZERO: Self = Self(0);

    /// Creates a new StateIndex from a u64.
    #[must_use]
    pub const fn new(index: u64) -> Self {
        Self(index)
    }

    /// Returns the underlying u64 value.
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.0
    }

    /// Returns the next index.
    #[must_use]
    pub const fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl std::fmt::Display for StateIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for StateIndex {
    fn from(index: u64) -> Self {
        Self(index)
    }
}

impl From<StateIndex> for u64 {
    fn from(index: StateIndex) -> Self {
        index.0
    }
}

// =============================================================================
// Tests
// =============================================================================
