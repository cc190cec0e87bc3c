//! Keyed allocation sets.
//!
//! An [`AllocSet`] borrows allocations from a snapshot and keys them by ID.
//! Every operation returns a new set and leaves its inputs untouched, so one
//! pass can branch into mutually exclusive subsets freely.

use std::collections::{btree_map, BTreeMap, BTreeSet};

use convoy_id::AllocId;

use crate::structs::Allocation;

/// A set of allocations keyed by allocation ID.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllocSet<'a> {
    allocs: BTreeMap<AllocId, &'a Allocation>,
}

impl<'a> AllocSet<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.allocs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.allocs.is_empty()
    }

    pub fn get(&self, id: &AllocId) -> Option<&'a Allocation> {
        self.allocs.get(id).copied()
    }

    pub fn contains(&self, id: &AllocId) -> bool {
        self.allocs.contains_key(id)
    }

    /// Iterates allocations in ID order.
    pub fn iter(&self) -> impl Iterator<Item = &'a Allocation> + '_ {
        self.allocs.values().copied()
    }

    pub fn ids(&self) -> impl Iterator<Item = AllocId> + '_ {
        self.allocs.keys().copied()
    }

    /// Returns the allocations matching a predicate.
    pub fn filter<F>(&self, mut pred: F) -> Self
    where
        F: FnMut(&Allocation) -> bool,
    {
        self.iter().filter(|a| pred(*a)).collect()
    }

    /// Splits into (matching, non-matching).
    pub fn partition<F>(&self, mut pred: F) -> (Self, Self)
    where
        F: FnMut(&Allocation) -> bool,
    {
        let (yes, no): (Vec<_>, Vec<_>) = self.iter().partition(|a| pred(*a));
        (yes.into_iter().collect(), no.into_iter().collect())
    }

    /// Returns the allocations not present in any of `others`.
    pub fn difference(&self, others: &[&AllocSet<'a>]) -> Self {
        self.filter(|a| !others.iter().any(|o| o.contains(&a.id)))
    }

    /// Returns the allocations present in this set or any of `others`.
    pub fn union(&self, others: &[&AllocSet<'a>]) -> Self {
        let mut out = self.clone();
        for other in others {
            out.allocs.extend(other.allocs.iter().map(|(k, v)| (*k, *v)));
        }
        out
    }

    /// Returns the subset whose IDs appear in `keys`. Unknown keys are
    /// skipped.
    pub fn from_keys<'k, I>(&self, keys: I) -> Self
    where
        I: IntoIterator<Item = &'k AllocId>,
    {
        keys.into_iter().filter_map(|id| self.get(id)).collect()
    }

    /// Splits into (terminal, non-terminal).
    pub fn split_terminal(&self) -> (Self, Self) {
        self.partition(Allocation::is_terminal)
    }

    /// Groups allocations by task group name.
    pub fn by_task_group(&self) -> BTreeMap<&'a str, AllocSet<'a>> {
        let mut groups: BTreeMap<&'a str, AllocSet<'a>> = BTreeMap::new();
        for alloc in self.iter() {
            groups
                .entry(alloc.task_group.as_str())
                .or_default()
                .allocs
                .insert(alloc.id, alloc);
        }
        groups
    }

    /// Returns the embedded indices, skipping malformed names.
    pub fn indexes(&self) -> BTreeSet<u32> {
        self.iter().filter_map(Allocation::index).collect()
    }

    /// Returns the allocations ordered by name index ascending. Allocations
    /// without an index come last; ties fall back to ID order.
    pub fn name_order(&self) -> Vec<&'a Allocation> {
        let mut out: Vec<_> = self.iter().collect();
        out.sort_by_key(|a| (a.index().is_none(), a.index(), a.id));
        out
    }
}

impl<'a> FromIterator<&'a Allocation> for AllocSet<'a> {
    fn from_iter<I: IntoIterator<Item = &'a Allocation>>(iter: I) -> Self {
        Self {
            allocs: iter.into_iter().map(|a| (a.id, a)).collect(),
        }
    }
}

impl<'s, 'a> IntoIterator for &'s AllocSet<'a> {
    type Item = &'a Allocation;
    type IntoIter = std::iter::Copied<btree_map::Values<'s, AllocId, &'a Allocation>>;

    fn into_iter(self) -> Self::IntoIter {
        self.allocs.values().copied()
    }
}
