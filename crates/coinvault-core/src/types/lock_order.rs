//! Canonical row-lock ordering.
//!
//! Two units of work that lock the same pair of rows in opposite order can
//! deadlock. Every unit of work therefore locks through a [`LockSet`], which
//! deduplicates its keys and hands them out in ascending order. Because the
//! set cannot be built unsorted, call sites cannot violate the ordering.

use std::collections::BTreeSet;

/// An ordered, deduplicated set of row keys to lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockSet<K: Ord> {
    keys: Vec<K>,
}

impl<K: Ord + Clone> LockSet<K> {
    /// Build a lock set from keys in any order.
    pub fn new(keys: impl IntoIterator<Item = K>) -> Self {
        let keys = keys
            .into_iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        Self { keys }
    }

    /// Keys in acquisition order.
    pub fn iter(&self) -> impl Iterator<Item = &K> {
        self.keys.iter()
    }

    /// Keys in acquisition order as a slice.
    pub fn as_slice(&self) -> &[K] {
        &self.keys
    }

    /// Whether `key` is part of the set.
    pub fn contains(&self, key: &K) -> bool {
        self.keys.binary_search(key).is_ok()
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl<K: Ord + Clone> FromIterator<K> for LockSet<K> {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        Self::new(iter)
    }
}
