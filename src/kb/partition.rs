//! A single KB partition: a bounded, capacity-checked bucket of assertions.
//!
//! Guarded by a read-mostly `parking_lot::RwLock` for the assertion map
//! (many concurrent readers, rare structural writes) plus a dedicated
//! `Mutex` that the TMS takes for the duration of a whole commit-or-retract
//! operation, serializing them per partition (spec.md §5: "the TMS
//! serializes commit and retract operations per partition (a
//! partition-scoped monitor) to preserve invariants").

use super::assertion::Assertion;
use crate::ids::AssertionId;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub struct Partition {
    /// `BTreeMap` keyed by id gives "iteration ordered by assertion id" for
    /// free (spec.md §4.2 ordering guarantee, §8-E4).
    assertions: RwLock<BTreeMap<AssertionId, Arc<Assertion>>>,
    capacity: AtomicUsize,
    /// Held across an entire commit or retract to linearize partition
    /// mutation (spec.md §5).
    pub monitor: Mutex<()>,
}

impl Partition {
    pub fn new(capacity: usize) -> Self {
        Partition {
            assertions: RwLock::new(BTreeMap::new()),
            capacity: AtomicUsize::new(capacity),
            monitor: Mutex::new(()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity.load(Ordering::Relaxed)
    }

    /// Reconfigure capacity in place. Existing assertions are untouched; a
    /// lowered capacity only takes effect on the next eviction sweep.
    pub fn set_capacity(&self, capacity: usize) {
        self.capacity.store(capacity, Ordering::Relaxed);
    }

    pub fn insert(&self, assertion: Arc<Assertion>) {
        self.assertions.write().insert(assertion.id, assertion);
    }

    pub fn get(&self, id: AssertionId) -> Option<Arc<Assertion>> {
        self.assertions.read().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.assertions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All active assertions, ordered by id.
    pub fn all_active(&self) -> Vec<Arc<Assertion>> {
        self.assertions
            .read()
            .values()
            .filter(|a| a.is_active())
            .cloned()
            .collect()
    }

    pub fn active_count(&self) -> usize {
        self.assertions.read().values().filter(|a| a.is_active()).count()
    }

    pub fn all_ids(&self) -> Vec<AssertionId> {
        self.assertions.read().keys().copied().collect()
    }
}
