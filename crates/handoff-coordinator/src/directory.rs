// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Registry of workers and their load counters.
//!
//! Workers are kept in a `BTreeMap` keyed by id, so iteration is in id order
//! and [`WorkerDirectory::least_loaded`] breaks ties on the lowest id.

use std::collections::BTreeMap;
use std::sync::Arc;

use handoff_core::Worker;

/// A registered worker and the number of sessions bound to it.
#[derive(Debug, Clone)]
pub struct WorkerSlot {
    pub worker: Arc<Worker>,
    pub load: u32,
}

#[derive(Debug, Default)]
pub struct WorkerDirectory {
    slots: BTreeMap<String, WorkerSlot>,
}

impl WorkerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a worker. Returns `true` for a new id.
    ///
    /// Re-registering an existing id swaps the worker and keeps its load.
    /// A change of worker type must go through [`unregister`](Self::unregister)
    /// first so the bound sessions can be moved.
    pub fn register(&mut self, worker: Arc<Worker>) -> bool {
        match self.slots.get_mut(worker.id()) {
            Some(slot) => {
                slot.worker = worker;
                false
            }
            None => {
                self.slots
                    .insert(worker.id().to_string(), WorkerSlot { worker, load: 0 });
                true
            }
        }
    }

    /// Removes a worker and its load entry.
    pub fn unregister(&mut self, id: &str) -> Option<WorkerSlot> {
        self.slots.remove(id)
    }

    pub fn get(&self, id: &str) -> Option<&Arc<Worker>> {
        self.slots.get(id).map(|slot| &slot.worker)
    }

    pub fn load(&self, id: &str) -> Option<u32> {
        self.slots.get(id).map(|slot| slot.load)
    }

    /// The worker of `worker_type` with the fewest bound sessions, lowest id first on ties.
    pub fn least_loaded(&self, worker_type: &str) -> Option<Arc<Worker>> {
        self.slots
            .values()
            .filter(|slot| slot.worker.worker_type() == worker_type)
            .min_by_key(|slot| slot.load)
            .map(|slot| Arc::clone(&slot.worker))
    }

    /// Returns `false` when the id is not registered.
    pub fn increment_load(&mut self, id: &str) -> bool {
        match self.slots.get_mut(id) {
            Some(slot) => {
                slot.load += 1;
                true
            }
            None => false,
        }
    }

    /// Decrements a load counter, clamping at zero.
    pub fn decrement_load(&mut self, id: &str) -> bool {
        match self.slots.get_mut(id) {
            Some(slot) => {
                slot.load = slot.load.saturating_sub(1);
                true
            }
            None => false,
        }
    }

    pub fn has_type(&self, worker_type: &str) -> bool {
        self.slots
            .values()
            .any(|slot| slot.worker.worker_type() == worker_type)
    }

    /// Sum of loads per worker type.
    pub fn load_by_type(&self) -> BTreeMap<String, u32> {
        let mut totals = BTreeMap::new();
        for slot in self.slots.values() {
            *totals
                .entry(slot.worker.worker_type().to_string())
                .or_insert(0) += slot.load;
        }
        totals
    }

    pub fn slots(&self) -> impl Iterator<Item = &WorkerSlot> {
        self.slots.values()
    }

    pub fn workers(&self) -> Vec<Arc<Worker>> {
        self.slots.values().map(|s| Arc::clone(&s.worker)).collect()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use handoff_test_utils::ScriptedWorker;

    fn worker(id: &str, worker_type: &str) -> Arc<Worker> {
        Arc::new(Worker::new(id, worker_type, Arc::new(ScriptedWorker::new())))
    }

    #[test]
    fn register_is_idempotent_and_keeps_load() {
        let mut dir = WorkerDirectory::new();
        assert!(dir.register(worker("a", "support")));
        dir.increment_load("a");
        assert!(!dir.register(worker("a", "support")));
        assert_eq!(dir.load("a"), Some(1));
        assert_eq!(dir.len(), 1);
    }

    #[test]
    fn least_loaded_prefers_lowest_id_on_tie() {
        let mut dir = WorkerDirectory::new();
        dir.register(worker("b", "support"));
        dir.register(worker("a", "support"));
        dir.register(worker("c", "sales"));
        assert_eq!(dir.least_loaded("support").unwrap().id(), "a");
        dir.increment_load("a");
        assert_eq!(dir.least_loaded("support").unwrap().id(), "b");
        dir.increment_load("b");
        assert_eq!(dir.least_loaded("support").unwrap().id(), "a");
        assert!(dir.least_loaded("legal").is_none());
    }

    #[test]
    fn decrement_clamps_at_zero() {
        let mut dir = WorkerDirectory::new();
        dir.register(worker("a", "support"));
        dir.decrement_load("a");
        dir.decrement_load("a");
        assert_eq!(dir.load("a"), Some(0));
        assert!(!dir.decrement_load("missing"));
        assert!(!dir.increment_load("missing"));
    }

    #[test]
    fn unregister_drops_load_entry() {
        let mut dir = WorkerDirectory::new();
        dir.register(worker("a", "support"));
        dir.increment_load("a");
        let slot = dir.unregister("a").unwrap();
        assert_eq!(slot.load, 1);
        assert!(dir.load("a").is_none());
        assert!(!dir.has_type("support"));
    }

    #[test]
    fn load_by_type_sums_workers() {
        let mut dir = WorkerDirectory::new();
        dir.register(worker("a", "support"));
        dir.register(worker("b", "support"));
        dir.register(worker("c", "sales"));
        dir.increment_load("a");
        dir.increment_load("b");
        dir.increment_load("b");
        let totals = dir.load_by_type();
        assert_eq!(totals["support"], 3);
        assert_eq!(totals["sales"], 0);
    }
}
