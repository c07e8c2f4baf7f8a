// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Coordinator harness for integration tests.
//!
//! Wires a [`Coordinator`] with fast retry settings, in-memory persistence
//! and the given workers, and checks the load bookkeeping on demand.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use handoff_config::HandoffConfig;
use handoff_coordinator::Coordinator;
use handoff_core::{HandoffError, KeyValueStore, SessionStatus, Worker, WorkerBehavior};
use handoff_storage::MemoryKvStore;

use crate::scripted_worker::ScriptedWorker;

/// Defaults with millisecond backoff so failure paths stay quick.
pub fn fast_config() -> HandoffConfig {
    let mut config = HandoffConfig::default();
    config.generation.initial_backoff_ms = 1;
    config.generation.max_backoff_ms = 4;
    config.generation.attempt_timeout_secs = 5;
    config.coordinator.default_worker_type = "customer_service".into();
    config
}

/// Builder for [`TestHarness`].
pub struct TestHarnessBuilder {
    config: HandoffConfig,
    workers: Vec<Worker>,
    store: Option<Arc<dyn KeyValueStore>>,
    in_memory_store: bool,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            config: fast_config(),
            workers: Vec::new(),
            store: None,
            in_memory_store: true,
        }
    }

    /// Adjusts the configuration before the coordinator is built.
    pub fn with_config(mut self, f: impl FnOnce(&mut HandoffConfig)) -> Self {
        f(&mut self.config);
        self
    }

    pub fn with_worker(
        mut self,
        id: &str,
        worker_type: &str,
        behavior: Arc<dyn WorkerBehavior>,
    ) -> Self {
        self.workers.push(Worker::new(id, worker_type, behavior));
        self
    }

    /// Adds a worker answering "mock response" to everything.
    pub fn with_default_worker(self, id: &str, worker_type: &str) -> Self {
        self.with_worker(id, worker_type, Arc::new(ScriptedWorker::new()))
    }

    /// Uses `store` instead of a fresh in-memory store.
    pub fn with_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self.in_memory_store = false;
        self
    }

    /// Runs without any key-value store.
    pub fn without_store(mut self) -> Self {
        self.store = None;
        self.in_memory_store = false;
        self
    }

    pub async fn build(self) -> TestHarness {
        let memory = self
            .in_memory_store
            .then(|| Arc::new(MemoryKvStore::new()));
        let store = self.store.or_else(|| {
            memory
                .clone()
                .map(|m| m as Arc<dyn KeyValueStore>)
        });

        let coordinator = Coordinator::new(&self.config, store);
        for worker in self.workers {
            coordinator.register_worker(worker).await;
        }

        TestHarness {
            coordinator,
            memory,
            config: self.config,
        }
    }
}

/// A coordinator ready for integration tests.
pub struct TestHarness {
    pub coordinator: Coordinator,
    /// The in-memory store, unless a custom store was supplied or disabled.
    pub memory: Option<Arc<MemoryKvStore>>,
    pub config: HandoffConfig,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Opens a session with no customer id or metadata.
    pub async fn open(&self, worker_type: &str) -> Result<String, HandoffError> {
        self.coordinator
            .create_session(None, Some(worker_type), HashMap::new())
            .await
            .map(|created| created.session_id)
    }

    /// Asserts that, per worker type, the summed worker load equals the
    /// number of live sessions bound to that type, and that a live session
    /// is `Waiting` exactly when it is unbound.
    pub async fn assert_load_invariant(&self) {
        let loads = self.coordinator.load_by_type().await;
        let sessions = self.coordinator.sessions().await;

        let mut bound: BTreeMap<String, u32> = BTreeMap::new();
        for session in sessions.iter().filter(|s| !s.is_terminal()) {
            assert_eq!(
                session.status == SessionStatus::Waiting,
                session.current_worker_type.is_none(),
                "session {} is {} with worker type {:?}",
                session.id,
                session.status,
                session.current_worker_type
            );
            if let Some(worker_type) = &session.current_worker_type {
                *bound.entry(worker_type.clone()).or_insert(0) += 1;
            }
        }

        for (worker_type, load) in &loads {
            assert_eq!(
                *load,
                bound.get(worker_type).copied().unwrap_or(0),
                "load mismatch for worker type {worker_type}"
            );
        }
        for worker_type in bound.keys() {
            assert!(
                loads.contains_key(worker_type),
                "sessions bound to unregistered worker type {worker_type}"
            );
        }
    }
}
