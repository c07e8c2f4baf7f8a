// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session coordination for Handoff.
//!
//! The [`Coordinator`] owns the worker directory, the session table and the
//! conversation store. It assigns sessions to the least-loaded worker of the
//! requested type, forwards customer messages to that worker, moves sessions
//! between worker types on escalation and runs two background loops: the
//! idle-session reaper and the metrics aggregator.
//!
//! A single coordination lock guards the directory, the session table and the
//! counters. It is never held across a worker call or a store call.

pub mod aggregator;
pub mod conversation;
pub mod directory;
pub mod generation;
pub mod lifecycle;
pub mod reaper;
pub mod scheduler;
pub mod shutdown;
pub mod tags;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use arc_swap::ArcSwap;
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use handoff_config::HandoffConfig;
use handoff_core::{
    HealthStatus, KeyValueStore, Session, SessionStatus, SystemMetrics, Worker, WorkerWorkload,
};

pub use conversation::ConversationStore;
pub use directory::{WorkerDirectory, WorkerSlot};
pub use generation::{GenerationOutcome, RetryPolicy};
pub use lifecycle::{MessageOutcome, SessionCreated};
pub use shutdown::install_signal_handler;

/// Timings and limits taken from `[coordinator]`.
#[derive(Debug, Clone)]
pub struct Settings {
    pub reaper_interval: Duration,
    pub idle_timeout: Duration,
    pub metrics_interval: Duration,
    pub cleanup_delay: Duration,
    pub history_window: usize,
    pub default_worker_type: String,
}

impl Settings {
    pub fn from_config(config: &HandoffConfig) -> Self {
        let c = &config.coordinator;
        Self {
            reaper_interval: Duration::from_secs(c.reaper_interval_secs),
            idle_timeout: Duration::from_secs(c.idle_timeout_secs),
            metrics_interval: Duration::from_secs(c.metrics_interval_secs),
            cleanup_delay: Duration::from_secs(c.context_cleanup_delay_secs),
            history_window: c.history_window,
            default_worker_type: c.default_worker_type.clone(),
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) total_sessions: u64,
    pub(crate) completed_sessions: u64,
    pub(crate) total_escalations: u64,
    pub(crate) total_resolution_time: f64,
}

impl Counters {
    pub(crate) fn record_completion(&mut self, resolution_time: f64) {
        self.completed_sessions += 1;
        self.total_resolution_time += resolution_time;
    }
}

/// Everything guarded by the coordination lock.
#[derive(Debug, Default)]
pub(crate) struct CoordinatorState {
    pub(crate) directory: WorkerDirectory,
    pub(crate) sessions: HashMap<String, Session>,
    pub(crate) counters: Counters,
}

pub(crate) struct Inner {
    pub(crate) state: Mutex<CoordinatorState>,
    pub(crate) conversations: ConversationStore,
    /// Serialises message handling per session id.
    pub(crate) gates: DashMap<String, Arc<Mutex<()>>>,
    pub(crate) settings: Settings,
    pub(crate) retry: RetryPolicy,
    pub(crate) rollup: ArcSwap<SystemMetrics>,
    pub(crate) cancel: CancellationToken,
    pub(crate) tracker: TaskTracker,
    started: AtomicBool,
}

/// Result of [`Coordinator::health_check`].
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub workers: BTreeMap<String, HealthStatus>,
    pub active_sessions: u64,
}

/// Cheaply cloneable handle to the coordinator.
#[derive(Clone)]
pub struct Coordinator {
    pub(crate) inner: Arc<Inner>,
}

impl Coordinator {
    /// Builds a coordinator. `kv` of `None` keeps conversations in memory only.
    pub fn new(config: &HandoffConfig, kv: Option<Arc<dyn KeyValueStore>>) -> Self {
        let ttl = Duration::from_secs(config.persistence.ttl_secs);
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(CoordinatorState::default()),
                conversations: ConversationStore::new(kv, ttl),
                gates: DashMap::new(),
                settings: Settings::from_config(config),
                retry: RetryPolicy::from_config(&config.generation),
                rollup: ArcSwap::from_pointee(SystemMetrics::default()),
                cancel: CancellationToken::new(),
                tracker: TaskTracker::new(),
                started: AtomicBool::new(false),
            }),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    /// Spawns the reaper and aggregator loops. Later calls are no-ops.
    pub fn start(&self) {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return;
        }
        let reaper = self.clone();
        self.inner.tracker.spawn(async move { reaper.run_reaper().await });
        let aggregator = self.clone();
        self.inner
            .tracker
            .spawn(async move { aggregator.run_aggregator().await });
        info!(
            reaper_interval_secs = self.inner.settings.reaper_interval.as_secs(),
            metrics_interval_secs = self.inner.settings.metrics_interval.as_secs(),
            "coordinator started"
        );
    }

    /// Cancels every background task and waits for them to finish.
    ///
    /// Pending context cleanups are dropped; the caches die with the process.
    pub async fn stop(&self) {
        self.inner.cancel.cancel();
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
        info!("coordinator stopped");
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.inner.cancel.clone()
    }

    /// Adds a worker. Returns `false` when the id was already registered.
    ///
    /// Re-registering an id under the same type swaps the worker and keeps
    /// its load. Under a different type the old worker is removed first, its
    /// sessions are rehomed as in [`Coordinator::unregister_worker`], and the
    /// new worker starts with no load.
    pub async fn register_worker(&self, worker: Worker) -> bool {
        let now = chrono::Utc::now();
        let id = worker.id().to_string();
        let worker_type = worker.worker_type().to_string();
        let mut state = self.inner.state.lock().await;
        let st = &mut *state;

        let retyped = st
            .directory
            .get(&id)
            .is_some_and(|existing| existing.worker_type() != worker_type);
        if retyped {
            if let Some(slot) = st.directory.unregister(&id) {
                let (rebound, waiting) = rehome_sessions(st, &slot, now);
                info!(
                    worker_id = %id,
                    from_type = slot.worker.worker_type(),
                    to_type = %worker_type,
                    rebound,
                    waiting,
                    "worker changed type"
                );
            }
        }

        let added = st.directory.register(Arc::new(worker)) && !retyped;
        info!(worker_id = %id, worker_type = %worker_type, added, "worker registered");
        added
    }

    /// Removes a worker. Sessions bound to it move to a sibling of the same
    /// type, or to `Waiting` when none is left.
    pub async fn unregister_worker(&self, worker_id: &str) -> bool {
        let now = chrono::Utc::now();
        let mut state = self.inner.state.lock().await;
        let st = &mut *state;
        let Some(slot) = st.directory.unregister(worker_id) else {
            return false;
        };
        let (rebound, waiting) = rehome_sessions(st, &slot, now);

        info!(
            worker_id,
            worker_type = slot.worker.worker_type(),
            rebound,
            waiting,
            "worker unregistered"
        );
        true
    }

    /// Load and counters of every registered worker, in id order.
    pub async fn get_worker_workload(&self) -> Vec<WorkerWorkload> {
        let slots: Vec<WorkerSlot> = self.inner.state.lock().await.directory.slots().cloned().collect();
        slots
            .into_iter()
            .map(|slot| {
                let metrics = match slot.worker.metrics() {
                    Ok(m) => Some(m),
                    Err(e) => {
                        warn!(worker_id = slot.worker.id(), error = %e, "worker metrics unreadable");
                        None
                    }
                };
                #[cfg(feature = "prometheus")]
                handoff_prometheus::set_worker_load(
                    slot.worker.id(),
                    slot.worker.worker_type(),
                    slot.load,
                );
                WorkerWorkload {
                    worker_id: slot.worker.id().to_string(),
                    worker_type: slot.worker.worker_type().to_string(),
                    current_load: slot.load,
                    metrics,
                }
            })
            .collect()
    }

    /// Non-terminal sessions per bound worker type.
    pub async fn session_distribution(&self) -> BTreeMap<String, u64> {
        let state = self.inner.state.lock().await;
        let mut distribution = BTreeMap::new();
        for worker_type in state
            .sessions
            .values()
            .filter(|s| !s.is_terminal())
            .filter_map(|s| s.current_worker_type.as_ref())
        {
            *distribution.entry(worker_type.clone()).or_insert(0) += 1;
        }
        distribution
    }

    /// Asks every worker for its health. `Degraded` when any worker is not
    /// healthy, `Unhealthy` when no worker is registered.
    pub async fn health_check(&self) -> HealthReport {
        let (workers, active_sessions) = {
            let state = self.inner.state.lock().await;
            let active = state.sessions.values().filter(|s| !s.is_terminal()).count() as u64;
            (state.directory.workers(), active)
        };

        let mut report = BTreeMap::new();
        for worker in &workers {
            let status = match worker.health_check().await {
                Ok(status) => status,
                Err(e) => HealthStatus::Unhealthy(e.to_string()),
            };
            report.insert(worker.id().to_string(), status);
        }

        let unhealthy: Vec<&str> = report
            .iter()
            .filter(|(_, status)| !status.is_healthy())
            .map(|(id, _)| id.as_str())
            .collect();
        let status = if workers.is_empty() {
            HealthStatus::Unhealthy("no workers registered".into())
        } else if unhealthy.is_empty() {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded(format!("unhealthy workers: {}", unhealthy.join(", ")))
        };
        debug!(?status, workers = workers.len(), "health check complete");

        HealthReport {
            status,
            workers: report,
            active_sessions,
        }
    }

    /// Current load of one worker.
    pub async fn worker_load(&self, worker_id: &str) -> Option<u32> {
        self.inner.state.lock().await.directory.load(worker_id)
    }

    /// Sum of worker loads per worker type.
    pub async fn load_by_type(&self) -> BTreeMap<String, u32> {
        self.inner.state.lock().await.directory.load_by_type()
    }

    /// Copy of every session still in the live table.
    pub async fn sessions(&self) -> Vec<Session> {
        self.inner.state.lock().await.sessions.values().cloned().collect()
    }

    pub(crate) fn gate(&self, session_id: &str) -> Arc<Mutex<()>> {
        self.inner
            .gates
            .entry(session_id.to_string())
            .or_default()
            .value()
            .clone()
    }
}

/// Moves the live sessions bound to a removed worker onto a sibling of the
/// same type, or to `Waiting`. Returns `(rebound, waiting)`.
fn rehome_sessions(
    st: &mut CoordinatorState,
    slot: &WorkerSlot,
    now: chrono::DateTime<chrono::Utc>,
) -> (usize, usize) {
    let worker_id = slot.worker.id();
    let worker_type = slot.worker.worker_type();
    let mut rebound = 0usize;
    let mut waiting = 0usize;
    for session in st
        .sessions
        .values_mut()
        .filter(|s| !s.is_terminal() && s.assigned_worker_id.as_deref() == Some(worker_id))
    {
        session.assigned_worker_id = None;
        if scheduler::assign(&mut st.directory, session, worker_type, now).is_some() {
            rebound += 1;
        } else {
            session.status = SessionStatus::Waiting;
            waiting += 1;
        }
    }
    (rebound, waiting)
}
