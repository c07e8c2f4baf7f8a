// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Periodic rollup of session counters and worker counters.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use handoff_core::{SessionStatus, SystemMetrics};

use crate::Coordinator;

impl Coordinator {
    /// Computes a fresh rollup and publishes it as the latest snapshot.
    ///
    /// Worker counters are read outside the coordination lock; a worker whose
    /// counters cannot be read is skipped and counted in `skipped_workers`.
    pub async fn aggregate_metrics(&self) -> SystemMetrics {
        let (workers, mut rollup, total_resolution_time) = {
            let state = self.inner.state.lock().await;
            let mut rollup = SystemMetrics {
                total_sessions: state.counters.total_sessions,
                completed_sessions: state.counters.completed_sessions,
                total_escalations: state.counters.total_escalations,
                worker_count: state.directory.len() as u64,
                ..Default::default()
            };
            for session in state.sessions.values().filter(|s| !s.is_terminal()) {
                if session.status == SessionStatus::Waiting {
                    rollup.waiting_sessions += 1;
                } else {
                    rollup.active_sessions += 1;
                }
            }
            (
                state.directory.workers(),
                rollup,
                state.counters.total_resolution_time,
            )
        };

        let mut latency_weight = 0u64;
        let mut weighted_latency = 0.0;
        for worker in &workers {
            match worker.metrics() {
                Ok(m) => {
                    rollup.total_requests += m.requests;
                    rollup.total_successes += m.successes;
                    rollup.total_failures += m.failures;
                    weighted_latency += m.avg_latency_ms * m.successes as f64;
                    latency_weight += m.successes;
                }
                Err(e) => {
                    warn!(worker_id = worker.id(), error = %e, "skipping worker in metrics rollup");
                    rollup.skipped_workers += 1;
                }
            }
        }

        if latency_weight > 0 {
            rollup.average_latency_ms = weighted_latency / latency_weight as f64;
        }
        if rollup.completed_sessions > 0 {
            let completed = rollup.completed_sessions as f64;
            rollup.average_resolution_time_secs = total_resolution_time / completed;
            rollup.escalation_rate = rollup.total_escalations as f64 / completed;
        }
        rollup.timestamp = Some(Utc::now());

        self.inner.rollup.store(Arc::new(rollup.clone()));
        #[cfg(feature = "prometheus")]
        handoff_prometheus::publish_system_metrics(&rollup);

        debug!(
            total_sessions = rollup.total_sessions,
            active_sessions = rollup.active_sessions,
            waiting_sessions = rollup.waiting_sessions,
            completed_sessions = rollup.completed_sessions,
            escalation_rate = rollup.escalation_rate,
            skipped_workers = rollup.skipped_workers,
            "metrics aggregated"
        );
        rollup
    }

    /// Fresh system-wide figures.
    pub async fn get_system_metrics(&self) -> SystemMetrics {
        self.aggregate_metrics().await
    }

    /// The rollup published by the last aggregation pass, without
    /// recomputing. All zeros before the first pass.
    pub fn latest_rollup(&self) -> Arc<SystemMetrics> {
        self.inner.rollup.load_full()
    }

    pub(crate) async fn run_aggregator(&self) {
        let mut interval = tokio::time::interval(self.inner.settings.metrics_interval);
        // Skip the first immediate tick.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let rollup = self.aggregate_metrics().await;
                    info!(
                        active_sessions = rollup.active_sessions,
                        waiting_sessions = rollup.waiting_sessions,
                        workers = rollup.worker_count,
                        "system metrics updated"
                    );
                }
                _ = self.inner.cancel.cancelled() => {
                    info!("metrics aggregator shutting down");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    use handoff_config::HandoffConfig;
    use handoff_core::{Worker, WorkerReply};
    use handoff_test_utils::ScriptedWorker;

    async fn coordinator() -> Coordinator {
        let mut config = HandoffConfig::default();
        config.coordinator.metrics_interval_secs = 60;
        let coordinator = Coordinator::new(&config, None);
        coordinator
            .register_worker(Worker::new(
                "cs-1",
                "customer_service",
                Arc::new(ScriptedWorker::with_script(vec![Ok(WorkerReply::escalating(
                    "let me get sales",
                    "sales_specialist",
                ))])),
            ))
            .await;
        coordinator
    }

    #[tokio::test]
    async fn rollup_folds_sessions_and_workers() {
        let coordinator = coordinator().await;
        assert_eq!(coordinator.latest_rollup().total_sessions, 0);

        let a = coordinator
            .create_session(None, None, HashMap::new())
            .await
            .unwrap();
        coordinator
            .create_session(None, Some("legal"), HashMap::new())
            .await
            .unwrap();
        coordinator.send_message(&a.session_id, "how much?").await.unwrap();
        coordinator
            .end_session(&a.session_id, SessionStatus::Resolved, None)
            .await
            .unwrap();

        let rollup = coordinator.get_system_metrics().await;
        assert_eq!(rollup.total_sessions, 2);
        assert_eq!(rollup.completed_sessions, 1);
        assert_eq!(rollup.waiting_sessions, 1);
        assert_eq!(rollup.active_sessions, 0);
        assert_eq!(rollup.total_escalations, 1);
        assert_eq!(rollup.escalation_rate, 1.0);
        assert_eq!(rollup.worker_count, 1);
        assert_eq!(rollup.total_requests, 1);
        assert_eq!(rollup.total_successes, 1);
        assert_eq!(rollup.skipped_workers, 0);
        assert!(rollup.timestamp.is_some());
        assert_eq!(*coordinator.latest_rollup(), rollup);
    }

    #[tokio::test]
    async fn latency_is_weighted_by_successful_calls() {
        let coordinator = coordinator().await;
        coordinator
            .register_worker(Worker::new(
                "cs-2",
                "customer_service",
                Arc::new(ScriptedWorker::new()),
            ))
            .await;
        let (fast, slow) = {
            let state = coordinator.inner.state.lock().await;
            (
                Arc::clone(state.directory.get("cs-1").unwrap()),
                Arc::clone(state.directory.get("cs-2").unwrap()),
            )
        };
        for _ in 0..3 {
            fast.record_request();
            fast.record_success(Duration::from_millis(10));
        }
        for _ in 0..5 {
            fast.record_request();
            fast.record_failure();
        }
        slow.record_request();
        slow.record_success(Duration::from_millis(50));

        let rollup = coordinator.get_system_metrics().await;
        assert_eq!(rollup.total_requests, 9);
        assert_eq!(rollup.total_successes, 4);
        assert_eq!(rollup.total_failures, 5);
        // (3 * 10ms + 1 * 50ms) / 4 successful calls
        assert!((rollup.average_latency_ms - 20.0).abs() < 1e-6);
    }

    #[tokio::test(start_paused = true)]
    async fn background_loop_publishes_rollups() {
        let coordinator = coordinator().await;
        coordinator
            .create_session(None, None, HashMap::new())
            .await
            .unwrap();
        coordinator.start();

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(coordinator.latest_rollup().active_sessions, 1);

        coordinator.stop().await;
    }
}
