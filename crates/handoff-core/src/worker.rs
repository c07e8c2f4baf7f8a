// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Registered workers and their cumulative counters.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::HandoffError;
use crate::traits::WorkerBehavior;
use crate::types::{HealthStatus, WorkerMetrics};

#[derive(Debug, Default)]
struct WorkerStats {
    requests: u64,
    successes: u64,
    failures: u64,
    escalations: u64,
    total_latency: Duration,
}

/// A conversation handler registered with the coordinator.
///
/// `worker_type` is a plain tag; behaviour differences live in the injected
/// [`WorkerBehavior`].
pub struct Worker {
    id: String,
    worker_type: String,
    behavior: Arc<dyn WorkerBehavior>,
    stats: Mutex<WorkerStats>,
}

impl Worker {
    pub fn new(
        id: impl Into<String>,
        worker_type: impl Into<String>,
        behavior: Arc<dyn WorkerBehavior>,
    ) -> Self {
        Self {
            id: id.into(),
            worker_type: worker_type.into(),
            behavior,
            stats: Mutex::new(WorkerStats::default()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn worker_type(&self) -> &str {
        &self.worker_type
    }

    pub fn behavior(&self) -> &Arc<dyn WorkerBehavior> {
        &self.behavior
    }

    pub async fn health_check(&self) -> Result<HealthStatus, HandoffError> {
        self.behavior.health_check().await
    }

    pub fn record_request(&self) {
        self.with_stats(|s| s.requests += 1);
    }

    pub fn record_success(&self, latency: Duration) {
        self.with_stats(|s| {
            s.successes += 1;
            s.total_latency += latency;
        });
    }

    pub fn record_failure(&self) {
        self.with_stats(|s| s.failures += 1);
    }

    pub fn record_escalation(&self) {
        self.with_stats(|s| s.escalations += 1);
    }

    /// Reads the cumulative counters.
    pub fn metrics(&self) -> Result<WorkerMetrics, HandoffError> {
        let stats = self.stats.lock().map_err(|_| {
            HandoffError::Internal(format!("metrics of worker {} are poisoned", self.id))
        })?;
        let avg_latency_ms = if stats.successes == 0 {
            0.0
        } else {
            stats.total_latency.as_secs_f64() * 1000.0 / stats.successes as f64
        };
        Ok(WorkerMetrics {
            requests: stats.requests,
            successes: stats.successes,
            failures: stats.failures,
            escalations: stats.escalations,
            avg_latency_ms,
        })
    }

    fn with_stats(&self, f: impl FnOnce(&mut WorkerStats)) {
        // A poisoned counter only affects reporting; updates are dropped and
        // the read path surfaces the error.
        if let Ok(mut stats) = self.stats.lock() {
            f(&mut stats);
        }
    }
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.id)
            .field("worker_type", &self.worker_type)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{GenerationRequest, WorkerReply};
    use async_trait::async_trait;

    struct Echo;

    #[async_trait]
    impl WorkerBehavior for Echo {
        async fn handle(&self, request: &GenerationRequest) -> Result<WorkerReply, HandoffError> {
            Ok(WorkerReply::text(request.message.clone()))
        }
    }

    #[test]
    fn counters_accumulate() {
        let worker = Worker::new("w1", "customer_service", Arc::new(Echo));
        worker.record_request();
        worker.record_request();
        worker.record_success(Duration::from_millis(100));
        worker.record_failure();
        worker.record_escalation();

        let metrics = worker.metrics().unwrap();
        assert_eq!(metrics.requests, 2);
        assert_eq!(metrics.successes, 1);
        assert_eq!(metrics.failures, 1);
        assert_eq!(metrics.escalations, 1);
        assert!((metrics.avg_latency_ms - 100.0).abs() < 1e-6);
        assert!((metrics.success_rate() - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn default_health_is_healthy() {
        let worker = Worker::new("w1", "sales", Arc::new(Echo));
        assert_eq!(worker.health_check().await.unwrap(), HealthStatus::Healthy);
        let reply = worker
            .behavior()
            .handle(&GenerationRequest {
                session_id: "s".into(),
                message: "ping".into(),
                history: Vec::new(),
            })
            .await
            .unwrap();
        assert_eq!(reply.text, "ping");
    }
}
