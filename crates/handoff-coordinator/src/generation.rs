// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reply generation with bounded retries and a fixed fallback.
//!
//! Worker failures never reach the caller: after `max_attempts` failed
//! attempts the coordinator answers with the configured fallback text.

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use handoff_config::GenerationConfig;
use handoff_core::{GenerationRequest, HandoffError, Worker, WorkerReply};

/// Retry schedule for one generation call.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub attempt_timeout: Duration,
    pub fallback_message: String,
}

impl RetryPolicy {
    pub fn from_config(config: &GenerationConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            attempt_timeout: Duration::from_secs(config.attempt_timeout_secs),
            fallback_message: config.fallback_message.clone(),
        }
    }

    /// Delay before retrying after the given 1-based failed attempt.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&GenerationConfig::default())
    }
}

/// Result of [`generate`].
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub reply: WorkerReply,
    /// Set when every attempt failed and `reply` carries the fallback text.
    pub fallback: bool,
    pub attempts: u32,
}

/// Calls the worker until it produces a non-empty reply or attempts run out.
///
/// Updates the worker's request, success, failure and escalation counters.
pub async fn generate(
    worker: &Worker,
    request: &GenerationRequest,
    policy: &RetryPolicy,
) -> GenerationOutcome {
    worker.record_request();
    let started = Instant::now();

    for attempt in 1..=policy.max_attempts {
        match attempt_once(worker, request, policy.attempt_timeout).await {
            Ok(reply) => {
                let latency = started.elapsed();
                worker.record_success(latency);
                #[cfg(feature = "prometheus")]
                handoff_prometheus::record_latency(worker.worker_type(), latency.as_secs_f64());
                if reply.escalate_to.is_some() {
                    worker.record_escalation();
                }
                debug!(
                    session_id = %request.session_id,
                    worker_id = worker.id(),
                    attempt,
                    "generation succeeded"
                );
                return GenerationOutcome {
                    reply,
                    fallback: false,
                    attempts: attempt,
                };
            }
            Err(e) => {
                warn!(
                    session_id = %request.session_id,
                    worker_id = worker.id(),
                    attempt,
                    max_attempts = policy.max_attempts,
                    error = %e,
                    "generation attempt failed"
                );
                if attempt < policy.max_attempts {
                    tokio::time::sleep(policy.backoff(attempt)).await;
                }
            }
        }
    }

    worker.record_failure();
    #[cfg(feature = "prometheus")]
    handoff_prometheus::record_generation_failure(worker.worker_type());
    warn!(
        session_id = %request.session_id,
        worker_id = worker.id(),
        "generation exhausted retries, answering with fallback"
    );
    GenerationOutcome {
        reply: WorkerReply::text(policy.fallback_message.clone()),
        fallback: true,
        attempts: policy.max_attempts,
    }
}

async fn attempt_once(
    worker: &Worker,
    request: &GenerationRequest,
    timeout: Duration,
) -> Result<WorkerReply, HandoffError> {
    let reply = tokio::time::timeout(timeout, worker.behavior().handle(request))
        .await
        .map_err(|_| HandoffError::Timeout { duration: timeout })??;
    if reply.text.trim().is_empty() {
        return Err(HandoffError::generation("worker returned an empty reply"));
    }
    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use handoff_test_utils::{FailingWorker, GatedWorker, ScriptedWorker};

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(250),
            attempt_timeout: Duration::from_secs(1),
            fallback_message: "please hold".into(),
        }
    }

    fn request() -> GenerationRequest {
        GenerationRequest {
            session_id: "s1".into(),
            message: "hello".into(),
            history: Vec::new(),
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let p = policy();
        assert_eq!(p.backoff(1), Duration::from_millis(100));
        assert_eq!(p.backoff(2), Duration::from_millis(200));
        assert_eq!(p.backoff(3), Duration::from_millis(250));
        assert_eq!(p.backoff(40), Duration::from_millis(250));
    }

    #[test]
    fn default_policy_uses_generation_defaults() {
        let p = RetryPolicy::default();
        assert_eq!(p.max_attempts, 3);
        assert_eq!(p.initial_backoff, Duration::from_secs(4));
        assert_eq!(p.max_backoff, Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_then_succeeds() {
        let behavior = Arc::new(ScriptedWorker::with_script(vec![
            Err("flaky".into()),
            Ok(WorkerReply::text("   ")),
            Ok(WorkerReply::escalating("moving you on", "sales_specialist")),
        ]));
        let worker = Worker::new("w1", "customer_service", behavior.clone());

        let outcome = generate(&worker, &request(), &policy()).await;

        assert!(!outcome.fallback);
        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.reply.escalate_to.as_deref(), Some("sales_specialist"));
        let metrics = worker.metrics().unwrap();
        assert_eq!(metrics.requests, 1);
        assert_eq!(metrics.successes, 1);
        assert_eq!(metrics.failures, 0);
        assert_eq!(metrics.escalations, 1);
        assert_eq!(behavior.call_count().await, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_fall_back() {
        let behavior = Arc::new(FailingWorker::new());
        let worker = Worker::new("w1", "customer_service", behavior.clone());

        let outcome = generate(&worker, &request(), &policy()).await;

        assert!(outcome.fallback);
        assert_eq!(outcome.reply.text, "please hold");
        assert_eq!(outcome.reply.escalate_to, None);
        assert_eq!(behavior.calls(), 3);
        let metrics = worker.metrics().unwrap();
        assert_eq!(metrics.failures, 1);
        assert_eq!(metrics.successes, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_worker_times_out() {
        let worker = Worker::new(
            "w1",
            "customer_service",
            Arc::new(GatedWorker::new(WorkerReply::text("never"))),
        );
        let outcome = generate(&worker, &request(), &policy()).await;
        assert!(outcome.fallback);
    }
}
