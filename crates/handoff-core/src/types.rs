// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the coordinator, its collaborators and callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Generates a fresh identifier for sessions and messages.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Health status reported by worker health checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "lowercase")]
pub enum HealthStatus {
    /// Worker is fully operational.
    Healthy,
    /// Worker is operational but experiencing issues.
    Degraded(String),
    /// Worker is not operational.
    Unhealthy(String),
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }
}

/// Lifecycle status of a session.
///
/// `Resolved`, `Abandoned` and `Closed` are terminal: once reached, the
/// session accepts no further assignment, escalation or messages.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Waiting,
    Escalated,
    Resolved,
    Abandoned,
    Closed,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionStatus::Resolved | SessionStatus::Abandoned | SessionStatus::Closed
        )
    }
}

/// Who produced a message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MessageRole {
    /// Sent by the customer.
    Inbound,
    /// Produced by a worker.
    Outbound,
    /// Informational notice, e.g. a hand-off announcement.
    System,
}

/// Result of an escalation attempt, recorded on the escalation record.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EscalationOutcome {
    /// A worker of the target type took over the session.
    Success,
    /// No worker of the target type was registered; the session is waiting.
    Unassigned,
}

/// Cumulative counters reported by a single worker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkerMetrics {
    /// Number of messages handed to the worker.
    pub requests: u64,
    /// Requests that produced a reply (possibly after retries).
    pub successes: u64,
    /// Requests that exhausted their retries and fell back.
    pub failures: u64,
    /// Escalations the worker recommended.
    pub escalations: u64,
    /// Mean latency of successful requests, in milliseconds.
    pub avg_latency_ms: f64,
}

impl WorkerMetrics {
    /// Fraction of requests that succeeded, `0.0` when idle.
    pub fn success_rate(&self) -> f64 {
        if self.requests == 0 {
            0.0
        } else {
            self.successes as f64 / self.requests as f64
        }
    }
}

/// Per-worker entry of the workload report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerWorkload {
    pub worker_id: String,
    pub worker_type: String,
    pub current_load: u32,
    /// `None` when the worker's counters could not be read.
    pub metrics: Option<WorkerMetrics>,
}

/// System-wide figures folded from session counters and worker counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemMetrics {
    pub total_sessions: u64,
    pub active_sessions: u64,
    pub waiting_sessions: u64,
    pub completed_sessions: u64,
    pub total_escalations: u64,
    /// Mean of `resolution_time` over completed sessions, in seconds.
    pub average_resolution_time_secs: f64,
    /// `total_escalations / completed_sessions`, `0.0` before any completion.
    pub escalation_rate: f64,
    pub worker_count: u64,
    pub total_requests: u64,
    pub total_successes: u64,
    pub total_failures: u64,
    /// Mean latency of successful worker calls across all workers, in
    /// milliseconds. Each worker's average is weighted by its success count.
    pub average_latency_ms: f64,
    /// Workers whose counters could not be read during this rollup.
    pub skipped_workers: u64,
    pub timestamp: Option<DateTime<Utc>>,
}
