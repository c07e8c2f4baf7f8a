// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Uses the metrics-rs facade so any installed recorder collects these.
//! Without a recorder every call is a no-op.

use handoff_core::SystemMetrics;
use metrics::{describe_counter, describe_gauge, describe_histogram};

/// Register all Handoff metric descriptions.
///
/// Called once at startup after the recorder is installed.
pub fn register_metrics() {
    describe_counter!("handoff_sessions_created_total", "Sessions created");
    describe_counter!("handoff_sessions_ended_total", "Sessions ended, by final status");
    describe_counter!("handoff_messages_total", "Messages appended to conversations");
    describe_counter!("handoff_escalations_total", "Escalations between worker types");
    describe_counter!(
        "handoff_generation_failures_total",
        "Messages answered with the fallback reply"
    );
    describe_gauge!("handoff_active_sessions", "Sessions bound to a worker");
    describe_gauge!("handoff_waiting_sessions", "Sessions waiting for a worker");
    describe_gauge!("handoff_worker_load", "Sessions currently bound to a worker");
    describe_gauge!("handoff_escalation_rate", "Escalations per completed session");
    describe_gauge!(
        "handoff_average_resolution_seconds",
        "Mean resolution time of completed sessions"
    );
    describe_histogram!(
        "handoff_generation_latency_seconds",
        "Latency of successful reply generation"
    );
}

pub fn record_session_created(worker_type: &str) {
    metrics::counter!("handoff_sessions_created_total", "worker_type" => worker_type.to_string())
        .increment(1);
}

pub fn record_session_ended(status: &str) {
    metrics::counter!("handoff_sessions_ended_total", "status" => status.to_string()).increment(1);
}

/// Record an appended message. `role` is `inbound`, `outbound` or `system`.
pub fn record_message(role: &str) {
    metrics::counter!("handoff_messages_total", "role" => role.to_string()).increment(1);
}

pub fn record_escalation(to_type: &str, outcome: &str) {
    metrics::counter!(
        "handoff_escalations_total",
        "to_type" => to_type.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

pub fn record_generation_failure(worker_type: &str) {
    metrics::counter!("handoff_generation_failures_total", "worker_type" => worker_type.to_string())
        .increment(1);
}

pub fn record_latency(worker_type: &str, seconds: f64) {
    metrics::histogram!("handoff_generation_latency_seconds", "worker_type" => worker_type.to_string())
        .record(seconds);
}

pub fn set_worker_load(worker_id: &str, worker_type: &str, load: u32) {
    metrics::gauge!(
        "handoff_worker_load",
        "worker_id" => worker_id.to_string(),
        "worker_type" => worker_type.to_string()
    )
    .set(f64::from(load));
}

/// Publish the session-level gauges of a rollup.
pub fn publish_system_metrics(rollup: &SystemMetrics) {
    metrics::gauge!("handoff_active_sessions").set(rollup.active_sessions as f64);
    metrics::gauge!("handoff_waiting_sessions").set(rollup.waiting_sessions as f64);
    metrics::gauge!("handoff_escalation_rate").set(rollup.escalation_rate);
    metrics::gauge!("handoff_average_resolution_seconds").set(rollup.average_resolution_time_secs);
}
