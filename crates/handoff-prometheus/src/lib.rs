// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prometheus metrics export for the Handoff coordinator.
//!
//! Uses the metrics-rs facade with the Prometheus exporter. The coordinator
//! records through [`recording`]; `serve` installs the exporter and renders
//! the text format on demand.

pub mod recording;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use handoff_core::HandoffError;

pub use recording::{
    publish_system_metrics, record_escalation, record_generation_failure, record_latency,
    record_message, record_session_created, record_session_ended, register_metrics,
    set_worker_load,
};

/// Installed Prometheus recorder.
pub struct PrometheusExporter {
    handle: PrometheusHandle,
}

impl PrometheusExporter {
    /// Installs the Prometheus recorder globally.
    ///
    /// Only one recorder can be installed per process; a second call fails.
    pub fn install() -> Result<Self, HandoffError> {
        let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
            HandoffError::Internal(format!("failed to install Prometheus recorder: {e}"))
        })?;

        recording::register_metrics();

        tracing::info!("prometheus metrics recorder installed");

        Ok(Self { handle })
    }

    pub fn handle(&self) -> &PrometheusHandle {
        &self.handle
    }

    /// Render all collected metrics in Prometheus text format.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}
