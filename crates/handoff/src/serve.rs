// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `handoff serve` command implementation.
//!
//! Opens the configured key-value backend, registers the configured workers
//! (or the default roster), starts the coordinator's background tasks and
//! logs a status line periodically until a shutdown signal arrives.

use std::time::Duration;

use tracing::{info, warn};

use handoff_config::{HandoffConfig, WorkerConfig};
use handoff_coordinator::{Coordinator, install_signal_handler};
use handoff_core::HandoffError;
use handoff_policy::{default_roster, worker_from_config};

/// Workers from `[[workers]]`, or the built-in roster when none are configured.
pub(crate) fn worker_configs(config: &HandoffConfig) -> Vec<WorkerConfig> {
    if config.workers.is_empty() {
        default_roster()
    } else {
        config.workers.clone()
    }
}

/// Builds a coordinator with every configured worker registered.
pub(crate) async fn build_coordinator(config: &HandoffConfig) -> Result<Coordinator, HandoffError> {
    let store = handoff_storage::open_backend(&config.persistence).await?;
    if store.is_none() {
        warn!("persistence disabled, conversations live in memory only");
    }

    let coordinator = Coordinator::new(config, store);
    for worker_config in worker_configs(config) {
        coordinator
            .register_worker(worker_from_config(&worker_config))
            .await;
    }
    Ok(coordinator)
}

/// Runs the `handoff serve` command.
pub async fn run_serve(config: HandoffConfig) -> Result<(), HandoffError> {
    init_tracing(&config.coordinator.log_level);

    #[cfg(feature = "prometheus")]
    let exporter = if config.prometheus.enabled {
        Some(handoff_prometheus::PrometheusExporter::install()?)
    } else {
        None
    };

    let coordinator = build_coordinator(&config).await?;
    coordinator.start();
    let cancel = install_signal_handler();

    info!(
        backend = ?config.persistence.backend,
        workers = coordinator.get_worker_workload().await.len(),
        "handoff coordinator running"
    );

    let mut interval =
        tokio::time::interval(Duration::from_secs(config.coordinator.status_interval_secs));
    // Skip the first immediate tick.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                log_status(&coordinator).await;
            }
            _ = cancel.cancelled() => {
                info!("shutdown requested");
                break;
            }
        }
    }

    coordinator.stop().await;

    #[cfg(feature = "prometheus")]
    if let Some(exporter) = exporter {
        tracing::debug!(snapshot = %exporter.render(), "final metrics snapshot");
    }

    info!("handoff stopped");
    Ok(())
}

async fn log_status(coordinator: &Coordinator) {
    let rollup = coordinator.latest_rollup();
    let health = coordinator.health_check().await;
    info!(
        health = ?health.status,
        active_sessions = rollup.active_sessions,
        waiting_sessions = rollup.waiting_sessions,
        completed_sessions = rollup.completed_sessions,
        escalation_rate = rollup.escalation_rate,
        "status"
    );
    for workload in coordinator.get_worker_workload().await {
        tracing::debug!(
            worker_id = %workload.worker_id,
            worker_type = %workload.worker_type,
            load = workload.current_load,
            "worker load"
        );
    }
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("handoff={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
