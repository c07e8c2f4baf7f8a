// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Handoff coordinator.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Handoff configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HandoffConfig {
    /// Session lifecycle, reaper and aggregator settings.
    #[serde(default)]
    pub coordinator: CoordinatorConfig,

    /// Retry and fallback behaviour around response generation.
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Key-value write-through settings.
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Prometheus metrics export.
    #[serde(default)]
    pub prometheus: PrometheusConfig,

    /// Workers registered at startup.
    #[serde(default)]
    pub workers: Vec<WorkerConfig>,
}

/// Coordination settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CoordinatorConfig {
    /// How often the reaper scans for idle sessions.
    #[serde(default = "default_reaper_interval_secs")]
    pub reaper_interval_secs: u64,

    /// Sessions untouched for longer than this are abandoned.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,

    /// How often worker counters are folded into system metrics.
    #[serde(default = "default_metrics_interval_secs")]
    pub metrics_interval_secs: u64,

    /// Delay before an ended session's cached history is evicted.
    #[serde(default = "default_context_cleanup_delay_secs")]
    pub context_cleanup_delay_secs: u64,

    /// Number of recent messages handed to a worker.
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    /// Worker type for sessions created without one.
    #[serde(default = "default_worker_type")]
    pub default_worker_type: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// How often `serve` logs a status line. Zero disables it.
    #[serde(default = "default_status_interval_secs")]
    pub status_interval_secs: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            reaper_interval_secs: default_reaper_interval_secs(),
            idle_timeout_secs: default_idle_timeout_secs(),
            metrics_interval_secs: default_metrics_interval_secs(),
            context_cleanup_delay_secs: default_context_cleanup_delay_secs(),
            history_window: default_history_window(),
            default_worker_type: default_worker_type(),
            log_level: default_log_level(),
            status_interval_secs: default_status_interval_secs(),
        }
    }
}

fn default_reaper_interval_secs() -> u64 {
    300
}

fn default_idle_timeout_secs() -> u64 {
    1800
}

fn default_metrics_interval_secs() -> u64 {
    60
}

fn default_context_cleanup_delay_secs() -> u64 {
    3600
}

fn default_history_window() -> usize {
    10
}

fn default_worker_type() -> String {
    "customer_service".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_status_interval_secs() -> u64 {
    300
}

/// Response generation retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GenerationConfig {
    /// Total attempts per message, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the second attempt; doubled for every further attempt.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Upper bound for a single backoff delay.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Deadline for a single attempt.
    #[serde(default = "default_attempt_timeout_secs")]
    pub attempt_timeout_secs: u64,

    /// Reply sent when every attempt failed.
    #[serde(default = "default_fallback_message")]
    pub fallback_message: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            attempt_timeout_secs: default_attempt_timeout_secs(),
            fallback_message: default_fallback_message(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    4000
}

fn default_max_backoff_ms() -> u64 {
    10_000
}

fn default_attempt_timeout_secs() -> u64 {
    30
}

fn default_fallback_message() -> String {
    "I apologize for the inconvenience. I'm experiencing technical difficulties at the moment. \
     Please try again in a few moments, or I can transfer you to another representative if you prefer."
        .to_string()
}

/// Which key-value backend receives write-through records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PersistenceBackend {
    /// Process-local store with expiry.
    #[default]
    Memory,
    /// SQLite file at `database_path`.
    Sqlite,
    /// No write-through; history lives only in memory.
    None,
}

/// Key-value persistence configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PersistenceConfig {
    #[serde(default)]
    pub backend: PersistenceBackend,

    /// Expiry applied to every written record.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            backend: PersistenceBackend::default(),
            ttl_secs: default_ttl_secs(),
            database_path: default_database_path(),
        }
    }
}

fn default_ttl_secs() -> u64 {
    86_400
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("handoff").join("handoff.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("handoff.db"))
        .to_string_lossy()
        .into_owned()
}

/// Prometheus metrics export configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PrometheusConfig {
    /// Install the Prometheus recorder at startup.
    #[serde(default = "default_prometheus_enabled")]
    pub enabled: bool,
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            enabled: default_prometheus_enabled(),
        }
    }
}

fn default_prometheus_enabled() -> bool {
    true
}

/// A worker registered at startup (`[[workers]]` array).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerConfig {
    /// Unique worker id.
    pub id: String,

    /// Worker type tag, e.g. `technical_support`.
    pub worker_type: String,

    /// Reply template; `{message}` is replaced by the customer text.
    #[serde(default)]
    pub reply_template: Option<String>,

    /// Extra escalation rules, checked before the built-in ones.
    #[serde(default)]
    pub escalation_rules: Vec<EscalationRuleConfig>,

    /// Include the built-in rules for this worker type.
    #[serde(default = "default_builtin_rules")]
    pub builtin_rules: bool,

    /// Target for frustrated customers. `None` disables frustration routing.
    #[serde(default = "default_frustration_target")]
    pub frustration_target: Option<String>,
}

fn default_builtin_rules() -> bool {
    true
}

fn default_frustration_target() -> Option<String> {
    Some("supervisor".to_string())
}

/// A keyword rule: if `pattern` occurs in the message, escalate to `target`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EscalationRuleConfig {
    pub pattern: String,
    pub target: String,
}
