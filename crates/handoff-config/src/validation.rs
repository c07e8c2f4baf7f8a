// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks constraints serde cannot express: non-zero intervals, a usable
//! retry policy, and a consistent worker roster.

use std::collections::HashSet;

use crate::diagnostic::ConfigError;
use crate::model::{HandoffConfig, PersistenceBackend};

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns every problem found rather than stopping at the first one.
pub fn validate_config(config: &HandoffConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let coordinator = &config.coordinator;
    for (name, value) in [
        ("coordinator.reaper_interval_secs", coordinator.reaper_interval_secs),
        ("coordinator.idle_timeout_secs", coordinator.idle_timeout_secs),
        ("coordinator.metrics_interval_secs", coordinator.metrics_interval_secs),
    ] {
        if value == 0 {
            errors.push(ConfigError::validation(format!("{name} must be greater than 0")));
        }
    }

    if coordinator.history_window == 0 {
        errors.push(ConfigError::validation(
            "coordinator.history_window must be at least 1",
        ));
    }

    if coordinator.default_worker_type.trim().is_empty() {
        errors.push(ConfigError::validation(
            "coordinator.default_worker_type must not be empty",
        ));
    }

    if !matches!(
        coordinator.log_level.as_str(),
        "trace" | "debug" | "info" | "warn" | "error"
    ) {
        errors.push(ConfigError::validation(format!(
            "coordinator.log_level `{}` is not one of trace, debug, info, warn, error",
            coordinator.log_level
        )));
    }

    let generation = &config.generation;
    if generation.max_attempts < 1 {
        errors.push(ConfigError::validation(
            "generation.max_attempts must be at least 1",
        ));
    }
    if generation.attempt_timeout_secs == 0 {
        errors.push(ConfigError::validation(
            "generation.attempt_timeout_secs must be greater than 0",
        ));
    }
    if generation.max_backoff_ms < generation.initial_backoff_ms {
        errors.push(ConfigError::validation(format!(
            "generation.max_backoff_ms ({}) must not be below generation.initial_backoff_ms ({})",
            generation.max_backoff_ms, generation.initial_backoff_ms
        )));
    }
    if generation.fallback_message.trim().is_empty() {
        errors.push(ConfigError::validation(
            "generation.fallback_message must not be empty",
        ));
    }

    if config.persistence.ttl_secs == 0 {
        errors.push(ConfigError::validation(
            "persistence.ttl_secs must be greater than 0",
        ));
    }
    if config.persistence.backend == PersistenceBackend::Sqlite
        && config.persistence.database_path.trim().is_empty()
    {
        errors.push(ConfigError::validation(
            "persistence.database_path must not be empty when backend = \"sqlite\"",
        ));
    }

    let mut seen_ids = HashSet::new();
    for (i, worker) in config.workers.iter().enumerate() {
        if worker.id.trim().is_empty() {
            errors.push(ConfigError::validation(format!(
                "workers[{i}].id must not be empty"
            )));
        } else if !seen_ids.insert(worker.id.as_str()) {
            errors.push(ConfigError::validation(format!(
                "duplicate worker id `{}` in [[workers]] array",
                worker.id
            )));
        }
        if worker.worker_type.trim().is_empty() {
            errors.push(ConfigError::validation(format!(
                "workers[{i}].worker_type must not be empty"
            )));
        }
        for (j, rule) in worker.escalation_rules.iter().enumerate() {
            if rule.pattern.trim().is_empty() || rule.target.trim().is_empty() {
                errors.push(ConfigError::validation(format!(
                    "workers[{i}].escalation_rules[{j}] needs a non-empty pattern and target"
                )));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EscalationRuleConfig, WorkerConfig};

    fn worker(id: &str, worker_type: &str) -> WorkerConfig {
        WorkerConfig {
            id: id.to_string(),
            worker_type: worker_type.to_string(),
            reply_template: None,
            escalation_rules: Vec::new(),
            builtin_rules: true,
            frustration_target: None,
        }
    }

    fn messages(errors: &[ConfigError]) -> Vec<String> {
        errors.iter().map(|e| e.to_string()).collect()
    }

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&HandoffConfig::default()).is_ok());
    }

    #[test]
    fn zero_intervals_are_all_reported() {
        let mut config = HandoffConfig::default();
        config.coordinator.reaper_interval_secs = 0;
        config.coordinator.metrics_interval_secs = 0;
        let errors = validate_config(&config).unwrap_err();
        let msgs = messages(&errors);
        assert_eq!(errors.len(), 2);
        assert!(msgs.iter().any(|m| m.contains("reaper_interval_secs")));
        assert!(msgs.iter().any(|m| m.contains("metrics_interval_secs")));
    }

    #[test]
    fn zero_attempts_fail() {
        let mut config = HandoffConfig::default();
        config.generation.max_attempts = 0;
        let msgs = messages(&validate_config(&config).unwrap_err());
        assert!(msgs.iter().any(|m| m.contains("max_attempts")));
    }

    #[test]
    fn duplicate_worker_ids_fail() {
        let mut config = HandoffConfig::default();
        config.workers = vec![
            worker("cs-1", "customer_service"),
            worker("cs-1", "technical_support"),
        ];
        let msgs = messages(&validate_config(&config).unwrap_err());
        assert!(msgs.iter().any(|m| m.contains("duplicate worker id `cs-1`")));
    }

    #[test]
    fn empty_worker_type_and_rule_fail() {
        let mut config = HandoffConfig::default();
        let mut w = worker("cs-1", " ");
        w.escalation_rules.push(EscalationRuleConfig {
            pattern: "refund".into(),
            target: "".into(),
        });
        config.workers = vec![w];
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn unknown_log_level_fails() {
        let mut config = HandoffConfig::default();
        config.coordinator.log_level = "verbose".into();
        assert!(validate_config(&config).is_err());
    }
}
