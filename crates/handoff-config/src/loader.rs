// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./handoff.toml` > `~/.config/handoff/handoff.toml` > `/etc/handoff/handoff.toml`
//! with environment variable overrides via `HANDOFF_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::HandoffConfig;

/// System-wide configuration file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/handoff/handoff.toml";

/// Configuration file looked up in the working directory.
pub const LOCAL_CONFIG_PATH: &str = "handoff.toml";

/// Path of the per-user configuration file, if a config dir exists.
pub fn user_config_path() -> Option<std::path::PathBuf> {
    dirs::config_dir().map(|d| d.join("handoff/handoff.toml"))
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/handoff/handoff.toml` (system-wide)
/// 3. `~/.config/handoff/handoff.toml` (user XDG config)
/// 4. `./handoff.toml` (local directory)
/// 5. `HANDOFF_*` environment variables
pub fn load_config() -> Result<HandoffConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<HandoffConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(HandoffConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<HandoffConfig, figment::Error> {
    tracing::debug!(path = %path.display(), "loading configuration file");
    Figment::new()
        .merge(Serialized::defaults(HandoffConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for hierarchy loading, before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(HandoffConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG_PATH))
        .merge(env_provider())
}

/// Create the environment variable provider using explicit `map()` for section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` because key names contain
/// underscores: `HANDOFF_COORDINATOR_IDLE_TIMEOUT_SECS` must map to
/// `coordinator.idle_timeout_secs`, not `coordinator.idle.timeout.secs`.
fn env_provider() -> Env {
    Env::prefixed("HANDOFF_").map(|key| map_env_key(key.as_str()).into())
}

/// Maps a lowercased, prefix-stripped env var name onto a dotted config path.
pub(crate) fn map_env_key(key: &str) -> String {
    const SECTIONS: [&str; 4] = ["coordinator", "generation", "persistence", "prometheus"];
    for section in SECTIONS {
        if let Some(rest) = key.strip_prefix(section).and_then(|r| r.strip_prefix('_')) {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_map_to_sections() {
        assert_eq!(
            map_env_key("coordinator_idle_timeout_secs"),
            "coordinator.idle_timeout_secs"
        );
        assert_eq!(map_env_key("persistence_backend"), "persistence.backend");
        assert_eq!(map_env_key("prometheus_enabled"), "prometheus.enabled");
        assert_eq!(map_env_key("unrelated"), "unrelated");
    }
}
