// SPDX-FileCopyrightText: 2026 Missive Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./missive.toml` > `~/.config/missive/missive.toml` >
//! `/etc/missive/missive.toml` with environment variable overrides via `MISSIVE_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::MissiveConfig;

pub(crate) const SYSTEM_CONFIG_PATH: &str = "/etc/missive/missive.toml";
pub(crate) const LOCAL_CONFIG_PATH: &str = "missive.toml";
pub(crate) const ENV_PREFIX: &str = "MISSIVE_";

/// Top-level sections, longest first so `rate_limit_*` never matches a shorter name.
pub(crate) const SECTIONS: &[&str] = &[
    "rate_limit",
    "prometheus",
    "whatsapp",
    "storage",
    "daemon",
    "worker",
    "queue",
    "email",
];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/missive/missive.toml` (system-wide)
/// 3. `~/.config/missive/missive.toml` (user XDG config)
/// 4. `./missive.toml` (local directory)
/// 5. `MISSIVE_*` environment variables
pub fn load_config() -> Result<MissiveConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<MissiveConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(MissiveConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<MissiveConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(MissiveConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading.
///
/// Returns the Figment before extraction so callers can inspect metadata.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(MissiveConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG_PATH))
        .merge(env_provider())
}

pub(crate) fn user_config_path() -> Option<std::path::PathBuf> {
    dirs::config_dir().map(|d| d.join("missive/missive.toml"))
}

/// Create the environment variable provider with explicit section mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")`: keys contain underscores, so
/// `MISSIVE_WHATSAPP_API_KEY` must map to `whatsapp.api_key`, not `whatsapp.api.key`.
fn env_provider() -> Env {
    Env::prefixed(ENV_PREFIX).map(|key| map_env_key(&key.as_str().to_ascii_lowercase()).into())
}

/// Maps a lowercased, prefix-stripped env var name to a dotted config path.
/// Names with no known section prefix are returned unchanged and rejected later
/// as unknown top-level keys.
pub fn map_env_key(key: &str) -> String {
    for section in SECTIONS {
        if let Some(rest) = key.strip_prefix(section).and_then(|r| r.strip_prefix('_')) {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}

/// The env var that sets a dotted config path, e.g. `queue.max_attempts` is
/// `MISSIVE_QUEUE_MAX_ATTEMPTS`.
pub fn env_var_for(path: &str) -> String {
    format!("{ENV_PREFIX}{}", path.replace('.', "_").to_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_map_to_sections() {
        assert_eq!(map_env_key("whatsapp_api_key"), "whatsapp.api_key");
        assert_eq!(
            map_env_key("rate_limit_cleanup_probability"),
            "rate_limit.cleanup_probability"
        );
        assert_eq!(
            map_env_key("queue_stale_in_flight_secs"),
            "queue.stale_in_flight_secs"
        );
        assert_eq!(map_env_key("email_smtp_host"), "email.smtp_host");
        assert_eq!(map_env_key("unknownthing"), "unknownthing");
    }

    #[test]
    fn env_var_names_invert_the_mapping() {
        assert_eq!(env_var_for("queue.max_attempts"), "MISSIVE_QUEUE_MAX_ATTEMPTS");
        assert_eq!(
            env_var_for("rate_limit.retention_secs"),
            "MISSIVE_RATE_LIMIT_RETENTION_SECS"
        );
        let var = env_var_for("whatsapp.api_key");
        let stripped = var.strip_prefix(ENV_PREFIX).unwrap().to_ascii_lowercase();
        assert_eq!(map_env_key(&stripped), "whatsapp.api_key");
    }
}
