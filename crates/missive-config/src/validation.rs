// SPDX-FileCopyrightText: 2026 Missive Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as ordered pacing bounds, positive intervals and parseable addresses.

use crate::diagnostic::ConfigError;
use crate::model::MissiveConfig;

const MINUTES_PER_DAY: i32 = 24 * 60;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &MissiveConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::invalid(
            "storage.database_path",
            "must not be empty",
        ));
    }

    if config.queue.max_attempts < 1 {
        errors.push(ConfigError::invalid(
            "queue.max_attempts",
            "must be at least 1",
        ));
    }

    if config.queue.backoff_secs.is_empty() {
        errors.push(ConfigError::invalid(
            "queue.backoff_secs",
            "must contain at least one delay",
        ));
    }

    let worker = &config.worker;
    if worker.pacing_min_secs > worker.pacing_max_secs {
        errors.push(ConfigError::invalid(
            "worker.pacing_min_secs",
            format!(
                "must not exceed worker.pacing_max_secs ({} > {})",
                worker.pacing_min_secs, worker.pacing_max_secs
            ),
        ));
    }

    let intervals = [
        ("worker.tick_interval_ms", worker.tick_interval_ms),
        (
            "worker.health_check_interval_secs",
            worker.health_check_interval_secs,
        ),
        ("worker.cleanup_interval_secs", worker.cleanup_interval_secs),
        (
            "worker.stale_sweep_interval_secs",
            worker.stale_sweep_interval_secs,
        ),
        ("worker.send_timeout_secs", worker.send_timeout_secs),
        ("queue.stale_in_flight_secs", config.queue.stale_in_flight_secs),
    ];
    for (key, value) in intervals {
        if value == 0 {
            errors.push(ConfigError::invalid(key, "must be greater than zero"));
        }
    }

    if worker.daily_reset_utc_offset_minutes.abs() >= MINUTES_PER_DAY {
        errors.push(ConfigError::invalid(
            "worker.daily_reset_utc_offset_minutes",
            format!(
                "must be within (-{MINUTES_PER_DAY}, {MINUTES_PER_DAY}), got {}",
                worker.daily_reset_utc_offset_minutes
            ),
        ));
    }

    let p = config.rate_limit.cleanup_probability;
    if !(0.0..=1.0).contains(&p) {
        errors.push(ConfigError::invalid(
            "rate_limit.cleanup_probability",
            format!("must be between 0 and 1, got {p}"),
        ));
    }

    if config.email.smtp_host.is_some() {
        let missing = config
            .email
            .from_address
            .as_deref()
            .map(|a| a.trim().is_empty())
            .unwrap_or(true);
        if missing {
            errors.push(ConfigError::invalid(
                "email.from_address",
                "is required when email.smtp_host is set",
            ));
        }
    }

    if let Some(url) = &config.whatsapp.base_url {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            errors.push(ConfigError::invalid(
                "whatsapp.base_url",
                format!("`{url}` must start with http:// or https://"),
            ));
        }
    }

    if config
        .prometheus
        .listen_address
        .parse::<std::net::SocketAddr>()
        .is_err()
    {
        errors.push(ConfigError::invalid(
            "prometheus.listen_address",
            format!(
                "`{}` is not a valid socket address",
                config.prometheus.listen_address
            ),
        ));
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

    fn keys(errors: &[ConfigError]) -> Vec<&str> {
        errors.iter().filter_map(|e| e.key()).collect()
    }

    #[test]
    fn default_config_validates() {
        let config = MissiveConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn empty_database_path_fails_validation() {
        let mut config = MissiveConfig::default();
        config.storage.database_path = "  ".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(keys(&errors), vec!["storage.database_path"]);
    }

    #[test]
    fn inverted_pacing_bounds_fail_validation() {
        let mut config = MissiveConfig::default();
        config.worker.pacing_min_secs = 40;
        config.worker.pacing_max_secs = 30;
        let errors = validate_config(&config).unwrap_err();
        assert!(keys(&errors).contains(&"worker.pacing_min_secs"));
    }

    #[test]
    fn zero_pacing_is_allowed() {
        let mut config = MissiveConfig::default();
        config.worker.pacing_min_secs = 0;
        config.worker.pacing_max_secs = 0;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn all_errors_are_collected() {
        let mut config = MissiveConfig::default();
        config.queue.max_attempts = 0;
        config.queue.backoff_secs.clear();
        config.worker.tick_interval_ms = 0;
        config.rate_limit.cleanup_probability = 1.5;
        config.worker.daily_reset_utc_offset_minutes = -1440;
        config.prometheus.listen_address = "localhost".to_string();
        let errors = validate_config(&config).unwrap_err();
        let keys = keys(&errors);
        assert_eq!(errors.len(), 6, "got {keys:?}");
        assert!(keys.contains(&"queue.max_attempts"));
        assert!(keys.contains(&"queue.backoff_secs"));
        assert!(keys.contains(&"worker.tick_interval_ms"));
        assert!(keys.contains(&"rate_limit.cleanup_probability"));
        assert!(keys.contains(&"worker.daily_reset_utc_offset_minutes"));
        assert!(keys.contains(&"prometheus.listen_address"));
    }

    #[test]
    fn smtp_host_requires_from_address() {
        let mut config = MissiveConfig::default();
        config.email.smtp_host = Some("smtp.example.org".to_string());
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(keys(&errors), vec!["email.from_address"]);

        config.email.from_address = Some("noreply@example.org".to_string());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn gateway_url_needs_scheme() {
        let mut config = MissiveConfig::default();
        config.whatsapp.base_url = Some("gateway.local:8080".to_string());
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(keys(&errors), vec!["whatsapp.base_url"]);
    }
}
