// SPDX-FileCopyrightText: 2026 Missive Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Missive configuration system.

use figment::Jail;
use missive_config::diagnostic::ConfigError;
use missive_config::model::MissiveConfig;
use missive_config::{load_and_validate_path, load_and_validate_str, load_config, load_config_from_str};
use serial_test::serial;

/// Valid TOML with all sections deserializes successfully.
#[test]
fn valid_toml_deserializes_into_missive_config() {
    let toml = r#"
[daemon]
log_level = "debug"

[storage]
database_path = "/tmp/missive-test.db"
wal_mode = false
busy_timeout_ms = 250

[queue]
max_attempts = 5
backoff_secs = [10, 20]
retention_days = 3
stale_in_flight_secs = 120

[worker]
tick_interval_ms = 500
pacing_min_secs = 1
pacing_max_secs = 2
daily_reset_utc_offset_minutes = -180

[rate_limit]
cleanup_probability = 0.5
retention_secs = 7200

[whatsapp]
base_url = "http://gateway.local:8080"
api_key = "secret"
default_country_code = "55"

[email]
smtp_host = "smtp.example.org"
smtp_port = 2525
from_address = "Clinic <noreply@example.org>"
starttls = false

[prometheus]
enabled = true
listen_address = "0.0.0.0:9100"
"#;

    let config = load_and_validate_str(toml).expect("valid TOML should validate");
    assert_eq!(config.daemon.log_level, "debug");
    assert_eq!(config.storage.database_path, "/tmp/missive-test.db");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.storage.busy_timeout_ms, 250);
    assert_eq!(config.queue.max_attempts, 5);
    assert_eq!(config.queue.backoff_secs, vec![10, 20]);
    assert_eq!(config.queue.retention_days, 3);
    assert_eq!(config.worker.tick_interval_ms, 500);
    assert_eq!(config.worker.daily_reset_utc_offset_minutes, -180);
    assert_eq!(config.rate_limit.cleanup_probability, 0.5);
    assert_eq!(
        config.whatsapp.base_url.as_deref(),
        Some("http://gateway.local:8080")
    );
    assert_eq!(config.whatsapp.default_country_code.as_deref(), Some("55"));
    assert_eq!(config.email.smtp_port, 2525);
    assert!(!config.email.starttls);
    assert!(config.prometheus.enabled);
}

/// Missing sections fall back to compiled defaults.
#[test]
fn missing_optional_sections_use_defaults() {
    let config = load_config_from_str("").expect("empty TOML should deserialize");
    assert_eq!(config.queue.max_attempts, 3);
    assert_eq!(config.queue.backoff_secs, vec![30, 120, 300]);
    assert_eq!(config.worker.pacing_min_secs, 10);
    assert_eq!(config.worker.pacing_max_secs, 30);
}

/// Unknown top-level section is rejected.
#[test]
fn deny_unknown_fields_at_top_level() {
    let err = load_config_from_str("[agent]\nname = \"x\"\n").expect_err("should reject");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("unknown field") || err_str.contains("agent"),
        "got: {err_str}"
    );
}

/// Unknown key in [queue] produces an UnknownKey diagnostic with a suggestion.
#[test]
fn diagnostic_error_includes_unknown_key() {
    let toml = r#"
[queue]
max_attempt = 4
"#;

    let errors = load_and_validate_str(toml).expect_err("should produce errors");
    let has_unknown_key = errors.iter().any(|e| {
        matches!(e, ConfigError::UnknownKey { key, suggestion, valid_keys, .. } if {
            key == "queue.max_attempt"
                && suggestion.as_deref() == Some("max_attempts")
                && valid_keys.contains("backoff_secs")
        })
    });
    assert!(
        has_unknown_key,
        "expected UnknownKey for 'max_attempt', got: {errors:?}"
    );
}

/// Invalid type (string where number expected) produces a clear message.
#[test]
fn diagnostic_invalid_type_message() {
    let toml = r#"
[worker]
tick_interval_ms = "fast"
"#;

    let errors = load_and_validate_str(toml).expect_err("should reject invalid type");
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::InvalidValue { key, env_var: None, .. } if key == "worker.tick_interval_ms")),
        "got: {errors:?}"
    );
}

/// An unknown section is reported with the known sections as candidates.
#[test]
fn unknown_section_suggests_sections() {
    let errors = load_and_validate_str("[queu]
max_attempts = 2
").expect_err("should reject");
    assert!(
        errors.iter().any(|e| matches!(
            e,
            ConfigError::UnknownKey { key, suggestion, .. }
                if key == "queu" && suggestion.as_deref() == Some("queue")
        )),
        "got: {errors:?}"
    );
}

/// Validation errors carry the dotted key and render with miette.
#[test]
fn validation_error_renders_with_miette() {
    use miette::{Diagnostic, GraphicalReportHandler};

    let errors = load_and_validate_str("[worker]\npacing_min_secs = 60\n")
        .expect_err("inverted pacing should fail");
    let error = errors
        .iter()
        .find(|e| e.key() == Some("worker.pacing_min_secs"))
        .expect("pacing error present");

    assert!(error.code().is_some());
    let help = error.help().expect("help text").to_string();
    assert!(help.contains("[worker]"), "got: {help}");

    let mut buf = String::new();
    GraphicalReportHandler::new()
        .render_report(&mut buf, error)
        .expect("should render");
    assert!(buf.contains("worker.pacing_min_secs"));
}

/// Env vars override file values using the section mapping.
#[test]
#[serial]
fn env_vars_override_files() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "missive.toml",
            r#"
[queue]
max_attempts = 4

[whatsapp]
base_url = "http://from-file"
"#,
        )?;
        jail.set_env("MISSIVE_QUEUE_MAX_ATTEMPTS", "7");
        jail.set_env("MISSIVE_WHATSAPP_API_KEY", "from-env");
        jail.set_env("MISSIVE_RATE_LIMIT_RETENTION_SECS", "60");

        let config: MissiveConfig = load_config()?;
        assert_eq!(config.queue.max_attempts, 7);
        assert_eq!(config.whatsapp.base_url.as_deref(), Some("http://from-file"));
        assert_eq!(config.whatsapp.api_key.as_deref(), Some("from-env"));
        assert_eq!(config.rate_limit.retention_secs, 60);
        Ok(())
    });
}

/// A misspelled env var is reported by its own name with the intended spelling.
#[test]
#[serial]
fn unknown_env_var_is_named() {
    Jail::expect_with(|jail| {
        jail.set_env("MISSIVE_QUEUE_MAX_ATTEMPT", "4");
        let errors = missive_config::load_and_validate().expect_err("typo should fail");
        assert!(
            errors.iter().any(|e| matches!(
                e,
                ConfigError::UnknownEnvVar { var, suggestion }
                    if var == "MISSIVE_QUEUE_MAX_ATTEMPT"
                        && suggestion.as_deref() == Some("MISSIVE_QUEUE_MAX_ATTEMPTS")
            )),
            "got: {errors:?}"
        );
        Ok(())
    });
}

/// A wrong-typed env value points back at the variable.
#[test]
#[serial]
fn invalid_env_value_names_variable() {
    Jail::expect_with(|jail| {
        jail.set_env("MISSIVE_WORKER_TICK_INTERVAL_MS", "fast");
        let errors = missive_config::load_and_validate().expect_err("bad value should fail");
        assert!(
            errors.iter().any(|e| matches!(
                e,
                ConfigError::InvalidValue { key, env_var: Some(var), .. }
                    if key == "worker.tick_interval_ms" && var == "MISSIVE_WORKER_TICK_INTERVAL_MS"
            )),
            "got: {errors:?}"
        );
        Ok(())
    });
}

/// An explicit path is loaded and validated, with errors pointing at the file.
#[test]
#[serial]
fn load_and_validate_explicit_path() {
    Jail::expect_with(|jail| {
        jail.create_file("custom.toml", "[email]\nsmtp_host = \"smtp.local\"\n")?;
        let errors = load_and_validate_path(std::path::Path::new("custom.toml"))
            .expect_err("from_address missing");
        assert!(errors.iter().any(|e| e.key() == Some("email.from_address")));

        jail.create_file(
            "good.toml",
            "[email]\nsmtp_host = \"smtp.local\"\nfrom_address = \"a@b.c\"\n",
        )?;
        let config = load_and_validate_path(std::path::Path::new("good.toml"))
            .expect("valid file");
        assert_eq!(config.email.smtp_host.as_deref(), Some("smtp.local"));
        Ok(())
    });
}
