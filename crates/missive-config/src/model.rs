// SPDX-FileCopyrightText: 2026 Missive Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for Missive.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level Missive configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MissiveConfig {
    /// Process-level settings.
    #[serde(default)]
    pub daemon: DaemonConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Retry budget, backoff and retention of queued messages.
    #[serde(default)]
    pub queue: QueueConfig,

    /// Dispatch worker timers and pacing.
    #[serde(default)]
    pub worker: WorkerConfig,

    /// Rate limiter housekeeping.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Chat provider gateway settings.
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,

    /// SMTP settings.
    #[serde(default)]
    pub email: EmailConfig,

    /// Prometheus exporter settings.
    #[serde(default)]
    pub prometheus: PrometheusConfig,
}

/// Process-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DaemonConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for concurrent reads.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,

    /// How long a writer waits on a locked database before giving up.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("missive").join("missive.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("missive.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

/// Queue retry and retention configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QueueConfig {
    /// Delivery attempts before a message is failed terminally.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay in seconds after the 1st, 2nd, ... failure. The last value repeats.
    #[serde(default = "default_backoff_secs")]
    pub backoff_secs: Vec<u64>,

    /// Sent and failed rows older than this are purged.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    /// In-flight rows claimed longer ago than this are returned to pending.
    #[serde(default = "default_stale_in_flight_secs")]
    pub stale_in_flight_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_secs: default_backoff_secs(),
            retention_days: default_retention_days(),
            stale_in_flight_secs: default_stale_in_flight_secs(),
        }
    }
}

impl QueueConfig {
    pub fn stale_in_flight(&self) -> Duration {
        Duration::from_secs(self.stale_in_flight_secs)
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_secs() -> Vec<u64> {
    vec![30, 120, 300]
}

fn default_retention_days() -> u32 {
    7
}

fn default_stale_in_flight_secs() -> u64 {
    600
}

/// Dispatch worker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerConfig {
    /// Interval between ticks of the dispatch loop.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Lower bound of the randomized delay after each dispatch.
    #[serde(default = "default_pacing_min_secs")]
    pub pacing_min_secs: u64,

    /// Upper bound of the randomized delay after each dispatch.
    #[serde(default = "default_pacing_max_secs")]
    pub pacing_max_secs: u64,

    #[serde(default = "default_health_check_interval_secs")]
    pub health_check_interval_secs: u64,

    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,

    #[serde(default = "default_stale_sweep_interval_secs")]
    pub stale_sweep_interval_secs: u64,

    /// Offset from UTC of the calendar used for the daily counter reset.
    #[serde(default)]
    pub daily_reset_utc_offset_minutes: i32,

    /// Upper bound on a single sender call.
    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            pacing_min_secs: default_pacing_min_secs(),
            pacing_max_secs: default_pacing_max_secs(),
            health_check_interval_secs: default_health_check_interval_secs(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
            stale_sweep_interval_secs: default_stale_sweep_interval_secs(),
            daily_reset_utc_offset_minutes: 0,
            send_timeout_secs: default_send_timeout_secs(),
        }
    }
}

impl WorkerConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn pacing_min(&self) -> Duration {
        Duration::from_secs(self.pacing_min_secs)
    }

    pub fn pacing_max(&self) -> Duration {
        Duration::from_secs(self.pacing_max_secs)
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    pub fn stale_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.stale_sweep_interval_secs)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs)
    }
}

fn default_tick_interval_ms() -> u64 {
    1000
}

fn default_pacing_min_secs() -> u64 {
    10
}

fn default_pacing_max_secs() -> u64 {
    30
}

fn default_health_check_interval_secs() -> u64 {
    300
}

fn default_cleanup_interval_secs() -> u64 {
    6 * 60 * 60
}

fn default_stale_sweep_interval_secs() -> u64 {
    60
}

fn default_send_timeout_secs() -> u64 {
    30
}

/// Rate limiter housekeeping configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitConfig {
    /// Chance per check that expired counters are pruned.
    #[serde(default = "default_cleanup_probability")]
    pub cleanup_probability: f64,

    /// Counters whose window started longer ago than this are pruned.
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            cleanup_probability: default_cleanup_probability(),
            retention_secs: default_retention_secs(),
        }
    }
}

impl RateLimitConfig {
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }
}

fn default_cleanup_probability() -> f64 {
    0.01
}

fn default_retention_secs() -> u64 {
    3600
}

/// Chat provider gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WhatsAppConfig {
    /// Gateway base URL. `None` disables the chat channel.
    #[serde(default)]
    pub base_url: Option<String>,

    /// Value sent in the `apikey` header.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Prefixed to national-format destinations (e.g. "55").
    #[serde(default)]
    pub default_country_code: Option<String>,

    /// HTTP request timeout in seconds.
    #[serde(default = "default_gateway_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            default_country_code: None,
            timeout_secs: default_gateway_timeout_secs(),
        }
    }
}

fn default_gateway_timeout_secs() -> u64 {
    30
}

/// SMTP configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EmailConfig {
    /// SMTP relay host. `None` disables the email channel.
    #[serde(default)]
    pub smtp_host: Option<String>,

    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Sender mailbox, e.g. `"Clinic <noreply@example.org>"`.
    #[serde(default)]
    pub from_address: Option<String>,

    /// Upgrade the connection with STARTTLS. Disable only for local relays.
    #[serde(default = "default_starttls")]
    pub starttls: bool,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: None,
            smtp_port: default_smtp_port(),
            username: None,
            password: None,
            from_address: None,
            starttls: default_starttls(),
        }
    }
}

fn default_smtp_port() -> u16 {
    587
}

fn default_starttls() -> bool {
    true
}

/// Prometheus exporter configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PrometheusConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Address the scrape endpoint listens on.
    #[serde(default = "default_listen_address")]
    pub listen_address: String,
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_address: default_listen_address(),
        }
    }
}

fn default_listen_address() -> String {
    "127.0.0.1:9464".to_string()
}
