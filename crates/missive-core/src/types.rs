// SPDX-FileCopyrightText: 2026 Missive Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by the queue, router, rate limiter and channel adapters.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::MissiveError;

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the type of adapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Chat,
    Email,
    Storage,
    Observability,
}

/// Delivery channel of a queued message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Chat-style message routed through a provider instance.
    Chat,
    /// Email delivered through the SMTP transport.
    Email,
}

impl Channel {
    /// Column value stored in the database.
    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Chat => "chat",
            Channel::Email => "email",
        }
    }
}

/// Lifecycle state of a queued message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Pending,
    InFlight,
    Sent,
    Failed,
}

impl MessageStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageStatus::Pending => "pending",
            MessageStatus::InFlight => "in_flight",
            MessageStatus::Sent => "sent",
            MessageStatus::Failed => "failed",
        }
    }

    /// `sent` and `failed` are never reclaimed.
    pub fn is_terminal(self) -> bool {
        matches!(self, MessageStatus::Sent | MessageStatus::Failed)
    }
}

/// Last observed connectivity of a provider instance.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    /// Never checked since creation.
    Unknown,
    /// Session is open and ready to send.
    Open,
    /// Last health check failed or reported a non-open state.
    Error,
}

impl InstanceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            InstanceStatus::Unknown => "unknown",
            InstanceStatus::Open => "open",
            InstanceStatus::Error => "error",
        }
    }
}

/// A durable row in the outbound queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedMessage {
    pub id: i64,
    pub channel: Channel,
    pub destination: String,
    pub subject: Option<String>,
    pub body: String,
    pub priority: i64,
    pub status: MessageStatus,
    pub attempts: u32,
    pub max_attempts: u32,
    pub next_attempt_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// A message submitted by a producer, before it is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub channel: Channel,
    pub destination: String,
    pub subject: Option<String>,
    pub body: String,
    pub priority: i64,
    /// Overrides the configured retry budget for this message only.
    pub max_attempts: Option<u32>,
}

impl NewMessage {
    pub fn chat(destination: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            channel: Channel::Chat,
            destination: destination.into(),
            subject: None,
            body: body.into(),
            priority: 0,
            max_attempts: None,
        }
    }

    pub fn email(
        destination: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            channel: Channel::Email,
            destination: destination.into(),
            subject: Some(subject.into()),
            body: body.into(),
            priority: 0,
            max_attempts: None,
        }
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }
}

/// Result of recording a failed delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Back to `pending`, eligible again at `next_attempt_at`.
    Retrying {
        attempts: u32,
        next_attempt_at: DateTime<Utc>,
    },
    /// Retry budget spent; the message is now terminally `failed`.
    Exhausted { attempts: u32 },
}

impl FailureOutcome {
    pub fn is_terminal(&self) -> bool {
        matches!(self, FailureOutcome::Exhausted { .. })
    }
}

/// Ordered list of retry delays. Attempts past the end reuse the last delay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffSchedule {
    delays: Vec<Duration>,
}

impl BackoffSchedule {
    /// Builds a schedule; an empty list is rejected.
    pub fn new(delays: Vec<Duration>) -> Result<Self, MissiveError> {
        if delays.is_empty() {
            return Err(MissiveError::Config(
                "backoff schedule must contain at least one delay".into(),
            ));
        }
        Ok(Self { delays })
    }

    pub fn from_secs(secs: &[u64]) -> Result<Self, MissiveError> {
        Self::new(secs.iter().map(|s| Duration::from_secs(*s)).collect())
    }

    /// Delay applied after the `attempts`-th failure (1-based).
    pub fn delay_for(&self, attempts: u32) -> Duration {
        let idx = (attempts.max(1) as usize - 1).min(self.delays.len() - 1);
        self.delays[idx]
    }

    pub fn delays(&self) -> &[Duration] {
        &self.delays
    }
}

/// A named provider endpoint through which chat messages are sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub active: bool,
    pub status: InstanceStatus,
    pub messages_sent_total: i64,
    pub messages_sent_today: i64,
    pub last_sent_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Administrative changes to an instance. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceUpdate {
    pub description: Option<String>,
    pub active: Option<bool>,
}

impl InstanceUpdate {
    pub fn is_empty(&self) -> bool {
        self.description.is_none() && self.active.is_none()
    }
}

/// Connectivity reported by the provider gateway for one instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Open,
    /// Any other state the gateway reported (`connecting`, `close`, ...).
    NotOpen(String),
}

impl ConnectionState {
    /// Classifies a raw gateway state string.
    pub fn from_state(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("open") {
            ConnectionState::Open
        } else {
            ConnectionState::NotOpen(raw.to_string())
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }
}

/// Answer returned by a rate limit check. The caller enforces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

/// Raw counter state after one rate limit hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitHit {
    pub count: u32,
    pub window_start: DateTime<Utc>,
}

/// Aggregate queue counts for observability.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueHealth {
    pub pending: u64,
    pub in_flight: u64,
    pub sent: u64,
    pub failed: u64,
    /// Age in seconds of the oldest pending message that is already eligible.
    pub oldest_pending_age_secs: Option<u64>,
}

impl QueueHealth {
    pub fn total(&self) -> u64 {
        self.pending + self.in_flight + self.sent + self.failed
    }
}

/// Converts a std duration into a chrono one for timestamp arithmetic.
pub fn chrono_duration(d: Duration) -> Result<chrono::Duration, MissiveError> {
    chrono::Duration::from_std(d)
        .map_err(|e| MissiveError::Internal(format!("duration out of range: {e}")))
}
