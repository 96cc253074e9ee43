// SPDX-FileCopyrightText: 2026 Missive Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter trait for persistence backends (SQLite, etc.).

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::MissiveError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    BackoffSchedule, Channel, FailureOutcome, Instance, InstanceStatus, InstanceUpdate,
    MessageStatus, NewMessage, QueueHealth, QueuedMessage, RateLimitHit,
};

/// Adapter for the durable store behind the queue, the instance registry and
/// the rate limit counters.
///
/// Every state transition is a single atomic operation at the store level.
/// Operations that depend on the current time take it as `now` so callers
/// control the clock.
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Initializes the storage backend (migrations, connection, etc.).
    async fn initialize(&self) -> Result<(), MissiveError>;

    /// Closes the storage backend, flushing pending writes.
    async fn close(&self) -> Result<(), MissiveError>;

    // --- Queue ---

    /// Inserts a `pending` row eligible immediately. Returns the new id.
    async fn enqueue_message(
        &self,
        message: &NewMessage,
        max_attempts: u32,
        now: DateTime<Utc>,
    ) -> Result<i64, MissiveError>;

    /// Atomically moves the best eligible `pending` row to `in_flight`.
    async fn claim_next_message(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Option<QueuedMessage>, MissiveError>;

    /// Same as [`claim_next_message`](Self::claim_next_message), considering
    /// only rows on `channel`.
    async fn claim_next_message_on(
        &self,
        channel: Channel,
        now: DateTime<Utc>,
    ) -> Result<Option<QueuedMessage>, MissiveError>;

    /// Marks an `in_flight` message as terminally sent.
    async fn mark_message_sent(&self, id: i64, now: DateTime<Utc>) -> Result<(), MissiveError>;

    /// Records a failed attempt on an `in_flight` message and reschedules it
    /// or fails it terminally.
    async fn mark_message_failed(
        &self,
        id: i64,
        error: &str,
        backoff: &BackoffSchedule,
        now: DateTime<Utc>,
    ) -> Result<FailureOutcome, MissiveError>;

    /// Returns an `in_flight` message to `pending` leaving `attempts` and
    /// `next_attempt_at` untouched.
    async fn release_message(&self, id: i64) -> Result<(), MissiveError>;

    /// Returns `in_flight` rows claimed before `claimed_before` to `pending`.
    async fn recover_stale_messages(
        &self,
        claimed_before: DateTime<Utc>,
    ) -> Result<u64, MissiveError>;

    /// Deletes terminal rows created before `created_before`.
    async fn purge_messages(&self, created_before: DateTime<Utc>) -> Result<u64, MissiveError>;

    async fn get_message(&self, id: i64) -> Result<Option<QueuedMessage>, MissiveError>;

    /// Newest first, optionally filtered by status.
    async fn list_messages(
        &self,
        status: Option<MessageStatus>,
        limit: u32,
    ) -> Result<Vec<QueuedMessage>, MissiveError>;

    async fn queue_health(&self, now: DateTime<Utc>) -> Result<QueueHealth, MissiveError>;

    // --- Instances ---

    async fn create_instance(
        &self,
        name: &str,
        description: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Instance, MissiveError>;

    async fn get_instance(&self, id: i64) -> Result<Option<Instance>, MissiveError>;

    async fn list_instances(&self) -> Result<Vec<Instance>, MissiveError>;

    async fn update_instance(
        &self,
        id: i64,
        update: &InstanceUpdate,
    ) -> Result<Instance, MissiveError>;

    async fn remove_instance(&self, id: i64) -> Result<(), MissiveError>;

    /// Least-used active instance in `status`, earliest `last_sent_at` first.
    async fn select_instance(
        &self,
        status: InstanceStatus,
    ) -> Result<Option<Instance>, MissiveError>;

    async fn record_instance_success(
        &self,
        id: i64,
        now: DateTime<Utc>,
    ) -> Result<(), MissiveError>;

    async fn record_instance_failure(&self, id: i64, error: &str) -> Result<(), MissiveError>;

    /// Writes the outcome of a connectivity check. `error` is stored in
    /// `last_error` when present.
    async fn set_instance_status(
        &self,
        id: i64,
        status: InstanceStatus,
        error: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), MissiveError>;

    /// Zeroes `messages_sent_today` everywhere. Returns rows touched.
    async fn reset_daily_counters(&self) -> Result<u64, MissiveError>;

    // --- Rate limits ---

    /// Counts one request against `key` in a single upsert, opening a new
    /// window when the current one started at or before `window_cutoff`.
    async fn hit_rate_limit(
        &self,
        key: &str,
        window_cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<RateLimitHit, MissiveError>;

    /// Deletes counters whose window started before `window_start_before`.
    async fn prune_rate_limits(
        &self,
        window_start_before: DateTime<Utc>,
    ) -> Result<u64, MissiveError>;
}
