// SPDX-FileCopyrightText: 2026 Missive Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Queue store: the durable outbound message queue.
//!
//! Wraps the storage backend with producer-side validation, the configured
//! retry budget and backoff schedule, and clock-driven timestamps.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use missive_config::model::QueueConfig;
use missive_core::types::chrono_duration;
use missive_core::{
    BackoffSchedule, Channel, Clock, FailureOutcome, MessageStatus, MissiveError, NewMessage,
    QueueHealth, QueuedMessage, StorageAdapter,
};

pub struct QueueStore {
    storage: Arc<dyn StorageAdapter>,
    clock: Arc<dyn Clock>,
    max_attempts: u32,
    backoff: BackoffSchedule,
    retention_days: u32,
    stale_after: Duration,
}

impl QueueStore {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        clock: Arc<dyn Clock>,
        config: &QueueConfig,
    ) -> Result<Self, MissiveError> {
        if config.max_attempts == 0 {
            return Err(MissiveError::Config("queue.max_attempts must be at least 1".into()));
        }
        Ok(Self {
            storage,
            clock,
            max_attempts: config.max_attempts,
            backoff: BackoffSchedule::from_secs(&config.backoff_secs)?,
            retention_days: config.retention_days,
            stale_after: config.stale_in_flight(),
        })
    }

    pub fn backoff(&self) -> &BackoffSchedule {
        &self.backoff
    }

    pub fn retention_days(&self) -> u32 {
        self.retention_days
    }

    /// Persist a new `pending` message eligible immediately. Returns its id.
    ///
    /// Empty destinations and bodies are rejected. Email messages always carry
    /// a subject; a missing one is stored as empty.
    pub async fn enqueue(&self, mut message: NewMessage) -> Result<i64, MissiveError> {
        message.destination = message.destination.trim().to_string();
        if message.destination.is_empty() {
            return Err(MissiveError::Config("message destination must not be empty".into()));
        }
        if message.body.trim().is_empty() {
            return Err(MissiveError::Config("message body must not be empty".into()));
        }
        if message.channel == Channel::Email && message.subject.is_none() {
            message.subject = Some(String::new());
        }
        let max_attempts = match message.max_attempts {
            Some(0) => {
                return Err(MissiveError::Config(
                    "message max_attempts must be at least 1".into(),
                ));
            }
            Some(n) => n,
            None => self.max_attempts,
        };

        let id = self
            .storage
            .enqueue_message(&message, max_attempts, self.clock.now())
            .await?;
        debug!(
            message_id = id,
            channel = message.channel.as_str(),
            priority = message.priority,
            max_attempts,
            "message enqueued"
        );
        Ok(id)
    }

    pub async fn claim_next(&self) -> Result<Option<QueuedMessage>, MissiveError> {
        self.storage.claim_next_message(self.clock.now()).await
    }

    pub async fn claim_next_on(
        &self,
        channel: Channel,
    ) -> Result<Option<QueuedMessage>, MissiveError> {
        self.storage.claim_next_message_on(channel, self.clock.now()).await
    }

    pub async fn mark_sent(&self, id: i64) -> Result<(), MissiveError> {
        self.storage.mark_message_sent(id, self.clock.now()).await
    }

    /// Record a failed attempt against the retry budget.
    pub async fn mark_failed(&self, id: i64, error: &str) -> Result<FailureOutcome, MissiveError> {
        let outcome = self
            .storage
            .mark_message_failed(id, error, &self.backoff, self.clock.now())
            .await?;
        match outcome {
            FailureOutcome::Retrying {
                attempts,
                next_attempt_at,
            } => debug!(
                message_id = id,
                attempts,
                %next_attempt_at,
                "message rescheduled"
            ),
            FailureOutcome::Exhausted { attempts } => warn!(
                message_id = id,
                attempts,
                error,
                "message failed permanently"
            ),
        }
        Ok(outcome)
    }

    /// Return a claimed message to `pending` without spending an attempt.
    pub async fn release(&self, id: i64) -> Result<(), MissiveError> {
        self.storage.release_message(id).await
    }

    /// Heal `in_flight` rows whose claim is older than the stale timeout.
    pub async fn recover_stale(&self) -> Result<u64, MissiveError> {
        let cutoff = self.clock.now() - chrono_duration(self.stale_after)?;
        let healed = self.storage.recover_stale_messages(cutoff).await?;
        if healed > 0 {
            warn!(count = healed, "recovered stale in-flight messages");
        }
        Ok(healed)
    }

    /// Delete terminal messages created more than `retention_days` ago.
    pub async fn purge_old(&self, retention_days: u32) -> Result<u64, MissiveError> {
        let cutoff = self.clock.now() - chrono::Duration::days(i64::from(retention_days));
        let purged = self.storage.purge_messages(cutoff).await?;
        if purged > 0 {
            info!(count = purged, retention_days, "purged old messages");
        }
        Ok(purged)
    }

    pub async fn get(&self, id: i64) -> Result<QueuedMessage, MissiveError> {
        self.storage
            .get_message(id)
            .await?
            .ok_or_else(|| MissiveError::NotFound {
                entity: "message",
                id: id.to_string(),
            })
    }

    pub async fn list(
        &self,
        status: Option<MessageStatus>,
        limit: u32,
    ) -> Result<Vec<QueuedMessage>, MissiveError> {
        self.storage.list_messages(status, limit).await
    }

    pub async fn health(&self) -> Result<QueueHealth, MissiveError> {
        self.storage.queue_health(self.clock.now()).await
    }
}
