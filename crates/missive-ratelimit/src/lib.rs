// SPDX-FileCopyrightText: 2026 Missive Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fixed-window rate limiter.
//!
//! Counts requests per caller-chosen key (e.g. `otp:ip:<addr>`) with one
//! atomic upsert per check. The limiter only measures; callers decide what to
//! do with a denied decision. Old counters are pruned opportunistically on a
//! small fraction of checks instead of by a scheduled job.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use missive_config::model::RateLimitConfig;
use missive_core::types::chrono_duration;
use missive_core::{Clock, MissiveError, RateLimitDecision, StorageAdapter};

/// Rate limiter over the shared storage backend.
pub struct RateLimiter {
    storage: Arc<dyn StorageAdapter>,
    clock: Arc<dyn Clock>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        clock: Arc<dyn Clock>,
        config: RateLimitConfig,
    ) -> Self {
        Self {
            storage,
            clock,
            config,
        }
    }

    /// Count one request against `key` and report whether it is within
    /// `max_attempts` for the current `window`.
    ///
    /// A request arriving once `window` has elapsed since the counter's window
    /// started opens a new window with a count of 1.
    pub async fn check(
        &self,
        key: &str,
        max_attempts: u32,
        window: Duration,
    ) -> Result<RateLimitDecision, MissiveError> {
        if key.is_empty() {
            return Err(MissiveError::Config("rate limit key must not be empty".into()));
        }
        if window.is_zero() {
            return Err(MissiveError::Config(
                "rate limit window must be greater than zero".into(),
            ));
        }

        let now = self.clock.now();
        let window = chrono_duration(window)?;
        let hit = self.storage.hit_rate_limit(key, now - window, now).await?;

        let decision = RateLimitDecision {
            allowed: hit.count <= max_attempts,
            remaining: max_attempts.saturating_sub(hit.count),
            reset_at: hit.window_start + window,
        };
        missive_prometheus::record_rate_limit_check(decision.allowed);
        debug!(
            key,
            count = hit.count,
            allowed = decision.allowed,
            remaining = decision.remaining,
            "rate limit checked"
        );

        let sweep = rand::thread_rng().gen_bool(self.config.cleanup_probability.clamp(0.0, 1.0));
        if sweep {
            if let Err(e) = self.prune_at(now, window).await {
                warn!(error = %e, "rate limit cleanup failed");
            }
        }

        Ok(decision)
    }

    /// Delete counters whose window started more than the retention horizon
    /// ago. `longest_window` is the longest window any caller measures with;
    /// counters younger than it are kept even past retention.
    pub async fn prune(&self, longest_window: Duration) -> Result<u64, MissiveError> {
        self.prune_at(self.clock.now(), chrono_duration(longest_window)?).await
    }

    /// Never prune a window the caller is still measuring.
    async fn prune_at(
        &self,
        now: chrono::DateTime<chrono::Utc>,
        window: chrono::Duration,
    ) -> Result<u64, MissiveError> {
        let retention = std::cmp::max(chrono_duration(self.config.retention())?, window);
        self.prune_before(now - retention).await
    }

    async fn prune_before(
        &self,
        cutoff: chrono::DateTime<chrono::Utc>,
    ) -> Result<u64, MissiveError> {
        let deleted = self.storage.prune_rate_limits(cutoff).await?;
        if deleted > 0 {
            debug!(deleted, "pruned expired rate limit counters");
        }
        Ok(deleted)
    }
}
