// SPDX-FileCopyrightText: 2026 Missive Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Maintenance jobs scheduled beside the send loop.
//!
//! Each job runs on its own timer and is never held up by the pacing delay:
//! - cleanup: purge old terminal messages, refresh queue depth gauges
//! - health check: refresh instance connectivity status
//! - stale sweep: return abandoned `in_flight` claims to `pending`
//! - daily reset: zero per-instance daily counters at local midnight

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use missive_core::MissiveError;

use crate::worker::WorkerInner;

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

pub(crate) fn spawn_all(inner: Arc<WorkerInner>, cancel: &CancellationToken) -> Vec<JoinHandle<()>> {
    let config = &inner.config;
    vec![
        spawn_periodic(
            "stale sweep",
            config.stale_sweep_interval(),
            true,
            cancel.clone(),
            {
                let inner = inner.clone();
                move || {
                    let inner = inner.clone();
                    async move { inner.stale_sweep().await.map(|_| ()) }
                }
            },
        ),
        spawn_periodic(
            "health check",
            config.health_check_interval(),
            true,
            cancel.clone(),
            {
                let inner = inner.clone();
                move || {
                    let inner = inner.clone();
                    async move { inner.health_check().await }
                }
            },
        ),
        spawn_periodic(
            "cleanup",
            config.cleanup_interval(),
            false,
            cancel.clone(),
            {
                let inner = inner.clone();
                move || {
                    let inner = inner.clone();
                    async move { inner.cleanup().await }
                }
            },
        ),
        tokio::spawn(run_daily_reset(inner.clone(), cancel.clone())),
    ]
}

/// Run `job` every `period` until cancelled. Errors are logged, never fatal.
fn spawn_periodic<F, Fut>(
    name: &'static str,
    period: Duration,
    run_immediately: bool,
    cancel: CancellationToken,
    job: F,
) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), MissiveError>> + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        if !run_immediately {
            // Skip the first immediate tick.
            interval.tick().await;
        }

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(job = name, "maintenance task shutting down");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(e) = job().await {
                        warn!(job = name, error = %e, "maintenance job failed (non-fatal)");
                    }
                }
            }
        }
    })
}

async fn run_daily_reset(inner: Arc<WorkerInner>, cancel: CancellationToken) {
    let offset = inner.config.daily_reset_utc_offset_minutes;
    let first = match until_next_daily_reset(inner.clock.now(), offset) {
        Ok(delay) => delay,
        Err(e) => {
            warn!(error = %e, "cannot schedule daily counter reset");
            return;
        }
    };
    debug!(in_secs = first.as_secs(), "daily counter reset scheduled");

    let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + first, DAY);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(job = "daily reset", "maintenance task shutting down");
                break;
            }
            _ = interval.tick() => {
                if let Err(e) = inner.router.reset_daily_counters().await {
                    warn!(job = "daily reset", error = %e, "maintenance job failed (non-fatal)");
                }
            }
        }
    }
}

impl WorkerInner {
    pub(crate) async fn cleanup(&self) -> Result<(), MissiveError> {
        self.queue.purge_old(self.queue.retention_days()).await?;
        self.refresh_queue_gauges().await
    }

    pub(crate) async fn health_check(&self) -> Result<(), MissiveError> {
        let report = self.router.health_check().await?;
        if report.checked > 0 && report.open == 0 {
            warn!(checked = report.checked, "no open instances after health check");
        }
        self.refresh_queue_gauges().await
    }

    pub(crate) async fn stale_sweep(&self) -> Result<u64, MissiveError> {
        let healed = self.queue.recover_stale().await?;
        missive_prometheus::record_stale_recovered(healed);
        Ok(healed)
    }

    async fn refresh_queue_gauges(&self) -> Result<(), MissiveError> {
        let health = self.queue.health().await?;
        missive_prometheus::set_queue_depth(&health);
        Ok(())
    }
}

/// The first local midnight strictly after `now`, for a fixed UTC offset.
pub fn next_daily_reset(
    now: DateTime<Utc>,
    utc_offset_minutes: i32,
) -> Result<DateTime<Utc>, MissiveError> {
    let offset = FixedOffset::east_opt(utc_offset_minutes * 60).ok_or_else(|| {
        MissiveError::Config(format!("invalid UTC offset: {utc_offset_minutes} minutes"))
    })?;
    let tomorrow = now
        .with_timezone(&offset)
        .date_naive()
        .succ_opt()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| MissiveError::Internal("date out of range".into()))?;
    let midnight = offset
        .from_local_datetime(&tomorrow)
        .single()
        .ok_or_else(|| MissiveError::Internal("ambiguous local midnight".into()))?;
    Ok(midnight.with_timezone(&Utc))
}

/// Time left until [`next_daily_reset`].
pub fn until_next_daily_reset(
    now: DateTime<Utc>,
    utc_offset_minutes: i32,
) -> Result<Duration, MissiveError> {
    let next = next_daily_reset(now, utc_offset_minutes)?;
    (next - now)
        .to_std()
        .map_err(|e| MissiveError::Internal(format!("negative reset delay: {e}")))
}
