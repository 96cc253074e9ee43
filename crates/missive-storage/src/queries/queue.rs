// SPDX-FileCopyrightText: 2026 Missive Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Queue operations for the outbound message queue.
//!
//! Every transition is one statement (or one immediate transaction), so the
//! same queue can be worked by several processes sharing the database file.

use chrono::{DateTime, Utc};
use missive_core::{
    BackoffSchedule, Channel, FailureOutcome, MessageStatus, MissiveError, NewMessage, QueueHealth,
    QueuedMessage,
};
use rusqlite::{OptionalExtension, TransactionBehavior, params};

use crate::database::{Database, map_tr_err};
use crate::models::{MESSAGE_COLUMNS, format_ts, message_from_row, parse_ts};

fn in_flight_not_found(id: i64) -> MissiveError {
    MissiveError::NotFound {
        entity: "in-flight message",
        id: id.to_string(),
    }
}

/// Insert a new `pending` message eligible at `now`. Returns its id.
pub async fn enqueue(
    db: &Database,
    message: &NewMessage,
    max_attempts: u32,
    now: DateTime<Utc>,
) -> Result<i64, MissiveError> {
    let channel = message.channel.as_str();
    let destination = message.destination.clone();
    let subject = message.subject.clone();
    let body = message.body.clone();
    let priority = message.priority;
    let now = format_ts(now);
    db.connection()
        .call(move |conn| -> Result<i64, rusqlite::Error> {
            conn.execute(
                "INSERT INTO queued_messages \
                 (channel, destination, subject, body, priority, status, attempts, \
                  max_attempts, next_attempt_at, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, 'pending', 0, ?6, ?7, ?7)",
                params![channel, destination, subject, body, priority, max_attempts, now],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)
}

/// Claim the next eligible message.
///
/// Picks the highest-priority, oldest `pending` row whose `next_attempt_at`
/// has passed and flips it to `in_flight` in a single `UPDATE ... RETURNING`.
/// Rows already `in_flight` are skipped by the predicate, so concurrent
/// claimers always receive disjoint rows.
pub async fn claim_next(
    db: &Database,
    now: DateTime<Utc>,
) -> Result<Option<QueuedMessage>, MissiveError> {
    claim(db, now, None).await
}

/// Like [`claim_next`], restricted to one channel.
pub async fn claim_next_on(
    db: &Database,
    channel: Channel,
    now: DateTime<Utc>,
) -> Result<Option<QueuedMessage>, MissiveError> {
    claim(db, now, Some(channel)).await
}

async fn claim(
    db: &Database,
    now: DateTime<Utc>,
    channel: Option<Channel>,
) -> Result<Option<QueuedMessage>, MissiveError> {
    let now = format_ts(now);
    let channel = channel.map(Channel::as_str);
    db.connection()
        .call(move |conn| -> Result<Option<QueuedMessage>, rusqlite::Error> {
            let sql = format!(
                "UPDATE queued_messages SET status = 'in_flight', claimed_at = ?1 \
                 WHERE id = (SELECT id FROM queued_messages \
                             WHERE status = 'pending' AND next_attempt_at <= ?1 \
                               AND (?2 IS NULL OR channel = ?2) \
                             ORDER BY priority DESC, created_at ASC, id ASC \
                             LIMIT 1) \
                   AND status = 'pending' \
                 RETURNING {MESSAGE_COLUMNS}"
            );
            conn.query_row(&sql, params![now, channel], message_from_row)
                .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Mark an `in_flight` message as sent.
pub async fn mark_sent(db: &Database, id: i64, now: DateTime<Utc>) -> Result<(), MissiveError> {
    let now = format_ts(now);
    let changed = db
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "UPDATE queued_messages SET status = 'sent', sent_at = ?2, claimed_at = NULL \
                 WHERE id = ?1 AND status = 'in_flight'",
                params![id, now],
            )
        })
        .await
        .map_err(map_tr_err)?;
    if changed == 0 {
        return Err(in_flight_not_found(id));
    }
    Ok(())
}

/// Record a failed attempt.
///
/// Increments `attempts`. Once `attempts` reaches `max_attempts` the message is
/// terminally `failed`; otherwise it goes back to `pending` and becomes eligible
/// again after the scheduled backoff. `last_error` is set either way.
pub async fn mark_failed(
    db: &Database,
    id: i64,
    error: &str,
    backoff: &BackoffSchedule,
    now: DateTime<Utc>,
) -> Result<FailureOutcome, MissiveError> {
    let error = error.to_string();
    let backoff = backoff.clone();
    let outcome = db
        .connection()
        .call(move |conn| -> Result<Option<FailureOutcome>, rusqlite::Error> {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let row: Option<(u32, u32)> = tx
                .query_row(
                    "SELECT attempts, max_attempts FROM queued_messages \
                     WHERE id = ?1 AND status = 'in_flight'",
                    params![id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            let Some((attempts, max_attempts)) = row else {
                return Ok(None);
            };

            let attempts = attempts + 1;
            let outcome = if attempts >= max_attempts {
                tx.execute(
                    "UPDATE queued_messages SET status = 'failed', attempts = ?2, \
                     last_error = ?3, claimed_at = NULL WHERE id = ?1",
                    params![id, attempts, error],
                )?;
                FailureOutcome::Exhausted { attempts }
            } else {
                let delay = chrono::Duration::from_std(backoff.delay_for(attempts))
                    .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
                let next_attempt_at = now + delay;
                tx.execute(
                    "UPDATE queued_messages SET status = 'pending', attempts = ?2, \
                     last_error = ?3, next_attempt_at = ?4, claimed_at = NULL WHERE id = ?1",
                    params![id, attempts, error, format_ts(next_attempt_at)],
                )?;
                FailureOutcome::Retrying {
                    attempts,
                    next_attempt_at,
                }
            };
            tx.commit()?;
            Ok(Some(outcome))
        })
        .await
        .map_err(map_tr_err)?;
    outcome.ok_or_else(|| in_flight_not_found(id))
}

/// Return an `in_flight` message to `pending` without touching `attempts` or
/// `next_attempt_at`.
pub async fn release(db: &Database, id: i64) -> Result<(), MissiveError> {
    let changed = db
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "UPDATE queued_messages SET status = 'pending', claimed_at = NULL \
                 WHERE id = ?1 AND status = 'in_flight'",
                params![id],
            )
        })
        .await
        .map_err(map_tr_err)?;
    if changed == 0 {
        return Err(in_flight_not_found(id));
    }
    Ok(())
}

/// Return `in_flight` rows claimed before `claimed_before` to `pending`.
pub async fn recover_stale(
    db: &Database,
    claimed_before: DateTime<Utc>,
) -> Result<u64, MissiveError> {
    let cutoff = format_ts(claimed_before);
    let changed = db
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "UPDATE queued_messages SET status = 'pending', claimed_at = NULL \
                 WHERE status = 'in_flight' AND (claimed_at IS NULL OR claimed_at < ?1)",
                params![cutoff],
            )
        })
        .await
        .map_err(map_tr_err)?;
    Ok(changed as u64)
}

/// Delete `sent` and `failed` rows created before `created_before`.
pub async fn purge_old(
    db: &Database,
    created_before: DateTime<Utc>,
) -> Result<u64, MissiveError> {
    let cutoff = format_ts(created_before);
    let deleted = db
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "DELETE FROM queued_messages \
                 WHERE status IN ('sent', 'failed') AND created_at < ?1",
                params![cutoff],
            )
        })
        .await
        .map_err(map_tr_err)?;
    Ok(deleted as u64)
}

pub async fn get_message(db: &Database, id: i64) -> Result<Option<QueuedMessage>, MissiveError> {
    db.connection()
        .call(move |conn| -> Result<Option<QueuedMessage>, rusqlite::Error> {
            let sql = format!("SELECT {MESSAGE_COLUMNS} FROM queued_messages WHERE id = ?1");
            conn.query_row(&sql, params![id], message_from_row)
                .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// List messages newest first, optionally filtered by status.
pub async fn list_messages(
    db: &Database,
    status: Option<MessageStatus>,
    limit: u32,
) -> Result<Vec<QueuedMessage>, MissiveError> {
    let status = status.map(MessageStatus::as_str);
    db.connection()
        .call(move |conn| -> Result<Vec<QueuedMessage>, rusqlite::Error> {
            let sql = format!(
                "SELECT {MESSAGE_COLUMNS} FROM queued_messages \
                 WHERE (?1 IS NULL OR status = ?1) \
                 ORDER BY created_at DESC, id DESC LIMIT ?2"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![status, limit], message_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Counts per status plus the age of the oldest eligible pending message.
pub async fn queue_health(db: &Database, now: DateTime<Utc>) -> Result<QueueHealth, MissiveError> {
    let now_text = format_ts(now);
    let (counts, oldest) = db
        .connection()
        .call(
            move |conn| -> Result<(Vec<(String, i64)>, Option<String>), rusqlite::Error> {
                let mut stmt = conn
                    .prepare("SELECT status, COUNT(*) FROM queued_messages GROUP BY status")?;
                let counts = stmt
                    .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                    .collect::<Result<Vec<_>, _>>()?;
                let oldest: Option<String> = conn.query_row(
                    "SELECT MIN(created_at) FROM queued_messages \
                     WHERE status = 'pending' AND next_attempt_at <= ?1",
                    params![now_text],
                    |row| row.get(0),
                )?;
                Ok((counts, oldest))
            },
        )
        .await
        .map_err(map_tr_err)?;

    let mut health = QueueHealth::default();
    for (status, count) in counts {
        let count = count.max(0) as u64;
        match status.as_str() {
            "pending" => health.pending = count,
            "in_flight" => health.in_flight = count,
            "sent" => health.sent = count,
            "failed" => health.failed = count,
            _ => {}
        }
    }
    if let Some(oldest) = oldest {
        let created = parse_ts(&oldest).map_err(|e| MissiveError::Storage {
            source: Box::new(e),
        })?;
        health.oldest_pending_age_secs = Some((now - created).num_seconds().max(0) as u64);
    }
    Ok(health)
}
