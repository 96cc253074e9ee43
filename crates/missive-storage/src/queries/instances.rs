// SPDX-FileCopyrightText: 2026 Missive Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Instance registry operations.
//!
//! Counter updates are single `UPDATE ... SET x = x + 1` statements; there is
//! no read-modify-write across round trips.

use chrono::{DateTime, Utc};
use missive_core::{Instance, InstanceStatus, InstanceUpdate, MissiveError};
use rusqlite::{OptionalExtension, TransactionBehavior, params};

use crate::database::{Database, map_tr_err};
use crate::models::{INSTANCE_COLUMNS, format_ts, instance_from_row};

fn instance_not_found(id: i64) -> MissiveError {
    MissiveError::NotFound {
        entity: "instance",
        id: id.to_string(),
    }
}

fn fetch(conn: &rusqlite::Connection, id: i64) -> Result<Option<Instance>, rusqlite::Error> {
    let sql = format!("SELECT {INSTANCE_COLUMNS} FROM instances WHERE id = ?1");
    conn.query_row(&sql, params![id], instance_from_row)
        .optional()
}

/// Register a new instance with `status = unknown`.
///
/// Fails with [`MissiveError::Conflict`] if the name is taken.
pub async fn create_instance(
    db: &Database,
    name: &str,
    description: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Instance, MissiveError> {
    let name = name.to_string();
    let conflict_name = name.clone();
    let description = description.map(str::to_string);
    let now = format_ts(now);
    let created = db
        .connection()
        .call(move |conn| -> Result<Option<Instance>, rusqlite::Error> {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let taken = tx
                .query_row(
                    "SELECT 1 FROM instances WHERE name = ?1",
                    params![name],
                    |_| Ok(()),
                )
                .optional()?
                .is_some();
            if taken {
                return Ok(None);
            }
            tx.execute(
                "INSERT INTO instances (name, description, active, status, created_at) \
                 VALUES (?1, ?2, 1, 'unknown', ?3)",
                params![name, description, now],
            )?;
            let id = tx.last_insert_rowid();
            let instance = fetch(&tx, id)?;
            tx.commit()?;
            Ok(instance)
        })
        .await
        .map_err(map_tr_err)?;
    created.ok_or_else(|| {
        MissiveError::Conflict(format!("instance name `{conflict_name}` already exists"))
    })
}

pub async fn get_instance(db: &Database, id: i64) -> Result<Option<Instance>, MissiveError> {
    db.connection()
        .call(move |conn| -> Result<Option<Instance>, rusqlite::Error> { fetch(conn, id) })
        .await
        .map_err(map_tr_err)
}

pub async fn list_instances(db: &Database) -> Result<Vec<Instance>, MissiveError> {
    db.connection()
        .call(|conn| -> Result<Vec<Instance>, rusqlite::Error> {
            let sql = format!("SELECT {INSTANCE_COLUMNS} FROM instances ORDER BY id");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], instance_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Apply an administrative update and return the updated row.
pub async fn update_instance(
    db: &Database,
    id: i64,
    update: &InstanceUpdate,
) -> Result<Instance, MissiveError> {
    let description = update.description.clone();
    let active = update.active;
    let updated = db
        .connection()
        .call(move |conn| -> Result<Option<Instance>, rusqlite::Error> {
            let changed = conn.execute(
                "UPDATE instances SET description = COALESCE(?2, description), \
                 active = COALESCE(?3, active) WHERE id = ?1",
                params![id, description, active],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            fetch(conn, id)
        })
        .await
        .map_err(map_tr_err)?;
    updated.ok_or_else(|| instance_not_found(id))
}

pub async fn remove_instance(db: &Database, id: i64) -> Result<(), MissiveError> {
    let deleted = db
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute("DELETE FROM instances WHERE id = ?1", params![id])
        })
        .await
        .map_err(map_tr_err)?;
    if deleted == 0 {
        return Err(instance_not_found(id));
    }
    Ok(())
}

/// The active instance in `status` with the fewest sends today.
///
/// Ties go to the instance that sent least recently; never-used instances
/// (`last_sent_at` NULL) come first.
pub async fn select_instance(
    db: &Database,
    status: InstanceStatus,
) -> Result<Option<Instance>, MissiveError> {
    let status = status.as_str();
    db.connection()
        .call(move |conn| -> Result<Option<Instance>, rusqlite::Error> {
            let sql = format!(
                "SELECT {INSTANCE_COLUMNS} FROM instances \
                 WHERE active = 1 AND status = ?1 \
                 ORDER BY messages_sent_today ASC, last_sent_at ASC NULLS FIRST, id ASC \
                 LIMIT 1"
            );
            conn.query_row(&sql, params![status], instance_from_row)
                .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn record_success(db: &Database, id: i64, now: DateTime<Utc>) -> Result<(), MissiveError> {
    let now = format_ts(now);
    let changed = db
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "UPDATE instances SET messages_sent_total = messages_sent_total + 1, \
                 messages_sent_today = messages_sent_today + 1, last_sent_at = ?2 \
                 WHERE id = ?1",
                params![id, now],
            )
        })
        .await
        .map_err(map_tr_err)?;
    if changed == 0 {
        return Err(instance_not_found(id));
    }
    Ok(())
}

/// Record a send failure. Only `last_error` changes.
pub async fn record_failure(db: &Database, id: i64, error: &str) -> Result<(), MissiveError> {
    let error = error.to_string();
    let changed = db
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "UPDATE instances SET last_error = ?2 WHERE id = ?1",
                params![id, error],
            )
        })
        .await
        .map_err(map_tr_err)?;
    if changed == 0 {
        return Err(instance_not_found(id));
    }
    Ok(())
}

/// Store the result of a connectivity check and stamp `last_checked_at`.
pub async fn set_status(
    db: &Database,
    id: i64,
    status: InstanceStatus,
    error: Option<&str>,
    now: DateTime<Utc>,
) -> Result<(), MissiveError> {
    let status = status.as_str();
    let error = error.map(str::to_string);
    let now = format_ts(now);
    let changed = db
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "UPDATE instances SET status = ?2, last_checked_at = ?3, \
                 last_error = COALESCE(?4, last_error) WHERE id = ?1",
                params![id, status, now, error],
            )
        })
        .await
        .map_err(map_tr_err)?;
    if changed == 0 {
        return Err(instance_not_found(id));
    }
    Ok(())
}

/// Zero `messages_sent_today` on every instance.
pub async fn reset_daily_counters(db: &Database) -> Result<u64, MissiveError> {
    let changed = db
        .connection()
        .call(|conn| -> Result<usize, rusqlite::Error> {
            conn.execute("UPDATE instances SET messages_sent_today = 0", [])
        })
        .await
        .map_err(map_tr_err)?;
    Ok(changed as u64)
}
