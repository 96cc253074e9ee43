// SPDX-FileCopyrightText: 2026 Missive Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row mapping between SQLite columns and the domain types in `missive-core`.
//!
//! Timestamps are stored as UTC text with millisecond precision
//! (`2026-03-01T09:30:00.000Z`), which sorts in time order as plain strings.

use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::Row;
use rusqlite::types::Type;

pub use missive_core::types::{Instance, QueuedMessage};

/// Text format of every timestamp column.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

pub fn format_ts(t: DateTime<Utc>) -> String {
    t.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_ts(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).map(|n| n.and_utc())
}

pub(crate) fn ts_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_ts(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn opt_ts_column(
    row: &Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        parse_ts(&s)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

/// Parse a text column into one of the strum-backed enums.
pub(crate) fn enum_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    T::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Column list matching [`message_from_row`].
pub(crate) const MESSAGE_COLUMNS: &str = "id, channel, destination, subject, body, priority, \
     status, attempts, max_attempts, next_attempt_at, created_at, claimed_at, sent_at, last_error";

pub(crate) fn message_from_row(row: &Row<'_>) -> rusqlite::Result<QueuedMessage> {
    Ok(QueuedMessage {
        id: row.get(0)?,
        channel: enum_column(row, 1)?,
        destination: row.get(2)?,
        subject: row.get(3)?,
        body: row.get(4)?,
        priority: row.get(5)?,
        status: enum_column(row, 6)?,
        attempts: row.get(7)?,
        max_attempts: row.get(8)?,
        next_attempt_at: ts_column(row, 9)?,
        created_at: ts_column(row, 10)?,
        claimed_at: opt_ts_column(row, 11)?,
        sent_at: opt_ts_column(row, 12)?,
        last_error: row.get(13)?,
    })
}

/// Column list matching [`instance_from_row`].
pub(crate) const INSTANCE_COLUMNS: &str = "id, name, description, active, status, \
     messages_sent_total, messages_sent_today, last_sent_at, last_error, last_checked_at, created_at";

pub(crate) fn instance_from_row(row: &Row<'_>) -> rusqlite::Result<Instance> {
    Ok(Instance {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        active: row.get(3)?,
        status: enum_column(row, 4)?,
        messages_sent_total: row.get(5)?,
        messages_sent_today: row.get(6)?,
        last_sent_at: opt_ts_column(row, 7)?,
        last_error: row.get(8)?,
        last_checked_at: opt_ts_column(row, 9)?,
        created_at: ts_column(row, 10)?,
    })
}
