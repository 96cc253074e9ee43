// SPDX-FileCopyrightText: 2026 Missive Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fixed-window rate limit counters.

use chrono::{DateTime, Utc};
use missive_core::{MissiveError, RateLimitHit};
use rusqlite::params;

use crate::database::{Database, map_tr_err};
use crate::models::{format_ts, ts_column};

/// Count one request against `key`.
///
/// A single upsert: a missing row starts at 1, a row whose window started at or
/// before `window_cutoff` restarts at 1 with a fresh window, anything else is
/// incremented. The `SET` expressions read the pre-update row.
pub async fn hit(
    db: &Database,
    key: &str,
    window_cutoff: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<RateLimitHit, MissiveError> {
    let key = key.to_string();
    let now = format_ts(now);
    let cutoff = format_ts(window_cutoff);
    db.connection()
        .call(move |conn| -> Result<RateLimitHit, rusqlite::Error> {
            conn.query_row(
                "INSERT INTO rate_limits (key, count, window_start) VALUES (?1, 1, ?2) \
                 ON CONFLICT(key) DO UPDATE SET \
                   count = CASE WHEN rate_limits.window_start <= ?3 THEN 1 \
                                ELSE rate_limits.count + 1 END, \
                   window_start = CASE WHEN rate_limits.window_start <= ?3 \
                                       THEN excluded.window_start \
                                       ELSE rate_limits.window_start END \
                 RETURNING count, window_start",
                params![key, now, cutoff],
                |row| {
                    Ok(RateLimitHit {
                        count: row.get(0)?,
                        window_start: ts_column(row, 1)?,
                    })
                },
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Delete counters whose window started before `window_start_before`.
pub async fn prune(
    db: &Database,
    window_start_before: DateTime<Utc>,
) -> Result<u64, MissiveError> {
    let cutoff = format_ts(window_start_before);
    let deleted = db
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "DELETE FROM rate_limits WHERE window_start < ?1",
                params![cutoff],
            )
        })
        .await
        .map_err(map_tr_err)?;
    Ok(deleted as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn counts_within_window_and_resets_after() {
        let (db, _dir) = setup_db().await;
        let window = Duration::minutes(15);

        for expected in 1..=3u32 {
            let now = t0() + Duration::minutes(expected as i64);
            let h = hit(&db, "otp:ip:10.0.0.1", now - window, now).await.unwrap();
            assert_eq!(h.count, expected);
            assert_eq!(h.window_start, t0() + Duration::minutes(1));
        }

        // Exactly one window after the first hit the counter restarts.
        let now = t0() + Duration::minutes(16);
        let h = hit(&db, "otp:ip:10.0.0.1", now - window, now).await.unwrap();
        assert_eq!(h.count, 1);
        assert_eq!(h.window_start, now);
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let (db, _dir) = setup_db().await;
        let cutoff = t0() - Duration::minutes(15);
        hit(&db, "a", cutoff, t0()).await.unwrap();
        hit(&db, "a", cutoff, t0()).await.unwrap();
        let b = hit(&db, "b", cutoff, t0()).await.unwrap();
        assert_eq!(b.count, 1);
    }

    #[tokio::test]
    async fn prune_drops_old_windows_only() {
        let (db, _dir) = setup_db().await;
        let far = t0() - Duration::days(1);
        hit(&db, "old", far, t0() - Duration::hours(2)).await.unwrap();
        hit(&db, "new", far, t0()).await.unwrap();

        let deleted = prune(&db, t0() - Duration::hours(1)).await.unwrap();
        assert_eq!(deleted, 1);

        // "new" keeps counting in its window; "old" starts over.
        assert_eq!(hit(&db, "new", far, t0()).await.unwrap().count, 2);
        assert_eq!(hit(&db, "old", far, t0()).await.unwrap().count, 1);
    }
}
