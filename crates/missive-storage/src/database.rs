// SPDX-FileCopyrightText: 2026 Missive Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background thread.
//! Do NOT create additional Connection instances for writes.

use std::path::Path;
use std::time::Duration;

use missive_config::model::StorageConfig;
use missive_core::MissiveError;
use tracing::debug;

use crate::migrations;

/// Map a tokio-rusqlite error into the crate-wide storage error.
pub fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> MissiveError {
    MissiveError::Storage {
        source: Box::new(e),
    }
}

fn map_sql_err(e: rusqlite::Error) -> MissiveError {
    MissiveError::Storage {
        source: Box::new(e),
    }
}

/// Handle to the SQLite database.
///
/// Wraps the single `tokio_rusqlite::Connection` that every query module goes
/// through. Other processes may open the same file; SQLite serializes their
/// writers at the file level, bounded by `busy_timeout`.
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open (creating if needed) a database at `path` with default settings.
    pub async fn open(path: &str) -> Result<Self, MissiveError> {
        Self::open_with_config(&StorageConfig {
            database_path: path.to_string(),
            ..StorageConfig::default()
        })
        .await
    }

    /// Open the database described by `config` and bring the schema up to date.
    pub async fn open_with_config(config: &StorageConfig) -> Result<Self, MissiveError> {
        let path = config.database_path.clone();
        if let Some(parent) = Path::new(&path).parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| MissiveError::Storage {
                    source: Box::new(e),
                })?;
            }
        }

        // Migrations run on a plain connection off the async runtime.
        let wal_mode = config.wal_mode;
        let migrate_path = path.clone();
        tokio::task::spawn_blocking(move || -> Result<(), MissiveError> {
            let mut conn = rusqlite::Connection::open(&migrate_path).map_err(map_sql_err)?;
            if wal_mode {
                let mode: String = conn
                    .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
                    .map_err(map_sql_err)?;
                debug!(journal_mode = %mode, "journal mode set");
            }
            migrations::run_migrations(&mut conn)
        })
        .await
        .map_err(|e| MissiveError::Internal(format!("migration task failed: {e}")))??;

        let conn = tokio_rusqlite::Connection::open(&path)
            .await
            .map_err(|e| MissiveError::Storage {
                source: Box::new(e),
            })?;

        let busy_timeout = Duration::from_millis(config.busy_timeout_ms);
        conn.call(move |conn| -> Result<(), rusqlite::Error> {
            conn.busy_timeout(busy_timeout)?;
            conn.execute_batch(
                "PRAGMA foreign_keys = ON;
                 PRAGMA synchronous = NORMAL;",
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        debug!(path = %path, "database opened");
        Ok(Self { conn })
    }

    /// The underlying connection. All statements go through `call`.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Flush the WAL into the main database file.
    ///
    /// The connection stays usable; it is released when the handle is dropped.
    pub async fn close(&self) -> Result<(), MissiveError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        debug!("WAL checkpoint complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn open_creates_schema() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("schema.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();

        let tables: Vec<String> = db
            .connection()
            .call(|conn| -> Result<Vec<String>, rusqlite::Error> {
                let mut stmt = conn.prepare(
                    "SELECT name FROM sqlite_master WHERE type = 'table' \
                     AND name IN ('queued_messages', 'instances', 'rate_limits') ORDER BY name",
                )?;
                let rows = stmt.query_map([], |row| row.get(0))?;
                rows.collect()
            })
            .await
            .unwrap();
        assert_eq!(tables, vec!["instances", "queued_messages", "rate_limits"]);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn open_enables_wal_mode() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wal.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();

        let mode: String = db
            .connection()
            .call(|conn| -> Result<String, rusqlite::Error> {
                conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))
            })
            .await
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
    }

    #[tokio::test]
    async fn reopen_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("reopen.db");
        let path = path.to_str().unwrap();

        let db = Database::open(path).await.unwrap();
        db.close().await.unwrap();
        drop(db);

        let db = Database::open(path).await.unwrap();
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn open_creates_missing_parent_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("missive.db");
        let _db = Database::open(path.to_str().unwrap()).await.unwrap();
        assert!(path.exists());
    }
}
