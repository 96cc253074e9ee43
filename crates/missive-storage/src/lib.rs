// SPDX-FileCopyrightText: 2026 Missive Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for Missive.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a single-writer
//! connection via `tokio-rusqlite`, and typed operations for the outbound
//! queue, the instance registry and rate limit counters.

pub mod adapter;
pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;

pub use adapter::SqliteStorage;
pub use database::Database;
pub use models::*;
