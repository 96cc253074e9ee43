// SPDX-FileCopyrightText: 2026 Missive Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for integration testing.
//!
//! `TestHarness` assembles an initialized SQLite storage in a temp directory,
//! a [`ManualClock`] and a configuration tuned for tests: zero pacing and
//! short timers.

use std::sync::Arc;

use missive_config::model::{MissiveConfig, StorageConfig};
use missive_core::{Clock, MissiveError, StorageAdapter};
use missive_storage::SqliteStorage;

use crate::clock::ManualClock;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    max_attempts: Option<u32>,
    backoff_secs: Option<Vec<u64>>,
    start: Option<chrono::DateTime<chrono::Utc>>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            max_attempts: None,
            backoff_secs: None,
            start: None,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn with_backoff_secs(mut self, backoff_secs: Vec<u64>) -> Self {
        self.backoff_secs = Some(backoff_secs);
        self
    }

    /// Start the manual clock at `start` instead of the default morning.
    pub fn with_start(mut self, start: chrono::DateTime<chrono::Utc>) -> Self {
        self.start = Some(start);
        self
    }

    /// Build the test harness, creating and migrating the temp database.
    pub async fn build(self) -> Result<TestHarness, MissiveError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| MissiveError::Storage { source: e.into() })?;
        let db_path = temp_dir.path().join("test.db");

        let mut config = MissiveConfig::default();
        config.storage = StorageConfig {
            database_path: db_path.to_string_lossy().into_owned(),
            ..StorageConfig::default()
        };
        config.worker.pacing_min_secs = 0;
        config.worker.pacing_max_secs = 0;
        config.worker.tick_interval_ms = 10;
        config.rate_limit.cleanup_probability = 0.0;
        if let Some(max_attempts) = self.max_attempts {
            config.queue.max_attempts = max_attempts;
        }
        if let Some(backoff_secs) = self.backoff_secs {
            config.queue.backoff_secs = backoff_secs;
        }

        let storage = SqliteStorage::new(config.storage.clone());
        storage.initialize().await?;

        let clock = Arc::new(ManualClock::new(
            self.start.unwrap_or_else(ManualClock::default_start),
        ));

        Ok(TestHarness {
            storage: Arc::new(storage),
            clock,
            config,
            _temp_dir: temp_dir,
        })
    }
}

/// Initialized storage, manual clock and test configuration.
///
/// The temp directory lives as long as the harness.
pub struct TestHarness {
    pub storage: Arc<SqliteStorage>,
    pub clock: Arc<ManualClock>,
    pub config: MissiveConfig,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Harness with default test settings.
    pub async fn new() -> Result<Self, MissiveError> {
        Self::builder().build().await
    }

    pub fn storage_dyn(&self) -> Arc<dyn StorageAdapter> {
        self.storage.clone()
    }

    pub fn clock_dyn(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }
}
