// SPDX-FileCopyrightText: 2026 Missive Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the StorageAdapter trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::OnceCell;
use tracing::debug;

use missive_config::model::StorageConfig;
use missive_core::{
    AdapterType, BackoffSchedule, Channel, FailureOutcome, HealthStatus, Instance, InstanceStatus,
    InstanceUpdate, MessageStatus, MissiveError, NewMessage, PluginAdapter, QueueHealth,
    QueuedMessage, RateLimitHit, StorageAdapter,
};

use crate::database::Database;
use crate::queries;

/// SQLite-backed storage adapter.
///
/// Wraps a [`Database`] handle and delegates all operations to the typed
/// query modules. The database is opened on the first call to
/// [`StorageAdapter::initialize`].
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// Create a new SqliteStorage with the given configuration.
    ///
    /// The database connection is not opened until [`initialize`] is called.
    ///
    /// [`initialize`]: StorageAdapter::initialize
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Returns a reference to the underlying Database, or an error if not initialized.
    fn db(&self) -> Result<&Database, MissiveError> {
        self.db.get().ok_or_else(|| MissiveError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, MissiveError> {
        let db = self.db()?;
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(crate::database::map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), MissiveError> {
        if let Some(db) = self.db.get() {
            db.close().await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), MissiveError> {
        let db = Database::open_with_config(&self.config).await?;
        self.db.set(db).map_err(|_| MissiveError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), MissiveError> {
        self.db()?.close().await
    }

    // --- Queue ---

    async fn enqueue_message(
        &self,
        message: &NewMessage,
        max_attempts: u32,
        now: DateTime<Utc>,
    ) -> Result<i64, MissiveError> {
        queries::queue::enqueue(self.db()?, message, max_attempts, now).await
    }

    async fn claim_next_message(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Option<QueuedMessage>, MissiveError> {
        queries::queue::claim_next(self.db()?, now).await
    }

    async fn claim_next_message_on(
        &self,
        channel: Channel,
        now: DateTime<Utc>,
    ) -> Result<Option<QueuedMessage>, MissiveError> {
        queries::queue::claim_next_on(self.db()?, channel, now).await
    }

    async fn mark_message_sent(&self, id: i64, now: DateTime<Utc>) -> Result<(), MissiveError> {
        queries::queue::mark_sent(self.db()?, id, now).await
    }

    async fn mark_message_failed(
        &self,
        id: i64,
        error: &str,
        backoff: &BackoffSchedule,
        now: DateTime<Utc>,
    ) -> Result<FailureOutcome, MissiveError> {
        queries::queue::mark_failed(self.db()?, id, error, backoff, now).await
    }

    async fn release_message(&self, id: i64) -> Result<(), MissiveError> {
        queries::queue::release(self.db()?, id).await
    }

    async fn recover_stale_messages(
        &self,
        claimed_before: DateTime<Utc>,
    ) -> Result<u64, MissiveError> {
        queries::queue::recover_stale(self.db()?, claimed_before).await
    }

    async fn purge_messages(&self, created_before: DateTime<Utc>) -> Result<u64, MissiveError> {
        queries::queue::purge_old(self.db()?, created_before).await
    }

    async fn get_message(&self, id: i64) -> Result<Option<QueuedMessage>, MissiveError> {
        queries::queue::get_message(self.db()?, id).await
    }

    async fn list_messages(
        &self,
        status: Option<MessageStatus>,
        limit: u32,
    ) -> Result<Vec<QueuedMessage>, MissiveError> {
        queries::queue::list_messages(self.db()?, status, limit).await
    }

    async fn queue_health(&self, now: DateTime<Utc>) -> Result<QueueHealth, MissiveError> {
        queries::queue::queue_health(self.db()?, now).await
    }

    // --- Instances ---

    async fn create_instance(
        &self,
        name: &str,
        description: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Instance, MissiveError> {
        queries::instances::create_instance(self.db()?, name, description, now).await
    }

    async fn get_instance(&self, id: i64) -> Result<Option<Instance>, MissiveError> {
        queries::instances::get_instance(self.db()?, id).await
    }

    async fn list_instances(&self) -> Result<Vec<Instance>, MissiveError> {
        queries::instances::list_instances(self.db()?).await
    }

    async fn update_instance(
        &self,
        id: i64,
        update: &InstanceUpdate,
    ) -> Result<Instance, MissiveError> {
        queries::instances::update_instance(self.db()?, id, update).await
    }

    async fn remove_instance(&self, id: i64) -> Result<(), MissiveError> {
        queries::instances::remove_instance(self.db()?, id).await
    }

    async fn select_instance(
        &self,
        status: InstanceStatus,
    ) -> Result<Option<Instance>, MissiveError> {
        queries::instances::select_instance(self.db()?, status).await
    }

    async fn record_instance_success(
        &self,
        id: i64,
        now: DateTime<Utc>,
    ) -> Result<(), MissiveError> {
        queries::instances::record_success(self.db()?, id, now).await
    }

    async fn record_instance_failure(&self, id: i64, error: &str) -> Result<(), MissiveError> {
        queries::instances::record_failure(self.db()?, id, error).await
    }

    async fn set_instance_status(
        &self,
        id: i64,
        status: InstanceStatus,
        error: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), MissiveError> {
        queries::instances::set_status(self.db()?, id, status, error, now).await
    }

    async fn reset_daily_counters(&self) -> Result<u64, MissiveError> {
        queries::instances::reset_daily_counters(self.db()?).await
    }

    // --- Rate limits ---

    async fn hit_rate_limit(
        &self,
        key: &str,
        window_cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<RateLimitHit, MissiveError> {
        queries::rate_limits::hit(self.db()?, key, window_cutoff, now).await
    }

    async fn prune_rate_limits(
        &self,
        window_start_before: DateTime<Utc>,
    ) -> Result<u64, MissiveError> {
        queries::rate_limits::prune(self.db()?, window_start_before).await
    }
}
