// SPDX-FileCopyrightText: 2026 Missive Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Instance selection, usage accounting and administrative CRUD.

use std::sync::Arc;

use tracing::{debug, info};

use missive_core::{
    ChatGateway, Clock, Instance, InstanceStatus, InstanceUpdate, MissiveError, StorageAdapter,
};

/// Routes chat sends across registered provider instances.
///
/// `status` is written only by [`InstanceRouter::health_check`]; the send path
/// touches counters and `last_error` alone so a transient failure never takes
/// an instance out of rotation.
pub struct InstanceRouter {
    pub(crate) storage: Arc<dyn StorageAdapter>,
    pub(crate) gateway: Option<Arc<dyn ChatGateway>>,
    pub(crate) clock: Arc<dyn Clock>,
}

impl InstanceRouter {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        gateway: Option<Arc<dyn ChatGateway>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            storage,
            gateway,
            clock,
        }
    }

    /// Pick the instance for the next chat send.
    ///
    /// Active `open` instances come first, then active never-checked
    /// (`unknown`) ones; within a tier the lowest `messages_sent_today` wins,
    /// ties going to the one idle longest. `None` means no capacity.
    pub async fn select(&self) -> Result<Option<Instance>, MissiveError> {
        for status in [InstanceStatus::Open, InstanceStatus::Unknown] {
            if let Some(instance) = self.storage.select_instance(status).await? {
                debug!(
                    instance = %instance.name,
                    status = status.as_str(),
                    sent_today = instance.messages_sent_today,
                    "instance selected"
                );
                return Ok(Some(instance));
            }
        }
        Ok(None)
    }

    pub async fn record_success(&self, instance_id: i64) -> Result<(), MissiveError> {
        self.storage
            .record_instance_success(instance_id, self.clock.now())
            .await
    }

    /// Remember the failure reason; status and counters stay untouched.
    pub async fn record_failure(&self, instance_id: i64, error: &str) -> Result<(), MissiveError> {
        self.storage.record_instance_failure(instance_id, error).await
    }

    pub async fn reset_daily_counters(&self) -> Result<u64, MissiveError> {
        let reset = self.storage.reset_daily_counters().await?;
        info!(instances = reset, "daily send counters reset");
        Ok(reset)
    }

    // --- Administration ---

    pub async fn list_instances(&self) -> Result<Vec<Instance>, MissiveError> {
        self.storage.list_instances().await
    }

    pub async fn create_instance(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<Instance, MissiveError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(MissiveError::Config("instance name must not be empty".into()));
        }
        let instance = self
            .storage
            .create_instance(name, description, self.clock.now())
            .await?;
        info!(instance = %instance.name, id = instance.id, "instance registered");
        Ok(instance)
    }

    pub async fn get_instance(&self, id: i64) -> Result<Instance, MissiveError> {
        self.storage
            .get_instance(id)
            .await?
            .ok_or_else(|| MissiveError::NotFound {
                entity: "instance",
                id: id.to_string(),
            })
    }

    pub async fn update_instance(
        &self,
        id: i64,
        update: &InstanceUpdate,
    ) -> Result<Instance, MissiveError> {
        if update.is_empty() {
            return self.get_instance(id).await;
        }
        let instance = self.storage.update_instance(id, update).await?;
        info!(
            instance = %instance.name,
            active = instance.active,
            "instance updated"
        );
        Ok(instance)
    }

    pub async fn remove_instance(&self, id: i64) -> Result<(), MissiveError> {
        self.storage.remove_instance(id).await?;
        info!(id, "instance removed");
        Ok(())
    }
}
