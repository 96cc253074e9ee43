// SPDX-FileCopyrightText: 2026 Missive Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Producer-facing API.
//!
//! [`Dispatcher`] is what the business application talks to: fire-and-forget
//! enqueue, rate limit checks, the instance admin surface and queue health.
//! Delivery itself happens in the [`DispatchWorker`].

use std::sync::Arc;
use std::time::Duration;

use missive_config::MissiveConfig;
use missive_core::{
    ChatGateway, Clock, Instance, InstanceUpdate, MissiveError, NewMessage, QueueHealth,
    RateLimitDecision, StorageAdapter,
};
use missive_ratelimit::RateLimiter;
use missive_router::InstanceRouter;

use crate::queue::QueueStore;
use crate::worker::{DispatchWorker, Senders};

pub struct Dispatcher {
    queue: Arc<QueueStore>,
    router: Arc<InstanceRouter>,
    limiter: Arc<RateLimiter>,
    clock: Arc<dyn Clock>,
}

impl Dispatcher {
    /// Wire the queue, router and rate limiter over one storage backend.
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        gateway: Option<Arc<dyn ChatGateway>>,
        clock: Arc<dyn Clock>,
        config: &MissiveConfig,
    ) -> Result<Self, MissiveError> {
        let queue = Arc::new(QueueStore::new(storage.clone(), clock.clone(), &config.queue)?);
        let router = Arc::new(InstanceRouter::new(storage.clone(), gateway, clock.clone()));
        let limiter = Arc::new(RateLimiter::new(
            storage,
            clock.clone(),
            config.rate_limit.clone(),
        ));
        Ok(Self {
            queue,
            router,
            limiter,
            clock,
        })
    }

    pub fn queue(&self) -> &Arc<QueueStore> {
        &self.queue
    }

    pub fn router(&self) -> &Arc<InstanceRouter> {
        &self.router
    }

    /// Build a worker sharing this dispatcher's queue and router.
    pub fn worker(&self, senders: Senders, config: &MissiveConfig) -> DispatchWorker {
        DispatchWorker::new(
            self.queue.clone(),
            self.router.clone(),
            senders,
            config.worker.clone(),
            self.clock.clone(),
        )
    }

    /// Queue a message for delivery. Returns the message id; delivery results
    /// are only visible through the observability queries.
    pub async fn enqueue(&self, message: NewMessage) -> Result<i64, MissiveError> {
        self.queue.enqueue(message).await
    }

    pub async fn check_rate_limit(
        &self,
        key: &str,
        max_attempts: u32,
        window: Duration,
    ) -> Result<RateLimitDecision, MissiveError> {
        self.limiter.check(key, max_attempts, window).await
    }

    pub async fn list_instances(&self) -> Result<Vec<Instance>, MissiveError> {
        self.router.list_instances().await
    }

    pub async fn create_instance(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<Instance, MissiveError> {
        self.router.create_instance(name, description).await
    }

    pub async fn update_instance(
        &self,
        id: i64,
        update: &InstanceUpdate,
    ) -> Result<Instance, MissiveError> {
        self.router.update_instance(id, update).await
    }

    pub async fn remove_instance(&self, id: i64) -> Result<(), MissiveError> {
        self.router.remove_instance(id).await
    }

    pub async fn queue_health(&self) -> Result<QueueHealth, MissiveError> {
        self.queue.health().await
    }
}
