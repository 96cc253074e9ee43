// SPDX-FileCopyrightText: 2026 Missive Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The dispatch worker: a single-flight, timer-driven send loop.
//!
//! Each tick claims at most one message, routes chat messages through the
//! least-used healthy instance, invokes the channel sender and records the
//! outcome. Maintenance jobs (cleanup, health checks, stale recovery, daily
//! counter reset) run on their own timers, see [`crate::maintenance`].

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use rand::Rng;
use tokio::sync::Mutex as TickGuard;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use missive_config::model::WorkerConfig;
use missive_core::{
    Channel, ChatGateway, Clock, EmailTransport, Instance, MissiveError, QueuedMessage,
};
use missive_router::InstanceRouter;

use crate::maintenance;
use crate::queue::QueueStore;

/// Channel senders available to the worker. A missing sender turns every
/// message on that channel into a delivery failure.
#[derive(Clone, Default)]
pub struct Senders {
    pub chat: Option<Arc<dyn ChatGateway>>,
    pub email: Option<Arc<dyn EmailTransport>>,
}

/// What one tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing was eligible.
    Idle,
    /// A chat message was claimed but no instance could take it; it went back
    /// to `pending` without spending an attempt.
    NoCapacity { message_id: i64 },
    Sent { message_id: i64 },
    Failed { message_id: i64, terminal: bool },
    /// Another tick holds the single-flight guard.
    Busy,
    /// Shutdown interrupted the send; the message went back to `pending`.
    Interrupted { message_id: i64 },
}

enum Delivery {
    Done(Result<(), MissiveError>),
    Interrupted,
}

pub(crate) struct WorkerInner {
    pub(crate) queue: Arc<QueueStore>,
    pub(crate) router: Arc<InstanceRouter>,
    pub(crate) senders: Senders,
    pub(crate) config: WorkerConfig,
    pub(crate) clock: Arc<dyn Clock>,
    guard: TickGuard<()>,
}

struct Running {
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

/// Owns the send loop and maintenance timers for one process.
///
/// `start` and `stop` are idempotent; the worker can be restarted after a stop.
pub struct DispatchWorker {
    inner: Arc<WorkerInner>,
    running: Mutex<Option<Running>>,
}

impl DispatchWorker {
    pub fn new(
        queue: Arc<QueueStore>,
        router: Arc<InstanceRouter>,
        senders: Senders,
        config: WorkerConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: Arc::new(WorkerInner {
                queue,
                router,
                senders,
                config,
                clock,
                guard: TickGuard::new(()),
            }),
            running: Mutex::new(None),
        }
    }

    /// Spawn the tick loop and maintenance tasks. Returns `false` if the
    /// worker was already running.
    pub fn start(&self) -> bool {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if running.is_some() {
            debug!("dispatch worker already running");
            return false;
        }

        let cancel = CancellationToken::new();
        let mut handles = vec![tokio::spawn(run_tick_loop(
            self.inner.clone(),
            cancel.clone(),
        ))];
        handles.extend(maintenance::spawn_all(self.inner.clone(), &cancel));
        *running = Some(Running { cancel, handles });

        info!(
            tick_ms = self.inner.config.tick_interval_ms,
            pacing_min_secs = self.inner.config.pacing_min_secs,
            pacing_max_secs = self.inner.config.pacing_max_secs,
            "dispatch worker started"
        );
        true
    }

    /// Cancel all timers, interrupt any pacing wait or in-progress send, and
    /// wait for the tasks to finish. Returns `false` if it was not running.
    pub async fn stop(&self) -> bool {
        let running = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(running) = running else {
            return false;
        };

        running.cancel.cancel();
        for handle in running.handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "dispatch task ended abnormally");
            }
        }
        info!("dispatch worker stopped");
        true
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Run one tick now. Returns [`TickOutcome::Busy`] if a tick is already
    /// in progress.
    pub async fn tick(&self) -> Result<TickOutcome, MissiveError> {
        let cancel = self.current_cancel();
        self.inner.tick(&cancel).await
    }

    /// Run each maintenance job once, in the order the timers would.
    pub async fn run_maintenance(&self) -> Result<(), MissiveError> {
        self.inner.stale_sweep().await?;
        self.inner.health_check().await?;
        self.inner.cleanup().await?;
        Ok(())
    }

    fn current_cancel(&self) -> CancellationToken {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|r| r.cancel.clone())
            .unwrap_or_default()
    }
}

async fn run_tick_loop(inner: Arc<WorkerInner>, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(inner.config.tick_interval());
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("tick loop shutting down");
                break;
            }
            _ = interval.tick() => {
                if let Err(e) = inner.tick(&cancel).await {
                    error!(error = %e, "dispatch tick failed");
                }
            }
        }
    }
}

impl WorkerInner {
    async fn tick(&self, cancel: &CancellationToken) -> Result<TickOutcome, MissiveError> {
        let Ok(_guard) = self.guard.try_lock() else {
            return Ok(TickOutcome::Busy);
        };

        let outcome = self.process_next(cancel).await?;
        if matches!(
            outcome,
            TickOutcome::Sent { .. } | TickOutcome::Failed { .. }
        ) {
            self.pace(cancel).await;
        }
        Ok(outcome)
    }

    async fn process_next(&self, cancel: &CancellationToken) -> Result<TickOutcome, MissiveError> {
        let Some(message) = self.queue.claim_next().await? else {
            return Ok(TickOutcome::Idle);
        };
        debug!(
            message_id = message.id,
            channel = message.channel.as_str(),
            attempts = message.attempts,
            "message claimed"
        );

        match message.channel {
            Channel::Chat => match self.dispatch_chat(message, cancel).await? {
                TickOutcome::NoCapacity { message_id } => {
                    self.dispatch_email_instead(message_id, cancel).await
                }
                outcome => Ok(outcome),
            },
            Channel::Email => self.dispatch_email(message, cancel).await,
        }
    }

    /// Chat has no capacity; an eligible email still goes out this tick so a
    /// backlog of chat messages cannot hold up the other channel.
    async fn dispatch_email_instead(
        &self,
        blocked: i64,
        cancel: &CancellationToken,
    ) -> Result<TickOutcome, MissiveError> {
        let Some(message) = self.queue.claim_next_on(Channel::Email).await? else {
            return Ok(TickOutcome::NoCapacity {
                message_id: blocked,
            });
        };
        debug!(
            message_id = message.id,
            blocked_chat = blocked,
            "chat has no capacity, sending email instead"
        );
        self.dispatch_email(message, cancel).await
    }

    async fn dispatch_chat(
        &self,
        message: QueuedMessage,
        cancel: &CancellationToken,
    ) -> Result<TickOutcome, MissiveError> {
        let Some(gateway) = self.senders.chat.clone() else {
            return self.no_sender(&message).await;
        };

        let instance = match self.router.select().await {
            Ok(Some(instance)) => instance,
            Ok(None) => {
                self.queue.release(message.id).await?;
                missive_prometheus::record_no_capacity();
                debug!(message_id = message.id, "no instance available, message left pending");
                return Ok(TickOutcome::NoCapacity {
                    message_id: message.id,
                });
            }
            Err(e) => {
                self.queue.release(message.id).await?;
                return Err(e);
            }
        };

        let send = gateway.send_text(&instance.name, &message.destination, &message.body);
        let delivery = self.deliver(Channel::Chat, send, cancel).await;
        self.settle(&message, Some(&instance), delivery).await
    }

    async fn dispatch_email(
        &self,
        message: QueuedMessage,
        cancel: &CancellationToken,
    ) -> Result<TickOutcome, MissiveError> {
        let Some(transport) = self.senders.email.clone() else {
            return self.no_sender(&message).await;
        };

        let subject = message.subject.as_deref().unwrap_or_default();
        let send = transport.send_email(&message.destination, subject, &message.body);
        let delivery = self.deliver(Channel::Email, send, cancel).await;
        self.settle(&message, None, delivery).await
    }

    async fn no_sender(&self, message: &QueuedMessage) -> Result<TickOutcome, MissiveError> {
        let reason = format!("no sender configured for channel {}", message.channel.as_str());
        let delivery = Delivery::Done(Err(MissiveError::channel(reason)));
        self.settle(message, None, delivery).await
    }

    /// Run one sender call bounded by the send timeout and the shutdown signal.
    async fn deliver<F>(&self, channel: Channel, send: F, cancel: &CancellationToken) -> Delivery
    where
        F: Future<Output = Result<(), MissiveError>>,
    {
        let timeout = self.config.send_timeout();
        let started = Instant::now();
        let delivery = tokio::select! {
            biased;
            _ = cancel.cancelled() => Delivery::Interrupted,
            result = tokio::time::timeout(timeout, send) => Delivery::Done(
                result.unwrap_or(Err(MissiveError::Timeout { duration: timeout })),
            ),
        };
        missive_prometheus::record_send_duration(channel, started.elapsed().as_secs_f64());
        delivery
    }

    async fn settle(
        &self,
        message: &QueuedMessage,
        instance: Option<&Instance>,
        delivery: Delivery,
    ) -> Result<TickOutcome, MissiveError> {
        let instance_name = instance.map(|i| i.name.as_str()).unwrap_or("-");
        match delivery {
            Delivery::Done(Ok(())) => {
                self.queue.mark_sent(message.id).await?;
                if let Some(instance) = instance {
                    if let Err(e) = self.router.record_success(instance.id).await {
                        warn!(instance = %instance.name, error = %e, "failed to record instance success");
                    }
                }
                missive_prometheus::record_sent(message.channel);
                info!(
                    message_id = message.id,
                    channel = message.channel.as_str(),
                    instance = instance_name,
                    "message sent"
                );
                Ok(TickOutcome::Sent {
                    message_id: message.id,
                })
            }
            Delivery::Done(Err(e)) => {
                let reason = e.reason();
                let outcome = self.queue.mark_failed(message.id, &reason).await?;
                if let Some(instance) = instance {
                    if let Err(e) = self.router.record_failure(instance.id, &reason).await {
                        warn!(instance = %instance.name, error = %e, "failed to record instance failure");
                    }
                }
                let terminal = outcome.is_terminal();
                missive_prometheus::record_failed(message.channel, terminal);
                warn!(
                    message_id = message.id,
                    channel = message.channel.as_str(),
                    instance = instance_name,
                    attempts = message.attempts + 1,
                    terminal,
                    error = %reason,
                    "message delivery failed"
                );
                Ok(TickOutcome::Failed {
                    message_id: message.id,
                    terminal,
                })
            }
            Delivery::Interrupted => {
                self.queue.release(message.id).await?;
                info!(message_id = message.id, "send interrupted by shutdown, message released");
                Ok(TickOutcome::Interrupted {
                    message_id: message.id,
                })
            }
        }
    }

    /// Wait a random pacing delay, or until shutdown.
    async fn pace(&self, cancel: &CancellationToken) {
        let delay = pacing_delay(&self.config);
        if delay.is_zero() {
            return;
        }
        debug!(delay_ms = delay.as_millis() as u64, "pacing");
        tokio::select! {
            _ = cancel.cancelled() => debug!("pacing interrupted by shutdown"),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

/// Draw a pacing delay uniformly from the configured bounds.
pub fn pacing_delay(config: &WorkerConfig) -> Duration {
    let min = config.pacing_min().as_millis() as u64;
    let max = config.pacing_max().as_millis() as u64;
    if max <= min {
        return Duration::from_millis(min);
    }
    Duration::from_millis(rand::thread_rng().gen_range(min..=max))
}
