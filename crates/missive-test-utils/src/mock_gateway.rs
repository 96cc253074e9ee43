// SPDX-FileCopyrightText: 2026 Missive Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock chat gateway for deterministic testing.
//!
//! `MockChatGateway` implements `ChatGateway` with scripted send results,
//! per-instance connection states and captured outbound texts.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use missive_core::{
    AdapterType, ChatGateway, ConnectionState, HealthStatus, MissiveError, PluginAdapter,
};

/// One text captured by [`MockChatGateway::send_text`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentText {
    pub instance: String,
    pub destination: String,
    pub text: String,
}

/// A mock provider gateway for testing.
///
/// - **send results**: outcomes queued via `push_send_result()` / `fail_next()` are
///   consumed one per send; an empty script means success
/// - **sent**: successful sends are captured and retrievable via `sent_messages()`
/// - **states**: connection state per instance; unknown instances report `open`
pub struct MockChatGateway {
    results: Arc<Mutex<VecDeque<Result<(), String>>>>,
    sent: Arc<Mutex<Vec<SentText>>>,
    attempts: Arc<Mutex<Vec<SentText>>>,
    states: Arc<Mutex<HashMap<String, Result<String, String>>>>,
    send_delay: Arc<Mutex<Option<Duration>>>,
    notify: Arc<Notify>,
}

impl MockChatGateway {
    pub fn new() -> Self {
        Self {
            results: Arc::new(Mutex::new(VecDeque::new())),
            sent: Arc::new(Mutex::new(Vec::new())),
            attempts: Arc::new(Mutex::new(Vec::new())),
            states: Arc::new(Mutex::new(HashMap::new())),
            send_delay: Arc::new(Mutex::new(None)),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Queue the outcome of a future send.
    pub async fn push_send_result(&self, result: Result<(), String>) {
        self.results.lock().await.push_back(result);
    }

    /// Make the next send fail with `reason`.
    pub async fn fail_next(&self, reason: &str) {
        self.push_send_result(Err(reason.to_string())).await;
    }

    /// Report `state` (e.g. "open", "close", "connecting") for `instance`.
    pub async fn set_state(&self, instance: &str, state: &str) {
        self.states
            .lock()
            .await
            .insert(instance.to_string(), Ok(state.to_string()));
    }

    /// Make the connection-state query for `instance` fail with `reason`.
    pub async fn set_state_error(&self, instance: &str, reason: &str) {
        self.states
            .lock()
            .await
            .insert(instance.to_string(), Err(reason.to_string()));
    }

    /// Delay every send by `delay` before it completes.
    pub async fn set_send_delay(&self, delay: Option<Duration>) {
        *self.send_delay.lock().await = delay;
    }

    /// Successful sends, in order.
    pub async fn sent_messages(&self) -> Vec<SentText> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    /// Every send call that reached the gateway, successful or not.
    pub async fn attempts(&self) -> Vec<SentText> {
        self.attempts.lock().await.clone()
    }

    /// Wait until at least `count` send calls have reached the gateway.
    pub async fn wait_for_attempts(&self, count: usize) {
        loop {
            let notified = self.notify.notified();
            if self.attempts.lock().await.len() >= count {
                return;
            }
            notified.await;
        }
    }
}

impl Default for MockChatGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockChatGateway {
    fn name(&self) -> &str {
        "mock-gateway"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Chat
    }

    async fn health_check(&self) -> Result<HealthStatus, MissiveError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), MissiveError> {
        Ok(())
    }
}

#[async_trait]
impl ChatGateway for MockChatGateway {
    async fn send_text(
        &self,
        instance: &str,
        destination: &str,
        text: &str,
    ) -> Result<(), MissiveError> {
        let record = SentText {
            instance: instance.to_string(),
            destination: destination.to_string(),
            text: text.to_string(),
        };
        self.attempts.lock().await.push(record.clone());
        self.notify.notify_waiters();

        let delay = *self.send_delay.lock().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let result = self.results.lock().await.pop_front().unwrap_or(Ok(()));
        match result {
            Ok(()) => {
                self.sent.lock().await.push(record);
                Ok(())
            }
            Err(reason) => Err(MissiveError::channel(reason)),
        }
    }

    async fn connection_state(&self, instance: &str) -> Result<ConnectionState, MissiveError> {
        match self.states.lock().await.get(instance) {
            Some(Ok(state)) => Ok(ConnectionState::from_state(state)),
            Some(Err(reason)) => Err(MissiveError::channel(reason.clone())),
            None => Ok(ConnectionState::Open),
        }
    }
}
