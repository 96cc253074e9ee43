// SPDX-FileCopyrightText: 2026 Missive Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock email transport capturing outbound mail.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use missive_core::{AdapterType, EmailTransport, HealthStatus, MissiveError, PluginAdapter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// A mock email transport; failures queued with `fail_next()` are consumed
/// one per send, everything else succeeds and is captured.
pub struct MockEmailTransport {
    failures: Arc<Mutex<VecDeque<String>>>,
    sent: Arc<Mutex<Vec<SentEmail>>>,
}

impl MockEmailTransport {
    pub fn new() -> Self {
        Self {
            failures: Arc::new(Mutex::new(VecDeque::new())),
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub async fn fail_next(&self, reason: &str) {
        self.failures.lock().await.push_back(reason.to_string());
    }

    pub async fn sent_messages(&self) -> Vec<SentEmail> {
        self.sent.lock().await.clone()
    }
}

impl Default for MockEmailTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockEmailTransport {
    fn name(&self) -> &str {
        "mock-email"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Email
    }

    async fn health_check(&self) -> Result<HealthStatus, MissiveError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), MissiveError> {
        Ok(())
    }
}

#[async_trait]
impl EmailTransport for MockEmailTransport {
    async fn send_email(
        &self,
        destination: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), MissiveError> {
        if let Some(reason) = self.failures.lock().await.pop_front() {
            return Err(MissiveError::channel(reason));
        }
        self.sent.lock().await.push(SentEmail {
            to: destination.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}
