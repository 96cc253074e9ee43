// SPDX-FileCopyrightText: 2026 Missive Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Email channel sender over SMTP.
//!
//! Wraps lettre's async SMTP transport. STARTTLS is used unless
//! `[email] starttls = false`, which allows plain local relays.

pub mod message;

use std::time::Duration;

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use tracing::debug;

use missive_config::model::EmailConfig;
use missive_core::{AdapterType, EmailTransport, HealthStatus, MissiveError, PluginAdapter};

const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

/// [`EmailTransport`] backed by an SMTP relay.
pub struct SmtpEmailTransport {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    host: String,
}

impl SmtpEmailTransport {
    /// Build from `[email]` config. Requires `smtp_host` and `from_address`.
    pub fn new(config: &EmailConfig) -> Result<Self, MissiveError> {
        let host = config.smtp_host.as_deref().ok_or_else(|| {
            MissiveError::Config("email.smtp_host is required for the email channel".into())
        })?;
        let from_address = config.from_address.as_deref().ok_or_else(|| {
            MissiveError::Config("email.from_address is required for the email channel".into())
        })?;
        let from = message::parse_mailbox(from_address)
            .map_err(|e| MissiveError::Config(format!("email.from_address: {}", e.reason())))?;

        let builder = if config.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host).map_err(|e| {
                MissiveError::Config(format!("invalid SMTP relay `{host}`: {e}"))
            })?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
        };
        let mut builder = builder.port(config.smtp_port).timeout(Some(SMTP_TIMEOUT));
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
            host: host.to_string(),
        })
    }
}

#[async_trait]
impl PluginAdapter for SmtpEmailTransport {
    fn name(&self) -> &str {
        "smtp"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Email
    }

    async fn health_check(&self) -> Result<HealthStatus, MissiveError> {
        match self.transport.test_connection().await {
            Ok(true) => Ok(HealthStatus::Healthy),
            Ok(false) => Ok(HealthStatus::Degraded(format!(
                "SMTP relay {} did not accept the connection test",
                self.host
            ))),
            Err(e) => Ok(HealthStatus::Unhealthy(format!(
                "SMTP relay {} unreachable: {e}",
                self.host
            ))),
        }
    }

    async fn shutdown(&self) -> Result<(), MissiveError> {
        Ok(())
    }
}

#[async_trait]
impl EmailTransport for SmtpEmailTransport {
    async fn send_email(
        &self,
        destination: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), MissiveError> {
        let email = message::build_message(&self.from, destination, subject, body)?;
        let response = self
            .transport
            .send(email)
            .await
            .map_err(|e| MissiveError::Channel {
                message: format!("SMTP send failed: {e}"),
                source: Some(Box::new(e)),
            })?;
        debug!(code = %response.code(), host = %self.host, "SMTP accepted message");
        Ok(())
    }
}
