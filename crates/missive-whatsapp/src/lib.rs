// SPDX-FileCopyrightText: 2026 Missive Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat channel sender for a WhatsApp HTTP gateway.
//!
//! One gateway hosts many named instances (one per connected phone). Sends go
//! to `POST {base}/message/sendText/{instance}` and connectivity is read from
//! `GET {base}/instance/connectionState/{instance}`, both authenticated with
//! an `apikey` header.

pub mod client;
pub mod normalize;
pub mod types;

use async_trait::async_trait;

use missive_config::model::WhatsAppConfig;
use missive_core::{
    AdapterType, ChatGateway, ConnectionState, HealthStatus, MissiveError, PluginAdapter,
};

pub use client::GatewayClient;
pub use normalize::normalize_destination;

/// [`ChatGateway`] over the WhatsApp HTTP gateway.
pub struct WhatsAppGateway {
    client: GatewayClient,
    default_country_code: Option<String>,
}

impl WhatsAppGateway {
    /// Build the adapter from `[whatsapp]` config. Fails if `base_url` is unset.
    pub fn new(config: &WhatsAppConfig) -> Result<Self, MissiveError> {
        let base_url = config.base_url.as_deref().ok_or_else(|| {
            MissiveError::Config("whatsapp.base_url is required for the chat channel".into())
        })?;
        let client = GatewayClient::new(
            base_url,
            config.api_key.as_deref(),
            std::time::Duration::from_secs(config.timeout_secs),
        )?;
        Ok(Self {
            client,
            default_country_code: config.default_country_code.clone(),
        })
    }
}

#[async_trait]
impl PluginAdapter for WhatsAppGateway {
    fn name(&self) -> &str {
        "whatsapp"
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
impl ChatGateway for WhatsAppGateway {
    async fn send_text(
        &self,
        instance: &str,
        destination: &str,
        text: &str,
    ) -> Result<(), MissiveError> {
        let number = normalize_destination(destination, self.default_country_code.as_deref())?;
        self.client.send_text(instance, &number, text).await
    }

    async fn connection_state(&self, instance: &str) -> Result<ConnectionState, MissiveError> {
        self.client.connection_state(instance).await
    }
}
