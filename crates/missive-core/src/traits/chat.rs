// SPDX-FileCopyrightText: 2026 Missive Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat gateway trait for the external message provider.

use async_trait::async_trait;

use crate::error::MissiveError;
use crate::traits::adapter::PluginAdapter;
use crate::types::ConnectionState;

/// Adapter for the message provider gateway.
///
/// One gateway serves many named instances; every call names the instance
/// it goes through.
#[async_trait]
pub trait ChatGateway: PluginAdapter {
    /// Sends one text message. Failures carry a human-readable reason in
    /// [`MissiveError::Channel`].
    async fn send_text(
        &self,
        instance: &str,
        destination: &str,
        text: &str,
    ) -> Result<(), MissiveError>;

    /// Queries the connectivity state of a named instance.
    async fn connection_state(&self, instance: &str) -> Result<ConnectionState, MissiveError>;
}
