// SPDX-FileCopyrightText: 2026 Missive Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Email transport trait.

use async_trait::async_trait;

use crate::error::MissiveError;
use crate::traits::adapter::PluginAdapter;

/// Adapter for outbound email delivery.
#[async_trait]
pub trait EmailTransport: PluginAdapter {
    async fn send_email(
        &self,
        destination: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), MissiveError>;
}
