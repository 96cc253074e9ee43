// SPDX-FileCopyrightText: 2026 Missive Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the WhatsApp gateway.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{StatusCode, Url};
use tracing::debug;

use missive_core::{ConnectionState, MissiveError};

use crate::types::{ConnectionStateResponse, SendTextRequest};

/// Longest slice of an error body kept in `last_error`.
const MAX_ERROR_BODY: usize = 256;

#[derive(Debug, Clone)]
pub struct GatewayClient {
    client: reqwest::Client,
    base_url: Url,
}

impl GatewayClient {
    pub fn new(
        base_url: &str,
        api_key: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, MissiveError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| MissiveError::Config(format!("invalid gateway base URL: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(MissiveError::Config(format!(
                "gateway base URL `{base_url}` cannot carry a path"
            )));
        }

        let mut headers = HeaderMap::new();
        if let Some(key) = api_key {
            headers.insert(
                "apikey",
                HeaderValue::from_str(key).map_err(|e| {
                    MissiveError::Config(format!("invalid gateway API key header value: {e}"))
                })?,
            );
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| MissiveError::Channel {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self { client, base_url })
    }

    pub async fn send_text(
        &self,
        instance: &str,
        number: &str,
        text: &str,
    ) -> Result<(), MissiveError> {
        let url = self.endpoint(&["message", "sendText", instance])?;
        let response = self
            .client
            .post(url)
            .json(&SendTextRequest { number, text })
            .send()
            .await
            .map_err(request_failed)?;

        let status = response.status();
        debug!(%status, instance, "sendText response received");
        if status.is_success() {
            return Ok(());
        }
        Err(status_error(status, response.text().await.unwrap_or_default()))
    }

    pub async fn connection_state(&self, instance: &str) -> Result<ConnectionState, MissiveError> {
        let url = self.endpoint(&["instance", "connectionState", instance])?;
        let response = self.client.get(url).send().await.map_err(request_failed)?;

        let status = response.status();
        debug!(%status, instance, "connectionState response received");
        if !status.is_success() {
            return Err(status_error(status, response.text().await.unwrap_or_default()));
        }

        let body: ConnectionStateResponse =
            response.json().await.map_err(|e| MissiveError::Channel {
                message: format!("invalid connectionState response: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(match body.state() {
            Some(state) => ConnectionState::from_state(state),
            None => ConnectionState::NotOpen("missing state".into()),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, MissiveError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| MissiveError::Config("gateway base URL cannot carry a path".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

fn request_failed(e: reqwest::Error) -> MissiveError {
    MissiveError::Channel {
        message: format!("gateway request failed: {e}"),
        source: Some(Box::new(e)),
    }
}

fn status_error(status: StatusCode, body: String) -> MissiveError {
    let body: String = body.chars().take(MAX_ERROR_BODY).collect();
    MissiveError::channel(format!("gateway returned {status}: {body}"))
}
