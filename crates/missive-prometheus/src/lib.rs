// SPDX-FileCopyrightText: 2026 Missive Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prometheus metrics adapter for Missive.
//!
//! Uses the metrics-rs facade with the Prometheus exporter. Services call the
//! free functions in [`recording`]; the binary installs the exporter when
//! `[prometheus] enabled = true`.

pub mod recording;

use std::net::SocketAddr;

use async_trait::async_trait;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use missive_core::{AdapterType, HealthStatus, MissiveError, PluginAdapter};

pub use recording::{
    record_failed, record_no_capacity, record_rate_limit_check, record_send_duration,
    record_sent, record_stale_recovered, register_metrics, set_instances_open, set_queue_depth,
};

/// Prometheus metrics adapter.
///
/// Installs the Prometheus recorder globally and serves the scrape endpoint.
pub struct PrometheusAdapter {
    handle: PrometheusHandle,
    listen_address: SocketAddr,
}

impl PrometheusAdapter {
    /// Install the recorder and start the HTTP scrape listener on `listen_address`.
    ///
    /// Must be called from within a Tokio runtime. Only one recorder can be
    /// installed per process; a second call returns an error.
    pub fn install(listen_address: SocketAddr) -> Result<Self, MissiveError> {
        let (recorder, exporter) = PrometheusBuilder::new()
            .with_http_listener(listen_address)
            .build()
            .map_err(|e| {
                MissiveError::Internal(format!("failed to build Prometheus exporter: {e}"))
            })?;
        let handle = recorder.handle();
        metrics::set_global_recorder(recorder).map_err(|e| {
            MissiveError::Internal(format!("failed to install Prometheus recorder: {e}"))
        })?;

        tokio::spawn(async move {
            if let Err(e) = exporter.await {
                tracing::error!(error = ?e, "prometheus exporter stopped");
            }
        });

        recording::register_metrics();
        tracing::info!(%listen_address, "prometheus metrics exporter listening");

        Ok(Self {
            handle,
            listen_address,
        })
    }

    pub fn listen_address(&self) -> SocketAddr {
        self.listen_address
    }

    /// Render all collected metrics in Prometheus text format.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

#[async_trait]
impl PluginAdapter for PrometheusAdapter {
    fn name(&self) -> &str {
        "prometheus"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Observability
    }

    async fn health_check(&self) -> Result<HealthStatus, MissiveError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), MissiveError> {
        Ok(())
    }
}
