// SPDX-FileCopyrightText: 2026 Missive Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `missive serve` command implementation.
//!
//! Opens storage, wires the configured chat gateway and email transport into
//! the dispatch worker, and runs until SIGINT/SIGTERM.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use missive_config::model::MissiveConfig;
use missive_core::{
    ChatGateway, Clock, EmailTransport, MissiveError, PluginAdapter, StorageAdapter, SystemClock,
};
use missive_dispatch::{Dispatcher, Senders, shutdown};
use missive_email::SmtpEmailTransport;
use missive_prometheus::PrometheusAdapter;
use missive_storage::SqliteStorage;
use missive_whatsapp::WhatsAppGateway;
use tracing::{error, info, warn};

/// Upper bound on how long shutdown waits for an in-progress send.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs the `missive serve` command.
pub async fn run_serve(config: MissiveConfig) -> Result<(), MissiveError> {
    info!(
        database = %config.storage.database_path,
        "starting missive serve"
    );

    let storage = open_storage(&config).await?;

    let _metrics = if config.prometheus.enabled {
        let addr: SocketAddr = config.prometheus.listen_address.parse().map_err(|e| {
            MissiveError::Config(format!(
                "invalid prometheus.listen_address `{}`: {e}",
                config.prometheus.listen_address
            ))
        })?;
        Some(PrometheusAdapter::install(addr)?)
    } else {
        None
    };

    let gateway = build_gateway(&config)?;
    let email = build_email(&config)?;
    if gateway.is_none() && email.is_none() {
        warn!("no chat gateway or SMTP relay configured; every message will fail");
    }
    if let Some(transport) = &email {
        match transport.health_check().await {
            Ok(status) => info!(?status, "smtp relay reachable"),
            Err(e) => warn!(error = %e, "smtp health check failed"),
        }
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let dispatcher = Dispatcher::new(
        storage.clone(),
        gateway.clone().map(|g| g as Arc<dyn ChatGateway>),
        clock,
        &config,
    )?;

    let senders = Senders {
        chat: gateway.map(|g| g as Arc<dyn ChatGateway>),
        email: email.map(|e| e as Arc<dyn EmailTransport>),
    };
    let worker = dispatcher.worker(senders, &config);

    let cancel = shutdown::install_signal_handler();
    worker.start();
    info!("missive dispatch worker running");

    cancel.cancelled().await;

    if !shutdown::drain_worker(&worker, DRAIN_TIMEOUT).await {
        warn!("dispatch worker did not stop within the drain timeout");
    }

    if let Err(e) = storage.close().await {
        error!(error = %e, "error closing storage");
    }

    info!("missive serve stopped");
    Ok(())
}

/// Open and migrate the configured database.
pub async fn open_storage(config: &MissiveConfig) -> Result<Arc<dyn StorageAdapter>, MissiveError> {
    let storage = SqliteStorage::new(config.storage.clone());
    storage.initialize().await?;
    Ok(Arc::new(storage))
}

/// The chat gateway, when `whatsapp.base_url` is configured.
pub fn build_gateway(config: &MissiveConfig) -> Result<Option<Arc<WhatsAppGateway>>, MissiveError> {
    if config.whatsapp.base_url.is_none() {
        return Ok(None);
    }
    let gateway = WhatsAppGateway::new(&config.whatsapp)?;
    info!(gateway = gateway.name(), "chat gateway configured");
    Ok(Some(Arc::new(gateway)))
}

/// The SMTP transport, when `email.smtp_host` is configured.
pub fn build_email(config: &MissiveConfig) -> Result<Option<Arc<SmtpEmailTransport>>, MissiveError> {
    if config.email.smtp_host.is_none() {
        return Ok(None);
    }
    let transport = SmtpEmailTransport::new(&config.email)?;
    info!(transport = transport.name(), "email transport configured");
    Ok(Some(Arc::new(transport)))
}

/// Initialize the tracing subscriber. Logs go to stderr so command output on
/// stdout stays machine-readable.
pub fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("missive={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
