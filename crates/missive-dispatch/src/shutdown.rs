// SPDX-FileCopyrightText: 2026 Missive Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Graceful shutdown coordination with signal handling.
//!
//! Installs handlers for SIGTERM and SIGINT (Ctrl+C), triggering a
//! [`CancellationToken`] the host process waits on before stopping the
//! dispatch worker.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::worker::DispatchWorker;

/// Installs signal handlers for SIGTERM and SIGINT.
///
/// Returns a [`CancellationToken`] that is cancelled when either signal is received.
/// The signal handler task runs in the background until the token is cancelled.
pub fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            let mut sigterm =
                signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");

            tokio::select! {
                _ = ctrl_c => {
                    info!("received SIGINT (Ctrl+C), initiating shutdown");
                }
                _ = sigterm.recv() => {
                    info!("received SIGTERM, initiating shutdown");
                }
                _ = token_clone.cancelled() => {}
            }
        }

        #[cfg(not(unix))]
        {
            tokio::select! {
                _ = ctrl_c => info!("received Ctrl+C, initiating shutdown"),
                _ = token_clone.cancelled() => {}
            }
        }

        token_clone.cancel();
        debug!("shutdown signal handler completed");
    });

    token
}

/// Stops the worker, waiting up to `timeout` for its tasks to wind down.
///
/// Returns `false` if the deadline passed first; any message still claimed
/// at that point is healed later by the stale sweep.
pub async fn drain_worker(worker: &DispatchWorker, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, worker.stop()).await {
        Ok(_) => {
            info!("dispatch worker drained");
            true
        }
        Err(_) => {
            warn!(
                timeout_secs = timeout.as_secs(),
                "timeout reached, dispatch worker interrupted"
            );
            false
        }
    }
}
