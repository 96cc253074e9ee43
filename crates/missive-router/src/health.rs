// SPDX-FileCopyrightText: 2026 Missive Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Periodic connectivity checks. The only writer of instance `status`.

use serde::Serialize;
use tracing::{debug, info, warn};

use missive_core::{ConnectionState, InstanceStatus, MissiveError};

use crate::router::InstanceRouter;

/// Outcome of one health check pass over the active instances.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub checked: usize,
    pub open: usize,
    pub errored: usize,
}

impl InstanceRouter {
    /// Query the gateway for every active instance and record the result.
    ///
    /// A reported `open` state marks the instance `open`; any other state or a
    /// failed query marks it `error` with the reason in `last_error`. Every
    /// checked instance gets `last_checked_at` stamped. A gateway failure for
    /// one instance does not stop the pass.
    pub async fn health_check(&self) -> Result<HealthReport, MissiveError> {
        let Some(gateway) = self.gateway.as_ref() else {
            debug!("no chat gateway configured, skipping instance health check");
            return Ok(HealthReport::default());
        };

        let mut report = HealthReport::default();
        for instance in self.storage.list_instances().await? {
            if !instance.active {
                continue;
            }
            report.checked += 1;

            let (status, error) = match gateway.connection_state(&instance.name).await {
                Ok(ConnectionState::Open) => (InstanceStatus::Open, None),
                Ok(ConnectionState::NotOpen(state)) => (
                    InstanceStatus::Error,
                    Some(format!("connection state is `{state}`")),
                ),
                Err(e) => (InstanceStatus::Error, Some(e.reason())),
            };

            self.storage
                .set_instance_status(instance.id, status, error.as_deref(), self.clock.now())
                .await?;

            match status {
                InstanceStatus::Open => report.open += 1,
                _ => report.errored += 1,
            }

            if status != instance.status {
                match &error {
                    Some(reason) => warn!(
                        instance = %instance.name,
                        from = instance.status.as_str(),
                        error = %reason,
                        "instance unhealthy"
                    ),
                    None => info!(
                        instance = %instance.name,
                        from = instance.status.as_str(),
                        "instance open"
                    ),
                }
            }
        }

        missive_prometheus::set_instances_open(report.open);
        debug!(
            checked = report.checked,
            open = report.open,
            errored = report.errored,
            "instance health check complete"
        );
        Ok(report)
    }
}
