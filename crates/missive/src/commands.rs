// SPDX-FileCopyrightText: 2026 Missive Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Producer and operator subcommands.
//!
//! Each command opens the database, runs one operation and prints the result
//! as JSON on stdout.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use missive_config::model::MissiveConfig;
use missive_core::{ChatGateway, InstanceUpdate, MissiveError, NewMessage, SystemClock};
use missive_dispatch::Dispatcher;

use crate::serve::{build_gateway, open_storage};
use crate::{
    ConfigCommand, EnqueueCommand, EnqueueOptions, InstancesCommand, QueueCommand,
    RateLimitCommand,
};

const REDACTED: &str = "<redacted>";

pub async fn enqueue(config: &MissiveConfig, command: EnqueueCommand) -> Result<(), MissiveError> {
    let (message, options) = match command {
        EnqueueCommand::Chat {
            destination,
            body,
            options,
        } => (NewMessage::chat(destination, body), options),
        EnqueueCommand::Email {
            destination,
            subject,
            body,
            options,
        } => (NewMessage::email(destination, subject, body), options),
    };
    let message = apply_options(message, &options);

    with_dispatcher(config, false, |dispatcher| async move {
        let id = dispatcher.enqueue(message).await?;
        print_json(&serde_json::json!({ "id": id }))
    })
    .await
}

fn apply_options(message: NewMessage, options: &EnqueueOptions) -> NewMessage {
    let message = message.with_priority(options.priority);
    match options.max_attempts {
        Some(n) => message.with_max_attempts(n),
        None => message,
    }
}

pub async fn queue(config: &MissiveConfig, command: QueueCommand) -> Result<(), MissiveError> {
    with_dispatcher(config, false, |dispatcher| async move {
        let queue = dispatcher.queue();
        match command {
            QueueCommand::Health => print_json(&queue.health().await?),
            QueueCommand::List { status, limit } => print_json(&queue.list(status, limit).await?),
            QueueCommand::Get { id } => print_json(&queue.get(id).await?),
            QueueCommand::Purge { retention_days } => {
                let days = retention_days.unwrap_or(queue.retention_days());
                let purged = queue.purge_old(days).await?;
                print_json(&serde_json::json!({ "purged": purged, "retention_days": days }))
            }
            QueueCommand::Recover => {
                let recovered = queue.recover_stale().await?;
                print_json(&serde_json::json!({ "recovered": recovered }))
            }
        }
    })
    .await
}

pub async fn instances(
    config: &MissiveConfig,
    command: InstancesCommand,
) -> Result<(), MissiveError> {
    let needs_gateway = matches!(command, InstancesCommand::Check);
    with_dispatcher(config, needs_gateway, |dispatcher| async move {
        match command {
            InstancesCommand::List => print_json(&dispatcher.list_instances().await?),
            InstancesCommand::Add { name, description } => print_json(
                &dispatcher
                    .create_instance(&name, description.as_deref())
                    .await?,
            ),
            InstancesCommand::Update {
                id,
                description,
                enable,
                disable,
            } => {
                let update = InstanceUpdate {
                    description,
                    active: active_flag(enable, disable),
                };
                print_json(&dispatcher.update_instance(id, &update).await?)
            }
            InstancesCommand::Remove { id } => {
                dispatcher.remove_instance(id).await?;
                print_json(&serde_json::json!({ "removed": id }))
            }
            InstancesCommand::Check => print_json(&dispatcher.router().health_check().await?),
            InstancesCommand::ResetDaily => {
                let reset = dispatcher.router().reset_daily_counters().await?;
                print_json(&serde_json::json!({ "reset": reset }))
            }
        }
    })
    .await
}

fn active_flag(enable: bool, disable: bool) -> Option<bool> {
    match (enable, disable) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

pub async fn rate_limit(
    config: &MissiveConfig,
    command: RateLimitCommand,
) -> Result<(), MissiveError> {
    let RateLimitCommand::Check {
        key,
        max,
        window_secs,
    } = command;
    with_dispatcher(config, false, |dispatcher| async move {
        let decision = dispatcher
            .check_rate_limit(&key, max, Duration::from_secs(window_secs))
            .await?;
        print_json(&decision)
    })
    .await
}

pub fn config(config: &MissiveConfig, command: ConfigCommand) -> Result<(), MissiveError> {
    match command {
        ConfigCommand::Check => {
            let rendered = toml::to_string_pretty(&redacted(config))
                .map_err(|e| MissiveError::Internal(format!("failed to render config: {e}")))?;
            eprintln!("configuration is valid");
            println!("{rendered}");
            Ok(())
        }
    }
}

/// Copy of `config` with credentials replaced.
fn redacted(config: &MissiveConfig) -> MissiveConfig {
    let mut config = config.clone();
    if config.whatsapp.api_key.is_some() {
        config.whatsapp.api_key = Some(REDACTED.to_string());
    }
    if config.email.password.is_some() {
        config.email.password = Some(REDACTED.to_string());
    }
    config
}

/// Open storage, build a [`Dispatcher`], run `f`, then close storage even
/// when `f` fails.
async fn with_dispatcher<F, Fut>(
    config: &MissiveConfig,
    with_gateway: bool,
    f: F,
) -> Result<(), MissiveError>
where
    F: FnOnce(Dispatcher) -> Fut,
    Fut: std::future::Future<Output = Result<(), MissiveError>>,
{
    let storage = open_storage(config).await?;
    let gateway = if with_gateway {
        build_gateway(config)?.map(|g| g as Arc<dyn ChatGateway>)
    } else {
        None
    };
    let dispatcher = Dispatcher::new(storage.clone(), gateway, Arc::new(SystemClock), config)?;
    let result = f(dispatcher).await;
    if let Err(e) = storage.close().await {
        tracing::warn!(error = %e, "error closing storage");
    }
    result
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), MissiveError> {
    let out = serde_json::to_string_pretty(value)
        .map_err(|e| MissiveError::Internal(format!("failed to serialize output: {e}")))?;
    println!("{out}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_are_redacted() {
        let mut config = MissiveConfig::default();
        config.whatsapp.api_key = Some("secret-key".into());
        config.email.password = Some("hunter2".into());

        let out = redacted(&config);
        assert_eq!(out.whatsapp.api_key.as_deref(), Some(REDACTED));
        assert_eq!(out.email.password.as_deref(), Some(REDACTED));

        let rendered = toml::to_string_pretty(&out).unwrap();
        assert!(!rendered.contains("secret-key"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn unset_credentials_stay_unset() {
        let out = redacted(&MissiveConfig::default());
        assert!(out.whatsapp.api_key.is_none());
        assert!(out.email.password.is_none());
    }

    #[test]
    fn enable_disable_flags() {
        assert_eq!(active_flag(true, false), Some(true));
        assert_eq!(active_flag(false, true), Some(false));
        assert_eq!(active_flag(false, false), None);
    }

    #[test]
    fn options_apply_priority_and_budget() {
        let options = EnqueueOptions {
            priority: 7,
            max_attempts: Some(1),
        };
        let message = apply_options(NewMessage::chat("5511999990000", "hi"), &options);
        assert_eq!(message.priority, 7);
        assert_eq!(message.max_attempts, Some(1));
    }

    #[tokio::test]
    async fn enqueue_then_inspect_against_temp_database() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = MissiveConfig::default();
        config.storage.database_path = dir.path().join("cli.db").display().to_string();

        enqueue(
            &config,
            EnqueueCommand::Chat {
                destination: "5511999990000".into(),
                body: "reminder".into(),
                options: EnqueueOptions {
                    priority: 0,
                    max_attempts: None,
                },
            },
        )
        .await
        .unwrap();

        with_dispatcher(&config, false, |dispatcher| async move {
            let health = dispatcher.queue_health().await?;
            assert_eq!(health.pending, 1);
            Ok(())
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn get_missing_message_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = MissiveConfig::default();
        config.storage.database_path = dir.path().join("cli.db").display().to_string();

        let err = queue(&config, QueueCommand::Get { id: 42 }).await.unwrap_err();
        assert!(matches!(err, MissiveError::NotFound { .. }));
    }
}
