// SPDX-FileCopyrightText: 2026 Missive Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Missive - durable outbound notification dispatch.
//!
//! This is the binary entry point: `serve` runs the dispatch worker, the other
//! subcommands are the producer and operator surface.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod commands;
mod serve;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use missive_core::MessageStatus;

/// Missive - durable outbound notification dispatch.
#[derive(Parser, Debug)]
#[command(name = "missive", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the dispatch worker until SIGINT/SIGTERM.
    Serve,
    /// Queue a message for delivery.
    Enqueue {
        #[command(subcommand)]
        message: EnqueueCommand,
    },
    /// Inspect and maintain the outbound queue.
    Queue {
        #[command(subcommand)]
        action: QueueCommand,
    },
    /// Manage provider instances.
    Instances {
        #[command(subcommand)]
        action: InstancesCommand,
    },
    /// Query the rate limiter.
    RateLimit {
        #[command(subcommand)]
        action: RateLimitCommand,
    },
    /// Validate configuration.
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
}

#[derive(Args, Debug)]
struct EnqueueOptions {
    /// Higher priority messages are sent first.
    #[arg(long, default_value_t = 0)]
    priority: i64,
    /// Override the configured retry budget for this message.
    #[arg(long)]
    max_attempts: Option<u32>,
}

#[derive(Subcommand, Debug)]
enum EnqueueCommand {
    /// A chat message to a phone number.
    Chat {
        destination: String,
        body: String,
        #[command(flatten)]
        options: EnqueueOptions,
    },
    /// An email.
    Email {
        destination: String,
        #[arg(long, short)]
        subject: String,
        body: String,
        #[command(flatten)]
        options: EnqueueOptions,
    },
}

#[derive(Subcommand, Debug)]
enum QueueCommand {
    /// Counts per status and the age of the oldest eligible message.
    Health,
    /// Newest messages first.
    List {
        #[arg(long, value_parser = parse_status)]
        status: Option<MessageStatus>,
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    /// Show one message.
    Get { id: i64 },
    /// Delete sent and failed messages past retention.
    Purge {
        /// Defaults to `queue.retention_days`.
        #[arg(long)]
        retention_days: Option<u32>,
    },
    /// Return stale in-flight messages to pending.
    Recover,
}

#[derive(Subcommand, Debug)]
enum InstancesCommand {
    List,
    Add {
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    Update {
        id: i64,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, conflicts_with = "disable")]
        enable: bool,
        #[arg(long)]
        disable: bool,
    },
    Remove { id: i64 },
    /// Run a health check against the gateway now.
    Check,
    /// Zero every instance's daily counter.
    ResetDaily,
}

#[derive(Subcommand, Debug)]
enum RateLimitCommand {
    /// Count one attempt against KEY and print the decision.
    Check {
        key: String,
        #[arg(long)]
        max: u32,
        #[arg(long)]
        window_secs: u64,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Load, validate and print the effective configuration (secrets redacted).
    Check,
}

fn parse_status(raw: &str) -> Result<MessageStatus, String> {
    raw.parse::<MessageStatus>()
        .map_err(|_| format!("unknown status `{raw}` (pending, in_flight, sent, failed)"))
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => missive_config::load_and_validate_path(path),
        None => missive_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            missive_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    serve::init_tracing(&config.daemon.log_level);

    let result = match cli.command {
        Commands::Serve => serve::run_serve(config).await,
        Commands::Enqueue { message } => commands::enqueue(&config, message).await,
        Commands::Queue { action } => commands::queue(&config, action).await,
        Commands::Instances { action } => commands::instances(&config, action).await,
        Commands::RateLimit { action } => commands::rate_limit(&config, action).await,
        Commands::Config { action } => commands::config(&config, action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_enqueue_email() {
        let cli = Cli::try_parse_from([
            "missive",
            "enqueue",
            "email",
            "owner@example.com",
            "--subject",
            "Appointment",
            "Tomorrow 10:00",
            "--priority",
            "5",
        ])
        .unwrap();
        match cli.command {
            Commands::Enqueue {
                message:
                    EnqueueCommand::Email {
                        destination,
                        subject,
                        body,
                        options,
                    },
            } => {
                assert_eq!(destination, "owner@example.com");
                assert_eq!(subject, "Appointment");
                assert_eq!(body, "Tomorrow 10:00");
                assert_eq!(options.priority, 5);
                assert!(options.max_attempts.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_queue_list_status() {
        let cli =
            Cli::try_parse_from(["missive", "queue", "list", "--status", "in_flight"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Queue {
                action: QueueCommand::List {
                    status: Some(MessageStatus::InFlight),
                    limit: 20
                }
            }
        ));
        assert!(Cli::try_parse_from(["missive", "queue", "list", "--status", "lost"]).is_err());
    }

    #[test]
    fn enable_and_disable_conflict() {
        assert!(
            Cli::try_parse_from(["missive", "instances", "update", "1", "--enable", "--disable"])
                .is_err()
        );
    }

    #[test]
    fn rate_limit_check_requires_bounds() {
        assert!(Cli::try_parse_from(["missive", "rate-limit", "check", "otp:ip:1"]).is_err());
        let cli = Cli::try_parse_from([
            "missive",
            "rate-limit",
            "check",
            "otp:ip:1",
            "--max",
            "5",
            "--window-secs",
            "900",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::RateLimit {
                action: RateLimitCommand::Check { max: 5, window_secs: 900, .. }
            }
        ));
    }
}
