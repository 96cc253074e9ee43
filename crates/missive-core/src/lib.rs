// SPDX-FileCopyrightText: 2026 Missive Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Missive dispatch subsystem.
//!
//! This crate provides the error type, the domain types for queued messages,
//! provider instances and rate limits, and the adapter traits implemented by
//! storage and channel backends.

pub mod clock;
pub mod error;
pub mod traits;
pub mod types;

pub use clock::{Clock, SystemClock};
pub use error::MissiveError;
pub use types::{
    AdapterType, BackoffSchedule, Channel, ConnectionState, FailureOutcome, HealthStatus,
    Instance, InstanceStatus, InstanceUpdate, MessageStatus, NewMessage, QueueHealth,
    QueuedMessage, RateLimitDecision, RateLimitHit,
};

pub use traits::{ChatGateway, EmailTransport, PluginAdapter, StorageAdapter};
