// SPDX-FileCopyrightText: 2026 Missive Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable outbound message dispatch.
//!
//! - [`QueueStore`]: the persisted priority queue with atomic claim and
//!   backoff scheduling
//! - [`DispatchWorker`]: the single-flight send loop plus its maintenance timers
//! - [`Dispatcher`]: the producer-facing API
//! - [`shutdown`]: signal handling for the host process

pub mod maintenance;
pub mod queue;
pub mod service;
pub mod shutdown;
pub mod worker;

pub use queue::QueueStore;
pub use service::Dispatcher;
pub use worker::{DispatchWorker, Senders, TickOutcome, pacing_delay};
