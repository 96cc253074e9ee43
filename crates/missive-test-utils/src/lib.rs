// SPDX-FileCopyrightText: 2026 Missive Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Missive integration tests.
//!
//! Provides mock channel adapters, a controllable clock and a temp-database
//! harness for fast, deterministic tests without external services.
//!
//! # Components
//!
//! - [`MockChatGateway`] - Scripted chat gateway capturing sends and serving connection states
//! - [`MockEmailTransport`] - Scripted email transport capturing sends
//! - [`ManualClock`] - Clock that only moves when told to
//! - [`TestHarness`] - Initialized SQLite storage in a temp dir plus a test-tuned config

pub mod clock;
pub mod harness;
pub mod mock_email;
pub mod mock_gateway;

pub use clock::ManualClock;
pub use harness::TestHarness;
pub use mock_email::{MockEmailTransport, SentEmail};
pub use mock_gateway::{MockChatGateway, SentText};
