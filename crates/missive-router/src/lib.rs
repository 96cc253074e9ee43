// SPDX-FileCopyrightText: 2026 Missive Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider instance registry and router.
//!
//! Tracks the named gateway endpoints ("instances") chat messages go out
//! through, picks the least-used healthy one for each send, and keeps their
//! connectivity status fresh through periodic health checks.

pub mod health;
pub mod router;

pub use health::HealthReport;
pub use router::InstanceRouter;
