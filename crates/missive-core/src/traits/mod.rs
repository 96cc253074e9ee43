// SPDX-FileCopyrightText: 2026 Missive Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions.
//!
//! All adapters extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod chat;
pub mod email;
pub mod storage;

pub use adapter::PluginAdapter;
pub use chat::ChatGateway;
pub use email::EmailTransport;
pub use storage::StorageAdapter;
