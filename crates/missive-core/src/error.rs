// SPDX-FileCopyrightText: 2026 Missive Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Missive dispatch subsystem.

use thiserror::Error;

/// The primary error type used across all Missive adapter traits and services.
#[derive(Debug, Error)]
pub enum MissiveError {
    /// Configuration or input validation errors.
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, migration).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Channel sender errors (gateway rejection, SMTP failure, bad destination).
    ///
    /// `message` is human readable and ends up in `last_error`.
    #[error("channel error: {message}")]
    Channel {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A referenced row does not exist (or is not in the expected state).
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A uniqueness constraint would be violated.
    #[error("conflict: {0}")]
    Conflict(String),

    /// An instance connectivity check failed.
    #[error("health check failed for {name}: {source}")]
    HealthCheckFailed {
        name: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl MissiveError {
    /// Shorthand for a channel error without an underlying source.
    pub fn channel(message: impl Into<String>) -> Self {
        MissiveError::Channel {
            message: message.into(),
            source: None,
        }
    }

    /// Human-readable reason recorded against a message or instance.
    ///
    /// Channel errors surface the bare provider message; everything else
    /// uses the full display form.
    pub fn reason(&self) -> String {
        match self {
            MissiveError::Channel { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}
