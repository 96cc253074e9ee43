// SPDX-FileCopyrightText: 2026 Missive Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway wire types.

use serde::{Deserialize, Serialize};

/// Body of `POST /message/sendText/{instance}`.
#[derive(Debug, Clone, Serialize)]
pub struct SendTextRequest<'a> {
    pub number: &'a str,
    pub text: &'a str,
}

/// Body of `GET /instance/connectionState/{instance}`.
///
/// The state is nested under `instance`; some gateway versions return it at
/// the top level.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConnectionStateResponse {
    #[serde(default)]
    pub instance: Option<InstanceState>,
    #[serde(default)]
    pub state: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InstanceState {
    #[serde(default)]
    pub state: Option<String>,
}

impl ConnectionStateResponse {
    pub fn state(&self) -> Option<&str> {
        self.instance
            .as_ref()
            .and_then(|i| i.state.as_deref())
            .or(self.state.as_deref())
    }
}
