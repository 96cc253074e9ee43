// SPDX-FileCopyrightText: 2026 Missive Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plain-text message construction.

use lettre::Message;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;

use missive_core::MissiveError;

pub fn parse_mailbox(address: &str) -> Result<Mailbox, MissiveError> {
    address.trim().parse::<Mailbox>().map_err(|e| MissiveError::Channel {
        message: format!("invalid email address `{address}`: {e}"),
        source: Some(Box::new(e)),
    })
}

/// Build a `text/plain` message from `from` to `destination`.
pub fn build_message(
    from: &Mailbox,
    destination: &str,
    subject: &str,
    body: &str,
) -> Result<Message, MissiveError> {
    Message::builder()
        .from(from.clone())
        .to(parse_mailbox(destination)?)
        .subject(subject)
        .header(ContentType::TEXT_PLAIN)
        .body(body.to_string())
        .map_err(|e| MissiveError::Channel {
            message: format!("failed to build email: {e}"),
            source: Some(Box::new(e)),
        })
}
