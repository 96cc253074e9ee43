// SPDX-FileCopyrightText: 2026 Missive Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Uses the metrics-rs facade so any recorder (Prometheus, statsd, etc.)
//! can collect these metrics. Without an installed recorder every call is a no-op.

use metrics::{describe_counter, describe_gauge, describe_histogram};
use missive_core::{Channel, MessageStatus, QueueHealth};

/// Register all Missive metric descriptions.
///
/// Called once at startup after the recorder is installed.
pub fn register_metrics() {
    describe_counter!("missive_messages_sent_total", "Messages delivered");
    describe_counter!(
        "missive_messages_failed_total",
        "Failed delivery attempts, labelled by whether the failure was terminal"
    );
    describe_counter!(
        "missive_no_capacity_total",
        "Claims released because no instance was available"
    );
    describe_counter!(
        "missive_stale_recovered_total",
        "In-flight messages returned to pending by the stale sweep"
    );
    describe_counter!("missive_rate_limit_checks_total", "Rate limit checks");
    describe_gauge!("missive_queue_depth", "Queued messages by status");
    describe_gauge!("missive_instances_open", "Active instances reporting an open session");
    describe_histogram!(
        "missive_send_duration_seconds",
        "Time spent in a channel sender call"
    );
}

pub fn record_sent(channel: Channel) {
    metrics::counter!("missive_messages_sent_total", "channel" => channel.as_str()).increment(1);
}

pub fn record_failed(channel: Channel, terminal: bool) {
    let terminal = if terminal { "true" } else { "false" };
    metrics::counter!(
        "missive_messages_failed_total",
        "channel" => channel.as_str(),
        "terminal" => terminal
    )
    .increment(1);
}

pub fn record_no_capacity() {
    metrics::counter!("missive_no_capacity_total").increment(1);
}

pub fn record_stale_recovered(count: u64) {
    metrics::counter!("missive_stale_recovered_total").increment(count);
}

pub fn record_rate_limit_check(allowed: bool) {
    let allowed = if allowed { "true" } else { "false" };
    metrics::counter!("missive_rate_limit_checks_total", "allowed" => allowed).increment(1);
}

/// Publish one gauge per message status.
pub fn set_queue_depth(health: &QueueHealth) {
    let depths = [
        (MessageStatus::Pending, health.pending),
        (MessageStatus::InFlight, health.in_flight),
        (MessageStatus::Sent, health.sent),
        (MessageStatus::Failed, health.failed),
    ];
    for (status, depth) in depths {
        metrics::gauge!("missive_queue_depth", "status" => status.as_str()).set(depth as f64);
    }
}

pub fn set_instances_open(count: usize) {
    metrics::gauge!("missive_instances_open").set(count as f64);
}

pub fn record_send_duration(channel: Channel, seconds: f64) {
    metrics::histogram!("missive_send_duration_seconds", "channel" => channel.as_str())
        .record(seconds);
}
