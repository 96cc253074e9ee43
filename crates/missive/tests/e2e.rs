// SPDX-FileCopyrightText: 2026 Missive Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests for the dispatch pipeline.
//!
//! Each test creates an isolated TestHarness with a temp SQLite database, a
//! manual clock and mock channels. Tests are independent and order-insensitive.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::TimeZone;
use missive_core::{
    ChatGateway, Clock, EmailTransport, InstanceUpdate, MessageStatus, NewMessage, StorageAdapter,
};
use missive_dispatch::{DispatchWorker, Dispatcher, Senders, TickOutcome};
use missive_storage::SqliteStorage;
use missive_test_utils::{MockChatGateway, MockEmailTransport, TestHarness};

struct Pipeline {
    harness: TestHarness,
    dispatcher: Dispatcher,
    gateway: Arc<MockChatGateway>,
    email: Arc<MockEmailTransport>,
    worker: DispatchWorker,
}

fn pipeline(harness: TestHarness) -> Pipeline {
    let gateway = Arc::new(MockChatGateway::new());
    let email = Arc::new(MockEmailTransport::new());
    let dispatcher = Dispatcher::new(
        harness.storage_dyn(),
        Some(gateway.clone() as Arc<dyn ChatGateway>),
        harness.clock_dyn(),
        &harness.config,
    )
    .unwrap();
    let worker = dispatcher.worker(
        Senders {
            chat: Some(gateway.clone() as Arc<dyn ChatGateway>),
            email: Some(email.clone() as Arc<dyn EmailTransport>),
        },
        &harness.config,
    );
    Pipeline {
        harness,
        dispatcher,
        gateway,
        email,
        worker,
    }
}

// ---- Test 1: Retry schedule through to terminal failure ----

#[tokio::test]
async fn test_three_failures_follow_backoff_then_fail() {
    let harness = TestHarness::builder()
        .with_max_attempts(3)
        .with_backoff_secs(vec![30, 120, 300])
        .build()
        .await
        .unwrap();
    let p = pipeline(harness);
    p.dispatcher.create_instance("main", None).await.unwrap();

    let id = p
        .dispatcher
        .enqueue(NewMessage::chat("5511999990000", "Appointment tomorrow at 10:00"))
        .await
        .unwrap();
    let queue = p.dispatcher.queue();

    let msg = queue.get(id).await.unwrap();
    assert_eq!(msg.status, MessageStatus::Pending);
    assert_eq!(msg.attempts, 0);
    assert_eq!(msg.max_attempts, 3);
    assert_eq!(msg.next_attempt_at, p.harness.clock.now());

    // The first attempt is observed in flight while the gateway is busy.
    p.gateway.fail_next("gateway returned 503: attempt 1").await;
    p.gateway
        .set_send_delay(Some(Duration::from_millis(200)))
        .await;
    let worker = Arc::new(p.worker);
    let ticking = {
        let worker = worker.clone();
        tokio::spawn(async move { worker.tick().await })
    };
    p.gateway.wait_for_attempts(1).await;
    let msg = queue.get(id).await.unwrap();
    assert_eq!(msg.status, MessageStatus::InFlight);
    assert_eq!(msg.claimed_at, Some(p.harness.clock.now()));

    let outcome = ticking.await.unwrap().unwrap();
    assert_eq!(
        outcome,
        TickOutcome::Failed {
            message_id: id,
            terminal: false
        }
    );
    p.gateway.set_send_delay(None).await;

    let msg = queue.get(id).await.unwrap();
    assert_eq!(msg.status, MessageStatus::Pending);
    assert_eq!(msg.attempts, 1);
    assert_eq!(msg.last_error.as_deref(), Some("gateway returned 503: attempt 1"));
    assert_eq!(
        msg.next_attempt_at,
        p.harness.clock.now() + chrono::Duration::seconds(30)
    );

    // Not eligible before the delay elapses.
    assert_eq!(worker.tick().await.unwrap(), TickOutcome::Idle);

    p.harness.clock.advance_secs(30);
    p.gateway.fail_next("gateway returned 503: attempt 2").await;
    assert_eq!(
        worker.tick().await.unwrap(),
        TickOutcome::Failed {
            message_id: id,
            terminal: false
        }
    );
    let msg = queue.get(id).await.unwrap();
    assert_eq!(msg.status, MessageStatus::Pending);
    assert_eq!(msg.attempts, 2);
    assert_eq!(
        msg.next_attempt_at,
        p.harness.clock.now() + chrono::Duration::seconds(120)
    );

    p.harness.clock.advance_secs(120);
    p.gateway.fail_next("gateway returned 503: attempt 3").await;
    assert_eq!(
        worker.tick().await.unwrap(),
        TickOutcome::Failed {
            message_id: id,
            terminal: true
        }
    );
    let msg = queue.get(id).await.unwrap();
    assert_eq!(msg.status, MessageStatus::Failed);
    assert_eq!(msg.attempts, 3);
    assert_eq!(msg.last_error.as_deref(), Some("gateway returned 503: attempt 3"));
    assert!(msg.sent_at.is_none());

    // Terminal rows are never picked up again.
    p.harness.clock.advance_secs(3600);
    assert_eq!(worker.tick().await.unwrap(), TickOutcome::Idle);
    assert_eq!(p.gateway.attempts().await.len(), 3);

    let health = p.dispatcher.queue_health().await.unwrap();
    assert_eq!(health.failed, 1);
    assert_eq!(health.pending, 0);
}

#[tokio::test]
async fn test_retry_succeeds_after_transient_failure() {
    let harness = TestHarness::builder()
        .with_backoff_secs(vec![30])
        .build()
        .await
        .unwrap();
    let p = pipeline(harness);
    let inst = p.dispatcher.create_instance("main", None).await.unwrap();
    let id = p
        .dispatcher
        .enqueue(NewMessage::chat("5511999990000", "code 4821"))
        .await
        .unwrap();

    p.gateway.fail_next("gateway request failed: connection reset").await;
    p.worker.tick().await.unwrap();
    p.harness.clock.advance_secs(30);
    assert_eq!(
        p.worker.tick().await.unwrap(),
        TickOutcome::Sent { message_id: id }
    );

    let msg = p.dispatcher.queue().get(id).await.unwrap();
    assert_eq!(msg.status, MessageStatus::Sent);
    assert_eq!(msg.attempts, 1);

    let inst = p.dispatcher.router().get_instance(inst.id).await.unwrap();
    assert_eq!(inst.messages_sent_total, 1);
    // The earlier send failure is kept for the operator.
    assert_eq!(
        inst.last_error.as_deref(),
        Some("gateway request failed: connection reset")
    );
}

// ---- Test 2: Backoff monotonicity ----

#[tokio::test]
async fn test_backoff_deltas_are_non_decreasing_and_clamped() {
    let harness = TestHarness::builder()
        .with_max_attempts(6)
        .with_backoff_secs(vec![10, 60, 60, 600])
        .build()
        .await
        .unwrap();
    let queue = Arc::new(
        missive_dispatch::QueueStore::new(
            harness.storage_dyn(),
            harness.clock_dyn(),
            &harness.config.queue,
        )
        .unwrap(),
    );
    let id = queue
        .enqueue(NewMessage::email("owner@example.com", "Reminder", "See you"))
        .await
        .unwrap();

    let mut deltas = Vec::new();
    for attempt in 1..=6u32 {
        let claimed = queue.claim_next().await.unwrap().expect("message eligible");
        assert_eq!(claimed.id, id);
        let failed_at = harness.clock.now();
        let outcome = queue.mark_failed(id, "smtp 451").await.unwrap();
        let msg = queue.get(id).await.unwrap();
        assert_eq!(msg.attempts, attempt);

        if attempt < 6 {
            assert!(!outcome.is_terminal(), "failed early at attempt {attempt}");
            assert_eq!(msg.status, MessageStatus::Pending);
            let delta = (msg.next_attempt_at - failed_at).num_seconds();
            deltas.push(delta);
            harness.clock.set(msg.next_attempt_at);
        } else {
            assert!(outcome.is_terminal());
            assert_eq!(msg.status, MessageStatus::Failed);
        }
    }

    assert_eq!(deltas, vec![10, 60, 60, 600, 600]);
    assert!(deltas.windows(2).all(|w| w[0] <= w[1]));
}

// ---- Test 3: No capacity does not burn attempts ----

#[tokio::test]
async fn test_no_capacity_keeps_attempts_and_schedule() {
    let harness = TestHarness::new().await.unwrap();
    let p = pipeline(harness);
    let id = p
        .dispatcher
        .enqueue(NewMessage::chat("5511999990000", "no instance yet"))
        .await
        .unwrap();
    let before = p.dispatcher.queue().get(id).await.unwrap();

    for _ in 0..3 {
        assert_eq!(
            p.worker.tick().await.unwrap(),
            TickOutcome::NoCapacity { message_id: id }
        );
    }

    let after = p.dispatcher.queue().get(id).await.unwrap();
    assert_eq!(after.status, MessageStatus::Pending);
    assert_eq!(after.attempts, 0);
    assert_eq!(after.next_attempt_at, before.next_attempt_at);
    assert!(after.last_error.is_none());
    assert!(p.gateway.attempts().await.is_empty());

    // An errored instance is not capacity either.
    let inst = p.dispatcher.create_instance("main", None).await.unwrap();
    p.gateway.set_state_error("main", "gateway returned 404: instance not found").await;
    p.dispatcher.router().health_check().await.unwrap();
    assert_eq!(
        p.worker.tick().await.unwrap(),
        TickOutcome::NoCapacity { message_id: id }
    );

    // Recovery makes it eligible again.
    p.gateway.set_state("main", "open").await;
    p.dispatcher.router().health_check().await.unwrap();
    assert_eq!(
        p.worker.tick().await.unwrap(),
        TickOutcome::Sent { message_id: id }
    );
    let sent = p.gateway.sent_messages().await;
    assert_eq!(sent[0].instance, inst.name);
}

#[tokio::test]
async fn test_inactive_instances_are_never_selected() {
    let harness = TestHarness::new().await.unwrap();
    let p = pipeline(harness);
    let inst = p.dispatcher.create_instance("main", None).await.unwrap();
    p.dispatcher
        .update_instance(
            inst.id,
            &InstanceUpdate {
                description: None,
                active: Some(false),
            },
        )
        .await
        .unwrap();
    let id = p
        .dispatcher
        .enqueue(NewMessage::chat("5511999990000", "hello"))
        .await
        .unwrap();
    assert_eq!(
        p.worker.tick().await.unwrap(),
        TickOutcome::NoCapacity { message_id: id }
    );
}

// ---- Test 4: Atomic claim across connections ----

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_claims_are_disjoint() {
    let harness = TestHarness::new().await.unwrap();
    let now = harness.clock.now();
    let messages = 12;
    for i in 0..messages {
        harness
            .storage
            .enqueue_message(&NewMessage::chat("5511999990000", format!("m{i}")), 3, now)
            .await
            .unwrap();
    }

    // Separate connections to the same file behave like separate workers.
    let mut stores: Vec<Arc<dyn StorageAdapter>> = vec![harness.storage_dyn()];
    for _ in 0..3 {
        let other = SqliteStorage::new(harness.config.storage.clone());
        other.initialize().await.unwrap();
        stores.push(Arc::new(other));
    }

    let callers = 20;
    let mut handles = Vec::new();
    for i in 0..callers {
        let store = stores[i % stores.len()].clone();
        handles.push(tokio::spawn(async move {
            store.claim_next_message(now).await.unwrap()
        }));
    }

    let mut claimed = Vec::new();
    for handle in handles {
        if let Some(msg) = handle.await.unwrap() {
            assert_eq!(msg.status, MessageStatus::InFlight);
            claimed.push(msg.id);
        }
    }

    let unique: HashSet<i64> = claimed.iter().copied().collect();
    assert_eq!(unique.len(), claimed.len(), "a message was claimed twice");
    assert_eq!(claimed.len(), messages.min(callers));

    let health = harness.storage.queue_health(now).await.unwrap();
    assert_eq!(health.in_flight, messages as u64);
    assert_eq!(health.pending, 0);
}

#[tokio::test]
async fn test_claim_order_is_priority_then_age() {
    let harness = TestHarness::new().await.unwrap();
    let p = pipeline(harness);
    let queue = p.dispatcher.queue();

    let low = queue
        .enqueue(NewMessage::chat("5511999990001", "low"))
        .await
        .unwrap();
    p.harness.clock.advance_secs(1);
    let high_late = queue
        .enqueue(NewMessage::chat("5511999990002", "high").with_priority(10))
        .await
        .unwrap();
    p.harness.clock.advance_secs(1);
    let low_later = queue
        .enqueue(NewMessage::chat("5511999990003", "low later"))
        .await
        .unwrap();

    let order: Vec<i64> = [
        queue.claim_next().await.unwrap().unwrap().id,
        queue.claim_next().await.unwrap().unwrap().id,
        queue.claim_next().await.unwrap().unwrap().id,
    ]
    .into();
    assert_eq!(order, vec![high_late, low, low_later]);
    assert!(queue.claim_next().await.unwrap().is_none());
}

// ---- Test 5: Stale in-flight recovery ----

#[tokio::test]
async fn test_stale_in_flight_rows_return_to_pending() {
    let harness = TestHarness::new().await.unwrap();
    let p = pipeline(harness);
    let queue = p.dispatcher.queue();
    let id = queue
        .enqueue(NewMessage::chat("5511999990000", "crashed mid-send"))
        .await
        .unwrap();
    queue.claim_next().await.unwrap().unwrap();

    // Fresh claims are left alone.
    assert_eq!(queue.recover_stale().await.unwrap(), 0);

    let stale = p.harness.config.queue.stale_in_flight_secs as i64;
    p.harness.clock.advance_secs(stale + 1);
    assert_eq!(queue.recover_stale().await.unwrap(), 1);

    let msg = queue.get(id).await.unwrap();
    assert_eq!(msg.status, MessageStatus::Pending);
    assert_eq!(msg.attempts, 0);
}

// ---- Test 6: Daily reset idempotence ----

#[tokio::test]
async fn test_daily_reset_twice_equals_once() {
    let harness = TestHarness::new().await.unwrap();
    let p = pipeline(harness);
    let router = p.dispatcher.router();
    let a = router.create_instance("a", None).await.unwrap();
    let b = router.create_instance("b", None).await.unwrap();
    for _ in 0..3 {
        router.record_success(a.id).await.unwrap();
    }
    router.record_success(b.id).await.unwrap();

    router.reset_daily_counters().await.unwrap();
    let once = router.list_instances().await.unwrap();
    router.reset_daily_counters().await.unwrap();
    let twice = router.list_instances().await.unwrap();

    assert_eq!(once, twice);
    assert!(twice.iter().all(|i| i.messages_sent_today == 0));
    let a = twice.iter().find(|i| i.name == "a").unwrap();
    assert_eq!(a.messages_sent_total, 3);
}

// ---- Test 7: Rate limiter window ----

#[tokio::test]
async fn test_rate_limit_five_per_fifteen_minutes() {
    let harness = TestHarness::new().await.unwrap();
    let p = pipeline(harness);
    let window = Duration::from_secs(15 * 60);
    let key = "otp:phone:5511999990000";

    for expected_remaining in (0..5).rev() {
        let d = p.dispatcher.check_rate_limit(key, 5, window).await.unwrap();
        assert!(d.allowed);
        assert_eq!(d.remaining, expected_remaining);
        p.harness.clock.advance_secs(10);
    }

    let sixth = p.dispatcher.check_rate_limit(key, 5, window).await.unwrap();
    assert!(!sixth.allowed);
    assert_eq!(sixth.remaining, 0);

    p.harness.clock.advance_secs(15 * 60);
    let fresh = p.dispatcher.check_rate_limit(key, 5, window).await.unwrap();
    assert!(fresh.allowed);
    assert_eq!(fresh.remaining, 4);
    assert_eq!(
        fresh.reset_at,
        p.harness.clock.now() + chrono::Duration::minutes(15)
    );
}

// ---- Test 8: Instance selection fairness ----

#[tokio::test]
async fn test_least_used_open_instance_is_selected() {
    let harness = TestHarness::new().await.unwrap();
    let p = pipeline(harness);
    let router = p.dispatcher.router();
    let a = router.create_instance("a", None).await.unwrap();
    let b = router.create_instance("b", None).await.unwrap();
    for _ in 0..5 {
        router.record_success(a.id).await.unwrap();
    }
    for _ in 0..2 {
        router.record_success(b.id).await.unwrap();
    }
    p.gateway.set_state("a", "open").await;
    p.gateway.set_state("b", "open").await;
    let report = router.health_check().await.unwrap();
    assert_eq!(report.open, 2);

    assert_eq!(router.select().await.unwrap().unwrap().id, b.id);
    router.record_success(b.id).await.unwrap();
    assert_eq!(router.select().await.unwrap().unwrap().id, b.id);
}

#[tokio::test]
async fn test_worker_spreads_load_across_instances() {
    let harness = TestHarness::new().await.unwrap();
    let p = pipeline(harness);
    p.dispatcher.create_instance("a", None).await.unwrap();
    p.dispatcher.create_instance("b", None).await.unwrap();
    p.gateway.set_state("a", "open").await;
    p.gateway.set_state("b", "open").await;
    p.dispatcher.router().health_check().await.unwrap();

    for i in 0..4 {
        p.dispatcher
            .enqueue(NewMessage::chat("5511999990000", format!("msg {i}")))
            .await
            .unwrap();
        p.harness.clock.advance_secs(1);
    }
    for _ in 0..4 {
        assert!(matches!(
            p.worker.tick().await.unwrap(),
            TickOutcome::Sent { .. }
        ));
    }

    let instances = p.dispatcher.list_instances().await.unwrap();
    assert!(instances.iter().all(|i| i.messages_sent_today == 2));
}

// ---- Test 9: Email channel ----

#[tokio::test]
async fn test_email_bypasses_instance_routing() {
    let harness = TestHarness::new().await.unwrap();
    let p = pipeline(harness);
    let id = p
        .dispatcher
        .enqueue(NewMessage::email(
            "owner@example.com",
            "Vaccination due",
            "Rex is due on Monday.",
        ))
        .await
        .unwrap();

    assert_eq!(
        p.worker.tick().await.unwrap(),
        TickOutcome::Sent { message_id: id }
    );
    let sent = p.email.sent_messages().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "owner@example.com");
    assert_eq!(sent[0].subject, "Vaccination due");
    assert!(p.gateway.attempts().await.is_empty());
}

// ---- Test 10: Worker lifecycle ----

#[tokio::test]
async fn test_started_worker_drains_queue_and_stops() {
    let harness = TestHarness::new().await.unwrap();
    let p = pipeline(harness);
    p.dispatcher.create_instance("main", None).await.unwrap();
    for i in 0..3 {
        p.dispatcher
            .enqueue(NewMessage::chat("5511999990000", format!("msg {i}")))
            .await
            .unwrap();
    }

    assert!(p.worker.start());
    assert!(!p.worker.start(), "second start must not spawn another loop");

    tokio::time::timeout(Duration::from_secs(5), p.gateway.wait_for_attempts(3))
        .await
        .expect("worker sent all messages");

    assert!(p.worker.stop().await);
    assert!(!p.worker.is_running());
    assert!(!p.worker.stop().await);

    let health = p.dispatcher.queue_health().await.unwrap();
    assert_eq!(health.sent, 3);
    assert_eq!(p.gateway.sent_count().await, 3);
}

#[tokio::test]
async fn test_purge_respects_retention() {
    let start = chrono::Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
    let harness = TestHarness::builder().with_start(start).build().await.unwrap();
    let p = pipeline(harness);
    p.dispatcher.create_instance("main", None).await.unwrap();
    let old = p
        .dispatcher
        .enqueue(NewMessage::chat("5511999990000", "old"))
        .await
        .unwrap();
    p.worker.tick().await.unwrap();
    let pending = p
        .dispatcher
        .enqueue(NewMessage::chat("5511999990000", "still waiting").with_priority(-1))
        .await
        .unwrap();

    p.harness.clock.advance(chrono::Duration::days(31));
    let purged = p.dispatcher.queue().purge_old(30).await.unwrap();
    assert_eq!(purged, 1);
    assert!(p.dispatcher.queue().get(old).await.is_err());
    assert!(p.dispatcher.queue().get(pending).await.is_ok());
}
