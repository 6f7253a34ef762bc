//! Discovery retry timing tests
//!
//! Run under a paused clock so the round/delay accounting is exact:
//! success on round k costs (k-1) intervals, and the budget is ten
//! rounds total with no eleventh query.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use roomcast_client::{
    pick_active, poll_until, resolve_active_feed, ClientError, RetryPolicy, RoomChannel,
    SessionManager,
};
use roomcast_core::Participant;
use roomcast_signaling::{AttachOptions, PluginKind, ServerConfig};
use roomcast_test_utils::MockGateway;

fn policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 10,
        interval: Duration::from_secs(1),
    }
}

fn participant(id: u64, publisher: bool) -> Participant {
    Participant {
        id,
        display: None,
        publisher,
        kind: None,
    }
}

/// Query closure reporting participant 7 active from round `active_from`.
fn scripted_query(
    calls: Arc<AtomicU32>,
    active_from: u32,
) -> impl FnMut() -> std::future::Ready<roomcast_client::Result<Vec<Participant>>> {
    move || {
        let round = calls.fetch_add(1, Ordering::SeqCst) + 1;
        std::future::ready(Ok(vec![participant(7, round >= active_from)]))
    }
}

#[tokio::test(start_paused = true)]
async fn fast_path_resolves_with_zero_delay() {
    let calls = Arc::new(AtomicU32::new(0));
    let start = tokio::time::Instant::now();

    let hit = poll_until(policy(), scripted_query(Arc::clone(&calls), 1), |ps| {
        pick_active(&ps, Some(7))
    })
    .await;

    assert_eq!(hit, Some(7));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn resolves_on_round_k_after_k_minus_one_delays() {
    for k in [2u32, 4, 10] {
        let calls = Arc::new(AtomicU32::new(0));
        let start = tokio::time::Instant::now();

        let hit = poll_until(policy(), scripted_query(Arc::clone(&calls), k), |ps| {
            pick_active(&ps, Some(7))
        })
        .await;

        assert_eq!(hit, Some(7), "k={}", k);
        assert_eq!(calls.load(Ordering::SeqCst), k, "k={}", k);
        assert_eq!(
            start.elapsed(),
            Duration::from_secs((k - 1) as u64),
            "k={}",
            k
        );
    }
}

#[tokio::test(start_paused = true)]
async fn exhausts_after_exactly_ten_rounds() {
    let calls = Arc::new(AtomicU32::new(0));
    let start = tokio::time::Instant::now();

    // Participant never becomes active.
    let hit = poll_until(policy(), scripted_query(Arc::clone(&calls), u32::MAX), |ps| {
        pick_active(&ps, Some(7))
    })
    .await;

    assert_eq!(hit, None);
    assert_eq!(calls.load(Ordering::SeqCst), 10, "no eleventh query");
    assert_eq!(start.elapsed(), Duration::from_secs(9));
}

#[tokio::test(start_paused = true)]
async fn query_errors_consume_rounds() {
    let calls = Arc::new(AtomicU32::new(0));
    let calls_clone = Arc::clone(&calls);

    let hit = poll_until(
        policy(),
        move || {
            let round = calls_clone.fetch_add(1, Ordering::SeqCst) + 1;
            std::future::ready(if round < 3 {
                Err(ClientError::Negotiation("transient".to_string()))
            } else {
                Ok(vec![participant(7, true)])
            })
        },
        |ps: Vec<Participant>| pick_active(&ps, Some(7)),
    )
    .await;

    assert_eq!(hit, Some(7));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

async fn room_channel(gateway: &Arc<MockGateway>) -> (SessionManager, RoomChannel) {
    let mgr = SessionManager::new(
        ServerConfig::new("wss://gateway.test/ws"),
        gateway.connector(),
    );
    mgr.connect().await.expect("connect failed");
    let channel = mgr
        .attach_plugin(PluginKind::VideoRoom, AttachOptions::default())
        .await
        .expect("attach failed");
    (mgr, RoomChannel::new(channel))
}

#[tokio::test]
async fn resolve_returns_hinted_active_feed_immediately() {
    let gateway = MockGateway::new();
    let hint = gateway.add_publisher(1234, "cam");
    let (_mgr, channel) = room_channel(&gateway).await;

    let feed = resolve_active_feed(&channel, 1234, Some(hint), RetryPolicy::default())
        .await
        .expect("resolve failed");
    assert_eq!(feed, hint);
    assert_eq!(gateway.list_query_count(1234), 1);
}

#[tokio::test]
async fn resolve_prefers_confirmed_publisher_over_inactive_hint() {
    let gateway = MockGateway::new();
    let idle = gateway.add_inactive_participant(1234, "idle");
    let active = gateway.add_publisher(1234, "cam");
    let (_mgr, channel) = room_channel(&gateway).await;

    let feed = resolve_active_feed(&channel, 1234, Some(idle), RetryPolicy::default())
        .await
        .expect("resolve failed");
    assert_eq!(feed, active);
    assert_eq!(gateway.list_query_count(1234), 1);
}

#[tokio::test(start_paused = true)]
async fn resolve_retries_until_activation() {
    let gateway = MockGateway::new();
    let hint = gateway.add_publisher(1234, "cam");
    gateway.set_activation_threshold(5);
    let (_mgr, channel) = room_channel(&gateway).await;

    let feed = resolve_active_feed(&channel, 1234, Some(hint), RetryPolicy::default())
        .await
        .expect("resolve failed");
    assert_eq!(feed, hint);
    assert_eq!(gateway.list_query_count(1234), 5);
}

#[tokio::test(start_paused = true)]
async fn resolve_fails_terminally_when_no_publisher_activates() {
    let gateway = MockGateway::new();
    gateway.add_inactive_participant(1234, "idle");
    let (_mgr, channel) = room_channel(&gateway).await;

    let err = resolve_active_feed(&channel, 1234, None, RetryPolicy::default())
        .await
        .expect_err("should exhaust");
    assert!(matches!(err, ClientError::NoActivePublisher(1234)));
    assert_eq!(gateway.list_query_count(1234), 10);
}
