//! Publisher negotiation tests
//!
//! Covers join, dual-path publish completion, exactly-once mountpoint
//! registration, keep-alive lifetime, and best-effort leave.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use roomcast_client::{ClientError, RoomPublisher, SessionManager};
use roomcast_core::{MediaKind, MediaStream, MediaTrack, NegotiationState};
use roomcast_registry::{
    CreateMountpoint, Mountpoint, MountpointRegistry, MountpointStore, RegistryError,
};
use roomcast_signaling::ServerConfig;
use roomcast_test_utils::{wait_for_state, CompletionOrder, MockGateway, DEFAULT_TIMEOUT};

const ROOM: u64 = 1234;

fn setup() -> (Arc<MockGateway>, SessionManager, Arc<MountpointStore>) {
    let gateway = MockGateway::new();
    let mgr = SessionManager::new(
        ServerConfig::new("wss://gateway.test/ws"),
        gateway.connector(),
    );
    (gateway, mgr, Arc::new(MountpointStore::new()))
}

fn captured_stream() -> MediaStream {
    let stream = MediaStream::new();
    stream.add_track(MediaTrack::new("cam-audio", MediaKind::Audio));
    stream.add_track(MediaTrack::new("cam-video", MediaKind::Video));
    stream
}

#[tokio::test]
async fn join_assigns_participant_id() {
    let (gateway, mgr, registry) = setup();

    let publisher = RoomPublisher::join(&mgr, registry, ROOM, "cam-0")
        .await
        .expect("join failed");
    assert_eq!(publisher.state(), NegotiationState::Joined);
    assert!(publisher.participant_id().is_some());
    assert_eq!(publisher.room(), ROOM);
    assert_eq!(gateway.participant_count(ROOM), 1);
    assert!(!publisher.is_publishing());

    // The attachment holds its session weakly; teardown of the manager
    // invalidates the reference without keeping the session alive.
    assert!(publisher.session().is_some());
    mgr.disconnect().await;
    assert!(publisher.session().is_none());
}

#[tokio::test]
async fn publish_registers_exactly_one_mountpoint() {
    let (gateway, mgr, registry) = setup();

    let publisher = RoomPublisher::join(&mgr, registry.clone(), ROOM, "cam-0")
        .await
        .expect("join failed");
    publisher
        .publish(captured_stream())
        .await
        .expect("publish failed");

    assert!(publisher.is_publishing());
    assert!(publisher.is_keepalive_running());

    let participant_id = publisher.participant_id().expect("no participant id");
    assert!(gateway.is_participant_publishing(ROOM, participant_id));

    let mountpoints = registry.list();
    assert_eq!(mountpoints.len(), 1);
    assert_eq!(mountpoints[0].room_id, Some(ROOM));
    assert_eq!(mountpoints[0].publisher_id, Some(participant_id));
}

#[tokio::test]
async fn completion_is_idempotent_across_event_orderings() {
    for order in [
        CompletionOrder::AckThenAnswer,
        CompletionOrder::AnswerThenAck,
        CompletionOrder::AckOnly,
        CompletionOrder::AnswerOnly,
    ] {
        let (gateway, mgr, registry) = setup();
        gateway.set_completion_order(order);

        let publisher = RoomPublisher::join(&mgr, registry.clone(), ROOM, "cam-0")
            .await
            .expect("join failed");
        publisher
            .publish(captured_stream())
            .await
            .unwrap_or_else(|e| panic!("publish failed for {:?}: {}", order, e));

        // Let any trailing confirmation event drain.
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(
            registry.list().len(),
            1,
            "exactly one mountpoint for {:?}",
            order
        );
        assert!(publisher.is_keepalive_running(), "keep-alive for {:?}", order);
        publisher.leave().await;
    }
}

#[tokio::test]
async fn publish_from_wrong_state_is_rejected() {
    let (_gateway, mgr, registry) = setup();

    let publisher = RoomPublisher::join(&mgr, registry, ROOM, "cam-0")
        .await
        .expect("join failed");
    publisher
        .publish(captured_stream())
        .await
        .expect("publish failed");

    let err = publisher
        .publish(captured_stream())
        .await
        .expect_err("second publish should be rejected");
    assert!(matches!(err, ClientError::Negotiation(_)));
}

/// Registry that fails its first `failures` creates, then delegates.
struct FlakyRegistry {
    inner: MountpointStore,
    failures: AtomicU32,
}

#[async_trait]
impl MountpointRegistry for FlakyRegistry {
    async fn create(&self, request: CreateMountpoint) -> Result<Mountpoint, RegistryError> {
        let fail = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if fail {
            return Err(RegistryError::Other("scripted create failure".to_string()));
        }
        self.inner.create(request)
    }

    async fn list(&self) -> Result<Vec<Mountpoint>, RegistryError> {
        Ok(self.inner.list())
    }

    async fn delete(&self, id: u64) -> Result<Mountpoint, RegistryError> {
        self.inner.delete(id)
    }
}

#[tokio::test]
async fn registry_failure_lets_other_confirmation_retry() {
    let (_gateway, mgr, _store) = setup();
    let registry = Arc::new(FlakyRegistry {
        inner: MountpointStore::new(),
        failures: AtomicU32::new(1),
    });

    let publisher = RoomPublisher::join(&mgr, registry.clone(), ROOM, "cam-0")
        .await
        .expect("join failed");
    // Ack arrives first and hits the scripted failure; the answer path
    // completes the publish.
    publisher
        .publish(captured_stream())
        .await
        .expect("publish failed");

    assert_eq!(registry.inner.len(), 1);
    assert!(publisher.is_publishing());
}

#[tokio::test]
async fn leave_deletes_mountpoint_and_stops_media() {
    let (_gateway, mgr, registry) = setup();

    let publisher = RoomPublisher::join(&mgr, registry.clone(), ROOM, "cam-0")
        .await
        .expect("join failed");
    let stream = captured_stream();
    let track = stream.tracks()[0].clone();
    publisher.publish(stream).await.expect("publish failed");
    assert_eq!(registry.list().len(), 1);

    publisher.leave().await;

    assert!(registry.is_empty(), "mountpoint must be deleted on leave");
    assert!(!publisher.is_keepalive_running());
    assert!(!track.is_live());
    assert!(publisher.local_stream().is_empty());
    assert_eq!(publisher.state(), NegotiationState::Detached);
    assert!(publisher.participant_id().is_none());
}

#[tokio::test]
async fn leave_mid_negotiation_cleans_up() {
    let (gateway, mgr, registry) = setup();
    gateway.set_completion_order(CompletionOrder::Silent);

    let publisher = Arc::new(
        RoomPublisher::join(&mgr, registry.clone(), ROOM, "cam-0")
            .await
            .expect("join failed"),
    );
    let stream = captured_stream();
    let track = stream.tracks()[0].clone();

    let pending = {
        let publisher = Arc::clone(&publisher);
        tokio::spawn(async move { publisher.publish(stream).await })
    };
    assert!(
        wait_for_state(
            publisher.state_changes(),
            |s| *s == NegotiationState::Negotiating,
            DEFAULT_TIMEOUT,
        )
        .await,
        "negotiation never started"
    );

    publisher.leave().await;

    assert!(!publisher.is_keepalive_running(), "no dangling keep-alive");
    assert!(!track.is_live(), "local tracks must be stopped");
    assert!(registry.is_empty(), "no mountpoint was ever registered");
    assert_eq!(publisher.state(), NegotiationState::Detached);

    let result = pending.await.expect("publish task panicked");
    assert!(result.is_err(), "publish must not succeed after leave");
}

#[tokio::test]
async fn leave_is_safe_to_repeat() {
    let (_gateway, mgr, registry) = setup();

    let publisher = RoomPublisher::join(&mgr, registry, ROOM, "cam-0")
        .await
        .expect("join failed");
    publisher.leave().await;
    publisher.leave().await;
    assert_eq!(publisher.state(), NegotiationState::Detached);
}

#[tokio::test(start_paused = true)]
async fn keepalive_pings_on_interval_and_survives_failures() {
    let (gateway, mgr, registry) = setup();

    let publisher = RoomPublisher::join(&mgr, registry, ROOM, "cam-0")
        .await
        .expect("join failed");
    publisher
        .publish(captured_stream())
        .await
        .expect("publish failed");
    assert_eq!(gateway.keepalive_count(), 0);

    // One scripted failure must not stop the monitor.
    gateway.fail_keepalives(1);
    for _ in 0..3 {
        tokio::time::advance(Duration::from_secs(30)).await;
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
    }
    assert_eq!(gateway.keepalive_count(), 3);
    assert!(publisher.is_keepalive_running());

    publisher.leave().await;
    let after_leave = gateway.keepalive_count();
    tokio::time::advance(Duration::from_secs(120)).await;
    for _ in 0..5 {
        tokio::task::yield_now().await;
    }
    assert_eq!(
        gateway.keepalive_count(),
        after_leave,
        "no pings after teardown"
    );
}
