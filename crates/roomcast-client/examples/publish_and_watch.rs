//! End-to-end demo: publish a stream, discover it through the
//! mountpoint registry, and watch it, all against the in-process mock
//! gateway.
//!
//! Run with: `cargo run --example publish_and_watch`

use std::sync::Arc;

use anyhow::Result;
use roomcast_client::{RetryPolicy, RoomPublisher, RoomSubscriber, SessionManager};
use roomcast_core::{MediaKind, MediaStream, MediaTrack};
use roomcast_registry::MountpointStore;
use roomcast_signaling::ServerConfig;
use roomcast_test_utils::MockGateway;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let gateway = MockGateway::new();
    let registry = Arc::new(MountpointStore::new());
    let room = 1234;

    // Publish.
    let publisher_session = SessionManager::new(
        ServerConfig::new("wss://gateway.local/ws"),
        gateway.connector(),
    );
    let publisher = RoomPublisher::join(&publisher_session, registry.clone(), room, "demo-cam").await?;

    let captured = MediaStream::new();
    captured.add_track(MediaTrack::new("demo-audio", MediaKind::Audio));
    captured.add_track(MediaTrack::new("demo-video", MediaKind::Video));
    publisher.publish(captured).await?;
    println!(
        "published to room {} as participant {:?}",
        room,
        publisher.participant_id()
    );

    // Discover.
    let mountpoints = registry.list();
    println!("registry now lists {} mountpoint(s)", mountpoints.len());

    // Watch.
    let subscriber_session = SessionManager::new(
        ServerConfig::new("wss://gateway.local/ws"),
        gateway.connector(),
    );
    let subscriber =
        RoomSubscriber::watch_mountpoint(&subscriber_session, &mountpoints[0], RetryPolicy::default())
            .await?;
    println!(
        "watching feed {:?}, {} remote track(s)",
        subscriber.feed(),
        subscriber.remote_stream().len()
    );

    // Tear down.
    subscriber.stop().await;
    publisher.leave().await;
    publisher_session.disconnect().await;
    subscriber_session.disconnect().await;
    println!("registry now lists {} mountpoint(s)", registry.list().len());
    Ok(())
}
