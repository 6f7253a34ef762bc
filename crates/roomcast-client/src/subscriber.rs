//! Subscriber-side negotiation state machine
//!
//! `Joining -> Joined -> Discovering -> SubscribeRequested ->
//! Negotiating -> Subscribed`, then `Leaving -> Detached`. The feed to
//! subscribe to is resolved by the discovery engine; a feed-not-found
//! rejection at subscribe time re-runs the identical discovery loop
//! before escalating.

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::sync::{Arc, Weak};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use roomcast_core::{Jsep, JsepType, MediaStream, NegotiationState, ParticipantId, RoomId, ERR_NO_SUCH_FEED};
use roomcast_registry::{Mountpoint, RegistryError};
use roomcast_signaling::{AttachOptions, EventSubscription, PluginEvent, PluginKind, SignalingSession};

use crate::attachment::{await_state, opaque_id, SubscriptionBag};
use crate::discovery::{resolve_active_feed, RetryPolicy};
use crate::error::{ClientError, Result};
use crate::protocol::{RoomChannel, RoomEvent};
use crate::session::SessionManager;

#[derive(Debug)]
struct SubscriberShared {
    channel: RoomChannel,
    room: RoomId,
    feed: RwLock<Option<ParticipantId>>,
    remote_stream: MediaStream,
    state: watch::Sender<NegotiationState>,
}

impl SubscriberShared {
    fn set_state(&self, state: NegotiationState) {
        self.state.send_replace(state);
    }
}

/// A subscriber attachment to one publisher's feed.
#[derive(Debug)]
pub struct RoomSubscriber {
    shared: Arc<SubscriberShared>,
    session: Weak<dyn SignalingSession>,
    subscriptions: SubscriptionBag,
    event_task: Mutex<Option<JoinHandle<()>>>,
    state_rx: watch::Receiver<NegotiationState>,
}

impl RoomSubscriber {
    /// Attach to `room` and subscribe to an active feed, preferring
    /// the hinted publisher. Resolves once media negotiation reaches
    /// `Subscribed`.
    pub async fn watch(
        manager: &SessionManager,
        room: RoomId,
        hint: Option<ParticipantId>,
        policy: RetryPolicy,
    ) -> Result<Self> {
        let session = manager.connect().await?;
        let channel = manager
            .attach_plugin(
                PluginKind::VideoRoom,
                AttachOptions::with_opaque_id(opaque_id("subscriber")),
            )
            .await?;
        let channel = RoomChannel::new(channel);

        let (state_tx, state_rx) = watch::channel(NegotiationState::Joining);
        let shared = Arc::new(SubscriberShared {
            channel: channel.clone(),
            room,
            feed: RwLock::new(None),
            remote_stream: MediaStream::new(),
            state: state_tx,
        });
        shared.set_state(NegotiationState::Joined);

        let subscriptions = SubscriptionBag::new();
        let subscription = channel.raw().subscribe();
        subscriptions.add(subscription.id());
        let event_task = tokio::spawn(run_events(Arc::clone(&shared), subscription));

        let subscriber = Self {
            shared,
            session: Arc::downgrade(&session),
            subscriptions,
            event_task: Mutex::new(Some(event_task)),
            state_rx,
        };

        let subscribed = async {
            subscriber.subscribe_to_feed(hint, policy).await?;
            let mut rx = subscriber.state_rx.clone();
            await_state(&mut rx, "subscribe", |s| {
                matches!(s, NegotiationState::Subscribed)
            })
            .await
        }
        .await;
        if let Err(e) = subscribed {
            subscriber.stop().await;
            return Err(e);
        }

        info!(
            "watching feed {:?} in room {}",
            subscriber.feed(),
            room
        );
        Ok(subscriber)
    }

    /// Watch the feed a mountpoint record advertises.
    pub async fn watch_mountpoint(
        manager: &SessionManager,
        mountpoint: &Mountpoint,
        policy: RetryPolicy,
    ) -> Result<Self> {
        let room = mountpoint.room_id.ok_or_else(|| {
            ClientError::Registry(RegistryError::Other(format!(
                "mountpoint {} has no room id",
                mountpoint.id
            )))
        })?;
        Self::watch(manager, room, mountpoint.publisher_id, policy).await
    }

    async fn subscribe_to_feed(
        &self,
        hint: Option<ParticipantId>,
        policy: RetryPolicy,
    ) -> Result<()> {
        self.shared.set_state(NegotiationState::Discovering);
        let mut feed =
            resolve_active_feed(&self.shared.channel, self.shared.room, hint, policy).await?;

        // A feed can vanish between resolution and subscribe; that
        // rejection re-runs the same discovery loop once.
        let mut retried = false;
        loop {
            *self.shared.feed.write() = Some(feed);
            // The event task may drive Negotiating/Subscribed while the
            // join send is still in flight, so the state must advance
            // before the request goes out.
            self.shared.set_state(NegotiationState::SubscribeRequested);
            match self
                .shared
                .channel
                .join_as_subscriber(self.shared.room, feed)
                .await
            {
                Ok(_) => break,
                Err(ClientError::FeedNotYetReady) if !retried => {
                    retried = true;
                    debug!("feed {} not ready at subscribe time, re-resolving", feed);
                    self.shared.set_state(NegotiationState::Discovering);
                    feed = resolve_active_feed(&self.shared.channel, self.shared.room, hint, policy)
                        .await?;
                }
                Err(ClientError::FeedNotYetReady) => {
                    return Err(ClientError::NoActivePublisher(self.shared.room));
                }
                Err(e) => return Err(e),
            }
        }

        Ok(())
    }

    /// Stop watching. Best-effort; local cleanup always completes.
    pub async fn stop(&self) {
        self.shared.set_state(NegotiationState::Leaving);

        self.subscriptions.release(self.shared.channel.raw());
        if let Some(task) = self.event_task.lock().take() {
            task.abort();
        }
        self.shared.remote_stream.stop_all();

        if let Err(e) = self.shared.channel.leave().await {
            warn!("leave request failed: {}", e);
        }
        if let Err(e) = self.shared.channel.detach().await {
            warn!("detach failed: {}", e);
        }

        *self.shared.feed.write() = None;
        self.shared.set_state(NegotiationState::Detached);
        info!("stopped watching room {}", self.shared.room);
    }

    pub fn state(&self) -> NegotiationState {
        self.state_rx.borrow().clone()
    }

    pub fn state_changes(&self) -> watch::Receiver<NegotiationState> {
        self.state_rx.clone()
    }

    pub fn room(&self) -> RoomId {
        self.shared.room
    }

    /// The feed this attachment resolved and subscribed to.
    pub fn feed(&self) -> Option<ParticipantId> {
        *self.shared.feed.read()
    }

    pub fn remote_stream(&self) -> MediaStream {
        self.shared.remote_stream.clone()
    }

    pub fn is_watching(&self) -> bool {
        self.state() == NegotiationState::Subscribed
    }

    /// The owning session, while it is still alive.
    pub fn session(&self) -> Option<Arc<dyn SignalingSession>> {
        self.session.upgrade()
    }
}

async fn run_events(shared: Arc<SubscriberShared>, mut events: EventSubscription) {
    while let Some(event) = events.recv().await {
        match event {
            PluginEvent::Message { data, jsep } => handle_message(&shared, data, jsep).await,
            PluginEvent::RemoteTrack { track, mid, added } => {
                if added {
                    debug!("remote {:?} track added (mid {:?})", track.kind(), mid);
                    shared.remote_stream.add_track(track);
                }
            }
            PluginEvent::Cleanup => {
                debug!("subscriber cleanup received");
                shared.remote_stream.stop_all();
            }
            PluginEvent::LocalTrack { .. } => {}
        }
    }
    debug!("subscriber event stream closed");
}

async fn handle_message(shared: &Arc<SubscriberShared>, data: Value, jsep: Option<Jsep>) {
    match RoomEvent::parse(&data) {
        Some(RoomEvent::Attached { id, .. }) => {
            debug!("attached to feed {:?}", id);
            if let Some(id) = id {
                *shared.feed.write() = Some(id);
            }
        }
        Some(RoomEvent::Event {
            started,
            error_code,
            error,
            ..
        }) => {
            if let Some(code) = error_code {
                let reason = error.unwrap_or_else(|| "unknown error".to_string());
                if code == ERR_NO_SUCH_FEED {
                    // Handled at subscribe time by the discovery retry.
                    debug!("feed not ready: {}", reason);
                } else {
                    warn!("room error {}: {}", code, reason);
                    shared.set_state(NegotiationState::Failed(reason));
                }
                return;
            }
            if started.as_deref() == Some("ok") {
                debug!("stream started");
                shared.set_state(NegotiationState::Subscribed);
            }
        }
        _ => {}
    }

    if let Some(jsep) = jsep {
        if jsep.kind == JsepType::Offer {
            shared.set_state(NegotiationState::Negotiating);
            match shared.channel.raw().create_answer(&jsep).await {
                Ok(answer) => {
                    if let Err(e) = shared.channel.start(&answer).await {
                        error!("start request failed: {}", e);
                        shared.set_state(NegotiationState::Failed(e.to_string()));
                    }
                }
                Err(e) => {
                    error!("answer construction failed: {}", e);
                    shared.set_state(NegotiationState::Failed(e.to_string()));
                }
            }
        }
    }
}
