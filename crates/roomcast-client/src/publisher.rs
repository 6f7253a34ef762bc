//! Publisher-side negotiation state machine
//!
//! `Joining -> Joined -> Configuring -> Negotiating -> Published`,
//! then `Leaving -> Detached`. Negotiation completion is signaled by
//! either the server's configure acknowledgement or the applied remote
//! answer, in whichever order they arrive; the first drives the
//! transition and the second must find nothing left to do.

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use roomcast_core::{
    Jsep, JsepType, MediaKind, MediaStream, NegotiationState, ParticipantId, RoomId, TrackSpec,
};
use roomcast_registry::{CreateMountpoint, MountpointRegistry};
use roomcast_signaling::{AttachOptions, EventSubscription, PluginEvent, PluginKind, SignalingSession};

use crate::attachment::{await_state, opaque_id, SubscriptionBag};
use crate::error::{ClientError, Result};
use crate::keepalive::{KeepAlive, KEEPALIVE_INTERVAL};
use crate::protocol::{PublisherInfo, RoomChannel, RoomEvent};
use crate::session::SessionManager;

struct PublisherShared {
    channel: RoomChannel,
    registry: Arc<dyn MountpointRegistry>,
    room: RoomId,
    participant_id: RwLock<Option<ParticipantId>>,
    publishers: RwLock<Vec<PublisherInfo>>,
    local_stream: MediaStream,
    keepalive: KeepAlive,
    /// Guard for the exactly-once publish side effects.
    completed: AtomicBool,
    state: watch::Sender<NegotiationState>,
}

impl PublisherShared {
    fn set_state(&self, state: NegotiationState) {
        self.state.send_replace(state);
    }
}

/// A publisher attachment to one room.
pub struct RoomPublisher {
    shared: Arc<PublisherShared>,
    session: Weak<dyn SignalingSession>,
    subscriptions: SubscriptionBag,
    event_task: Mutex<Option<JoinHandle<()>>>,
    state_rx: watch::Receiver<NegotiationState>,
}

impl RoomPublisher {
    /// Connect (if needed), attach to the room plugin, and join `room`
    /// as a publisher. Resolves once the server reports the join and
    /// our participant id is assigned.
    pub async fn join(
        manager: &SessionManager,
        registry: Arc<dyn MountpointRegistry>,
        room: RoomId,
        display: impl Into<String>,
    ) -> Result<Self> {
        let session = manager.connect().await?;
        let channel = manager
            .attach_plugin(
                PluginKind::VideoRoom,
                AttachOptions::with_opaque_id(opaque_id("videoroom")),
            )
            .await?;
        let channel = RoomChannel::new(channel);

        let (state_tx, state_rx) = watch::channel(NegotiationState::Joining);
        let shared = Arc::new(PublisherShared {
            channel: channel.clone(),
            registry,
            room,
            participant_id: RwLock::new(None),
            publishers: RwLock::new(Vec::new()),
            local_stream: MediaStream::new(),
            keepalive: KeepAlive::new(),
            completed: AtomicBool::new(false),
            state: state_tx,
        });

        let subscriptions = SubscriptionBag::new();
        let subscription = channel.raw().subscribe();
        subscriptions.add(subscription.id());
        let event_task = tokio::spawn(run_events(Arc::clone(&shared), subscription));

        let publisher = Self {
            shared,
            session: Arc::downgrade(&session),
            subscriptions,
            event_task: Mutex::new(Some(event_task)),
            state_rx,
        };

        let joined = async {
            publisher
                .shared
                .channel
                .join_as_publisher(room, Some(display.into()))
                .await?;
            let mut rx = publisher.state_rx.clone();
            await_state(&mut rx, "join", |s| matches!(s, NegotiationState::Joined)).await
        }
        .await;
        if let Err(e) = joined {
            publisher.leave().await;
            return Err(e);
        }

        info!(
            "joined room {} as publisher {:?}",
            room,
            publisher.participant_id()
        );
        Ok(publisher)
    }

    /// Publish the caller's captured stream: merge it into the local
    /// aggregate, construct the offer, send the configure request, and
    /// resolve once negotiation reaches `Published`.
    pub async fn publish(&self, stream: MediaStream) -> Result<()> {
        {
            let state = self.state_rx.borrow().clone();
            if state != NegotiationState::Joined {
                return Err(ClientError::Negotiation(format!(
                    "cannot publish from state {:?}",
                    state
                )));
            }
        }

        for track in stream.tracks() {
            self.shared.local_stream.add_track(track);
        }

        self.shared.set_state(NegotiationState::Configuring);
        let offer = self
            .shared
            .channel
            .raw()
            .create_offer(&[
                TrackSpec::capture(MediaKind::Audio),
                TrackSpec::capture(MediaKind::Video),
            ])
            .await
            .map_err(|e| ClientError::Negotiation(e.to_string()))?;
        debug!("created publish offer");

        self.shared.set_state(NegotiationState::Negotiating);
        self.shared.channel.configure(&offer).await?;

        let mut rx = self.state_rx.clone();
        await_state(&mut rx, "publish", |s| {
            matches!(s, NegotiationState::Published)
        })
        .await
    }

    /// Leave the room. Best-effort: every step proceeds even if an
    /// earlier one fails, and local cleanup always completes.
    pub async fn leave(&self) {
        self.shared.set_state(NegotiationState::Leaving);

        self.subscriptions.release(self.shared.channel.raw());
        if let Some(task) = self.event_task.lock().take() {
            task.abort();
        }
        self.shared.keepalive.stop();
        self.shared.local_stream.stop_all();

        if let Some(participant_id) = *self.shared.participant_id.read() {
            match self.shared.registry.list().await {
                Ok(mountpoints) => {
                    let matching = mountpoints.into_iter().find(|mp| {
                        mp.room_id == Some(self.shared.room)
                            && mp.publisher_id == Some(participant_id)
                    });
                    if let Some(mountpoint) = matching {
                        match self.shared.registry.delete(mountpoint.id).await {
                            Ok(_) => debug!("cleaned up mountpoint {}", mountpoint.id),
                            Err(e) => warn!("mountpoint cleanup failed: {}", e),
                        }
                    }
                }
                Err(e) => warn!("mountpoint lookup failed during leave: {}", e),
            }
        }

        if let Err(e) = self.shared.channel.leave().await {
            warn!("leave request failed: {}", e);
        }
        if let Err(e) = self.shared.channel.detach().await {
            warn!("detach failed: {}", e);
        }

        *self.shared.participant_id.write() = None;
        self.shared.publishers.write().clear();
        self.shared.set_state(NegotiationState::Detached);
        info!("left room {}", self.shared.room);
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

    pub fn participant_id(&self) -> Option<ParticipantId> {
        *self.shared.participant_id.read()
    }

    pub fn local_stream(&self) -> MediaStream {
        self.shared.local_stream.clone()
    }

    /// Publishers the room has announced to us.
    pub fn publishers(&self) -> Vec<PublisherInfo> {
        self.shared.publishers.read().clone()
    }

    pub fn is_publishing(&self) -> bool {
        self.state() == NegotiationState::Published
    }

    pub fn is_keepalive_running(&self) -> bool {
        self.shared.keepalive.is_running()
    }

    /// The owning session, while it is still alive.
    pub fn session(&self) -> Option<Arc<dyn SignalingSession>> {
        self.session.upgrade()
    }
}

async fn run_events(shared: Arc<PublisherShared>, mut events: EventSubscription) {
    while let Some(event) = events.recv().await {
        match event {
            PluginEvent::Message { data, jsep } => handle_message(&shared, data, jsep).await,
            PluginEvent::LocalTrack { track, added } => {
                if added {
                    debug!("local {:?} track {} added", track.kind(), track.id());
                    shared.local_stream.add_track(track);
                }
            }
            PluginEvent::Cleanup => {
                debug!("publisher cleanup received");
                shared.local_stream.stop_all();
            }
            PluginEvent::RemoteTrack { .. } => {}
        }
    }
    debug!("publisher event stream closed");
}

async fn handle_message(shared: &Arc<PublisherShared>, data: Value, jsep: Option<Jsep>) {
    match RoomEvent::parse(&data) {
        Some(RoomEvent::Joined { id, publishers, .. }) => {
            *shared.participant_id.write() = id;
            *shared.publishers.write() = publishers;
            shared.set_state(NegotiationState::Joined);
        }
        Some(RoomEvent::Event {
            configured,
            publishers,
            error_code,
            error,
            ..
        }) => {
            if let Some(list) = publishers {
                *shared.publishers.write() = list;
            }
            if let Some(code) = error_code {
                let reason = error.unwrap_or_else(|| "unknown error".to_string());
                warn!("room error {}: {}", code, reason);
                shared.set_state(NegotiationState::Failed(reason));
                return;
            }
            if configured.as_deref() == Some("ok") {
                debug!("configure acknowledged");
                try_complete(shared).await;
            }
        }
        _ => {}
    }

    if let Some(jsep) = jsep {
        if jsep.kind == JsepType::Answer {
            match shared.channel.raw().apply_remote_description(&jsep).await {
                Ok(()) => {
                    debug!("remote answer applied");
                    try_complete(shared).await;
                }
                Err(e) => {
                    error!("applying remote answer failed: {}", e);
                    shared.set_state(NegotiationState::Failed(e.to_string()));
                }
            }
        }
    }
}

/// Complete the publish if the local stream is active and nothing has
/// completed it yet. Both negotiation confirmations funnel here, so the
/// mountpoint is registered and the keep-alive started exactly once.
async fn try_complete(shared: &Arc<PublisherShared>) {
    if !shared.local_stream.is_active() {
        debug!("negotiation confirmed but local stream not active yet");
        return;
    }
    if shared.completed.swap(true, Ordering::SeqCst) {
        return;
    }

    let participant_id = match *shared.participant_id.read() {
        Some(id) => id,
        None => {
            warn!("negotiation complete but no participant id assigned");
            shared.completed.store(false, Ordering::SeqCst);
            return;
        }
    };

    let request = CreateMountpoint::new(
        format!("VideoRoom {} - Publisher {}", shared.room, participant_id),
        Some(shared.room),
        Some(participant_id),
    );
    match shared.registry.create(request).await {
        Ok(mountpoint) => {
            info!(
                "registered mountpoint {} for room {} publisher {}",
                mountpoint.id, shared.room, participant_id
            );
        }
        Err(e) => {
            error!("mountpoint registration failed: {}", e);
            // Release the guard; the other confirmation may retry.
            shared.completed.store(false, Ordering::SeqCst);
            return;
        }
    }

    shared
        .keepalive
        .start(shared.channel.clone(), KEEPALIVE_INTERVAL);
    shared.set_state(NegotiationState::Published);
}
