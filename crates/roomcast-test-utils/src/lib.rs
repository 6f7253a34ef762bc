//! Test helpers for roomcast
//!
//! Provides [`MockGateway`], an in-process signaling backend
//! implementing the roomcast-signaling traits with scripted behavior
//! (activation delays, completion orderings, failure injection), and
//! condition-based wait helpers.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

use roomcast_core::{
    Jsep, JsepType, MediaKind, MediaTrack, NegotiationState, ParticipantId, RoomId, TrackSpec,
    ERR_NO_SUCH_FEED,
};
use roomcast_signaling::{
    AttachOptions, EventHub, EventSubscription, PluginChannel, PluginEvent, PluginKind, Result,
    ServerConfig, SignalingConnector, SignalingError, SignalingSession, SubscriptionId,
};

/// Default wait bound for condition-based waiting.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Order in which the gateway confirms a publish negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOrder {
    /// Configure acknowledgement first, then the remote answer.
    AckThenAnswer,
    /// Remote answer first, then the configure acknowledgement.
    AnswerThenAck,
    /// Only the configure acknowledgement is delivered.
    AckOnly,
    /// Only the remote answer is delivered.
    AnswerOnly,
    /// Neither confirmation is delivered; negotiation hangs.
    Silent,
}

#[derive(Debug, Clone)]
struct MockParticipant {
    id: ParticipantId,
    display: Option<String>,
    publishing: bool,
}

#[derive(Default)]
struct RoomState {
    participants: Vec<MockParticipant>,
    list_queries: u32,
    subscribers: Vec<Weak<MockChannel>>,
}

struct GatewayCore {
    rooms: DashMap<RoomId, RoomState>,
    next_participant: AtomicU64,
    completion: RwLock<CompletionOrder>,
    /// Participant-list rounds before publishing participants are
    /// reported active (0 = immediately).
    activation_threshold: AtomicU32,
    reject_subscribes: AtomicU32,
    fail_keepalives: AtomicU32,
    keepalive_count: AtomicU32,
    fail_handshake: AtomicBool,
    fail_create_session: AtomicBool,
    fail_attach: AtomicBool,
}

/// Scriptable in-process signaling backend.
pub struct MockGateway {
    core: Arc<GatewayCore>,
}

impl MockGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            core: Arc::new(GatewayCore {
                rooms: DashMap::new(),
                next_participant: AtomicU64::new(1),
                completion: RwLock::new(CompletionOrder::AckThenAnswer),
                activation_threshold: AtomicU32::new(0),
                reject_subscribes: AtomicU32::new(0),
                fail_keepalives: AtomicU32::new(0),
                keepalive_count: AtomicU32::new(0),
                fail_handshake: AtomicBool::new(false),
                fail_create_session: AtomicBool::new(false),
                fail_attach: AtomicBool::new(false),
            }),
        })
    }

    /// The gateway as a connector capability.
    pub fn connector(self: &Arc<Self>) -> Arc<dyn SignalingConnector> {
        Arc::clone(self) as Arc<dyn SignalingConnector>
    }

    pub fn fail_handshake(&self, fail: bool) {
        self.core.fail_handshake.store(fail, Ordering::SeqCst);
    }

    pub fn fail_create_session(&self, fail: bool) {
        self.core.fail_create_session.store(fail, Ordering::SeqCst);
    }

    pub fn fail_attach(&self, fail: bool) {
        self.core.fail_attach.store(fail, Ordering::SeqCst);
    }

    pub fn set_completion_order(&self, order: CompletionOrder) {
        *self.core.completion.write() = order;
    }

    /// Report publishing participants as inactive until the room's
    /// participant list has been queried `rounds` times.
    pub fn set_activation_threshold(&self, rounds: u32) {
        self.core.activation_threshold.store(rounds, Ordering::SeqCst);
    }

    /// Reject the next `count` subscriber joins with a feed-not-found
    /// error, regardless of feed state.
    pub fn reject_subscribes(&self, count: u32) {
        self.core.reject_subscribes.store(count, Ordering::SeqCst);
    }

    /// Fail the next `count` keep-alive sends.
    pub fn fail_keepalives(&self, count: u32) {
        self.core.fail_keepalives.store(count, Ordering::SeqCst);
    }

    pub fn keepalive_count(&self) -> u32 {
        self.core.keepalive_count.load(Ordering::SeqCst)
    }

    pub fn list_query_count(&self, room: RoomId) -> u32 {
        self.core.rooms.get(&room).map(|r| r.list_queries).unwrap_or(0)
    }

    /// Add a participant that is actively publishing (subject to the
    /// activation threshold).
    pub fn add_publisher(&self, room: RoomId, display: &str) -> ParticipantId {
        self.core.insert_participant(room, Some(display.to_string()), true)
    }

    /// Add a participant that has joined but never publishes.
    pub fn add_inactive_participant(&self, room: RoomId, display: &str) -> ParticipantId {
        self.core.insert_participant(room, Some(display.to_string()), false)
    }

    /// Flip a participant's publishing flag on.
    pub fn activate(&self, room: RoomId, id: ParticipantId) {
        if let Some(mut state) = self.core.rooms.get_mut(&room) {
            if let Some(p) = state.participants.iter_mut().find(|p| p.id == id) {
                p.publishing = true;
            }
        }
    }

    pub fn participant_count(&self, room: RoomId) -> usize {
        self.core
            .rooms
            .get(&room)
            .map(|r| r.participants.len())
            .unwrap_or(0)
    }

    pub fn is_participant_publishing(&self, room: RoomId, id: ParticipantId) -> bool {
        self.core
            .rooms
            .get(&room)
            .map(|r| r.participants.iter().any(|p| p.id == id && p.publishing))
            .unwrap_or(false)
    }
}

impl GatewayCore {
    fn insert_participant(
        &self,
        room: RoomId,
        display: Option<String>,
        publishing: bool,
    ) -> ParticipantId {
        let id = self.next_participant.fetch_add(1, Ordering::SeqCst);
        self.rooms
            .entry(room)
            .or_default()
            .participants
            .push(MockParticipant {
                id,
                display,
                publishing,
            });
        id
    }

    /// Participant list as the server reports it, counting the query.
    fn list_participants(&self, room: RoomId) -> Vec<Value> {
        let threshold = self.activation_threshold.load(Ordering::SeqCst);
        let mut state = self.rooms.entry(room).or_default();
        state.list_queries += 1;
        let queries = state.list_queries;
        state
            .participants
            .iter()
            .map(|p| {
                json!({
                    "id": p.id,
                    "display": p.display,
                    "publisher": p.publishing && queries >= threshold,
                })
            })
            .collect()
    }

    fn active_publishers(&self, room: RoomId) -> Vec<Value> {
        self.rooms
            .get(&room)
            .map(|state| {
                state
                    .participants
                    .iter()
                    .filter(|p| p.publishing)
                    .map(|p| json!({"id": p.id, "display": p.display}))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn is_publishing(&self, room: RoomId, id: ParticipantId) -> bool {
        self.rooms
            .get(&room)
            .map(|state| state.participants.iter().any(|p| p.id == id && p.publishing))
            .unwrap_or(false)
    }

    fn set_publishing(&self, room: RoomId, id: ParticipantId, publishing: bool) {
        if let Some(mut state) = self.rooms.get_mut(&room) {
            if let Some(p) = state.participants.iter_mut().find(|p| p.id == id) {
                p.publishing = publishing;
            }
        }
    }

    fn register_subscriber(&self, room: RoomId, channel: Weak<MockChannel>) {
        self.rooms.entry(room).or_default().subscribers.push(channel);
    }

    fn remove_participant(&self, room: RoomId, id: ParticipantId) {
        if let Some(mut state) = self.rooms.get_mut(&room) {
            state.participants.retain(|p| p.id != id);
        }
    }

    /// Cleanup every subscriber attachment in the room, pruning dead
    /// channels.
    fn cleanup_subscribers(&self, room: RoomId) {
        let subscribers: Vec<Arc<MockChannel>> = self
            .rooms
            .get_mut(&room)
            .map(|mut state| {
                state.subscribers.retain(|weak| weak.strong_count() > 0);
                state.subscribers.iter().filter_map(Weak::upgrade).collect()
            })
            .unwrap_or_default();
        for subscriber in subscribers {
            subscriber.hub.dispatch(PluginEvent::Cleanup);
        }
    }
}

#[async_trait]
impl SignalingConnector for MockGateway {
    async fn handshake(&self, config: &ServerConfig) -> Result<()> {
        if self.core.fail_handshake.load(Ordering::SeqCst) {
            return Err(SignalingError::Handshake(
                "scripted handshake failure".to_string(),
            ));
        }
        debug!("mock handshake for {}", config.server_url);
        Ok(())
    }

    async fn create_session(&self) -> Result<Arc<dyn SignalingSession>> {
        if self.core.fail_create_session.load(Ordering::SeqCst) {
            return Err(SignalingError::SessionCreate(
                "scripted session failure".to_string(),
            ));
        }
        Ok(Arc::new(MockSession {
            core: Arc::clone(&self.core),
            destroyed: AtomicBool::new(false),
        }))
    }
}

struct MockSession {
    core: Arc<GatewayCore>,
    destroyed: AtomicBool,
}

#[async_trait]
impl SignalingSession for MockSession {
    async fn attach(
        &self,
        plugin: PluginKind,
        options: AttachOptions,
    ) -> Result<Arc<dyn PluginChannel>> {
        if self.destroyed.load(Ordering::SeqCst) {
            return Err(SignalingError::Attach("session destroyed".to_string()));
        }
        if self.core.fail_attach.load(Ordering::SeqCst) {
            return Err(SignalingError::Attach("scripted attach failure".to_string()));
        }
        debug!(
            "mock attach {} (opaque {:?})",
            plugin.as_str(),
            options.opaque_id
        );
        let channel = Arc::new_cyclic(|weak| MockChannel {
            core: Arc::clone(&self.core),
            self_ref: weak.clone(),
            hub: EventHub::new(),
            room: RwLock::new(None),
            participant: RwLock::new(None),
            remote_applied: AtomicBool::new(false),
        });
        Ok(channel as Arc<dyn PluginChannel>)
    }

    async fn destroy(&self) -> Result<()> {
        self.destroyed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// One mock plugin attachment.
pub struct MockChannel {
    core: Arc<GatewayCore>,
    self_ref: Weak<MockChannel>,
    hub: EventHub,
    room: RwLock<Option<RoomId>>,
    participant: RwLock<Option<ParticipantId>>,
    remote_applied: AtomicBool,
}

impl MockChannel {
    fn handle_join(&self, body: &Value) -> Result<Value> {
        let room = body
            .get("room")
            .and_then(Value::as_u64)
            .ok_or_else(|| SignalingError::Send("join without room".to_string()))?;
        let ptype = body.get("ptype").and_then(Value::as_str).unwrap_or_default();

        if ptype == "publisher" {
            let display = body
                .get("display")
                .and_then(Value::as_str)
                .map(str::to_string);
            let id = self
                .core
                .insert_participant(room, display, false);
            *self.room.write() = Some(room);
            *self.participant.write() = Some(id);
            self.hub.dispatch(PluginEvent::Message {
                data: json!({
                    "videoroom": "joined",
                    "room": room,
                    "id": id,
                    "publishers": self.core.active_publishers(room),
                }),
                jsep: None,
            });
            return Ok(json!({"ack": "ok"}));
        }

        // Subscriber join targets a feed.
        let feed = body
            .get("feed")
            .and_then(Value::as_u64)
            .ok_or_else(|| SignalingError::Send("subscribe without feed".to_string()))?;

        let scripted = self
            .core
            .reject_subscribes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if scripted || !self.core.is_publishing(room, feed) {
            return Err(SignalingError::Rejected {
                code: ERR_NO_SUCH_FEED,
                reason: format!("No such feed ({})", feed),
            });
        }

        *self.room.write() = Some(room);
        self.core.register_subscriber(room, self.self_ref.clone());
        self.hub.dispatch(PluginEvent::Message {
            data: json!({"videoroom": "attached", "room": room, "id": feed}),
            jsep: Some(Jsep::offer("v=0 mock remote offer")),
        });
        Ok(json!({"ack": "ok"}))
    }

    fn handle_configure(&self) -> Result<Value> {
        let room = (*self.room.read())
            .ok_or_else(|| SignalingError::Send("configure before join".to_string()))?;
        let participant = (*self.participant.read())
            .ok_or_else(|| SignalingError::Send("configure from non-publisher".to_string()))?;

        self.core.set_publishing(room, participant, true);

        let ack = PluginEvent::Message {
            data: json!({"videoroom": "event", "room": room, "configured": "ok"}),
            jsep: None,
        };
        let answer = PluginEvent::Message {
            data: json!({"videoroom": "event", "room": room}),
            jsep: Some(Jsep::answer("v=0 mock remote answer")),
        };
        match *self.core.completion.read() {
            CompletionOrder::AckThenAnswer => {
                self.hub.dispatch(ack);
                self.hub.dispatch(answer);
            }
            CompletionOrder::AnswerThenAck => {
                self.hub.dispatch(answer);
                self.hub.dispatch(ack);
            }
            CompletionOrder::AckOnly => self.hub.dispatch(ack),
            CompletionOrder::AnswerOnly => self.hub.dispatch(answer),
            CompletionOrder::Silent => {}
        }
        Ok(json!({"ack": "ok"}))
    }

    fn handle_start(&self) -> Result<Value> {
        let room = (*self.room.read()).unwrap_or_default();
        self.hub.dispatch(PluginEvent::Message {
            data: json!({"videoroom": "event", "room": room, "started": "ok"}),
            jsep: None,
        });
        self.hub.dispatch(PluginEvent::RemoteTrack {
            track: MediaTrack::new("remote-audio", MediaKind::Audio),
            mid: Some("0".to_string()),
            added: true,
        });
        self.hub.dispatch(PluginEvent::RemoteTrack {
            track: MediaTrack::new("remote-video", MediaKind::Video),
            mid: Some("1".to_string()),
            added: true,
        });
        Ok(json!({"ack": "ok"}))
    }

    /// Whether a remote description has been applied on this channel.
    pub fn remote_applied(&self) -> bool {
        self.remote_applied.load(Ordering::SeqCst)
    }

    fn handle_keepalive(&self) -> Result<Value> {
        self.core.keepalive_count.fetch_add(1, Ordering::SeqCst);
        let fail = self
            .core
            .fail_keepalives
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if fail {
            return Err(SignalingError::Send(
                "scripted keepalive failure".to_string(),
            ));
        }
        Ok(json!({"ack": "ok"}))
    }
}

#[async_trait]
impl PluginChannel for MockChannel {
    async fn send(&self, body: Value, _jsep: Option<&Jsep>) -> Result<Value> {
        let request = body
            .get("request")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        match request.as_str() {
            "join" => self.handle_join(&body),
            "configure" => self.handle_configure(),
            "start" => self.handle_start(),
            "listparticipants" => {
                let room = body.get("room").and_then(Value::as_u64).unwrap_or_default();
                Ok(json!({"participants": self.core.list_participants(room)}))
            }
            "keepalive" => self.handle_keepalive(),
            other => {
                debug!("mock ignoring request {:?}", other);
                Ok(json!({"ack": "ok"}))
            }
        }
    }

    async fn create_offer(&self, tracks: &[TrackSpec]) -> Result<Jsep> {
        for spec in tracks {
            if spec.capture {
                self.hub.dispatch(PluginEvent::LocalTrack {
                    track: MediaTrack::new(format!("local-{:?}", spec.kind), spec.kind),
                    added: true,
                });
            }
        }
        Ok(Jsep::offer("v=0 mock local offer"))
    }

    async fn create_answer(&self, remote: &Jsep) -> Result<Jsep> {
        if remote.kind != JsepType::Offer {
            return Err(SignalingError::Negotiation(
                "remote description is not an offer".to_string(),
            ));
        }
        Ok(Jsep::answer("v=0 mock local answer"))
    }

    async fn apply_remote_description(&self, remote: &Jsep) -> Result<()> {
        if remote.kind != JsepType::Answer {
            return Err(SignalingError::Negotiation(
                "remote description is not an answer".to_string(),
            ));
        }
        self.remote_applied.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn subscribe(&self) -> EventSubscription {
        self.hub.subscribe()
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.hub.unsubscribe(id);
    }

    async fn leave(&self) -> Result<()> {
        let room = *self.room.read();
        let participant = self.participant.write().take();
        if let (Some(room), Some(participant)) = (room, participant) {
            self.core.remove_participant(room, participant);
            self.core.cleanup_subscribers(room);
        }
        self.hub.dispatch(PluginEvent::Cleanup);
        Ok(())
    }

    async fn detach(&self) -> Result<()> {
        *self.room.write() = None;
        Ok(())
    }
}

// ============================================================================
// Condition-based waiting
// ============================================================================

/// Wait for a condition with timeout.
pub async fn wait_for<F>(mut check: F, max_wait: Duration) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + max_wait;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

/// Wait until a negotiation-state watch satisfies `pred`.
pub async fn wait_for_state(
    mut rx: watch::Receiver<NegotiationState>,
    pred: impl Fn(&NegotiationState) -> bool,
    max_wait: Duration,
) -> bool {
    let wait = async {
        loop {
            if pred(&rx.borrow_and_update()) {
                return true;
            }
            if rx.changed().await.is_err() {
                return false;
            }
        }
    };
    tokio::time::timeout(max_wait, wait).await.unwrap_or(false)
}
