//! Plugin event stream and subscription arena
//!
//! Each attached plugin owns an [`EventHub`]. Consumers register with
//! [`EventHub::subscribe`] and receive every subsequent event on their
//! own unbounded channel; releasing the subscription id (or dropping
//! the receiver) cancels delivery. Attachments collect their ids and
//! release them as a batch on teardown, which is what terminates their
//! event tasks.

use dashmap::DashMap;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use roomcast_core::{Jsep, MediaTrack};

pub type SubscriptionId = u64;

/// Tagged event delivered on a plugin's event stream.
#[derive(Debug, Clone)]
pub enum PluginEvent {
    /// Server message for this attachment, possibly carrying a session
    /// description.
    Message { data: Value, jsep: Option<Jsep> },
    /// A locally captured track was added to (or removed from) the
    /// attachment's media.
    LocalTrack { track: Arc<MediaTrack>, added: bool },
    /// A remote track arrived for (or was removed from) a subscribed
    /// feed.
    RemoteTrack {
        track: Arc<MediaTrack>,
        mid: Option<String>,
        added: bool,
    },
    /// The attachment's media state was torn down server-side. May be
    /// delivered more than once.
    Cleanup,
}

/// A live registration on an [`EventHub`].
pub struct EventSubscription {
    id: SubscriptionId,
    receiver: mpsc::UnboundedReceiver<PluginEvent>,
}

impl EventSubscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Next event, or `None` once the subscription has been released.
    pub async fn recv(&mut self) -> Option<PluginEvent> {
        self.receiver.recv().await
    }
}

/// Fan-out point for a plugin's events.
#[derive(Default)]
pub struct EventHub {
    subscribers: DashMap<SubscriptionId, mpsc::UnboundedSender<PluginEvent>>,
    next_id: AtomicU64,
}

impl EventHub {
    pub fn new() -> Self {
        Self {
            subscribers: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn subscribe(&self) -> EventSubscription {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.insert(id, tx);
        EventSubscription { id, receiver: rx }
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers.remove(&id);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Deliver an event to every live subscriber. Subscribers whose
    /// receiver is gone are dropped here; events delivered after a
    /// release are discarded rather than resurrecting the consumer.
    pub fn dispatch(&self, event: PluginEvent) {
        self.subscribers
            .retain(|_, tx| tx.send(event.clone()).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn subscribe_receives_dispatched_events() {
        let hub = EventHub::new();
        let mut sub = hub.subscribe();
        hub.dispatch(PluginEvent::Message {
            data: json!({"videoroom": "joined"}),
            jsep: None,
        });
        match sub.recv().await {
            Some(PluginEvent::Message { data, .. }) => {
                assert_eq!(data["videoroom"], "joined");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn unsubscribe_closes_stream() {
        let hub = EventHub::new();
        let mut sub = hub.subscribe();
        let id = sub.id();
        hub.unsubscribe(id);
        assert!(sub.recv().await.is_none());
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn dispatch_after_drop_prunes_subscriber() {
        let hub = EventHub::new();
        let sub = hub.subscribe();
        drop(sub);
        hub.dispatch(PluginEvent::Cleanup);
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn ids_are_distinct() {
        let hub = EventHub::new();
        let a = hub.subscribe();
        let b = hub.subscribe();
        assert_ne!(a.id(), b.id());
    }
}
