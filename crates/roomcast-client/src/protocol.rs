//! Room plugin protocol bodies
//!
//! The transport only moves opaque values; these are the typed request
//! bodies and server events the negotiation state machines exchange
//! over it, plus [`RoomChannel`], the thin typed facade over a raw
//! [`PluginChannel`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use roomcast_core::{Jsep, Participant, ParticipantId, RoomId, ERR_NO_SUCH_FEED};
use roomcast_signaling::{PluginChannel, SignalingError};

use crate::error::{ClientError, Result};

/// Role carried on join requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantType {
    Publisher,
    Subscriber,
}

/// Request bodies sent over the plugin channel.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "request", rename_all = "lowercase")]
pub enum RoomRequest {
    Join {
        room: RoomId,
        ptype: ParticipantType,
        #[serde(skip_serializing_if = "Option::is_none")]
        display: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        feed: Option<ParticipantId>,
    },
    Configure {
        audio: bool,
        video: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        audiocodec: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        videocodec: Option<String>,
    },
    Start,
    ListParticipants {
        room: RoomId,
    },
    KeepAlive,
}

/// An announced publisher, as carried on joined/event messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublisherInfo {
    pub id: ParticipantId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_codec: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_codec: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub talking: Option<bool>,
}

/// Server events, parsed from the message value by its tag.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "videoroom", rename_all = "lowercase")]
pub enum RoomEvent {
    Joined {
        #[serde(default)]
        id: Option<ParticipantId>,
        #[serde(default)]
        room: Option<RoomId>,
        #[serde(default)]
        publishers: Vec<PublisherInfo>,
    },
    Attached {
        #[serde(default)]
        id: Option<ParticipantId>,
        #[serde(default)]
        room: Option<RoomId>,
    },
    Event {
        #[serde(default)]
        configured: Option<String>,
        #[serde(default)]
        started: Option<String>,
        #[serde(default)]
        publishers: Option<Vec<PublisherInfo>>,
        #[serde(default)]
        error_code: Option<u64>,
        #[serde(default)]
        error: Option<String>,
        #[serde(default)]
        leaving: Option<Value>,
    },
    Leaving {
        #[serde(default)]
        room: Option<RoomId>,
    },
}

impl RoomEvent {
    /// Parse a message value; unknown shapes are ignored, not errors.
    pub fn parse(value: &Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }
}

/// Participant-list response body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ParticipantsResponse {
    #[serde(default)]
    pub participants: Vec<Participant>,
}

/// Typed facade over a raw plugin channel.
#[derive(Clone)]
pub struct RoomChannel {
    channel: Arc<dyn PluginChannel>,
}

impl std::fmt::Debug for RoomChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomChannel").finish_non_exhaustive()
    }
}

impl RoomChannel {
    pub fn new(channel: Arc<dyn PluginChannel>) -> Self {
        Self { channel }
    }

    pub fn raw(&self) -> &Arc<dyn PluginChannel> {
        &self.channel
    }

    async fn request(
        &self,
        request: &RoomRequest,
        jsep: Option<&Jsep>,
    ) -> roomcast_signaling::Result<Value> {
        let body = serde_json::to_value(request).map_err(|e| SignalingError::Send(e.to_string()))?;
        self.channel.send(body, jsep).await
    }

    pub async fn join_as_publisher(
        &self,
        room: RoomId,
        display: Option<String>,
    ) -> Result<Value> {
        let request = RoomRequest::Join {
            room,
            ptype: ParticipantType::Publisher,
            display,
            feed: None,
        };
        Ok(self.request(&request, None).await?)
    }

    /// Subscribe to `feed`. A structured feed-not-found rejection maps
    /// to the recoverable [`ClientError::FeedNotYetReady`].
    pub async fn join_as_subscriber(&self, room: RoomId, feed: ParticipantId) -> Result<Value> {
        let request = RoomRequest::Join {
            room,
            ptype: ParticipantType::Subscriber,
            display: None,
            feed: Some(feed),
        };
        self.request(&request, None).await.map_err(|e| match e {
            SignalingError::Rejected { code, .. } if code == ERR_NO_SUCH_FEED => {
                ClientError::FeedNotYetReady
            }
            other => ClientError::Signaling(other),
        })
    }

    pub async fn configure(&self, offer: &Jsep) -> Result<Value> {
        let request = RoomRequest::Configure {
            audio: true,
            video: true,
            audiocodec: Some("opus".to_string()),
            videocodec: Some("vp8".to_string()),
        };
        Ok(self.request(&request, Some(offer)).await?)
    }

    pub async fn start(&self, answer: &Jsep) -> Result<Value> {
        Ok(self.request(&RoomRequest::Start, Some(answer)).await?)
    }

    pub async fn list_participants(&self, room: RoomId) -> Result<Vec<Participant>> {
        let response = self.request(&RoomRequest::ListParticipants { room }, None).await?;
        let parsed: ParticipantsResponse = serde_json::from_value(response)
            .map_err(|e| ClientError::Negotiation(format!("bad participants response: {}", e)))?;
        Ok(parsed.participants)
    }

    pub async fn keepalive(&self) -> Result<Value> {
        Ok(self.request(&RoomRequest::KeepAlive, None).await?)
    }

    pub async fn leave(&self) -> Result<()> {
        Ok(self.channel.leave().await?)
    }

    pub async fn detach(&self) -> Result<()> {
        Ok(self.channel.detach().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn requests_carry_the_request_tag() {
        let join = RoomRequest::Join {
            room: 1234,
            ptype: ParticipantType::Publisher,
            display: Some("cam".into()),
            feed: None,
        };
        let body = serde_json::to_value(&join).unwrap();
        assert_eq!(body["request"], "join");
        assert_eq!(body["ptype"], "publisher");
        assert_eq!(body["room"], 1234);
        assert!(body.get("feed").is_none());

        let list = serde_json::to_value(&RoomRequest::ListParticipants { room: 9 }).unwrap();
        assert_eq!(list["request"], "listparticipants");

        let keepalive = serde_json::to_value(&RoomRequest::KeepAlive).unwrap();
        assert_eq!(keepalive["request"], "keepalive");
    }

    #[test]
    fn joined_event_parses() {
        let event = RoomEvent::parse(&json!({
            "videoroom": "joined",
            "room": 1234,
            "id": 77,
            "publishers": [{"id": 3, "display": "other"}]
        }))
        .unwrap();
        match event {
            RoomEvent::Joined { id, publishers, .. } => {
                assert_eq!(id, Some(77));
                assert_eq!(publishers.len(), 1);
                assert_eq!(publishers[0].id, 3);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn configured_event_parses() {
        let event = RoomEvent::parse(&json!({
            "videoroom": "event",
            "configured": "ok"
        }))
        .unwrap();
        match event {
            RoomEvent::Event { configured, .. } => assert_eq!(configured.as_deref(), Some("ok")),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn error_event_parses() {
        let event = RoomEvent::parse(&json!({
            "videoroom": "event",
            "error_code": 428,
            "error": "No such feed (7)"
        }))
        .unwrap();
        match event {
            RoomEvent::Event { error_code, error, .. } => {
                assert_eq!(error_code, Some(428));
                assert!(error.unwrap().contains("No such feed"));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn unknown_messages_are_ignored() {
        assert!(RoomEvent::parse(&json!({"videoroom": "talking", "id": 3})).is_none());
        assert!(RoomEvent::parse(&json!({"ack": "ok"})).is_none());
    }
}
