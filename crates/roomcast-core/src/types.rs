//! Protocol-facing domain types

use serde::{Deserialize, Serialize};

use crate::media::MediaKind;

/// Room identifier, assigned by the room server's administrator.
pub type RoomId = u64;

/// Participant identifier, assigned by the room server upon join.
/// A subscriber targets a publisher's participant id as its feed.
pub type ParticipantId = u64;

/// Connectivity state of a signaling session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Initialized,
    Connected,
}

/// Role an attachment plays within a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Publisher,
    Subscriber,
}

/// Per-attachment negotiation state.
///
/// Publishers traverse `Joining -> Joined -> Configuring -> Negotiating
/// -> Published`; subscribers traverse `Joining -> Joined -> Discovering
/// -> SubscribeRequested -> Negotiating -> Subscribed`. Both end with
/// `Leaving -> Detached`. `Failed` is reachable from any non-terminal
/// state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NegotiationState {
    Joining,
    Joined,
    Configuring,
    Negotiating,
    Published,
    Discovering,
    SubscribeRequested,
    Subscribed,
    Leaving,
    Detached,
    Failed(String),
}

impl NegotiationState {
    /// Whether the attachment has reached a state it cannot leave.
    pub fn is_terminal(&self) -> bool {
        matches!(self, NegotiationState::Detached | NegotiationState::Failed(_))
    }
}

/// A room participant as reported by the server's participant listing.
///
/// Transient: membership and the `publisher` activation flag are two
/// independent server-side events, so a freshly joined participant may
/// be listed with `publisher == false` for a brief window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    /// True once the server has confirmed this participant is actively
    /// sending media.
    #[serde(default)]
    pub publisher: bool,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// Session-description artifact of the offer/answer exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Jsep {
    #[serde(rename = "type")]
    pub kind: JsepType,
    pub sdp: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsepType {
    Offer,
    Answer,
}

impl Jsep {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self { kind: JsepType::Offer, sdp: sdp.into() }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self { kind: JsepType::Answer, sdp: sdp.into() }
    }
}

/// Directionality of one media kind within an offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackSpec {
    #[serde(rename = "type")]
    pub kind: MediaKind,
    pub capture: bool,
    pub recv: bool,
}

impl TrackSpec {
    /// Send-only capture of the given kind (publisher side).
    pub fn capture(kind: MediaKind) -> Self {
        Self { kind, capture: true, recv: false }
    }

    /// Receive-only track of the given kind (subscriber side).
    pub fn recv(kind: MediaKind) -> Self {
        Self { kind, capture: false, recv: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn participant_defaults() {
        let p: Participant = serde_json::from_str(r#"{"id": 7}"#).unwrap();
        assert_eq!(p.id, 7);
        assert!(!p.publisher);
        assert!(p.display.is_none());
    }

    #[test]
    fn participant_role_tag() {
        let p: Participant =
            serde_json::from_str(r#"{"id": 3, "display": "cam", "publisher": true, "type": "publisher"}"#)
                .unwrap();
        assert!(p.publisher);
        assert_eq!(p.kind.as_deref(), Some("publisher"));
    }

    #[test]
    fn jsep_type_tagging() {
        let j = Jsep::offer("v=0");
        let json = serde_json::to_value(&j).unwrap();
        assert_eq!(json["type"], "offer");
        let back: Jsep = serde_json::from_value(json).unwrap();
        assert_eq!(back, j);
    }

    #[test]
    fn terminal_states() {
        assert!(NegotiationState::Detached.is_terminal());
        assert!(NegotiationState::Failed("x".into()).is_terminal());
        assert!(!NegotiationState::Published.is_terminal());
    }
}
