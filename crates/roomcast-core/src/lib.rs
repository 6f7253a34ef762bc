//! Roomcast Core
//!
//! Shared types for the roomcast signaling client:
//! - Room and participant identifiers ([`RoomId`], [`ParticipantId`])
//! - Session and negotiation state enums ([`ConnectionState`], [`NegotiationState`])
//! - Offer/answer exchange artifacts ([`Jsep`], [`TrackSpec`])
//! - Media stream handles ([`MediaStream`], [`MediaTrack`])
//! - Timing utilities ([`time`])

pub mod media;
pub mod time;
pub mod types;

pub use media::{MediaKind, MediaStream, MediaTrack};
pub use types::*;

/// Keep-alive ping interval for a published attachment, in seconds.
pub const KEEPALIVE_INTERVAL_SECS: u64 = 30;

/// Maximum participant-list query rounds while waiting for a publisher
/// to become active.
pub const DISCOVERY_MAX_ATTEMPTS: u32 = 10;

/// Delay between discovery query rounds, in seconds.
pub const DISCOVERY_INTERVAL_SECS: u64 = 1;

/// Structured error code the server returns when a subscribe targets a
/// feed that is not (yet) publishing.
pub const ERR_NO_SUCH_FEED: u64 = 428;
