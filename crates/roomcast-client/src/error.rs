//! Client error types

use thiserror::Error;

use roomcast_core::RoomId;
use roomcast_registry::RegistryError;
use roomcast_signaling::SignalingError;

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("signaling init failed: {0}")]
    TransportInit(String),

    #[error("connect failed: {0}")]
    Connect(String),

    #[error("no active session")]
    NoActiveSession,

    #[error("plugin attach failed: {0}")]
    Attach(String),

    #[error("negotiation failed: {0}")]
    Negotiation(String),

    /// Recoverable: the targeted feed exists but is not publishing
    /// yet. Consumed by the discovery retry loop, never surfaced.
    #[error("feed not yet ready")]
    FeedNotYetReady,

    /// Terminal: the discovery retry budget was exhausted without any
    /// participant being confirmed as publishing.
    #[error("no active publisher in room {0}")]
    NoActivePublisher(RoomId),

    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("media acquisition failed: {0}")]
    MediaAcquisition(String),

    #[error("signaling error: {0}")]
    Signaling(#[from] SignalingError),

    #[error("timed out waiting for {0}")]
    Timeout(&'static str),
}
