//! Signaling capability trait definitions

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use roomcast_core::{Jsep, TrackSpec};

use crate::config::ServerConfig;
use crate::error::Result;
use crate::events::{EventSubscription, SubscriptionId};

/// Kind of server-side plugin an attachment binds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum PluginKind {
    /// Many-to-many room with publisher/subscriber roles.
    VideoRoom,
    /// One-way mountpoint streaming.
    Streaming,
}

impl PluginKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PluginKind::VideoRoom => "videoroom",
            PluginKind::Streaming => "streaming",
        }
    }
}

/// Options for a plugin attachment.
#[derive(Debug, Clone, Default)]
pub struct AttachOptions {
    /// Opaque client-chosen identifier echoed back by the server,
    /// useful for correlating logs.
    pub opaque_id: Option<String>,
}

impl AttachOptions {
    pub fn with_opaque_id(opaque_id: impl Into<String>) -> Self {
        Self {
            opaque_id: Some(opaque_id.into()),
        }
    }
}

/// Entry point to a signaling backend.
#[async_trait]
pub trait SignalingConnector: Send + Sync {
    /// Perform the backend's construction-time handshake. Idempotence
    /// is the caller's concern; implementations may be called once.
    async fn handshake(&self, config: &ServerConfig) -> Result<()>;

    /// Request a new session from the server.
    async fn create_session(&self) -> Result<Arc<dyn SignalingSession>>;
}

/// A live session on the signaling server.
#[async_trait]
pub trait SignalingSession: Send + Sync {
    /// Attach a plugin within this session.
    async fn attach(
        &self,
        plugin: PluginKind,
        options: AttachOptions,
    ) -> Result<Arc<dyn PluginChannel>>;

    /// Destroy the session. Destroying a session implicitly detaches
    /// any plugins still attached to it.
    async fn destroy(&self) -> Result<()>;
}

/// A plugin attachment: the channel join/publish/subscribe requests
/// flow through.
#[async_trait]
pub trait PluginChannel: Send + Sync {
    /// Send an arbitrary request body, optionally carrying a session
    /// description, and return the server's synchronous response.
    /// Structured rejections surface as
    /// [`SignalingError::Rejected`](crate::SignalingError::Rejected).
    async fn send(&self, body: Value, jsep: Option<&Jsep>) -> Result<Value>;

    /// Construct a local offer for the given tracks.
    async fn create_offer(&self, tracks: &[TrackSpec]) -> Result<Jsep>;

    /// Construct a local answer to a remote offer.
    async fn create_answer(&self, remote: &Jsep) -> Result<Jsep>;

    /// Apply a remote description (typically the answer to our offer).
    async fn apply_remote_description(&self, remote: &Jsep) -> Result<()>;

    /// Register for this attachment's event stream.
    fn subscribe(&self) -> EventSubscription;

    /// Release a previously registered subscription.
    fn unsubscribe(&self, id: SubscriptionId);

    /// Leave the room this attachment joined. Best-effort.
    async fn leave(&self) -> Result<()>;

    /// Detach the plugin from its session. Best-effort.
    async fn detach(&self) -> Result<()>;
}

impl std::fmt::Debug for dyn SignalingSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("dyn SignalingSession").finish_non_exhaustive()
    }
}

impl std::fmt::Debug for dyn PluginChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("dyn PluginChannel").finish_non_exhaustive()
    }
}
