//! Roomcast Client Library
//!
//! High-level async client for publishing and watching live media
//! streams through a room-based signaling server:
//! - [`SessionManager`] - signaling session lifecycle
//! - [`RoomPublisher`] / [`RoomSubscriber`] - per-attachment
//!   negotiation state machines
//! - [`resolve_active_feed`] - retry-based discovery of an active
//!   publisher feed
//! - [`KeepAlive`] - liveness pings for a published attachment
//!
//! # Example
//!
//! ```ignore
//! use roomcast_client::{RetryPolicy, RoomPublisher, SessionManager};
//! use roomcast_signaling::ServerConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let manager = SessionManager::new(
//!         ServerConfig::new("wss://gateway.example.com/ws"),
//!         connector,
//!     );
//!     let publisher = RoomPublisher::join(&manager, registry, 1234, "cam-0").await?;
//!     publisher.publish(captured_stream).await?;
//!     Ok(())
//! }
//! ```

mod attachment;
pub mod discovery;
pub mod error;
pub mod keepalive;
pub mod protocol;
pub mod publisher;
pub mod session;
pub mod subscriber;

pub use discovery::{pick_active, poll_until, resolve_active_feed, RetryPolicy};
pub use error::{ClientError, Result};
pub use keepalive::{KeepAlive, KEEPALIVE_INTERVAL};
pub use protocol::{
    ParticipantType, ParticipantsResponse, PublisherInfo, RoomChannel, RoomEvent, RoomRequest,
};
pub use publisher::RoomPublisher;
pub use session::SessionManager;
pub use subscriber::RoomSubscriber;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::discovery::{resolve_active_feed, RetryPolicy};
    pub use crate::error::{ClientError, Result};
    pub use crate::publisher::RoomPublisher;
    pub use crate::session::SessionManager;
    pub use crate::subscriber::RoomSubscriber;
    pub use roomcast_core::{MediaStream, NegotiationState, Participant};
    pub use roomcast_signaling::ServerConfig;
}
