//! Roomcast Signaling
//!
//! Capability traits for the signaling transport. The wire protocol is
//! opaque to the rest of the workspace: a backend provides session
//! creation, plugin attachment, offer/answer construction primitives,
//! remote-description application, arbitrary request send, and a tagged
//! event stream per attached plugin. Real gateways and the in-process
//! test backend both implement these traits.

pub mod config;
pub mod error;
pub mod events;
pub mod traits;

pub use config::{IceServer, ServerConfig};
pub use error::{Result, SignalingError};
pub use events::{EventHub, EventSubscription, PluginEvent, SubscriptionId};
pub use traits::{AttachOptions, PluginChannel, PluginKind, SignalingConnector, SignalingSession};
