//! Signaling session lifecycle

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info, warn};

use roomcast_core::ConnectionState;
use roomcast_signaling::{
    AttachOptions, PluginChannel, PluginKind, ServerConfig, SignalingConnector, SignalingSession,
};

use crate::error::{ClientError, Result};

/// Owns the signaling session lifecycle for one logical client.
///
/// State machine: `Disconnected -> Initialized -> Connected ->
/// Disconnected`. At most one live session per manager;
/// [`attach_plugin`](Self::attach_plugin) only succeeds while
/// `Connected`.
pub struct SessionManager {
    config: ServerConfig,
    connector: Arc<dyn SignalingConnector>,
    state: RwLock<ConnectionState>,
    session: RwLock<Option<Arc<dyn SignalingSession>>>,
    last_error: RwLock<Option<String>>,
}

impl SessionManager {
    pub fn new(config: ServerConfig, connector: Arc<dyn SignalingConnector>) -> Self {
        Self {
            config,
            connector,
            state: RwLock::new(ConnectionState::Disconnected),
            session: RwLock::new(None),
            last_error: RwLock::new(None),
        }
    }

    /// Run the backend handshake. Idempotent once initialized.
    pub async fn initialize(&self) -> Result<()> {
        if *self.state.read() != ConnectionState::Disconnected {
            return Ok(());
        }

        match self.connector.handshake(&self.config).await {
            Ok(()) => {
                *self.state.write() = ConnectionState::Initialized;
                info!("signaling initialized for {}", self.config.server_url);
                Ok(())
            }
            Err(e) => {
                self.record_error(&e);
                Err(ClientError::TransportInit(e.to_string()))
            }
        }
    }

    /// Establish a session, initializing first when needed. Returns
    /// the existing session when already connected.
    pub async fn connect(&self) -> Result<Arc<dyn SignalingSession>> {
        if let Some(session) = self.session.read().clone() {
            return Ok(session);
        }

        self.initialize().await?;

        match self.connector.create_session().await {
            Ok(session) => {
                *self.session.write() = Some(Arc::clone(&session));
                *self.state.write() = ConnectionState::Connected;
                info!("signaling session established");
                Ok(session)
            }
            Err(e) => {
                self.record_error(&e);
                Err(ClientError::Connect(e.to_string()))
            }
        }
    }

    /// Attach a plugin within the current session.
    pub async fn attach_plugin(
        &self,
        plugin: PluginKind,
        options: AttachOptions,
    ) -> Result<Arc<dyn PluginChannel>> {
        if *self.state.read() != ConnectionState::Connected {
            return Err(ClientError::NoActiveSession);
        }
        let session = self
            .session
            .read()
            .clone()
            .ok_or(ClientError::NoActiveSession)?;

        match session.attach(plugin, options).await {
            Ok(channel) => {
                debug!("attached {} plugin", plugin.as_str());
                Ok(channel)
            }
            Err(e) => {
                self.record_error(&e);
                Err(ClientError::Attach(e.to_string()))
            }
        }
    }

    /// Tear the session down. Destroying the session implicitly
    /// detaches its plugins; failures are logged, never propagated, so
    /// this is safe to call during teardown.
    pub async fn disconnect(&self) {
        let session = self.session.write().take();
        if let Some(session) = session {
            if let Err(e) = session.destroy().await {
                warn!("session destroy failed during disconnect: {}", e);
            }
        }
        *self.state.write() = ConnectionState::Disconnected;
        debug!("signaling disconnected");
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn session(&self) -> Option<Arc<dyn SignalingSession>> {
        self.session.read().clone()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Most recent transport-level failure, if any.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    fn record_error(&self, error: &dyn std::fmt::Display) {
        *self.last_error.write() = Some(error.to_string());
    }
}
