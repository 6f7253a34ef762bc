//! Server configuration surface
//!
//! Supplied once at session-manager construction: the signaling server
//! endpoint plus the network-traversal helper endpoints handed to the
//! media layer during negotiation.

use serde::{Deserialize, Serialize};

/// A network-traversal helper endpoint (STUN/TURN).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServer {
    pub urls: String,
}

impl IceServer {
    pub fn new(urls: impl Into<String>) -> Self {
        Self { urls: urls.into() }
    }
}

/// Signaling server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Signaling server endpoint URL.
    pub server_url: String,
    /// Network-traversal helpers, in preference order.
    #[serde(default)]
    pub ice_servers: Vec<IceServer>,
}

impl ServerConfig {
    /// Configuration with the default public STUN helpers.
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            ice_servers: vec![
                IceServer::new("stun:stun.l.google.com:19302"),
                IceServer::new("stun:stun1.l.google.com:19302"),
            ],
        }
    }

    pub fn with_ice_servers(mut self, ice_servers: Vec<IceServer>) -> Self {
        self.ice_servers = ice_servers;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ice_servers() {
        let config = ServerConfig::new("wss://gateway.example.com/ws");
        assert_eq!(config.ice_servers.len(), 2);
        assert!(config.ice_servers[0].urls.starts_with("stun:"));
    }

    #[test]
    fn ice_servers_replaceable() {
        let config = ServerConfig::new("wss://gateway.example.com/ws")
            .with_ice_servers(vec![IceServer::new("turn:turn.example.com:3478")]);
        assert_eq!(config.ice_servers.len(), 1);
    }
}
