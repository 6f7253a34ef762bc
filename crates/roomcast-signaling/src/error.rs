//! Signaling error types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SignalingError>;

#[derive(Error, Debug)]
pub enum SignalingError {
    #[error("handshake failed: {0}")]
    Handshake(String),

    #[error("session creation failed: {0}")]
    SessionCreate(String),

    #[error("plugin attach failed: {0}")]
    Attach(String),

    #[error("send failed: {0}")]
    Send(String),

    /// Structured rejection from the server, with its error code.
    #[error("request rejected: {reason} (code {code})")]
    Rejected { code: u64, reason: String },

    #[error("negotiation primitive failed: {0}")]
    Negotiation(String),

    #[error("channel closed")]
    Closed,
}

impl SignalingError {
    /// Server-assigned rejection code, if this is a structured rejection.
    pub fn code(&self) -> Option<u64> {
        match self {
            SignalingError::Rejected { code, .. } => Some(*code),
            _ => None,
        }
    }
}
