//! Transport error types for scheduled delivery and history egress.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Send error: {0}")]
    Send(String),
}

impl TransportError {
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    pub fn send(msg: impl Into<String>) -> Self {
        Self::Send(msg.into())
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
