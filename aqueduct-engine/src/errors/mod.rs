//! Error types for the propagation engine.

use aqueduct_repository::{GraphError, TransportError};
use thiserror::Error;

/// Errors raised while handling a notification or running the ingest loop.
///
/// Graph and transport failures propagate to the caller unchanged so the batch
/// is not acknowledged and the transport redelivers it.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Delay that is negative, NaN or infinite.
    #[error("Invalid delay: {0}")]
    InvalidDelay(String),

    /// Error parsing or decoding data.
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Kafka error: {0}")]
    KafkaError(String),

    /// Channel communication error.
    #[error("Channel error: {0}")]
    ChannelError(String),
}

impl EngineError {
    pub fn invalid_delay(msg: impl Into<String>) -> Self {
        Self::InvalidDelay(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    pub fn kafka(msg: impl Into<String>) -> Self {
        Self::KafkaError(msg.into())
    }

    pub fn channel(msg: impl Into<String>) -> Self {
        Self::ChannelError(msg.into())
    }
}

impl From<rdkafka::error::KafkaError> for EngineError {
    fn from(err: rdkafka::error::KafkaError) -> Self {
        Self::KafkaError(err.to_string())
    }
}
