//! JSON producer bound to a single topic.

use std::time::Duration;

use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{BaseProducer, BaseRecord, Producer};
use serde::Serialize;
use thiserror::Error;

use aqueduct_repository::TransportError;

use crate::{create_producer_with_config, ProducerConfig};

const FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ProducerError {
    #[error("failed to create producer: {0}")]
    Creation(String),

    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to send message: {0}")]
    Send(rdkafka::error::KafkaError),

    #[error("failed to flush messages: {0}")]
    Flush(rdkafka::error::KafkaError),
}

impl From<ProducerError> for TransportError {
    fn from(err: ProducerError) -> Self {
        match err {
            ProducerError::Encode(e) => TransportError::serialization(e.to_string()),
            other => TransportError::send(other.to_string()),
        }
    }
}

/// Kafka producer writing JSON payloads to one topic.
pub struct JsonProducer {
    producer: BaseProducer,
    topic: String,
}

impl JsonProducer {
    pub fn new(config: &ProducerConfig, topic: &str) -> Result<Self, ProducerError> {
        let producer = create_producer_with_config(config)
            .map_err(|e| ProducerError::Creation(e.to_string()))?;
        Ok(Self::from_producer(producer, topic))
    }

    pub fn from_producer(producer: BaseProducer, topic: &str) -> Self {
        Self {
            producer,
            topic: topic.to_string(),
        }
    }

    /// Queue a message. Call [`flush`](Self::flush) to wait for delivery.
    pub fn send<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        headers: &[(&str, &str)],
    ) -> Result<(), ProducerError> {
        let payload = serde_json::to_vec(value)?;
        let headers = headers
            .iter()
            .fold(OwnedHeaders::new(), |acc, (name, value)| {
                acc.insert(Header {
                    key: *name,
                    value: Some(*value),
                })
            });

        let record = BaseRecord::to(&self.topic)
            .key(key)
            .payload(&payload)
            .headers(headers);

        self.producer
            .send(record)
            .map_err(|(e, _)| ProducerError::Send(e))
    }

    /// Block until every queued message is delivered or the timeout elapses.
    pub fn flush(&self) -> Result<(), ProducerError> {
        self.producer
            .flush(FLUSH_TIMEOUT)
            .map_err(ProducerError::Flush)
    }

    pub fn send_and_flush<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        headers: &[(&str, &str)],
    ) -> Result<(), ProducerError> {
        self.send(key, value, headers)?;
        self.flush()
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl std::fmt::Debug for JsonProducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonProducer")
            .field("topic", &self.topic)
            .finish_non_exhaustive()
    }
}
