//! Kafka plumbing for the aqueduct engine.
//!
//! Producer configuration shared by every egress, a JSON producer bound to a
//! topic, and the Kafka-backed implementations of the engine's scheduled
//! delivery and history interfaces.
//!
//! ## Usage
//!
//! ```ignore
//! use aqueduct_kafka::{JsonProducer, KafkaUpdateScheduler, ProducerConfig, TOPIC_TWIN_UPDATES};
//!
//! let config = ProducerConfig::from_env("localhost:9092", "aqueduct-engine");
//! let producer = JsonProducer::new(&config, TOPIC_TWIN_UPDATES)?;
//! let scheduler = KafkaUpdateScheduler::new(producer);
//! ```

use std::env;

use anyhow::Result;
use rdkafka::config::ClientConfig;

mod history;
mod producer;
mod scheduler;

pub use history::KafkaHistorySink;
pub use producer::{JsonProducer, ProducerError};
pub use scheduler::KafkaUpdateScheduler;

/// Ingress topic carrying twin change notifications.
pub const TOPIC_TWIN_CHANGES: &str = "twin-changes";

/// Scheduled delivery topic carrying delayed updates.
pub const TOPIC_TWIN_UPDATES: &str = "twin-updates";

/// History egress topic.
pub const TOPIC_TWIN_HISTORY: &str = "twin-history";

/// CloudEvents binary-mode headers on change notifications.
pub const HEADER_CE_SOURCE: &str = "ce_source";
pub const HEADER_CE_SUBJECT: &str = "ce_subject";
pub const HEADER_CE_TIME: &str = "ce_time";

/// Requested delay, in milliseconds, on scheduled updates.
pub const HEADER_DELAY_MS: &str = "delay-ms";

/// Configuration for creating a Kafka producer.
#[derive(Debug, Clone)]
pub struct ProducerConfig {
    /// Kafka broker address (e.g., "localhost:9092")
    pub broker: String,
    pub client_id: String,
    /// SASL username (enables SASL/SSL if set)
    pub username: Option<String>,
    pub password: Option<String>,
    /// Custom CA certificate in PEM format
    pub ssl_ca_pem: Option<String>,
}

impl ProducerConfig {
    pub fn new(broker: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            broker: broker.into(),
            client_id: client_id.into(),
            username: None,
            password: None,
            ssl_ca_pem: None,
        }
    }

    /// Create a ProducerConfig from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `KAFKA_BROKER` - Broker address (uses provided default if not set)
    /// - `KAFKA_USERNAME` - SASL username (optional)
    /// - `KAFKA_PASSWORD` - SASL password (optional)
    /// - `KAFKA_SSL_CA_PEM` - Custom CA cert in PEM format (optional)
    pub fn from_env(default_broker: &str, client_id: impl Into<String>) -> Self {
        Self {
            broker: env::var("KAFKA_BROKER").unwrap_or_else(|_| default_broker.to_string()),
            client_id: client_id.into(),
            username: env::var("KAFKA_USERNAME").ok(),
            password: env::var("KAFKA_PASSWORD").ok(),
            ssl_ca_pem: env::var("KAFKA_SSL_CA_PEM").ok(),
        }
    }

    pub fn with_credentials(mut self, username: String, password: String) -> Self {
        self.username = Some(username);
        self.password = Some(password);
        self
    }

    /// Whether SASL/SSL will be enabled.
    pub fn uses_sasl(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }
}

/// Create a Kafka producer with the given configuration.
///
/// Configures the producer with zstd compression, a short delivery timeout and
/// SASL/SSL authentication if credentials are provided.
pub fn create_producer_with_config(
    config: &ProducerConfig,
) -> Result<rdkafka::producer::BaseProducer> {
    let mut client_config = ClientConfig::new();

    client_config
        .set("bootstrap.servers", &config.broker)
        .set("client.id", &config.client_id)
        .set("compression.type", "zstd")
        .set("message.timeout.ms", "5000")
        .set("queue.buffering.max.messages", "100000")
        .set("queue.buffering.max.kbytes", "1048576");

    // Managed Kafka needs SASL/SSL; local development runs plaintext
    if let (Some(username), Some(password)) = (&config.username, &config.password) {
        client_config
            .set("security.protocol", "SASL_SSL")
            .set("sasl.mechanisms", "PLAIN")
            .set("sasl.username", username)
            .set("sasl.password", password);

        if let Some(ca_pem) = &config.ssl_ca_pem {
            client_config.set("ssl.ca.pem", ca_pem);
        }
    }

    Ok(client_config.create()?)
}

pub use rdkafka::producer::{BaseProducer, Producer};
