//! Scheduled delivery over Kafka.
//!
//! Delayed updates are written to the updates topic right away. The consuming
//! side holds each one until its `deliverAt` passes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, instrument};

use aqueduct_repository::{TransportError, UpdateScheduler};
use aqueduct_shared::DelayedUpdate;

use crate::producer::JsonProducer;
use crate::HEADER_DELAY_MS;

pub struct KafkaUpdateScheduler {
    producer: Arc<JsonProducer>,
}

impl KafkaUpdateScheduler {
    pub fn new(producer: JsonProducer) -> Self {
        Self {
            producer: Arc::new(producer),
        }
    }
}

#[async_trait]
impl UpdateScheduler for KafkaUpdateScheduler {
    #[instrument(skip(self, update), fields(twin_id = %update.twin_id))]
    async fn schedule_after(
        &self,
        delay: Duration,
        update: DelayedUpdate,
    ) -> Result<(), TransportError> {
        let producer = Arc::clone(&self.producer);
        let delay_ms = delay.as_millis().to_string();

        // Flushing blocks on librdkafka delivery reports
        tokio::task::spawn_blocking(move || {
            producer.send_and_flush(&update.twin_id, &update, &[(HEADER_DELAY_MS, &delay_ms)])
        })
        .await
        .map_err(|e| TransportError::send(e.to_string()))??;

        debug!(delay_ms = delay.as_millis() as u64, "Delayed update handed to Kafka");
        Ok(())
    }
}
