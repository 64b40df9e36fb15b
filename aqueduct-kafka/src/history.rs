use std::sync::Arc;

use async_trait::async_trait;

use aqueduct_repository::{HistorySink, TransportError};
use aqueduct_shared::HistoryRecord;

use crate::producer::JsonProducer;

/// History egress keyed by twin id.
pub struct KafkaHistorySink {
    producer: Arc<JsonProducer>,
}

impl KafkaHistorySink {
    pub fn new(producer: JsonProducer) -> Self {
        Self {
            producer: Arc::new(producer),
        }
    }
}

#[async_trait]
impl HistorySink for KafkaHistorySink {
    async fn record(&self, record: &HistoryRecord) -> Result<(), TransportError> {
        let producer = Arc::clone(&self.producer);
        let record = record.clone();

        tokio::task::spawn_blocking(move || producer.send_and_flush(&record.twin_id, &record, &[]))
            .await
            .map_err(|e| TransportError::send(e.to_string()))??;
        Ok(())
    }
}
