use std::sync::Mutex;

use async_trait::async_trait;

use aqueduct_shared::HistoryRecord;

use crate::errors::TransportError;
use crate::interfaces::HistorySink;

/// History sink that keeps every record in memory.
#[derive(Debug, Default)]
pub struct RecordingHistorySink {
    records: Mutex<Vec<HistoryRecord>>,
}

impl RecordingHistorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<HistoryRecord> {
        match self.records.lock() {
            Ok(records) => records.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl HistorySink for RecordingHistorySink {
    async fn record(&self, record: &HistoryRecord) -> Result<(), TransportError> {
        self.records
            .lock()
            .map_err(|_| TransportError::send("history buffer lock poisoned"))?
            .push(record.clone());
        Ok(())
    }
}
