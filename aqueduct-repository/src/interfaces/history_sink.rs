use async_trait::async_trait;

use aqueduct_shared::HistoryRecord;

use crate::errors::TransportError;

/// Downstream sink for flattened notification history.
#[async_trait]
pub trait HistorySink: Send + Sync {
    async fn record(&self, record: &HistoryRecord) -> Result<(), TransportError>;
}
