//! Scheduled-delivery transport trait.

use std::time::Duration;

use async_trait::async_trait;

use aqueduct_shared::DelayedUpdate;

use crate::errors::TransportError;

/// Hands a delayed update to a transport for delivery no earlier than `delay`
/// from now.
///
/// The engine owns no clock: delivery, redelivery and loss are the transport's
/// business. Implementations must not retry on the engine's behalf.
#[async_trait]
pub trait UpdateScheduler: Send + Sync {
    async fn schedule_after(
        &self,
        delay: Duration,
        update: DelayedUpdate,
    ) -> Result<(), TransportError>;
}
