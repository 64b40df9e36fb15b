//! Delayed re-delivery of derived updates.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, instrument};

use aqueduct_repository::UpdateScheduler;
use aqueduct_shared::{DelayedUpdate, Patch};

use crate::errors::EngineError;

/// Builds delayed updates and hands each one to the transport exactly once.
///
/// Holds no retry state; a failed hand-off is returned to the caller.
#[derive(Clone)]
pub struct DelayScheduler {
    transport: Arc<dyn UpdateScheduler>,
}

impl DelayScheduler {
    pub fn new(transport: Arc<dyn UpdateScheduler>) -> Self {
        Self { transport }
    }

    /// Schedule `patch` against `twin_id` for delivery after `delay_seconds`.
    ///
    /// # Errors
    ///
    /// * `EngineError::InvalidDelay` - the delay is negative, NaN, infinite or
    ///   too large to represent
    /// * `EngineError::Transport` - the transport refused the update
    #[instrument(skip(self, patch), fields(path = %patch.path))]
    pub async fn schedule(
        &self,
        target_instance: &str,
        twin_id: &str,
        model_id: &str,
        patch: Patch,
        delay_seconds: f64,
        hops: u32,
    ) -> Result<DelayedUpdate, EngineError> {
        if !delay_seconds.is_finite() || delay_seconds < 0.0 {
            return Err(EngineError::invalid_delay(format!(
                "{} seconds",
                delay_seconds
            )));
        }
        let delay = Duration::try_from_secs_f64(delay_seconds)
            .map_err(|e| EngineError::invalid_delay(e.to_string()))?;
        let deliver_at = chrono::Duration::from_std(delay)
            .ok()
            .and_then(|offset| Utc::now().checked_add_signed(offset))
            .ok_or_else(|| EngineError::invalid_delay(format!("{} seconds", delay_seconds)))?;

        let update = DelayedUpdate {
            target_instance: target_instance.to_string(),
            twin_id: twin_id.to_string(),
            model_id: model_id.to_string(),
            patch,
            deliver_at,
            hops,
        };

        self.transport.schedule_after(delay, update.clone()).await?;
        debug!(twin_id = %twin_id, delay_seconds, "Scheduled delayed update");
        Ok(update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aqueduct_repository::ManualScheduler;

    fn scheduler() -> (DelayScheduler, Arc<ManualScheduler>) {
        let manual = Arc::new(ManualScheduler::new());
        (DelayScheduler::new(manual.clone()), manual)
    }

    #[tokio::test]
    async fn test_rejects_invalid_delays() {
        let (scheduler, manual) = scheduler();
        for delay in [-1.0, f64::NAN, f64::INFINITY, f64::MAX] {
            let result = scheduler
                .schedule(
                    "aqueduct.test",
                    "pipe-2",
                    "dtmi:sample:aqueduct:asset:Pipe;1",
                    Patch::add("ExpectedFlowVolume", 5.0),
                    delay,
                    0,
                )
                .await;
            assert!(matches!(result, Err(EngineError::InvalidDelay(_))), "{}", delay);
        }
        assert_eq!(manual.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_hands_update_to_transport_once() {
        let (scheduler, manual) = scheduler();
        let before = Utc::now();
        let update = scheduler
            .schedule(
                "aqueduct.test",
                "pipe-2",
                "dtmi:sample:aqueduct:asset:Pipe;1",
                Patch::add("ExpectedFlowVolume", 5.0),
                90.0,
                2,
            )
            .await
            .unwrap();

        assert!(update.deliver_at >= before + chrono::Duration::seconds(90));
        assert_eq!(update.hops, 2);
        let pending = manual.pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].0, Duration::from_secs(90));
        assert_eq!(pending[0].1, update);
    }
}
