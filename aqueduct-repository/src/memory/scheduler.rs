//! Scheduled delivery against a virtual clock.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use aqueduct_shared::DelayedUpdate;

use crate::errors::TransportError;
use crate::interfaces::UpdateScheduler;

#[derive(Debug)]
struct Pending {
    due: Duration,
    seq: u64,
    delay: Duration,
    update: DelayedUpdate,
}

#[derive(Debug, Default)]
struct ClockState {
    now: Duration,
    next_seq: u64,
    pending: Vec<Pending>,
}

/// Scheduler whose clock only moves when [`advance`](Self::advance) is called.
///
/// Updates become due at `now + delay` on the virtual clock. Ties release in
/// scheduling order.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    state: Mutex<ClockState>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward and return every update now due, earliest first.
    pub fn advance(&self, by: Duration) -> Vec<DelayedUpdate> {
        let mut state = self.lock();
        state.now += by;
        let now = state.now;

        let (mut due, waiting): (Vec<Pending>, Vec<Pending>) =
            state.pending.drain(..).partition(|p| p.due <= now);
        state.pending = waiting;

        due.sort_by_key(|p| (p.due, p.seq));
        due.into_iter().map(|p| p.update).collect()
    }

    /// Time elapsed on the virtual clock.
    pub fn elapsed(&self) -> Duration {
        self.lock().now
    }

    pub fn pending_count(&self) -> usize {
        self.lock().pending.len()
    }

    /// Requested delay and update of everything not yet released, in
    /// scheduling order.
    pub fn pending(&self) -> Vec<(Duration, DelayedUpdate)> {
        let state = self.lock();
        let mut pending: Vec<&Pending> = state.pending.iter().collect();
        pending.sort_by_key(|p| p.seq);
        pending
            .into_iter()
            .map(|p| (p.delay, p.update.clone()))
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, ClockState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl UpdateScheduler for ManualScheduler {
    async fn schedule_after(
        &self,
        delay: Duration,
        update: DelayedUpdate,
    ) -> Result<(), TransportError> {
        let mut state = self.lock();
        let due = state.now + delay;
        let seq = state.next_seq;
        state.next_seq += 1;
        state.pending.push(Pending {
            due,
            seq,
            delay,
            update,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aqueduct_shared::Patch;
    use chrono::Utc;

    fn update(twin_id: &str) -> DelayedUpdate {
        DelayedUpdate {
            target_instance: "aqueduct.test".to_string(),
            twin_id: twin_id.to_string(),
            model_id: "dtmi:sample:aqueduct:asset:Pipe;1".to_string(),
            patch: Patch::add("ExpectedFlowVolume", 1.0),
            deliver_at: Utc::now(),
            hops: 0,
        }
    }

    #[tokio::test]
    async fn test_releases_in_due_order() {
        let scheduler = ManualScheduler::new();
        scheduler
            .schedule_after(Duration::from_secs(30), update("slow"))
            .await
            .unwrap();
        scheduler
            .schedule_after(Duration::from_secs(10), update("fast"))
            .await
            .unwrap();
        scheduler
            .schedule_after(Duration::from_secs(10), update("fast-second"))
            .await
            .unwrap();

        assert!(scheduler.advance(Duration::from_secs(5)).is_empty());

        let released: Vec<String> = scheduler
            .advance(Duration::from_secs(5))
            .into_iter()
            .map(|u| u.twin_id)
            .collect();
        assert_eq!(released, vec!["fast", "fast-second"]);
        assert_eq!(scheduler.pending_count(), 1);

        let released = scheduler.advance(Duration::from_secs(60));
        assert_eq!(released[0].twin_id, "slow");
        assert_eq!(scheduler.elapsed(), Duration::from_secs(70));
    }

    #[tokio::test]
    async fn test_zero_delay_is_due_immediately() {
        let scheduler = ManualScheduler::new();
        scheduler
            .schedule_after(Duration::ZERO, update("now"))
            .await
            .unwrap();
        assert_eq!(scheduler.pending()[0].0, Duration::ZERO);
        assert_eq!(scheduler.advance(Duration::ZERO).len(), 1);
    }
}
