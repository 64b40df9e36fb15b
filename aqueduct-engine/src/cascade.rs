//! In-process cascade driver.
//!
//! Routes an inbound event, then keeps draining the store's change feed and
//! routing whatever the handlers wrote until the cascade settles. Each drained
//! notification is one hop further than the one whose handling produced it;
//! anything past the hop limit is dropped.

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::{debug, warn};

use aqueduct_repository::ChangeFeed;
use aqueduct_shared::{ChangeNotification, DelayedUpdate};

use crate::consumer::InboundEvent;
use crate::errors::EngineError;
use crate::router::EventRouter;

/// Default maximum cascade depth.
pub const DEFAULT_MAX_HOPS: u32 = 64;

/// Counters for one handled event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CascadeReport {
    /// Notifications routed, including the inbound one.
    pub routed: usize,
    /// Delayed updates applied.
    pub delivered: usize,
    /// Notifications or updates dropped by the hop guard.
    pub dropped: usize,
}

pub struct Cascade {
    router: EventRouter,
    feed: Arc<dyn ChangeFeed>,
    max_hops: u32,
}

impl Cascade {
    pub fn new(router: EventRouter, feed: Arc<dyn ChangeFeed>) -> Self {
        Self {
            router,
            feed,
            max_hops: DEFAULT_MAX_HOPS,
        }
    }

    pub fn with_max_hops(mut self, max_hops: u32) -> Self {
        self.max_hops = max_hops;
        self
    }

    pub fn max_hops(&self) -> u32 {
        self.max_hops
    }

    pub async fn handle(&self, event: InboundEvent) -> Result<CascadeReport, EngineError> {
        match event {
            InboundEvent::Change(change) => self.handle_change(change).await,
            InboundEvent::Delayed(update) => self.handle_delayed(update).await,
        }
    }

    /// Route a change notification and everything it causes.
    pub async fn handle_change(
        &self,
        notification: ChangeNotification,
    ) -> Result<CascadeReport, EngineError> {
        let mut report = CascadeReport::default();
        self.settle(VecDeque::from([notification]), &mut report)
            .await?;
        Ok(report)
    }

    /// Apply a delayed update that came due and route what it changed.
    pub async fn handle_delayed(
        &self,
        update: DelayedUpdate,
    ) -> Result<CascadeReport, EngineError> {
        let mut report = CascadeReport::default();
        let hops = update.hops.saturating_add(1);
        if hops > self.max_hops {
            warn!(twin_id = %update.twin_id, hops, "Hop limit reached, dropping delayed update");
            report.dropped += 1;
            return Ok(report);
        }

        self.router.deliver(&update).await?;
        report.delivered += 1;

        let queue = self
            .feed
            .drain_changes()
            .into_iter()
            .map(|change| change.with_hops(hops))
            .collect();
        self.settle(queue, &mut report).await?;
        Ok(report)
    }

    async fn settle(
        &self,
        mut queue: VecDeque<ChangeNotification>,
        report: &mut CascadeReport,
    ) -> Result<(), EngineError> {
        while let Some(notification) = queue.pop_front() {
            if notification.hops > self.max_hops {
                warn!(
                    twin_id = %notification.twin_id,
                    hops = notification.hops,
                    "Hop limit reached, dropping notification"
                );
                report.dropped += 1;
                continue;
            }

            self.router.route(&notification).await?;
            report.routed += 1;

            let next_hops = notification.hops.saturating_add(1);
            queue.extend(
                self.feed
                    .drain_changes()
                    .into_iter()
                    .map(|change| change.with_hops(next_hops)),
            );
        }

        debug!(
            routed = report.routed,
            delivered = report.delivered,
            dropped = report.dropped,
            "Cascade settled"
        );
        Ok(())
    }
}
