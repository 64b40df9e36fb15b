//! Event routing.
//!
//! Dispatches a change notification by the twin's archetype and the property
//! that changed:
//!
//! - device `VolumeFlow` → [`AttachmentResolver`]
//! - asset `FlowVolume` or `ExpectedFlowVolume` → [`PropagationRules`]
//! - asset `FlowCondition` → [`StatusAggregator`]
//!
//! A notification can trigger both propagation and aggregation. Anything else
//! is ignored.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use aqueduct_repository::{HistorySink, TwinGraph, UpdateScheduler};
use aqueduct_shared::properties::{EXPECTED_FLOW_VOLUME, FLOW_CONDITION, FLOW_VOLUME, VOLUME_FLOW};
use aqueduct_shared::{Archetype, ChangeNotification, DelayedUpdate, HistoryRecord, Patch};

use crate::aggregator::{AreaStatus, StatusAggregator};
use crate::errors::EngineError;
use crate::resolver::{AttachmentResolver, Resolution};
use crate::rules::{Propagation, PropagationRules};
use crate::scheduler::DelayScheduler;
use crate::writer::{write_property, WriteOutcome};

/// What a handler did for one notification.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    Resolved(Resolution),
    Propagated(Propagation),
    Aggregated(Vec<AreaStatus>),
}

pub struct EventRouter {
    graph: Arc<dyn TwinGraph>,
    resolver: AttachmentResolver,
    rules: PropagationRules,
    aggregator: StatusAggregator,
    history: Option<Arc<dyn HistorySink>>,
}

impl EventRouter {
    pub fn new(graph: Arc<dyn TwinGraph>, transport: Arc<dyn UpdateScheduler>) -> Self {
        let scheduler = DelayScheduler::new(transport);
        Self {
            resolver: AttachmentResolver::new(graph.clone()),
            rules: PropagationRules::new(graph.clone(), scheduler),
            aggregator: StatusAggregator::new(graph.clone()),
            graph,
            history: None,
        }
    }

    /// Record every routed notification to `sink`.
    pub fn with_history(mut self, sink: Arc<dyn HistorySink>) -> Self {
        self.history = Some(sink);
        self
    }

    /// Route one change notification to its handlers.
    ///
    /// Malformed notifications (unknown model id, non-numeric trigger value)
    /// are skipped with a warning and return no dispatches.
    #[instrument(skip(self, notification), fields(twin_id = %notification.twin_id, hops = notification.hops))]
    pub async fn route(
        &self,
        notification: &ChangeNotification,
    ) -> Result<Vec<Dispatch>, EngineError> {
        let archetype = match Archetype::from_model_id(&notification.model_id) {
            Ok(archetype) => archetype,
            Err(e) => {
                warn!(error = %e, "Skipping notification with unknown model");
                return Ok(Vec::new());
            }
        };

        let mut dispatches = Vec::new();
        if archetype == Archetype::Device {
            if let Some(patch) = notification.find_patch(VOLUME_FLOW) {
                let Some(measured) = numeric(patch) else {
                    return Ok(Vec::new());
                };
                let resolution = self
                    .resolver
                    .resolve(&notification.twin_id, measured)
                    .await?;
                dispatches.push(Dispatch::Resolved(resolution));
            }
        } else if archetype.is_asset() {
            if let Some(patch) = notification.find_any(&[FLOW_VOLUME, EXPECTED_FLOW_VOLUME]) {
                let Some(flow) = numeric(patch) else {
                    return Ok(Vec::new());
                };
                match self.graph.get_twin(&notification.twin_id).await? {
                    Some(asset) => {
                        let propagation = self.rules.propagate(&asset, flow, notification).await?;
                        dispatches.push(Dispatch::Propagated(propagation));
                    }
                    None => info!("Changed asset no longer in the graph"),
                }
            }

            if let Some(patch) = notification.find_patch(FLOW_CONDITION) {
                match whole(patch) {
                    Some(condition) => {
                        let areas = self
                            .aggregator
                            .aggregate(&notification.twin_id, condition)
                            .await?;
                        dispatches.push(Dispatch::Aggregated(areas));
                    }
                    None => warn!(value = %patch.value, "Skipping non-integral FlowCondition"),
                }
            }
        }

        if dispatches.is_empty() {
            debug!(archetype = %archetype, "Notification not relevant, ignored");
        }
        self.record_history(notification).await;
        Ok(dispatches)
    }

    /// Apply a delayed update that came due.
    ///
    /// The op is re-derived from the twin's current state and the write is
    /// skipped when the value is already stored.
    #[instrument(skip(self, update), fields(twin_id = %update.twin_id, hops = update.hops))]
    pub async fn deliver(&self, update: &DelayedUpdate) -> Result<WriteOutcome, EngineError> {
        let Some(property) = update.patch.property() else {
            warn!(path = %update.patch.path, "Skipping delayed update with nested path");
            return Ok(WriteOutcome::Unchanged);
        };
        let outcome = write_property(
            self.graph.as_ref(),
            &update.twin_id,
            property,
            update.patch.value.clone(),
        )
        .await?;
        if outcome == WriteOutcome::Missing {
            info!("Delayed update target no longer in the graph");
        }
        Ok(outcome)
    }

    async fn record_history(&self, notification: &ChangeNotification) {
        if let Some(sink) = &self.history {
            let record = HistoryRecord::from_notification(notification);
            if let Err(e) = sink.record(&record).await {
                warn!(error = %e, "Failed to record history");
            }
        }
    }
}

fn numeric(patch: &Patch) -> Option<f64> {
    let value = patch.value.as_f64();
    if value.is_none() {
        warn!(path = %patch.path, value = %patch.value, "Skipping non-numeric trigger value");
    }
    value
}

fn whole(patch: &Patch) -> Option<i64> {
    patch.value.as_i64().or_else(|| {
        patch
            .value
            .as_f64()
            .filter(|f| f.is_finite() && f.fract() == 0.0)
            .map(|f| f as i64)
    })
}
