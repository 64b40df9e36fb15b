//! Asset propagation rules.
//!
//! One rule per asset archetype decides how a change in an asset's flow moves
//! downstream:
//!
//! | archetype | behaviour |
//! |---|---|
//! | Pipe | same flow as `ExpectedFlowVolume`, delivered after the pipe's transit time |
//! | Junction | flow split across outlets by `FlowCapacity`, written as each outlet's `FlowVolume` |
//! | Pump | same flow as `ExpectedFlowVolume`, immediately |
//! | Valve | same flow when open, nothing when closed |
//! | Reservoir, Tap | terminal |

mod outcome;
mod physics;

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use aqueduct_repository::TwinGraph;
use aqueduct_shared::properties::{
    DIAMETER, EXPECTED_FLOW_VOLUME, FLOW_CAPACITY, FLOW_VOLUME, LENGTH, OPEN_STATUS,
};
use aqueduct_shared::{Archetype, ChangeNotification, Patch, PatchOp, RelationKind, Twin, TwinId};

use crate::errors::EngineError;
use crate::scheduler::DelayScheduler;
use crate::writer::write_property;

pub use outcome::{Forward, Propagation, SkipReason};
pub use physics::{junction_split, pipe_transit_seconds};

/// Applies the per-archetype propagation rules.
#[derive(Clone)]
pub struct PropagationRules {
    graph: Arc<dyn TwinGraph>,
    scheduler: DelayScheduler,
}

impl PropagationRules {
    pub fn new(graph: Arc<dyn TwinGraph>, scheduler: DelayScheduler) -> Self {
        Self { graph, scheduler }
    }

    /// Propagate `flow`, the new flow of `asset`, downstream.
    ///
    /// `trigger` is the notification that carried the change; its instance and
    /// hop count travel with any delayed update.
    #[instrument(skip(self, asset, trigger), fields(twin_id = %asset.id, archetype = %asset.archetype))]
    pub async fn propagate(
        &self,
        asset: &Twin,
        flow: f64,
        trigger: &ChangeNotification,
    ) -> Result<Propagation, EngineError> {
        match asset.archetype {
            Archetype::Pipe => self.pipe(asset, flow, trigger).await,
            Archetype::Junction => self.junction(asset, flow).await,
            Archetype::Pump => self.forward(asset, flow).await,
            Archetype::Valve => {
                if is_open(asset.get(OPEN_STATUS)) {
                    self.forward(asset, flow).await
                } else {
                    debug!(twin_id = %asset.id, "Valve closed, flow blocked");
                    Ok(Propagation::Blocked)
                }
            }
            Archetype::Reservoir | Archetype::Tap => Ok(Propagation::Terminal),
            Archetype::Device | Archetype::Area | Archetype::Region => {
                debug!(twin_id = %asset.id, "Not an asset, nothing to propagate");
                Ok(Propagation::Terminal)
            }
        }
    }

    async fn pipe(
        &self,
        pipe: &Twin,
        flow: f64,
        trigger: &ChangeNotification,
    ) -> Result<Propagation, EngineError> {
        let Some(diameter) = pipe.get_f64(DIAMETER) else {
            info!(twin_id = %pipe.id, "Pipe has no Diameter, skipping");
            return Ok(Propagation::Skipped(SkipReason::MissingProperty(DIAMETER)));
        };
        let Some(length) = pipe.get_f64(LENGTH) else {
            info!(twin_id = %pipe.id, "Pipe has no Length, skipping");
            return Ok(Propagation::Skipped(SkipReason::MissingProperty(LENGTH)));
        };
        let Some(delay_seconds) = pipe_transit_seconds(diameter, length, flow) else {
            debug!(twin_id = %pipe.id, flow, "No finite transit time, skipping");
            return Ok(Propagation::Skipped(SkipReason::DegenerateFlow));
        };

        let Some(target_id) = self.single_downstream(pipe).await? else {
            return Ok(Propagation::Skipped(SkipReason::NoDownstream));
        };
        let Some(target) = self.graph.get_twin(&target_id).await? else {
            info!(twin_id = %pipe.id, target = %target_id, "Downstream twin not found");
            return Ok(Propagation::Skipped(SkipReason::MissingDownstream(target_id)));
        };

        let op = PatchOp::for_presence(target.has(EXPECTED_FLOW_VOLUME));
        let update = self
            .scheduler
            .schedule(
                &trigger.instance,
                &target.id,
                &target.model_id,
                Patch::new(op, EXPECTED_FLOW_VOLUME, flow),
                delay_seconds,
                trigger.hops,
            )
            .await?;

        Ok(Propagation::Scheduled {
            delay_seconds,
            update,
        })
    }

    async fn junction(&self, junction: &Twin, flow: f64) -> Result<Propagation, EngineError> {
        let outlets = self
            .graph
            .get_relationships(&junction.id, RelationKind::FlowingTo)
            .await?;
        if outlets.is_empty() {
            info!(twin_id = %junction.id, "Junction has no downstream, skipping");
            return Ok(Propagation::Skipped(SkipReason::NoDownstream));
        }

        let mut targets: Vec<TwinId> = Vec::with_capacity(outlets.len());
        let mut capacities: Vec<f64> = Vec::with_capacity(outlets.len());
        for outlet in outlets {
            match self.graph.get_twin(&outlet).await? {
                Some(twin) => match twin.get_f64(FLOW_CAPACITY) {
                    Some(capacity) => {
                        targets.push(twin.id);
                        capacities.push(capacity);
                    }
                    None => debug!(target = %outlet, "Outlet has no FlowCapacity, excluded"),
                },
                None => info!(target = %outlet, "Outlet twin not found, excluded"),
            }
        }

        let Some(split) = junction_split(flow, &capacities) else {
            info!(twin_id = %junction.id, "Junction outlets have no capacity, skipping");
            return Ok(Propagation::Skipped(SkipReason::NoCapacity));
        };

        let mut forwards = Vec::with_capacity(targets.len());
        for (twin_id, share) in targets.into_iter().zip(split) {
            let outcome = write_property(self.graph.as_ref(), &twin_id, FLOW_VOLUME, share).await?;
            forwards.push(Forward {
                twin_id,
                flow: share,
                outcome,
            });
        }
        Ok(Propagation::Forwarded(forwards))
    }

    async fn forward(&self, asset: &Twin, flow: f64) -> Result<Propagation, EngineError> {
        let Some(target_id) = self.single_downstream(asset).await? else {
            return Ok(Propagation::Skipped(SkipReason::NoDownstream));
        };
        let outcome =
            write_property(self.graph.as_ref(), &target_id, EXPECTED_FLOW_VOLUME, flow).await?;
        Ok(Propagation::Forwarded(vec![Forward {
            twin_id: target_id,
            flow,
            outcome,
        }]))
    }

    /// The `flowingTo` target of a single-outlet asset.
    async fn single_downstream(&self, asset: &Twin) -> Result<Option<TwinId>, EngineError> {
        let mut targets = self
            .graph
            .get_relationships(&asset.id, RelationKind::FlowingTo)
            .await?;
        if targets.is_empty() {
            info!(twin_id = %asset.id, "No downstream asset, skipping");
            return Ok(None);
        }
        if targets.len() > 1 {
            warn!(
                twin_id = %asset.id,
                outlets = targets.len(),
                "Single-outlet asset has several downstream assets, using the first"
            );
        }
        Ok(Some(targets.swap_remove(0)))
    }
}

/// A valve is open only when `OpenStatus` is `1` or `true`.
fn is_open(status: Option<&Value>) -> bool {
    match status {
        Some(Value::Bool(open)) => *open,
        Some(value) => value.as_f64() == Some(1.0),
        None => false,
    }
}
