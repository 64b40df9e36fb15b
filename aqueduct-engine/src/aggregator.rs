//! Area and region status rollup.
//!
//! An area's `Status` is the highest severity among the flow conditions of its
//! assets. A region's `Status` is the highest `Status` among its areas. Regions
//! are only recomputed when an area's status actually changed.

use std::sync::Arc;

use tracing::{debug, info, instrument};

use aqueduct_repository::{TwinGraph, TwinQuery};
use aqueduct_shared::properties::{FLOW_CONDITION, STATUS};
use aqueduct_shared::{Archetype, ConditionCode, RelationKind, Severity, TwinId};

use crate::errors::EngineError;
use crate::writer::{PatchBuilder, WriteOutcome};

/// Highest severity of `severities`; [`Severity::None`] for an empty set.
pub fn rollup(severities: impl IntoIterator<Item = Severity>) -> Severity {
    severities.into_iter().max().unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionStatus {
    pub region_id: TwinId,
    pub severity: Severity,
    pub outcome: WriteOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AreaStatus {
    pub area_id: TwinId,
    pub severity: Severity,
    pub outcome: WriteOutcome,
    /// Regions recomputed because this area changed.
    pub regions: Vec<RegionStatus>,
}

#[derive(Clone)]
pub struct StatusAggregator {
    graph: Arc<dyn TwinGraph>,
}

impl StatusAggregator {
    pub fn new(graph: Arc<dyn TwinGraph>) -> Self {
        Self { graph }
    }

    /// Recompute the status of every area containing `asset_id`, whose flow
    /// condition just became `condition`.
    ///
    /// The store may not reflect the new condition yet, so the asset's stored
    /// value is ignored and `condition` is used instead.
    #[instrument(skip(self))]
    pub async fn aggregate(
        &self,
        asset_id: &str,
        condition: i64,
    ) -> Result<Vec<AreaStatus>, EngineError> {
        let areas = self
            .graph
            .get_relationships(asset_id, RelationKind::LocatedIn)
            .await?;
        if areas.is_empty() {
            info!(asset_id = %asset_id, "Asset is not located in an area");
            return Ok(Vec::new());
        }

        let changed = Severity::from_condition_code(condition);
        let mut statuses = Vec::with_capacity(areas.len());
        for area_id in areas {
            statuses.push(self.aggregate_area(area_id, asset_id, changed).await?);
        }
        Ok(statuses)
    }

    async fn aggregate_area(
        &self,
        area_id: TwinId,
        asset_id: &str,
        changed: Severity,
    ) -> Result<AreaStatus, EngineError> {
        let query = TwinQuery::new()
            .assets_only()
            .related_to(RelationKind::LocatedIn, area_id.clone())
            .where_ne(FLOW_CONDITION, ConditionCode::Normal);
        let abnormal = self.graph.query(&query).await?;

        let severity = rollup(
            abnormal
                .iter()
                .filter(|asset| asset.id != asset_id)
                .map(|asset| {
                    asset
                        .get_i64(FLOW_CONDITION)
                        .map(Severity::from_condition_code)
                        .unwrap_or_default()
                })
                .chain(std::iter::once(changed)),
        );

        let outcome = self.write_status(&area_id, severity).await?;
        debug!(area_id = %area_id, severity = ?severity, outcome = ?outcome, "Area status computed");

        let regions = if outcome == WriteOutcome::Written {
            self.aggregate_regions(&area_id).await?
        } else {
            Vec::new()
        };

        Ok(AreaStatus {
            area_id,
            severity,
            outcome,
            regions,
        })
    }

    async fn aggregate_regions(&self, area_id: &str) -> Result<Vec<RegionStatus>, EngineError> {
        let regions = self
            .graph
            .get_relationships(area_id, RelationKind::LocatedIn)
            .await?;

        let mut statuses = Vec::with_capacity(regions.len());
        for region_id in regions {
            let query = TwinQuery::new()
                .of_archetype(Archetype::Area)
                .related_to(RelationKind::LocatedIn, region_id.clone());
            let areas = self.graph.query(&query).await?;

            let severity = rollup(
                areas
                    .iter()
                    .map(|area| area.get(STATUS).map(Severity::from_value).unwrap_or_default()),
            );
            let outcome = self.write_status(&region_id, severity).await?;
            debug!(region_id = %region_id, severity = ?severity, outcome = ?outcome, "Region status computed");

            statuses.push(RegionStatus {
                region_id,
                severity,
                outcome,
            });
        }
        Ok(statuses)
    }

    /// Write `Status`, skipping unchanged values and `None` over an absent one.
    async fn write_status(
        &self,
        twin_id: &str,
        severity: Severity,
    ) -> Result<WriteOutcome, EngineError> {
        let Some(twin) = self.graph.get_twin(twin_id).await? else {
            info!(twin_id = %twin_id, "Status target not found");
            return Ok(WriteOutcome::Missing);
        };
        if severity == Severity::None && !twin.has(STATUS) {
            return Ok(WriteOutcome::Unchanged);
        }
        let mut builder = PatchBuilder::new(&twin);
        builder.set(STATUS, severity);
        builder.commit(self.graph.as_ref()).await
    }
}
