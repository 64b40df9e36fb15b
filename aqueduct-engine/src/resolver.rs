//! Device attachment resolution.
//!
//! A device reports `VolumeFlow`. The resolver finds the asset the device is
//! attached to and writes back the measured flow together with the flow
//! condition and quality classified from the asset's own configuration.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use aqueduct_repository::TwinGraph;
use aqueduct_shared::properties::{
    FLOW_CAPACITY, FLOW_CONDITION, FLOW_MARGIN, FLOW_QUALITY, FLOW_VOLUME,
};
use aqueduct_shared::{RelationKind, TwinId};

use crate::classifier::{classify_condition, classify_quality};
use crate::errors::EngineError;
use crate::writer::{PatchBuilder, WriteOutcome};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The asset was updated with `patches` changed properties.
    Written { asset_id: TwinId, patches: usize },
    /// The asset already held every computed value.
    Unchanged { asset_id: TwinId },
    /// The device has no `attachedTo` relationship.
    NotAttached,
    /// The attached asset is absent from the store.
    AssetMissing { asset_id: TwinId },
}

#[derive(Clone)]
pub struct AttachmentResolver {
    graph: Arc<dyn TwinGraph>,
}

impl AttachmentResolver {
    pub fn new(graph: Arc<dyn TwinGraph>) -> Self {
        Self { graph }
    }

    #[instrument(skip(self))]
    pub async fn resolve(&self, device_id: &str, measured: f64) -> Result<Resolution, EngineError> {
        let attached = self
            .graph
            .get_relationships(device_id, RelationKind::AttachedTo)
            .await?;
        let Some(asset_id) = attached.first() else {
            info!(device_id = %device_id, "Device is not attached to an asset");
            return Ok(Resolution::NotAttached);
        };
        if attached.len() > 1 {
            warn!(
                device_id = %device_id,
                attachments = attached.len(),
                "Device attached to several assets, using the first"
            );
        }

        let Some(asset) = self.graph.get_twin(asset_id).await? else {
            info!(device_id = %device_id, asset_id = %asset_id, "Attached asset not found");
            return Ok(Resolution::AssetMissing {
                asset_id: asset_id.clone(),
            });
        };

        let mut builder = PatchBuilder::new(&asset);
        builder.set(FLOW_VOLUME, measured);

        match (asset.get_f64(FLOW_CAPACITY), asset.get_f64(FLOW_MARGIN)) {
            (Some(capacity), Some(margin)) => {
                builder.set(FLOW_CONDITION, classify_condition(measured, capacity, margin));
                builder.set(FLOW_QUALITY, classify_quality(measured, capacity, margin));
            }
            _ => debug!(asset_id = %asset.id, "No capacity or margin, flow not classified"),
        }

        let patches = builder.len();
        match builder.commit(self.graph.as_ref()).await? {
            WriteOutcome::Written => {
                debug!(asset_id = %asset.id, patches, "Asset updated from device reading");
                Ok(Resolution::Written {
                    asset_id: asset.id.clone(),
                    patches,
                })
            }
            _ => Ok(Resolution::Unchanged {
                asset_id: asset.id.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aqueduct_repository::{ChangeFeed, MemoryGraph};
    use aqueduct_shared::{Archetype, Twin};
    use serde_json::json;

    fn graph() -> Arc<MemoryGraph> {
        let graph = MemoryGraph::new("aqueduct.test");
        graph.insert_twin(Twin::of("meter-1", Archetype::Device)).unwrap();
        graph.insert_twin(Twin::of("meter-2", Archetype::Device)).unwrap();
        graph
            .insert_twin(
                Twin::of("pipe-1", Archetype::Pipe)
                    .with_property("FlowCapacity", 10)
                    .with_property("FlowMargin", 2),
            )
            .unwrap();
        graph
            .relate("meter-1", "pipe-1", RelationKind::AttachedTo)
            .unwrap();
        Arc::new(graph)
    }

    #[tokio::test]
    async fn test_writes_flow_condition_and_quality() {
        let graph = graph();
        let resolver = AttachmentResolver::new(graph.clone());

        let resolution = resolver.resolve("meter-1", 5.0).await.unwrap();
        assert_eq!(
            resolution,
            Resolution::Written {
                asset_id: "pipe-1".to_string(),
                patches: 3
            }
        );

        let pipe = graph.twin("pipe-1").unwrap();
        assert_eq!(pipe.get("FlowVolume"), Some(&json!(5.0)));
        assert_eq!(pipe.get("FlowCondition"), Some(&json!(4)));
        // 5 is further than the margin from capacity 10
        assert_eq!(pipe.get("FlowQuality"), Some(&json!(2)));
        assert_eq!(graph.drain_changes().len(), 1);
    }

    #[tokio::test]
    async fn test_second_identical_reading_is_silent() {
        let graph = graph();
        let resolver = AttachmentResolver::new(graph.clone());

        resolver.resolve("meter-1", 9.5).await.unwrap();
        let again = resolver.resolve("meter-1", 9.5).await.unwrap();

        assert_eq!(
            again,
            Resolution::Unchanged {
                asset_id: "pipe-1".to_string()
            }
        );
        assert_eq!(graph.drain_changes().len(), 1);
    }

    #[tokio::test]
    async fn test_only_changed_properties_are_patched() {
        let graph = graph();
        let resolver = AttachmentResolver::new(graph.clone());

        resolver.resolve("meter-1", 5.0).await.unwrap();
        graph.drain_changes();
        resolver.resolve("meter-1", 5.5).await.unwrap();

        let changes = graph.drain_changes();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].patches.len(), 1);
        assert!(changes[0].patches[0].targets("FlowVolume"));
    }

    #[tokio::test]
    async fn test_quality_measured_against_capacity() {
        let graph = graph();
        let resolver = AttachmentResolver::new(graph.clone());

        resolver.resolve("meter-1", 9.0).await.unwrap();

        let pipe = graph.twin("pipe-1").unwrap();
        assert!(!pipe.has("ExpectedFlowVolume"));
        assert_eq!(pipe.get("FlowCondition"), Some(&json!(5)));
        assert_eq!(pipe.get("FlowQuality"), Some(&json!(1)));
    }

    #[tokio::test]
    async fn test_unattached_device_is_noop() {
        let graph = graph();
        let resolver = AttachmentResolver::new(graph.clone());

        assert_eq!(
            resolver.resolve("meter-2", 5.0).await.unwrap(),
            Resolution::NotAttached
        );
        assert!(graph.drain_changes().is_empty());
    }

    #[tokio::test]
    async fn test_unconfigured_asset_gets_flow_only() {
        let graph = MemoryGraph::new("aqueduct.test");
        graph.insert_twin(Twin::of("meter-1", Archetype::Device)).unwrap();
        graph.insert_twin(Twin::of("pump-1", Archetype::Pump)).unwrap();
        graph
            .relate("meter-1", "pump-1", RelationKind::AttachedTo)
            .unwrap();
        let graph = Arc::new(graph);

        AttachmentResolver::new(graph.clone())
            .resolve("meter-1", 3.0)
            .await
            .unwrap();

        let pump = graph.twin("pump-1").unwrap();
        assert!(pump.has("FlowVolume"));
        assert!(!pump.has("FlowCondition"));
        assert!(!pump.has("FlowQuality"));
    }
}
