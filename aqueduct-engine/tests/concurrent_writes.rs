//! Interleaved handlers writing the same property.
//!
//! A handler reads a twin, picks `add` or `replace`, then patches. When two
//! handlers interleave between the read and the write, the store rejects the
//! one whose op no longer matches. The rejection surfaces as an error so the
//! batch is redelivered, and the redelivered write wins.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use aqueduct_engine::errors::EngineError;
use aqueduct_engine::resolver::{AttachmentResolver, Resolution};
use aqueduct_repository::{GraphError, MemoryGraph, TwinGraph, TwinQuery};
use aqueduct_shared::{Archetype, Patch, RelationKind, Twin, TwinId};

// Yields after every read so concurrent handlers interleave deterministically.
struct YieldingGraph {
    inner: MemoryGraph,
}

#[async_trait]
impl TwinGraph for YieldingGraph {
    async fn get_twin(&self, twin_id: &str) -> Result<Option<Twin>, GraphError> {
        let twin = self.inner.get_twin(twin_id).await?;
        tokio::task::yield_now().await;
        Ok(twin)
    }

    async fn get_relationships(
        &self,
        twin_id: &str,
        kind: RelationKind,
    ) -> Result<Vec<TwinId>, GraphError> {
        self.inner.get_relationships(twin_id, kind).await
    }

    async fn query(&self, query: &TwinQuery) -> Result<Vec<Twin>, GraphError> {
        self.inner.query(query).await
    }

    async fn patch_twin(&self, twin_id: &str, patches: &[Patch]) -> Result<(), GraphError> {
        self.inner.patch_twin(twin_id, patches).await
    }
}

fn metered_pump() -> Arc<YieldingGraph> {
    let graph = MemoryGraph::new("aqueduct.test");
    graph
        .insert_twin(Twin::of("meter-1", Archetype::Device))
        .unwrap();
    graph
        .insert_twin(Twin::of("meter-2", Archetype::Device))
        .unwrap();
    graph
        .insert_twin(
            Twin::of("pump-1", Archetype::Pump)
                .with_property("FlowCapacity", 10)
                .with_property("FlowMargin", 2),
        )
        .unwrap();
    graph
        .relate("meter-1", "pump-1", RelationKind::AttachedTo)
        .unwrap();
    graph
        .relate("meter-2", "pump-1", RelationKind::AttachedTo)
        .unwrap();
    Arc::new(YieldingGraph { inner: graph })
}

fn is_patch_conflict(result: &Result<Resolution, EngineError>) -> bool {
    matches!(
        result,
        Err(EngineError::Graph(GraphError::PatchConflict { .. }))
    )
}

#[tokio::test]
async fn test_stale_read_is_rejected_then_last_write_wins() {
    let graph = metered_pump();
    let resolver = AttachmentResolver::new(graph.clone());

    let (first, second) = tokio::join!(
        resolver.resolve("meter-1", 3.0),
        resolver.resolve("meter-2", 6.0)
    );

    // Both saw FlowVolume absent and chose `add`; only one of them lands.
    assert_eq!(
        [is_patch_conflict(&first), is_patch_conflict(&second)]
            .iter()
            .filter(|c| **c)
            .count(),
        1
    );

    let (loser, flow) = if first.is_err() {
        ("meter-1", 3.0)
    } else {
        ("meter-2", 6.0)
    };

    // Redelivery re-reads the twin, switches to `replace` and overwrites.
    let retried = resolver.resolve(loser, flow).await.unwrap();
    assert!(matches!(retried, Resolution::Written { .. }));

    let pump = graph.inner.twin("pump-1").unwrap();
    assert_eq!(pump.get("FlowVolume"), Some(&json!(flow)));
    assert_eq!(pump.get("FlowCondition"), Some(&json!(4)));
}

#[tokio::test]
async fn test_sequential_writes_never_conflict() {
    let graph = metered_pump();
    let resolver = AttachmentResolver::new(graph.clone());

    for flow in [3.0, 6.0, 9.0, 6.0] {
        resolver.resolve("meter-1", flow).await.unwrap();
    }

    let pump = graph.inner.twin("pump-1").unwrap();
    assert_eq!(pump.get("FlowVolume"), Some(&json!(6.0)));
    assert_eq!(graph.inner.pending_changes(), 4);
}
