//! Skip-if-unchanged writes.
//!
//! Every derived write goes through here: a property whose computed value
//! equals the stored value is dropped, and a patch set left empty is never
//! sent. Repeated deliveries of the same input therefore settle without
//! emitting further change notifications.

use serde_json::Value;
use tracing::debug;

use aqueduct_repository::TwinGraph;
use aqueduct_shared::{values_equal, Patch, PatchOp, Twin};

use crate::errors::EngineError;

/// Result of a single-twin write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    /// Every computed value already matched the twin.
    Unchanged,
    /// The target twin does not exist.
    Missing,
}

/// Collects patches against one twin snapshot.
///
/// The op of each patch follows the property's presence on the snapshot.
pub struct PatchBuilder<'a> {
    twin: &'a Twin,
    patches: Vec<Patch>,
}

impl<'a> PatchBuilder<'a> {
    pub fn new(twin: &'a Twin) -> Self {
        Self {
            twin,
            patches: Vec::new(),
        }
    }

    /// Queue `property = value` unless the twin already stores that value.
    /// Returns whether a patch was queued.
    pub fn set(&mut self, property: &str, value: impl Into<Value>) -> bool {
        let value = value.into();
        match self.twin.get(property) {
            Some(stored) if values_equal(stored, &value) => false,
            stored => {
                let op = PatchOp::for_presence(stored.is_some());
                self.patches.push(Patch::new(op, property, value));
                true
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    pub fn len(&self) -> usize {
        self.patches.len()
    }

    /// Send the queued patches as one atomic request.
    pub async fn commit(self, graph: &dyn TwinGraph) -> Result<WriteOutcome, EngineError> {
        if self.patches.is_empty() {
            debug!(twin_id = %self.twin.id, "Nothing changed, skipping write");
            return Ok(WriteOutcome::Unchanged);
        }
        graph.patch_twin(&self.twin.id, &self.patches).await?;
        Ok(WriteOutcome::Written)
    }
}

/// Read `twin_id` and set one property on it, skipping unchanged values.
pub async fn write_property(
    graph: &dyn TwinGraph,
    twin_id: &str,
    property: &str,
    value: impl Into<Value>,
) -> Result<WriteOutcome, EngineError> {
    let Some(twin) = graph.get_twin(twin_id).await? else {
        return Ok(WriteOutcome::Missing);
    };
    let mut builder = PatchBuilder::new(&twin);
    builder.set(property, value);
    builder.commit(graph).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use aqueduct_repository::{ChangeFeed, MemoryGraph};
    use aqueduct_shared::Archetype;
    use serde_json::json;

    #[test]
    fn test_builder_skips_equal_values() {
        let twin = Twin::of("pipe-1", Archetype::Pipe)
            .with_property("FlowVolume", 5)
            .with_property("FlowCondition", 4);
        let mut builder = PatchBuilder::new(&twin);

        assert!(!builder.set("FlowVolume", 5.0));
        assert!(builder.set("FlowCondition", 5));
        assert!(builder.set("FlowQuality", 1));
        assert_eq!(builder.len(), 2);
        assert_eq!(builder.patches[0].op, PatchOp::Replace);
        assert_eq!(builder.patches[1].op, PatchOp::Add);
        assert_eq!(builder.patches[1].value, json!(1));
    }

    #[tokio::test]
    async fn test_write_property_outcomes() {
        let graph = MemoryGraph::new("aqueduct.test");
        graph.insert_twin(Twin::of("pipe-1", Archetype::Pipe)).unwrap();

        let first = write_property(&graph, "pipe-1", "ExpectedFlowVolume", 3.0)
            .await
            .unwrap();
        let second = write_property(&graph, "pipe-1", "ExpectedFlowVolume", 3.0)
            .await
            .unwrap();
        let missing = write_property(&graph, "ghost", "ExpectedFlowVolume", 3.0)
            .await
            .unwrap();

        assert_eq!(first, WriteOutcome::Written);
        assert_eq!(second, WriteOutcome::Unchanged);
        assert_eq!(missing, WriteOutcome::Missing);
        assert_eq!(graph.drain_changes().len(), 1);
    }
}
