//! Topology seeds for the in-memory graph.
//!
//! ```json
//! {
//!   "twins": [
//!     { "id": "pump-1", "modelId": "dtmi:sample:aqueduct:asset:Pump;1",
//!       "properties": { "FlowCapacity": 40 } }
//!   ],
//!   "relationships": [
//!     { "source": "pump-1", "target": "pipe-1", "kind": "flowingTo" }
//!   ]
//! }
//! ```

use serde::Deserialize;

use aqueduct_shared::{Properties, RelationKind, Twin, TwinId};

use crate::errors::GraphError;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TwinSeed {
    pub id: TwinId,
    pub model_id: String,
    #[serde(default)]
    pub properties: Properties,
}

impl TwinSeed {
    pub fn to_twin(&self) -> Result<Twin, GraphError> {
        let mut twin = Twin::new(self.id.clone(), self.model_id.clone())?;
        twin.properties = self.properties.clone();
        Ok(twin)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelationshipSeed {
    pub source: TwinId,
    pub target: TwinId,
    pub kind: RelationKind,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Topology {
    #[serde(default)]
    pub twins: Vec<TwinSeed>,
    #[serde(default)]
    pub relationships: Vec<RelationshipSeed>,
}

impl Topology {
    pub fn from_json_str(json: &str) -> Result<Self, GraphError> {
        serde_json::from_str(json).map_err(|e| GraphError::topology(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interfaces::TwinGraph;
    use crate::memory::MemoryGraph;
    use aqueduct_shared::Archetype;

    const SEED: &str = r#"{
        "twins": [
            { "id": "meter-1", "modelId": "dtmi:sample:aqueduct:device:FlowMeter;1" },
            { "id": "pipe-1", "modelId": "dtmi:sample:aqueduct:asset:Pipe;1",
              "properties": { "Diameter": 20, "Length": 100 } }
        ],
        "relationships": [
            { "source": "meter-1", "target": "pipe-1", "kind": "attachedTo" }
        ]
    }"#;

    #[tokio::test]
    async fn test_seed_loads_into_graph() {
        let topology = Topology::from_json_str(SEED).unwrap();
        let graph = MemoryGraph::from_topology("aqueduct.test", &topology).unwrap();

        assert_eq!(graph.twin_count(), 2);
        let pipe = graph.get_twin("pipe-1").await.unwrap().unwrap();
        assert_eq!(pipe.archetype, Archetype::Pipe);
        assert_eq!(pipe.get_f64("Diameter"), Some(20.0));
        assert_eq!(
            graph
                .get_relationships("meter-1", RelationKind::AttachedTo)
                .await
                .unwrap(),
            vec!["pipe-1".to_string()]
        );
    }

    #[test]
    fn test_unknown_model_is_rejected() {
        let topology = Topology::from_json_str(
            r#"{ "twins": [ { "id": "x", "modelId": "dtmi:other:Thing;1" } ] }"#,
        )
        .unwrap();
        assert!(matches!(
            MemoryGraph::from_topology("aqueduct.test", &topology),
            Err(GraphError::InvalidModel(_))
        ));
    }

    #[test]
    fn test_malformed_seed() {
        assert!(matches!(
            Topology::from_json_str("{ \"twins\": 3 }"),
            Err(GraphError::Topology(_))
        ));
    }
}
