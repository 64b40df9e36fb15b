//! Property and relationship names used in the aqueduct ontology.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Raw volumetric flow reported by a device (L/s).
pub const VOLUME_FLOW: &str = "VolumeFlow";
/// Measured flow written onto an asset by its attached device (L/s).
pub const FLOW_VOLUME: &str = "FlowVolume";
/// Flow an asset is expected to carry, derived from upstream (L/s).
pub const EXPECTED_FLOW_VOLUME: &str = "ExpectedFlowVolume";
pub const FLOW_CAPACITY: &str = "FlowCapacity";
pub const FLOW_MARGIN: &str = "FlowMargin";
pub const FLOW_CONDITION: &str = "FlowCondition";
pub const FLOW_QUALITY: &str = "FlowQuality";
/// Pipe inner diameter (cm).
pub const DIAMETER: &str = "Diameter";
/// Pipe length (m).
pub const LENGTH: &str = "Length";
pub const OPEN_STATUS: &str = "OpenStatus";
/// Rolled-up severity on areas and regions.
pub const STATUS: &str = "Status";

/// Directed relationship kinds between twins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RelationKind {
    /// device → asset
    AttachedTo,
    /// asset → asset, downstream direction
    FlowingTo,
    /// asset → area, area → region
    LocatedIn,
}

impl RelationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationKind::AttachedTo => "attachedTo",
            RelationKind::FlowingTo => "flowingTo",
            RelationKind::LocatedIn => "locatedIn",
        }
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
