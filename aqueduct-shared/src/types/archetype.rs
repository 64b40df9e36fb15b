//! Twin archetypes.
//!
//! Model ids arrive as DTDL identifiers such as
//! `dtmi:sample:aqueduct:asset:Pipe;1`. They are parsed once, where a twin or a
//! notification enters the engine, into the closed [`Archetype`] set so that
//! handlers dispatch on an enum instead of re-matching strings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Prefix shared by every model id in the aqueduct ontology.
pub const MODEL_PREFIX: &str = "dtmi:sample:aqueduct:";

/// Error returned when a model id does not belong to a known archetype.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelIdError {
    #[error("model id '{0}' is outside the aqueduct ontology")]
    ForeignOntology(String),

    #[error("model id '{0}' names an unknown archetype")]
    UnknownArchetype(String),
}

/// Functional category of a twin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Archetype {
    Pipe,
    Junction,
    Pump,
    Valve,
    Reservoir,
    Tap,
    Device,
    Area,
    Region,
}

impl Archetype {
    /// All asset archetypes, in propagation-table order.
    pub const ASSETS: [Archetype; 6] = [
        Archetype::Pipe,
        Archetype::Junction,
        Archetype::Pump,
        Archetype::Valve,
        Archetype::Reservoir,
        Archetype::Tap,
    ];

    /// Parse a full model id (`dtmi:sample:aqueduct:<category>:<Name>;<version>`).
    ///
    /// Devices and locations accept any name within their category; assets must
    /// name one of the six asset archetypes.
    pub fn from_model_id(model_id: &str) -> Result<Self, ModelIdError> {
        let rest = model_id
            .strip_prefix(MODEL_PREFIX)
            .ok_or_else(|| ModelIdError::ForeignOntology(model_id.to_string()))?;
        let unversioned = rest.split(';').next().unwrap_or(rest);
        let (category, name) = unversioned
            .split_once(':')
            .ok_or_else(|| ModelIdError::UnknownArchetype(model_id.to_string()))?;

        match (category, name) {
            ("asset", "Pipe") => Ok(Archetype::Pipe),
            ("asset", "Junction") => Ok(Archetype::Junction),
            ("asset", "Pump") => Ok(Archetype::Pump),
            ("asset", "Valve") => Ok(Archetype::Valve),
            ("asset", "Reservoir") => Ok(Archetype::Reservoir),
            ("asset", "Tap") => Ok(Archetype::Tap),
            ("device", n) if !n.is_empty() => Ok(Archetype::Device),
            ("area", n) if !n.is_empty() => Ok(Archetype::Area),
            ("region", n) if !n.is_empty() => Ok(Archetype::Region),
            _ => Err(ModelIdError::UnknownArchetype(model_id.to_string())),
        }
    }

    /// Whether this archetype takes part in flow propagation.
    pub fn is_asset(&self) -> bool {
        Self::ASSETS.contains(self)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Archetype::Pipe => "Pipe",
            Archetype::Junction => "Junction",
            Archetype::Pump => "Pump",
            Archetype::Valve => "Valve",
            Archetype::Reservoir => "Reservoir",
            Archetype::Tap => "Tap",
            Archetype::Device => "Device",
            Archetype::Area => "Area",
            Archetype::Region => "Region",
        }
    }

    /// Canonical version-1 model id for this archetype.
    pub fn model_id(&self) -> String {
        let category = match self {
            Archetype::Device => "device",
            Archetype::Area => "area",
            Archetype::Region => "region",
            _ => "asset",
        };
        format!("{}{}:{};1", MODEL_PREFIX, category, self.as_str())
    }
}

impl FromStr for Archetype {
    type Err = ModelIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_model_id(s)
    }
}

impl fmt::Display for Archetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
