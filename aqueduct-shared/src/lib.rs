//! # Aqueduct Shared
//!
//! Data structures shared across the aqueduct crates: twins and their archetypes,
//! JSON patches, change notifications, delayed updates, history records and the
//! closed code enumerations (condition, quality, severity).

pub mod types;

pub use types::archetype::{Archetype, ModelIdError, MODEL_PREFIX};
pub use types::codes::{ConditionCode, QualityCode, Severity};
pub use types::history::{HistoryPatch, HistoryRecord};
pub use types::notification::{ChangeNotification, DelayedUpdate};
pub use types::patch::{Patch, PatchOp};
pub use types::properties::{self as properties, RelationKind};
pub use types::twin::{values_equal, Properties, Twin, TwinId};
