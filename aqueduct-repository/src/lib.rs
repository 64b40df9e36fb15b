//! # Aqueduct Repository
//!
//! Interfaces the propagation engine consumes (graph accessor, scheduled
//! delivery, history sink) and the in-memory implementations used by the
//! service and by tests.

pub mod errors;
pub mod interfaces;
pub mod memory;
pub mod query;
pub mod topology;

pub use errors::{GraphError, TransportError};
pub use interfaces::{ChangeFeed, HistorySink, TwinGraph, UpdateScheduler};
pub use memory::{ManualScheduler, MemoryGraph, RecordingHistorySink};
pub use query::{FilterOp, PropertyFilter, TwinQuery};
pub use topology::{RelationshipSeed, Topology, TwinSeed};
