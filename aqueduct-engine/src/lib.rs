//! # Aqueduct Engine
//!
//! Propagation and aggregation engine for a water-network twin graph. Device
//! readings become asset flows and conditions, flows move downstream with
//! physical transit delay, and conditions roll up into area and region status.
//!
//! ## Architecture
//!
//! 1. **Consumer**: receives change notifications and delayed updates from Kafka
//! 2. **Cascade**: routes each event and everything its writes cause
//! 3. **Router**: dispatches to the resolver, the rules or the aggregator
//! 4. **Orchestrator**: batches, acknowledgment and shutdown
//!
//! ## Modules
//!
//! - [`classifier`]: flow condition and quality codes
//! - [`resolver`]: device reading to instrumented asset
//! - [`rules`]: per-archetype downstream propagation
//! - [`aggregator`]: area and region severity rollup
//! - [`scheduler`]: delayed re-delivery
//! - [`router`]: notification dispatch
//! - [`cascade`]: in-process change-feed driver with hop guard
//! - [`consumer`], [`orchestrator`], [`config`]: the service around it

pub mod aggregator;
pub mod cascade;
pub mod classifier;
pub mod config;
pub mod consumer;
pub mod errors;
pub mod orchestrator;
pub mod resolver;
pub mod router;
pub mod rules;
pub mod scheduler;
pub mod writer;

pub use cascade::{Cascade, CascadeReport};
pub use config::Dependencies;
pub use errors::EngineError;
pub use router::{Dispatch, EventRouter};

use thiserror::Error;

/// Errors that can occur during engine initialization or execution.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Engine error: {0}")]
    EngineError(#[from] EngineError),
}

impl ServiceError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}
