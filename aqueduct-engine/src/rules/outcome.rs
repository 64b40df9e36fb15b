use aqueduct_shared::{DelayedUpdate, TwinId};

use crate::writer::WriteOutcome;

/// Why a rule produced no downstream update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// A property the rule needs is absent or not numeric.
    MissingProperty(&'static str),
    /// No `flowingTo` target.
    NoDownstream,
    /// The downstream twin is referenced but absent from the store.
    MissingDownstream(TwinId),
    /// Flow gives no finite transit time.
    DegenerateFlow,
    /// Outlets carry no positive total capacity.
    NoCapacity,
}

/// One immediate downstream write.
#[derive(Debug, Clone, PartialEq)]
pub struct Forward {
    pub twin_id: TwinId,
    pub flow: f64,
    pub outcome: WriteOutcome,
}

/// What a propagation rule did with an asset's flow change.
#[derive(Debug, Clone, PartialEq)]
pub enum Propagation {
    /// Handed to the delay scheduler.
    Scheduled {
        delay_seconds: f64,
        update: DelayedUpdate,
    },
    /// Written to downstream assets immediately.
    Forwarded(Vec<Forward>),
    /// Closed valve.
    Blocked,
    /// Reservoir or tap.
    Terminal,
    Skipped(SkipReason),
}
