//! In-memory implementations of the boundary interfaces.

mod graph;
mod history;
mod scheduler;

pub use graph::MemoryGraph;
pub use history::RecordingHistorySink;
pub use scheduler::ManualScheduler;
