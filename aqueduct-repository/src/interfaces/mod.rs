//! Interfaces the engine consumes at its boundaries.

mod change_feed;
mod history_sink;
mod twin_graph;
mod update_scheduler;

pub use change_feed::ChangeFeed;
pub use history_sink::HistorySink;
pub use twin_graph::TwinGraph;
pub use update_scheduler::UpdateScheduler;
