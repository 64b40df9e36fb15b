//! Graph accessor error types.

use aqueduct_shared::{ModelIdError, PatchOp};
use thiserror::Error;

/// Errors from reading or patching the twin graph.
#[derive(Debug, Clone, Error)]
pub enum GraphError {
    /// The twin does not exist in the store.
    #[error("Twin not found: {0}")]
    TwinNotFound(String),

    /// A twin with the same id is already present.
    #[error("Duplicate twin: {0}")]
    DuplicateTwin(String),

    /// A relationship references a twin that does not exist.
    #[error("Relationship endpoint not found: {0}")]
    UnknownEndpoint(String),

    /// The patch operation does not match the property's presence.
    #[error("Patch conflict on twin '{twin_id}': cannot {op} '{path}'")]
    PatchConflict {
        twin_id: String,
        path: String,
        op: &'static str,
    },

    /// The patch path is not a single top-level property.
    #[error("Invalid patch path on twin '{twin_id}': {path}")]
    InvalidPath { twin_id: String, path: String },

    /// Model id outside the known archetypes.
    #[error("Invalid model: {0}")]
    InvalidModel(#[from] ModelIdError),

    /// Topology seed could not be decoded.
    #[error("Topology error: {0}")]
    Topology(String),

    /// The store could not serve the request.
    #[error("Graph unavailable: {0}")]
    Unavailable(String),
}

impl GraphError {
    pub fn patch_conflict(twin_id: &str, path: &str, op: PatchOp) -> Self {
        Self::PatchConflict {
            twin_id: twin_id.to_string(),
            path: path.to_string(),
            op: op.as_str(),
        }
    }

    pub fn topology(msg: impl Into<String>) -> Self {
        Self::Topology(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }
}
