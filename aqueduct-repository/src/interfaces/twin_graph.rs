//! Graph accessor trait definition.

use async_trait::async_trait;

use aqueduct_shared::{Patch, RelationKind, Twin, TwinId};

use crate::errors::GraphError;
use crate::query::TwinQuery;

/// Abstracts the twin graph store.
///
/// The engine reads single twins, follows relationships, runs filtered queries
/// and writes patch sets. Implementations are injected into the handlers so
/// tests can swap in [`MemoryGraph`](crate::MemoryGraph) or their own fakes.
///
/// Writes are not transactional against concurrent readers: a handler reads a
/// twin, decides `add` versus `replace`, then patches. Two handlers doing this
/// for the same property can interleave, and the store rejects whichever patch
/// no longer matches the property's presence.
#[async_trait]
pub trait TwinGraph: Send + Sync {
    /// Read one twin. `Ok(None)` when it does not exist.
    async fn get_twin(&self, twin_id: &str) -> Result<Option<Twin>, GraphError>;

    /// Targets of the outgoing relationships of `kind` from `twin_id`, in
    /// insertion order.
    async fn get_relationships(
        &self,
        twin_id: &str,
        kind: RelationKind,
    ) -> Result<Vec<TwinId>, GraphError>;

    /// Twins matching a filtered query.
    async fn query(&self, query: &TwinQuery) -> Result<Vec<Twin>, GraphError>;

    /// Apply a patch set to one twin atomically.
    ///
    /// # Errors
    ///
    /// * `GraphError::TwinNotFound` - the twin does not exist
    /// * `GraphError::PatchConflict` - `add` on a present or `replace` on an
    ///   absent property; no patch of the set is applied
    async fn patch_twin(&self, twin_id: &str, patches: &[Patch]) -> Result<(), GraphError>;
}
