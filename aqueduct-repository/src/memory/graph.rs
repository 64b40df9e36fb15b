//! In-process twin graph.
//!
//! Twins live in an arena (`Vec<Twin>`) indexed by id. Relationships are kept
//! as forward and reverse adjacency lists keyed by `(arena index, kind)`, which
//! makes both "targets of this twin" and "twins located in this area" a single
//! lookup.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use tracing::{debug, instrument};

use aqueduct_shared::{ChangeNotification, Patch, PatchOp, RelationKind, Twin, TwinId};

use crate::errors::GraphError;
use crate::interfaces::{ChangeFeed, TwinGraph};
use crate::query::TwinQuery;
use crate::topology::Topology;

#[derive(Debug, Default)]
struct GraphState {
    twins: Vec<Twin>,
    index: HashMap<TwinId, usize>,
    outgoing: HashMap<(usize, RelationKind), Vec<usize>>,
    incoming: HashMap<(usize, RelationKind), Vec<usize>>,
}

impl GraphState {
    fn position(&self, twin_id: &str) -> Option<usize> {
        self.index.get(twin_id).copied()
    }
}

/// Twin graph held in memory, publishing a change notification per write.
#[derive(Debug)]
pub struct MemoryGraph {
    instance: String,
    state: RwLock<GraphState>,
    outbox: Mutex<VecDeque<ChangeNotification>>,
}

impl MemoryGraph {
    /// Create an empty graph identified by `instance` in emitted notifications.
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
            state: RwLock::new(GraphState::default()),
            outbox: Mutex::new(VecDeque::new()),
        }
    }

    /// Build a graph from a topology seed.
    pub fn from_topology(instance: impl Into<String>, topology: &Topology) -> Result<Self, GraphError> {
        let graph = Self::new(instance);
        for seed in &topology.twins {
            graph.insert_twin(seed.to_twin()?)?;
        }
        for rel in &topology.relationships {
            graph.relate(&rel.source, &rel.target, rel.kind)?;
        }
        Ok(graph)
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    /// Seed a twin. Seeding does not publish a change notification.
    pub fn insert_twin(&self, twin: Twin) -> Result<(), GraphError> {
        let mut state = self.write_state()?;
        if state.index.contains_key(&twin.id) {
            return Err(GraphError::DuplicateTwin(twin.id));
        }
        let position = state.twins.len();
        state.index.insert(twin.id.clone(), position);
        state.twins.push(twin);
        Ok(())
    }

    /// Add a directed relationship between two existing twins.
    pub fn relate(&self, source: &str, target: &str, kind: RelationKind) -> Result<(), GraphError> {
        let mut state = self.write_state()?;
        let from = state
            .position(source)
            .ok_or_else(|| GraphError::UnknownEndpoint(source.to_string()))?;
        let to = state
            .position(target)
            .ok_or_else(|| GraphError::UnknownEndpoint(target.to_string()))?;

        state.outgoing.entry((from, kind)).or_default().push(to);
        state.incoming.entry((to, kind)).or_default().push(from);
        Ok(())
    }

    /// Synchronous snapshot of one twin.
    pub fn twin(&self, twin_id: &str) -> Option<Twin> {
        let state = self.read_state().ok()?;
        state.position(twin_id).map(|i| state.twins[i].clone())
    }

    pub fn twin_count(&self) -> usize {
        self.read_state().map(|s| s.twins.len()).unwrap_or(0)
    }

    /// Number of change notifications waiting in the outbox.
    pub fn pending_changes(&self) -> usize {
        self.outbox.lock().map(|o| o.len()).unwrap_or(0)
    }

    fn read_state(&self) -> Result<RwLockReadGuard<'_, GraphState>, GraphError> {
        self.state
            .read()
            .map_err(|_| GraphError::unavailable("graph state lock poisoned"))
    }

    fn write_state(&self) -> Result<RwLockWriteGuard<'_, GraphState>, GraphError> {
        self.state
            .write()
            .map_err(|_| GraphError::unavailable("graph state lock poisoned"))
    }
}

#[async_trait]
impl TwinGraph for MemoryGraph {
    async fn get_twin(&self, twin_id: &str) -> Result<Option<Twin>, GraphError> {
        let state = self.read_state()?;
        Ok(state.position(twin_id).map(|i| state.twins[i].clone()))
    }

    /// Unknown source twins have no relationships.
    async fn get_relationships(
        &self,
        twin_id: &str,
        kind: RelationKind,
    ) -> Result<Vec<TwinId>, GraphError> {
        let state = self.read_state()?;
        let Some(position) = state.position(twin_id) else {
            return Ok(Vec::new());
        };
        Ok(state
            .outgoing
            .get(&(position, kind))
            .map(|targets| targets.iter().map(|&t| state.twins[t].id.clone()).collect())
            .unwrap_or_default())
    }

    async fn query(&self, query: &TwinQuery) -> Result<Vec<Twin>, GraphError> {
        let state = self.read_state()?;

        let twins: Vec<Twin> = match &query.related {
            Some(related) => {
                let Some(target) = state.position(&related.target) else {
                    return Ok(Vec::new());
                };
                state
                    .incoming
                    .get(&(target, related.kind))
                    .map(|sources| {
                        sources
                            .iter()
                            .map(|&s| &state.twins[s])
                            .filter(|twin| query.matches_twin(twin))
                            .cloned()
                            .collect()
                    })
                    .unwrap_or_default()
            }
            None => state
                .twins
                .iter()
                .filter(|twin| query.matches_twin(twin))
                .cloned()
                .collect(),
        };

        Ok(twins)
    }

    #[instrument(skip(self, patches), fields(patch_count = patches.len()))]
    async fn patch_twin(&self, twin_id: &str, patches: &[Patch]) -> Result<(), GraphError> {
        if patches.is_empty() {
            return Ok(());
        }

        let notification = {
            let mut state = self.write_state()?;
            let position = state
                .position(twin_id)
                .ok_or_else(|| GraphError::TwinNotFound(twin_id.to_string()))?;
            let twin = &mut state.twins[position];

            // Validate against a scratch copy so a rejected set leaves no trace.
            let mut properties = twin.properties.clone();
            for patch in patches {
                let name = patch.property().ok_or_else(|| GraphError::InvalidPath {
                    twin_id: twin_id.to_string(),
                    path: patch.path.clone(),
                })?;
                if PatchOp::for_presence(properties.contains_key(name)) != patch.op {
                    return Err(GraphError::patch_conflict(twin_id, &patch.path, patch.op));
                }
                properties.insert(name.to_string(), patch.value.clone());
            }
            twin.properties = properties;

            ChangeNotification::new(
                self.instance.clone(),
                twin_id,
                twin.model_id.clone(),
                patches.to_vec(),
            )
        };

        debug!(twin_id = %twin_id, "Twin patched");
        self.outbox
            .lock()
            .map_err(|_| GraphError::unavailable("change outbox lock poisoned"))?
            .push_back(notification);
        Ok(())
    }
}

impl ChangeFeed for MemoryGraph {
    fn drain_changes(&self) -> Vec<ChangeNotification> {
        match self.outbox.lock() {
            Ok(mut outbox) => outbox.drain(..).collect(),
            Err(poisoned) => poisoned.into_inner().drain(..).collect(),
        }
    }
}
