//! Filtered twin queries.
//!
//! A query selects twins by archetype, by property filters, and optionally by
//! one relationship hop (`source -[kind]-> target`, selecting the sources).

use aqueduct_shared::{values_equal, Archetype, RelationKind, Twin, TwinId};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
}

/// Comparison of one named property against a value.
///
/// Both operators require the property to be present, so `Ne` never selects
/// a twin that lacks the property.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyFilter {
    pub property: String,
    pub op: FilterOp,
    pub value: Value,
}

impl PropertyFilter {
    pub fn matches(&self, twin: &Twin) -> bool {
        match twin.get(&self.property) {
            Some(stored) => match self.op {
                FilterOp::Eq => values_equal(stored, &self.value),
                FilterOp::Ne => !values_equal(stored, &self.value),
            },
            None => false,
        }
    }
}

/// Relationship join: select twins with an outgoing `kind` edge to `target`.
#[derive(Debug, Clone, PartialEq)]
pub struct RelatedTo {
    pub kind: RelationKind,
    pub target: TwinId,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TwinQuery {
    /// Accepted archetypes; empty accepts every archetype.
    pub archetypes: Vec<Archetype>,
    pub related: Option<RelatedTo>,
    pub filters: Vec<PropertyFilter>,
}

impl TwinQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn of_archetype(mut self, archetype: Archetype) -> Self {
        self.archetypes.push(archetype);
        self
    }

    pub fn assets_only(mut self) -> Self {
        self.archetypes.extend_from_slice(&Archetype::ASSETS);
        self
    }

    pub fn related_to(mut self, kind: RelationKind, target: impl Into<TwinId>) -> Self {
        self.related = Some(RelatedTo {
            kind,
            target: target.into(),
        });
        self
    }

    pub fn where_eq(mut self, property: &str, value: impl Into<Value>) -> Self {
        self.filters.push(PropertyFilter {
            property: property.to_string(),
            op: FilterOp::Eq,
            value: value.into(),
        });
        self
    }

    pub fn where_ne(mut self, property: &str, value: impl Into<Value>) -> Self {
        self.filters.push(PropertyFilter {
            property: property.to_string(),
            op: FilterOp::Ne,
            value: value.into(),
        });
        self
    }

    /// Archetype and property filters. The relationship join is resolved by
    /// the store, which owns the adjacency.
    pub fn matches_twin(&self, twin: &Twin) -> bool {
        (self.archetypes.is_empty() || self.archetypes.contains(&twin.archetype))
            && self.filters.iter().all(|f| f.matches(twin))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ne_requires_presence() {
        let query = TwinQuery::new().where_ne("FlowCondition", 4);
        let without = Twin::of("p1", Archetype::Pipe);
        let normal = Twin::of("p2", Archetype::Pipe).with_property("FlowCondition", 4);
        let high = Twin::of("p3", Archetype::Pipe).with_property("FlowCondition", 5);

        assert!(!query.matches_twin(&without));
        assert!(!query.matches_twin(&normal));
        assert!(query.matches_twin(&high));
    }

    #[test]
    fn test_archetype_filter() {
        let query = TwinQuery::new().assets_only();
        assert!(query.matches_twin(&Twin::of("j", Archetype::Junction)));
        assert!(!query.matches_twin(&Twin::of("a", Archetype::Area)));

        let areas = TwinQuery::new().of_archetype(Archetype::Area);
        assert!(areas.matches_twin(&Twin::of("a", Archetype::Area)));
        assert!(!areas.matches_twin(&Twin::of("r", Archetype::Region)));
    }

    #[test]
    fn test_eq_compares_numerically() {
        let query = TwinQuery::new().where_eq("OpenStatus", 1);
        let open = Twin::of("v", Archetype::Valve).with_property("OpenStatus", 1.0);
        assert!(query.matches_twin(&open));
    }
}
