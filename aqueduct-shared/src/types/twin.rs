//! Twin snapshots as read from the graph store.

use std::collections::BTreeMap;

use serde_json::Value;

use super::archetype::{Archetype, ModelIdError};

pub type TwinId = String;

/// Property bag of a twin.
pub type Properties = BTreeMap<String, Value>;

/// A snapshot of one twin: identity, model, parsed archetype and properties.
#[derive(Debug, Clone, PartialEq)]
pub struct Twin {
    pub id: TwinId,
    pub model_id: String,
    pub archetype: Archetype,
    pub properties: Properties,
}

impl Twin {
    /// Create a twin with an empty property bag.
    ///
    /// Fails when the model id does not map to a known archetype.
    pub fn new(id: impl Into<TwinId>, model_id: impl Into<String>) -> Result<Self, ModelIdError> {
        let model_id = model_id.into();
        let archetype = Archetype::from_model_id(&model_id)?;
        Ok(Self {
            id: id.into(),
            model_id,
            archetype,
            properties: Properties::new(),
        })
    }

    /// Create a twin using the canonical model id of an archetype.
    pub fn of(id: impl Into<TwinId>, archetype: Archetype) -> Self {
        Self {
            id: id.into(),
            model_id: archetype.model_id(),
            archetype,
            properties: Properties::new(),
        }
    }

    pub fn with_property(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(name.to_string(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    /// Numeric property as `f64`; `None` when absent or not a number.
    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.properties.get(name).and_then(Value::as_f64)
    }

    /// Integral property as `i64`. Whole floats such as `4.0` are accepted.
    pub fn get_i64(&self, name: &str) -> Option<i64> {
        let value = self.properties.get(name)?;
        value.as_i64().or_else(|| {
            value
                .as_f64()
                .filter(|f| f.fract() == 0.0 && f.is_finite())
                .map(|f| f as i64)
        })
    }
}

/// Equality of stored property values.
///
/// JSON numbers compare numerically so that `4` and `4.0` are the same stored
/// value; everything else compares structurally.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        _ => a == b,
    }
}
