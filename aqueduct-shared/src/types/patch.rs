//! JSON patch operations against a single twin property.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Patch operation. The graph store rejects `add` on a present property and
/// `replace` on an absent one, so the choice must follow the twin's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    Add,
    Replace,
}

impl PatchOp {
    /// The operation that matches a property's presence on the twin.
    pub fn for_presence(present: bool) -> Self {
        if present {
            PatchOp::Replace
        } else {
            PatchOp::Add
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PatchOp::Add => "add",
            PatchOp::Replace => "replace",
        }
    }
}

/// One property mutation: `{op, path: "/Property", value}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patch {
    pub op: PatchOp,
    pub path: String,
    pub value: Value,
}

impl Patch {
    pub fn new(op: PatchOp, property: &str, value: impl Into<Value>) -> Self {
        Self {
            op,
            path: format!("/{}", property),
            value: value.into(),
        }
    }

    pub fn add(property: &str, value: impl Into<Value>) -> Self {
        Self::new(PatchOp::Add, property, value)
    }

    pub fn replace(property: &str, value: impl Into<Value>) -> Self {
        Self::new(PatchOp::Replace, property, value)
    }

    /// Property name targeted by this patch, without the leading slash.
    ///
    /// Returns `None` for nested paths, which the engine never writes.
    pub fn property(&self) -> Option<&str> {
        let name = self.path.strip_prefix('/')?;
        if name.is_empty() || name.contains('/') {
            None
        } else {
            Some(name)
        }
    }

    pub fn targets(&self, property: &str) -> bool {
        self.property() == Some(property)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_patch_wire_format() {
        let patch = Patch::add("FlowVolume", 5.5);
        let encoded = serde_json::to_value(&patch).unwrap();
        assert_eq!(
            encoded,
            json!({"op": "add", "path": "/FlowVolume", "value": 5.5})
        );

        let decoded: Patch =
            serde_json::from_value(json!({"op": "replace", "path": "/Status", "value": 2}))
                .unwrap();
        assert_eq!(decoded.op, PatchOp::Replace);
        assert_eq!(decoded.property(), Some("Status"));
    }

    #[test]
    fn test_unknown_op_is_rejected() {
        let decoded = serde_json::from_value::<Patch>(
            json!({"op": "remove", "path": "/Status", "value": null}),
        );
        assert!(decoded.is_err());
    }

    #[test]
    fn test_property_of_nested_path() {
        let patch = Patch {
            op: PatchOp::Add,
            path: "/Contents/Inner".to_string(),
            value: json!(1),
        };
        assert_eq!(patch.property(), None);
        assert!(!patch.targets("Contents"));
    }

    #[test]
    fn test_op_for_presence() {
        assert_eq!(PatchOp::for_presence(true), PatchOp::Replace);
        assert_eq!(PatchOp::for_presence(false), PatchOp::Add);
    }
}
