//! Change notifications and delayed updates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::patch::Patch;
use super::twin::TwinId;

/// A twin-property change, the unit the event router consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeNotification {
    pub model_id: String,
    pub twin_id: TwinId,
    /// Originating graph instance (host name of the twin store).
    pub instance: String,
    pub event_time: DateTime<Utc>,
    #[serde(rename = "patch")]
    pub patches: Vec<Patch>,
    /// Cascade generation; 0 for externally produced changes.
    #[serde(default)]
    pub hops: u32,
}

impl ChangeNotification {
    pub fn new(
        instance: impl Into<String>,
        twin_id: impl Into<TwinId>,
        model_id: impl Into<String>,
        patches: Vec<Patch>,
    ) -> Self {
        Self {
            model_id: model_id.into(),
            twin_id: twin_id.into(),
            instance: instance.into(),
            event_time: Utc::now(),
            patches,
            hops: 0,
        }
    }

    pub fn with_hops(mut self, hops: u32) -> Self {
        self.hops = hops;
        self
    }

    /// First patch targeting `property`, in notification order.
    pub fn find_patch(&self, property: &str) -> Option<&Patch> {
        self.patches.iter().find(|p| p.targets(property))
    }

    /// First patch targeting any of `properties`, in notification order.
    pub fn find_any(&self, properties: &[&str]) -> Option<&Patch> {
        self.patches
            .iter()
            .find(|p| properties.iter().any(|name| p.targets(name)))
    }
}

/// A derived update waiting for physical transit time before delivery.
///
/// On the wire the single patch is carried as a one-element `patch` list, the
/// same shape as an ingress notification body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelayedUpdate {
    pub target_instance: String,
    pub twin_id: TwinId,
    pub model_id: String,
    #[serde(with = "single_patch")]
    pub patch: Patch,
    pub deliver_at: DateTime<Utc>,
    #[serde(default)]
    pub hops: u32,
}

mod single_patch {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use crate::types::patch::Patch;

    pub fn serialize<S: Serializer>(patch: &Patch, serializer: S) -> Result<S::Ok, S::Error> {
        [patch].serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Patch, D::Error> {
        let mut patches = Vec::<Patch>::deserialize(deserializer)?;
        if patches.len() != 1 {
            return Err(D::Error::custom(format!(
                "expected exactly one patch, found {}",
                patches.len()
            )));
        }
        Ok(patches.remove(0))
    }
}
