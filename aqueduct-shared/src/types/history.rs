//! Flattened history records for downstream storage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::notification::ChangeNotification;
use super::patch::PatchOp;
use super::twin::TwinId;

/// One patch in a history record; the property is the path without its slash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPatch {
    pub op: PatchOp,
    pub property: String,
    pub value: Value,
}

/// Pass-through projection of a handled change notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub model_id: String,
    pub twin_id: TwinId,
    pub event_time: DateTime<Utc>,
    pub patches: Vec<HistoryPatch>,
}

impl HistoryRecord {
    pub fn from_notification(notification: &ChangeNotification) -> Self {
        let patches = notification
            .patches
            .iter()
            .map(|patch| HistoryPatch {
                op: patch.op,
                property: patch
                    .path
                    .strip_prefix('/')
                    .unwrap_or(&patch.path)
                    .to_string(),
                value: patch.value.clone(),
            })
            .collect();

        Self {
            model_id: notification.model_id.clone(),
            twin_id: notification.twin_id.clone(),
            event_time: notification.event_time,
            patches,
        }
    }
}
