//! Message types for the consumer.
//!
//! Defines the events that flow from Kafka into the cascade and the decoding
//! of change notifications from their CloudEvents envelope.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use aqueduct_shared::{ChangeNotification, DelayedUpdate, Patch};

use crate::errors::EngineError;

/// An event the engine handles.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// A twin changed.
    Change(ChangeNotification),
    /// A delayed update came due.
    Delayed(DelayedUpdate),
}

impl InboundEvent {
    pub fn twin_id(&self) -> &str {
        match self {
            InboundEvent::Change(change) => &change.twin_id,
            InboundEvent::Delayed(update) => &update.twin_id,
        }
    }
}

/// Messages that flow between the consumer and the orchestrator.
#[derive(Debug)]
pub enum StreamMessage {
    /// A batch of events with associated offsets for acknowledgment.
    Events {
        events: Vec<InboundEvent>,
        offsets: Vec<(String, i32, i64)>,
    },
    /// Acknowledgment that events were processed.
    Acknowledgment {
        offsets: Vec<(String, i32, i64)>,
        success: bool,
        error: Option<String>,
    },
    /// Stream has ended.
    End,
    /// An error occurred.
    Error(String),
}

/// CloudEvents binary-mode attributes of a change message.
#[derive(Debug, Clone, Default)]
pub struct ChangeHeaders {
    /// Originating graph instance.
    pub source: Option<String>,
    /// Twin id.
    pub subject: Option<String>,
    /// RFC 3339 event time.
    pub time: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangeBody {
    model_id: String,
    patch: Vec<Patch>,
    #[serde(default)]
    hops: u32,
}

/// Decode a change notification from its headers and JSON body.
///
/// A missing event time defaults to now.
pub fn decode_change(
    headers: &ChangeHeaders,
    payload: &[u8],
) -> Result<ChangeNotification, EngineError> {
    let instance = headers
        .source
        .clone()
        .ok_or_else(|| EngineError::parse("change message without ce_source"))?;
    let twin_id = headers
        .subject
        .clone()
        .ok_or_else(|| EngineError::parse("change message without ce_subject"))?;
    let event_time = match &headers.time {
        Some(time) => DateTime::parse_from_rfc3339(time)
            .map_err(|e| EngineError::parse(format!("Invalid ce_time '{}': {}", time, e)))?
            .with_timezone(&Utc),
        None => Utc::now(),
    };

    let body: ChangeBody = serde_json::from_slice(payload)
        .map_err(|e| EngineError::parse(format!("Invalid change body: {}", e)))?;

    Ok(ChangeNotification {
        model_id: body.model_id,
        twin_id,
        instance,
        event_time,
        patches: body.patch,
        hops: body.hops,
    })
}

/// Decode a delayed update from its JSON body.
pub fn decode_delayed(payload: &[u8]) -> Result<DelayedUpdate, EngineError> {
    serde_json::from_slice(payload)
        .map_err(|e| EngineError::parse(format!("Invalid delayed update: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use aqueduct_shared::PatchOp;

    fn headers() -> ChangeHeaders {
        ChangeHeaders {
            source: Some("aqueduct.local".to_string()),
            subject: Some("meter-1".to_string()),
            time: Some("2024-03-01T10:00:00.5Z".to_string()),
        }
    }

    #[test]
    fn test_decode_change() {
        let body = br#"{
            "modelId": "dtmi:sample:aqueduct:device:FlowMeter;1",
            "patch": [{ "op": "replace", "path": "/VolumeFlow", "value": 4.2 }]
        }"#;

        let change = decode_change(&headers(), body).unwrap();
        assert_eq!(change.instance, "aqueduct.local");
        assert_eq!(change.twin_id, "meter-1");
        assert_eq!(change.hops, 0);
        assert_eq!(change.patches[0].op, PatchOp::Replace);
        assert_eq!(change.event_time.timestamp_millis(), 1709287200500);
    }

    #[test]
    fn test_decode_change_rejects_malformed_input() {
        let body = br#"{ "modelId": "dtmi:sample:aqueduct:device:FlowMeter;1", "patch": [] }"#;

        let mut no_subject = headers();
        no_subject.subject = None;
        assert!(decode_change(&no_subject, body).is_err());

        let mut bad_time = headers();
        bad_time.time = Some("yesterday".to_string());
        assert!(decode_change(&bad_time, body).is_err());

        assert!(decode_change(&headers(), b"not json").is_err());
        assert!(decode_change(&headers(), br#"{ "patch": [] }"#).is_err());
    }

    #[test]
    fn test_missing_time_defaults_to_now() {
        let mut untimed = headers();
        untimed.time = None;
        let before = Utc::now();
        let change = decode_change(
            &untimed,
            br#"{ "modelId": "dtmi:sample:aqueduct:asset:Pipe;1", "patch": [], "hops": 3 }"#,
        )
        .unwrap();
        assert!(change.event_time >= before);
        assert_eq!(change.hops, 3);
    }
}
