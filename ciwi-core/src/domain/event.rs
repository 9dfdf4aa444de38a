//! Job execution events

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Append-only event reported by an agent while a job runs
///
/// A `metadata` patch is merged into the job's metadata when the event is
/// stored. An empty value removes the key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobExecutionEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_utc: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, String>>,
}

/// Applies an event's metadata patch to a metadata table
pub fn apply_metadata_patch(
    metadata: &mut BTreeMap<String, String>,
    patch: &BTreeMap<String, String>,
) {
    for (key, value) in patch {
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        if value.trim().is_empty() {
            metadata.remove(key);
        } else {
            metadata.insert(key.to_string(), value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_metadata_patch_sets_and_removes() {
        let mut metadata = BTreeMap::from([
            ("project".to_string(), "ciwi".to_string()),
            ("stale".to_string(), "x".to_string()),
        ]);
        let patch = BTreeMap::from([
            ("stale".to_string(), String::new()),
            ("build_version".to_string(), "1.2.3".to_string()),
            (" ".to_string(), "ignored".to_string()),
        ]);

        apply_metadata_patch(&mut metadata, &patch);

        assert_eq!(metadata.get("project").map(String::as_str), Some("ciwi"));
        assert_eq!(
            metadata.get("build_version").map(String::as_str),
            Some("1.2.3")
        );
        assert!(!metadata.contains_key("stale"));
        assert_eq!(metadata.len(), 2);
    }

    #[test]
    fn test_event_type_field_name() {
        let event: JobExecutionEvent =
            serde_json::from_str(r#"{"type":"step_started","message":"build"}"#).unwrap();
        assert_eq!(event.event_type, "step_started");
        assert!(event.metadata.is_none());
    }
}
