//! Ingestion layer for hook log entries
//!
//! Turns raw hook log entries (Layer 0) into canonical [`Event`]s.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────┐     ┌──────────────┐     ┌──────────────┐
//! │  Category log files  │ ──► │  LogStore    │ ──► │  normalize() │ ──► Event
//! │ (~/.claude/logs/...) │     │ (JSON/JSONL) │     │              │
//! └──────────────────────┘     └──────────────┘     └──────────────┘
//! ```
//!
//! ## Design Principles
//!
//! 1. **Lossless capture**: the full raw entry is preserved in [`Event::data`]
//! 2. **Never fails**: missing fields get defaults, a bad timestamp is kept
//!    as written and falls back to "now" when read
//! 3. **Resilience**: a corrupt file in a directory scan is skipped with a warning

mod log_store;

pub use log_store::{
    category_of, is_category_file, load_log_file, read_entries, LogStore, SESSION_CATEGORIES,
};

use crate::types::{Event, EventType, UNKNOWN};
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Event type implied by a log category when the entry has none.
pub fn event_type_for_category(category: &str) -> Option<EventType> {
    match category {
        "post_tool_use" | "pre_tool_use" | "enhanced_tool_use" => Some(EventType::ToolUse),
        "user_prompt_submit" => Some(EventType::PromptSubmit),
        "session_start" => Some(EventType::SessionStart),
        "stop" | "session_end" => Some(EventType::SessionEnd),
        "subagent_stop" => Some(EventType::AgentComplete),
        _ => None,
    }
}

/// Normalize a raw log entry into an [`Event`].
///
/// Missing `event_type`/`session_id` become `"unknown"`, a missing timestamp
/// becomes the current time. `tool_use` events always carry a `tool_name`
/// (lifted from the hook's `name` field, else `"unknown"`).
pub fn normalize(raw: &Value) -> Event {
    normalize_entry(raw, None)
}

/// Normalize an entry read from a known category file.
///
/// The category supplies the event type when the entry has none.
pub fn normalize_with_category(raw: &Value, category: &str) -> Event {
    normalize_entry(raw, Some(category))
}

fn normalize_entry(raw: &Value, category: Option<&str>) -> Event {
    let mut data = match raw {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };

    let event_type = data
        .get("event_type")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(EventType::from)
        .or_else(|| category.and_then(event_type_for_category))
        .unwrap_or_else(|| EventType::from(UNKNOWN));

    let session_id = data
        .get("session_id")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .unwrap_or(UNKNOWN)
        .to_string();

    let timestamp = data
        .get("timestamp")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true));

    if !data.contains_key("tool_name") {
        let lifted = data
            .get("name")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        match lifted {
            Some(name) => {
                data.insert("tool_name".to_string(), Value::String(name));
            }
            None if event_type == EventType::ToolUse => {
                data.insert("tool_name".to_string(), Value::String(UNKNOWN.to_string()));
            }
            None => {}
        }
    }

    let metrics: BTreeMap<String, f64> = data
        .get("metrics")
        .and_then(Value::as_object)
        .map(|m| {
            m.iter()
                .filter_map(|(k, v)| v.as_f64().map(|f| (k.clone(), f)))
                .collect()
        })
        .unwrap_or_default();

    let project_path = data
        .get("project_path")
        .or_else(|| data.get("cwd"))
        .or_else(|| data.get("project_context").and_then(|c| c.get("working_directory")))
        .and_then(Value::as_str)
        .map(str::to_string);

    Event {
        event_type,
        session_id,
        timestamp,
        data,
        metrics,
        project_path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_full_entry() {
        let raw = json!({
            "event_type": "tool_use",
            "session_id": "abc",
            "timestamp": "2025-01-10T10:00:00Z",
            "tool_name": "Bash",
            "metrics": {"execution_time": 1.5, "timestamp": "2025-01-10T10:00:00Z"},
            "cwd": "/work/project"
        });
        let event = normalize(&raw);

        assert_eq!(event.event_type, EventType::ToolUse);
        assert_eq!(event.session_id, "abc");
        assert_eq!(event.tool_name(), Some("Bash"));
        assert_eq!(event.execution_time(), Some(1.5));
        // Non-numeric metrics are dropped
        assert_eq!(event.metrics.len(), 1);
        assert_eq!(event.project_path.as_deref(), Some("/work/project"));
        // Raw fields are preserved
        assert_eq!(event.data.get("cwd"), Some(&json!("/work/project")));
    }

    #[test]
    fn test_normalize_missing_fields_never_fails() {
        let event = normalize(&json!({}));
        assert_eq!(event.event_type, EventType::Other("unknown".to_string()));
        assert_eq!(event.session_id, "unknown");
        assert!(!event.timestamp_parse_failed());
        assert!(event.tool_name().is_none());

        let event = normalize(&json!("not an object"));
        assert_eq!(event.session_id, "unknown");
        assert!(event.data.is_empty());
    }

    #[test]
    fn test_normalize_tool_use_without_tool_gets_unknown() {
        let event = normalize(&json!({"event_type": "tool_use", "session_id": "s"}));
        assert_eq!(event.tool_name(), Some("unknown"));
    }

    #[test]
    fn test_normalize_lifts_hook_name() {
        let event = normalize(&json!({"event_type": "tool_use", "name": "Edit"}));
        assert_eq!(event.data.get("tool_name"), Some(&json!("Edit")));
    }

    #[test]
    fn test_normalize_keeps_malformed_timestamp() {
        let event = normalize(&json!({"timestamp": "not-a-date"}));
        assert_eq!(event.timestamp, "not-a-date");
        assert!(event.timestamp_parse_failed());
    }

    #[test]
    fn test_category_supplies_event_type() {
        let event = normalize_with_category(&json!({"session_id": "s"}), "post_tool_use");
        assert_eq!(event.event_type, EventType::ToolUse);

        let explicit =
            normalize_with_category(&json!({"event_type": "agent_complete"}), "post_tool_use");
        assert_eq!(explicit.event_type, EventType::AgentComplete);
    }
}
