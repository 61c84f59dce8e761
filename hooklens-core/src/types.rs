//! Core domain types for hooklens
//!
//! These types are the canonical data model shared by the detectors, the
//! aggregator and the synthesizer.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Event** | One normalized hook log entry |
//! | **Finding** | One detector's flagged observation about a single event |
//! | **Recommendation** | A user-facing suggestion derived from one or more findings |
//! | **Baseline** | The median of a key's recent samples |
//! | **Session** | Events sharing a session identifier |
//! | **Workflow** | A long consecutive run of tool invocations within one session |
//!
//! Events are value objects: detectors read them, never mutate them.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Placeholder used for any missing identifier.
pub const UNKNOWN: &str = "unknown";

// ============================================
// Event types
// ============================================

/// Kind of hook event.
///
/// This is an open set: unknown kinds are preserved in [`EventType::Other`]
/// and simply produce no detector behavior.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventType {
    ToolUse,
    AgentComplete,
    AgentExecution,
    CommandExecution,
    PromptSubmit,
    SessionStart,
    SessionEnd,
    Other(String),
}

impl EventType {
    pub fn as_str(&self) -> &str {
        match self {
            EventType::ToolUse => "tool_use",
            EventType::AgentComplete => "agent_complete",
            EventType::AgentExecution => "agent_execution",
            EventType::CommandExecution => "command_execution",
            EventType::PromptSubmit => "prompt_submit",
            EventType::SessionStart => "session_start",
            EventType::SessionEnd => "session_end",
            EventType::Other(s) => s,
        }
    }
}

impl From<&str> for EventType {
    fn from(s: &str) -> Self {
        match s {
            "tool_use" => EventType::ToolUse,
            "agent_complete" => EventType::AgentComplete,
            "agent_execution" => EventType::AgentExecution,
            "command_execution" => EventType::CommandExecution,
            "prompt_submit" => EventType::PromptSubmit,
            "session_start" => EventType::SessionStart,
            "session_end" => EventType::SessionEnd,
            other => EventType::Other(other.to_string()),
        }
    }
}

impl From<String> for EventType {
    fn from(s: String) -> Self {
        EventType::from(s.as_str())
    }
}

impl From<EventType> for String {
    fn from(t: EventType) -> Self {
        t.as_str().to_string()
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================
// Event
// ============================================

/// A normalized hook log entry.
///
/// The required fields are fixed; everything else the hook wrote is kept in
/// `data`. Use [`crate::ingest::normalize`] to build one from a raw entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event_type: EventType,
    pub session_id: String,
    /// ISO-8601 timestamp as written by the hook
    pub timestamp: String,
    /// Full raw entry, including fields detectors don't need
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
    #[serde(default)]
    pub project_path: Option<String>,
}

impl Event {
    /// Create an event with empty data and metrics.
    pub fn new(
        event_type: impl Into<EventType>,
        session_id: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            session_id: session_id.into(),
            timestamp: timestamp.into(),
            data: Map::new(),
            metrics: BTreeMap::new(),
            project_path: None,
        }
    }

    /// Set a data field.
    pub fn with_data(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.data.insert(key.to_string(), value.into());
        self
    }

    /// Set a metric.
    pub fn with_metric(mut self, key: &str, value: f64) -> Self {
        self.metrics.insert(key.to_string(), value);
        self
    }

    /// Set the project path.
    pub fn with_project_path(mut self, path: impl Into<String>) -> Self {
        self.project_path = Some(path.into());
        self
    }

    /// Parse the timestamp, or `None` if it is malformed.
    ///
    /// Accepts RFC 3339 (`Z` or offsets) and naive `YYYY-MM-DDTHH:MM:SS[.f]`,
    /// which is read as UTC.
    pub fn parsed_timestamp(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.timestamp)
    }

    /// True when [`Self::parsed_timestamp`] fails and callers get a fallback.
    pub fn timestamp_parse_failed(&self) -> bool {
        self.parsed_timestamp().is_none()
    }

    /// Parsed timestamp, falling back to `now` on a malformed value.
    pub fn datetime_or(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.parsed_timestamp().unwrap_or(now)
    }

    /// Parsed timestamp, falling back to the current time.
    pub fn datetime(&self) -> DateTime<Utc> {
        self.datetime_or(Utc::now())
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.data
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Tool name, from `tool_name` or the hook's `name` field.
    pub fn tool_name(&self) -> Option<&str> {
        self.str_field("tool_name").or_else(|| self.str_field("name"))
    }

    pub fn agent_name(&self) -> Option<&str> {
        self.str_field("agent_name")
    }

    pub fn command_name(&self) -> Option<&str> {
        self.str_field("command_name")
    }

    pub fn prompt(&self) -> Option<&str> {
        self.str_field("prompt")
    }

    /// Error text, if the entry carries a non-empty error.
    pub fn error(&self) -> Option<String> {
        match self.data.get("error")? {
            Value::Null | Value::Bool(false) => None,
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Explicit `success` flag when present, otherwise "no error".
    pub fn succeeded(&self) -> bool {
        match self.data.get("success").and_then(Value::as_bool) {
            Some(success) => success,
            None => self.error().is_none(),
        }
    }

    /// The explicit `success` flag, false when absent.
    pub fn reported_success(&self) -> bool {
        self.data
            .get("success")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn is_failure(&self) -> bool {
        !self.succeeded()
    }

    /// Execution time in seconds from `metrics`, else from `data`.
    pub fn execution_time(&self) -> Option<f64> {
        self.metrics
            .get("execution_time")
            .copied()
            .or_else(|| self.data.get("execution_time").and_then(Value::as_f64))
    }

    pub fn metric(&self, key: &str) -> Option<f64> {
        self.metrics.get(key).copied()
    }

    /// Classify this event's error text, if any.
    pub fn error_classification(&self) -> Option<ErrorClassification> {
        self.error().map(|e| classify_error(&e))
    }
}

/// Parse a hook timestamp.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}

// ============================================
// Error classification
// ============================================

/// Coarse category of a tool error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    Timeout,
    Permission,
    NotFound,
    Network,
    Resource,
    Validation,
    Unknown,
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::Timeout => "timeout",
            ErrorType::Permission => "permission",
            ErrorType::NotFound => "not_found",
            ErrorType::Network => "network",
            ErrorType::Resource => "resource",
            ErrorType::Validation => "validation",
            ErrorType::Unknown => "unknown",
        }
    }
}

/// Result of [`classify_error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorClassification {
    pub error_type: ErrorType,
    pub is_retryable: bool,
    pub severity: Severity,
}

/// Keyword rules, checked in order. First match wins.
const ERROR_RULES: &[(ErrorType, &[&str], bool, Severity)] = &[
    (ErrorType::Timeout, &["timeout", "timed out"], true, Severity::Medium),
    (
        ErrorType::Permission,
        &["permission", "unauthorized", "access denied"],
        false,
        Severity::High,
    ),
    (
        ErrorType::NotFound,
        &["not found", "404", "missing"],
        false,
        Severity::Medium,
    ),
    (
        ErrorType::Network,
        &["network", "connection", "dns"],
        true,
        Severity::Medium,
    ),
    (
        ErrorType::Resource,
        &["memory", "out of memory", "oom"],
        true,
        Severity::High,
    ),
    (
        ErrorType::Validation,
        &["syntax", "invalid", "malformed"],
        false,
        Severity::Medium,
    ),
];

/// Classify an error message by keyword.
pub fn classify_error(message: &str) -> ErrorClassification {
    let lower = message.to_lowercase();
    ERROR_RULES
        .iter()
        .find(|(_, words, _, _)| words.iter().any(|w| lower.contains(w)))
        .map(|(error_type, _, is_retryable, severity)| ErrorClassification {
            error_type: *error_type,
            is_retryable: *is_retryable,
            severity: *severity,
        })
        .unwrap_or(ErrorClassification {
            error_type: ErrorType::Unknown,
            is_retryable: false,
            severity: Severity::Medium,
        })
}

// ============================================
// Findings
// ============================================

/// Severity of a finding. Ordered low to high.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

/// What a detector flagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    SlowExecution,
    RecurringError,
    HighSuccessStreak,
    DurationAnomaly,
}

impl FindingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FindingKind::SlowExecution => "slow_execution",
            FindingKind::RecurringError => "recurring_error",
            FindingKind::HighSuccessStreak => "high_success_streak",
            FindingKind::DurationAnomaly => "duration_anomaly",
        }
    }
}

impl std::fmt::Display for FindingKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One detector's observation about a single event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub kind: FindingKind,
    /// Tool, agent or session the finding is about
    pub subject: String,
    pub severity: Severity,
    pub evidence: Map<String, Value>,
}

impl Finding {
    pub fn new(kind: FindingKind, subject: impl Into<String>, severity: Severity) -> Self {
        Self {
            kind,
            subject: subject.into(),
            severity,
            evidence: Map::new(),
        }
    }

    /// Attach one piece of evidence.
    pub fn with_evidence(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.evidence.insert(key.to_string(), value.into());
        self
    }

    pub fn evidence_f64(&self, key: &str) -> Option<f64> {
        self.evidence.get(key).and_then(Value::as_f64)
    }

    pub fn evidence_u64(&self, key: &str) -> Option<u64> {
        self.evidence.get(key).and_then(Value::as_u64)
    }

    pub fn evidence_str(&self, key: &str) -> Option<&str> {
        self.evidence.get(key).and_then(Value::as_str)
    }
}

// ============================================
// Recommendations
// ============================================

/// Priority of a recommendation. Ordered low to critical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }
}

impl From<Severity> for Priority {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Low => Priority::Low,
            Severity::Medium => Priority::Medium,
            Severity::High => Priority::High,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A user-facing suggestion. Terminal: written out, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(rename = "type")]
    pub recommendation_type: String,
    /// Tool, agent, command or prompt group the suggestion applies to
    pub target: String,
    pub priority: Priority,
    pub title: String,
    pub description: String,
    pub rationale: String,
    pub implementation_steps: Vec<String>,
    pub expected_impact: String,
    /// In `[0, 1]`
    pub confidence_score: f64,
    pub supporting_data: Map<String, Value>,
    pub timestamp: DateTime<Utc>,
}

impl Recommendation {
    /// Start a recommendation; the rest is filled in with the `with_*` setters.
    pub fn new(
        recommendation_type: &str,
        target: impl Into<String>,
        priority: Priority,
        title: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            recommendation_type: recommendation_type.to_string(),
            target: target.into(),
            priority,
            title: title.into(),
            description: String::new(),
            rationale: String::new(),
            implementation_steps: Vec::new(),
            expected_impact: String::new(),
            confidence_score: 0.0,
            supporting_data: Map::new(),
            timestamp,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = rationale.into();
        self
    }

    pub fn with_steps<S: Into<String>>(mut self, steps: impl IntoIterator<Item = S>) -> Self {
        self.implementation_steps = steps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_impact(mut self, impact: impl Into<String>) -> Self {
        self.expected_impact = impact.into();
        self
    }

    /// Set the confidence, clamped to `[0, 1]`.
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence_score = confidence.clamp(0.0, 1.0);
        self
    }

    pub fn with_data(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.supporting_data.insert(key.to_string(), value.into());
        self
    }
}

/// Sort recommendations by priority, then confidence, highest first.
pub fn sort_recommendations(recommendations: &mut [Recommendation]) {
    recommendations.sort_by(|a, b| {
        b.priority.cmp(&a.priority).then(
            b.confidence_score
                .partial_cmp(&a.confidence_score)
                .unwrap_or(std::cmp::Ordering::Equal),
        )
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_type_round_trip_preserves_unknown() {
        assert_eq!(EventType::from("tool_use"), EventType::ToolUse);
        let other = EventType::from("pre_compact");
        assert_eq!(other, EventType::Other("pre_compact".to_string()));
        assert_eq!(other.as_str(), "pre_compact");

        let json = serde_json::to_string(&EventType::SessionEnd).unwrap();
        assert_eq!(json, "\"session_end\"");
    }

    #[test]
    fn test_timestamp_parsing() {
        let event = Event::new("tool_use", "s1", "2025-01-10T10:00:00Z");
        assert!(!event.timestamp_parse_failed());

        let naive = Event::new("tool_use", "s1", "2025-01-10T10:00:00.123456");
        assert!(naive.parsed_timestamp().is_some());

        let offset = Event::new("tool_use", "s1", "2025-01-10T12:00:00+02:00");
        assert_eq!(offset.parsed_timestamp(), event.parsed_timestamp());
    }

    #[test]
    fn test_malformed_timestamp_falls_back_to_given_now() {
        let event = Event::new("tool_use", "s1", "yesterday-ish");
        let now = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);

        assert!(event.timestamp_parse_failed());
        assert_eq!(event.datetime_or(now), now);
    }

    #[test]
    fn test_success_and_error_accessors() {
        let ok = Event::new("tool_use", "s1", "t").with_data("tool_name", "Read");
        assert!(ok.succeeded());
        assert!(!ok.reported_success());
        assert_eq!(ok.error(), None);

        let failed = Event::new("tool_use", "s1", "t").with_data("error", "boom");
        assert!(failed.is_failure());
        assert_eq!(failed.error().as_deref(), Some("boom"));

        // An explicit flag wins over the error field
        let flagged = Event::new("tool_use", "s1", "t")
            .with_data("success", false)
            .with_data("error", "");
        assert!(flagged.is_failure());
        assert_eq!(flagged.error(), None);

        let structured = Event::new("tool_use", "s1", "t").with_data("error", json!({"code": 2}));
        assert_eq!(structured.error().as_deref(), Some("{\"code\":2}"));
    }

    #[test]
    fn test_tool_name_falls_back_to_name() {
        let event = Event::new("tool_use", "s1", "t").with_data("name", "Bash");
        assert_eq!(event.tool_name(), Some("Bash"));
    }

    #[test]
    fn test_execution_time_prefers_metrics() {
        let event = Event::new("tool_use", "s1", "t")
            .with_data("execution_time", 4.0)
            .with_metric("execution_time", 2.5);
        assert_eq!(event.execution_time(), Some(2.5));

        let data_only = Event::new("tool_use", "s1", "t").with_data("execution_time", 4);
        assert_eq!(data_only.execution_time(), Some(4.0));
    }

    #[test]
    fn test_classify_error() {
        let c = classify_error("Connection timed out after 30s");
        assert_eq!(c.error_type, ErrorType::Timeout);
        assert!(c.is_retryable);

        let c = classify_error("Access denied for /etc/shadow");
        assert_eq!(c.error_type, ErrorType::Permission);
        assert_eq!(c.severity, Severity::High);

        let c = classify_error("something odd");
        assert_eq!(c.error_type, ErrorType::Unknown);
        assert!(!c.is_retryable);
    }

    #[test]
    fn test_sort_recommendations() {
        let make = |priority, confidence| {
            Recommendation::new("t", "x", priority, "title", Utc::now()).with_confidence(confidence)
        };
        let mut recs = vec![
            make(Priority::Low, 0.9),
            make(Priority::High, 0.8),
            make(Priority::High, 0.9),
            make(Priority::Medium, 0.5),
        ];
        sort_recommendations(&mut recs);
        let order: Vec<_> = recs
            .iter()
            .map(|r| (r.priority, r.confidence_score))
            .collect();
        assert_eq!(
            order,
            vec![
                (Priority::High, 0.9),
                (Priority::High, 0.8),
                (Priority::Medium, 0.5),
                (Priority::Low, 0.9),
            ]
        );
    }
}
