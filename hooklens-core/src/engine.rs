//! Pattern engine
//!
//! [`PatternEngine`] owns the detectors, their per-key histories and the
//! recent-event window. One engine serves one event stream; parallel
//! streams each get their own engine and merge results afterwards.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        PATTERN ENGINE                           │
//! │                                                                 │
//! │   event ──► RecentEvents (push first)                           │
//! │                 │                                               │
//! │                 ▼                                               │
//! │  ┌─────────────┐ ┌─────────────┐ ┌─────────────┐ ┌───────────┐  │
//! │  │ performance │ │ recurring   │ │ success     │ │ duration  │  │
//! │  │             │ │ error       │ │ streak      │ │ anomaly   │  │
//! │  └──────┬──────┘ └──────┬──────┘ └──────┬──────┘ └─────┬─────┘  │
//! │         └───────────────┴───────┬───────┴──────────────┘        │
//! │                                 ▼                               │
//! │                    Vec<Finding> (errors logged)                 │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use hooklens_core::{Config, PatternEngine};
//!
//! let mut engine = PatternEngine::new(&Config::default());
//! for event in events {
//!     for finding in engine.process(event) {
//!         println!("{}: {}", finding.kind, finding.subject);
//!     }
//! }
//! ```

use crate::aggregate::{AggregateReport, Aggregator, MultiSessionReport};
use crate::config::Config;
use crate::detect::{default_detectors, Detector};
use crate::error::Result;
use crate::ingest::load_log_file;
use crate::recommend::synthesize;
use crate::stats::RecentEvents;
use crate::types::{Event, Finding, Recommendation};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// An event together with the findings it triggered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventFindings {
    pub event: Event,
    pub findings: Vec<Finding>,
}

/// Result of running a fresh engine across one log file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogAnalysis {
    pub run_id: String,
    pub file_path: PathBuf,
    pub event_count: usize,
    pub analysis_timestamp: DateTime<Utc>,
    /// Only events that produced at least one finding
    pub patterns: Vec<EventFindings>,
    pub recommendations: Vec<Recommendation>,
}

impl LogAnalysis {
    pub fn finding_count(&self) -> usize {
        self.patterns.iter().map(|p| p.findings.len()).sum()
    }
}

pub struct PatternEngine {
    config: Config,
    detectors: Vec<Box<dyn Detector>>,
    recent: RecentEvents,
    aggregator: Aggregator,
}

impl PatternEngine {
    /// An engine with the built-in detectors.
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
            detectors: default_detectors(&config.detectors),
            recent: RecentEvents::new(config.detectors.recent_window),
            aggregator: Aggregator::new(config.aggregator.clone()),
        }
    }

    /// An engine with no detectors registered.
    pub fn empty(config: &Config) -> Self {
        Self {
            detectors: Vec::new(),
            ..Self::new(config)
        }
    }

    pub fn register(&mut self, detector: Box<dyn Detector>) {
        tracing::debug!(detector = detector.name(), "Registered detector");
        self.detectors.push(detector);
    }

    pub fn detector_names(&self) -> Vec<&str> {
        self.detectors.iter().map(|d| d.name()).collect()
    }

    pub fn recent_events(&self) -> &RecentEvents {
        &self.recent
    }

    /// Feed one event through every detector.
    ///
    /// The event enters the recent window before detection. A detector that
    /// fails is logged and contributes nothing.
    pub fn process(&mut self, event: Event) -> Vec<Finding> {
        self.recent.push(event.clone());

        let mut findings = Vec::new();
        for detector in &mut self.detectors {
            match detector.detect(&event, &self.recent) {
                Ok(found) => findings.extend(found),
                Err(e) => {
                    tracing::warn!(
                        detector = detector.name(),
                        session_id = %event.session_id,
                        event_type = %event.event_type,
                        error = %e,
                        "Detector failed; skipping event"
                    );
                }
            }
        }
        findings
    }

    /// Batch aggregation over one session's ordered events.
    ///
    /// Pure: does not touch the detectors or the recent window.
    pub fn analyze_session(&self, events: &[Event]) -> AggregateReport {
        self.aggregator.analyze_session(events)
    }

    /// Batch aggregation over events from many sessions.
    pub fn analyze_sessions(&self, events: &[Event]) -> MultiSessionReport {
        self.aggregator.analyze_sessions(events)
    }

    /// Run a fresh engine with this engine's configuration across a log file.
    pub fn analyze_log_file(&self, path: &Path) -> Result<LogAnalysis> {
        analyze_log_file(&self.config, path)
    }
}

/// Stream every entry of `path` through a fresh engine.
pub fn analyze_log_file(config: &Config, path: &Path) -> Result<LogAnalysis> {
    let events = load_log_file(path)?;
    let event_count = events.len();
    let analysis_timestamp = Utc::now();

    let mut engine = PatternEngine::new(config);
    let mut patterns = Vec::new();
    for event in events {
        let findings = engine.process(event.clone());
        if !findings.is_empty() {
            patterns.push(EventFindings { event, findings });
        }
    }

    let all: Vec<Finding> = patterns
        .iter()
        .flat_map(|p| p.findings.iter().cloned())
        .collect();
    let recommendations = synthesize(&all, analysis_timestamp);

    tracing::info!(
        path = %path.display(),
        events = event_count,
        findings = all.len(),
        recommendations = recommendations.len(),
        "Analyzed log file"
    );

    Ok(LogAnalysis {
        run_id: uuid::Uuid::new_v4().to_string(),
        file_path: path.to_path_buf(),
        event_count,
        analysis_timestamp,
        patterns,
        recommendations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::types::{EventType, FindingKind, Severity};
    use serde_json::json;
    use tempfile::TempDir;

    fn tool(name: &str, secs: f64) -> Event {
        Event::new(EventType::ToolUse, "s1", "2025-01-10T10:00:00Z")
            .with_data("tool_name", name)
            .with_metric("execution_time", secs)
    }

    struct Failing;

    impl Detector for Failing {
        fn name(&self) -> &str {
            "test.failing"
        }

        fn detect(&mut self, _: &Event, _: &RecentEvents) -> Result<Vec<Finding>> {
            Err(Error::detector("test.failing", "boom"))
        }
    }

    struct SeesItself;

    impl Detector for SeesItself {
        fn name(&self) -> &str {
            "test.sees_itself"
        }

        fn detect(&mut self, event: &Event, recent: &RecentEvents) -> Result<Vec<Finding>> {
            assert_eq!(recent.iter().last(), Some(event));
            Ok(vec![])
        }
    }

    #[test]
    fn test_default_detectors() {
        let engine = PatternEngine::new(&Config::default());
        assert_eq!(
            engine.detector_names(),
            vec![
                "core.performance",
                "core.recurring_error",
                "core.success_streak",
                "core.duration_anomaly"
            ]
        );
    }

    #[test]
    fn test_slow_tool_after_baseline() {
        let mut engine = PatternEngine::new(&Config::default());
        for _ in 0..19 {
            assert!(engine.process(tool("Bash", 1.0)).is_empty());
        }
        let findings = engine.process(tool("Bash", 10.0));
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, FindingKind::SlowExecution);
        assert_eq!(findings[0].severity, Severity::High);
    }

    #[test]
    fn test_failing_detector_does_not_stop_stream() {
        let mut engine = PatternEngine::new(&Config::default());
        engine.register(Box::new(Failing));
        engine.register(Box::new(SeesItself));
        for _ in 0..19 {
            engine.process(tool("Bash", 1.0));
        }
        assert_eq!(engine.process(tool("Bash", 10.0)).len(), 1);
        assert_eq!(engine.recent_events().len(), 20);
    }

    #[test]
    fn test_analyze_session_is_pure() {
        let engine = PatternEngine::empty(&Config::default());
        let events: Vec<Event> = ["Read", "Edit", "Bash", "Read", "Edit", "Bash"]
            .iter()
            .map(|t| tool(t, 1.0))
            .collect();
        let first = engine.analyze_session(&events);
        let second = engine.analyze_session(&events);
        assert_eq!(first, second);
        assert_eq!(first.tool_sequences.len(), 1);
        assert!(engine.recent_events().is_empty());
    }

    #[test]
    fn test_analyze_log_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("post_tool_use.json");
        let mut entries: Vec<_> = (0..19)
            .map(|_| json!({"session_id": "s1", "tool_name": "Bash", "metrics": {"execution_time": 1.0}}))
            .collect();
        entries.push(json!({"session_id": "s1", "tool_name": "Bash", "metrics": {"execution_time": 10.0}}));
        std::fs::write(&path, serde_json::to_string(&entries).unwrap()).unwrap();

        let analysis = analyze_log_file(&Config::default(), &path).unwrap();
        assert_eq!(analysis.event_count, 20);
        assert_eq!(analysis.patterns.len(), 1);
        assert_eq!(analysis.finding_count(), 1);
        assert_eq!(analysis.recommendations.len(), 1);
        assert_eq!(analysis.recommendations[0].recommendation_type, "performance_optimization");
    }

    #[test]
    fn test_unknown_event_type_is_ignored() {
        let mut engine = PatternEngine::new(&Config::default());
        let unknown = |secs: f64| {
            Event::new("pre_compact", "s1", "2025-01-10T10:00:00Z")
                .with_data("tool_name", "Bash")
                .with_data("agent_name", "reviewer")
                .with_data("success", true)
                .with_data("error", "connection refused by host")
                .with_metric("execution_time", secs)
                .with_metric("session_duration", secs * 60.0)
        };

        let mut findings = Vec::new();
        for _ in 0..19 {
            findings.extend(engine.process(unknown(1.0)));
        }
        findings.extend(engine.process(unknown(10.0)));
        for _ in 0..20 {
            findings.extend(engine.process(unknown(1.0)));
        }

        assert!(findings.is_empty(), "unexpected findings: {findings:?}");
        assert_eq!(engine.recent_events().len(), 40);
    }

    #[test]
    fn test_analyze_missing_file() {
        let err = analyze_log_file(&Config::default(), Path::new("/nonexistent/x.json")).unwrap_err();
        assert!(matches!(err, Error::LogNotFound(_)));
    }
}
