//! Recurring error detector
//!
//! Counts tool errors in the recent window that read like the current one
//! (token-set similarity above the configured threshold). The current event
//! is in the window, so it counts itself.

use super::Detector;
use crate::config::DetectorConfig;
use crate::error::Result;
use crate::similarity::similarity;
use crate::stats::RecentEvents;
use crate::types::{Event, EventType, Finding, FindingKind, Severity, UNKNOWN};

pub struct RecurringErrorDetector {
    similarity_threshold: f64,
    occurrence_threshold: usize,
}

impl RecurringErrorDetector {
    pub fn new(config: &DetectorConfig) -> Self {
        Self {
            similarity_threshold: config.similarity_threshold,
            occurrence_threshold: config.recurring_error_threshold,
        }
    }
}

impl Detector for RecurringErrorDetector {
    fn name(&self) -> &str {
        "core.recurring_error"
    }

    fn detect(&mut self, event: &Event, recent: &RecentEvents) -> Result<Vec<Finding>> {
        if event.event_type != EventType::ToolUse {
            return Ok(vec![]);
        }
        let Some(message) = event.error() else {
            return Ok(vec![]);
        };

        let occurrences = recent
            .iter()
            .filter(|e| e.event_type == EventType::ToolUse)
            .filter_map(Event::error)
            .filter(|other| similarity(other, &message) > self.similarity_threshold)
            .count();

        if occurrences <= self.occurrence_threshold {
            return Ok(vec![]);
        }

        let tool = event.tool_name().unwrap_or(UNKNOWN);
        tracing::debug!(tool, occurrences, "Recurring error detected");

        let mut finding = Finding::new(FindingKind::RecurringError, tool, Severity::High)
            .with_evidence("occurrence_count", occurrences)
            .with_evidence("error_message", message.as_str());
        if let Some(class) = event.error_classification() {
            finding = finding
                .with_evidence("error_type", class.error_type.as_str())
                .with_evidence("is_retryable", class.is_retryable);
        }
        Ok(vec![finding])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failing(tool: &str, error: &str) -> Event {
        Event::new(EventType::ToolUse, "s1", "2025-01-10T10:00:00Z")
            .with_data("tool_name", tool)
            .with_data("error", error)
    }

    /// Push into the window first, the way the engine does.
    fn feed(detector: &mut RecurringErrorDetector, recent: &mut RecentEvents, event: Event) -> Vec<Finding> {
        recent.push(event.clone());
        detector.detect(&event, recent).unwrap()
    }

    #[test]
    fn test_fourth_identical_error_fires() {
        let mut detector = RecurringErrorDetector::new(&DetectorConfig::default());
        let mut recent = RecentEvents::new(1000);

        for _ in 0..3 {
            let findings = feed(&mut detector, &mut recent, failing("Bash", "command not found: foo"));
            assert!(findings.is_empty());
        }
        let findings = feed(&mut detector, &mut recent, failing("Bash", "command not found: foo"));
        assert_eq!(findings.len(), 1);
        let finding = &findings[0];
        assert_eq!(finding.kind, FindingKind::RecurringError);
        assert_eq!(finding.severity, Severity::High);
        assert!(finding.evidence_u64("occurrence_count").unwrap() >= 4);
        assert_eq!(finding.evidence_str("error_message"), Some("command not found: foo"));
        assert_eq!(finding.evidence_str("error_type"), Some("not_found"));
    }

    #[test]
    fn test_dissimilar_errors_do_not_accumulate() {
        let mut detector = RecurringErrorDetector::new(&DetectorConfig::default());
        let mut recent = RecentEvents::new(1000);
        for i in 0..6 {
            let findings = feed(
                &mut detector,
                &mut recent,
                failing("Bash", &format!("unrelated failure number {i} in step {i}")),
            );
            assert!(findings.is_empty());
        }
    }

    #[test]
    fn test_successful_events_ignored() {
        let mut detector = RecurringErrorDetector::new(&DetectorConfig::default());
        let mut recent = RecentEvents::new(1000);
        let ok = Event::new(EventType::ToolUse, "s1", "t").with_data("tool_name", "Bash");
        assert!(feed(&mut detector, &mut recent, ok).is_empty());
    }
}
