//! Performance regression detector
//!
//! Tracks execution times per tool and flags an invocation that is much
//! slower than the tool's recent median.
//!
//! ## Evidence
//!
//! | Key | Type | Description |
//! |-----|------|-------------|
//! | `execution_time` | float | Seconds taken by this invocation |
//! | `baseline` | float | Median of the tool's recent timings (this one included) |
//! | `slowdown` | float | `execution_time / baseline` (absent when the baseline is 0) |
//! | `sample_size` | integer | Timings behind the baseline |

use super::Detector;
use crate::config::DetectorConfig;
use crate::error::{Error, Result};
use crate::stats::{Baseline, RecentEvents, RollingStore};
use crate::types::{Event, EventType, Finding, FindingKind, Severity, UNKNOWN};

pub struct PerformanceDetector {
    timings: RollingStore,
    window: usize,
    min_samples: usize,
    slow_multiplier: f64,
    severe_multiplier: f64,
}

impl PerformanceDetector {
    pub fn new(config: &DetectorConfig) -> Self {
        Self {
            timings: RollingStore::new(config.timing_window, config.min_samples),
            window: config.timing_window,
            min_samples: config.min_samples,
            slow_multiplier: config.slow_multiplier,
            severe_multiplier: config.severe_multiplier,
        }
    }
}

impl Detector for PerformanceDetector {
    fn name(&self) -> &str {
        "core.performance"
    }

    fn detect(&mut self, event: &Event, _recent: &RecentEvents) -> Result<Vec<Finding>> {
        if event.event_type != EventType::ToolUse {
            return Ok(vec![]);
        }
        let Some(elapsed) = event.execution_time() else {
            return Ok(vec![]);
        };
        if !elapsed.is_finite() || elapsed < 0.0 {
            return Err(Error::detector(
                self.name(),
                format!("invalid execution_time {elapsed}"),
            ));
        }

        let tool = event.tool_name().unwrap_or(UNKNOWN);
        self.timings.record(tool, elapsed);

        // A decision needs strictly more than `min_samples` timings.
        let baseline = match self
            .timings
            .baseline_with(tool, self.window, self.min_samples + 1)
        {
            Baseline::Ready(median) => median,
            Baseline::Insufficient { samples } => {
                tracing::trace!(tool, samples, "Not enough timings for a baseline");
                return Ok(vec![]);
            }
        };

        if elapsed <= baseline * self.slow_multiplier {
            return Ok(vec![]);
        }

        let severity = if elapsed > baseline * self.severe_multiplier {
            Severity::High
        } else {
            Severity::Medium
        };

        let mut finding = Finding::new(FindingKind::SlowExecution, tool, severity)
            .with_evidence("execution_time", elapsed)
            .with_evidence("baseline", baseline)
            .with_evidence("sample_size", self.timings.len(tool).min(self.window));
        if baseline > 0.0 {
            finding = finding.with_evidence("slowdown", elapsed / baseline);
        }
        Ok(vec![finding])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timed(tool: &str, secs: f64) -> Event {
        Event::new(EventType::ToolUse, "s1", "2025-01-10T10:00:00Z")
            .with_data("tool_name", tool)
            .with_metric("execution_time", secs)
    }

    fn run(detector: &mut PerformanceDetector, event: &Event) -> Vec<Finding> {
        detector.detect(event, &RecentEvents::new(10)).unwrap()
    }

    #[test]
    fn test_no_decision_below_six_samples() {
        let mut detector = PerformanceDetector::new(&DetectorConfig::default());
        for _ in 0..4 {
            assert!(run(&mut detector, &timed("Bash", 1.0)).is_empty());
        }
        // Fifth sample is far slower but the history is still too short
        assert!(run(&mut detector, &timed("Bash", 50.0)).is_empty());
    }

    #[test]
    fn test_severe_slowdown_is_high() {
        let mut detector = PerformanceDetector::new(&DetectorConfig::default());
        for _ in 0..19 {
            assert!(run(&mut detector, &timed("Bash", 1.0)).is_empty());
        }
        let findings = run(&mut detector, &timed("Bash", 10.0));
        assert_eq!(findings.len(), 1);
        let finding = &findings[0];
        assert_eq!(finding.kind, FindingKind::SlowExecution);
        assert_eq!(finding.subject, "Bash");
        assert_eq!(finding.severity, Severity::High);
        assert_eq!(finding.evidence_f64("baseline"), Some(1.0));
        assert_eq!(finding.evidence_u64("sample_size"), Some(20));
    }

    #[test]
    fn test_moderate_slowdown_is_medium() {
        let mut detector = PerformanceDetector::new(&DetectorConfig::default());
        for _ in 0..10 {
            run(&mut detector, &timed("Read", 1.0));
        }
        let findings = run(&mut detector, &timed("Read", 2.5));
        assert_eq!(findings[0].severity, Severity::Medium);

        // Exactly twice the baseline is not slow
        assert!(run(&mut detector, &timed("Read", 2.0)).is_empty());
    }

    #[test]
    fn test_tools_are_tracked_separately() {
        let mut detector = PerformanceDetector::new(&DetectorConfig::default());
        for _ in 0..10 {
            run(&mut detector, &timed("Read", 1.0));
        }
        assert!(run(&mut detector, &timed("Bash", 10.0)).is_empty());
    }

    #[test]
    fn test_ignores_other_events() {
        let mut detector = PerformanceDetector::new(&DetectorConfig::default());
        let event = Event::new(EventType::AgentComplete, "s1", "t").with_metric("execution_time", 9.0);
        assert!(run(&mut detector, &event).is_empty());
        let untimed = Event::new(EventType::ToolUse, "s1", "t").with_data("tool_name", "Bash");
        assert!(run(&mut detector, &untimed).is_empty());
    }

    #[test]
    fn test_invalid_time_is_an_error() {
        let mut detector = PerformanceDetector::new(&DetectorConfig::default());
        let result = detector.detect(&timed("Bash", f64::NAN), &RecentEvents::new(10));
        assert!(matches!(result, Err(Error::Detector { .. })));
    }
}
