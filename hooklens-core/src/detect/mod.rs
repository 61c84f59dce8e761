//! Incremental pattern detectors
//!
//! Detectors see one event at a time, plus the shared recent-event window,
//! and return zero or more [`Finding`]s. Each detector owns whatever
//! per-key history it needs.
//!
//! ## Built-in Detectors
//!
//! | Name | Event | Finding |
//! |------|-------|---------|
//! | `core.performance` | `tool_use` with execution time | `slow_execution` |
//! | `core.recurring_error` | `tool_use` with error | `recurring_error` |
//! | `core.success_streak` | `agent_complete` | `high_success_streak` |
//! | `core.duration_anomaly` | `session_end` with duration | `duration_anomaly` |
//!
//! ## Adding a Detector
//!
//! 1. Implement [`Detector`]
//! 2. Register it with [`crate::engine::PatternEngine::register`]

pub mod duration_anomaly;
pub mod performance;
pub mod recurring_error;
pub mod success_streak;

pub use duration_anomaly::DurationAnomalyDetector;
pub use performance::PerformanceDetector;
pub use recurring_error::RecurringErrorDetector;
pub use success_streak::SuccessStreakDetector;

use crate::config::DetectorConfig;
use crate::error::Result;
use crate::stats::RecentEvents;
use crate::types::{Event, Finding};

/// Trait every pattern detector implements.
///
/// Detectors must be deterministic given the same event stream. An `Err`
/// is logged by the engine and treated as "no finding"; it never stops the
/// stream.
pub trait Detector: Send {
    /// Unique name. Convention: `namespace.detector_name`.
    fn name(&self) -> &str;

    /// Inspect one event. `recent` already contains `event` as its newest entry.
    fn detect(&mut self, event: &Event, recent: &RecentEvents) -> Result<Vec<Finding>>;
}

/// The four built-in detectors, configured from `config`.
pub fn default_detectors(config: &DetectorConfig) -> Vec<Box<dyn Detector>> {
    vec![
        Box::new(PerformanceDetector::new(config)),
        Box::new(RecurringErrorDetector::new(config)),
        Box::new(SuccessStreakDetector::new(config)),
        Box::new(DurationAnomalyDetector::new(config)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_detectors() {
        let detectors = default_detectors(&DetectorConfig::default());
        let names: Vec<_> = detectors.iter().map(|d| d.name()).collect();
        assert_eq!(
            names,
            vec![
                "core.performance",
                "core.recurring_error",
                "core.success_streak",
                "core.duration_anomaly"
            ]
        );
    }
}
