//! Success streak detector
//!
//! Records each agent completion as a success flag and flags agents whose
//! recent success rate is consistently high. A completion without an explicit
//! `success: true` counts as a failure.

use super::Detector;
use crate::config::DetectorConfig;
use crate::error::Result;
use crate::stats::{mean, RecentEvents, RollingStore};
use crate::types::{Event, EventType, Finding, FindingKind, Severity, UNKNOWN};

pub struct SuccessStreakDetector {
    outcomes: RollingStore,
    window: usize,
    min_samples: usize,
    rate_threshold: f64,
}

impl SuccessStreakDetector {
    pub fn new(config: &DetectorConfig) -> Self {
        Self {
            outcomes: RollingStore::new(config.success_window, config.min_samples),
            window: config.success_window,
            min_samples: config.min_samples,
            rate_threshold: config.success_rate_threshold,
        }
    }
}

impl Detector for SuccessStreakDetector {
    fn name(&self) -> &str {
        "core.success_streak"
    }

    fn detect(&mut self, event: &Event, _recent: &RecentEvents) -> Result<Vec<Finding>> {
        if event.event_type != EventType::AgentComplete {
            return Ok(vec![]);
        }
        let agent = event.agent_name().unwrap_or(UNKNOWN);
        self.outcomes
            .record(agent, if event.reported_success() { 1.0 } else { 0.0 });

        let recent_outcomes = self.outcomes.history(agent, self.window);
        if recent_outcomes.len() < self.min_samples {
            return Ok(vec![]);
        }
        let rate = mean(&recent_outcomes).unwrap_or_default();
        if rate <= self.rate_threshold {
            return Ok(vec![]);
        }

        Ok(vec![Finding::new(
            FindingKind::HighSuccessStreak,
            agent,
            Severity::Low,
        )
        .with_evidence("success_rate", rate)
        .with_evidence("sample_size", recent_outcomes.len())])
    }
}
