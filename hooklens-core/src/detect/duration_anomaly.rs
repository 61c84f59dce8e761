//! Session duration anomaly detector
//!
//! On each `session_end` carrying `metrics.session_duration`, fits the
//! configured [`OutlierModel`] on every session duration in the recent
//! window and classifies the current one. The model is refit on every call.

use super::Detector;
use crate::config::DetectorConfig;
use crate::error::Result;
use crate::outlier::{build_model, OutlierModel};
use crate::stats::{median, RecentEvents};
use crate::types::{Event, EventType, Finding, FindingKind, Severity};

const DURATION_METRIC: &str = "session_duration";

pub struct DurationAnomalyDetector {
    model: Box<dyn OutlierModel>,
    min_samples: usize,
}

impl DurationAnomalyDetector {
    pub fn new(config: &DetectorConfig) -> Self {
        Self {
            model: build_model(config.outlier_model, config.contamination),
            min_samples: config.duration_min_samples,
        }
    }

    /// Use a specific outlier model.
    pub fn with_model(mut self, model: Box<dyn OutlierModel>) -> Self {
        self.model = model;
        self
    }
}

impl Detector for DurationAnomalyDetector {
    fn name(&self) -> &str {
        "core.duration_anomaly"
    }

    fn detect(&mut self, event: &Event, recent: &RecentEvents) -> Result<Vec<Finding>> {
        if event.event_type != EventType::SessionEnd {
            return Ok(vec![]);
        }
        let Some(duration) = event.metric(DURATION_METRIC) else {
            return Ok(vec![]);
        };

        let durations: Vec<f64> = recent
            .iter()
            .filter(|e| e.event_type == EventType::SessionEnd)
            .filter_map(|e| e.metric(DURATION_METRIC))
            .collect();
        if durations.len() <= self.min_samples {
            return Ok(vec![]);
        }

        if !self.model.fit_and_classify(&durations, duration)? {
            return Ok(vec![]);
        }

        Ok(vec![Finding::new(
            FindingKind::DurationAnomaly,
            event.session_id.as_str(),
            Severity::Medium,
        )
        .with_evidence("session_duration", duration)
        .with_evidence("baseline_median", median(&durations).unwrap_or_default())
        .with_evidence("sample_size", durations.len())
        .with_evidence("model", self.model.name())])
    }
}
