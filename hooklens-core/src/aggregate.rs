//! Cross-session aggregation
//!
//! A batch pass over an ordered event list that extracts structural
//! patterns: repeated tool triples, error→retry pairs, long workflows,
//! error clusters, and per-session metrics.
//!
//! Aggregation is a pure function of its input. Running it twice over the
//! same events gives the same report.
//!
//! ## Report Contents
//!
//! | Field | Description |
//! |-------|-------------|
//! | `tool_sequences` | Tool triples seen at least twice, first-seen order |
//! | `error_retries` | A failure immediately followed by the same tool |
//! | `workflows` | Runs of 5 tool invocations, overlapping by 2 |
//! | `error_clusters` | Failures grouped by tool and error prefix |
//! | `metrics` | Tool counts, error rate, execution time totals |

use crate::config::AggregatorConfig;
use crate::types::{Event, UNKNOWN};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet, HashMap};

// ============================================
// Report types
// ============================================

/// A tool triple that recurs within a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSequencePattern {
    pub sequence: Vec<String>,
    pub occurrences: usize,
    /// Suggested slash-command identifier, `"{first}_{last}_flow"`
    pub suggested_name: String,
}

/// A failed invocation retried with the same tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRetryPattern {
    pub tool: String,
    pub error: String,
    pub timestamp: String,
    pub suggested_improvement: String,
}

/// A long run of consecutive tool invocations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRecord {
    /// First 8 hex chars of the SHA-256 of the JSON tool list
    pub id: String,
    pub length: usize,
    pub tools: Vec<String>,
    pub success_rate: f64,
}

/// Failures that share a tool and an error prefix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorCluster {
    /// `tool:error-prefix`
    pub key: String,
    pub tool: String,
    /// Full text of the first error in the cluster
    pub error: String,
    pub occurrences: usize,
    pub timestamps: Vec<String>,
    pub suggested_hook_type: String,
    pub recommendation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LongestOperation {
    pub tool: String,
    pub time: f64,
}

/// Summary numbers for one session (or a merged set of sessions).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionMetrics {
    pub total_tools_used: usize,
    pub unique_tools: usize,
    pub error_rate: f64,
    pub total_execution_time: f64,
    pub average_execution_time: f64,
    pub longest_operation: Option<LongestOperation>,
}

/// Output of [`Aggregator::analyze_session`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateReport {
    pub tool_sequences: Vec<ToolSequencePattern>,
    pub error_retries: Vec<ErrorRetryPattern>,
    pub workflows: Vec<WorkflowRecord>,
    pub error_clusters: Vec<ErrorCluster>,
    pub metrics: SessionMetrics,
}

impl AggregateReport {
    /// True when the report holds anything worth acting on.
    pub fn has_patterns(&self) -> bool {
        !self.tool_sequences.is_empty()
            || !self.error_retries.is_empty()
            || !self.error_clusters.is_empty()
    }

    /// Total count of recurring patterns (triples and retries).
    pub fn pattern_count(&self) -> usize {
        self.tool_sequences.len() + self.error_retries.len()
    }

    /// Fold `other` into `self`.
    ///
    /// Lists are appended; triples and clusters with the same identity are
    /// combined by summing occurrences. Metrics are left to the caller since
    /// unique tool counts cannot be merged from counts alone.
    pub fn merge(&mut self, other: AggregateReport) {
        for pattern in other.tool_sequences {
            match self
                .tool_sequences
                .iter_mut()
                .find(|p| p.sequence == pattern.sequence)
            {
                Some(existing) => existing.occurrences += pattern.occurrences,
                None => self.tool_sequences.push(pattern),
            }
        }
        self.error_retries.extend(other.error_retries);
        self.workflows.extend(other.workflows);
        for cluster in other.error_clusters {
            match self.error_clusters.iter_mut().find(|c| c.key == cluster.key) {
                Some(existing) => {
                    existing.occurrences += cluster.occurrences;
                    existing.timestamps.extend(cluster.timestamps);
                }
                None => self.error_clusters.push(cluster),
            }
        }
    }
}

/// Per-session reports plus their merge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MultiSessionReport {
    pub sessions: BTreeMap<String, AggregateReport>,
    pub merged: AggregateReport,
}

// ============================================
// Aggregator
// ============================================

/// Batch pattern extraction over ordered events.
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    config: AggregatorConfig,
}

impl Aggregator {
    pub fn new(config: AggregatorConfig) -> Self {
        Self { config }
    }

    /// Analyze one ordered event list. Events without a tool name only
    /// break up triples; they never appear in a pattern.
    pub fn analyze_session(&self, events: &[Event]) -> AggregateReport {
        AggregateReport {
            tool_sequences: self.repeated_sequences(events),
            error_retries: error_retries(events),
            workflows: self.workflows(events),
            error_clusters: self.error_clusters(events),
            metrics: session_metrics(events),
        }
    }

    /// Group events by session, analyze each, and merge the results.
    pub fn analyze_sessions(&self, events: &[Event]) -> MultiSessionReport {
        let groups = group_sessions(events);
        let mut report = MultiSessionReport::default();
        let mut all = Vec::with_capacity(events.len());

        for (session_id, group) in groups {
            let session_report = self.analyze_session(&group);
            report.merged.merge(session_report.clone());
            report.sessions.insert(session_id, session_report);
            all.extend(group);
        }
        report.merged.metrics = session_metrics(&all);

        tracing::debug!(
            sessions = report.sessions.len(),
            sequences = report.merged.tool_sequences.len(),
            workflows = report.merged.workflows.len(),
            "Aggregated sessions"
        );
        report
    }

    fn repeated_sequences(&self, events: &[Event]) -> Vec<ToolSequencePattern> {
        let n = self.config.sequence_length;
        if n == 0 || events.len() < n {
            return vec![];
        }

        // Counted in first-seen order
        let mut order: Vec<Vec<String>> = Vec::new();
        let mut counts: HashMap<Vec<String>, usize> = HashMap::new();
        for window in events.windows(n) {
            let tools: Option<Vec<String>> = window
                .iter()
                .map(|e| e.tool_name().map(str::to_string))
                .collect();
            let Some(tools) = tools else {
                continue;
            };
            let count = counts.entry(tools.clone()).or_insert(0);
            if *count == 0 {
                order.push(tools);
            }
            *count += 1;
        }

        order
            .into_iter()
            .filter_map(|sequence| {
                let occurrences = counts.get(&sequence).copied().unwrap_or_default();
                (occurrences >= self.config.min_sequence_occurrences).then(|| {
                    let suggested_name = suggested_flow_name(&sequence);
                    ToolSequencePattern {
                        sequence,
                        occurrences,
                        suggested_name,
                    }
                })
            })
            .collect()
    }

    fn workflows(&self, events: &[Event]) -> Vec<WorkflowRecord> {
        let length = self.config.workflow_length;
        let overlap = self.config.workflow_overlap.min(length.saturating_sub(1));
        let mut records = Vec::new();
        let mut current: Vec<(String, bool)> = Vec::new();

        for event in events {
            let Some(tool) = event.tool_name() else {
                continue;
            };
            current.push((tool.to_string(), event.succeeded()));
            if current.len() >= length {
                let tools: Vec<String> = current.iter().map(|(t, _)| t.clone()).collect();
                let successes = current.iter().filter(|(_, ok)| *ok).count();
                records.push(WorkflowRecord {
                    id: workflow_id(&tools),
                    length: current.len(),
                    success_rate: successes as f64 / current.len() as f64,
                    tools,
                });
                current.drain(..current.len() - overlap);
            }
        }
        records
    }

    fn error_clusters(&self, events: &[Event]) -> Vec<ErrorCluster> {
        let mut clusters: Vec<ErrorCluster> = Vec::new();
        for event in events.iter().filter(|e| e.is_failure()) {
            let tool = event.tool_name().unwrap_or(UNKNOWN).to_string();
            let error = event.error().unwrap_or_else(|| UNKNOWN.to_string());
            let prefix: String = error.chars().take(self.config.error_cluster_prefix).collect();
            let key = format!("{tool}:{prefix}");

            match clusters.iter_mut().find(|c| c.key == key) {
                Some(cluster) => {
                    cluster.occurrences += 1;
                    cluster.timestamps.push(event.timestamp.clone());
                }
                None => {
                    let snippet: String = error.chars().take(100).collect();
                    clusters.push(ErrorCluster {
                        key,
                        tool,
                        occurrences: 1,
                        timestamps: vec![event.timestamp.clone()],
                        suggested_hook_type: "PreToolUse".to_string(),
                        recommendation: format!("Add validation to prevent '{snippet}'"),
                        error,
                    });
                }
            }
        }
        clusters.retain(|c| c.occurrences >= self.config.min_cluster_occurrences);
        clusters
    }
}

/// Failed tool invocations immediately followed by the same tool.
fn error_retries(events: &[Event]) -> Vec<ErrorRetryPattern> {
    events
        .windows(2)
        .filter_map(|pair| {
            let (failed, next) = (&pair[0], &pair[1]);
            let tool = failed.tool_name()?;
            if !failed.is_failure() || next.tool_name() != Some(tool) {
                return None;
            }
            Some(ErrorRetryPattern {
                tool: tool.to_string(),
                error: failed.error().unwrap_or_else(|| "Unknown error".to_string()),
                timestamp: failed.timestamp.clone(),
                suggested_improvement: "Add validation or error prevention".to_string(),
            })
        })
        .collect()
}

/// Metrics over the tool-bearing events.
pub fn session_metrics(events: &[Event]) -> SessionMetrics {
    let tool_events: Vec<&Event> = events.iter().filter(|e| e.tool_name().is_some()).collect();
    if tool_events.is_empty() {
        return SessionMetrics::default();
    }

    let unique: BTreeSet<&str> = tool_events.iter().filter_map(|e| e.tool_name()).collect();
    let failures = tool_events.iter().filter(|e| e.is_failure()).count();

    let mut metrics = SessionMetrics {
        total_tools_used: tool_events.len(),
        unique_tools: unique.len(),
        error_rate: failures as f64 / tool_events.len() as f64,
        ..Default::default()
    };

    let times: Vec<f64> = tool_events
        .iter()
        .filter_map(|e| e.execution_time())
        .filter(|t| *t > 0.0)
        .collect();
    if !times.is_empty() {
        metrics.total_execution_time = times.iter().sum();
        metrics.average_execution_time = metrics.total_execution_time / times.len() as f64;
        metrics.longest_operation = tool_events
            .iter()
            .filter_map(|e| Some((e.tool_name()?, e.execution_time()?)))
            .fold(None, |best: Option<(&str, f64)>, (tool, time)| match best {
                Some((_, t)) if t >= time => best,
                _ => Some((tool, time)),
            })
            .map(|(tool, time)| LongestOperation {
                tool: tool.to_string(),
                time,
            });
    }
    metrics
}

/// Group events by session id, each group ordered by timestamp.
///
/// Unparsable timestamps sort last, matching their "now" fallback.
pub fn group_sessions(events: &[Event]) -> BTreeMap<String, Vec<Event>> {
    let mut groups: BTreeMap<String, Vec<Event>> = BTreeMap::new();
    for event in events {
        groups
            .entry(event.session_id.clone())
            .or_default()
            .push(event.clone());
    }
    for group in groups.values_mut() {
        group.sort_by_key(|e| e.parsed_timestamp().unwrap_or(DateTime::<Utc>::MAX_UTC));
    }
    groups
}

fn suggested_flow_name(sequence: &[String]) -> String {
    let first = sequence.first().map(String::as_str).unwrap_or(UNKNOWN);
    let last = sequence.last().map(String::as_str).unwrap_or(UNKNOWN);
    format!("{first}_{last}_flow").to_lowercase().replace(' ', "_")
}

fn workflow_id(tools: &[String]) -> String {
    let encoded = serde_json::to_string(tools).unwrap_or_default();
    let digest = Sha256::digest(encoded.as_bytes());
    hex::encode(digest)[..8].to_string()
}
