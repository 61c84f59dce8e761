//! Pending improvement log
//!
//! `pending_improvements.json` in the log directory collects one
//! [`SessionAnalysis`] per analyzed session. The file is bounded: only the
//! newest [`MAX_ENTRIES`] analyses are kept.

use crate::aggregate::{AggregateReport, ToolSequencePattern};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const IMPROVEMENTS_FILE: &str = "pending_improvements.json";
pub const MAX_ENTRIES: usize = 100;
const TOP_SEQUENCES: usize = 5;

/// One stored session analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionAnalysis {
    pub session_id: String,
    /// RFC 3339 time of the analysis
    pub timestamp: String,
    pub total_events: usize,
    pub report: AggregateReport,
}

/// A triple with occurrences summed across stored sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceTotal {
    pub sequence: Vec<String>,
    pub suggested_name: String,
    pub occurrences: usize,
    pub sessions: usize,
}

/// Totals across every stored analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImprovementSummary {
    pub sessions_analyzed: usize,
    pub total_events: usize,
    pub total_patterns: usize,
    pub total_workflows: usize,
    pub total_error_clusters: usize,
    pub top_sequences: Vec<SequenceTotal>,
    /// Error cluster key → summed occurrences
    pub error_clusters: BTreeMap<String, usize>,
}

impl ImprovementSummary {
    pub fn is_empty(&self) -> bool {
        self.sessions_analyzed == 0
    }
}

/// Reader/writer for the improvement log file.
#[derive(Debug, Clone)]
pub struct ImprovementLog {
    path: PathBuf,
}

impl ImprovementLog {
    /// The log inside `log_dir`.
    pub fn in_dir(log_dir: &Path) -> Self {
        Self::at(log_dir.join(IMPROVEMENTS_FILE))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All stored analyses, oldest first. A missing or corrupt file reads as
    /// empty.
    pub fn load(&self) -> Vec<SessionAnalysis> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Cannot read improvement log");
                return Vec::new();
            }
        };
        match serde_json::from_str(&content) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Corrupt improvement log; starting fresh");
                Vec::new()
            }
        }
    }

    /// Append an analysis, dropping the oldest entries beyond [`MAX_ENTRIES`].
    pub fn append(&self, analysis: SessionAnalysis) -> Result<()> {
        let mut entries = self.load();
        entries.push(analysis);
        if entries.len() > MAX_ENTRIES {
            let excess = entries.len() - MAX_ENTRIES;
            entries.drain(..excess);
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(&entries)?)?;
        tracing::debug!(path = %self.path.display(), entries = entries.len(), "Stored session analysis");
        Ok(())
    }

    pub fn summary(&self) -> ImprovementSummary {
        summarize(&self.load())
    }
}

/// Aggregate stored analyses.
pub fn summarize(entries: &[SessionAnalysis]) -> ImprovementSummary {
    let mut summary = ImprovementSummary {
        sessions_analyzed: entries.len(),
        ..Default::default()
    };
    let mut sequences: Vec<SequenceTotal> = Vec::new();

    for entry in entries {
        let report = &entry.report;
        summary.total_events += entry.total_events;
        summary.total_patterns += report.pattern_count();
        summary.total_workflows += report.workflows.len();
        summary.total_error_clusters += report.error_clusters.len();

        for pattern in &report.tool_sequences {
            add_sequence(&mut sequences, pattern);
        }
        for cluster in &report.error_clusters {
            *summary.error_clusters.entry(cluster.key.clone()).or_default() += cluster.occurrences;
        }
    }

    // Stable sort keeps first-seen order among ties
    sequences.sort_by(|a, b| b.occurrences.cmp(&a.occurrences));
    sequences.truncate(TOP_SEQUENCES);
    summary.top_sequences = sequences;
    summary
}

fn add_sequence(totals: &mut Vec<SequenceTotal>, pattern: &ToolSequencePattern) {
    match totals.iter_mut().find(|t| t.sequence == pattern.sequence) {
        Some(total) => {
            total.occurrences += pattern.occurrences;
            total.sessions += 1;
        }
        None => totals.push(SequenceTotal {
            sequence: pattern.sequence.clone(),
            suggested_name: pattern.suggested_name.clone(),
            occurrences: pattern.occurrences,
            sessions: 1,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::ErrorCluster;
    use tempfile::TempDir;

    fn analysis(session: &str, triple: &[&str], occurrences: usize) -> SessionAnalysis {
        let mut report = AggregateReport::default();
        report.tool_sequences.push(ToolSequencePattern {
            sequence: triple.iter().map(|s| s.to_string()).collect(),
            occurrences,
            suggested_name: format!("{}_{}_flow", triple[0], triple[2]).to_lowercase(),
        });
        SessionAnalysis {
            session_id: session.to_string(),
            timestamp: "2025-01-10T10:00:00Z".to_string(),
            total_events: 10,
            report,
        }
    }

    #[test]
    fn test_missing_and_corrupt_files_read_empty() {
        let dir = TempDir::new().unwrap();
        let log = ImprovementLog::in_dir(dir.path());
        assert!(log.load().is_empty());

        std::fs::write(log.path(), "{ not json").unwrap();
        assert!(log.load().is_empty());

        log.append(analysis("s1", &["Read", "Edit", "Bash"], 2)).unwrap();
        assert_eq!(log.load().len(), 1);
    }

    #[test]
    fn test_keeps_newest_entries() {
        let dir = TempDir::new().unwrap();
        let log = ImprovementLog::in_dir(dir.path());
        for i in 0..(MAX_ENTRIES + 5) {
            log.append(analysis(&format!("s{i}"), &["A", "B", "C"], 2))
                .unwrap();
        }
        let entries = log.load();
        assert_eq!(entries.len(), MAX_ENTRIES);
        assert_eq!(entries[0].session_id, "s5");
        assert_eq!(entries.last().unwrap().session_id, format!("s{}", MAX_ENTRIES + 4));
    }

    #[test]
    fn test_summary_sums_sequences() {
        let mut with_cluster = analysis("s3", &["Grep", "Read", "Edit"], 3);
        with_cluster.report.error_clusters.push(ErrorCluster {
            key: "Bash:exit 1".to_string(),
            tool: "Bash".to_string(),
            error: "exit 1".to_string(),
            occurrences: 2,
            timestamps: vec![],
            suggested_hook_type: "PreToolUse".to_string(),
            recommendation: "validate".to_string(),
        });
        let entries = vec![
            analysis("s1", &["Read", "Edit", "Bash"], 2),
            analysis("s2", &["Read", "Edit", "Bash"], 4),
            with_cluster,
        ];

        let summary = summarize(&entries);
        assert_eq!(summary.sessions_analyzed, 3);
        assert_eq!(summary.total_events, 30);
        assert_eq!(summary.total_patterns, 3);
        assert_eq!(summary.total_error_clusters, 1);
        assert_eq!(summary.top_sequences[0].sequence, vec!["Read", "Edit", "Bash"]);
        assert_eq!(summary.top_sequences[0].occurrences, 6);
        assert_eq!(summary.top_sequences[0].sessions, 2);
        assert_eq!(summary.error_clusters["Bash:exit 1"], 2);
    }
}
