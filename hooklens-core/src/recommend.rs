//! Recommendation synthesis
//!
//! Maps findings and aggregate patterns onto recommendation templates. No
//! statistics happen here: everything numeric comes from the evidence the
//! detectors and the aggregator already attached.
//!
//! | Source | Type | Priority | Confidence |
//! |--------|------|----------|------------|
//! | `slow_execution` | `performance_optimization` | finding severity | 0.8 |
//! | `recurring_error` | `error_resolution` | high | 0.9 |
//! | `high_success_streak` | `success_amplification` | medium | 0.7 |
//! | `duration_anomaly` | `session_review` | medium | 0.6 |
//! | repeated tool triple | `command_creation` | medium | 0.7 |
//! | workflow | `agent_creation` | low | 0.6 |
//! | error cluster | `hook_creation` | high | 0.8 |

use crate::aggregate::AggregateReport;
use crate::types::{sort_recommendations, Finding, FindingKind, Priority, Recommendation, Severity};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Longest error text quoted in a recommendation.
const MAX_QUOTED_ERROR: usize = 200;

/// Findings that share a kind and subject.
struct FindingGroup<'a> {
    kind: FindingKind,
    subject: &'a str,
    findings: Vec<&'a Finding>,
}

impl FindingGroup<'_> {
    fn strongest(&self) -> Severity {
        self.findings
            .iter()
            .map(|f| f.severity)
            .max()
            .unwrap_or(Severity::Low)
    }

    /// The most recent finding, whose evidence is quoted in the text.
    fn latest(&self) -> Option<&Finding> {
        self.findings.last().copied()
    }

    fn max_evidence(&self, key: &str) -> Option<f64> {
        self.findings
            .iter()
            .filter_map(|f| f.evidence_f64(key))
            .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))))
    }
}

/// Turn findings into recommendations, one per (kind, subject).
///
/// Each recommendation carries `finding_count`, `strongest_severity` and the
/// evidence of every merged finding under `findings`. Output is sorted by
/// priority then confidence, highest first.
pub fn synthesize(findings: &[Finding], generated_at: DateTime<Utc>) -> Vec<Recommendation> {
    let mut groups: BTreeMap<(FindingKind, &str), FindingGroup> = BTreeMap::new();
    for finding in findings {
        groups
            .entry((finding.kind, finding.subject.as_str()))
            .or_insert_with(|| FindingGroup {
                kind: finding.kind,
                subject: finding.subject.as_str(),
                findings: Vec::new(),
            })
            .findings
            .push(finding);
    }

    let mut recommendations: Vec<Recommendation> = groups
        .values()
        .map(|group| {
            let recommendation = match group.kind {
                FindingKind::SlowExecution => slow_execution(group, generated_at),
                FindingKind::RecurringError => recurring_error(group, generated_at),
                FindingKind::HighSuccessStreak => success_streak(group, generated_at),
                FindingKind::DurationAnomaly => duration_anomaly(group, generated_at),
            };
            attach_evidence(recommendation, group)
        })
        .collect();

    sort_recommendations(&mut recommendations);
    recommendations
}

fn attach_evidence(recommendation: Recommendation, group: &FindingGroup) -> Recommendation {
    let evidence: Vec<Value> = group
        .findings
        .iter()
        .map(|f| Value::Object(f.evidence.clone()))
        .collect();
    recommendation
        .with_data("finding_kind", group.kind.as_str())
        .with_data("finding_count", group.findings.len())
        .with_data("strongest_severity", group.strongest().as_str())
        .with_data("findings", evidence)
}

fn slow_execution(group: &FindingGroup, at: DateTime<Utc>) -> Recommendation {
    let tool = group.subject;
    let latest = group.latest();
    let elapsed = latest.and_then(|f| f.evidence_f64("execution_time")).unwrap_or_default();
    let slowdown = latest
        .and_then(|f| f.evidence_f64("slowdown"))
        .map(|s| format!("{s:.1}x slower than baseline"))
        .unwrap_or_else(|| "slower than its baseline".to_string());

    Recommendation::new(
        "performance_optimization",
        tool,
        Priority::from(group.strongest()),
        format!("Investigate slow executions of {tool}"),
        at,
    )
    .with_description(format!(
        "Tool '{tool}' ran for {elapsed:.2}s, which is {slowdown}. \
         Consider optimizing parameters or investigating system constraints."
    ))
    .with_rationale("Executions far above the recent median usually point at a fixable bottleneck")
    .with_steps([
        format!("Review {tool} configuration"),
        "Check system resource usage during execution".to_string(),
        "Consider caching or optimization strategies".to_string(),
    ])
    .with_impact("Restores the tool to its usual execution time")
    .with_confidence(0.8)
    .with_data(
        "max_execution_time",
        group.max_evidence("execution_time").unwrap_or_default(),
    )
}

fn recurring_error(group: &FindingGroup, at: DateTime<Utc>) -> Recommendation {
    let tool = group.subject;
    let latest = group.latest();
    let occurrences = latest
        .and_then(|f| f.evidence_u64("occurrence_count"))
        .unwrap_or_default();
    let message = latest
        .and_then(|f| f.evidence_str("error_message"))
        .unwrap_or_default();
    let quoted = if message.chars().count() > MAX_QUOTED_ERROR {
        format!("{}...", message.chars().take(MAX_QUOTED_ERROR).collect::<String>())
    } else {
        message.to_string()
    };

    Recommendation::new(
        "error_resolution",
        tool,
        Priority::High,
        format!("Resolve recurring {tool} error"),
        at,
    )
    .with_description(format!(
        "Tool '{tool}' has failed {occurrences} times with similar errors. \
         This suggests a systematic issue."
    ))
    .with_rationale("The same error repeating in a short window rarely fixes itself")
    .with_steps([
        "Investigate root cause of recurring error",
        "Update tool configuration or prompts",
        "Add error handling or retry logic",
    ])
    .with_impact("Removes a repeated failure from the workflow")
    .with_confidence(0.9)
    .with_data("error_pattern", quoted)
}

fn success_streak(group: &FindingGroup, at: DateTime<Utc>) -> Recommendation {
    let agent = group.subject;
    let rate = group
        .latest()
        .and_then(|f| f.evidence_f64("success_rate"))
        .unwrap_or_default();

    Recommendation::new(
        "success_amplification",
        agent,
        Priority::Medium,
        format!("Reuse what makes {agent} successful"),
        at,
    )
    .with_description(format!(
        "Agent '{agent}' has a {:.1}% success rate. \
         Consider applying its patterns to other agents.",
        rate * 100.0
    ))
    .with_rationale("A consistently successful agent is a template for weaker ones")
    .with_steps([
        format!("Analyze {agent} prompts and configuration"),
        "Identify transferable success patterns".to_string(),
        "Update other agents with similar patterns".to_string(),
    ])
    .with_impact("Raises success rates of similar agents")
    .with_confidence(0.7)
}

fn duration_anomaly(group: &FindingGroup, at: DateTime<Utc>) -> Recommendation {
    let session = group.subject;
    let latest = group.latest();
    let duration = latest
        .and_then(|f| f.evidence_f64("session_duration"))
        .unwrap_or_default();
    let baseline = latest
        .and_then(|f| f.evidence_f64("baseline_median"))
        .unwrap_or_default();

    Recommendation::new(
        "session_review",
        session,
        Priority::Medium,
        format!("Review unusual session {session}"),
        at,
    )
    .with_description(format!(
        "Session '{session}' lasted {duration:.0}s against a typical {baseline:.0}s."
    ))
    .with_rationale("Sessions far outside the usual duration often hide a stuck loop or a missing tool")
    .with_steps([
        "Read through the session's tool sequence",
        "Look for repeated retries or long waits",
        "Capture any fix as a command, agent or hook",
    ])
    .with_impact("Surfaces workflow problems that single-event checks miss")
    .with_confidence(0.6)
}

/// Turn an aggregate report's patterns into recommendations.
pub fn synthesize_aggregate(
    report: &AggregateReport,
    generated_at: DateTime<Utc>,
) -> Vec<Recommendation> {
    let mut recommendations = Vec::new();

    for pattern in &report.tool_sequences {
        let flow = pattern.sequence.join(" → ");
        recommendations.push(
            Recommendation::new(
                "command_creation",
                pattern.suggested_name.as_str(),
                Priority::Medium,
                format!("Create command /{}", pattern.suggested_name),
                generated_at,
            )
            .with_description(format!(
                "The sequence {flow} ran {} times. A slash command could run it in one step.",
                pattern.occurrences
            ))
            .with_rationale("Repeated multi-step sequences are natural command candidates")
            .with_steps([
                format!("Create .claude/commands/{}.md", pattern.suggested_name),
                format!("Describe the steps: {flow}"),
                "Invoke the command the next time the sequence is needed".to_string(),
            ])
            .with_impact("Fewer prompts for a routine sequence")
            .with_confidence(0.7)
            .with_data("sequence", pattern.sequence.clone())
            .with_data("occurrences", pattern.occurrences),
        );
    }

    for workflow in &report.workflows {
        recommendations.push(
            Recommendation::new(
                "agent_creation",
                workflow.id.as_str(),
                Priority::Low,
                format!("Consider an agent for workflow {}", workflow.id),
                generated_at,
            )
            .with_description(format!(
                "A {}-step workflow ({}) completed with a {:.0}% success rate.",
                workflow.length,
                workflow.tools.join(", "),
                workflow.success_rate * 100.0
            ))
            .with_rationale("Long tool chains are easier to reuse as a dedicated agent")
            .with_steps([
                "Review whether this workflow recurs across sessions",
                "Write an agent prompt describing the workflow",
            ])
            .with_impact("Consistent execution of a long workflow")
            .with_confidence(0.6)
            .with_data("tools", workflow.tools.clone())
            .with_data("success_rate", workflow.success_rate),
        );
    }

    for cluster in &report.error_clusters {
        recommendations.push(
            Recommendation::new(
                "hook_creation",
                cluster.tool.as_str(),
                Priority::High,
                format!("Add a {} hook for {}", cluster.suggested_hook_type, cluster.tool),
                generated_at,
            )
            .with_description(cluster.recommendation.clone())
            .with_rationale(format!(
                "The same {} error occurred {} times",
                cluster.tool, cluster.occurrences
            ))
            .with_steps([
                format!("Add a {} hook matching {}", cluster.suggested_hook_type, cluster.tool),
                "Validate inputs that led to the error before the tool runs".to_string(),
            ])
            .with_impact("Prevents a known error before it happens")
            .with_confidence(0.8)
            .with_data("occurrences", cluster.occurrences)
            .with_data("timestamps", json!(cluster.timestamps)),
        );
    }

    sort_recommendations(&mut recommendations);
    recommendations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{ErrorCluster, ToolSequencePattern};
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 10, 12, 0, 0).unwrap()
    }

    fn slow(tool: &str, severity: Severity, time: f64) -> Finding {
        Finding::new(FindingKind::SlowExecution, tool, severity)
            .with_evidence("execution_time", time)
            .with_evidence("baseline", 1.0)
            .with_evidence("slowdown", time)
    }

    #[test]
    fn test_empty_input() {
        assert!(synthesize(&[], at()).is_empty());
        assert!(synthesize_aggregate(&AggregateReport::default(), at()).is_empty());
    }

    #[test]
    fn test_templates() {
        let findings = vec![
            slow("Bash", Severity::Medium, 2.5),
            Finding::new(FindingKind::RecurringError, "Edit", Severity::High)
                .with_evidence("occurrence_count", 4)
                .with_evidence("error_message", "x".repeat(300)),
            Finding::new(FindingKind::HighSuccessStreak, "reviewer", Severity::Low)
                .with_evidence("success_rate", 1.0),
            Finding::new(FindingKind::DurationAnomaly, "s9", Severity::Medium)
                .with_evidence("session_duration", 9000.0)
                .with_evidence("baseline_median", 600.0),
        ];
        let recs = synthesize(&findings, at());
        let summary: Vec<_> = recs
            .iter()
            .map(|r| (r.recommendation_type.as_str(), r.priority, r.confidence_score))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("error_resolution", Priority::High, 0.9),
                ("performance_optimization", Priority::Medium, 0.8),
                ("success_amplification", Priority::Medium, 0.7),
                ("session_review", Priority::Medium, 0.6),
            ]
        );
        assert!(recs.iter().all(|r| r.timestamp == at()));

        let quoted = recs[0].supporting_data["error_pattern"].as_str().unwrap();
        assert_eq!(quoted.len(), 203);
        assert!(recs[2].description.contains("100.0%"));
    }

    #[test]
    fn test_same_subject_merges() {
        let findings = vec![
            slow("Bash", Severity::Medium, 2.5),
            slow("Bash", Severity::High, 9.0),
            slow("Read", Severity::Medium, 2.1),
        ];
        let recs = synthesize(&findings, at());
        assert_eq!(recs.len(), 2);

        let bash = recs.iter().find(|r| r.target == "Bash").unwrap();
        assert_eq!(bash.priority, Priority::High);
        assert_eq!(bash.supporting_data["finding_count"], 2);
        assert_eq!(bash.supporting_data["strongest_severity"], "high");
        assert_eq!(bash.supporting_data["findings"].as_array().unwrap().len(), 2);
        assert_eq!(bash.supporting_data["max_execution_time"], 9.0);
    }

    #[test]
    fn test_aggregate_templates() {
        let report = AggregateReport {
            tool_sequences: vec![ToolSequencePattern {
                sequence: vec!["Read".into(), "Edit".into(), "Bash".into()],
                occurrences: 3,
                suggested_name: "read_bash_flow".into(),
            }],
            error_clusters: vec![ErrorCluster {
                key: "Bash:boom".into(),
                tool: "Bash".into(),
                error: "boom".into(),
                occurrences: 2,
                timestamps: vec!["a".into(), "b".into()],
                suggested_hook_type: "PreToolUse".into(),
                recommendation: "Add validation to prevent 'boom'".into(),
            }],
            ..Default::default()
        };
        let recs = synthesize_aggregate(&report, at());
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].recommendation_type, "hook_creation");
        assert_eq!(recs[0].priority, Priority::High);
        assert_eq!(recs[1].recommendation_type, "command_creation");
        assert_eq!(recs[1].target, "read_bash_flow");
        assert_eq!(recs[1].confidence_score, 0.7);
    }
}
