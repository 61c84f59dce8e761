//! Agent optimizer
//!
//! Groups `agent_execution` events by `agent_name`. Agents with a low success
//! rate get a failure breakdown; agents whose prompt file is present in the
//! agents directory get a prompt quality review.

use super::Optimizer;
use crate::error::Result;
use crate::types::{Event, EventType, Priority, Recommendation, UNKNOWN};
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const MIN_SUCCESS_RATE: f64 = 0.7;
const MIN_PROMPT_CHARS: usize = 200;
const MAX_PROMPT_CHARS: usize = 5000;

/// A prompt quality problem and the step that fixes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptIssue {
    TooShort,
    TooLong,
    LacksExamples,
    LacksClearDirectives,
    UnclearOutputFormat,
    UnclearRoleDefinition,
}

impl PromptIssue {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromptIssue::TooShort => "prompt_too_short",
            PromptIssue::TooLong => "prompt_too_long",
            PromptIssue::LacksExamples => "lacks_examples",
            PromptIssue::LacksClearDirectives => "lacks_clear_directives",
            PromptIssue::UnclearOutputFormat => "unclear_output_format",
            PromptIssue::UnclearRoleDefinition => "unclear_role_definition",
        }
    }

    pub fn improvement_step(&self) -> &'static str {
        match self {
            PromptIssue::TooShort => "Add more detailed instructions and context",
            PromptIssue::TooLong => "Simplify and focus on core requirements",
            PromptIssue::LacksExamples => "Add concrete examples of expected input/output",
            PromptIssue::LacksClearDirectives => "Add clear must/should statements for behavior",
            PromptIssue::UnclearOutputFormat => "Specify expected output format and structure",
            PromptIssue::UnclearRoleDefinition => "Clearly define the agent's role and expertise",
        }
    }
}

/// Split a markdown prompt into sections keyed by heading.
///
/// Text before the first heading goes under `header`. Keys are lowercased
/// with spaces replaced by `_`.
pub fn prompt_sections(content: &str) -> BTreeMap<String, String> {
    let mut sections = BTreeMap::new();
    let mut current = "header".to_string();
    let mut lines: Vec<&str> = Vec::new();

    for line in content.lines() {
        if line.starts_with('#') {
            if !lines.is_empty() {
                sections.insert(current.clone(), lines.join("\n"));
            }
            current = line
                .trim_matches(|c| c == '#' || c == ' ')
                .to_lowercase()
                .replace(' ', "_");
            lines.clear();
        } else {
            lines.push(line);
        }
    }
    if !lines.is_empty() {
        sections.insert(current, lines.join("\n"));
    }
    sections
}

/// Check a prompt's section text for quality issues.
pub fn prompt_issues(sections: &BTreeMap<String, String>) -> Vec<PromptIssue> {
    let full_text = sections.values().cloned().collect::<Vec<_>>().join(" ");
    let lower = full_text.to_lowercase();
    let chars = full_text.chars().count();
    let mut issues = Vec::new();

    if chars < MIN_PROMPT_CHARS {
        issues.push(PromptIssue::TooShort);
    } else if chars > MAX_PROMPT_CHARS {
        issues.push(PromptIssue::TooLong);
    }
    if !lower.contains("example") {
        issues.push(PromptIssue::LacksExamples);
    }
    if !["must", "should", "always", "never"]
        .iter()
        .any(|w| lower.contains(w))
    {
        issues.push(PromptIssue::LacksClearDirectives);
    }
    if !["format", "structure", "output", "response"]
        .iter()
        .any(|w| lower.contains(w))
    {
        issues.push(PromptIssue::UnclearOutputFormat);
    }
    if !lower.contains("you are") && !lower.contains("your role") {
        issues.push(PromptIssue::UnclearRoleDefinition);
    }
    issues
}

/// Bucket an agent error message.
fn failure_type(message: &str) -> &'static str {
    let lower = message.to_lowercase();
    if lower.contains("timeout") {
        "timeout"
    } else if lower.contains("permission") {
        "permission"
    } else if lower.contains("not found") {
        "not_found"
    } else if lower.contains("invalid") {
        "invalid_input"
    } else {
        "other"
    }
}

#[derive(Debug, Default)]
pub struct AgentOptimizer {
    agents_dir: Option<PathBuf>,
}

impl AgentOptimizer {
    /// `agents_dir` holds `<agent>.md` prompt files; `None` skips prompt review.
    pub fn new(agents_dir: Option<PathBuf>) -> Self {
        Self { agents_dir }
    }

    fn analyze_agent(&self, agent: &str, events: &[&Event], at: DateTime<Utc>) -> Vec<Recommendation> {
        let failures: Vec<String> = events.iter().filter_map(|e| e.error()).collect();
        let success_rate = (events.len() - failures.len()) as f64 / events.len() as f64;
        let mut recommendations = Vec::new();

        if let Some(dir) = &self.agents_dir {
            let prompt_file = dir.join(format!("{agent}.md"));
            if prompt_file.exists() {
                if let Some(rec) = review_prompt(agent, &prompt_file, success_rate, events.len(), at) {
                    recommendations.push(rec);
                }
            }
        }

        if success_rate < MIN_SUCCESS_RATE {
            recommendations.push(
                Recommendation::new(
                    "agent_improvement",
                    agent,
                    Priority::High,
                    format!("Improve {agent} success rate"),
                    at,
                )
                .with_description(format!(
                    "Agent has {:.1}% success rate with {} failures",
                    success_rate * 100.0,
                    failures.len()
                ))
                .with_rationale("Low success rates indicate issues with agent prompt or configuration")
                .with_steps([
                    "Analyze failure patterns and common error types",
                    "Review and refine agent prompt based on failure analysis",
                    "Add better error handling and fallback strategies",
                    "Test improvements with historical failure cases",
                ])
                .with_impact("Could improve success rate to >85%")
                .with_confidence(0.8)
                .with_data("current_success_rate", success_rate)
                .with_data("failure_count", failures.len())
                .with_data("success_count", events.len() - failures.len())
                .with_data("failure_analysis", failure_analysis(&failures)),
            );
        }
        recommendations
    }
}

impl Optimizer for AgentOptimizer {
    fn name(&self) -> &str {
        "core.agents"
    }

    fn analyze(&self, events: &[Event], at: DateTime<Utc>) -> Result<Vec<Recommendation>> {
        let mut by_agent: BTreeMap<&str, Vec<&Event>> = BTreeMap::new();
        for event in events
            .iter()
            .filter(|e| e.event_type == EventType::AgentExecution)
        {
            by_agent
                .entry(event.agent_name().unwrap_or(UNKNOWN))
                .or_default()
                .push(event);
        }

        Ok(by_agent
            .iter()
            .flat_map(|(agent, group)| self.analyze_agent(agent, group, at))
            .collect())
    }
}

fn failure_analysis(failures: &[String]) -> Value {
    if failures.is_empty() {
        return json!({});
    }
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for failure in failures {
        *counts.entry(failure_type(failure)).or_default() += 1;
    }
    let most_common = counts
        .iter()
        .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
        .map(|(t, _)| *t)
        .unwrap_or("none");
    let distribution: Map<String, Value> = counts
        .iter()
        .map(|(t, c)| (t.to_string(), json!(c)))
        .collect();
    json!({
        "error_type_distribution": distribution,
        "most_common_error_type": most_common,
    })
}

fn review_prompt(
    agent: &str,
    path: &Path,
    success_rate: f64,
    executions: usize,
    at: DateTime<Utc>,
) -> Option<Recommendation> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            tracing::warn!(agent, path = %path.display(), error = %e, "Cannot read agent prompt");
            return None;
        }
    };
    let issues = prompt_issues(&prompt_sections(&content));
    if issues.is_empty() {
        return None;
    }

    Some(
        Recommendation::new(
            "agent_improvement",
            agent,
            Priority::Medium,
            format!("Improve prompt quality for {agent}"),
            at,
        )
        .with_description("Detected potential improvements in agent prompt structure")
        .with_rationale("Better prompts lead to more consistent and accurate agent performance")
        .with_steps(issues.iter().map(PromptIssue::improvement_step))
        .with_impact("Could improve success rate by 10-20%")
        .with_confidence(0.7)
        .with_data("current_success_rate", success_rate)
        .with_data(
            "quality_issues",
            issues.iter().map(PromptIssue::as_str).collect::<Vec<_>>(),
        )
        .with_data("total_executions", executions),
    )
}
