//! Slash command optimizer
//!
//! Groups `command_execution` events by `command_name` and checks three
//! things per command: average execution time, success rate, and whether
//! usage clusters in a few hours of the day.

use super::Optimizer;
use crate::error::Result;
use crate::stats::mean;
use crate::types::{Event, EventType, Priority, Recommendation, UNKNOWN};
use chrono::{DateTime, Timelike, Utc};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

const SLOW_SECS: f64 = 30.0;
const VERY_SLOW_SECS: f64 = 60.0;
const MIN_SUCCESS_RATE: f64 = 0.8;
/// Executions needed before usage hours are considered.
const MIN_USAGE_SAMPLES: usize = 5;
/// Words of an error message used to group it.
const ERROR_KEY_WORDS: usize = 5;

#[derive(Debug, Default)]
pub struct CommandOptimizer;

impl CommandOptimizer {
    pub fn new() -> Self {
        Self
    }

    fn analyze_command(
        &self,
        command: &str,
        events: &[&Event],
        at: DateTime<Utc>,
    ) -> Vec<Recommendation> {
        let mut recommendations = Vec::new();

        let times: Vec<f64> = events.iter().filter_map(|e| e.execution_time()).collect();
        if let Some(avg) = mean(&times).filter(|avg| *avg > SLOW_SECS) {
            let max = times.iter().copied().fold(f64::MIN, f64::max);
            recommendations.push(
                Recommendation::new(
                    "command_optimization",
                    command,
                    if avg > VERY_SLOW_SECS {
                        Priority::High
                    } else {
                        Priority::Medium
                    },
                    format!("Optimize slow command: {command}"),
                    at,
                )
                .with_description(format!(
                    "Command {command} averages {avg:.1} seconds execution time"
                ))
                .with_rationale(
                    "Long execution times reduce productivity and may indicate inefficiencies",
                )
                .with_steps([
                    "Profile command execution to identify bottlenecks",
                    "Optimize heavy operations or add parallelization",
                    "Consider breaking down complex commands into smaller steps",
                    "Add progress indicators for long-running operations",
                ])
                .with_impact("Could reduce execution time by 30-50%")
                .with_confidence(0.8)
                .with_data("avg_execution_time", avg)
                .with_data("max_execution_time", max)
                .with_data("sample_size", times.len()),
            );
        }

        let successes = events.iter().filter(|e| e.error().is_none()).count();
        let success_rate = successes as f64 / events.len() as f64;
        if success_rate < MIN_SUCCESS_RATE {
            recommendations.push(
                Recommendation::new(
                    "command_optimization",
                    command,
                    Priority::High,
                    format!("Improve reliability of {command}"),
                    at,
                )
                .with_description(format!(
                    "Command {command} has {:.1}% success rate",
                    success_rate * 100.0
                ))
                .with_rationale("Low success rates indicate reliability issues")
                .with_steps([
                    "Analyze common error patterns and root causes",
                    "Add better error handling and recovery logic",
                    "Improve input validation and user guidance",
                    "Add retry mechanisms for transient failures",
                ])
                .with_impact("Could improve success rate to >90%")
                .with_confidence(0.9)
                .with_data("success_rate", success_rate)
                .with_data("total_executions", events.len())
                .with_data("error_patterns", error_patterns(events)),
            );
        }

        if let Some(rec) = usage_pattern(command, events, at) {
            recommendations.push(rec);
        }
        recommendations
    }
}

impl Optimizer for CommandOptimizer {
    fn name(&self) -> &str {
        "core.commands"
    }

    fn analyze(&self, events: &[Event], at: DateTime<Utc>) -> Result<Vec<Recommendation>> {
        let mut by_command: BTreeMap<&str, Vec<&Event>> = BTreeMap::new();
        for event in events
            .iter()
            .filter(|e| e.event_type == EventType::CommandExecution)
        {
            by_command
                .entry(event.command_name().unwrap_or(UNKNOWN))
                .or_default()
                .push(event);
        }

        Ok(by_command
            .iter()
            .flat_map(|(command, group)| self.analyze_command(command, group, at))
            .collect())
    }
}

/// Errors grouped by their first few words; groups seen more than once.
fn error_patterns(events: &[&Event]) -> Value {
    let errors: Vec<String> = events.iter().filter_map(|e| e.error()).collect();
    let mut groups: BTreeMap<String, usize> = BTreeMap::new();
    for error in &errors {
        let key = error
            .split_whitespace()
            .take(ERROR_KEY_WORDS)
            .collect::<Vec<_>>()
            .join(" ");
        *groups.entry(key).or_default() += 1;
    }

    Value::Array(
        groups
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(pattern, count)| {
                json!({
                    "error_pattern": pattern,
                    "occurrence_count": count,
                    "percentage": count as f64 / errors.len() as f64 * 100.0,
                })
            })
            .collect(),
    )
}

/// Flags commands whose usage falls into at most two hours of the day.
fn usage_pattern(command: &str, events: &[&Event], at: DateTime<Utc>) -> Option<Recommendation> {
    if events.len() <= MIN_USAGE_SAMPLES {
        return None;
    }
    let mut hour_counts: BTreeMap<u32, usize> = BTreeMap::new();
    for event in events {
        *hour_counts.entry(event.datetime_or(at).hour()).or_default() += 1;
    }

    let mut ranked: Vec<(u32, usize)> = hour_counts.iter().map(|(h, c)| (*h, *c)).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    let peak_hours: Vec<u32> = ranked.iter().take(3).map(|(h, _)| *h).collect();
    if peak_hours.len() > 2 {
        return None;
    }

    let distribution: Map<String, Value> = hour_counts
        .iter()
        .map(|(hour, count)| (hour.to_string(), json!(count)))
        .collect();

    Some(
        Recommendation::new(
            "command_optimization",
            command,
            Priority::Low,
            format!("Optimize {command} for peak usage times"),
            at,
        )
        .with_description(format!(
            "Command usage concentrated during hours {peak_hours:?}"
        ))
        .with_rationale("Commands used at specific times might benefit from time-aware optimizations")
        .with_steps([
            "Consider pre-warming caches during off-peak hours",
            "Optimize for common use cases during peak times",
            "Add time-based performance monitoring",
        ])
        .with_impact("Improved performance during peak usage")
        .with_confidence(0.6)
        .with_data("peak_hours", peak_hours)
        .with_data("usage_distribution", distribution),
    )
}
