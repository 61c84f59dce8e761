//! Cross-project learning
//!
//! Finds hook log directories next to the main one and pulls prompt habits
//! and tool sequences out of each. Results from all directories are merged
//! by appending.

use crate::error::{Error, Result};
use crate::ingest::read_entries;
use crate::types::UNKNOWN;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

const PROMPT_FILE: &str = "user_prompt_submit.json";
const TOOL_FILE: &str = "post_tool_use.json";
/// Entries a session needs before its tool sequence is kept.
const MIN_SEQUENCE_ENTRIES: usize = 3;

/// Prompt habits seen in one multi-turn session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptPatterns {
    pub session_id: String,
    pub prompt_count: usize,
    pub patterns: Vec<String>,
}

/// Tool sequence of one session with a heuristic success score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandSequence {
    pub session_id: String,
    pub command_sequence: Vec<String>,
    /// `max(0, 1 - 0.2 * errors - min(total_time / 10, 1))`
    pub success_score: f64,
}

/// Everything learned across projects.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrossProjectPatterns {
    pub log_dirs: Vec<PathBuf>,
    pub successful_command_sequences: Vec<CommandSequence>,
    pub optimal_prompt_patterns: Vec<PromptPatterns>,
}

impl CrossProjectPatterns {
    pub fn merge(&mut self, other: CrossProjectPatterns) {
        self.log_dirs.extend(other.log_dirs);
        self.successful_command_sequences
            .extend(other.successful_command_sequences);
        self.optimal_prompt_patterns
            .extend(other.optimal_prompt_patterns);
    }
}

pub struct CrossProjectLearner {
    root: PathBuf,
}

impl CrossProjectLearner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The root log directory (if present) plus every `logs` directory
    /// under its parent.
    pub fn discover_log_dirs(&self) -> Result<Vec<PathBuf>> {
        let mut dirs = Vec::new();
        if self.root.is_dir() {
            dirs.push(self.root.clone());
        }
        let Some(parent) = self.root.parent() else {
            return Ok(dirs);
        };

        let pattern = format!(
            "{}/**/logs",
            glob::Pattern::escape(&parent.to_string_lossy())
        );
        let paths = glob::glob(&pattern).map_err(|e| Error::Parse {
            path: pattern.clone(),
            message: e.to_string(),
        })?;
        for path in paths.flatten() {
            if path.is_dir() && path != self.root && !dirs.contains(&path) {
                dirs.push(path);
            }
        }
        tracing::debug!(root = %self.root.display(), found = dirs.len(), "Discovered log directories");
        Ok(dirs)
    }

    /// Learn from every discovered directory.
    pub fn learn(&self) -> Result<CrossProjectPatterns> {
        let mut all = CrossProjectPatterns::default();
        for dir in self.discover_log_dirs()? {
            all.merge(learn_from_dir(&dir));
        }
        Ok(all)
    }
}

/// Patterns from one log directory. Unreadable files are skipped.
pub fn learn_from_dir(dir: &Path) -> CrossProjectPatterns {
    let mut patterns = CrossProjectPatterns {
        log_dirs: vec![dir.to_path_buf()],
        ..Default::default()
    };

    if let Some(entries) = read_optional(&dir.join(PROMPT_FILE)) {
        patterns.optimal_prompt_patterns = prompt_patterns(&entries);
    }
    if let Some(entries) = read_optional(&dir.join(TOOL_FILE)) {
        patterns.successful_command_sequences = command_sequences(&entries);
    }
    patterns
}

fn read_optional(path: &Path) -> Option<Vec<Value>> {
    if !path.exists() {
        return None;
    }
    match read_entries(path) {
        Ok(entries) => Some(entries),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable log file");
            None
        }
    }
}

fn by_session(entries: &[Value]) -> BTreeMap<&str, Vec<&Value>> {
    let mut groups: BTreeMap<&str, Vec<&Value>> = BTreeMap::new();
    for entry in entries {
        if let Some(session) = entry.get("session_id").and_then(Value::as_str) {
            groups.entry(session).or_default().push(entry);
        }
    }
    groups
}

fn prompt_patterns(entries: &[Value]) -> Vec<PromptPatterns> {
    by_session(entries)
        .into_iter()
        .filter(|(_, group)| group.len() > 1)
        .map(|(session, group)| {
            let mut found = BTreeSet::new();
            for entry in &group {
                let prompt = entry.get("prompt").and_then(Value::as_str).unwrap_or_default();
                let lower = prompt.to_lowercase();
                if prompt.chars().count() > 100 && lower.contains("specific") {
                    found.insert("detailed_specific_request");
                }
                if lower.contains("example") {
                    found.insert("includes_example");
                }
                if ["test", "verify", "validate"].iter().any(|w| lower.contains(w)) {
                    found.insert("includes_validation");
                }
            }
            PromptPatterns {
                session_id: session.to_string(),
                prompt_count: group.len(),
                patterns: found.into_iter().map(str::to_string).collect(),
            }
        })
        .collect()
}

fn command_sequences(entries: &[Value]) -> Vec<CommandSequence> {
    by_session(entries)
        .into_iter()
        .filter(|(_, group)| group.len() >= MIN_SEQUENCE_ENTRIES)
        .map(|(session, group)| CommandSequence {
            session_id: session.to_string(),
            command_sequence: group
                .iter()
                .map(|e| {
                    e.get("tool_name")
                        .and_then(Value::as_str)
                        .unwrap_or(UNKNOWN)
                        .to_string()
                })
                .collect(),
            success_score: success_score(&group),
        })
        .collect()
}

/// Fewer errors and less total time score higher.
fn success_score(entries: &[&Value]) -> f64 {
    let errors = entries
        .iter()
        .filter(|e| match e.get("error") {
            None | Some(Value::Null) | Some(Value::Bool(false)) => false,
            Some(Value::String(s)) => !s.is_empty(),
            Some(_) => true,
        })
        .count();
    let total_time: f64 = entries
        .iter()
        .filter_map(|e| e.get("execution_time").and_then(Value::as_f64))
        .sum();
    (1.0 - errors as f64 * 0.2 - (total_time / 10.0).min(1.0)).max(0.0)
}
