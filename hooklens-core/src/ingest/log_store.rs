//! Read access to a hook log directory
//!
//! Each hook writes its own category file (`post_tool_use.json`,
//! `user_prompt_submit.json`, ...). Files are a JSON array, a single JSON
//! object, or JSON lines, depending on which hook version wrote them.

use crate::error::{Error, Result};
use crate::ingest::normalize_with_category;
use crate::types::Event;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Categories that make up a session, in hook order.
pub const SESSION_CATEGORIES: &[&str] = &[
    "session_start",
    "pre_tool_use",
    "post_tool_use",
    "user_prompt_submit",
    "notifications",
    "stop",
];

/// Files in a log directory that are not hook categories.
const NON_CATEGORY_FILES: &[&str] = &["pending_improvements", "hook_errors"];

/// A directory of hook category files.
#[derive(Debug, Clone)]
pub struct LogStore {
    root: PathBuf,
}

impl LogStore {
    /// Open a log directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(Error::LogNotFound(root));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of a category file, preferring `.json` over `.jsonl`.
    pub fn category_path(&self, category: &str) -> PathBuf {
        let json = self.root.join(format!("{category}.json"));
        if json.exists() {
            return json;
        }
        let jsonl = self.root.join(format!("{category}.jsonl"));
        if jsonl.exists() {
            return jsonl;
        }
        json
    }

    /// Category names present in the directory, sorted.
    pub fn categories(&self) -> Result<Vec<String>> {
        let mut categories = Vec::new();
        for ext in ["json", "jsonl"] {
            let pattern = self.root.join(format!("*.{ext}"));
            let pattern = pattern.to_string_lossy();
            let paths = glob::glob(&pattern).map_err(|e| Error::Parse {
                path: pattern.to_string(),
                message: e.to_string(),
            })?;
            for path in paths.flatten() {
                if is_category_file(&path) {
                    categories.push(category_of(&path));
                }
            }
        }
        categories.sort();
        categories.dedup();
        Ok(categories)
    }

    /// Raw entries of one category. A missing category file is empty.
    pub fn load_category(&self, category: &str) -> Result<Vec<Value>> {
        let path = self.category_path(category);
        if !path.exists() {
            return Ok(Vec::new());
        }
        read_entries(&path)
    }

    /// Entries of one session across the session categories.
    ///
    /// Each entry is tagged with `log_type` and the result is ordered by the
    /// timestamp string. A corrupt category file is skipped with a warning.
    pub fn load_session(&self, session_id: &str) -> Vec<Value> {
        let mut entries = Vec::new();
        for category in SESSION_CATEGORIES {
            let raw = match self.load_category(category) {
                Ok(raw) => raw,
                Err(e) => {
                    tracing::warn!(category, error = %e, "Skipping unreadable log category");
                    continue;
                }
            };
            for mut entry in raw {
                if entry.get("session_id").and_then(Value::as_str) != Some(session_id) {
                    continue;
                }
                if let Value::Object(map) = &mut entry {
                    map.insert("log_type".to_string(), Value::String(category.to_string()));
                }
                entries.push(entry);
            }
        }
        entries.sort_by(|a, b| timestamp_key(a).cmp(timestamp_key(b)));
        tracing::debug!(session_id, entries = entries.len(), "Loaded session");
        entries
    }

    /// Normalized events of one session.
    pub fn load_session_events(&self, session_id: &str) -> Vec<Event> {
        self.load_session(session_id)
            .iter()
            .map(|entry| {
                let category = entry
                    .get("log_type")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                normalize_with_category(entry, category)
            })
            .collect()
    }

    /// Normalized events of every category, ordered by timestamp string.
    ///
    /// Corrupt files are skipped with a warning.
    pub fn load_all(&self) -> Result<Vec<Event>> {
        let mut events = Vec::new();
        for category in self.categories()? {
            match self.load_category(&category) {
                Ok(raw) => {
                    events.extend(raw.iter().map(|e| normalize_with_category(e, &category)));
                }
                Err(e) => {
                    tracing::warn!(category = %category, error = %e, "Skipping corrupt log file");
                }
            }
        }
        events.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(events)
    }
}

fn timestamp_key(entry: &Value) -> &str {
    entry
        .get("timestamp")
        .and_then(Value::as_str)
        .unwrap_or_default()
}

/// Category name for a log file path (its stem).
pub fn category_of(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string()
}

/// True for `.json`/`.jsonl` files that hold hook entries.
pub fn is_category_file(path: &Path) -> bool {
    let json = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("json") | Some("jsonl")
    );
    let stem = category_of(path);
    json && !stem.is_empty() && !NON_CATEGORY_FILES.contains(&stem.as_str())
}

/// Read a single log file into normalized events.
pub fn load_log_file(path: &Path) -> Result<Vec<Event>> {
    let category = category_of(path);
    Ok(read_entries(path)?
        .iter()
        .map(|entry| normalize_with_category(entry, &category))
        .collect())
}

/// Read raw entries from a JSON array, JSON object, or JSON lines file.
///
/// In JSON lines mode unparsable lines are skipped; a non-empty file with no
/// parsable entry at all is a parse error.
pub fn read_entries(path: &Path) -> Result<Vec<Value>> {
    if !path.exists() {
        return Err(Error::LogNotFound(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path)?;
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Ok(match value {
            Value::Array(entries) => entries,
            other => vec![other],
        });
    }

    let mut entries = Vec::new();
    let mut skipped = 0usize;
    for line in trimmed.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(line) {
            Ok(value) => entries.push(value),
            Err(_) => skipped += 1,
        }
    }

    if entries.is_empty() {
        return Err(Error::Parse {
            path: path.display().to_string(),
            message: "no valid JSON entries".to_string(),
        });
    }
    if skipped > 0 {
        tracing::warn!(
            path = %path.display(),
            skipped,
            "Skipped malformed JSON lines"
        );
    }
    Ok(entries)
}
