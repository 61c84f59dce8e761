//! hooklens-session - session-end hook entry point
//!
//! Reads the hook payload (`{"session_id": ..., ...}`) from stdin, loads that
//! session's entries from the log directory, aggregates them, and stores the
//! analysis in the improvement log when anything was found. A session with no
//! entries reports `"message": "No logs found for session"`. Always prints a
//! single JSON object on stdout; failures print `{"error", "analyzed": false}`
//! and exit with status 1.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use hooklens_core::{synthesize_aggregate, Config, ImprovementLog, LogStore, PatternEngine, SessionAnalysis};
use serde_json::{json, Value};
use std::io::Read;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "hooklens-session")]
#[command(about = "Analyze one session from hook input on stdin")]
#[command(version)]
struct Args {
    /// Log directory (defaults to the configured log directory)
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

fn main() {
    let args = Args::parse();

    match run(&args) {
        Ok(result) => println!("{result}"),
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "Session analysis failed");
            println!("{}", json!({ "error": format!("{e:#}"), "analyzed": false }));
            std::process::exit(1);
        }
    }
}

fn run(args: &Args) -> Result<Value> {
    Config::ensure_xdg_env();
    let config = Config::load().context("failed to load configuration")?;
    let _log_guard =
        hooklens_core::logging::init(&config.logging).context("failed to initialize logging")?;

    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .context("failed to read hook input")?;
    let payload: Value = serde_json::from_str(&input).context("hook input is not valid JSON")?;
    let session_id = payload
        .get("session_id")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .context("hook input has no session_id")?
        .to_string();

    let log_dir = args.log_dir.clone().unwrap_or_else(|| config.paths.log_dir());
    let store = LogStore::open(&log_dir)
        .with_context(|| format!("failed to open log directory {}", log_dir.display()))?;

    let events = store.load_session_events(&session_id);
    if events.is_empty() {
        tracing::info!(session_id = %session_id, "No log entries for session");
        return Ok(json!({
            "analyzed": true,
            "session_id": session_id,
            "total_events": 0,
            "patterns_found": 0,
            "stored": false,
            "message": "No logs found for session",
        }));
    }

    let engine = PatternEngine::empty(&config);
    let report = engine.analyze_session(&events);
    let now = Utc::now();

    let stored = report.has_patterns();
    if stored {
        ImprovementLog::in_dir(&log_dir)
            .append(SessionAnalysis {
                session_id: session_id.clone(),
                timestamp: now.to_rfc3339(),
                total_events: events.len(),
                report: report.clone(),
            })
            .context("failed to store session analysis")?;
    }

    tracing::info!(
        session_id = %session_id,
        events = events.len(),
        patterns = report.pattern_count(),
        stored,
        "Analyzed session"
    );

    Ok(json!({
        "analyzed": true,
        "session_id": session_id,
        "total_events": events.len(),
        "patterns_found": report.pattern_count(),
        "workflows_found": report.workflows.len(),
        "error_clusters": report.error_clusters.len(),
        "stored": stored,
        "metrics": report.metrics,
        "recommendations": synthesize_aggregate(&report, now),
    }))
}
