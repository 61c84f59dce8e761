//! hooklens-watch - live pattern detection on a hook log directory
//!
//! Watches the log directory for changes, feeds newly appended entries to a
//! single pattern engine, and prints findings as they happen. A recomputed
//! summary goes out through the notifier at most once per configured
//! interval.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use hooklens_core::ingest::{category_of, is_category_file, normalize_with_category, read_entries};
use hooklens_core::notify::Delivery;
use hooklens_core::{Config, Event, Finding, LogStore, Notifier, PatternEngine};
use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebounceEventResult};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "hooklens-watch")]
#[command(about = "Watch hook logs and report patterns live")]
#[command(version)]
struct Args {
    /// Log directory (defaults to the configured log directory)
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Debounce window for file events in milliseconds
    #[arg(long, default_value = "500")]
    debounce: u64,

    /// Process entries already on disk before watching
    #[arg(long)]
    replay: bool,
}

/// Broadcast after new entries were processed.
#[derive(Debug, Clone, Serialize)]
struct LiveSummary {
    at: DateTime<Utc>,
    events_processed: usize,
    findings: usize,
    sessions: usize,
    patterns: usize,
    workflows: usize,
    error_clusters: usize,
}

/// Entries already consumed per file.
struct Tail {
    seen: HashMap<PathBuf, usize>,
}

impl Tail {
    /// New entries in `path` since the last call. A file that shrank is
    /// read again from the start.
    fn new_events(&mut self, path: &Path) -> Vec<Event> {
        let entries = match read_entries(path) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Cannot read log file");
                return Vec::new();
            }
        };
        let seen = self.seen.entry(path.to_path_buf()).or_default();
        if entries.len() < *seen {
            tracing::info!(path = %path.display(), "Log file truncated; rereading");
            *seen = 0;
        }
        let category = category_of(path);
        let fresh = entries[*seen..]
            .iter()
            .map(|entry| normalize_with_category(entry, &category))
            .collect();
        *seen = entries.len();
        fresh
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    Config::ensure_xdg_env();
    let config = Config::load().context("failed to load configuration")?;
    let _log_guard =
        hooklens_core::logging::init(&config.logging).context("failed to initialize logging")?;

    let log_dir = args.log_dir.clone().unwrap_or_else(|| config.paths.log_dir());
    let store = LogStore::open(&log_dir)
        .with_context(|| format!("failed to open log directory {}", log_dir.display()))?;

    let mut engine = PatternEngine::new(&config);
    let mut notifier: Notifier<LiveSummary> =
        Notifier::from_config(&config.notifier).context("failed to create notifier")?;
    let mut tail = Tail {
        seen: HashMap::new(),
    };
    let mut processed: Vec<Event> = Vec::new();
    let mut finding_count = 0usize;

    // Prime offsets so only entries written from now on are analyzed
    for category in store.categories().context("failed to list log files")? {
        let path = store.category_path(&category);
        let existing = tail.new_events(&path);
        if args.replay {
            for event in existing {
                finding_count += handle_event(&mut engine, event, &mut processed);
            }
        }
    }

    let subscriber = notifier.subscribe();
    let printer = thread::spawn(move || print_summaries(subscriber));

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        eprintln!("\nShutting down...");
        r.store(false, Ordering::SeqCst);
    })
    .context("failed to set Ctrl+C handler")?;

    let (tx, rx) = mpsc::channel::<DebounceEventResult>();
    let mut debouncer =
        new_debouncer(Duration::from_millis(args.debounce), tx).context("failed to create watcher")?;
    debouncer
        .watcher()
        .watch(store.root(), RecursiveMode::NonRecursive)
        .with_context(|| format!("failed to watch {}", store.root().display()))?;

    println!(
        "Watching {} (summaries every {}s). Press Ctrl+C to stop.",
        store.root().display(),
        config.notifier.min_interval_secs
    );
    tracing::info!(log_dir = %store.root().display(), "hooklens-watch started");

    let mut pending = false;
    while running.load(Ordering::SeqCst) {
        let events = match rx.recv_timeout(Duration::from_millis(200)) {
            Ok(Ok(events)) => events,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Watch error");
                continue;
            }
            Err(RecvTimeoutError::Timeout) => {
                let delivery = flush_summary(
                    &mut notifier,
                    &engine,
                    &processed,
                    finding_count,
                    pending,
                    Utc::now(),
                );
                pending &= delivery == Delivery::Coalesced;
                continue;
            }
            Err(RecvTimeoutError::Disconnected) => break,
        };

        let mut paths: Vec<PathBuf> = events
            .into_iter()
            .map(|e| e.path)
            .filter(|p| is_category_file(p) && p.exists())
            .collect();
        paths.sort();
        paths.dedup();
        if paths.is_empty() {
            continue;
        }

        for path in &paths {
            for event in tail.new_events(path) {
                finding_count += handle_event(&mut engine, event, &mut processed);
            }
        }

        let delivery = flush_summary(
            &mut notifier,
            &engine,
            &processed,
            finding_count,
            true,
            Utc::now(),
        );
        pending = delivery == Delivery::Coalesced;
    }

    drop(debouncer);
    // Dropping the notifier closes the channel and ends the printer
    drop(notifier);
    let _ = printer.join();

    println!("Watch stopped.");
    tracing::info!(events = processed.len(), findings = finding_count, "hooklens-watch stopped");
    Ok(())
}

/// Process one event, print its findings, and keep it for summaries.
fn handle_event(engine: &mut PatternEngine, event: Event, processed: &mut Vec<Event>) -> usize {
    let findings = engine.process(event.clone());
    for finding in &findings {
        print_finding(&event, finding);
    }
    processed.push(event);
    let window = engine.recent_events().capacity();
    if processed.len() > window {
        let excess = processed.len() - window;
        processed.drain(..excess);
    }
    findings.len()
}

fn print_finding(event: &Event, finding: &Finding) {
    let timestamp = chrono::Local::now().format("%H:%M:%S");
    println!(
        "[{}] {} {} {} (session {})",
        timestamp,
        finding.severity.as_str(),
        finding.kind,
        finding.subject,
        event.session_id
    );
}

/// Send a fresh summary if there is unsent work and the notifier is due.
fn flush_summary(
    notifier: &mut Notifier<LiveSummary>,
    engine: &PatternEngine,
    events: &[Event],
    findings: usize,
    pending: bool,
    now: DateTime<Utc>,
) -> Delivery {
    if !pending || !notifier.is_due(now) {
        return Delivery::Coalesced;
    }
    let delivery = notifier.publish_if_due(summarize(engine, events, findings, now), now);
    if let Delivery::Sent(subscribers) = delivery {
        tracing::debug!(subscribers, "Summary sent");
    }
    delivery
}

fn summarize(
    engine: &PatternEngine,
    events: &[Event],
    findings: usize,
    at: DateTime<Utc>,
) -> LiveSummary {
    let report = engine.analyze_sessions(events);
    LiveSummary {
        at,
        events_processed: events.len(),
        findings,
        sessions: report.sessions.len(),
        patterns: report.merged.pattern_count(),
        workflows: report.merged.workflows.len(),
        error_clusters: report.merged.error_clusters.len(),
    }
}

fn print_summaries(mut rx: tokio::sync::broadcast::Receiver<LiveSummary>) {
    use tokio::sync::broadcast::error::RecvError;
    loop {
        match rx.blocking_recv() {
            Ok(summary) => println!(
                "[{}] summary: {} events, {} sessions, {} findings, {} patterns, {} workflows, {} error clusters",
                summary.at.with_timezone(&chrono::Local).format("%H:%M:%S"),
                summary.events_processed,
                summary.sessions,
                summary.findings,
                summary.patterns,
                summary.workflows,
                summary.error_clusters
            ),
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "Summary printer lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}
