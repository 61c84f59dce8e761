//! hooklens-analyze - CLI tool to find patterns in hook logs
//!
//! Streams hook log files through the pattern engine, aggregates sessions,
//! and prints findings and recommendations.
//!
//! Uses XDG Base Directory specification for file locations:
//! - Logs: $XDG_STATE_HOME/hooklens/hooklens.log (~/.local/state/hooklens/hooklens.log)
//! - Config: $XDG_CONFIG_HOME/hooklens/config.toml (~/.config/hooklens/config.toml)

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use hooklens_core::aggregate::MultiSessionReport;
use hooklens_core::engine::{analyze_log_file, LogAnalysis};
use hooklens_core::ingest::load_log_file;
use hooklens_core::learn::{CrossProjectLearner, CrossProjectPatterns};
use hooklens_core::{
    create_default_engine, sort_recommendations, synthesize_aggregate, Aggregator, Config, Event,
    LogStore, Recommendation,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "hooklens-analyze")]
#[command(about = "Detect patterns in AI assistant hook logs")]
#[command(version)]
struct Args {
    /// Analyze a single log file
    #[arg(long, conflicts_with = "log_dir")]
    log_file: Option<PathBuf>,

    /// Analyze every category file in a log directory
    /// (defaults to the configured log directory)
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Also learn patterns from sibling project log directories
    #[arg(long)]
    cross_project: bool,

    /// Add command, agent and prompt optimizer recommendations
    #[arg(long)]
    recommend: bool,

    /// Output format: text (default) or json
    #[arg(short, long, default_value = "text")]
    format: String,

    /// Write the report to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Config file (defaults to the XDG config path)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Serialize)]
struct Report {
    generated_at: DateTime<Utc>,
    files: Vec<LogAnalysis>,
    sessions: MultiSessionReport,
    recommendations: Vec<Recommendation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cross_project: Option<CrossProjectPatterns>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.format != "text" && args.format != "json" {
        anyhow::bail!("unknown format '{}' (expected text or json)", args.format);
    }

    Config::ensure_xdg_env();

    let config = match &args.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("failed to load configuration")?;

    let _log_guard =
        hooklens_core::logging::init(&config.logging).context("failed to initialize logging")?;

    tracing::info!("hooklens-analyze starting");

    let generated_at = Utc::now();
    let (files, events, root) = match &args.log_file {
        Some(path) => {
            let analysis = analyze_log_file(&config, path)
                .with_context(|| format!("failed to analyze {}", path.display()))?;
            let events = load_log_file(path)?;
            let root = path.parent().map(Path::to_path_buf).unwrap_or_default();
            (vec![analysis], events, root)
        }
        None => {
            let dir = args.log_dir.clone().unwrap_or_else(|| config.paths.log_dir());
            let store = LogStore::open(&dir)
                .with_context(|| format!("failed to open log directory {}", dir.display()))?;
            let files = analyze_directory(&config, &store)?;
            let events = store.load_all().context("failed to load log entries")?;
            (files, events, dir)
        }
    };

    let sessions = Aggregator::new(config.aggregator.clone()).analyze_sessions(&events);

    let mut recommendations: Vec<Recommendation> = files
        .iter()
        .flat_map(|f| f.recommendations.iter().cloned())
        .collect();
    recommendations.extend(synthesize_aggregate(&sessions.merged, generated_at));
    if args.recommend {
        recommendations.extend(create_default_engine(&config).run(&events, generated_at));
    }
    sort_recommendations(&mut recommendations);

    let cross_project = if args.cross_project {
        Some(
            CrossProjectLearner::new(&root)
                .learn()
                .context("cross-project learning failed")?,
        )
    } else {
        None
    };

    let report = Report {
        generated_at,
        files,
        sessions,
        recommendations,
        cross_project,
    };

    let rendered = if args.format == "json" {
        serde_json::to_string_pretty(&report)?
    } else {
        render_text(&report, &events)
    };

    match &args.output {
        Some(path) => {
            std::fs::write(path, rendered)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Report written to {}", path.display());
        }
        None => println!("{rendered}"),
    }

    tracing::info!(
        files = report.files.len(),
        recommendations = report.recommendations.len(),
        "hooklens-analyze complete"
    );

    Ok(())
}

/// Run a fresh engine over every category file, with a progress bar.
fn analyze_directory(config: &Config, store: &LogStore) -> Result<Vec<LogAnalysis>> {
    let categories = store.categories().context("failed to list log files")?;

    let pb = ProgressBar::new(categories.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .context("invalid progress template")?
            .progress_chars("#>-"),
    );

    let mut files = Vec::new();
    for category in &categories {
        pb.set_message(category.clone());
        let path = store.category_path(category);
        match analyze_log_file(config, &path) {
            Ok(analysis) => files.push(analysis),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable log file");
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    Ok(files)
}

fn render_text(report: &Report, events: &[Event]) -> String {
    let mut out = String::new();
    let merged = &report.sessions.merged;

    let _ = writeln!(out, "Hook log analysis ({})", report.generated_at.format("%Y-%m-%d %H:%M:%S"));
    let _ = writeln!(
        out,
        "  {} event(s) across {} session(s)",
        events.len(),
        report.sessions.sessions.len()
    );

    for file in &report.files {
        let _ = writeln!(
            out,
            "\n{}: {} events, {} findings",
            file.file_path.display(),
            file.event_count,
            file.finding_count()
        );
        for pattern in &file.patterns {
            for finding in &pattern.findings {
                let _ = writeln!(
                    out,
                    "  [{}] {} {} (session {})",
                    finding.severity.as_str(),
                    finding.kind,
                    finding.subject,
                    pattern.event.session_id
                );
            }
        }
    }

    let _ = writeln!(out, "\nSession patterns:");
    let _ = writeln!(out, "  Repeated sequences: {}", merged.tool_sequences.len());
    for pattern in &merged.tool_sequences {
        let _ = writeln!(
            out,
            "    {} x{} -> /{}",
            pattern.sequence.join(" → "),
            pattern.occurrences,
            pattern.suggested_name
        );
    }
    let _ = writeln!(out, "  Error retries:      {}", merged.error_retries.len());
    let _ = writeln!(out, "  Workflows:          {}", merged.workflows.len());
    let _ = writeln!(out, "  Error clusters:     {}", merged.error_clusters.len());
    for cluster in &merged.error_clusters {
        let _ = writeln!(out, "    {} x{}", cluster.key, cluster.occurrences);
    }
    let metrics = &merged.metrics;
    let _ = writeln!(
        out,
        "  Tools used: {} ({} unique), error rate {:.1}%",
        metrics.total_tools_used,
        metrics.unique_tools,
        metrics.error_rate * 100.0
    );

    if let Some(cross) = &report.cross_project {
        let _ = writeln!(out, "\nCross-project ({} log directories):", cross.log_dirs.len());
        let _ = writeln!(
            out,
            "  Command sequences: {}",
            cross.successful_command_sequences.len()
        );
        let _ = writeln!(out, "  Prompt patterns:   {}", cross.optimal_prompt_patterns.len());
    }

    let _ = writeln!(out, "\nRecommendations: {}", report.recommendations.len());
    for rec in &report.recommendations {
        let _ = writeln!(
            out,
            "  [{}] {} ({:.0}% confidence)",
            rec.priority,
            rec.title,
            rec.confidence_score * 100.0
        );
        if !rec.description.is_empty() {
            let _ = writeln!(out, "      {}", rec.description);
        }
    }

    out
}
