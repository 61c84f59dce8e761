//! hooklens-improvements - summarize pending improvements
//!
//! Reads `pending_improvements.json` from the log directory and prints the
//! totals across every stored session analysis.

use anyhow::{Context, Result};
use clap::Parser;
use hooklens_core::improvements::ImprovementSummary;
use hooklens_core::{Config, ImprovementLog};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "hooklens-improvements")]
#[command(about = "Summarize stored session analyses")]
#[command(version)]
struct Args {
    /// Log directory (defaults to the configured log directory)
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Output format: text (default) or json
    #[arg(short, long, default_value = "text")]
    format: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    Config::ensure_xdg_env();
    let config = Config::load().context("failed to load configuration")?;
    let _log_guard =
        hooklens_core::logging::init(&config.logging).context("failed to initialize logging")?;

    let log_dir = args.log_dir.unwrap_or_else(|| config.paths.log_dir());
    let log = ImprovementLog::in_dir(&log_dir);
    let summary = log.summary();

    match args.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&summary)?),
        "text" => print_text(&summary, &log),
        other => anyhow::bail!("unknown format '{other}' (expected text or json)"),
    }
    Ok(())
}

fn print_text(summary: &ImprovementSummary, log: &ImprovementLog) {
    if summary.is_empty() {
        println!("No pending improvements in {}", log.path().display());
        return;
    }

    println!("Pending improvements ({})", log.path().display());
    println!("  Sessions analyzed: {}", summary.sessions_analyzed);
    println!("  Events:            {}", summary.total_events);
    println!("  Patterns:          {}", summary.total_patterns);
    println!("  Workflows:         {}", summary.total_workflows);
    println!("  Error clusters:    {}", summary.total_error_clusters);

    if !summary.top_sequences.is_empty() {
        println!("\nTop repeated sequences:");
        for seq in &summary.top_sequences {
            println!(
                "  {} x{} in {} session(s) -> /{}",
                seq.sequence.join(" → "),
                seq.occurrences,
                seq.sessions,
                seq.suggested_name
            );
        }
    }

    if !summary.error_clusters.is_empty() {
        println!("\nError clusters:");
        for (key, count) in &summary.error_clusters {
            println!("  {key} x{count}");
        }
    }
}
