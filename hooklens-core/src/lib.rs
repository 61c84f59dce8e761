//! # hooklens-core
//!
//! Core library for hooklens - pattern detection over AI coding assistant
//! hook logs.
//!
//! This library provides:
//! - A canonical event model and hook log readers
//! - Incremental pattern detectors with bounded per-key history
//! - Cross-session aggregation of tool sequences, workflows and error clusters
//! - Recommendation synthesis and batch optimizers
//! - Configuration management and logging infrastructure
//!
//! ## Architecture
//!
//! Data flows in one direction:
//! - **Ingest:** hook log files → [`Event`] (never fails, defaults fill gaps)
//! - **Detect:** [`PatternEngine::process`] → [`Finding`]s, one event at a time
//! - **Aggregate:** [`PatternEngine::analyze_session`] → [`AggregateReport`]
//! - **Recommend:** findings and reports → [`Recommendation`]s
//!
//! ## Example
//!
//! ```rust,no_run
//! use hooklens_core::{Config, LogStore, PatternEngine};
//!
//! let config = Config::load().expect("failed to load config");
//! let store = LogStore::open(config.paths.log_dir()).expect("no log directory");
//!
//! let mut engine = PatternEngine::new(&config);
//! for event in store.load_all().expect("failed to read logs") {
//!     for finding in engine.process(event) {
//!         println!("{} {}", finding.kind, finding.subject);
//!     }
//! }
//! ```

// Re-export commonly used items at the crate root
pub use aggregate::{AggregateReport, Aggregator, MultiSessionReport};
pub use config::Config;
pub use engine::{analyze_log_file, LogAnalysis, PatternEngine};
pub use error::{Error, Result};
pub use improvements::{ImprovementLog, SessionAnalysis};
pub use ingest::{normalize, LogStore};
pub use learn::CrossProjectLearner;
pub use notify::Notifier;
pub use optimize::{create_default_engine, RecommendationEngine};
pub use recommend::{synthesize, synthesize_aggregate};
pub use similarity::similarity;
pub use types::*;

// Public modules
pub mod aggregate;
pub mod config;
pub mod detect;
pub mod engine;
pub mod error;
pub mod improvements;
pub mod ingest;
pub mod learn;
pub mod logging;
pub mod notify;
pub mod optimize;
pub mod outlier;
pub mod recommend;
pub mod similarity;
pub mod stats;
pub mod tfidf;
pub mod types;
