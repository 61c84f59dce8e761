//! Batch optimizers
//!
//! Optimizers look at a whole event list at once and produce
//! recommendations about commands, agents and prompts. They run through a
//! [`RecommendationEngine`], which isolates them from each other: a failing
//! optimizer is logged and contributes nothing.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                  RECOMMENDATION ENGINE                   │
//! │                                                          │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐    │
//! │  │ commands     │  │ agents       │  │ prompts      │    │
//! │  └──────┬───────┘  └──────┬───────┘  └──────┬───────┘    │
//! │         ▼                 ▼                 ▼            │
//! │  ┌────────────────────────────────────────────────────┐  │
//! │  │  RecommendationEngine::run()                       │  │
//! │  │  - Calls each optimizer, logging failures          │  │
//! │  │  - Sorts by priority, then confidence              │  │
//! │  └────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────┘
//! ```

pub mod agents;
pub mod commands;
pub mod prompts;

pub use agents::AgentOptimizer;
pub use commands::CommandOptimizer;
pub use prompts::PromptOptimizer;

use crate::config::Config;
use crate::error::Result;
use crate::types::{sort_recommendations, Event, Recommendation};
use chrono::{DateTime, Utc};
use std::time::Instant;

/// Trait every batch optimizer implements.
///
/// Optimizers are stateless: the same events and timestamp produce the same
/// recommendations.
pub trait Optimizer: Send + Sync {
    /// Unique name. Convention: `namespace.optimizer_name`.
    fn name(&self) -> &str;

    /// Analyze `events`, stamping recommendations with `generated_at`.
    fn analyze(&self, events: &[Event], generated_at: DateTime<Utc>)
        -> Result<Vec<Recommendation>>;
}

/// Registry that runs optimizers and merges their output.
#[derive(Default)]
pub struct RecommendationEngine {
    optimizers: Vec<Box<dyn Optimizer>>,
}

impl RecommendationEngine {
    /// Create an engine with no optimizers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an optimizer.
    pub fn register(&mut self, optimizer: Box<dyn Optimizer>) {
        tracing::info!(optimizer = optimizer.name(), "Registered optimizer");
        self.optimizers.push(optimizer);
    }

    pub fn optimizer_names(&self) -> Vec<&str> {
        self.optimizers.iter().map(|o| o.name()).collect()
    }

    /// Run every optimizer. Failures are logged and skipped.
    pub fn run(&self, events: &[Event], generated_at: DateTime<Utc>) -> Vec<Recommendation> {
        let mut recommendations = Vec::new();
        for optimizer in &self.optimizers {
            let start = Instant::now();
            match optimizer.analyze(events, generated_at) {
                Ok(found) => {
                    tracing::debug!(
                        optimizer = optimizer.name(),
                        recommendations = found.len(),
                        duration_ms = start.elapsed().as_millis() as u64,
                        "Optimizer finished"
                    );
                    recommendations.extend(found);
                }
                Err(e) => {
                    tracing::warn!(
                        optimizer = optimizer.name(),
                        error = %e,
                        "Optimizer failed; skipping its recommendations"
                    );
                }
            }
        }
        sort_recommendations(&mut recommendations);
        recommendations
    }
}

/// An engine with the command, agent and prompt optimizers registered.
pub fn create_default_engine(config: &Config) -> RecommendationEngine {
    let mut engine = RecommendationEngine::new();
    engine.register(Box::new(CommandOptimizer::new()));
    engine.register(Box::new(AgentOptimizer::new(config.paths.agents_dir.clone())));
    engine.register(Box::new(PromptOptimizer::new()));
    engine
}
