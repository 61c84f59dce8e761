//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/hooklens/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/hooklens/` (~/.config/hooklens/)
//! - State/Logs: `$XDG_STATE_HOME/hooklens/` (~/.local/state/hooklens/)
//!
//! Every detector threshold lives here rather than in detector code, so
//! tuning never requires touching detection logic.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// Incremental detector thresholds
    #[serde(default)]
    pub detectors: DetectorConfig,

    /// Cross-session aggregation settings
    #[serde(default)]
    pub aggregator: AggregatorConfig,

    /// Where hook logs and agent prompts live
    #[serde(default)]
    pub paths: PathsConfig,

    /// Live update broadcast settings
    #[serde(default)]
    pub notifier: NotifierConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which outlier model the duration-anomaly detector fits.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutlierModelKind {
    /// Seeded isolation forest
    #[default]
    IsolationForest,
    /// Median/MAD based modified z-score
    ModifiedZScore,
}

/// Thresholds for the incremental pattern detectors
#[derive(Debug, Deserialize, Clone)]
pub struct DetectorConfig {
    /// Timing samples retained per tool
    #[serde(default = "default_timing_window")]
    pub timing_window: usize,

    /// Success flags retained per agent
    #[serde(default = "default_success_window")]
    pub success_window: usize,

    /// Samples required before any baseline decision
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,

    /// Capacity of the shared recent-event window
    #[serde(default = "default_recent_window")]
    pub recent_window: usize,

    /// Execution time multiple of baseline that counts as slow
    #[serde(default = "default_slow_multiplier")]
    pub slow_multiplier: f64,

    /// Execution time multiple of baseline that counts as severely slow
    #[serde(default = "default_severe_multiplier")]
    pub severe_multiplier: f64,

    /// Jaccard similarity above which two errors are the same error
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,

    /// Similar errors must exceed this count to be recurring
    #[serde(default = "default_recurring_error_threshold")]
    pub recurring_error_threshold: usize,

    /// Success rate above which an agent is on a streak
    #[serde(default = "default_success_rate_threshold")]
    pub success_rate_threshold: f64,

    /// Session durations must exceed this count before outlier fitting
    #[serde(default = "default_duration_min_samples")]
    pub duration_min_samples: usize,

    /// Expected share of outliers in the duration sample
    #[serde(default = "default_contamination")]
    pub contamination: f64,

    /// Outlier model used for session durations
    #[serde(default)]
    pub outlier_model: OutlierModelKind,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            timing_window: default_timing_window(),
            success_window: default_success_window(),
            min_samples: default_min_samples(),
            recent_window: default_recent_window(),
            slow_multiplier: default_slow_multiplier(),
            severe_multiplier: default_severe_multiplier(),
            similarity_threshold: default_similarity_threshold(),
            recurring_error_threshold: default_recurring_error_threshold(),
            success_rate_threshold: default_success_rate_threshold(),
            duration_min_samples: default_duration_min_samples(),
            contamination: default_contamination(),
            outlier_model: OutlierModelKind::default(),
        }
    }
}

impl DetectorConfig {
    /// Validate thresholds, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.timing_window == 0 || self.success_window == 0 || self.recent_window == 0 {
            return Err(Error::Config(
                "detectors.*_window values must be greater than 0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(Error::Config(
                "detectors.similarity_threshold must be between 0 and 1".to_string(),
            ));
        }
        if !(self.contamination > 0.0 && self.contamination <= 0.5) {
            return Err(Error::Config(
                "detectors.contamination must be in (0, 0.5]".to_string(),
            ));
        }
        if self.severe_multiplier < self.slow_multiplier {
            return Err(Error::Config(
                "detectors.severe_multiplier must be >= slow_multiplier".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_timing_window() -> usize {
    20
}

fn default_success_window() -> usize {
    10
}

fn default_min_samples() -> usize {
    5
}

fn default_recent_window() -> usize {
    1000
}

fn default_slow_multiplier() -> f64 {
    2.0
}

fn default_severe_multiplier() -> f64 {
    3.0
}

fn default_similarity_threshold() -> f64 {
    0.8
}

fn default_recurring_error_threshold() -> usize {
    3
}

fn default_success_rate_threshold() -> f64 {
    0.8
}

fn default_duration_min_samples() -> usize {
    10
}

fn default_contamination() -> f64 {
    0.1
}

/// Cross-session aggregation settings
#[derive(Debug, Deserialize, Clone)]
pub struct AggregatorConfig {
    /// Length of the repeated tool subsequence
    #[serde(default = "default_sequence_length")]
    pub sequence_length: usize,

    /// Occurrences before a subsequence is reported
    #[serde(default = "default_min_sequence_occurrences")]
    pub min_sequence_occurrences: usize,

    /// Steps in a workflow record
    #[serde(default = "default_workflow_length")]
    pub workflow_length: usize,

    /// Steps carried into the next workflow after emitting one
    #[serde(default = "default_workflow_overlap")]
    pub workflow_overlap: usize,

    /// Characters of error text used to key an error cluster
    #[serde(default = "default_error_cluster_prefix")]
    pub error_cluster_prefix: usize,

    /// Occurrences before an error cluster is reported
    #[serde(default = "default_min_cluster_occurrences")]
    pub min_cluster_occurrences: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            sequence_length: default_sequence_length(),
            min_sequence_occurrences: default_min_sequence_occurrences(),
            workflow_length: default_workflow_length(),
            workflow_overlap: default_workflow_overlap(),
            error_cluster_prefix: default_error_cluster_prefix(),
            min_cluster_occurrences: default_min_cluster_occurrences(),
        }
    }
}

impl AggregatorConfig {
    /// Validate aggregation settings
    pub fn validate(&self) -> Result<()> {
        if self.sequence_length == 0 || self.workflow_length == 0 {
            return Err(Error::Config(
                "aggregator.sequence_length and workflow_length must be greater than 0"
                    .to_string(),
            ));
        }
        if self.workflow_overlap >= self.workflow_length {
            return Err(Error::Config(
                "aggregator.workflow_overlap must be smaller than workflow_length".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_sequence_length() -> usize {
    3
}

fn default_min_sequence_occurrences() -> usize {
    2
}

fn default_workflow_length() -> usize {
    5
}

fn default_workflow_overlap() -> usize {
    2
}

fn default_error_cluster_prefix() -> usize {
    50
}

fn default_min_cluster_occurrences() -> usize {
    2
}

/// Filesystem locations of hook data
#[derive(Debug, Deserialize, Clone, Default)]
pub struct PathsConfig {
    /// Directory holding the hook log category files
    pub log_dir: Option<PathBuf>,
    /// Directory holding agent prompt files (`<agent>.md`)
    pub agents_dir: Option<PathBuf>,
}

impl PathsConfig {
    /// Configured log directory, or `~/.claude/logs`
    pub fn log_dir(&self) -> PathBuf {
        self.log_dir
            .clone()
            .unwrap_or_else(|| home_dir().join(".claude").join("logs"))
    }
}

/// Live update broadcast settings
#[derive(Debug, Deserialize, Clone)]
pub struct NotifierConfig {
    /// Minimum seconds between two broadcasts
    #[serde(default = "default_min_interval_secs")]
    pub min_interval_secs: u64,

    /// Buffered updates per subscriber
    #[serde(default = "default_notifier_capacity")]
    pub capacity: usize,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            min_interval_secs: default_min_interval_secs(),
            capacity: default_notifier_capacity(),
        }
    }
}

fn default_min_interval_secs() -> u64 {
    30
}

fn default_notifier_capacity() -> usize {
    16
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate every section
    pub fn validate(&self) -> Result<()> {
        self.detectors.validate()?;
        self.aggregator.validate()
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/hooklens/config.toml` (~/.config/hooklens/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("hooklens").join("config.toml")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/hooklens/` (~/.local/state/hooklens/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("hooklens")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/hooklens/hooklens.log` (~/.local/state/hooklens/hooklens.log)
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("hooklens.log")
    }

    /// Ensure XDG base directory environment variables are set.
    ///
    /// This is mainly for CLI binaries that want explicit, stable path behavior
    /// before invoking other components that read these env vars.
    pub fn ensure_xdg_env() {
        let home = home_dir();

        if std::env::var("XDG_STATE_HOME").is_err() {
            std::env::set_var("XDG_STATE_HOME", home.join(".local/state"));
        }

        if std::env::var("XDG_CONFIG_HOME").is_err() {
            std::env::set_var("XDG_CONFIG_HOME", home.join(".config"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.detectors.timing_window, 20);
        assert_eq!(config.detectors.success_window, 10);
        assert_eq!(config.detectors.min_samples, 5);
        assert_eq!(config.detectors.recent_window, 1000);
        assert_eq!(config.detectors.similarity_threshold, 0.8);
        assert_eq!(config.detectors.contamination, 0.1);
        assert_eq!(config.aggregator.workflow_length, 5);
        assert_eq!(config.aggregator.workflow_overlap, 2);
        assert_eq!(config.notifier.min_interval_secs, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[detectors]
slow_multiplier = 1.5
severe_multiplier = 4.0
outlier_model = "modified_z_score"

[paths]
log_dir = "/tmp/hook-logs"

[logging]
level = "debug"
"#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(config.detectors.slow_multiplier, 1.5);
        assert_eq!(config.detectors.severe_multiplier, 4.0);
        assert_eq!(
            config.detectors.outlier_model,
            OutlierModelKind::ModifiedZScore
        );
        // Untouched fields keep their defaults
        assert_eq!(config.detectors.timing_window, 20);
        assert_eq!(config.paths.log_dir(), PathBuf::from("/tmp/hook-logs"));
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_detector_validation() {
        let config = DetectorConfig {
            contamination: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = DetectorConfig {
            similarity_threshold: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = DetectorConfig {
            recent_window: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_aggregator_validation() {
        let config = AggregatorConfig {
            workflow_overlap: 5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_rejects_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[detectors]\ncontamination = 0.9\n").unwrap();
        assert!(matches!(Config::load_from(&path), Err(Error::Config(_))));
    }
}
