//! Error types for hooklens-core

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the hooklens-core library
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Log file or directory does not exist
    #[error("log not found: {}", .0.display())]
    LogNotFound(PathBuf),

    /// Parse error for a hook log file
    #[error("parse error in {path}: {message}")]
    Parse { path: String, message: String },

    /// A detector or optimizer could not evaluate an event
    #[error("{component} failed: {message}")]
    Detector { component: String, message: String },

    /// Notification channel error
    #[error("notify error: {0}")]
    Notify(String),
}

impl Error {
    /// Build a [`Error::Detector`] for a named component.
    pub fn detector(component: &str, message: impl Into<String>) -> Self {
        Error::Detector {
            component: component.to_string(),
            message: message.into(),
        }
    }
}

/// Result type alias for hooklens-core
pub type Result<T> = std::result::Result<T, Error>;
