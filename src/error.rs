//! Error types for the reconciliation pipeline
//!
//! Only environment-level failures are errors. Data-quality problems
//! (unparseable lines, missing names, unresolvable entities) are reported
//! through stage statistics instead.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Failed to read statements from {path}: {reason}")]
    LoadError { path: String, reason: String },

    #[error("Cannot provision output location {path}: {reason}")]
    OutputLocation { path: PathBuf, reason: String },

    #[error("Invalid namespace '{0}': must be an absolute IRI")]
    InvalidNamespace(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid repair pattern: {0}")]
    Regex(#[from] regex::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid path: {0}")]
    InvalidPath(PathBuf),

    #[error("{0} stage failed; see log for details")]
    StageFailed(String),
}

/// Failure of an authority lookup.
///
/// Reconcilers turn every variant into an unresolved outcome.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("authority service unavailable: {0}")]
    Unavailable(String),

    #[error("authority lookup timed out")]
    Timeout,

    #[error("invalid authority response: {0}")]
    InvalidResponse(String),
}
