//! Error taxonomy for analysis runs
//!
//! Fatal conditions abort a run with no report written; per-repository
//! failures are logged and skipped by the orchestrator instead of being
//! surfaced here.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can abort an analysis run.
#[derive(Error, Debug)]
pub enum AtlasError {
    #[error("path does not exist: {0}")]
    PathNotFound(PathBuf),

    #[error("no Git repositories found in: {0}")]
    NoRepositoriesFound(PathBuf),

    #[error("no repositories were successfully analyzed")]
    NoRepositoriesAnalyzed,

    #[error("{tool} not found. {hint}")]
    ToolMissing { tool: String, hint: String },

    #[error("line counter produced no usable output: {0}")]
    CounterOutput(String),

    #[error("analysis set '{0}' already exists")]
    SetExists(String),

    #[error("analysis set '{0}' not found")]
    SetNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
