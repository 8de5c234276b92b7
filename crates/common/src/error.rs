//! Error types shared across Reelcut crates.

use std::path::PathBuf;

/// Top-level error type for Reelcut operations.
#[derive(Debug, thiserror::Error)]
pub enum ReelcutError {
    /// Input data failed validation before any work started (missing
    /// composition metadata, malformed chunk assignments, ...). Never retried.
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Pure-computation failure in the processing pipeline.
    #[error("Processing error: {message}")]
    Processing { message: String },

    /// The render backend failed while producing a chunk or frame.
    /// Fatal for the whole job; partial temp files are cleaned up.
    #[error("Render backend error: {message}")]
    RenderBackend { message: String },

    /// The concat muxer exited with a non-zero status.
    #[error("Muxer failed (status {status}): {stderr}")]
    Muxer { status: i32, stderr: String },

    /// An external binary could not be spawned at all.
    #[error("Failed to spawn '{binary}': {message}")]
    SpawnFailed { binary: String, message: String },

    /// The job was cancelled. A clean termination, not a failure: it shares
    /// the failure cleanup path but callers should not report it as an error.
    #[error("Export cancelled")]
    Cancelled,

    /// A second export was requested while one is in flight.
    #[error("An export job is already running")]
    ExportAlreadyRunning,

    #[error("Project error: {message}")]
    Project { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using ReelcutError.
pub type ReelcutResult<T> = Result<T, ReelcutError>;

impl ReelcutError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    pub fn processing(msg: impl Into<String>) -> Self {
        Self::Processing {
            message: msg.into(),
        }
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::RenderBackend {
            message: msg.into(),
        }
    }

    pub fn project(msg: impl Into<String>) -> Self {
        Self::Project {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn spawn_failed(binary: impl Into<String>, err: &std::io::Error) -> Self {
        Self::SpawnFailed {
            binary: binary.into(),
            message: err.to_string(),
        }
    }

    /// True for the cancellation pseudo-error.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
