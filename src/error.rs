//! Unified error type hierarchy for the ZFS package builder
//!
//! Provides structured error handling with PipelineError (what went wrong),
//! StageError (where it went wrong) and ConfigError (settings loading).

use std::io;
use thiserror::Error;

use crate::orchestrator::state::PipelineStage;

/// Failure causes raised by the pipeline components.
///
/// Every component reports failure to its caller; nothing in the pipeline
/// recovers locally, so each variant is fatal to the run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// Malformed input detected before any side effect
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Pinned release has no matching upstream tag
    #[error("Release {0} not found")]
    NotFound(String),

    /// Transport or decode failure while talking to the release index
    #[error("Network error: {0}")]
    Network(String),

    /// Response or tool output did not have the expected shape
    #[error("Parse error: {0}")]
    Parse(String),

    /// A single source download failed
    #[error("Failed to download {url}: {reason}")]
    Download { url: String, reason: String },

    /// External tool exited non-zero or could not be spawned
    #[error("Command '{cmd}' failed: {reason}")]
    ExternalTool { cmd: String, reason: String },

    /// Disk space, directory creation or file copy failure
    #[error("Resource error: {0}")]
    Resource(String),

    /// Pipeline ordering invariant violated
    #[error("Invariant violated: {0}")]
    Invariant(String),

    /// Operator declined the key retrieval prompt
    #[error("Operation canceled by user")]
    UserCancelled,

    /// Process-level interrupt (Ctrl-C)
    #[error("Interrupted")]
    Interrupted,
}

impl PipelineError {
    /// Convenience constructor for external tool failures
    pub fn tool(cmd: impl Into<String>, reason: impl Into<String>) -> Self {
        PipelineError::ExternalTool {
            cmd: cmd.into(),
            reason: reason.into(),
        }
    }

    /// Convenience constructor for resource failures carrying an io::Error
    pub fn resource(context: impl AsRef<str>, err: io::Error) -> Self {
        PipelineError::Resource(format!("{}: {}", context.as_ref(), err))
    }

    /// Process exit code for this failure
    pub fn exit_code(&self) -> u8 {
        match self {
            PipelineError::Interrupted => 130,
            _ => 1,
        }
    }
}

/// A pipeline failure tagged with the stage it happened in.
///
/// Its Display is the single diagnostic line shown to the operator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{stage} failed: {error}")]
pub struct StageError {
    pub stage: PipelineStage,
    #[source]
    pub error: PipelineError,
}

impl StageError {
    pub fn new(stage: PipelineStage, error: PipelineError) -> Self {
        StageError { stage, error }
    }

    pub fn exit_code(&self) -> u8 {
        self.error.exit_code()
    }
}

/// Configuration file parsing and validation errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Invalid JSON in config: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    #[error("IO error during config operations: {0}")]
    IoError(#[from] io::Error),
}

/// Result type used across the pipeline components.
pub type Result<T> = std::result::Result<T, PipelineError>;
