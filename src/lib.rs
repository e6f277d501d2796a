//! ZFS package builder for Arch Linux
//!
//! Builds the OpenZFS userspace utilities and kernel module packages in a
//! disposable clean chroot, against the kernel actually installed in that
//! chroot, and copies the resulting packages to a destination directory.
//!
//! The system is organized into functional modules:
//! - **error**: Error taxonomy and stage-tagged failures
//! - **models**: Core data structures and types
//! - **config**: Settings, defaults and destination resolution
//! - **system**: External tool execution, signing keys, disk space, privileges
//! - **upstream**: Release resolution and parallel source downloads
//! - **kernel**: Kernel package version parsing
//! - **package**: Template expansion and built package handling
//! - **orchestrator**: Sequential pipeline, WorkDir lifetime, builder state

// Core foundational modules
pub mod error;
pub mod models;

// Settings file and defaults
pub mod config;

// OS abstraction: commands, keys, disk
pub mod system;

// Release index and downloads
pub mod upstream;

// Kernel version handling
pub mod kernel;

// Package templates and artifacts
pub mod package;

// Logging backend for the log facade
pub mod log_collector;

// Build orchestration and state management
pub mod orchestrator;

// Re-export the log crate for macro usage
pub use log;

pub use log_collector::LogCollector;

// ============================================================================
// PUBLIC RE-EXPORTS FOR CONVENIENCE
// ============================================================================

pub use config::BuildConfig;
pub use error::{ConfigError, PipelineError, Result, StageError};
pub use models::{
    Artifact, BuildReport, BuildRequest, BuildStage, Release, StageKind, VersionTriple,
};
pub use orchestrator::{BuilderState, Pipeline, PipelineStage};
pub use system::{CommandRunner, Prompter, StdinPrompter, SystemRunner, ToolCommand, ToolOutput};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
