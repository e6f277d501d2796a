//! Pipeline stage and builder state tracking
//!
//! **Architecture**:
//! - `PipelineStage`: the strictly sequential top-level stages, used to tag failures
//! - `BuilderState`: the two-stage builder's state machine
//!   (`Init → StageABuild → StageACollect → StageBBuild → StageBCollect → Done`,
//!   any state → `Failed`, which is terminal)

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::PipelineError;

/// Top-level pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PipelineStage {
    /// Input validation, host tools, disk space, destination directory
    Preflight,
    /// Signing keys present in the invoking user's keyring
    Credentials,
    /// Upstream release selection
    Release,
    /// Build root creation (and optional testing kernel)
    Provision,
    /// Parallel source downloads
    Fetch,
    /// Kernel version inside the build root
    Reconcile,
    /// Utilities package, then kernel module package
    Build,
    /// Copy of built packages to the destination
    Collect,
}

impl PipelineStage {
    pub const ALL: [PipelineStage; 8] = [
        PipelineStage::Preflight,
        PipelineStage::Credentials,
        PipelineStage::Release,
        PipelineStage::Provision,
        PipelineStage::Fetch,
        PipelineStage::Reconcile,
        PipelineStage::Build,
        PipelineStage::Collect,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Preflight => "preflight",
            PipelineStage::Credentials => "credential gate",
            PipelineStage::Release => "release resolution",
            PipelineStage::Provision => "provision",
            PipelineStage::Fetch => "source download",
            PipelineStage::Reconcile => "kernel version reconciliation",
            PipelineStage::Build => "package build",
            PipelineStage::Collect => "artifact collection",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// States of the two-stage builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuilderState {
    Init,
    StageABuild,
    StageACollect,
    StageBBuild,
    StageBCollect,
    Done,
    Failed,
}

impl BuilderState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuilderState::Init => "init",
            BuilderState::StageABuild => "stage A build",
            BuilderState::StageACollect => "stage A collect",
            BuilderState::StageBBuild => "stage B build",
            BuilderState::StageBCollect => "stage B collect",
            BuilderState::Done => "done",
            BuilderState::Failed => "failed",
        }
    }

    /// Get all valid transitions FROM this state.
    pub fn valid_next_states(&self) -> Vec<BuilderState> {
        match self {
            BuilderState::Init => vec![BuilderState::StageABuild, BuilderState::Failed],
            BuilderState::StageABuild => vec![BuilderState::StageACollect, BuilderState::Failed],
            BuilderState::StageACollect => vec![BuilderState::StageBBuild, BuilderState::Failed],
            BuilderState::StageBBuild => vec![BuilderState::StageBCollect, BuilderState::Failed],
            BuilderState::StageBCollect => vec![BuilderState::Done, BuilderState::Failed],
            BuilderState::Done => vec![],
            BuilderState::Failed => vec![],
        }
    }

    pub fn can_transition_to(&self, next: BuilderState) -> bool {
        self.valid_next_states().contains(&next)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BuilderState::Done | BuilderState::Failed)
    }
}

/// Tracks the builder's current state and rejects out-of-order steps.
#[derive(Debug, Clone)]
pub struct BuilderMachine {
    state: BuilderState,
    history: Vec<BuilderState>,
}

impl Default for BuilderMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl BuilderMachine {
    pub fn new() -> Self {
        BuilderMachine {
            state: BuilderState::Init,
            history: vec![BuilderState::Init],
        }
    }

    pub fn state(&self) -> BuilderState {
        self.state
    }

    /// States visited so far, starting with `Init`
    pub fn history(&self) -> &[BuilderState] {
        &self.history
    }

    /// Attempt to transition to the next state.
    pub fn transition_to(&mut self, next: BuilderState) -> Result<(), PipelineError> {
        if !self.state.can_transition_to(next) {
            return Err(PipelineError::Invariant(format!(
                "Invalid builder transition: {} -> {}",
                self.state.as_str(),
                next.as_str()
            )));
        }
        log::debug!("[Build] {} -> {}", self.state.as_str(), next.as_str());
        self.state = next;
        self.history.push(next);
        Ok(())
    }

    /// Mark the builder failed. No-op once terminal.
    pub fn fail(&mut self) {
        if !self.state.is_terminal() {
            self.state = BuilderState::Failed;
            self.history.push(BuilderState::Failed);
        }
    }
}
