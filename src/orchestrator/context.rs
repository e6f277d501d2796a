//! Run state threaded through the pipeline stages.
//!
//! Each stage takes the context by value and hands back an updated one, so a
//! stage that fails drops the context and with it the WorkDir.

use std::path::{Path, PathBuf};

use crate::error::{PipelineError, Result};
use crate::models::{Artifact, BuildRequest, BuildStage, Release, VersionTriple};
use crate::orchestrator::workdir::WorkDir;

/// Build root directory name under the WorkDir
pub const ARCHROOT_DIR: &str = "archroot64";
/// Download directory name under the WorkDir
pub const SOURCES_DIR: &str = "sources";

#[derive(Debug)]
pub struct PipelineContext {
    pub request: BuildRequest,
    work_dir: WorkDir,
    pub release: Option<Release>,
    /// Downloaded release assets
    pub sources: Vec<PathBuf>,
    pub versions: Option<VersionTriple>,
    /// Expanded stages, package A first
    pub stages: Vec<BuildStage>,
    /// Artifacts found in the stage directories after both builds
    pub built: Vec<Artifact>,
    /// Artifacts as copied into the destination
    pub collected: Vec<Artifact>,
}

impl PipelineContext {
    pub fn new(request: BuildRequest, work_dir: WorkDir) -> Self {
        PipelineContext {
            request,
            work_dir,
            release: None,
            sources: Vec::new(),
            versions: None,
            stages: Vec::new(),
            built: Vec::new(),
            collected: Vec::new(),
        }
    }

    pub fn work_dir(&self) -> &Path {
        self.work_dir.path()
    }

    /// Chroot container directory passed to `makechrootpkg -r`
    pub fn archroot(&self) -> PathBuf {
        self.work_dir.join(ARCHROOT_DIR)
    }

    /// The provisioned root inside the container
    pub fn chroot_root(&self) -> PathBuf {
        self.archroot().join("root")
    }

    pub fn sources_dir(&self) -> PathBuf {
        self.work_dir.join(SOURCES_DIR)
    }

    pub fn release(&self) -> Result<&Release> {
        self.release
            .as_ref()
            .ok_or_else(|| PipelineError::Invariant("Release has not been resolved".to_string()))
    }

    pub fn versions(&self) -> Result<&VersionTriple> {
        self.versions.as_ref().ok_or_else(|| {
            PipelineError::Invariant("Kernel version has not been reconciled".to_string())
        })
    }

    /// Stage source directories, package A first
    pub fn stage_dirs(&self) -> Vec<&Path> {
        self.stages.iter().map(|s| s.source_dir.as_path()).collect()
    }
}
