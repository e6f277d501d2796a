//! Core data types for the ZFS package builder.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// An upstream release selected once per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    /// Upstream tag, e.g. `zfs-2.1.2`
    pub tag: String,
    /// Semantic version extracted from the primary tarball, e.g. `2.1.2`
    pub version: String,
    /// Downloadable asset URLs, in upstream order
    pub assets: Vec<String>,
}

/// The three version strings substituted into both package definitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionTriple {
    /// Upstream release version
    pub upstream: String,
    /// Kernel package version installed inside the build root
    pub kernel: String,
    /// Module-compatible version derived from `kernel`
    pub modules: String,
}

impl fmt::Display for VersionTriple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "upstream={} kernel={} modules={}",
            self.upstream, self.kernel, self.modules
        )
    }
}

/// Which of the two ordered builds a stage is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageKind {
    /// Package A: userspace utilities, built standalone
    Utilities,
    /// Package B: kernel module, built against package A's artifacts
    KernelModule,
}

/// One package build: its expanded source directory and what it consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildStage {
    pub kind: StageKind,
    /// Stage name, also the template subdirectory name
    pub name: String,
    /// Expanded source directory under the WorkDir
    pub source_dir: PathBuf,
    /// Prebuilt packages injected into the chroot before building
    pub inject: Vec<PathBuf>,
}

impl BuildStage {
    pub fn new(kind: StageKind, name: impl Into<String>, source_dir: PathBuf) -> Self {
        BuildStage {
            kind,
            name: name.into(),
            source_dir,
            inject: Vec::new(),
        }
    }
}

/// A built package file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub path: PathBuf,
}

impl Artifact {
    pub fn new(path: PathBuf) -> Self {
        Artifact { path }
    }

    /// Bare file name used for the flat destination copy
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Per-run input assembled by the CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    /// Exact upstream version to build instead of the latest release
    pub pinned_version: Option<String>,
    /// Directory holding `pacman.conf` and the two stage templates
    pub template_dir: PathBuf,
    /// Flat output directory for the built packages
    pub destination: PathBuf,
    /// Build against the kernel from the testing repository
    pub use_testing_kernel: bool,
    /// Non-privileged user the build tools run as
    pub build_user: String,
    /// Parent directory for the WorkDir (system temp dir when unset)
    pub work_parent: Option<PathBuf>,
}

/// What a successful run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub release: Release,
    pub versions: VersionTriple,
    /// Artifacts as copied into the destination directory
    pub artifacts: Vec<Artifact>,
    pub destination: PathBuf,
}

impl BuildReport {
    pub fn artifact_names(&self) -> Vec<String> {
        self.artifacts.iter().map(Artifact::file_name).collect()
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }
}
