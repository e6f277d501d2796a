//! Run-scoped scratch directory.
//!
//! The WorkDir owns the build root and both stage source directories. It is
//! removed when the value is dropped, which covers normal return, early error
//! return and cancellation of the pipeline future.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::error::{PipelineError, Result};

/// Prefix of the scratch directory name
pub const WORK_DIR_PREFIX: &str = "auiwork.";

#[derive(Debug)]
pub struct WorkDir {
    dir: Option<TempDir>,
    path: PathBuf,
}

impl WorkDir {
    /// Create `auiwork.XXXX` under `parent`, or under the system temp dir.
    pub fn create(parent: Option<&Path>) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(WORK_DIR_PREFIX);

        let dir = match parent {
            Some(parent) => builder.tempdir_in(parent),
            None => builder.tempdir(),
        }
        .map_err(|e| PipelineError::resource("Failed to create work directory", e))?;

        // The build user has to traverse into its stage directories.
        fs::set_permissions(dir.path(), fs::Permissions::from_mode(0o755)).map_err(|e| {
            PipelineError::resource(
                format!("Failed to set permissions on {}", dir.path().display()),
                e,
            )
        })?;

        let path = dir.path().to_path_buf();
        log::info!("[Pipeline] Work directory: {}", path.display());
        Ok(WorkDir {
            dir: Some(dir),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn join(&self, name: impl AsRef<Path>) -> PathBuf {
        self.path.join(name)
    }
}

impl Drop for WorkDir {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            log::info!(
                "[Pipeline] Cleaning up temporary directory: {}",
                self.path.display()
            );
            if let Err(e) = dir.close() {
                log::warn!(
                    "[Pipeline] Failed to remove {}: {}",
                    self.path.display(),
                    e
                );
            }
        }
    }
}
