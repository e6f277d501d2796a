//! Built package discovery and collection.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::Path;
use std::time::SystemTime;
use walkdir::WalkDir;

use crate::error::{PipelineError, Result};
use crate::models::Artifact;

/// Package file names: `<anything>.pkg.tar.<compression>`
static ARTIFACT_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^.+\.pkg\.tar\..+$").expect("Invalid artifact regex"));

pub fn is_artifact_name(name: &str) -> bool {
    ARTIFACT_REGEX.is_match(name)
}

/// Recursively find package files under each directory, sorted by path.
pub fn scan_artifacts(dirs: &[&Path]) -> Result<Vec<Artifact>> {
    let mut artifacts = Vec::new();

    for dir in dirs {
        for entry in WalkDir::new(dir) {
            let entry = entry.map_err(|e| {
                PipelineError::Resource(format!("Failed to scan {}: {}", dir.display(), e))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            if is_artifact_name(&entry.file_name().to_string_lossy()) {
                artifacts.push(Artifact::new(entry.into_path()));
            }
        }
    }

    artifacts.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(artifacts)
}

/// The `count` most recently modified artifacts, ties broken by path.
///
/// Detached `.sig` files match the artifact pattern too, so one could be
/// picked here if packages were ever signed during the build.
pub fn newest_artifacts(artifacts: &[Artifact], count: usize) -> Vec<Artifact> {
    let mut dated: Vec<(SystemTime, &Artifact)> = artifacts
        .iter()
        .map(|artifact| {
            let modified = fs::metadata(&artifact.path)
                .and_then(|meta| meta.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            (modified, artifact)
        })
        .collect();

    dated.sort_by(|(ta, a), (tb, b)| tb.cmp(ta).then_with(|| a.path.cmp(&b.path)));
    dated
        .into_iter()
        .take(count)
        .map(|(_, artifact)| artifact.clone())
        .collect()
}

/// Flat-copy every artifact into `dest`, overwriting same-named files.
///
/// Returns the artifacts at their destination paths.
pub fn copy_artifacts(artifacts: &[Artifact], dest: &Path) -> Result<Vec<Artifact>> {
    let mut copied = Vec::with_capacity(artifacts.len());

    for artifact in artifacts {
        let target = dest.join(artifact.file_name());
        fs::copy(&artifact.path, &target).map_err(|e| {
            PipelineError::resource(
                format!(
                    "Failed to copy {} to {}",
                    artifact.path.display(),
                    dest.display()
                ),
                e,
            )
        })?;
        log::debug!("[Collect] Copied {}", target.display());
        copied.push(Artifact::new(target));
    }

    Ok(copied)
}
