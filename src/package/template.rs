//! Stage template expansion.
//!
//! A stage's source directory is a copy of `<template_dir>/<stage>` in which the
//! definition file has every occurrence of the three version tokens replaced
//! by literal values.

use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::Tokens;
use crate::error::{PipelineError, Result};
use crate::models::VersionTriple;

/// Replace every occurrence of each token with its value.
pub fn substitute_tokens(content: &str, tokens: &Tokens, versions: &VersionTriple) -> String {
    content
        .replace(&tokens.upstream_version, &versions.upstream)
        .replace(&tokens.kernel_version, &versions.kernel)
        .replace(&tokens.modules_version, &versions.modules)
}

/// Recursively copy a directory tree; `dest` must not exist yet.
pub fn copy_tree(src: &Path, dest: &Path) -> Result<()> {
    for entry in WalkDir::new(src).follow_links(false) {
        let entry = entry.map_err(|e| {
            PipelineError::Resource(format!("Failed to read template {}: {}", src.display(), e))
        })?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| PipelineError::Resource(format!("Bad template path: {}", e)))?;
        let target = dest.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|e| {
                PipelineError::resource(format!("Failed to create {}", target.display()), e)
            })?;
        } else {
            fs::copy(entry.path(), &target).map_err(|e| {
                PipelineError::resource(
                    format!("Failed to copy {} to {}", entry.path().display(), target.display()),
                    e,
                )
            })?;
        }
    }
    Ok(())
}

/// Copy `<template_dir>/<stage>` into `<work_dir>/<stage>` and substitute tokens
/// in its definition file. Returns the expanded source directory.
pub fn expand_template(
    template_dir: &Path,
    stage: &str,
    work_dir: &Path,
    definition_file: &str,
    tokens: &Tokens,
    versions: &VersionTriple,
) -> Result<PathBuf> {
    let src = template_dir.join(stage);
    let dest = work_dir.join(stage);

    if !src.is_dir() {
        return Err(PipelineError::Validation(format!(
            "Template directory {} does not exist",
            src.display()
        )));
    }

    copy_tree(&src, &dest)?;

    let definition = dest.join(definition_file);
    let content = fs::read_to_string(&definition).map_err(|e| {
        PipelineError::resource(format!("Failed to read {}", definition.display()), e)
    })?;
    fs::write(&definition, substitute_tokens(&content, tokens, versions)).map_err(|e| {
        PipelineError::resource(format!("Failed to update {}", definition.display()), e)
    })?;

    log::debug!("[Build] Expanded {} into {}", stage, dest.display());
    Ok(dest)
}
