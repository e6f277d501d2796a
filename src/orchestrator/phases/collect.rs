//! Artifact collector: flat copy of every built package into the destination.

use std::path::Path;

use crate::error::Result;
use crate::models::Artifact;
use crate::orchestrator::context::PipelineContext;
use crate::package::{copy_artifacts, scan_artifacts};

/// Find every package under the stage directories and copy it into `dest`.
///
/// Same-named files overwrite each other; the last one copied wins.
pub fn collect(stage_dirs: &[&Path], dest: &Path) -> Result<Vec<Artifact>> {
    let found = scan_artifacts(stage_dirs)?;
    let copied = copy_artifacts(&found, dest)?;
    log::info!("[Collect] Copied {} packages to {}", copied.len(), dest.display());
    Ok(copied)
}

pub fn collect_context(mut ctx: PipelineContext) -> Result<PipelineContext> {
    let destination = ctx.request.destination.clone();
    let collected = collect(&ctx.stage_dirs(), &destination)?;
    ctx.collected = collected;
    Ok(ctx)
}
