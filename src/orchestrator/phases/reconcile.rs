//! Version reconciler: the kernel actually installed in the build root.

use std::path::Path;

use crate::error::Result;
use crate::kernel::version::{derive_module_version, parse_installed_version, query_command};
use crate::models::VersionTriple;
use crate::orchestrator::context::PipelineContext;
use crate::system::{run, CommandRunner};

/// Query the kernel package inside `root` and pair it with the upstream version.
pub async fn reconcile(
    runner: &dyn CommandRunner,
    root: &Path,
    kernel_package: &str,
    upstream: &str,
) -> Result<VersionTriple> {
    let output = run(runner, &query_command(root, kernel_package)).await?;
    let kernel = parse_installed_version(&output.stdout, kernel_package)?;
    let modules = derive_module_version(&kernel);

    let versions = VersionTriple {
        upstream: upstream.to_string(),
        kernel,
        modules,
    };
    log::info!("[Kernel] {}", versions);
    Ok(versions)
}

pub async fn reconcile_context(
    mut ctx: PipelineContext,
    runner: &dyn CommandRunner,
    kernel_package: &str,
) -> Result<PipelineContext> {
    let upstream = ctx.release()?.version.clone();
    let versions = reconcile(runner, &ctx.chroot_root(), kernel_package, &upstream).await?;
    ctx.versions = Some(versions);
    Ok(ctx)
}
