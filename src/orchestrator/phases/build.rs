//! Two-stage builder.
//!
//! Package A (utilities) is built standalone. Its two newest artifacts are then
//! injected into the build root for package B (kernel module). Package B is
//! never started unless package A produced at least two artifacts.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::BuildConfig;
use crate::error::{PipelineError, Result};
use crate::models::{Artifact, BuildStage, StageKind, VersionTriple};
use crate::orchestrator::context::PipelineContext;
use crate::orchestrator::state::{BuilderMachine, BuilderState};
use crate::package::{expand_template, newest_artifacts, scan_artifacts};
use crate::system::{self, run, CommandRunner, ToolCommand};

/// Artifacts package A must produce before package B may start
pub const REQUIRED_STAGE_A_ARTIFACTS: usize = 2;

/// Build one stage in the chroot as the invoking user.
///
/// `makechrootpkg -r <archroot> [-I <pkg>]... -- PKGDEST= --cleanbuild --clean
/// --force --syncdeps --needed --noconfirm --noprogressbar --jobs=<n>`
pub fn build_command(
    archroot: &Path,
    stage_dir: &Path,
    inject: &[PathBuf],
    user: &str,
    jobs: usize,
) -> ToolCommand {
    let mut cmd = ToolCommand::new("makechrootpkg").arg("-r").arg_path(archroot);
    for pkg in inject {
        cmd = cmd.arg("-I").arg_path(pkg);
    }
    cmd.args([
        "--",
        "PKGDEST=",
        "--cleanbuild",
        "--clean",
        "--force",
        "--syncdeps",
        "--needed",
        "--noconfirm",
        "--noprogressbar",
    ])
    .arg(format!("--jobs={}", jobs))
    .dir(stage_dir)
    .as_user(user)
    .streamed()
}

/// `chown -R <user>: <dirs...>`
pub fn chown_command(user: &str, dirs: &[&Path]) -> ToolCommand {
    let mut cmd = ToolCommand::new("chown").arg("-R").arg(format!("{}:", user));
    for dir in dirs {
        cmd = cmd.arg_path(dir);
    }
    cmd
}

fn copy_into(file: &Path, dir: &Path) -> Result<()> {
    let name = file.file_name().ok_or_else(|| {
        PipelineError::Resource(format!("Invalid source file path {}", file.display()))
    })?;
    fs::copy(file, dir.join(name)).map_err(|e| {
        PipelineError::resource(
            format!("Failed to copy {} to {}", file.display(), dir.display()),
            e,
        )
    })?;
    Ok(())
}

/// Expand both stage templates and place the downloaded sources.
///
/// Stage A receives every fetched file; stage B receives exactly the primary
/// tarball and its detached signature, both of which must exist.
pub fn prepare_stages(
    template_dir: &Path,
    work_dir: &Path,
    sources: &[PathBuf],
    versions: &VersionTriple,
    config: &BuildConfig,
) -> Result<(BuildStage, BuildStage)> {
    let expand = |stage: &str| {
        expand_template(
            template_dir,
            stage,
            work_dir,
            &config.definition_file,
            &config.tokens,
            versions,
        )
    };

    let utils_dir = expand(&config.utils_stage)?;
    let module_dir = expand(&config.module_stage)?;

    for source in sources {
        copy_into(source, &utils_dir)?;
    }

    for name in [
        config.tarball_name(&versions.upstream),
        config.signature_name(&versions.upstream),
    ] {
        let source = sources
            .iter()
            .find(|path| path.file_name().map_or(false, |f| f.to_string_lossy() == name))
            .ok_or_else(|| {
                PipelineError::Resource(format!("Source file {} was not downloaded", name))
            })?;
        copy_into(source, &module_dir)?;
    }

    Ok((
        BuildStage::new(StageKind::Utilities, config.utils_stage.clone(), utils_dir),
        BuildStage::new(StageKind::KernelModule, config.module_stage.clone(), module_dir),
    ))
}

/// Run both builds in order; artifacts from both stage directories land in `ctx.built`.
pub async fn build_stages(
    mut ctx: PipelineContext,
    runner: &dyn CommandRunner,
    config: &BuildConfig,
) -> Result<PipelineContext> {
    let mut machine = BuilderMachine::new();
    match run_builder(&mut ctx, &mut machine, runner, config).await {
        Ok(()) => Ok(ctx),
        Err(e) => {
            log::error!("[Build] Failed during {}: {}", machine.state().as_str(), e);
            machine.fail();
            Err(e)
        }
    }
}

async fn run_builder(
    ctx: &mut PipelineContext,
    machine: &mut BuilderMachine,
    runner: &dyn CommandRunner,
    config: &BuildConfig,
) -> Result<()> {
    let versions = ctx.versions()?.clone();
    let user = ctx.request.build_user.clone();
    let archroot = ctx.archroot();
    let jobs = system::parallelism();

    let (utils, mut module) = prepare_stages(
        &ctx.request.template_dir,
        ctx.work_dir(),
        &ctx.sources,
        &versions,
        config,
    )?;
    let stage_dirs = [utils.source_dir.clone(), module.source_dir.clone()];
    let stage_dirs: Vec<&Path> = stage_dirs.iter().map(PathBuf::as_path).collect();

    run(runner, &chown_command(&user, &stage_dirs)).await?;

    machine.transition_to(BuilderState::StageABuild)?;
    log::info!("[Build] Building {}", utils.name);
    run(
        runner,
        &build_command(&archroot, &utils.source_dir, &utils.inject, &user, jobs),
    )
    .await?;

    machine.transition_to(BuilderState::StageACollect)?;
    let stage_a = scan_artifacts(&stage_dirs)?;
    if stage_a.len() < REQUIRED_STAGE_A_ARTIFACTS {
        return Err(PipelineError::Invariant(format!(
            "Expected at least {} packages after building {}, found {}",
            REQUIRED_STAGE_A_ARTIFACTS,
            utils.name,
            stage_a.len()
        )));
    }
    module.inject = newest_artifacts(&stage_a, REQUIRED_STAGE_A_ARTIFACTS)
        .into_iter()
        .map(|artifact| artifact.path)
        .collect();
    log::info!("[Build] {} build completed", utils.name);

    machine.transition_to(BuilderState::StageBBuild)?;
    log::info!("[Build] Building {}", module.name);
    run(
        runner,
        &build_command(&archroot, &module.source_dir, &module.inject, &user, jobs),
    )
    .await?;

    machine.transition_to(BuilderState::StageBCollect)?;
    let built: Vec<Artifact> = scan_artifacts(&stage_dirs)?;
    log::info!("[Build] {} build completed", module.name);

    machine.transition_to(BuilderState::Done)?;
    ctx.stages = vec![utils, module];
    ctx.built = built;
    Ok(())
}
