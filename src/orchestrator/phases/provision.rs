//! Environment provisioner: a fresh build root inside the WorkDir.
//!
//! The root is created from the base package set with the template's pacman
//! configuration. With the testing kernel requested, the testing repository is
//! synced into the root and its kernel installed over the stable one; if the
//! repository has no kernel package, provisioning fails.

use std::fs;
use std::path::Path;

use crate::config::BuildConfig;
use crate::error::{PipelineError, Result};
use crate::orchestrator::context::PipelineContext;
use crate::system::{run, CommandRunner, ToolCommand};

/// `mkarchroot -C <pacman.conf> -c <cache> <root> <base packages...>`
pub fn create_root_command(config: &BuildConfig, template_dir: &Path, root: &Path) -> ToolCommand {
    ToolCommand::new("mkarchroot")
        .arg("-C")
        .arg_path(&config.pacman_config_path(template_dir))
        .arg("-c")
        .arg_path(&config.package_cache)
        .arg_path(root)
        .args(&config.base_packages)
}

fn testing_pacman(config: &BuildConfig, template_dir: &Path, root: &Path) -> ToolCommand {
    ToolCommand::new("unshare")
        .args(["--fork", "--pid", "pacman", "--config"])
        .arg_path(&config.testing_pacman_config_path(template_dir))
        .arg("--root")
        .arg_path(root)
}

/// Sync the testing repository database inside the root.
pub fn sync_testing_command(config: &BuildConfig, template_dir: &Path, root: &Path) -> ToolCommand {
    testing_pacman(config, template_dir, root).arg("-Sy")
}

/// Ask the testing repository for its kernel package; non-zero means none.
pub fn probe_testing_kernel_command(
    config: &BuildConfig,
    template_dir: &Path,
    root: &Path,
) -> ToolCommand {
    testing_pacman(config, template_dir, root)
        .arg("-Si")
        .arg(config.testing_kernel_ref())
        .allow_fail()
}

/// Install the testing kernel and headers into the root.
pub fn install_testing_kernel_command(
    config: &BuildConfig,
    template_dir: &Path,
    root: &Path,
) -> ToolCommand {
    ToolCommand::new("pacstrap")
        .arg("-C")
        .arg_path(&config.testing_pacman_config_path(template_dir))
        .args(["-c", "-G", "-M"])
        .arg_path(root)
        .arg(&config.kernel_package)
        .arg(&config.kernel_headers_package)
}

/// Create the build root under `<work>/archroot64/root`.
pub async fn provision(
    ctx: PipelineContext,
    runner: &dyn CommandRunner,
    config: &BuildConfig,
) -> Result<PipelineContext> {
    let archroot = ctx.archroot();
    let root = ctx.chroot_root();
    let template_dir = ctx.request.template_dir.clone();

    fs::create_dir_all(&archroot).map_err(|e| {
        PipelineError::resource(format!("Failed to create {}", archroot.display()), e)
    })?;

    log::info!("[Provision] Creating build root in {}", root.display());
    run(runner, &create_root_command(config, &template_dir, &root)).await?;

    if ctx.request.use_testing_kernel {
        log::info!("[Provision] Setting up {} repository", config.testing_repository);
        run(runner, &sync_testing_command(config, &template_dir, &root)).await?;

        let probe = run(runner, &probe_testing_kernel_command(config, &template_dir, &root)).await?;
        if !probe.success() {
            return Err(PipelineError::tool(
                "pacman -Si",
                format!(
                    "No {} package available in {} repository",
                    config.kernel_package, config.testing_repository
                ),
            ));
        }

        run(runner, &install_testing_kernel_command(config, &template_dir, &root)).await?;
        log::info!("[Provision] Installed {} kernel", config.testing_kernel_ref());
    }

    log::info!("[Provision] Build root created successfully");
    Ok(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BuildRequest;
    use crate::system::scripted::ScriptedRunner;
    use crate::orchestrator::workdir::WorkDir;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn context(parent: &Path, testing: bool) -> PipelineContext {
        let request = BuildRequest {
            pinned_version: None,
            template_dir: PathBuf::from("/pkgbuild"),
            destination: PathBuf::from("/tmp/out"),
            use_testing_kernel: testing,
            build_user: "builder".to_string(),
            work_parent: Some(parent.to_path_buf()),
        };
        PipelineContext::new(request, WorkDir::create(Some(parent)).unwrap())
    }

    #[test]
    fn test_create_root_command() {
        let cmd = create_root_command(
            &BuildConfig::default(),
            Path::new("/pkgbuild"),
            Path::new("/w/archroot64/root"),
        );
        assert_eq!(
            cmd.to_string(),
            "mkarchroot -C /pkgbuild/pacman.conf -c /var/cache/pacman/pkg \
             /w/archroot64/root base linux linux-headers base-devel"
        );
    }

    #[tokio::test]
    async fn test_stable_kernel_runs_only_mkarchroot() {
        let parent = TempDir::new().unwrap();
        let runner = ScriptedRunner::new();
        let ctx = provision(context(parent.path(), false), &runner, &BuildConfig::default())
            .await
            .unwrap();

        assert_eq!(runner.programs(), vec!["mkarchroot"]);
        assert!(ctx.archroot().is_dir());
    }

    #[tokio::test]
    async fn test_testing_kernel_sequence() {
        let parent = TempDir::new().unwrap();
        let runner = ScriptedRunner::new();
        provision(context(parent.path(), true), &runner, &BuildConfig::default())
            .await
            .unwrap();

        assert_eq!(
            runner.programs(),
            vec!["mkarchroot", "unshare", "unshare", "pacstrap"]
        );
        let calls = runner.calls();
        assert!(calls[1].has_arg("-Sy"));
        assert!(calls[2].has_arg("testing/linux"));
        assert!(calls[3].has_arg("-M"));
    }

    #[tokio::test]
    async fn test_testing_repo_without_kernel_fails() {
        let parent = TempDir::new().unwrap();
        let runner = ScriptedRunner::new().fail_when("-Si testing/linux", 1);
        let err = provision(context(parent.path(), true), &runner, &BuildConfig::default())
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::ExternalTool { .. }));
        assert!(!runner.programs().contains(&"pacstrap".to_string()));
    }
}
