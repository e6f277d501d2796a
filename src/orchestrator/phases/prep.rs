//! Preparation: request validation, host tools, destination directory, disk space.
//!
//! Validation runs before the WorkDir exists and before any network call, so a
//! bad request fails without side effects.

use std::fs;
use std::path::Path;

use crate::config::BuildConfig;
use crate::error::{PipelineError, Result};
use crate::models::BuildRequest;
use crate::system::{self, CommandRunner, ToolCommand};
use crate::upstream::release::validate_pin;

/// Checks that need nothing but the request and the filesystem.
///
/// # Returns
/// * `Err(PipelineError::Validation)` naming the first problem found
pub fn validate_request(request: &BuildRequest, config: &BuildConfig) -> Result<()> {
    let user = request.build_user.trim();
    if user.is_empty() {
        return Err(PipelineError::Validation(
            "Unable to determine the invoking user. Run through sudo".to_string(),
        ));
    }
    if user == "root" {
        return Err(PipelineError::Validation(
            "Packages must be built by a non-root user. Run through sudo from a regular account"
                .to_string(),
        ));
    }

    if let Some(pin) = &request.pinned_version {
        validate_pin(pin)?;
    }

    validate_template_dir(&request.template_dir, config)?;
    Ok(())
}

fn validate_template_dir(template_dir: &Path, config: &BuildConfig) -> Result<()> {
    if !template_dir.is_dir() {
        return Err(PipelineError::Validation(format!(
            "Package definition directory {} not found",
            template_dir.display()
        )));
    }

    for stage in [&config.utils_stage, &config.module_stage] {
        let stage_dir = template_dir.join(stage);
        if !stage_dir.is_dir() {
            return Err(PipelineError::Validation(format!(
                "Stage template {} not found",
                stage_dir.display()
            )));
        }
    }
    Ok(())
}

pub fn host_package_command(package: &str) -> ToolCommand {
    ToolCommand::new("pacman").arg("-Q").arg(package)
}

/// Every required host package must be installed.
pub async fn check_host_packages(runner: &dyn CommandRunner, packages: &[String]) -> Result<()> {
    for package in packages {
        let output = runner
            .execute(&host_package_command(package).allow_fail())
            .await?;
        if !output.success() {
            return Err(PipelineError::tool(
                format!("pacman -Q {}", package),
                format!("package {} is not installed", package),
            ));
        }
        log::debug!("[Pipeline] Host package present: {}", output.stdout_trimmed());
    }
    Ok(())
}

pub fn prepare_destination(destination: &Path) -> Result<()> {
    fs::create_dir_all(destination).map_err(|e| {
        PipelineError::resource(
            format!("Failed to create destination {}", destination.display()),
            e,
        )
    })
}

/// Host tools and destination; runs once the WorkDir exists.
pub async fn prepare(
    request: &BuildRequest,
    config: &BuildConfig,
    runner: &dyn CommandRunner,
) -> Result<()> {
    check_host_packages(runner, &config.required_host_packages).await?;
    prepare_destination(&request.destination)?;
    log::info!(
        "[Pipeline] Packages will be written to {}",
        request.destination.display()
    );
    Ok(())
}

/// Free space on the filesystem holding the WorkDir.
pub fn check_free_space(work_dir: &Path, required_gb: u64) -> Result<()> {
    let available = system::disk::check_disk_space(work_dir, required_gb)?;
    log::info!("[Pipeline] Disk space check passed: {} GB available", available);
    Ok(())
}
