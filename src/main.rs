use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use zfs_pkgbuilder::config::loader::{load_settings, resolve_destination, MAKEPKG_CONF};
use zfs_pkgbuilder::config::DEFAULT_TEMPLATE_DIR;
use zfs_pkgbuilder::log_collector;
use zfs_pkgbuilder::{
    system, BuildReport, BuildRequest, LogCollector, Pipeline, PipelineError, StageError,
    StdinPrompter, SystemRunner,
};

/// ZFS packages creation tool for Arch Linux.
///
/// Builds zfs-utils and zfs-linux in a clean chroot against the kernel
/// installed in that chroot. Must be run as root through sudo from a user
/// session.
#[derive(Parser, Debug)]
#[command(name = "zfs_pkgbuilder", version)]
struct Cli {
    /// Specify the ZFS release version to build (x.y.z)
    #[arg(short = 'r', long = "release")]
    release: Option<String>,

    /// Path to the package definition directory
    #[arg(short = 'D', long = "pkgbuild-dir", default_value = DEFAULT_TEMPLATE_DIR)]
    pkgbuild_dir: PathBuf,

    /// Packages destination directory (default: PKGDEST from makepkg.conf, else ./out)
    #[arg(long)]
    pkgdest: Option<PathBuf>,

    /// Build packages against the linux kernel in the testing repository
    #[arg(long)]
    linuxtesting: bool,

    /// Settings file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Also write a session log file into this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Debug output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    let collector = LogCollector::new(level, cli.log_dir.as_deref())
        .map_err(anyhow::Error::msg)
        .context("Failed to initialize logging")?;
    let logger = log_collector::init(collector)
        .map_err(|e| anyhow::anyhow!("Failed to install logger: {}", e))?;

    if !system::is_superuser() {
        eprintln!("Error: This tool must be run as root.\n");
        eprintln!("Get help:\nzfs_pkgbuilder --help");
        return Ok(ExitCode::FAILURE);
    }

    let config = load_settings(cli.config.as_deref()).context("Failed to load settings")?;
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    let destination = resolve_destination(cli.pkgdest, Path::new(MAKEPKG_CONF), &cwd);

    let request = BuildRequest {
        pinned_version: cli.release,
        template_dir: cli.pkgbuild_dir,
        destination,
        use_testing_kernel: cli.linuxtesting,
        build_user: system::invoking_user().unwrap_or_default(),
        work_parent: None,
    };

    let pipeline = Pipeline::new(config, Arc::new(SystemRunner::new()), Arc::new(StdinPrompter))
        .context("Failed to set up HTTP client")?;

    // Dropping the pipeline future on interrupt removes the WorkDir and kills
    // any running tool.
    let outcome = tokio::select! {
        result = pipeline.run(request) => result,
        _ = tokio::signal::ctrl_c() => {
            Err(StageError::new(pipeline.current_stage(), PipelineError::Interrupted))
        }
    };

    let code = match outcome {
        Ok(report) => {
            print_report(&report);
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{}", e);
            ExitCode::from(e.exit_code())
        }
    };

    logger.wait_for_empty();
    Ok(code)
}

fn print_report(report: &BuildReport) {
    println!("\nDone!\n");
    for name in report.artifact_names() {
        println!("{}", name);
    }
    println!(
        "\nZFS packages directory location: {}\n",
        report.destination().display()
    );
}
