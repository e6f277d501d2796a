//! Build orchestration: strictly sequential pipeline
//! (Preflight -> Credentials -> Release -> Provision -> Fetch -> Reconcile -> Build -> Collect).
//!
//! The WorkDir is created after request validation and owned by the
//! `PipelineContext`. Whatever way `run` ends (success, a stage failure, or the
//! future being dropped on interrupt), the context is dropped and the WorkDir
//! removed with it.

pub mod context;
pub mod phases;
pub mod state;
pub mod workdir;

use std::fs;
use std::sync::{Arc, Mutex};

pub use context::PipelineContext;
pub use state::{BuilderMachine, BuilderState, PipelineStage};
pub use workdir::WorkDir;

use crate::config::BuildConfig;
use crate::error::{PipelineError, StageError};
use crate::models::{BuildReport, BuildRequest};
use crate::system::{CommandRunner, Prompter};
use crate::upstream::{self, ReleaseResolver, SourceFetcher};

/// Attach the failing stage to an error.
fn at(stage: PipelineStage) -> impl FnOnce(PipelineError) -> StageError {
    move |error| StageError::new(stage, error)
}

/// Runs the whole build for one request.
pub struct Pipeline {
    config: BuildConfig,
    runner: Arc<dyn CommandRunner>,
    prompter: Arc<dyn Prompter>,
    resolver: ReleaseResolver,
    fetcher: SourceFetcher,
    /// Stage currently executing, for reporting interrupts
    current: Mutex<PipelineStage>,
}

impl Pipeline {
    /// Create a pipeline with an HTTP client built from `config`.
    pub fn new(
        config: BuildConfig,
        runner: Arc<dyn CommandRunner>,
        prompter: Arc<dyn Prompter>,
    ) -> Result<Self, PipelineError> {
        let client = upstream::http_client(&config)?;
        let resolver = ReleaseResolver::new(client.clone(), &config);
        let fetcher = SourceFetcher::new(client, &config);
        Ok(Pipeline {
            config,
            runner,
            prompter,
            resolver,
            fetcher,
            current: Mutex::new(PipelineStage::Preflight),
        })
    }

    /// Replace the download worker bound (defaults to the CPU count).
    pub fn with_download_workers(mut self, workers: usize) -> Self {
        self.fetcher = self.fetcher.with_workers(workers);
        self
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// The stage that is running, or the last one that ran.
    pub fn current_stage(&self) -> PipelineStage {
        self.current
            .lock()
            .map(|stage| *stage)
            .unwrap_or(PipelineStage::Preflight)
    }

    fn enter(&self, stage: PipelineStage) {
        if let Ok(mut current) = self.current.lock() {
            *current = stage;
        }
        log::info!("[Pipeline] [STAGE] {}", stage);
    }

    /// Execute every stage in order.
    ///
    /// # Returns
    /// * `Ok(BuildReport)` with the artifacts as copied into the destination
    /// * `Err(StageError)` naming the first stage that failed
    pub async fn run(&self, request: BuildRequest) -> Result<BuildReport, StageError> {
        let runner = self.runner.as_ref();
        let config = &self.config;

        log::info!("[Pipeline] Starting package build process");
        self.enter(PipelineStage::Preflight);
        phases::validate_request(&request, config).map_err(at(PipelineStage::Preflight))?;

        let work_dir =
            WorkDir::create(request.work_parent.as_deref()).map_err(at(PipelineStage::Preflight))?;
        let mut ctx = PipelineContext::new(request, work_dir);

        phases::prepare(&ctx.request, config, runner)
            .await
            .map_err(at(PipelineStage::Preflight))?;

        self.enter(PipelineStage::Credentials);
        let fetched_keys = phases::ensure_keys(
            runner,
            self.prompter.as_ref(),
            &config.signing_keys,
            &ctx.request.build_user,
        )
        .await
        .map_err(at(PipelineStage::Credentials))?;
        if !fetched_keys.is_empty() {
            log::info!("[Keys] Retrieved {} signing keys", fetched_keys.len());
        }

        self.enter(PipelineStage::Release);
        let release = self
            .resolver
            .resolve(ctx.request.pinned_version.as_deref())
            .await
            .map_err(at(PipelineStage::Release))?;
        log::info!("[Release] Building {} ({})", release.version, release.tag);
        ctx.release = Some(release);

        self.enter(PipelineStage::Provision);
        phases::check_free_space(ctx.work_dir(), config.min_free_space_gb)
            .map_err(at(PipelineStage::Provision))?;
        let mut ctx = phases::provision(ctx, runner, config)
            .await
            .map_err(at(PipelineStage::Provision))?;

        self.enter(PipelineStage::Fetch);
        let sources_dir = ctx.sources_dir();
        fs::create_dir_all(&sources_dir)
            .map_err(|e| {
                PipelineError::resource(format!("Failed to create {}", sources_dir.display()), e)
            })
            .map_err(at(PipelineStage::Fetch))?;
        let assets = ctx.release().map_err(at(PipelineStage::Fetch))?.assets.clone();
        ctx.sources = self
            .fetcher
            .fetch_all(&assets, &sources_dir)
            .await
            .map_err(at(PipelineStage::Fetch))?;

        self.enter(PipelineStage::Reconcile);
        let ctx = phases::reconcile_context(ctx, runner, &config.kernel_package)
            .await
            .map_err(at(PipelineStage::Reconcile))?;

        self.enter(PipelineStage::Build);
        let ctx = phases::build_stages(ctx, runner, config)
            .await
            .map_err(at(PipelineStage::Build))?;

        self.enter(PipelineStage::Collect);
        let ctx = phases::collect_context(ctx).map_err(at(PipelineStage::Collect))?;

        let report = BuildReport {
            release: ctx.release().map_err(at(PipelineStage::Collect))?.clone(),
            versions: ctx.versions().map_err(at(PipelineStage::Collect))?.clone(),
            artifacts: ctx.collected.clone(),
            destination: ctx.request.destination.clone(),
        };
        drop(ctx);

        log::info!("[Pipeline] Build finished: {} packages", report.artifacts.len());
        Ok(report)
    }
}
