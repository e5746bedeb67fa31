//! Batch orchestration: catalog pagination, filtering, dedup, batched
//! transfers, and tracker reconciliation.
//!
//! # Design
//! - One run is one sequential task; the only parallelism is the executor's
//!   worker pool inside a batch.
//! - Batch N is reconciled and saved before page N+1 is requested, so dedup
//!   always sees every earlier transfer.
//! - Pause and cancel are honoured at page and batch boundaries; workers see
//!   cancellation on their own through the shared flags.
//! - Run-level halts end the run with a distinct status. Task failures never
//!   halt a run except for an expired session.

mod expiry;
mod reconcile;
mod run;
mod scan;
mod state;

use std::fmt;
use std::sync::Arc;

use astrofetch_config::AppConfig;
use astrofetch_core::{
    CatalogSource, CollisionPolicy, ControlFlags, Fetcher, FilterSpec, RunStatus,
};
use astrofetch_events::{Event, EventBus};
use astrofetch_fsops::PathOrganizer;
use astrofetch_telemetry::Metrics;
use astrofetch_tracker::{SessionRecord, TrackerStore};
use astrofetch_transfer::{ExecutorConfig, RateLimiter, TransferExecutor};
use chrono::Utc;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use state::RunState;

pub use expiry::{ExpiryDetector, TotalCountDrop};
pub use run::{ProgressCallback, ProgressUpdate, RunHandle, RunOptions, RunResult};

/// Knobs the orchestrator takes from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorSettings {
    /// Tasks per batch.
    pub batch_size: usize,
    /// Items requested per catalog page.
    pub page_size: u32,
    /// Skip items whose destination already exists.
    pub skip_existing: bool,
    /// Skip items the tracker already holds.
    pub check_tracker: bool,
    /// Policy for occupied destinations.
    pub collision: CollisionPolicy,
    /// Also queue companion assets of each group.
    pub include_companions: bool,
    /// Run summaries kept in the tracker.
    pub session_retention: usize,
    /// Worker pool and retry settings; the retry schedule also governs
    /// transient catalog failures.
    pub executor: ExecutorConfig,
}

impl OrchestratorSettings {
    /// Settings from a loaded configuration document.
    #[must_use]
    pub const fn from_config(config: &AppConfig) -> Self {
        Self {
            batch_size: config.download.batch_size,
            page_size: config.catalog.page_size,
            skip_existing: config.download.skip_existing,
            check_tracker: config.download.check_tracker,
            collision: config.download.collision,
            include_companions: config.download.include_companions,
            session_retention: config.tracking.session_retention,
            executor: ExecutorConfig::from_config(&config.download),
        }
    }

    fn validate(self) -> AppResult<Self> {
        if self.batch_size == 0 {
            return Err(AppError::InvalidConfig {
                field: "batch_size",
                reason: "must be positive",
                value: Some(self.batch_size.to_string()),
            });
        }
        if self.page_size == 0 {
            return Err(AppError::InvalidConfig {
                field: "page_size",
                reason: "must be positive",
                value: Some(self.page_size.to_string()),
            });
        }
        self.executor
            .validate()
            .map_err(|err| AppError::executor("orchestrator.settings", err))?;
        Ok(self)
    }
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// Collaborators wired into an orchestrator.
pub struct OrchestratorDeps {
    /// Paginated catalog.
    pub catalog: Arc<dyn CatalogSource>,
    /// Payload fetcher used by the executor.
    pub fetcher: Arc<dyn Fetcher>,
    /// Limiter shared by every run.
    pub limiter: Arc<RateLimiter>,
    /// Destination layout.
    pub organizer: Arc<PathOrganizer>,
    /// Ledger of transferred items.
    pub tracker: Arc<TrackerStore>,
}

/// Drives runs from catalog pages to tracked files.
#[derive(Clone)]
pub struct BatchOrchestrator {
    catalog: Arc<dyn CatalogSource>,
    fetcher: Arc<dyn Fetcher>,
    limiter: Arc<RateLimiter>,
    organizer: Arc<PathOrganizer>,
    tracker: Arc<TrackerStore>,
    settings: OrchestratorSettings,
    expiry: Arc<dyn ExpiryDetector>,
    events: Option<EventBus>,
    metrics: Option<Metrics>,
}

impl fmt::Debug for BatchOrchestrator {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("BatchOrchestrator")
            .field("settings", &self.settings)
            .field("expiry", &self.expiry)
            .field("tracker", &self.tracker.path())
            .finish_non_exhaustive()
    }
}

/// Why a run stopped before exhausting its work.
#[derive(Debug)]
enum Halt {
    Cancelled,
    AuthExpired,
    Failed(String),
}

/// What a run iterates over.
#[derive(Debug)]
enum RunPlan {
    Scan(FilterSpec),
    RetryFailed,
}

impl BatchOrchestrator {
    /// Build an orchestrator.
    ///
    /// # Errors
    ///
    /// Returns an error when `settings` are out of range.
    pub fn new(deps: OrchestratorDeps, settings: OrchestratorSettings) -> AppResult<Self> {
        Ok(Self {
            catalog: deps.catalog,
            fetcher: deps.fetcher,
            limiter: deps.limiter,
            organizer: deps.organizer,
            tracker: deps.tracker,
            settings: settings.validate()?,
            expiry: Arc::new(TotalCountDrop),
            events: None,
            metrics: None,
        })
    }

    /// Publish run progress on `events`.
    #[must_use]
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Record batches, tracker saves, and transfer outcomes in `metrics`.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Replace the silent-expiry heuristic.
    #[must_use]
    pub fn with_expiry_detector(mut self, detector: Arc<dyn ExpiryDetector>) -> Self {
        self.expiry = detector;
        self
    }

    /// Active settings.
    #[must_use]
    pub const fn settings(&self) -> OrchestratorSettings {
        self.settings
    }

    /// Ledger shared with the runs.
    #[must_use]
    pub const fn tracker(&self) -> &Arc<TrackerStore> {
        &self.tracker
    }

    /// Start a catalog scan in the background.
    ///
    /// # Errors
    ///
    /// Returns an error when `filter` is invalid; nothing is fetched or
    /// transferred in that case.
    pub fn start_run(&self, filter: FilterSpec, options: RunOptions) -> AppResult<RunHandle> {
        self.start_run_with_progress(filter, options, Box::new(|_| {}))
    }

    /// Like [`BatchOrchestrator::start_run`], reporting progress to
    /// `progress` after every terminal task outcome.
    ///
    /// # Errors
    ///
    /// Same as [`BatchOrchestrator::start_run`].
    pub fn start_run_with_progress(
        &self,
        filter: FilterSpec,
        options: RunOptions,
        progress: ProgressCallback,
    ) -> AppResult<RunHandle> {
        let filter = filter
            .validate()
            .map_err(|source| AppError::Filter { source })?;
        self.spawn(RunPlan::Scan(filter), options, progress)
    }

    /// Retry the failures persisted by earlier runs without scanning the
    /// catalog.
    ///
    /// # Errors
    ///
    /// Returns an error when the executor cannot be assembled.
    pub fn resume_failed(&self, options: RunOptions) -> AppResult<RunHandle> {
        self.resume_failed_with_progress(options, Box::new(|_| {}))
    }

    /// Like [`BatchOrchestrator::resume_failed`], reporting progress.
    ///
    /// # Errors
    ///
    /// Same as [`BatchOrchestrator::resume_failed`].
    pub fn resume_failed_with_progress(
        &self,
        options: RunOptions,
        progress: ProgressCallback,
    ) -> AppResult<RunHandle> {
        self.spawn(RunPlan::RetryFailed, options, progress)
    }

    fn spawn(
        &self,
        plan: RunPlan,
        options: RunOptions,
        progress: ProgressCallback,
    ) -> AppResult<RunHandle> {
        let control = ControlFlags::new();
        let mut executor = TransferExecutor::new(
            Arc::clone(&self.fetcher),
            Arc::clone(&self.limiter),
            self.settings.executor,
            control.clone(),
        )
        .map_err(|err| AppError::executor("executor.new", err))?;
        if let Some(metrics) = &self.metrics {
            executor = executor.with_metrics(metrics.clone());
        }

        let run_id = Uuid::new_v4();
        let run = RunState::new(run_id, options, control.clone(), progress);
        let orchestrator = self.clone();
        let span = info_span!("run", run_id = %run_id);
        let task = tokio::spawn(
            async move { orchestrator.drive(plan, run, executor).await }.instrument(span),
        );
        Ok(RunHandle::new(run_id, control, task))
    }

    async fn drive(self, plan: RunPlan, mut run: RunState, executor: TransferExecutor) -> RunResult {
        info!(
            dry_run = run.options.dry_run,
            force = run.options.force_redownload,
            max_items = ?run.options.max_items,
            max_scan = ?run.options.max_scan,
            start_position = run.options.start_position,
            "run started"
        );
        self.publish(Event::RunStarted {
            run_id: run.run_id,
            dry_run: run.options.dry_run,
        });

        let outcome = match &plan {
            RunPlan::Scan(filter) => self.scan(filter, &mut run, &executor).await,
            RunPlan::RetryFailed => self.retry_failed(&mut run, &executor).await,
        };
        self.finish(run, outcome).await
    }

    async fn finish(&self, mut run: RunState, outcome: Result<(), Halt>) -> RunResult {
        let leftover = std::mem::take(&mut run.pending);
        run.abandon(leftover);

        let (status, error) = match outcome {
            Ok(()) if run.control.is_cancelled() => (RunStatus::Cancelled, None),
            Ok(()) => (RunStatus::Completed, None),
            Err(Halt::Cancelled) => (RunStatus::Cancelled, None),
            Err(Halt::AuthExpired) => {
                warn!("catalog session expired; re-authentication required");
                (
                    RunStatus::AuthHalted,
                    Some("catalog session expired; re-authentication required".to_string()),
                )
            }
            Err(Halt::Failed(detail)) => (RunStatus::Failed, Some(detail)),
        };

        if !run.options.dry_run {
            self.tracker.append_session(SessionRecord {
                run_id: run.run_id,
                started_at: run.started_at,
                finished_at: Utc::now(),
                status,
                dry_run: false,
                stats: run.stats.clone(),
            });
            self.tracker.trim_sessions(self.settings.session_retention);
            self.persist(&mut run).await;
        }

        let stats = &run.stats;
        info!(
            status = status.as_str(),
            discovered = stats.discovered,
            already_tracked = stats.already_tracked,
            exists_on_disk = stats.exists_on_disk,
            filtered_out = stats.filtered_out,
            queued = stats.queued,
            transferred = stats.transferred,
            failed = stats.failed,
            cancelled = stats.cancelled,
            total_bytes = stats.total_bytes,
            "run finished"
        );
        self.publish(Event::RunFinished {
            run_id: run.run_id,
            status,
        });

        RunResult {
            run_id: run.run_id,
            status,
            stats: run.stats,
            error,
            failed: run.failed,
            planned: run.planned,
            persistence_error: run.persistence_error,
        }
    }

    fn publish(&self, event: Event) {
        if let Some(events) = &self.events {
            events.publish(event);
        }
    }
}
