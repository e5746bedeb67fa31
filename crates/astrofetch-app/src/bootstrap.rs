//! Service wiring from a loaded configuration.

use std::path::Path;
use std::sync::Arc;

use astrofetch_config::{AppConfig, ConfigLoader, LoggingSettings, TrackingConfig};
use astrofetch_core::{CatalogSource, Fetcher};
use astrofetch_events::EventBus;
use astrofetch_fsops::PathOrganizer;
use astrofetch_telemetry::{LogFormat, LoggingConfig, Metrics, build_sha};
use astrofetch_tracker::{TrackerOptions, TrackerStore};
use astrofetch_transfer::{HttpFetcher, RateLimiter};
use tracing::info;

use crate::catalog::HttpCatalog;
use crate::error::{AppError, AppResult};
use crate::orchestrator::{BatchOrchestrator, OrchestratorDeps, OrchestratorSettings};

/// Load and validate the configuration document at `path`.
///
/// # Errors
///
/// Returns an error when the document cannot be read, parsed, or validated.
pub fn load_config(path: &Path) -> AppResult<AppConfig> {
    ConfigLoader::new(path)
        .load()
        .map_err(|err| AppError::config("config.load", err))
}

/// Install the global subscriber described by `settings`.
///
/// # Errors
///
/// Returns an error when a subscriber is already installed.
pub fn init_logging(settings: &LoggingSettings) -> AppResult<()> {
    let logging = LoggingConfig {
        level: &settings.level,
        format: LogFormat::from_setting(settings.format.as_deref()),
        build_sha: build_sha(),
    };
    astrofetch_telemetry::init_logging(&logging)
        .map_err(|err| AppError::telemetry("telemetry.init", err))
}

/// Open the ledger described by `tracking`.
///
/// # Errors
///
/// Returns an error when an existing document and all of its backups are
/// unreadable.
pub fn open_tracker(tracking: &TrackingConfig) -> AppResult<TrackerStore> {
    TrackerStore::open(
        &tracking.tracker_file,
        TrackerOptions {
            backup_on_save: tracking.backup_on_save,
            backup_retention: tracking.backup_retention,
        },
    )
    .map_err(|err| AppError::tracker("tracker.open", err))
}

/// Everything a front end needs to start and inspect runs.
#[derive(Debug, Clone)]
pub struct Services {
    /// Configuration the services were built from.
    pub config: AppConfig,
    /// Run driver.
    pub orchestrator: BatchOrchestrator,
    /// Shared ledger.
    pub tracker: Arc<TrackerStore>,
    /// Progress events.
    pub events: EventBus,
    /// Transfer counters.
    pub metrics: Metrics,
}

impl Services {
    /// Wire HTTP adapters and local stores from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error when an HTTP client, the path organizer, the tracker,
    /// or the orchestrator cannot be built.
    pub fn from_config(config: AppConfig) -> AppResult<Self> {
        let catalog = HttpCatalog::from_config(&config.catalog)?;
        let fetcher =
            HttpFetcher::new().map_err(|err| AppError::executor("fetcher.new", err))?;
        Self::with_collaborators(config, Arc::new(catalog), Arc::new(fetcher))
    }

    /// Wire local stores around the given catalog and fetcher.
    ///
    /// # Errors
    ///
    /// Same as [`Services::from_config`], minus the HTTP clients.
    pub fn with_collaborators(
        config: AppConfig,
        catalog: Arc<dyn CatalogSource>,
        fetcher: Arc<dyn Fetcher>,
    ) -> AppResult<Self> {
        let metrics = Metrics::new().map_err(|err| AppError::telemetry("metrics.new", err))?;
        let events = EventBus::new();
        let organizer = PathOrganizer::from_config(&config.folders)
            .map_err(|err| AppError::fsops("organizer.new", err))?;
        let tracker = Arc::new(open_tracker(&config.tracking)?);
        let limiter = RateLimiter::from_config(&config.download).with_metrics(metrics.clone());

        let orchestrator = BatchOrchestrator::new(
            OrchestratorDeps {
                catalog,
                fetcher,
                limiter: Arc::new(limiter),
                organizer: Arc::new(organizer),
                tracker: Arc::clone(&tracker),
            },
            OrchestratorSettings::from_config(&config),
        )?
        .with_events(events.clone())
        .with_metrics(metrics.clone());

        info!(
            base = %config.folders.base_path.display(),
            tracker = %tracker.path().display(),
            records = tracker.len(),
            "services ready"
        );
        Ok(Self {
            config,
            orchestrator,
            tracker,
            events,
            metrics,
        })
    }
}
