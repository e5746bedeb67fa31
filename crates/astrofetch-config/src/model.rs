//! Typed configuration sections.
//!
//! Every section defaults field-by-field so a partial document on disk still
//! loads; missing keys take the values in `defaults.rs`.

use std::path::PathBuf;
use std::time::Duration;

use astrofetch_core::CollisionPolicy;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::defaults;

/// Complete configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Remote catalog settings.
    pub catalog: CatalogConfig,
    /// Destination layout settings.
    pub folders: FolderConfig,
    /// Transfer behaviour.
    pub download: DownloadConfig,
    /// Tracker persistence.
    pub tracking: TrackingConfig,
    /// Log output.
    pub logging: LoggingSettings,
}

/// Remote catalog settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Scheme and host of the catalog service.
    pub base_url: String,
    /// Path of the paginated pictures endpoint.
    pub pictures_endpoint: String,
    /// Path of the companion assets endpoint.
    pub companions_endpoint: String,
    /// Items requested per page.
    pub page_size: u32,
    /// Timeout for one catalog request, in seconds.
    pub request_timeout_secs: u64,
    /// Session credential fields merged into every catalog request body.
    pub credentials: Map<String, Value>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::CATALOG_BASE_URL.to_string(),
            pictures_endpoint: defaults::PICTURES_ENDPOINT.to_string(),
            companions_endpoint: defaults::COMPANIONS_ENDPOINT.to_string(),
            page_size: defaults::PAGE_SIZE,
            request_timeout_secs: defaults::CATALOG_TIMEOUT_SECS,
            credentials: Map::new(),
        }
    }
}

impl CatalogConfig {
    /// Catalog request timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Destination layout settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FolderConfig {
    /// Root directory for saved files.
    pub base_path: PathBuf,
    /// Folder template below the base path.
    pub template: String,
    /// File name template.
    pub filename_template: String,
    /// Substitute for unresolved values.
    pub unknown: String,
    /// Maximum characters per path segment.
    pub max_segment_len: usize,
}

impl Default for FolderConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from(defaults::BASE_PATH),
            template: defaults::FOLDER_TEMPLATE.to_string(),
            filename_template: defaults::FILENAME_TEMPLATE.to_string(),
            unknown: defaults::UNKNOWN_SENTINEL.to_string(),
            max_segment_len: defaults::MAX_SEGMENT_LEN,
        }
    }
}

/// Transfer behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Tasks per batch.
    pub batch_size: usize,
    /// Parallel workers.
    pub workers: usize,
    /// Transfers started per rate window; 0 disables throttling.
    pub rate_limit: u32,
    /// Rate window length, in seconds.
    pub rate_window_secs: u64,
    /// Per-attempt timeout, in seconds.
    pub timeout_secs: u64,
    /// Total attempts per task.
    pub max_retries: u32,
    /// Base backoff delay, in seconds.
    pub retry_delay_secs: u64,
    /// Skip items whose destination already exists.
    pub skip_existing: bool,
    /// Skip items the tracker already records.
    pub check_tracker: bool,
    /// Policy applied when a destination is occupied.
    pub collision: CollisionPolicy,
    /// Also fetch companion assets of each queued item's group.
    pub include_companions: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            batch_size: defaults::BATCH_SIZE,
            workers: defaults::WORKERS,
            rate_limit: defaults::RATE_LIMIT,
            rate_window_secs: defaults::RATE_WINDOW_SECS,
            timeout_secs: defaults::TRANSFER_TIMEOUT_SECS,
            max_retries: defaults::MAX_RETRIES,
            retry_delay_secs: defaults::RETRY_DELAY_SECS,
            skip_existing: true,
            check_tracker: true,
            collision: CollisionPolicy::Skip,
            include_companions: false,
        }
    }
}

impl DownloadConfig {
    /// Rate window length.
    #[must_use]
    pub const fn rate_window(&self) -> Duration {
        Duration::from_secs(self.rate_window_secs)
    }

    /// Per-attempt timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Base backoff delay.
    #[must_use]
    pub const fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

/// Tracker persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Tracker document location.
    pub tracker_file: PathBuf,
    /// Copy the previous document to a timestamped backup before each save.
    pub backup_on_save: bool,
    /// Backups to keep.
    pub backup_retention: usize,
    /// Session summaries to keep.
    pub session_retention: usize,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            tracker_file: PathBuf::from(defaults::TRACKER_FILE),
            backup_on_save: true,
            backup_retention: defaults::BACKUP_RETENTION,
            session_retention: defaults::SESSION_RETENTION,
        }
    }
}

/// Log output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Level directive used when `RUST_LOG` is unset.
    pub level: String,
    /// `pretty` or `json`; inferred from the build when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            format: None,
        }
    }
}
