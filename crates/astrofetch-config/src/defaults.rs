//! Default values for every configuration section.
//!
//! # Design
//! - Keep defaults in one place so the serde `default` hooks and the
//!   generated starter file cannot drift apart.

/// Catalog endpoint listing the account's pictures.
pub const PICTURES_ENDPOINT: &str = "/api/images/getMyPictures";
/// Catalog endpoint listing companion assets of a mission.
pub const COMPANIONS_ENDPOINT: &str = "/api/images/getMissionFITS";
/// Base URL of the remote catalog.
pub const CATALOG_BASE_URL: &str = "https://app.slooh.com";
/// Items requested per catalog page.
pub const PAGE_SIZE: u32 = 50;
/// Timeout for one catalog request, in seconds.
pub const CATALOG_TIMEOUT_SECS: u64 = 30;

/// Root directory for saved files.
pub const BASE_PATH: &str = "AstroImages";
/// Folder template below the base path.
pub const FOLDER_TEMPLATE: &str = "{object}/{telescope}/{format}";
/// File name template.
pub const FILENAME_TEMPLATE: &str = "{telescope}_{filename}";
/// Substitute for values that cannot be resolved.
pub const UNKNOWN_SENTINEL: &str = "Unknown";
/// Maximum length of one path segment, in characters.
pub const MAX_SEGMENT_LEN: usize = 120;

/// Tasks per batch.
pub const BATCH_SIZE: usize = 50;
/// Parallel transfer workers.
pub const WORKERS: usize = 4;
/// Transfers started per rate window; 0 disables throttling.
pub const RATE_LIMIT: u32 = 30;
/// Length of the rate window, in seconds.
pub const RATE_WINDOW_SECS: u64 = 60;
/// Timeout for one transfer attempt, in seconds.
pub const TRANSFER_TIMEOUT_SECS: u64 = 300;
/// Total attempts per task.
pub const MAX_RETRIES: u32 = 3;
/// Base delay of the exponential backoff, in seconds.
pub const RETRY_DELAY_SECS: u64 = 5;

/// Tracker document location.
pub const TRACKER_FILE: &str = "data/download_tracker.json";
/// Timestamped tracker backups to keep.
pub const BACKUP_RETENTION: usize = 5;
/// Session summaries to keep in the tracker.
pub const SESSION_RETENTION: usize = 50;

/// Default log level.
pub const LOG_LEVEL: &str = "info";
