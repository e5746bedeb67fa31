//! Plain values exchanged between the catalog, the executor, and the tracker.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TransferErrorKind;

/// One remote media entry, extracted from the catalog response on receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    /// Primary identifier; unique across the account.
    pub item_id: String,
    /// Secondary identifier reported by the catalog (customer image id).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_id: Option<String>,
    /// Free-text display title.
    pub title: String,
    /// Download location of the payload.
    pub source_url: String,
    /// Declared media kind (`png`, `jpg`, `fits`, ...).
    pub media_kind: String,
    /// Owning mission/group identifier; 0 when the item belongs to none.
    pub group_id: u64,
    /// Capture timestamp when the catalog reported one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<DateTime<Utc>>,
    /// Name of the device (telescope) that produced the item.
    pub device_name: String,
    /// Instrument on the device, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instrument: Option<String>,
    /// Zero-based position in the catalog ordering.
    pub position: u64,
}

/// Request for one page of catalog items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// Zero-based offset of the first item.
    pub offset: u64,
    /// Maximum number of items to return.
    pub limit: u32,
    /// Group scope; 0 means the whole catalog.
    pub group_id: u64,
}

/// One page of catalog items plus the catalog's total-count signal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogPage {
    /// Items in catalog order.
    pub items: Vec<CatalogItem>,
    /// Total number of items in scope, as reported by the catalog.
    pub total_count: u64,
    /// Raw entries the catalog returned, including ones that could not be
    /// converted into items. The next page starts this far past the request
    /// offset.
    pub entries: u64,
}

/// What to do when the destination path is already occupied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// Leave the existing file alone and skip the item.
    #[default]
    Skip,
    /// Replace the existing file.
    Overwrite,
    /// Write next to the existing file under a numbered name.
    Rename,
}

/// Concrete instruction to copy one catalog item to one local path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferTask {
    /// Originating catalog metadata, kept for tracker persistence.
    pub item: CatalogItem,
    /// Resolved destination path.
    pub destination: PathBuf,
    /// Attempts made so far.
    pub attempts: u32,
    /// Whether an existing file at `destination` may be replaced.
    pub overwrite: bool,
}

impl TransferTask {
    /// Build a fresh task with no attempts recorded.
    #[must_use]
    pub const fn new(item: CatalogItem, destination: PathBuf, overwrite: bool) -> Self {
        Self {
            item,
            destination,
            attempts: 0,
            overwrite,
        }
    }

    /// Identifier of the originating item.
    #[must_use]
    pub fn item_id(&self) -> &str {
        &self.item.item_id
    }

    /// Source URL of the payload.
    #[must_use]
    pub fn source_url(&self) -> &str {
        &self.item.source_url
    }
}

/// Why an item or task was not transferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The tracker already holds a record for the item.
    AlreadyTracked,
    /// The destination already exists on disk.
    ExistsOnDisk,
}

impl SkipReason {
    /// Stable label for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AlreadyTracked => "already tracked",
            Self::ExistsOnDisk => "exists on disk",
        }
    }
}

/// Terminal outcome of one transfer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// The payload was written in full.
    Succeeded {
        /// Bytes written to the destination.
        bytes: u64,
        /// Wall time spent on the successful attempt.
        elapsed: Duration,
    },
    /// The task gave up.
    Failed {
        /// Kind of the final error.
        kind: TransferErrorKind,
        /// Attempts made, including the last one.
        attempts: u32,
        /// Diagnostic detail of the final error.
        message: String,
    },
    /// The task was not attempted.
    Skipped {
        /// Why the task was skipped.
        reason: SkipReason,
    },
}

impl TransferOutcome {
    /// Cancellation is reported as a failure of kind `Cancelled`.
    #[must_use]
    pub const fn cancelled(attempts: u32) -> Self {
        Self::Failed {
            kind: TransferErrorKind::Cancelled,
            attempts,
            message: String::new(),
        }
    }

    /// Short label for logs and metrics.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Succeeded { .. } => "succeeded",
            Self::Failed {
                kind: TransferErrorKind::Cancelled,
                ..
            } => "cancelled",
            Self::Failed { .. } => "failed",
            Self::Skipped { .. } => "skipped",
        }
    }
}

/// A task handed back by the executor together with its outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferResult {
    /// The task, returned to the orchestrator by ownership.
    pub task: TransferTask,
    /// Terminal outcome.
    pub outcome: TransferOutcome,
}

/// Failed transfer kept for diagnostics and a later retry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedTransfer {
    /// Originating catalog metadata.
    pub item: CatalogItem,
    /// Destination the task targeted.
    pub destination: PathBuf,
    /// Kind of the final error.
    pub kind: TransferErrorKind,
    /// Attempts made.
    pub attempts: u32,
    /// Diagnostic detail of the final error.
    pub message: String,
    /// When the failure was observed.
    pub failed_at: DateTime<Utc>,
}

/// Terminal status of an orchestration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// The catalog was exhausted or a limit was reached.
    Completed,
    /// Cancellation was observed.
    Cancelled,
    /// The remote session expired; re-authentication is required.
    AuthHalted,
    /// An unrecoverable error ended the run.
    Failed,
}

impl RunStatus {
    /// Stable label for logs and events.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::AuthHalted => "auth_halted",
            Self::Failed => "failed",
        }
    }
}

/// Counters for one orchestration run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionStats {
    /// Catalog items inspected.
    pub discovered: u64,
    /// Items skipped because the tracker already held them.
    pub already_tracked: u64,
    /// Items skipped because their destination already existed.
    pub exists_on_disk: u64,
    /// Items rejected by the filter.
    pub filtered_out: u64,
    /// Catalog items left uninspected because a limit stopped the scan.
    pub limit_skipped: u64,
    /// Transfer tasks queued (or, in a dry run, that would have been queued).
    pub queued: u64,
    /// Tasks that completed successfully.
    pub transferred: u64,
    /// Tasks skipped by the executor.
    pub skipped: u64,
    /// Tasks that failed for a reason other than cancellation.
    pub failed: u64,
    /// Tasks abandoned because the run was cancelled.
    pub cancelled: u64,
    /// Bytes written by successful tasks.
    pub total_bytes: u64,
    /// One-based index of the batch in progress; 0 before the first batch.
    pub current_batch: u64,
    /// Tracker saves that failed during the run.
    pub persistence_failures: u64,
}

impl SessionStats {
    /// Fold one terminal outcome into the counters.
    pub const fn fold(&mut self, outcome: &TransferOutcome) {
        match outcome {
            TransferOutcome::Succeeded { bytes, .. } => {
                self.transferred += 1;
                self.total_bytes += *bytes;
            }
            TransferOutcome::Failed {
                kind: TransferErrorKind::Cancelled,
                ..
            } => self.cancelled += 1,
            TransferOutcome::Failed { .. } => self.failed += 1,
            TransferOutcome::Skipped { .. } => self.skipped += 1,
        }
    }

    /// Number of terminal outcomes folded so far.
    #[must_use]
    pub const fn completed(&self) -> u64 {
        self.transferred + self.failed + self.cancelled + self.skipped
    }
}
