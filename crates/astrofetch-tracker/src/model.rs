//! Records, session summaries, and reports kept by the tracker.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use astrofetch_core::{CatalogItem, FailedTransfer, RunStatus, SessionStats};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Durable fact that an item was saved to a path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerRecord {
    /// Catalog item identifier; unique key.
    pub item_id: String,
    /// Where the payload was written.
    pub path: PathBuf,
    /// When the transfer completed.
    pub saved_at: DateTime<Utc>,
    /// Bytes written.
    pub size_bytes: u64,
    /// Display title at transfer time.
    pub title: String,
    /// Device that produced the item.
    pub device_name: String,
    /// Declared media kind.
    pub media_kind: String,
    /// Owning group identifier.
    #[serde(default)]
    pub group_id: u64,
    /// Capture timestamp, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<DateTime<Utc>>,
    /// Object name derived from the title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<String>,
    /// Insertion sequence; orders exports.
    #[serde(default)]
    pub sequence: u64,
}

impl TrackerRecord {
    /// Record for a completed transfer of `item`.
    #[must_use]
    pub fn for_item(
        item: &CatalogItem,
        path: PathBuf,
        size_bytes: u64,
        object: Option<String>,
    ) -> Self {
        Self {
            item_id: item.item_id.clone(),
            path,
            saved_at: Utc::now(),
            size_bytes,
            title: item.title.clone(),
            device_name: item.device_name.clone(),
            media_kind: item.media_kind.clone(),
            group_id: item.group_id,
            captured_at: item.captured_at,
            object,
            sequence: 0,
        }
    }
}

/// Summary of one finished run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Run identifier.
    pub run_id: Uuid,
    /// When the run began.
    pub started_at: DateTime<Utc>,
    /// When the run reached its terminal status.
    pub finished_at: DateTime<Utc>,
    /// Terminal status.
    pub status: RunStatus,
    /// Whether transfers were suppressed.
    #[serde(default)]
    pub dry_run: bool,
    /// Final counters.
    pub stats: SessionStats,
}

/// Outcome of checking every record against the filesystem.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerificationReport {
    /// Records whose path names a regular file.
    pub valid: usize,
    /// Records whose path no longer exists.
    pub missing: usize,
    /// Records whose path could not be inspected or is not a regular file.
    pub errored: usize,
    /// The missing records, in export order.
    pub missing_records: Vec<TrackerRecord>,
}

/// Aggregate view of the ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TrackerSummary {
    /// Tracked items.
    pub total_records: usize,
    /// Bytes across tracked items.
    pub total_bytes: u64,
    /// Item counts per media kind.
    pub by_media_kind: BTreeMap<String, usize>,
    /// Item counts per device.
    pub by_device: BTreeMap<String, usize>,
    /// Item counts per object.
    pub by_object: BTreeMap<String, usize>,
    /// Most recent transfer time.
    pub last_saved_at: Option<DateTime<Utc>>,
    /// Stored session summaries.
    pub sessions: usize,
    /// Persisted failures awaiting a retry.
    pub pending_failures: usize,
}

/// On-disk document layout, as read back.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct TrackerDocument {
    pub(crate) version: u32,
    pub(crate) created_at: Option<DateTime<Utc>>,
    pub(crate) records: HashMap<String, TrackerRecord>,
    pub(crate) sessions: Vec<SessionRecord>,
    pub(crate) failed: BTreeMap<String, FailedTransfer>,
}

/// On-disk document layout, as written; borrows the live index.
#[derive(Debug, Serialize)]
pub(crate) struct TrackerDocumentRef<'a> {
    pub(crate) version: u32,
    pub(crate) created_at: Option<DateTime<Utc>>,
    pub(crate) saved_at: DateTime<Utc>,
    pub(crate) records: BTreeMap<&'a str, &'a TrackerRecord>,
    pub(crate) sessions: &'a [SessionRecord],
    pub(crate) failed: &'a BTreeMap<String, FailedTransfer>,
}
