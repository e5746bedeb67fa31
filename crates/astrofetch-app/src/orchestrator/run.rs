//! Caller-facing run types: options, progress, handle, and result.

use std::path::PathBuf;

use astrofetch_core::{ControlFlags, FailedTransfer, RunStatus, SessionStats};
use serde::Serialize;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Per-run switches layered over the configured defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Traverse and plan without transferring or touching the tracker.
    pub dry_run: bool,
    /// Ignore tracker and disk dedup; a `skip` collision policy becomes
    /// `overwrite`.
    pub force_redownload: bool,
    /// Soft cap on queued transfer tasks.
    pub max_items: Option<u64>,
    /// Soft cap on catalog items inspected.
    pub max_scan: Option<u64>,
    /// One-based catalog position to start from; 1 is the newest item.
    pub start_position: u64,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            force_redownload: false,
            max_items: None,
            max_scan: None,
            start_position: 1,
        }
    }
}

impl RunOptions {
    pub(crate) const fn start_offset(&self) -> u64 {
        self.start_position.saturating_sub(1)
    }

    pub(crate) fn limit_reached(&self, stats: &SessionStats, scanned: u64) -> bool {
        self.max_items.is_some_and(|max| stats.queued >= max)
            || self.max_scan.is_some_and(|max| scanned >= max)
    }
}

/// Snapshot handed to the progress callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressUpdate {
    /// One-based index of the batch in progress.
    pub batch_index: u64,
    /// Tasks in the batch.
    pub batch_size: usize,
    /// Tasks of the batch with a terminal outcome so far.
    pub completed_in_batch: usize,
    /// Counters for the whole run.
    pub stats: SessionStats,
}

/// Callback invoked as batches progress.
pub type ProgressCallback = Box<dyn FnMut(&ProgressUpdate) + Send>;

/// Terminal report of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunResult {
    /// Run identifier.
    pub run_id: Uuid,
    /// Terminal status.
    pub status: RunStatus,
    /// Final counters.
    pub stats: SessionStats,
    /// Run-level error that ended the run, if any.
    pub error: Option<String>,
    /// Tasks that failed for a reason other than cancellation.
    pub failed: Vec<FailedTransfer>,
    /// Dry runs only: `(item id, destination)` pairs that would be transferred.
    pub planned: Vec<(String, PathBuf)>,
    /// Last tracker save failure, if any save failed.
    pub persistence_error: Option<String>,
}

/// Control surface of a run executing in the background.
#[derive(Debug)]
pub struct RunHandle {
    run_id: Uuid,
    control: ControlFlags,
    task: JoinHandle<RunResult>,
}

impl RunHandle {
    pub(crate) const fn new(run_id: Uuid, control: ControlFlags, task: JoinHandle<RunResult>) -> Self {
        Self {
            run_id,
            control,
            task,
        }
    }

    /// Run identifier.
    #[must_use]
    pub const fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Flags shared with the run; clones stay connected.
    #[must_use]
    pub const fn control(&self) -> &ControlFlags {
        &self.control
    }

    /// Idle at the next batch boundary.
    pub fn pause(&self) {
        self.control.pause();
    }

    /// Leave the paused state.
    pub fn resume(&self) {
        self.control.resume();
    }

    /// Stop fetching pages and drain the batch in flight.
    pub fn cancel(&self) {
        self.control.cancel();
    }

    /// Whether the run has reached a terminal status.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the terminal result.
    ///
    /// # Errors
    ///
    /// Returns an error when the run task panicked or was aborted.
    pub async fn wait(self) -> AppResult<RunResult> {
        self.task.await.map_err(|source| AppError::Join {
            operation: "run.wait",
            source,
        })
    }
}
