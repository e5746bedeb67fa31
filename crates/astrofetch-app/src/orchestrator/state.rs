//! Mutable bookkeeping owned by one run.

use std::collections::HashSet;
use std::path::PathBuf;

use astrofetch_core::{
    ControlFlags, FailedTransfer, SessionStats, TransferOutcome, TransferTask,
};
use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use super::run::{ProgressCallback, ProgressUpdate, RunOptions};

pub(crate) struct RunState {
    pub(crate) run_id: Uuid,
    pub(crate) started_at: DateTime<Utc>,
    pub(crate) options: RunOptions,
    pub(crate) control: ControlFlags,
    pub(crate) stats: SessionStats,
    /// Catalog entries inspected, companions excluded.
    pub(crate) scanned: u64,
    /// Tasks queued but not yet handed to the executor.
    pub(crate) pending: Vec<TransferTask>,
    /// Destinations claimed by tasks of this run.
    pub(crate) claimed: HashSet<PathBuf>,
    pub(crate) queued_ids: HashSet<String>,
    pub(crate) companion_groups: HashSet<u64>,
    pub(crate) failed: Vec<FailedTransfer>,
    pub(crate) planned: Vec<(String, PathBuf)>,
    pub(crate) auth_expired: bool,
    pub(crate) persistence_error: Option<String>,
    progress: ProgressCallback,
}

impl RunState {
    pub(crate) fn new(
        run_id: Uuid,
        options: RunOptions,
        control: ControlFlags,
        progress: ProgressCallback,
    ) -> Self {
        Self {
            run_id,
            started_at: Utc::now(),
            options,
            control,
            stats: SessionStats::default(),
            scanned: 0,
            pending: Vec::new(),
            claimed: HashSet::new(),
            queued_ids: HashSet::new(),
            companion_groups: HashSet::new(),
            failed: Vec::new(),
            planned: Vec::new(),
            auth_expired: false,
            persistence_error: None,
            progress,
        }
    }

    pub(crate) fn limit_reached(&self) -> bool {
        self.options.limit_reached(&self.stats, self.scanned)
    }

    /// Record how many catalog entries a limit left uninspected.
    pub(crate) fn stop_for_limit(&mut self, total_count: u64) {
        let inspected = self.options.start_offset() + self.scanned;
        self.stats.limit_skipped = total_count.saturating_sub(inspected);
        debug!(
            queued = self.stats.queued,
            scanned = self.scanned,
            limit_skipped = self.stats.limit_skipped,
            "scan limit reached"
        );
    }

    /// Count queued tasks that will never be dispatched as cancelled.
    pub(crate) fn abandon(&mut self, tasks: Vec<TransferTask>) {
        for task in tasks {
            debug!(item_id = %task.item_id(), "queued task abandoned");
            self.stats.fold(&TransferOutcome::cancelled(task.attempts));
        }
    }

    pub(crate) fn report(&mut self, batch_index: u64, batch_size: usize, completed_in_batch: usize) {
        let update = ProgressUpdate {
            batch_index,
            batch_size,
            completed_in_batch,
            stats: self.stats.clone(),
        };
        (self.progress)(&update);
    }
}
