//! Admission of catalog items as tasks, and folding of task results into
//! the run and the tracker.

use std::path::Path;
use std::sync::Arc;

use astrofetch_core::{
    CatalogItem, CollisionPolicy, FailedTransfer, TransferErrorKind, TransferOutcome,
    TransferResult, TransferTask,
};
use astrofetch_events::Event;
use astrofetch_fsops::CollisionResolution;
use astrofetch_tracker::TrackerRecord;
use chrono::Utc;
use tracing::{debug, warn};

use super::BatchOrchestrator;
use super::state::RunState;
use crate::error::error_chain;

impl BatchOrchestrator {
    /// Dedup `item` against the tracker, the disk, and this run's claims;
    /// queue a task when it survives.
    pub(super) fn queue(&self, run: &mut RunState, item: CatalogItem) {
        let force = run.options.force_redownload;

        if !run.queued_ids.insert(item.item_id.clone()) {
            debug!(item_id = %item.item_id, "already seen in this run");
            return;
        }
        if !force && self.settings.check_tracker && self.tracker.has(&item.item_id) {
            run.stats.already_tracked += 1;
            debug!(item_id = %item.item_id, "skipping; already tracked");
            self.forget_failure(run, &item.item_id);
            return;
        }

        let destination = self.organizer.destination_for(&item);
        if !force && self.settings.skip_existing && destination.exists() {
            run.stats.exists_on_disk += 1;
            debug!(
                item_id = %item.item_id,
                destination = %destination.display(),
                "skipping; exists on disk"
            );
            self.forget_failure(run, &item.item_id);
            return;
        }

        let policy = match self.settings.collision {
            CollisionPolicy::Skip if force => CollisionPolicy::Overwrite,
            policy => policy,
        };
        let claimed = &run.claimed;
        let is_taken = |path: &Path| claimed.contains(path) || path.exists();
        let resolution = match self.organizer.resolve_collision(&destination, policy, is_taken) {
            // Never let two tasks of one run write the same file.
            CollisionResolution::Overwrite if claimed.contains(&destination) => self
                .organizer
                .resolve_collision(&destination, CollisionPolicy::Rename, is_taken),
            resolution => resolution,
        };

        let (destination, overwrite) = match resolution {
            CollisionResolution::Vacant => (destination, false),
            CollisionResolution::Overwrite => (destination, true),
            CollisionResolution::Rename(renamed) => {
                debug!(
                    item_id = %item.item_id,
                    from = %destination.display(),
                    to = %renamed.display(),
                    "destination occupied; renamed"
                );
                (renamed, false)
            }
            CollisionResolution::Skip => {
                run.stats.exists_on_disk += 1;
                debug!(
                    item_id = %item.item_id,
                    destination = %destination.display(),
                    "skipping; destination occupied"
                );
                self.forget_failure(run, &item.item_id);
                return;
            }
        };

        debug!(item_id = %item.item_id, destination = %destination.display(), "queued");
        run.claimed.insert(destination.clone());
        run.stats.queued += 1;
        run.pending.push(TransferTask::new(item, destination, overwrite));
    }

    /// A persisted failure is stale once its item is deduplicated.
    fn forget_failure(&self, run: &RunState, item_id: &str) {
        if !run.options.dry_run && self.tracker.clear_failure(item_id) {
            debug!(item_id, "stale failure cleared");
        }
    }

    /// Fold one terminal result into the run and the tracker.
    pub(super) fn reconcile(&self, run: &mut RunState, result: TransferResult) {
        let TransferResult { task, outcome } = result;
        run.stats.fold(&outcome);

        match outcome {
            TransferOutcome::Succeeded { bytes, elapsed } => {
                debug!(
                    item_id = %task.item_id(),
                    bytes,
                    elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                    "transfer recorded"
                );
                self.publish(Event::ItemTransferred {
                    run_id: run.run_id,
                    item_id: task.item.item_id.clone(),
                    path: task.destination.clone(),
                    bytes,
                });
                let object = self.organizer.object_for(&task.item);
                self.tracker.record(TrackerRecord::for_item(
                    &task.item,
                    task.destination,
                    bytes,
                    object,
                ));
            }
            TransferOutcome::Failed {
                kind: TransferErrorKind::Cancelled,
                ..
            } => {
                debug!(item_id = %task.item_id(), "transfer cancelled");
            }
            TransferOutcome::Failed {
                kind,
                attempts,
                message,
            } => {
                warn!(
                    item_id = %task.item_id(),
                    kind = %kind,
                    attempts,
                    error = %message,
                    "transfer failed"
                );
                if kind == TransferErrorKind::AuthExpired {
                    run.auth_expired = true;
                }
                self.publish(Event::ItemFailed {
                    run_id: run.run_id,
                    item_id: task.item.item_id.clone(),
                    kind,
                    attempts,
                });
                let failure = FailedTransfer {
                    item: task.item,
                    destination: task.destination,
                    kind,
                    attempts,
                    message,
                    failed_at: Utc::now(),
                };
                self.tracker.record_failure(failure.clone());
                run.failed.push(failure);
            }
            TransferOutcome::Skipped { reason } => {
                debug!(item_id = %task.item_id(), reason = reason.as_str(), "transfer skipped");
            }
        }
    }

    /// Save the tracker off the async runtime. Failures are counted and kept
    /// for the result; the in-memory index stays authoritative.
    pub(super) async fn persist(&self, run: &mut RunState) {
        let tracker = Arc::clone(&self.tracker);
        let failure = match tokio::task::spawn_blocking(move || tracker.save_if_dirty()).await {
            Ok(Ok(written)) => {
                if written {
                    debug!("tracker saved");
                    if let Some(metrics) = &self.metrics {
                        metrics.inc_tracker_save("ok");
                    }
                }
                None
            }
            Ok(Err(err)) => Some(error_chain(&err)),
            Err(err) => Some(error_chain(&err)),
        };

        if let Some(detail) = failure {
            warn!(error = %detail, "tracker save failed; keeping in-memory state");
            if let Some(metrics) = &self.metrics {
                metrics.inc_tracker_save("error");
            }
            run.stats.persistence_failures += 1;
            run.persistence_error = Some(detail);
        }
    }
}
