//! Verification, orphan scans, and pruning of the ledger.
//!
//! Filesystem checks run on a snapshot of the index taken under the lock, so
//! the lock is never held while walking the disk.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{TrackerError, TrackerResult};
use crate::model::VerificationReport;
use crate::store::TrackerStore;

/// Extensions treated as media when scanning for orphans.
const MEDIA_EXTENSIONS: [&str; 8] = ["fits", "fit", "fts", "png", "jpg", "jpeg", "tif", "tiff"];

impl TrackerStore {
    /// Check every record's path. Read-only.
    #[must_use]
    pub fn verify(&self) -> VerificationReport {
        let mut report = VerificationReport::default();
        for record in self.records() {
            match fs::metadata(&record.path) {
                Ok(meta) if meta.is_file() => report.valid += 1,
                Ok(_) => {
                    warn!(item_id = %record.item_id, path = %record.path.display(), "tracked path is not a regular file");
                    report.errored += 1;
                }
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    report.missing += 1;
                    report.missing_records.push(record);
                }
                Err(err) => {
                    warn!(error = %err, item_id = %record.item_id, "failed to inspect tracked path");
                    report.errored += 1;
                }
            }
        }
        info!(
            valid = report.valid,
            missing = report.missing,
            errored = report.errored,
            "tracker verified"
        );
        report
    }

    /// Media files under `base` that no record points at. Read-only.
    ///
    /// # Errors
    ///
    /// Returns an error when `base` cannot be traversed.
    pub fn find_orphans(&self, base: &Path) -> TrackerResult<Vec<PathBuf>> {
        let tracked: HashSet<PathBuf> = self
            .lock()
            .records
            .values()
            .map(|record| record.path.clone())
            .collect();

        let mut orphans = Vec::new();
        for entry in WalkDir::new(base).follow_links(false).sort_by_file_name() {
            let entry = entry.map_err(|source| TrackerError::Walkdir {
                operation: "tracker.find_orphans",
                path: base.to_path_buf(),
                source,
            })?;
            if !entry.file_type().is_file() || !is_media(entry.path()) {
                continue;
            }
            if !tracked.contains(entry.path()) {
                orphans.push(entry.into_path());
            }
        }
        debug!(base = %base.display(), orphans = orphans.len(), "orphan scan finished");
        Ok(orphans)
    }

    /// Drop records whose file is missing and save once. Returns how many
    /// records were removed.
    ///
    /// # Errors
    ///
    /// Returns an error when the pruned index cannot be saved; the records are
    /// removed from memory regardless.
    pub fn prune_missing(&self) -> TrackerResult<usize> {
        let report = self.verify();
        if report.missing_records.is_empty() {
            return Ok(0);
        }

        let mut state = self.lock();
        let mut removed = 0;
        for record in &report.missing_records {
            // A record replaced since the snapshot may point at a new file.
            if state
                .records
                .get(&record.item_id)
                .is_some_and(|current| current.path == record.path)
            {
                state.records.remove(&record.item_id);
                removed += 1;
            }
        }
        if removed > 0 {
            state.mark_dirty();
            self.persist_locked(&mut state)?;
        }
        drop(state);
        info!(removed, "pruned missing records");
        Ok(removed)
    }
}

fn is_media(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            MEDIA_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
}
