//! In-memory index of transferred items behind a single mutation lock.
//!
//! # Design
//! - `has` is an O(1) lookup against the index loaded at construction; it
//!   never fails.
//! - `record` mutates the index and marks it dirty; the caller decides when
//!   to persist with `save`/`save_if_dirty`.
//! - Index mutation and persistence share one lock, so at most one document
//!   write is in flight and writers never interleave.
//! - A failed save leaves the index untouched and still dirty, so the caller
//!   can keep working and retry later.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use astrofetch_core::FailedTransfer;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::error::{TrackerError, TrackerResult};
use crate::model::{SessionRecord, TrackerDocumentRef, TrackerRecord, TrackerSummary};
use crate::persist::{self, DOCUMENT_VERSION};

/// Persistence options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerOptions {
    /// Copy the previous document to a timestamped backup before each save.
    pub backup_on_save: bool,
    /// Backups to keep after each save.
    pub backup_retention: usize,
}

impl Default for TrackerOptions {
    fn default() -> Self {
        Self {
            backup_on_save: true,
            backup_retention: 5,
        }
    }
}

/// Durable ledger of transferred items and past runs.
#[derive(Debug)]
pub struct TrackerStore {
    path: PathBuf,
    options: TrackerOptions,
    state: Mutex<TrackerState>,
}

#[derive(Debug, Default)]
pub(crate) struct TrackerState {
    pub(crate) records: HashMap<String, TrackerRecord>,
    pub(crate) sessions: Vec<SessionRecord>,
    pub(crate) failed: BTreeMap<String, FailedTransfer>,
    created_at: Option<DateTime<Utc>>,
    next_sequence: u64,
    dirty: bool,
}

impl TrackerState {
    pub(crate) const fn mark_dirty(&mut self) {
        self.dirty = true;
    }
}

impl TrackerStore {
    /// Open the ledger at `path`. A missing document yields an empty ledger.
    ///
    /// # Errors
    ///
    /// Returns an error when the document exists but neither it nor any
    /// backup can be read.
    pub fn open(path: impl Into<PathBuf>, options: TrackerOptions) -> TrackerResult<Self> {
        let path = path.into();
        let state = match persist::load_document(&path)? {
            Some(document) => {
                if document.version > DOCUMENT_VERSION {
                    warn!(
                        path = %path.display(),
                        version = document.version,
                        "tracker document written by a newer version"
                    );
                }
                let next_sequence = document
                    .records
                    .values()
                    .map(|record| record.sequence + 1)
                    .max()
                    .unwrap_or(0);
                info!(
                    path = %path.display(),
                    records = document.records.len(),
                    sessions = document.sessions.len(),
                    "tracker loaded"
                );
                TrackerState {
                    records: document.records,
                    sessions: document.sessions,
                    failed: document.failed,
                    created_at: document.created_at,
                    next_sequence,
                    dirty: false,
                }
            }
            None => {
                debug!(path = %path.display(), "no tracker document; starting empty");
                TrackerState::default()
            }
        };

        Ok(Self {
            path,
            options,
            state: Mutex::new(state),
        })
    }

    /// Location of the document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            warn!("tracker lock poisoned; continuing with last state");
            PoisonError::into_inner(poisoned)
        })
    }

    /// Whether `item_id` has been recorded.
    #[must_use]
    pub fn has(&self, item_id: &str) -> bool {
        self.lock().records.contains_key(item_id)
    }

    /// Record for `item_id`, if any.
    #[must_use]
    pub fn get(&self, item_id: &str) -> Option<TrackerRecord> {
        self.lock().records.get(item_id).cloned()
    }

    /// Tracked items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    /// Whether nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().records.is_empty()
    }

    /// Whether the index holds changes not yet saved.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.lock().dirty
    }

    /// Insert or replace the record for `record.item_id` and clear any
    /// persisted failure for it. The change is durable after the next save.
    pub fn record(&self, mut record: TrackerRecord) {
        let mut state = self.lock();
        record.sequence = state.next_sequence;
        state.next_sequence += 1;
        state.failed.remove(&record.item_id);
        state.records.insert(record.item_id.clone(), record);
        state.dirty = true;
    }

    /// Records in insertion order.
    #[must_use]
    pub fn records(&self) -> Vec<TrackerRecord> {
        let mut records: Vec<_> = self.lock().records.values().cloned().collect();
        records.sort_by_key(|record| record.sequence);
        records
    }

    /// Most recent transfer time.
    #[must_use]
    pub fn last_saved_at(&self) -> Option<DateTime<Utc>> {
        self.lock().records.values().map(|record| record.saved_at).max()
    }

    /// Append a run summary.
    pub fn append_session(&self, session: SessionRecord) {
        let mut state = self.lock();
        state.sessions.push(session);
        state.dirty = true;
    }

    /// Keep only the newest `keep_last` run summaries. Returns how many were
    /// dropped.
    pub fn trim_sessions(&self, keep_last: usize) -> usize {
        let mut state = self.lock();
        let excess = state.sessions.len().saturating_sub(keep_last);
        if excess > 0 {
            state.sessions.drain(..excess);
            state.dirty = true;
        }
        excess
    }

    /// Stored run summaries, oldest first.
    #[must_use]
    pub fn sessions(&self) -> Vec<SessionRecord> {
        self.lock().sessions.clone()
    }

    /// Persist a failed transfer for a later retry.
    pub fn record_failure(&self, failure: FailedTransfer) {
        let mut state = self.lock();
        state.failed.insert(failure.item.item_id.clone(), failure);
        state.dirty = true;
    }

    /// Persisted failures, ordered by item identifier.
    #[must_use]
    pub fn failures(&self) -> Vec<FailedTransfer> {
        self.lock().failed.values().cloned().collect()
    }

    /// Forget the persisted failure for `item_id`, if any. Returns whether one
    /// was dropped.
    pub fn clear_failure(&self, item_id: &str) -> bool {
        let mut state = self.lock();
        let cleared = state.failed.remove(item_id).is_some();
        if cleared {
            state.dirty = true;
        }
        cleared
    }

    /// Forget every persisted failure. Returns how many were dropped.
    pub fn clear_failures(&self) -> usize {
        let mut state = self.lock();
        let cleared = state.failed.len();
        if cleared > 0 {
            state.failed.clear();
            state.dirty = true;
        }
        cleared
    }

    /// Aggregate counts by media kind, device, and object.
    #[must_use]
    pub fn summary(&self) -> TrackerSummary {
        let state = self.lock();
        let mut summary = TrackerSummary {
            total_records: state.records.len(),
            sessions: state.sessions.len(),
            pending_failures: state.failed.len(),
            ..TrackerSummary::default()
        };
        for record in state.records.values() {
            summary.total_bytes += record.size_bytes;
            *summary
                .by_media_kind
                .entry(record.media_kind.to_lowercase())
                .or_default() += 1;
            *summary
                .by_device
                .entry(record.device_name.clone())
                .or_default() += 1;
            if let Some(object) = &record.object {
                *summary.by_object.entry(object.clone()).or_default() += 1;
            }
            summary.last_saved_at = summary.last_saved_at.max(Some(record.saved_at));
        }
        summary
    }

    /// Write the full index to disk, backing up the previous document first.
    ///
    /// # Errors
    ///
    /// Returns an error when the backup or the new document cannot be
    /// written; the in-memory index is unaffected and stays dirty.
    pub fn save(&self) -> TrackerResult<()> {
        let mut state = self.lock();
        self.persist_locked(&mut state)
    }

    /// Save only when there are unsaved changes. Returns whether a write
    /// happened.
    ///
    /// # Errors
    ///
    /// Same as [`TrackerStore::save`].
    pub fn save_if_dirty(&self) -> TrackerResult<bool> {
        let mut state = self.lock();
        if !state.dirty {
            return Ok(false);
        }
        self.persist_locked(&mut state)?;
        Ok(true)
    }

    pub(crate) fn persist_locked(&self, state: &mut TrackerState) -> TrackerResult<()> {
        let created_at = *state.created_at.get_or_insert_with(Utc::now);
        let document = TrackerDocumentRef {
            version: DOCUMENT_VERSION,
            created_at: Some(created_at),
            saved_at: Utc::now(),
            records: state
                .records
                .iter()
                .map(|(id, record)| (id.as_str(), record))
                .collect(),
            sessions: &state.sessions,
            failed: &state.failed,
        };
        let encoded = serde_json::to_vec_pretty(&document)
            .map_err(|source| TrackerError::json("tracker.encode", &self.path, source))?;

        if self.options.backup_on_save
            && let Some(backup) = persist::backup_existing(&self.path)?
        {
            debug!(backup = %backup.display(), "tracker backup written");
        }
        persist::write_atomic(&self.path, &encoded)?;
        state.dirty = false;

        if self.options.backup_on_save {
            match persist::prune_backups(&self.path, self.options.backup_retention) {
                Ok(0) => {}
                Ok(removed) => debug!(removed, "pruned tracker backups"),
                Err(err) => warn!(error = %err, "failed to prune tracker backups"),
            }
        }
        debug!(
            path = %self.path.display(),
            records = state.records.len(),
            "tracker saved"
        );
        Ok(())
    }
}
