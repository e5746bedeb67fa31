//! Document encoding, timestamped backups, and atomic replacement.
//!
//! # Design
//! - The previous document is copied to a timestamped backup before the new
//!   one is written, so the only surviving copy is never a torn write.
//! - The new document is written to a sibling temp file, synced, and renamed
//!   over the old one.
//! - Loading falls back to the newest readable backup when the primary
//!   document is unreadable.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::warn;

use crate::error::{TrackerError, TrackerResult};
use crate::model::TrackerDocument;

pub(crate) const DOCUMENT_VERSION: u32 = 1;
const BACKUP_SUFFIX: &str = ".bak";
const TEMP_SUFFIX: &str = ".tmp";

/// Load the document at `path`, or the newest readable backup.
///
/// Returns `None` when neither the document nor any backup exists.
pub(crate) fn load_document(path: &Path) -> TrackerResult<Option<TrackerDocument>> {
    let primary = if path.exists() {
        match read_document(path) {
            Ok(document) => return Ok(Some(document)),
            Err(err) => Some(err),
        }
    } else {
        None
    };

    for backup in list_backups(path)?.iter().rev() {
        match read_document(backup) {
            Ok(document) => {
                warn!(
                    path = %path.display(),
                    backup = %backup.display(),
                    "tracker document unreadable; loaded newest backup"
                );
                return Ok(Some(document));
            }
            Err(err) => {
                warn!(error = %err, backup = %backup.display(), "skipping unreadable tracker backup");
            }
        }
    }

    primary.map_or(Ok(None), Err)
}

fn read_document(path: &Path) -> TrackerResult<TrackerDocument> {
    let raw = fs::read(path).map_err(|source| TrackerError::io("tracker.read", path, source))?;
    serde_json::from_slice(&raw).map_err(|source| TrackerError::json("tracker.decode", path, source))
}

/// Copy the current document to a timestamped backup, if it exists.
pub(crate) fn backup_existing(path: &Path) -> TrackerResult<Option<PathBuf>> {
    if !path.is_file() {
        return Ok(None);
    }
    let stamp = Utc::now().format("%Y%m%dT%H%M%S%.6fZ");
    let backup = sibling(path, &format!(".{stamp}{BACKUP_SUFFIX}"));
    fs::copy(path, &backup).map_err(|source| TrackerError::io("tracker.backup", &backup, source))?;
    Ok(Some(backup))
}

/// Replace `path` with `bytes` via a synced temp file and a rename.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> TrackerResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .map_err(|source| TrackerError::io("tracker.create_dir", parent, source))?;
    }

    let temp = sibling(path, TEMP_SUFFIX);
    let mut file =
        File::create(&temp).map_err(|source| TrackerError::io("tracker.create_temp", &temp, source))?;
    file.write_all(bytes)
        .map_err(|source| TrackerError::io("tracker.write_temp", &temp, source))?;
    file.sync_all()
        .map_err(|source| TrackerError::io("tracker.sync_temp", &temp, source))?;
    drop(file);

    fs::rename(&temp, path).map_err(|source| TrackerError::io("tracker.replace", path, source))
}

/// Backups of `path`, oldest first.
pub(crate) fn list_backups(path: &Path) -> TrackerResult<Vec<PathBuf>> {
    let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
        return Ok(Vec::new());
    };
    let prefix = format!("{file_name}.");
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let entries =
        fs::read_dir(dir).map_err(|source| TrackerError::io("tracker.list_backups", dir, source))?;
    let mut backups: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|candidate| {
            candidate
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(&prefix) && name.ends_with(BACKUP_SUFFIX))
        })
        .collect();
    // Timestamps are fixed-width, so name order is age order.
    backups.sort();
    Ok(backups)
}

/// Delete all but the newest `keep` backups. Returns how many were removed.
pub(crate) fn prune_backups(path: &Path, keep: usize) -> TrackerResult<usize> {
    let backups = list_backups(path)?;
    let excess = backups.len().saturating_sub(keep);
    for stale in &backups[..excess] {
        fs::remove_file(stale)
            .map_err(|source| TrackerError::io("tracker.prune_backup", stale, source))?;
    }
    Ok(excess)
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(ToOwned::to_owned).unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn write_atomic_leaves_no_temp_file() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("nested").join("tracker.json");
        write_atomic(&path, b"{}")?;
        assert_eq!(fs::read_to_string(&path)?, "{}");
        assert!(!sibling(&path, TEMP_SUFFIX).exists());
        Ok(())
    }

    #[test]
    fn prune_keeps_newest_backups() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("tracker.json");
        for stamp in ["20240101T000000.000001Z", "20240101T000000.000002Z", "20240101T000000.000003Z"] {
            fs::write(sibling(&path, &format!(".{stamp}.bak")), "{}")?;
        }
        fs::write(dir.path().join("unrelated.json.20240101T000000.000001Z.bak"), "{}")?;

        assert_eq!(prune_backups(&path, 2)?, 1);
        let remaining = list_backups(&path)?;
        assert_eq!(remaining.len(), 2);
        assert!(
            remaining[0]
                .to_string_lossy()
                .ends_with("tracker.json.20240101T000000.000002Z.bak")
        );
        Ok(())
    }

    #[test]
    fn missing_document_and_backups_load_as_none() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        assert!(load_document(&dir.path().join("absent.json"))?.is_none());
        Ok(())
    }

    #[test]
    fn corrupt_document_without_backup_is_an_error() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("tracker.json");
        fs::write(&path, "{ torn")?;
        assert!(matches!(
            load_document(&path),
            Err(TrackerError::Json {
                operation: "tracker.decode",
                ..
            })
        ));
        Ok(())
    }
}
