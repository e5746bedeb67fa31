//! # Design
//!
//! - Every tracker failure is a persistence failure from the caller's point of
//!   view; variants only differ in the source error they carry.
//! - Messages stay constant; operation and path travel as fields.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias for tracker operations.
pub type TrackerResult<T> = Result<T, TrackerError>;

/// Errors raised while loading, saving, or scanning.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// Filesystem failure.
    #[error("tracker io failure")]
    Io {
        /// Operation that failed.
        operation: &'static str,
        /// Path involved.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// The document could not be encoded or decoded.
    #[error("tracker json failure")]
    Json {
        /// Operation that failed.
        operation: &'static str,
        /// Path involved.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },
    /// Directory traversal failed.
    #[error("tracker walkdir failure")]
    Walkdir {
        /// Operation that failed.
        operation: &'static str,
        /// Root of the traversal.
        path: PathBuf,
        /// Underlying walkdir error.
        source: walkdir::Error,
    },
}

impl TrackerError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: serde_json::Error,
    ) -> Self {
        Self::Json {
            operation,
            path: path.into(),
            source,
        }
    }
}
