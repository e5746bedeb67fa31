//! # Design
//!
//! - Constant messages; the offending field and value travel as data.
//! - Every variant is raised while building the organizer, never per item.

use thiserror::Error;

/// Result type for path organisation.
pub type FsOpsResult<T> = Result<T, FsOpsError>;

/// Errors raised while building a [`crate::PathOrganizer`].
#[derive(Debug, Error)]
pub enum FsOpsError {
    /// A folder or filename template is malformed.
    #[error("fsops invalid template")]
    InvalidTemplate {
        /// Template field that failed to parse.
        field: &'static str,
        /// Static reason for the failure.
        reason: &'static str,
        /// Offending template or placeholder.
        value: Option<String>,
    },
    /// Other organizer settings are unusable.
    #[error("fsops invalid input")]
    InvalidInput {
        /// Field that failed validation.
        field: &'static str,
        /// Static reason for the failure.
        reason: &'static str,
        /// Offending value when available.
        value: Option<String>,
    },
    /// A built-in pattern failed to compile.
    #[error("fsops regex compile failure")]
    RegexCompile {
        /// Pattern that failed to compile.
        pattern: &'static str,
        /// Underlying regex error.
        source: regex::Error,
    },
}

impl FsOpsError {
    pub(crate) fn template(field: &'static str, reason: &'static str, value: &str) -> Self {
        Self::InvalidTemplate {
            field,
            reason,
            value: Some(value.to_string()),
        }
    }
}
