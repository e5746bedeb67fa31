//! # Design
//!
//! - Per-task failures are `astrofetch_core::TransferError` values folded into
//!   outcomes; this type only covers building the executor and its fetcher.
//! - Constant messages; offending values travel as fields.

use thiserror::Error;

/// Result type for executor construction.
pub type ExecutorResult<T> = Result<T, ExecutorError>;

/// Errors raised while assembling the transfer stack.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// A numeric setting is out of range.
    #[error("invalid executor setting")]
    InvalidSetting {
        /// Setting that failed validation.
        field: &'static str,
        /// Static reason for the failure.
        reason: &'static str,
        /// Offending value.
        value: String,
    },
    /// The HTTP client could not be built.
    #[error("http client build failed")]
    HttpClient {
        /// Underlying reqwest error.
        source: reqwest::Error,
    },
}

impl ExecutorError {
    pub(crate) fn setting(field: &'static str, reason: &'static str, value: impl ToString) -> Self {
        Self::InvalidSetting {
            field,
            reason,
            value: value.to_string(),
        }
    }
}
