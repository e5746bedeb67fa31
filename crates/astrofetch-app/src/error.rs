//! # Design
//!
//! - Centralize application-level errors for bootstrap and orchestration.
//! - Keep error messages constant while carrying context fields for debugging.
//! - Preserve source errors without re-logging at call sites.

use std::error::Error as StdError;

use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration operations failed.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: astrofetch_config::ConfigError,
    },
    /// Telemetry operations failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: astrofetch_telemetry::TelemetryError,
    },
    /// Tracker persistence failed.
    #[error("tracker operation failed")]
    Tracker {
        /// Operation identifier.
        operation: &'static str,
        /// Source tracker error.
        source: astrofetch_tracker::TrackerError,
    },
    /// Destination layout could not be prepared.
    #[error("path organizer operation failed")]
    FsOps {
        /// Operation identifier.
        operation: &'static str,
        /// Source fsops error.
        source: astrofetch_fsops::FsOpsError,
    },
    /// Transfer executor could not be prepared.
    #[error("transfer executor operation failed")]
    Executor {
        /// Operation identifier.
        operation: &'static str,
        /// Source executor error.
        source: astrofetch_transfer::ExecutorError,
    },
    /// The run filter was rejected before any transfer began.
    #[error("invalid run filter")]
    Filter {
        /// Source validation error.
        source: astrofetch_core::CoreError,
    },
    /// HTTP client operations failed.
    #[error("http operation failed")]
    Http {
        /// Operation identifier.
        operation: &'static str,
        /// URL used for the request.
        url: String,
        /// Source HTTP client error.
        source: reqwest::Error,
    },
    /// Configuration values were invalid.
    #[error("invalid configuration")]
    InvalidConfig {
        /// Field name that failed validation.
        field: &'static str,
        /// Machine-readable reason for the failure.
        reason: &'static str,
        /// Optional value associated with the failure.
        value: Option<String>,
    },
    /// A background run task terminated abnormally.
    #[error("run task failed")]
    Join {
        /// Operation identifier.
        operation: &'static str,
        /// Source join error.
        source: tokio::task::JoinError,
    },
}

impl AppError {
    pub(crate) const fn config(
        operation: &'static str,
        source: astrofetch_config::ConfigError,
    ) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) const fn telemetry(
        operation: &'static str,
        source: astrofetch_telemetry::TelemetryError,
    ) -> Self {
        Self::Telemetry { operation, source }
    }

    pub(crate) const fn tracker(
        operation: &'static str,
        source: astrofetch_tracker::TrackerError,
    ) -> Self {
        Self::Tracker { operation, source }
    }

    pub(crate) const fn fsops(operation: &'static str, source: astrofetch_fsops::FsOpsError) -> Self {
        Self::FsOps { operation, source }
    }

    pub(crate) const fn executor(
        operation: &'static str,
        source: astrofetch_transfer::ExecutorError,
    ) -> Self {
        Self::Executor { operation, source }
    }

    pub(crate) const fn http(operation: &'static str, url: String, source: reqwest::Error) -> Self {
        Self::Http {
            operation,
            url,
            source,
        }
    }
}

/// Render `err` and its source chain as one line.
#[must_use]
pub fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}
