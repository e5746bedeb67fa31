//! # Design
//!
//! - Keep error messages constant; carry the offending field and value as data.
//! - Split catalog failures from per-transfer failures so the orchestrator can
//!   tell a run-level halt from a task-level failure.
//! - `TransferErrorKind` is the serialisable taxonomy persisted with failed
//!   transfers; `TransferError` is the in-flight error value.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result alias for validation performed by core types.
pub type CoreResult<T> = Result<T, CoreError>;

/// Validation errors raised before a run begins.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// A filter field failed validation.
    #[error("invalid filter")]
    InvalidFilter {
        /// Field that failed validation.
        field: &'static str,
        /// Static reason for the failure.
        reason: &'static str,
        /// Offending value when available.
        value: Option<String>,
    },
}

/// Failures reported by a catalog collaborator.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The remote session is no longer authorised.
    #[error("catalog session expired")]
    AuthExpired,
    /// The catalog could not be reached or answered with a transient failure.
    #[error("catalog unavailable")]
    Unavailable {
        /// Human-readable diagnostic detail.
        detail: String,
    },
    /// The catalog answered with a payload that could not be understood.
    #[error("catalog response malformed")]
    Malformed {
        /// Human-readable diagnostic detail.
        detail: String,
    },
}

impl CatalogError {
    /// Whether retrying the same request may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

/// Classification of a transfer failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferErrorKind {
    /// Connection, protocol, server-side, or throttling failure.
    Network,
    /// A single attempt exceeded the configured timeout.
    Timeout,
    /// The remote rejected the session; never retried locally.
    AuthExpired,
    /// Directory creation, permission, or disk-space failure.
    Filesystem,
    /// The run was cancelled before the task finished.
    Cancelled,
    /// A worker terminated unexpectedly.
    Internal,
    /// The remote refused this item outright, for example a 404 or 410.
    Rejected,
}

impl TransferErrorKind {
    /// Only transient network conditions are retried.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Network | Self::Timeout)
    }

    /// Stable label used in logs, metrics, and persisted records.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::AuthExpired => "auth_expired",
            Self::Filesystem => "filesystem",
            Self::Cancelled => "cancelled",
            Self::Internal => "internal",
            Self::Rejected => "rejected",
        }
    }
}

impl Display for TransferErrorKind {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Error raised by a single transfer attempt.
#[derive(Debug, Error)]
#[error("transfer attempt failed")]
pub struct TransferError {
    kind: TransferErrorKind,
    detail: String,
}

impl TransferError {
    /// Construct an error of the given kind.
    #[must_use]
    pub fn new(kind: TransferErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    /// Transient network failure.
    #[must_use]
    pub fn network(detail: impl Into<String>) -> Self {
        Self::new(TransferErrorKind::Network, detail)
    }

    /// Attempt exceeded its deadline.
    #[must_use]
    pub fn timeout(detail: impl Into<String>) -> Self {
        Self::new(TransferErrorKind::Timeout, detail)
    }

    /// Remote session expired.
    #[must_use]
    pub fn auth_expired(detail: impl Into<String>) -> Self {
        Self::new(TransferErrorKind::AuthExpired, detail)
    }

    /// The remote refused the item; another attempt would get the same answer.
    #[must_use]
    pub fn rejected(detail: impl Into<String>) -> Self {
        Self::new(TransferErrorKind::Rejected, detail)
    }

    /// Local filesystem failure.
    #[must_use]
    pub fn filesystem(detail: impl Into<String>) -> Self {
        Self::new(TransferErrorKind::Filesystem, detail)
    }

    /// Kind of the failure.
    #[must_use]
    pub const fn kind(&self) -> TransferErrorKind {
        self.kind
    }

    /// Diagnostic detail.
    #[must_use]
    pub fn detail(&self) -> &str {
        &self.detail
    }
}
