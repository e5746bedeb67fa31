//! CLI error type and exit codes.

use std::fmt::{self, Display, Formatter};

use astrofetch_app::{AppError, error_chain};

/// CLI-level error type to distinguish validation from operational failures.
#[derive(Debug)]
pub(crate) enum CliError {
    Validation(String),
    Failure(anyhow::Error),
}

/// Convenience alias for functions returning a `CliError`.
pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    /// Configuration problems are the caller's to fix; everything else is an
    /// operational failure.
    pub(crate) fn app(error: &AppError) -> Self {
        match error {
            AppError::Config { .. } | AppError::InvalidConfig { .. } | AppError::Filter { .. } => {
                Self::Validation(error_chain(error))
            }
            _ => Self::Failure(anyhow::anyhow!(error_chain(error))),
        }
    }

    pub(crate) const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Failure(_) => 3,
        }
    }

    pub(crate) fn display_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Failure(error) => format!("{error:#}"),
        }
    }
}

impl Display for CliError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("cli error")
    }
}

impl std::error::Error for CliError {}
