//! Error types for Bot API calls.

use std::io;
use std::path::PathBuf;

use ferry_core::CollaboratorError;
use thiserror::Error;

/// Result alias for Bot API operations.
pub type TelegramResult<T> = Result<T, TelegramError>;

/// Errors raised while talking to the Bot API.
#[derive(Debug, Error)]
pub enum TelegramError {
    /// Transport-level failure.
    #[error("telegram http request failed")]
    Http {
        /// Bot API method or download step.
        operation: &'static str,
        /// Underlying client error.
        source: reqwest::Error,
    },
    /// The API answered with `ok: false`.
    #[error("telegram api rejected the request")]
    Api {
        /// Bot API method.
        operation: &'static str,
        /// Error code reported by the API.
        code: i32,
        /// Description reported by the API.
        description: String,
    },
    /// The API answered `ok: true` without a result.
    #[error("telegram api returned an empty result")]
    EmptyResult {
        /// Bot API method.
        operation: &'static str,
    },
    /// A file download returned a non-success status.
    #[error("telegram file download failed")]
    DownloadStatus {
        /// Download step.
        operation: &'static str,
        /// HTTP status code.
        status: u16,
    },
    /// Writing downloaded bytes failed.
    #[error("telegram download io failed")]
    Io {
        /// Download step.
        operation: &'static str,
        /// Destination path.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
}

impl TelegramError {
    pub(crate) const fn http(operation: &'static str, source: reqwest::Error) -> Self {
        Self::Http { operation, source }
    }

    /// Method or step that failed.
    #[must_use]
    pub const fn operation(&self) -> &'static str {
        match self {
            Self::Http { operation, .. }
            | Self::Api { operation, .. }
            | Self::EmptyResult { operation }
            | Self::DownloadStatus { operation, .. }
            | Self::Io { operation, .. } => *operation,
        }
    }

    /// Whether retrying the same call may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http { source, .. } => source.is_timeout() || source.is_connect(),
            Self::Api { code, .. } => *code == 429 || *code >= 500,
            Self::DownloadStatus { status, .. } => *status == 429 || *status >= 500,
            Self::EmptyResult { .. } | Self::Io { .. } => false,
        }
    }
}

impl From<TelegramError> for CollaboratorError {
    fn from(err: TelegramError) -> Self {
        Self::new(err.operation(), err)
    }
}
