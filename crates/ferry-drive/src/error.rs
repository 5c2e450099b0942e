//! # Design
//!
//! - Constant messages; request context lives in fields.
//! - Transient classification drives the chunk resume loop.

use std::io;
use std::path::PathBuf;

use ferry_core::CollaboratorError;
use thiserror::Error;

/// Result alias for Drive operations.
pub type DriveResult<T> = Result<T, DriveError>;

/// Errors raised by the Drive adapter.
#[derive(Debug, Error)]
pub enum DriveError {
    /// Transport-level failure.
    #[error("drive http request failed")]
    Http {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying client error.
        source: reqwest::Error,
    },
    /// Drive answered with an unexpected status.
    #[error("drive returned an unexpected status")]
    Status {
        /// Operation identifier.
        operation: &'static str,
        /// HTTP status code.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },
    /// A required response header was absent or unreadable.
    #[error("drive response missing header")]
    MissingHeader {
        /// Operation identifier.
        operation: &'static str,
        /// Header name.
        header: &'static str,
    },
    /// Local file access failed.
    #[error("drive local io failed")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Path involved.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// The credential blob could not be parsed or encoded.
    #[error("drive credential blob is malformed")]
    CredentialFormat {
        /// Credential file path.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },
    /// The access token expired and no refresh token is available.
    #[error("drive credential cannot be refreshed")]
    MissingRefreshToken {
        /// Credential file path.
        path: PathBuf,
    },
    /// A chunk kept failing after every resume attempt.
    #[error("drive upload retries exhausted")]
    RetriesExhausted {
        /// Committed offset when the upload gave up.
        offset: u64,
        /// Attempts made for the failing chunk.
        attempts: u32,
    },
}

impl DriveError {
    pub(crate) const fn http(operation: &'static str, source: reqwest::Error) -> Self {
        Self::Http { operation, source }
    }

    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Operation tag carried into collaborator errors.
    #[must_use]
    pub const fn operation(&self) -> &'static str {
        match self {
            Self::Http { operation, .. }
            | Self::Status { operation, .. }
            | Self::MissingHeader { operation, .. }
            | Self::Io { operation, .. } => *operation,
            Self::CredentialFormat { .. } | Self::MissingRefreshToken { .. } => "drive.auth",
            Self::RetriesExhausted { .. } => "drive.upload_content",
        }
    }

    /// Whether the failure is worth resuming after.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http { source, .. } => {
                source.is_timeout() || source.is_connect() || source.is_request() || source.is_body()
            }
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<DriveError> for CollaboratorError {
    fn from(err: DriveError) -> Self {
        Self::new(err.operation(), err)
    }
}
