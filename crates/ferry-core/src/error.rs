//! Error types for transfers and the collaborators they call.

use std::error::Error;
use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Boxed error used to carry adapter-specific failures across trait seams.
pub type BoxError = Box<dyn Error + Send + Sync>;

/// Failure reported by an external collaborator (messaging, storage, shortener).
#[derive(Debug, Error)]
#[error("collaborator call failed")]
pub struct CollaboratorError {
    /// Operation identifier (e.g. `drive.create_folder`).
    pub operation: &'static str,
    /// Underlying adapter failure.
    #[source]
    pub source: BoxError,
}

impl CollaboratorError {
    /// Wrap an adapter error with the operation that produced it.
    pub fn new(operation: &'static str, source: impl Into<BoxError>) -> Self {
        Self {
            operation,
            source: source.into(),
        }
    }

    /// Build an error from a plain message when no typed source exists.
    pub fn message(operation: &'static str, message: impl Into<String>) -> Self {
        let message: String = message.into();
        Self {
            operation,
            source: message.into(),
        }
    }
}

/// Result alias for collaborator calls.
pub type CollaboratorResult<T> = Result<T, CollaboratorError>;

/// Remote publication steps, each a distinct failure point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishStep {
    /// Looking up or creating the destination folder.
    ResolveContainer,
    /// Creating the remote object record.
    CreateObject,
    /// Streaming the local bytes.
    UploadContent,
    /// Granting public read access.
    GrantPublicRead,
}

impl PublishStep {
    /// Stable label for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ResolveContainer => "resolve_container",
            Self::CreateObject => "create_object",
            Self::UploadContent => "upload_content",
            Self::GrantPublicRead => "grant_public_read",
        }
    }
}

impl fmt::Display for PublishStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reasons a transfer ends in the aborted phase.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Declared size exceeds what the messaging channel can deliver.
    #[error("object exceeds the messaging channel limit")]
    TooLargeForChannel {
        /// Declared size in bytes.
        size: u64,
        /// Configured channel ceiling in bytes.
        limit: u64,
    },
    /// Declared size exceeds what the remote store accepts.
    #[error("object exceeds the remote store limit")]
    TooLargeForStore {
        /// Declared size in bytes.
        size: u64,
        /// Configured store ceiling in bytes.
        limit: u64,
    },
    /// Both download paths failed; carries the direct path's error.
    #[error("both download paths failed")]
    DownloadFailed {
        /// Failure from the last attempted path.
        #[source]
        source: CollaboratorError,
    },
    /// A remote publication step failed.
    #[error("remote publication failed")]
    PublishFailed {
        /// Step that failed.
        step: PublishStep,
        /// Underlying collaborator failure.
        #[source]
        source: CollaboratorError,
    },
    /// The overall transfer deadline elapsed.
    #[error("transfer deadline exceeded")]
    TimedOut {
        /// Deadline that was exceeded.
        after: Duration,
    },
    /// Unexpected local failure (scratch storage, illegal phase transition).
    #[error("internal transfer error")]
    Internal {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying failure when one exists.
        #[source]
        source: Option<BoxError>,
    },
}

impl TransferError {
    /// Build an internal error without a source.
    #[must_use]
    pub const fn internal(operation: &'static str) -> Self {
        Self::Internal {
            operation,
            source: None,
        }
    }

    /// Machine-readable reason used for events and metric labels.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::TooLargeForChannel { .. } => "too_large_for_channel",
            Self::TooLargeForStore { .. } => "too_large_for_store",
            Self::DownloadFailed { .. } => "download_failed",
            Self::PublishFailed { .. } => "publish_failed",
            Self::TimedOut { .. } => "timed_out",
            Self::Internal { .. } => "internal",
        }
    }

    /// Text shown to the requester when the transfer aborts.
    #[must_use]
    pub const fn user_message(&self) -> &'static str {
        match self {
            Self::TooLargeForChannel { .. } => {
                "❌ File is too large for Telegram download. Maximum size is 2GB."
            }
            Self::TooLargeForStore { .. } => {
                "❌ File is too large for Google Drive. Maximum size is 5GB."
            }
            Self::DownloadFailed { .. } => "❌ Failed to download file. Please try again.",
            Self::PublishFailed { .. } => {
                "❌ Failed to upload file to Google Drive. Please try again later."
            }
            Self::TimedOut { .. } => "❌ The transfer took too long and was cancelled. Please try again.",
            Self::Internal { .. } => "Sorry, I couldn't process that file. Please try again.",
        }
    }
}
