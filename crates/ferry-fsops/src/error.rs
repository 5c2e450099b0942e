//! # Design
//!
//! - Provide structured, constant-message errors for scratch storage.
//! - Capture operation context (paths, attempts) so failures are reproducible in tests.
//! - Preserve source errors without interpolating context into error messages.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for scratch storage operations.
pub type FsOpsResult<T> = Result<T, FsOpsError>;

/// Errors produced by scratch storage.
#[derive(Debug, Error)]
pub enum FsOpsError {
    /// IO failures while interacting with the filesystem.
    #[error("fsops io failure")]
    Io {
        /// Operation that triggered the IO failure.
        operation: &'static str,
        /// Path involved in the IO failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Every candidate name already existed.
    #[error("fsops scratch names exhausted")]
    NamesExhausted {
        /// Directory where acquisition was attempted.
        dir: PathBuf,
        /// Number of names tried.
        attempts: u32,
    },
}

impl FsOpsError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn io_helper_keeps_context() {
        let err = FsOpsError::io("scratch.acquire", "/tmp/x", io::Error::other("denied"));
        assert_eq!(err.to_string(), "fsops io failure");
        assert!(err.source().is_some());
        assert!(matches!(
            err,
            FsOpsError::Io {
                operation: "scratch.acquire",
                ..
            }
        ));
    }
}
