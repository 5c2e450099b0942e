//! # Design
//!
//! - Centralize application-level errors for bootstrap and the update loop.
//! - Keep error messages constant while carrying context fields for debugging.
//! - Preserve source errors without re-logging at call sites.

use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration loading failed.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: ferry_config::ConfigError,
    },
    /// Telemetry operations failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: ferry_telemetry::TelemetryError,
    },
    /// Bot API operations failed.
    #[error("telegram operation failed")]
    Telegram {
        /// Operation identifier.
        operation: &'static str,
        /// Source Bot API error.
        source: ferry_telegram::TelegramError,
    },
    /// Drive adapter construction failed.
    #[error("drive operation failed")]
    Drive {
        /// Operation identifier.
        operation: &'static str,
        /// Source Drive error.
        source: ferry_drive::DriveError,
    },
    /// Scratch storage preparation failed.
    #[error("scratch storage operation failed")]
    FsOps {
        /// Operation identifier.
        operation: &'static str,
        /// Source fsops error.
        source: ferry_fsops::FsOpsError,
    },
    /// HTTP client construction failed.
    #[error("http operation failed")]
    Http {
        /// Operation identifier.
        operation: &'static str,
        /// Source HTTP client error.
        source: reqwest::Error,
    },
}

impl AppError {
    pub(crate) const fn config(operation: &'static str, source: ferry_config::ConfigError) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) const fn telemetry(
        operation: &'static str,
        source: ferry_telemetry::TelemetryError,
    ) -> Self {
        Self::Telemetry { operation, source }
    }

    pub(crate) const fn telegram(
        operation: &'static str,
        source: ferry_telegram::TelegramError,
    ) -> Self {
        Self::Telegram { operation, source }
    }

    pub(crate) const fn drive(operation: &'static str, source: ferry_drive::DriveError) -> Self {
        Self::Drive { operation, source }
    }

    pub(crate) const fn fsops(operation: &'static str, source: ferry_fsops::FsOpsError) -> Self {
        Self::FsOps { operation, source }
    }

    pub(crate) const fn http(operation: &'static str, source: reqwest::Error) -> Self {
        Self::Http { operation, source }
    }
}
