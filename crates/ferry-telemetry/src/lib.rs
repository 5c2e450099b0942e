#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::multiple_crate_versions)]

//! Telemetry primitives shared across the Ferry workspace.
//!
//! This crate centralises logging, metrics, and transfer-scoped tracing helpers so the
//! relay pipeline and its collaborators report through one observability story.

pub mod context;
pub mod error;
pub mod init;
pub mod metrics;

pub use context::{
    GlobalContextGuard, current_transfer_id, record_app_mode, transfer_span,
    with_transfer_context,
};
pub use error::{Result, TelemetryError};
pub use init::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, build_sha, init_logging};
pub use metrics::{Metrics, MetricsSnapshot};
