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

//! Ferry relay application: turns media posted to the bot into public short links.
//!
//! Layout: `bootstrap.rs` (adapter wiring), `dispatch.rs` (update routing and
//! polling), `orchestrator.rs` (per-transfer pipeline), `downloader.rs`,
//! `publisher.rs`, `shortener.rs`, `notify.rs` (pipeline stages), `journal.rs`
//! (event bus consumer).

/// Application bootstrap and environment loading.
pub mod bootstrap;
/// Update routing, subscription gating, and long polling.
pub mod dispatch;
/// Dual-path media download.
pub mod downloader;
/// Application error types.
pub mod error;
/// Per-transfer audit log fed by the event bus.
pub mod journal;
/// Admin completion notices.
pub mod notify;
/// Transfer pipeline orchestration.
pub mod orchestrator;
/// Remote folder resolution and publication.
pub mod publisher;
/// Link shortening with canonical fallback.
pub mod shortener;

pub use bootstrap::run_app;
pub use error::{AppError, AppResult};
