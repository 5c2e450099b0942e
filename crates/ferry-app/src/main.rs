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
    clippy::cargo,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Binary entrypoint that wires the Ferry adapters together and polls for updates.

use ferry_app::{AppResult, run_app};

/// Bootstraps the relay and blocks until shutdown.
#[tokio::main(flavor = "current_thread")]
async fn main() -> AppResult<()> {
    run_app().await
}
