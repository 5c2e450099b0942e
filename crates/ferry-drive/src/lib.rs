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

//! Google Drive storage adapter.
//!
//! Layout: `auth.rs` (refreshable credential blob), `client.rs`
//! (`DriveClient` implementing `StorageProvider` with resumable uploads),
//! `error.rs` (`DriveError`).

pub mod auth;
pub mod client;
pub mod error;

pub use auth::{StoredCredential, TokenStore};
pub use client::{DEFAULT_DRIVE_BASE_URL, DriveClient, DriveClientConfig};
pub use error::{DriveError, DriveResult};
