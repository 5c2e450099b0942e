//! Scratch storage for in-flight transfers.
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
#![allow(clippy::module_name_repetitions, clippy::multiple_crate_versions)]

pub mod error;
pub mod scratch;

pub use error::{FsOpsError, FsOpsResult};
pub use scratch::{ScratchFile, ScratchSpace, sanitize_extension};
