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

//! Environment-backed configuration for the Ferry relay.
//!
//! Layout: `model.rs` (typed configuration sections), `validate.rs`
//! (parsing helpers), `loader.rs` (`.env` + process environment loading),
//! `defaults.rs` (fallback values).

mod defaults;
pub mod error;
pub mod loader;
pub mod model;
mod validate;

pub use defaults::{
    DEFAULT_CHANNEL_LIMIT_BYTES, DEFAULT_FOLDER_NAME, DEFAULT_PROGRESS_STEP_BYTES,
    DEFAULT_STORE_LIMIT_BYTES, DEFAULT_UPLOAD_CHUNK_BYTES, UPLOAD_CHUNK_GRANULARITY,
};
pub use error::{ConfigError, ConfigResult};
pub use loader::{load_from_env, load_from_lookup};
pub use model::{DriveSettings, HttpSettings, LogSettings, RelayConfig, TelegramSettings, TransferLimits};
