//! Default values applied when optional environment keys are absent.
//!
//! # Design
//! - Centralize fallbacks so the loader and tests agree on them.
//! - Byte quantities are spelled out in binary units.
#![allow(clippy::redundant_pub_crate)]

const MIB: u64 = 1024 * 1024;

/// Largest object the bot download channel will hand out (2000 MiB).
pub const DEFAULT_CHANNEL_LIMIT_BYTES: u64 = 2_000 * MIB;
/// Largest object the remote store accepts (5 GiB).
pub const DEFAULT_STORE_LIMIT_BYTES: u64 = 5 * 1024 * MIB;
/// Progress updates are emitted each time this many bytes are crossed.
pub const DEFAULT_PROGRESS_STEP_BYTES: u64 = 5 * MIB;
/// Resumable upload chunk size.
pub const DEFAULT_UPLOAD_CHUNK_BYTES: usize = 8 * 1024 * 1024;
/// Resumable upload chunks must be a multiple of this size.
pub const UPLOAD_CHUNK_GRANULARITY: usize = 256 * 1024;
/// Remote folder that receives every upload.
pub const DEFAULT_FOLDER_NAME: &str = "Telegram Bot";

pub(crate) const DEFAULT_CREDENTIALS_FILE: &str = "token.json";
pub(crate) const DEFAULT_MAX_CONCURRENT_TRANSFERS: usize = 4;
pub(crate) const DEFAULT_TRANSFER_TIMEOUT_SECS: u64 = 7_200;
pub(crate) const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;
pub(crate) const DEFAULT_SHORTENER_URL: &str = "http://tinyurl.com/api-create.php";
pub(crate) const DEFAULT_SHORTENER_TIMEOUT_SECS: u64 = 30;
pub(crate) const DEFAULT_UPLOAD_RETRIES: u32 = 3;
pub(crate) const DEFAULT_LOG_LEVEL: &str = "info";
