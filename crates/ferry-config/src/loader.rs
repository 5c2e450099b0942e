//! Configuration loading from `.env` files and the process environment.
//!
//! # Design
//! - `load_from_lookup` is pure over a key lookup so tests never touch the
//!   process environment.
//! - `load_from_env` layers a `.env` file (when present) under real variables.
//! - Blank values are treated as absent.

use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;
use url::Url;

use crate::defaults::{
    DEFAULT_CHANNEL_LIMIT_BYTES, DEFAULT_CREDENTIALS_FILE, DEFAULT_FOLDER_NAME,
    DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_LOG_LEVEL, DEFAULT_MAX_CONCURRENT_TRANSFERS,
    DEFAULT_PROGRESS_STEP_BYTES, DEFAULT_SHORTENER_TIMEOUT_SECS, DEFAULT_SHORTENER_URL,
    DEFAULT_STORE_LIMIT_BYTES, DEFAULT_TRANSFER_TIMEOUT_SECS, DEFAULT_UPLOAD_CHUNK_BYTES,
    DEFAULT_UPLOAD_RETRIES,
};
use crate::error::{ConfigError, ConfigResult};
use crate::model::{
    DriveSettings, HttpSettings, LogSettings, RelayConfig, TelegramSettings, TransferLimits,
};
use crate::validate::{
    normalize_handle, parse_chunk_size, parse_http_url, parse_i64, parse_positive_u64,
    parse_positive_usize, parse_secs, parse_u32,
};

const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Load configuration from a `.env` file (if any) and the process environment.
///
/// # Errors
///
/// Returns an error when the `.env` file is malformed, a required key is
/// missing, or a value fails validation.
pub fn load_from_env() -> ConfigResult<RelayConfig> {
    match dotenvy::dotenv() {
        Ok(path) => debug!(path = %path.display(), "loaded dotenv file"),
        Err(err) if err.not_found() => debug!("no dotenv file present"),
        Err(source) => return Err(ConfigError::DotEnv { source }),
    }
    load_from_lookup(|key| std::env::var(key).ok())
}

/// Build configuration from an arbitrary key lookup.
///
/// # Errors
///
/// Returns an error when a required key is missing or a value fails validation.
pub fn load_from_lookup<F>(lookup: F) -> ConfigResult<RelayConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let env = Lookup(lookup);

    let telegram = TelegramSettings {
        bot_token: env.required("BOT_TOKEN")?,
        channel_username: normalize_handle("CHANNEL_USERNAME", &env.required("CHANNEL_USERNAME")?)?,
        creator_username: env.required("CREATOR_USERNAME")?,
        admin_chat_id: parse_i64("ADMIN_CHAT_ID", &env.required("ADMIN_CHAT_ID")?)?,
        api_base_url: env.url_or("FERRY_TELEGRAM_API_URL", DEFAULT_TELEGRAM_API_URL)?,
        bulk_api_url: env
            .optional("FERRY_BULK_API_URL")
            .map(|raw| parse_http_url("FERRY_BULK_API_URL", &raw))
            .transpose()?,
    };

    let drive = DriveSettings {
        credentials_file: PathBuf::from(
            env.optional("CREDENTIALS_FILE")
                .unwrap_or_else(|| DEFAULT_CREDENTIALS_FILE.to_string()),
        ),
        folder_name: env
            .optional("FERRY_DRIVE_FOLDER")
            .unwrap_or_else(|| DEFAULT_FOLDER_NAME.to_string()),
        upload_chunk_bytes: env
            .optional("FERRY_UPLOAD_CHUNK_BYTES")
            .map(|raw| parse_chunk_size("FERRY_UPLOAD_CHUNK_BYTES", &raw))
            .transpose()?
            .unwrap_or(DEFAULT_UPLOAD_CHUNK_BYTES),
        upload_retries: env
            .optional("FERRY_UPLOAD_RETRIES")
            .map(|raw| parse_u32("FERRY_UPLOAD_RETRIES", &raw))
            .transpose()?
            .unwrap_or(DEFAULT_UPLOAD_RETRIES),
    };

    let limits = TransferLimits {
        channel_limit_bytes: env.u64_or("FERRY_CHANNEL_LIMIT_BYTES", DEFAULT_CHANNEL_LIMIT_BYTES)?,
        store_limit_bytes: env.u64_or("FERRY_STORE_LIMIT_BYTES", DEFAULT_STORE_LIMIT_BYTES)?,
        progress_step_bytes: env.u64_or("FERRY_PROGRESS_STEP_BYTES", DEFAULT_PROGRESS_STEP_BYTES)?,
        max_concurrent_transfers: env
            .optional("FERRY_MAX_CONCURRENT_TRANSFERS")
            .map(|raw| parse_positive_usize("FERRY_MAX_CONCURRENT_TRANSFERS", &raw))
            .transpose()?
            .unwrap_or(DEFAULT_MAX_CONCURRENT_TRANSFERS),
        transfer_timeout: env.secs_or("FERRY_TRANSFER_TIMEOUT_SECS", DEFAULT_TRANSFER_TIMEOUT_SECS)?,
    };

    let http = HttpSettings {
        timeout: env.secs_or("FERRY_HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS)?,
        shortener_url: env.url_or("FERRY_SHORTENER_URL", DEFAULT_SHORTENER_URL)?,
        shortener_timeout: env.secs_or(
            "FERRY_SHORTENER_TIMEOUT_SECS",
            DEFAULT_SHORTENER_TIMEOUT_SECS,
        )?,
    };

    let scratch_dir = env
        .optional("FERRY_SCRATCH_DIR")
        .map_or_else(std::env::temp_dir, PathBuf::from);

    let logging = LogSettings {
        level: env
            .optional("FERRY_LOG_LEVEL")
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
        format: env.optional("FERRY_LOG_FORMAT"),
    };

    Ok(RelayConfig {
        telegram,
        drive,
        limits,
        http,
        scratch_dir,
        logging,
    })
}

struct Lookup<F>(F);

impl<F> Lookup<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|value| !value.trim().is_empty())
    }

    fn required(&self, key: &'static str) -> ConfigResult<String> {
        self.optional(key)
            .map(|value| value.trim().to_string())
            .ok_or(ConfigError::MissingKey { name: key })
    }

    fn u64_or(&self, key: &'static str, default: u64) -> ConfigResult<u64> {
        self.optional(key)
            .map_or(Ok(default), |raw| parse_positive_u64(key, &raw))
    }

    fn secs_or(&self, key: &'static str, default: u64) -> ConfigResult<Duration> {
        self.optional(key)
            .map_or(Ok(Duration::from_secs(default)), |raw| parse_secs(key, &raw))
    }

    fn url_or(&self, key: &'static str, default: &str) -> ConfigResult<Url> {
        parse_http_url(key, &self.optional(key).unwrap_or_else(|| default.to_string()))
    }
}
