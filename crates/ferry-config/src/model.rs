//! Typed configuration sections consumed by the relay.
//!
//! # Design
//! - One struct per collaborator so each adapter receives only what it needs.
//! - Values are validated before construction; consumers never re-check them.

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use url::Url;

/// Complete, validated configuration for one relay process.
#[derive(Debug, Clone, Serialize)]
pub struct RelayConfig {
    /// Messaging channel settings.
    pub telegram: TelegramSettings,
    /// Remote storage settings.
    pub drive: DriveSettings,
    /// Admission limits and pipeline bounds.
    pub limits: TransferLimits,
    /// Outbound HTTP settings.
    pub http: HttpSettings,
    /// Directory receiving scratch files.
    pub scratch_dir: PathBuf,
    /// Logging preferences.
    pub logging: LogSettings,
}

/// Bot identity, gating channel, and privileged recipient.
#[derive(Clone, Serialize)]
pub struct TelegramSettings {
    /// Bot API token.
    #[serde(skip_serializing)]
    pub bot_token: String,
    /// Channel users must join, without the leading `@`.
    pub channel_username: String,
    /// Creator handle quoted in user-facing texts.
    pub creator_username: String,
    /// Chat receiving completion notifications.
    pub admin_chat_id: i64,
    /// Public Bot API base URL.
    pub api_base_url: Url,
    /// Self-hosted Bot API server used for the bulk download path.
    pub bulk_api_url: Option<Url>,
}

impl std::fmt::Debug for TelegramSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramSettings")
            .field("bot_token", &"<redacted>")
            .field("channel_username", &self.channel_username)
            .field("creator_username", &self.creator_username)
            .field("admin_chat_id", &self.admin_chat_id)
            .field("api_base_url", &self.api_base_url)
            .field("bulk_api_url", &self.bulk_api_url)
            .finish()
    }
}

/// Remote storage settings.
#[derive(Debug, Clone, Serialize)]
pub struct DriveSettings {
    /// Path of the persisted credential blob.
    pub credentials_file: PathBuf,
    /// Name of the folder receiving uploads.
    pub folder_name: String,
    /// Resumable upload chunk size in bytes.
    pub upload_chunk_bytes: usize,
    /// Extra attempts per chunk after a transient failure.
    pub upload_retries: u32,
}

/// Admission thresholds and pipeline bounds.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct TransferLimits {
    /// Maximum size the messaging channel can deliver.
    pub channel_limit_bytes: u64,
    /// Maximum size the remote store accepts.
    pub store_limit_bytes: u64,
    /// Byte interval between progress updates.
    pub progress_step_bytes: u64,
    /// Transfers allowed in flight at once.
    pub max_concurrent_transfers: usize,
    /// Overall deadline for one transfer.
    pub transfer_timeout: Duration,
}

/// Outbound HTTP settings.
#[derive(Debug, Clone, Serialize)]
pub struct HttpSettings {
    /// Timeout applied to every collaborator request.
    pub timeout: Duration,
    /// Shortener endpoint.
    pub shortener_url: Url,
    /// Timeout for the shortener call.
    pub shortener_timeout: Duration,
}

/// Logging preferences.
#[derive(Debug, Clone, Serialize)]
pub struct LogSettings {
    /// Default level filter when `RUST_LOG` is unset.
    pub level: String,
    /// Output format label (`json` or `pretty`); inferred when absent.
    pub format: Option<String>,
}
