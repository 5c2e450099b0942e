//! Bootstrap wiring for the relay process.
//!
//! # Design
//! - `BootstrapDependencies::from_env` performs every fallible load that does
//!   not need logging; `run_app_with` installs logging first, then assembles
//!   the adapters.
//! - A missing bulk server is reported as degraded health, not a startup error.
//! - The transfer journal subscribes before any adapter is built, so it sees
//!   the startup health event.
//! - Shutdown is driven by ctrl-c; in-flight transfers are abandoned and their
//!   scratch files removed by their drop guards.

use std::future::Future;
use std::sync::Arc;

use ferry_config::{ConfigError, RelayConfig, load_from_env};
use ferry_core::{BulkTransferPath, SizeGate};
use ferry_drive::{DEFAULT_DRIVE_BASE_URL, DriveClient, DriveClientConfig, TokenStore};
use ferry_events::{Event, EventBus};
use ferry_fsops::ScratchSpace;
use ferry_telegram::{LocalBotApiPath, TelegramChannel, TelegramClient};
use ferry_telemetry::{
    GlobalContextGuard, LogFormat, LoggingConfig, Metrics, init_logging, record_app_mode,
};
use tracing::{debug, info, warn};
use url::Url;

use crate::dispatch::{Dispatcher, UpdatePoller};
use crate::downloader::DualPathDownloader;
use crate::error::{AppError, AppResult};
use crate::journal::spawn_journal;
use crate::notify::CompletionNotifier;
use crate::orchestrator::{
    OrchestratorDeps, OrchestratorSettings, TransferOrchestrator, publish_event,
};
use crate::publisher::RemotePublisher;
use crate::shortener::TinyUrlShortener;

/// Long-poll window requested from `getUpdates`.
const POLL_TIMEOUT_SECS: u64 = 30;

/// Component name reported when no bulk transfer server is configured.
const BULK_PATH_COMPONENT: &str = "bulk_path";

pub(crate) struct BootstrapDependencies {
    config: RelayConfig,
    events: EventBus,
    metrics: Metrics,
}

impl BootstrapDependencies {
    pub(crate) fn from_env() -> AppResult<Self> {
        let config = load_from_env().map_err(|err| AppError::config("config.load", err))?;
        let metrics =
            Metrics::new().map_err(|err| AppError::telemetry("telemetry.metrics", err))?;
        Ok(Self {
            config,
            events: EventBus::new(),
            metrics,
        })
    }
}

/// Fully wired relay ready to poll.
pub(crate) struct Relay {
    client: TelegramClient,
    poller: UpdatePoller,
}

/// Load configuration, wire the adapters, and poll until ctrl-c.
///
/// # Errors
///
/// Returns an error when configuration, logging, credentials, or the scratch
/// directory cannot be set up, or when polling stops on a non-retryable error.
pub async fn run_app() -> AppResult<()> {
    let deps = BootstrapDependencies::from_env()?;
    Box::pin(run_app_with(deps)).await
}

pub(crate) async fn run_app_with(deps: BootstrapDependencies) -> AppResult<()> {
    let BootstrapDependencies {
        config,
        events,
        metrics,
    } = deps;

    let logging = LoggingConfig {
        level: &config.logging.level,
        format: log_format(config.logging.format.as_deref()),
        ..LoggingConfig::default()
    };
    init_logging(&logging).map_err(|err| AppError::telemetry("telemetry.init_logging", err))?;
    let _context = GlobalContextGuard::new("bootstrap");
    info!(
        bulk_path = config.telegram.bulk_api_url.is_some(),
        scratch_dir = %config.scratch_dir.display(),
        max_concurrent = config.limits.max_concurrent_transfers,
        "ferry relay bootstrap starting"
    );

    let journal = spawn_journal(&events);
    let outcome = poll_until_shutdown(&config, &events, &metrics).await;
    journal.abort();

    let snapshot = metrics.snapshot();
    info!(
        active_transfers = snapshot.active_transfers,
        bytes_downloaded = snapshot.bytes_downloaded_total,
        shorten_degraded = snapshot.shorten_degraded_total,
        notifications_failed = snapshot.notifications_failed_total,
        "ferry relay stopped"
    );
    match metrics.render() {
        Ok(text) => debug!(metrics = %text, "final metrics"),
        Err(err) => warn!(error = %err, "failed to render metrics"),
    }
    outcome
}

async fn poll_until_shutdown(
    config: &RelayConfig,
    events: &EventBus,
    metrics: &Metrics,
) -> AppResult<()> {
    let relay = assemble(config, events, metrics).await?;
    let me = relay
        .client
        .get_me()
        .await
        .map_err(|err| AppError::telegram("telegram.get_me", err))?;
    record_app_mode("polling");
    info!(bot_id = me.id, username = ?me.username, "bot identity confirmed; polling for updates");
    relay.poller.run(shutdown_signal()).await
}

/// Build every adapter and the poller from `config`.
pub(crate) async fn assemble(
    config: &RelayConfig,
    events: &EventBus,
    metrics: &Metrics,
) -> AppResult<Relay> {
    let scratch = ScratchSpace::new(&config.scratch_dir);
    scratch
        .ensure()
        .await
        .map_err(|err| AppError::fsops("scratch.ensure", err))?;

    let telegram = &config.telegram;
    let client = TelegramClient::new(
        telegram.bot_token.clone(),
        &telegram.api_base_url,
        config.http.timeout,
    )
    .map_err(|err| AppError::telegram("telegram.client", err))?;
    let channel = Arc::new(TelegramChannel::new(client, telegram.admin_chat_id));

    let bulk = bulk_path(config)?;
    let degraded = degraded_components(bulk.is_some());
    if !degraded.is_empty() {
        warn!(
            degraded = ?degraded,
            "no bulk transfer server configured; large media will fail"
        );
        publish_event(events, metrics, Event::HealthChanged { degraded });
    }

    let tokens = TokenStore::load(&config.drive.credentials_file, config.http.timeout)
        .await
        .map_err(|err| AppError::drive("drive.credentials", err))?;
    info!(path = %tokens.path().display(), "drive credentials loaded");
    let drive = DriveClient::new(Arc::new(tokens), &drive_config(config)?)
        .map_err(|err| AppError::drive("drive.client", err))?;

    let shortener =
        TinyUrlShortener::new(config.http.shortener_url.clone(), config.http.shortener_timeout)?;

    let deps = OrchestratorDeps {
        channel: channel.clone(),
        downloader: DualPathDownloader::new(
            bulk,
            channel.clone(),
            config.limits.progress_step_bytes,
            metrics.clone(),
        ),
        publisher: RemotePublisher::new(Arc::new(drive), config.drive.folder_name.clone()),
        shortener: Arc::new(shortener),
        notifier: CompletionNotifier::new(channel.clone(), metrics.clone()),
        events: events.clone(),
        metrics: metrics.clone(),
        scratch,
    };
    let settings = OrchestratorSettings {
        gate: SizeGate::new(
            config.limits.channel_limit_bytes,
            config.limits.store_limit_bytes,
        ),
        max_concurrent: config.limits.max_concurrent_transfers,
        timeout: config.limits.transfer_timeout,
        creator_username: telegram.creator_username.clone(),
    };
    let orchestrator = Arc::new(TransferOrchestrator::new(deps, settings));

    let dispatcher = Arc::new(Dispatcher::new(
        channel.clone(),
        channel.clone(),
        orchestrator,
        telegram.channel_username.clone(),
        telegram.creator_username.clone(),
    ));
    let client = channel.client().clone();
    let poller = UpdatePoller::new(client.clone(), dispatcher, POLL_TIMEOUT_SECS);
    Ok(Relay { client, poller })
}

/// Bulk path client; streams whole files so it runs under the transfer deadline.
fn bulk_path(config: &RelayConfig) -> AppResult<Option<Arc<dyn BulkTransferPath>>> {
    let Some(url) = &config.telegram.bulk_api_url else {
        return Ok(None);
    };
    let client = TelegramClient::new(
        config.telegram.bot_token.clone(),
        url,
        config.limits.transfer_timeout,
    )
    .map_err(|err| AppError::telegram("telegram.bulk_client", err))?;
    info!(base_url = %url, "bulk transfer path enabled");
    Ok(Some(Arc::new(LocalBotApiPath::new(client))))
}

fn drive_config(config: &RelayConfig) -> AppResult<DriveClientConfig> {
    let base_url = Url::parse(DEFAULT_DRIVE_BASE_URL).map_err(|_| {
        AppError::config(
            "drive.base_url",
            ConfigError::InvalidField {
                field: "DRIVE_BASE_URL",
                value: Some(DEFAULT_DRIVE_BASE_URL.to_string()),
                reason: "invalid_url",
            },
        )
    })?;
    Ok(DriveClientConfig {
        base_url,
        timeout: config.http.timeout,
        chunk_timeout: config.limits.transfer_timeout,
        chunk_bytes: config.drive.upload_chunk_bytes,
        upload_retries: config.drive.upload_retries,
    })
}

fn log_format(raw: Option<&str>) -> LogFormat {
    raw.map_or_else(LogFormat::infer, LogFormat::parse_or_infer)
}

fn degraded_components(bulk_enabled: bool) -> Vec<String> {
    if bulk_enabled {
        Vec::new()
    } else {
        vec![BULK_PATH_COMPONENT.to_string()]
    }
}

fn shutdown_signal() -> impl Future<Output = ()> {
    async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("shutdown requested"),
            Err(err) => {
                warn!(error = %err, "failed to listen for ctrl-c; running until killed");
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_config::load_from_lookup;
    use std::collections::HashMap;
    use std::path::Path;
    use tempfile::TempDir;

    fn config_for(dir: &Path, extra: &[(&str, &str)]) -> anyhow::Result<RelayConfig> {
        let credentials = dir.join("token.json");
        std::fs::write(&credentials, br#"{"token": "access", "refresh_token": "refresh"}"#)?;
        let scratch = dir.join("scratch");
        let mut vars: HashMap<String, String> = [
            ("BOT_TOKEN", "123:abc"),
            ("CHANNEL_USERNAME", "@ferrynews"),
            ("CREATOR_USERNAME", "maker"),
            ("ADMIN_CHAT_ID", "99"),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();
        vars.insert(
            "CREDENTIALS_FILE".to_string(),
            credentials.display().to_string(),
        );
        vars.insert("FERRY_SCRATCH_DIR".to_string(), scratch.display().to_string());
        for (key, value) in extra {
            vars.insert((*key).to_string(), (*value).to_string());
        }
        Ok(load_from_lookup(|key| vars.get(key).cloned())?)
    }

    #[tokio::test]
    async fn assemble_creates_scratch_dir_and_reports_missing_bulk_path() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let config = config_for(dir.path(), &[])?;
        let events = EventBus::new();
        let metrics = Metrics::new()?;

        assemble(&config, &events, &metrics).await?;

        assert!(config.scratch_dir.is_dir());
        let backlog = events.backlog_since(0);
        assert_eq!(backlog.len(), 1);
        match &backlog[0].event {
            Event::HealthChanged { degraded } => assert_eq!(degraded, &vec!["bulk_path".to_string()]),
            other => anyhow::bail!("unexpected event: {other:?}"),
        }
        assert_eq!(backlog[0].event.kind(), "health_changed");
        Ok(())
    }

    #[tokio::test]
    async fn assemble_with_bulk_server_is_healthy() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let config = config_for(dir.path(), &[("FERRY_BULK_API_URL", "http://127.0.0.1:8081")])?;
        let events = EventBus::new();

        assemble(&config, &events, &Metrics::new()?).await?;

        assert!(events.backlog_since(0).is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn missing_credentials_abort_startup() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let missing = dir.path().join("absent.json");
        let missing = missing.display().to_string();
        let config = config_for(dir.path(), &[("CREDENTIALS_FILE", missing.as_str())])?;

        let err = assemble(&config, &EventBus::new(), &Metrics::new()?)
            .await
            .err()
            .ok_or_else(|| anyhow::anyhow!("assemble should fail"))?;
        assert!(matches!(
            err,
            AppError::Drive {
                operation: "drive.credentials",
                ..
            }
        ));
        Ok(())
    }

    #[test]
    fn log_format_defaults_to_build_profile() {
        assert_eq!(log_format(None), LogFormat::infer());
        assert_eq!(log_format(Some("json")), LogFormat::Json);
        assert_eq!(log_format(Some("pretty")), LogFormat::Pretty);
    }

    #[test]
    fn degraded_components_name_the_bulk_path() {
        assert!(degraded_components(true).is_empty());
        assert_eq!(degraded_components(false), vec!["bulk_path".to_string()]);
    }

    #[test]
    fn drive_config_follows_relay_settings() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let config = config_for(
            dir.path(),
            &[
                ("FERRY_UPLOAD_RETRIES", "7"),
                ("FERRY_TRANSFER_TIMEOUT_SECS", "900"),
                ("FERRY_HTTP_TIMEOUT_SECS", "20"),
            ],
        )?;
        let drive = drive_config(&config)?;
        assert_eq!(drive.base_url.as_str(), "https://www.googleapis.com/");
        assert_eq!(drive.upload_retries, 7);
        assert_eq!(drive.timeout, std::time::Duration::from_secs(20));
        assert_eq!(drive.chunk_timeout, std::time::Duration::from_secs(900));
        assert_eq!(drive.chunk_bytes, config.drive.upload_chunk_bytes);
        Ok(())
    }
}
