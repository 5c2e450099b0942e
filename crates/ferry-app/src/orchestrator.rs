//! Transfer orchestrator: admission, the phase pipeline, and terminal handling.
//!
//! # Design
//! - Admission rejects before any scratch storage is allocated.
//! - A semaphore bounds in-flight transfers; the scratch file is acquired only
//!   once a permit is held, so queued transfers hold no local storage.
//! - The pipeline runs under an overall deadline. The scratch file is released
//!   explicitly on every exit and removed by its guard when the task is dropped.
//! - Status-line edits, progress reports and the admin notice are best effort.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ferry_core::{
    CollaboratorResult, DeclaredMedia, Degradation, Keyboard, LinkShortener, MessageHandle,
    MessagingChannel, ProgressObserver, Requester, ShortLink, SizeGate, Transfer, TransferError,
    TransferPhase,
};
use ferry_events::{Event, EventBus};
use ferry_fsops::{ScratchFile, ScratchSpace};
use ferry_telemetry::{Metrics, current_transfer_id, transfer_span, with_transfer_context};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{Instrument, Span, debug, info, warn};
use uuid::Uuid;

use crate::downloader::DualPathDownloader;
use crate::notify::CompletionNotifier;
use crate::publisher::RemotePublisher;
use crate::shortener::shorten_or_fallback;

const MIB: u64 = 1024 * 1024;

/// Label of the button carrying the final link.
pub const DOWNLOAD_BUTTON_LABEL: &str = "✅ Download Now";

pub(crate) fn downloading_text(declared_size: u64) -> String {
    format!("📥 Downloading your file ({declared_size} bytes)...")
}

pub(crate) fn progress_text(bytes_downloaded: u64) -> String {
    format!("📥 Downloading... {}MB downloaded", bytes_downloaded / MIB)
}

pub(crate) fn downloaded_text(bytes_written: u64) -> String {
    format!("📥 Download complete! ({bytes_written} bytes)")
}

pub(crate) const UPLOADING_TEXT: &str = "☁️ Uploading to Google Drive...";
pub(crate) const SHORTENING_TEXT: &str = "🔗 Generating short URL...";

pub(crate) fn ready_card(media: &DeclaredMedia, creator: &str) -> String {
    format!(
        "📁 File Name: `{}`\n📊 File Size: {} bytes\n\n✅ Your file is ready to Download!\n\nBot created by {creator}",
        media.name,
        media.size_or_zero(),
    )
}

/// Publish `event` on the bus and count it.
pub(crate) fn publish_event(events: &EventBus, metrics: &Metrics, event: Event) {
    let kind = event.kind();
    let transfer_id = event.transfer_id().or_else(current_transfer_id);
    let id = events.publish(event);
    metrics.inc_event(kind);
    debug!(event_id = id, kind, transfer_id = ?transfer_id, "event published");
}

/// Collaborators the orchestrator drives.
pub struct OrchestratorDeps {
    /// User-facing messaging surface.
    pub channel: Arc<dyn MessagingChannel>,
    /// Dual-path downloader.
    pub downloader: DualPathDownloader,
    /// Remote publisher.
    pub publisher: RemotePublisher,
    /// Link shortener.
    pub shortener: Arc<dyn LinkShortener>,
    /// Admin notifier.
    pub notifier: CompletionNotifier,
    /// Event bus receiving phase changes.
    pub events: EventBus,
    /// Shared metrics registry.
    pub metrics: Metrics,
    /// Scratch directory for downloads.
    pub scratch: ScratchSpace,
}

/// Limits and texts applied to every transfer.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Size admission rules.
    pub gate: SizeGate,
    /// Maximum transfers between permit and terminal phase.
    pub max_concurrent: usize,
    /// Overall deadline per transfer.
    pub timeout: Duration,
    /// Handle credited on the final card.
    pub creator_username: String,
}

/// Runs transfers end to end.
pub struct TransferOrchestrator {
    channel: Arc<dyn MessagingChannel>,
    downloader: DualPathDownloader,
    publisher: RemotePublisher,
    shortener: Arc<dyn LinkShortener>,
    notifier: CompletionNotifier,
    events: EventBus,
    metrics: Metrics,
    scratch: ScratchSpace,
    gate: SizeGate,
    permits: Semaphore,
    timeout: Duration,
    creator_username: String,
}

impl TransferOrchestrator {
    /// Assemble an orchestrator.
    #[must_use]
    pub fn new(deps: OrchestratorDeps, settings: OrchestratorSettings) -> Self {
        Self {
            channel: deps.channel,
            downloader: deps.downloader,
            publisher: deps.publisher,
            shortener: deps.shortener,
            notifier: deps.notifier,
            events: deps.events,
            metrics: deps.metrics,
            scratch: deps.scratch,
            gate: settings.gate,
            permits: Semaphore::new(settings.max_concurrent.max(1)),
            timeout: settings.timeout,
            creator_username: settings.creator_username,
        }
    }

    /// Run `submit` on a background task.
    pub fn spawn(self: &Arc<Self>, media: DeclaredMedia, requester: Requester) -> JoinHandle<()> {
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(err) = orchestrator.submit(media, requester).await {
                debug!(reason = err.reason(), "submission rejected at admission");
            }
        })
    }

    /// Admit and run one transfer to a terminal phase.
    ///
    /// # Errors
    ///
    /// Returns the admission error when the declared size is rejected; the
    /// requester has already been told. Every admitted transfer yields `Ok`,
    /// whether it completed or aborted.
    pub async fn submit(
        &self,
        media: DeclaredMedia,
        requester: Requester,
    ) -> Result<Transfer, TransferError> {
        if let Err(err) = self.gate.admit(media.size) {
            info!(
                reason = err.reason(),
                size = ?media.size,
                user_id = requester.user_id,
                "transfer rejected"
            );
            self.metrics.inc_transfer("rejected");
            self.send(requester.chat_id, err.user_message(), None).await;
            return Err(err);
        }

        let mut transfer = Transfer::new(media, requester);
        let span = transfer_span(
            transfer.id,
            transfer.requester.user_id,
            &transfer.media.name,
        );
        let id = transfer.id;
        publish_event(
            &self.events,
            &self.metrics,
            Event::TransferAdmitted {
                transfer_id: id,
                name: transfer.media.name.clone(),
                declared_size: transfer.media.size,
            },
        );
        let _active = ActiveTransfer::start(&self.metrics);
        with_transfer_context(id, self.run(&mut transfer).instrument(span)).await;
        Ok(transfer)
    }

    async fn run(&self, transfer: &mut Transfer) {
        let Ok(_permit) = self.permits.acquire().await else {
            self.abort(transfer, None, TransferError::internal("transfer.permit"))
                .await;
            return;
        };
        let scratch = match self.scratch.acquire(transfer.media.extension()).await {
            Ok(file) => file,
            Err(err) => {
                let err = TransferError::Internal {
                    operation: "scratch.acquire",
                    source: Some(err.into()),
                };
                self.abort(transfer, None, err).await;
                return;
            }
        };

        let mut status = None;
        let outcome =
            tokio::time::timeout(self.timeout, self.pipeline(transfer, &scratch, &mut status))
                .await;
        scratch.release().await;

        match outcome {
            Ok(Ok(link)) => self.finish(transfer, status, &link).await,
            Ok(Err(err)) => self.abort(transfer, status, err).await,
            Err(_) => {
                let err = TransferError::TimedOut {
                    after: self.timeout,
                };
                self.abort(transfer, status, err).await;
            }
        }
    }

    async fn pipeline(
        &self,
        transfer: &mut Transfer,
        scratch: &ScratchFile,
        status: &mut Option<MessageHandle>,
    ) -> Result<ShortLink, TransferError> {
        self.enter(transfer, TransferPhase::Downloading)?;
        *status = match self
            .channel
            .send_text(
                transfer.requester.chat_id,
                &downloading_text(transfer.media.size_or_zero()),
                None,
            )
            .await
        {
            Ok(handle) => Some(handle),
            Err(err) => {
                warn!(error = %err, operation = err.operation, "failed to post status line");
                None
            }
        };
        let handle = *status;

        let observer = StatusProgress {
            channel: self.channel.as_ref(),
            handle,
            events: &self.events,
            metrics: &self.metrics,
            transfer_id: transfer.id,
        };
        let report = self
            .downloader
            .download(&transfer.media.source, scratch, &observer)
            .await?;
        self.enter(transfer, TransferPhase::Downloaded)?;
        self.edit_status(handle, &downloaded_text(report.bytes_written))
            .await;

        self.enter(transfer, TransferPhase::Uploading)?;
        self.edit_status(handle, UPLOADING_TEXT).await;
        let canonical = self
            .publisher
            .publish(scratch.path(), &transfer.media.name)
            .await?;
        self.enter(transfer, TransferPhase::Uploaded)?;

        self.enter(transfer, TransferPhase::Shortening)?;
        self.edit_status(handle, SHORTENING_TEXT).await;
        let link = shorten_or_fallback(self.shortener.as_ref(), &canonical, &self.metrics).await;
        if link.degraded {
            transfer.degrade(Degradation::ShortenDegraded);
        }
        Ok(link)
    }

    async fn finish(&self, transfer: &mut Transfer, status: Option<MessageHandle>, link: &ShortLink) {
        if let Err(err) = transfer.complete(link.url()) {
            self.abort(transfer, status, err).await;
            return;
        }
        self.record_phase(transfer.id, TransferPhase::Completed);

        let card = ready_card(&transfer.media, &self.creator_username);
        let keyboard = Keyboard::link(DOWNLOAD_BUTTON_LABEL, link.url());
        self.deliver(transfer.requester.chat_id, status, &card, Some(&keyboard))
            .await;

        if !self
            .notifier
            .notify_completed(&transfer.requester, &transfer.media, link.url())
            .await
        {
            transfer.degrade(Degradation::NotificationFailed);
        }

        publish_event(
            &self.events,
            &self.metrics,
            Event::TransferCompleted {
                transfer_id: transfer.id,
                url: link.url().to_string(),
            },
        );
        self.metrics.inc_transfer("completed");
        info!(
            url = link.url(),
            shorten_degraded = link.degraded,
            degradations = transfer.degradations().len(),
            "transfer completed"
        );
    }

    async fn abort(
        &self,
        transfer: &mut Transfer,
        status: Option<MessageHandle>,
        err: TransferError,
    ) {
        warn!(error = ?err, reason = err.reason(), phase = transfer.phase().as_str(), "transfer aborted");
        let message = err.user_message();
        let reason = err.reason();
        if !transfer.abort(err) {
            return;
        }
        self.record_phase(transfer.id, TransferPhase::Aborted);
        self.deliver(transfer.requester.chat_id, status, message, None)
            .await;
        publish_event(
            &self.events,
            &self.metrics,
            Event::TransferAborted {
                transfer_id: transfer.id,
                reason: reason.to_string(),
            },
        );
        self.metrics.inc_transfer("aborted");
    }

    fn enter(&self, transfer: &mut Transfer, phase: TransferPhase) -> Result<(), TransferError> {
        transfer.advance(phase)?;
        self.record_phase(transfer.id, phase);
        Ok(())
    }

    fn record_phase(&self, transfer_id: Uuid, phase: TransferPhase) {
        Span::current().record("phase", phase.as_str());
        self.metrics.inc_phase(phase.as_str());
        publish_event(
            &self.events,
            &self.metrics,
            Event::PhaseChanged { transfer_id, phase },
        );
        debug!(phase = phase.as_str(), "phase entered");
    }

    async fn edit_status(&self, status: Option<MessageHandle>, text: &str) {
        let Some(handle) = status else {
            return;
        };
        if let Err(err) = self.channel.edit_text(&handle, text, None).await {
            warn!(error = %err, operation = err.operation, "status edit failed");
        }
    }

    /// Replace the status line with `text`, posting a new message when there is
    /// no status line or the edit fails.
    async fn deliver(
        &self,
        chat_id: i64,
        status: Option<MessageHandle>,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) {
        if let Some(handle) = status {
            match self.channel.edit_text(&handle, text, keyboard).await {
                Ok(()) => return,
                Err(err) => {
                    warn!(error = %err, operation = err.operation, "status edit failed; posting instead");
                }
            }
        }
        self.send(chat_id, text, keyboard).await;
    }

    async fn send(&self, chat_id: i64, text: &str, keyboard: Option<&Keyboard>) {
        if let Err(err) = self.channel.send_text(chat_id, text, keyboard).await {
            warn!(error = %err, operation = err.operation, chat_id, "failed to send message");
        }
    }
}

/// Keeps the active-transfer gauge balanced even when the task is cancelled.
struct ActiveTransfer<'a> {
    metrics: &'a Metrics,
}

impl<'a> ActiveTransfer<'a> {
    fn start(metrics: &'a Metrics) -> Self {
        metrics.transfer_started();
        Self { metrics }
    }
}

impl Drop for ActiveTransfer<'_> {
    fn drop(&mut self) {
        self.metrics.transfer_finished();
    }
}

/// Mirrors bulk download progress onto the status line and the event bus.
struct StatusProgress<'a> {
    channel: &'a dyn MessagingChannel,
    handle: Option<MessageHandle>,
    events: &'a EventBus,
    metrics: &'a Metrics,
    transfer_id: Uuid,
}

#[async_trait]
impl ProgressObserver for StatusProgress<'_> {
    async fn on_progress(&self, bytes_downloaded: u64) -> CollaboratorResult<()> {
        publish_event(
            self.events,
            self.metrics,
            Event::Progress {
                transfer_id: self.transfer_id,
                bytes_downloaded,
            },
        );
        if let Some(handle) = &self.handle {
            self.channel
                .edit_text(handle, &progress_text(bytes_downloaded), None)
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_core::{
        ButtonAction, DirectFetchPath, NotificationSink, PublishStep, StorageProvider,
    };
    use ferry_test_support::fixtures::{MIB as TEST_MIB, dir_entries, document, payload, requester};
    use ferry_test_support::mocks::{
        FakeBulkPath, FakeDirectPath, FakeShortener, FakeSource, FakeStorage, RecordingChannel,
        RecordingSink,
    };
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        channel: Arc<RecordingChannel>,
        sink: Arc<RecordingSink>,
        storage: Arc<FakeStorage>,
        shortener: Arc<FakeShortener>,
        events: EventBus,
        metrics: Metrics,
    }

    impl Fixture {
        fn new() -> anyhow::Result<Self> {
            Self::with_storage(FakeStorage::new())
        }

        fn with_storage(storage: FakeStorage) -> anyhow::Result<Self> {
            Ok(Self {
                dir: TempDir::new()?,
                channel: Arc::new(RecordingChannel::default()),
                sink: Arc::new(RecordingSink::default()),
                storage: Arc::new(storage),
                shortener: Arc::new(FakeShortener::default()),
                events: EventBus::new(),
                metrics: Metrics::new()?,
            })
        }

        fn orchestrator(
            &self,
            bulk: Option<FakeBulkPath>,
            direct: FakeDirectPath,
            settings: OrchestratorSettings,
        ) -> TransferOrchestrator {
            let bulk = bulk.map(|bulk| Arc::new(bulk) as Arc<dyn ferry_core::BulkTransferPath>);
            let direct: Arc<dyn DirectFetchPath> = Arc::new(direct);
            let storage: Arc<dyn StorageProvider> = self.storage.clone();
            let sink: Arc<dyn NotificationSink> = self.sink.clone();
            TransferOrchestrator::new(
                OrchestratorDeps {
                    channel: self.channel.clone(),
                    downloader: DualPathDownloader::new(bulk, direct, MIB, self.metrics.clone()),
                    publisher: RemotePublisher::new(storage, "Telegram Bot"),
                    shortener: self.shortener.clone(),
                    notifier: CompletionNotifier::new(sink, self.metrics.clone()),
                    events: self.events.clone(),
                    metrics: self.metrics.clone(),
                    scratch: ScratchSpace::new(self.dir.path()),
                },
                settings,
            )
        }

        fn scratch_is_empty(&self) -> anyhow::Result<bool> {
            Ok(dir_entries(self.dir.path())?.is_empty())
        }

        fn event_kinds(&self) -> Vec<&'static str> {
            self.events
                .backlog_since(0)
                .into_iter()
                .map(|env| env.event.kind())
                .collect()
        }
    }

    fn settings() -> OrchestratorSettings {
        OrchestratorSettings {
            gate: SizeGate::new(2_000 * TEST_MIB, 5 * 1024 * TEST_MIB),
            max_concurrent: 4,
            timeout: Duration::from_secs(30),
            creator_username: "@ferry_admin".to_string(),
        }
    }

    #[tokio::test]
    async fn completed_transfer_delivers_card_and_one_notification() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        let bytes = payload(4096);
        let orchestrator = fixture.orchestrator(
            None,
            FakeDirectPath::new(FakeSource::Serve(bytes.clone())),
            settings(),
        );

        let transfer = orchestrator
            .submit(document("f1", "report.pdf", Some(4096)), requester(42))
            .await?;

        assert_eq!(transfer.phase(), TransferPhase::Completed);
        assert_eq!(transfer.result_url(), Some("https://tiny.test/1"));
        assert!(transfer.degradations().is_empty());
        assert!(fixture.scratch_is_empty()?);

        let sent = fixture.channel.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].text, "📥 Downloading your file (4096 bytes)...");

        let edits = fixture.channel.edits().await;
        let texts: Vec<_> = edits.iter().map(|edit| edit.text.as_str()).collect();
        assert_eq!(
            texts[..3],
            [
                "📥 Download complete! (4096 bytes)",
                UPLOADING_TEXT,
                SHORTENING_TEXT
            ]
        );
        let card = edits.last().ok_or_else(|| anyhow::anyhow!("no final card"))?;
        assert!(card.text.contains("📁 File Name: `report.pdf`"));
        assert!(card.text.ends_with("Bot created by @ferry_admin"));
        let keyboard = card
            .keyboard
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("card without button"))?;
        assert_eq!(keyboard.rows[0][0].label, DOWNLOAD_BUTTON_LABEL);
        assert_eq!(
            keyboard.rows[0][0].action,
            ButtonAction::Url("https://tiny.test/1".to_string())
        );

        let notices = fixture.sink.delivered().await;
        assert_eq!(notices.len(), 1);
        assert!(notices[0].contains("🔗 Short URL: https://tiny.test/1"));
        assert_eq!(fixture.storage.objects().await[0].content, bytes);
        assert_eq!(fixture.metrics.snapshot().active_transfers, 0);
        Ok(())
    }

    #[tokio::test]
    async fn bulk_failure_falls_back_and_completes() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        let orchestrator = fixture.orchestrator(
            Some(FakeBulkPath::new(FakeSource::Fail, 1024)),
            FakeDirectPath::new(FakeSource::Serve(payload(2048))),
            settings(),
        );

        let transfer = orchestrator
            .submit(document("f1", "a.bin", Some(2048)), requester(1))
            .await?;

        assert_eq!(transfer.phase(), TransferPhase::Completed);
        assert_eq!(fixture.storage.objects().await[0].content.len(), 2048);
        assert!(
            fixture
                .channel
                .edits()
                .await
                .iter()
                .any(|edit| edit.text == "📥 Download complete! (2048 bytes)")
        );
        assert!(fixture.scratch_is_empty()?);
        Ok(())
    }

    #[tokio::test]
    async fn both_paths_failing_aborts_without_notification() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        let orchestrator = fixture.orchestrator(
            Some(FakeBulkPath::new(FakeSource::Fail, 1024)),
            FakeDirectPath::new(FakeSource::Fail),
            settings(),
        );

        let transfer = orchestrator
            .submit(document("f1", "a.bin", Some(10)), requester(1))
            .await?;

        assert_eq!(transfer.phase(), TransferPhase::Aborted);
        assert!(matches!(
            transfer.error(),
            Some(TransferError::DownloadFailed { .. })
        ));
        assert_eq!(
            transfer.history(),
            [
                TransferPhase::Admitted,
                TransferPhase::Downloading,
                TransferPhase::Aborted
            ]
        );
        let edits = fixture.channel.edits().await;
        assert_eq!(
            edits.last().map(|edit| edit.text.as_str()),
            Some("❌ Failed to download file. Please try again.")
        );
        assert!(fixture.sink.delivered().await.is_empty());
        assert!(fixture.scratch_is_empty()?);
        assert!(fixture.event_kinds().contains(&"transfer_aborted"));
        Ok(())
    }

    #[tokio::test]
    async fn publish_failure_aborts_and_cleans_up() -> anyhow::Result<()> {
        let fixture =
            Fixture::with_storage(FakeStorage::new().failing_at(PublishStep::UploadContent))?;
        let orchestrator = fixture.orchestrator(
            None,
            FakeDirectPath::new(FakeSource::Serve(payload(64))),
            settings(),
        );

        let transfer = orchestrator
            .submit(document("f1", "a.bin", Some(64)), requester(1))
            .await?;

        assert!(matches!(
            transfer.error(),
            Some(TransferError::PublishFailed {
                step: PublishStep::UploadContent,
                ..
            })
        ));
        assert_eq!(transfer.history().last(), Some(&TransferPhase::Aborted));
        assert!(transfer.history().contains(&TransferPhase::Uploading));
        assert!(fixture.sink.delivered().await.is_empty());
        assert!(fixture.scratch_is_empty()?);
        Ok(())
    }

    #[tokio::test]
    async fn oversized_media_is_rejected_before_scratch_allocation() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        let direct = FakeDirectPath::new(FakeSource::Serve(payload(1)));
        let orchestrator = fixture.orchestrator(None, direct, settings());

        let err = orchestrator
            .submit(document("f1", "huge.iso", Some(2_001 * TEST_MIB)), requester(5))
            .await
            .err()
            .ok_or_else(|| anyhow::anyhow!("oversized media admitted"))?;

        assert!(matches!(err, TransferError::TooLargeForChannel { .. }));
        let sent = fixture.channel.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].chat_id, 5);
        assert_eq!(
            sent[0].text,
            "❌ File is too large for Telegram download. Maximum size is 2GB."
        );
        assert!(fixture.scratch_is_empty()?);
        assert!(fixture.event_kinds().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn deadline_aborts_with_timed_out() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        let mut limits = settings();
        limits.timeout = Duration::from_millis(50);
        let orchestrator = fixture.orchestrator(
            None,
            FakeDirectPath::new(FakeSource::Serve(payload(8))).with_delay(Duration::from_secs(5)),
            limits,
        );

        let transfer = orchestrator
            .submit(document("f1", "slow.bin", Some(8)), requester(1))
            .await?;

        assert!(matches!(
            transfer.error(),
            Some(TransferError::TimedOut { .. })
        ));
        assert!(fixture.scratch_is_empty()?);
        assert!(fixture.sink.delivered().await.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn dropped_transfer_task_removes_scratch_file() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        let orchestrator = Arc::new(fixture.orchestrator(
            None,
            FakeDirectPath::new(FakeSource::Serve(payload(8))).with_delay(Duration::from_secs(30)),
            settings(),
        ));

        let handle = orchestrator.spawn(document("f1", "slow.bin", Some(8)), requester(1));
        for _ in 0..100 {
            if !fixture.scratch_is_empty()? {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(dir_entries(fixture.dir.path())?.len(), 1);

        handle.abort();
        let _ = handle.await;
        assert!(fixture.scratch_is_empty()?);
        assert_eq!(fixture.metrics.snapshot().active_transfers, 0);
        Ok(())
    }

    #[tokio::test]
    async fn unreachable_shortener_delivers_canonical_url() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        fixture.shortener.fail();
        let orchestrator = fixture.orchestrator(
            None,
            FakeDirectPath::new(FakeSource::Serve(payload(16))),
            settings(),
        );

        let transfer = orchestrator
            .submit(document("f1", "a.bin", Some(16)), requester(1))
            .await?;

        let canonical = "https://drive.google.com/uc?id=obj-1&export=download";
        assert_eq!(transfer.phase(), TransferPhase::Completed);
        assert_eq!(transfer.result_url(), Some(canonical));
        assert_eq!(transfer.degradations(), [Degradation::ShortenDegraded]);
        let notices = fixture.sink.delivered().await;
        assert_eq!(notices.len(), 1);
        assert!(notices[0].contains(canonical));
        Ok(())
    }

    #[tokio::test]
    async fn notification_failure_is_recorded_not_fatal() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        fixture.sink.fail();
        let orchestrator = fixture.orchestrator(
            None,
            FakeDirectPath::new(FakeSource::Serve(payload(16))),
            settings(),
        );

        let transfer = orchestrator
            .submit(document("f1", "a.bin", Some(16)), requester(1))
            .await?;

        assert_eq!(transfer.phase(), TransferPhase::Completed);
        assert_eq!(transfer.degradations(), [Degradation::NotificationFailed]);
        assert_eq!(fixture.sink.attempts(), 1);
        assert_eq!(fixture.metrics.snapshot().notifications_failed_total, 1);
        Ok(())
    }

    #[tokio::test]
    async fn notifications_follow_completed_transfers_only() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        let orchestrator = Arc::new(fixture.orchestrator(
            None,
            FakeDirectPath::new(FakeSource::Serve(payload(32))),
            settings(),
        ));

        let mut completed = Vec::new();
        for idx in 0..3 {
            let transfer = orchestrator
                .submit(document(&format!("f{idx}"), "a.bin", Some(32)), requester(idx))
                .await?;
            completed.push(transfer);
        }
        let rejected = orchestrator
            .submit(
                document("big", "big.bin", Some(6 * 1024 * TEST_MIB)),
                requester(9),
            )
            .await;
        assert!(matches!(
            rejected,
            Err(TransferError::TooLargeForChannel { .. })
        ));

        let notices = fixture.sink.delivered().await;
        assert_eq!(notices.len(), completed.len());
        for transfer in &completed {
            let url = transfer
                .result_url()
                .ok_or_else(|| anyhow::anyhow!("completed transfer without url"))?;
            assert_eq!(
                notices
                    .iter()
                    .filter(|notice| notice.contains(&format!("🔗 Short URL: {url}\n")))
                    .count(),
                1
            );
        }
        Ok(())
    }

    #[tokio::test]
    async fn concurrent_transfers_share_one_folder() -> anyhow::Result<()> {
        let fixture =
            Fixture::with_storage(FakeStorage::new().with_lookup_delay(Duration::from_millis(50)))?;
        let orchestrator = Arc::new(fixture.orchestrator(
            None,
            FakeDirectPath::new(FakeSource::Serve(payload(8))),
            settings(),
        ));

        let first = orchestrator.spawn(document("a", "a.bin", Some(8)), requester(1));
        let second = orchestrator.spawn(document("b", "b.bin", Some(8)), requester(2));
        first.await?;
        second.await?;

        assert_eq!(fixture.storage.folder_creations(), 1);
        assert_eq!(fixture.storage.objects().await.len(), 2);
        assert_eq!(fixture.sink.delivered().await.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn concurrency_cap_queues_extra_transfers() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        let mut limits = settings();
        limits.max_concurrent = 1;
        let orchestrator = Arc::new(fixture.orchestrator(
            None,
            FakeDirectPath::new(FakeSource::Serve(payload(8)))
                .with_delay(Duration::from_millis(300)),
            limits,
        ));

        let first = orchestrator.spawn(document("a", "a.bin", Some(8)), requester(1));
        let second = orchestrator.spawn(document("b", "b.bin", Some(8)), requester(2));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(dir_entries(fixture.dir.path())?.len(), 1);
        assert_eq!(fixture.metrics.snapshot().active_transfers, 2);

        first.await?;
        second.await?;
        assert_eq!(fixture.sink.delivered().await.len(), 2);
        assert!(fixture.scratch_is_empty()?);
        Ok(())
    }

    #[tokio::test]
    async fn failed_edits_fall_back_to_new_messages() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        fixture.channel.fail_edits();
        let orchestrator = fixture.orchestrator(
            None,
            FakeDirectPath::new(FakeSource::Serve(payload(8))),
            settings(),
        );

        let transfer = orchestrator
            .submit(document("f1", "a.bin", Some(8)), requester(3))
            .await?;

        assert_eq!(transfer.phase(), TransferPhase::Completed);
        let sent = fixture.channel.sent().await;
        assert_eq!(sent.len(), 2);
        assert!(sent[1].text.contains("✅ Your file is ready to Download!"));
        assert!(sent[1].keyboard.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn bulk_progress_edits_status_and_publishes_events() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        let size = 3 * MIB;
        let orchestrator = fixture.orchestrator(
            Some(FakeBulkPath::new(
                FakeSource::Serve(payload(usize::try_from(size)?)),
                usize::try_from(MIB / 2)?,
            )),
            FakeDirectPath::new(FakeSource::Fail),
            settings(),
        );

        orchestrator
            .submit(document("f1", "a.bin", Some(size)), requester(1))
            .await?;

        let progress: Vec<_> = fixture
            .channel
            .edits()
            .await
            .into_iter()
            .map(|edit| edit.text)
            .filter(|text| text.starts_with("📥 Downloading..."))
            .collect();
        assert_eq!(
            progress,
            [
                "📥 Downloading... 1MB downloaded",
                "📥 Downloading... 2MB downloaded",
                "📥 Downloading... 3MB downloaded"
            ]
        );
        let kinds = fixture.event_kinds();
        assert_eq!(kinds.iter().filter(|kind| **kind == "progress").count(), 3);
        assert_eq!(kinds.first(), Some(&"transfer_admitted"));
        assert_eq!(kinds.last(), Some(&"transfer_completed"));
        Ok(())
    }

    #[test]
    fn status_texts_match_channel_copy() {
        assert_eq!(progress_text(5 * MIB + 17), "📥 Downloading... 5MB downloaded");
        assert_eq!(downloading_text(0), "📥 Downloading your file (0 bytes)...");
        let card = ready_card(&document("f", "x.zip", Some(10)), "@me");
        assert_eq!(
            card,
            "📁 File Name: `x.zip`\n📊 File Size: 10 bytes\n\n✅ Your file is ready to Download!\n\nBot created by @me"
        );
    }
}
