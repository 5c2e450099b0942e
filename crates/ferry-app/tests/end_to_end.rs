//! Drives a subscriber's upload from the raw Bot API update to the final card.

use std::sync::Arc;
use std::time::Duration;

use ferry_app::dispatch::Dispatcher;
use ferry_app::downloader::DualPathDownloader;
use ferry_app::notify::CompletionNotifier;
use ferry_app::orchestrator::{
    DOWNLOAD_BUTTON_LABEL, OrchestratorDeps, OrchestratorSettings, TransferOrchestrator,
};
use ferry_app::publisher::RemotePublisher;
use ferry_core::{
    BulkTransferPath, ButtonAction, DirectFetchPath, MemberStatus, NotificationSink, SizeGate,
    StorageProvider,
};
use ferry_events::{Event, EventBus, TransferPhase};
use ferry_fsops::ScratchSpace;
use ferry_telegram::Update;
use ferry_telemetry::Metrics;
use ferry_test_support::fixtures::{MIB, dir_entries, payload};
use ferry_test_support::mocks::{
    FakeBulkPath, FakeDirectPath, FakeShortener, FakeSource, FakeStorage, RecordingChannel,
    RecordingSink,
};
use serde_json::json;
use tempfile::TempDir;

const SUBSCRIBER: i64 = 501;

struct Relay {
    _scratch_dir: TempDir,
    scratch_root: std::path::PathBuf,
    channel: Arc<RecordingChannel>,
    sink: Arc<RecordingSink>,
    storage: Arc<FakeStorage>,
    events: EventBus,
    metrics: Metrics,
    orchestrator: Arc<TransferOrchestrator>,
    dispatcher: Dispatcher,
}

impl Relay {
    fn new(bulk: FakeBulkPath, direct: FakeDirectPath) -> anyhow::Result<Self> {
        let scratch_dir = TempDir::new()?;
        let scratch_root = scratch_dir.path().to_path_buf();
        let channel = Arc::new(RecordingChannel::default());
        let sink = Arc::new(RecordingSink::default());
        let storage = Arc::new(FakeStorage::new());
        let events = EventBus::new();
        let metrics = Metrics::new()?;

        let bulk: Arc<dyn BulkTransferPath> = Arc::new(bulk);
        let direct: Arc<dyn DirectFetchPath> = Arc::new(direct);
        let store: Arc<dyn StorageProvider> = storage.clone();
        let notices: Arc<dyn NotificationSink> = sink.clone();
        let orchestrator = Arc::new(TransferOrchestrator::new(
            OrchestratorDeps {
                channel: channel.clone(),
                downloader: DualPathDownloader::new(Some(bulk), direct, MIB, metrics.clone()),
                publisher: RemotePublisher::new(store, "Telegram Bot"),
                shortener: Arc::new(FakeShortener::default()),
                notifier: CompletionNotifier::new(notices.clone(), metrics.clone()),
                events: events.clone(),
                metrics: metrics.clone(),
                scratch: ScratchSpace::new(&scratch_root),
            },
            OrchestratorSettings {
                gate: SizeGate::new(2_000 * MIB, 5 * 1024 * MIB),
                max_concurrent: 2,
                timeout: Duration::from_secs(30),
                creator_username: "@ferry_admin".to_string(),
            },
        ));
        let dispatcher = Dispatcher::new(
            channel.clone(),
            notices,
            Arc::clone(&orchestrator),
            "ferrynews",
            "@ferry_admin",
        );
        Ok(Self {
            _scratch_dir: scratch_dir,
            scratch_root,
            channel,
            sink,
            storage,
            events,
            metrics,
            orchestrator,
            dispatcher,
        })
    }

    async fn deliver(&self, update: serde_json::Value) -> anyhow::Result<bool> {
        let update: Update = serde_json::from_value(update)?;
        match self.dispatcher.handle(update).await {
            Some(task) => {
                task.await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn phases(&self) -> Vec<TransferPhase> {
        self.events
            .backlog_since(0)
            .into_iter()
            .filter_map(|env| match env.event {
                Event::PhaseChanged { phase, .. } => Some(phase),
                _ => None,
            })
            .collect()
    }
}

fn document_update(update_id: i64, size: u64) -> serde_json::Value {
    json!({
        "update_id": update_id,
        "message": {
            "message_id": 10,
            "from": {"id": SUBSCRIBER, "is_bot": false, "first_name": "Grace", "username": "grace"},
            "chat": {"id": SUBSCRIBER, "type": "private"},
            "document": {"file_id": "doc-1", "file_name": "dataset.tar", "file_size": size}
        }
    })
}

#[tokio::test]
async fn subscriber_upload_runs_every_phase_and_notifies_once() -> anyhow::Result<()> {
    let size = 10 * MIB;
    let bytes = payload(usize::try_from(size)?);
    let relay = Relay::new(
        FakeBulkPath::new(FakeSource::Serve(bytes.clone()), 256 * 1024),
        FakeDirectPath::new(FakeSource::Fail),
    )?;
    relay
        .channel
        .set_member(SUBSCRIBER, MemberStatus::Member)
        .await;

    assert!(relay.deliver(document_update(1, size)).await?);

    let first = relay
        .events
        .backlog_since(0)
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("no events published"))?;
    assert_eq!(first.event.kind(), "transfer_admitted");
    assert_eq!(
        relay.phases(),
        vec![
            TransferPhase::Downloading,
            TransferPhase::Downloaded,
            TransferPhase::Uploading,
            TransferPhase::Uploaded,
            TransferPhase::Shortening,
            TransferPhase::Completed,
        ]
    );
    let progress = relay
        .events
        .backlog_since(0)
        .into_iter()
        .filter(|env| matches!(env.event, Event::Progress { .. }))
        .count();
    assert_eq!(progress, 10);

    let objects = relay.storage.objects().await;
    assert_eq!(objects.len(), 1);
    assert_eq!(objects[0].name, "dataset.tar");
    assert_eq!(objects[0].content, bytes);
    assert!(objects[0].public);

    let edits = relay.channel.edits().await;
    let card = edits
        .last()
        .ok_or_else(|| anyhow::anyhow!("no final card"))?;
    assert!(card.text.contains("📊 File Size: 10485760 bytes"));
    let keyboard = card
        .keyboard
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("card without button"))?;
    assert_eq!(keyboard.rows[0][0].label, DOWNLOAD_BUTTON_LABEL);
    assert_eq!(
        keyboard.rows[0][0].action,
        ButtonAction::Url("https://tiny.test/1".to_string())
    );

    let notices = relay.sink.delivered().await;
    assert_eq!(notices.len(), 1);
    assert!(notices[0].contains("👤 User: Grace (@grace)"));
    assert!(notices[0].contains("🔗 Short URL: https://tiny.test/1"));

    assert!(dir_entries(&relay.scratch_root)?.is_empty());
    let snapshot = relay.metrics.snapshot();
    assert_eq!(snapshot.active_transfers, 0);
    assert_eq!(snapshot.bytes_downloaded_total, size);
    Ok(())
}

#[tokio::test]
async fn direct_submission_records_full_phase_history() -> anyhow::Result<()> {
    let size = 10 * MIB;
    let relay = Relay::new(
        FakeBulkPath::new(FakeSource::Missing, 1024),
        FakeDirectPath::new(FakeSource::Serve(payload(usize::try_from(size)?))),
    )?;
    let media = ferry_test_support::fixtures::document("doc-2", "video.mp4", Some(size));

    let transfer = relay
        .orchestrator
        .submit(media, ferry_test_support::fixtures::requester(SUBSCRIBER))
        .await?;

    assert_eq!(
        transfer.history(),
        [
            TransferPhase::Admitted,
            TransferPhase::Downloading,
            TransferPhase::Downloaded,
            TransferPhase::Uploading,
            TransferPhase::Uploaded,
            TransferPhase::Shortening,
            TransferPhase::Completed,
        ]
    );
    assert_eq!(transfer.result_url(), Some("https://tiny.test/1"));
    assert_eq!(relay.sink.delivered().await.len(), 1);
    assert!(dir_entries(&relay.scratch_root)?.is_empty());
    Ok(())
}

#[tokio::test]
async fn non_subscriber_upload_is_gated_before_any_transfer() -> anyhow::Result<()> {
    let relay = Relay::new(
        FakeBulkPath::new(FakeSource::Serve(payload(16)), 8),
        FakeDirectPath::new(FakeSource::Fail),
    )?;

    assert!(!relay.deliver(document_update(2, 16)).await?);

    assert!(relay.events.backlog_since(0).is_empty());
    assert!(relay.storage.objects().await.is_empty());
    let sent = relay.channel.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].text, ferry_app::dispatch::UPLOAD_GATED_TEXT);
    assert!(relay.sink.delivered().await.is_empty());
    Ok(())
}
