//! In-memory collaborators that record every call.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use ferry_core::{
    BotIdentity, BulkTransferPath, ChunkStream, CollaboratorError, CollaboratorResult,
    DirectFetchPath, Keyboard, LinkShortener, MediaHandle, MediaRef, MemberStatus, MessageHandle,
    MessagingChannel, NotificationSink, ProgressObserver, PublishStep, RemoteFolder, RemoteObject,
    StorageProvider, UploadSession,
};
use futures_util::StreamExt;
use tokio::sync::RwLock;

/// Message posted through [`RecordingChannel`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    /// Target chat.
    pub chat_id: i64,
    /// Message text.
    pub text: String,
    /// Attached keyboard.
    pub keyboard: Option<Keyboard>,
}

/// Edit applied through [`RecordingChannel`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditedMessage {
    /// Edited message.
    pub handle: MessageHandle,
    /// Replacement text.
    pub text: String,
    /// Replacement keyboard.
    pub keyboard: Option<Keyboard>,
}

/// Messaging fake with configurable membership and edit failures.
#[derive(Debug, Default)]
pub struct RecordingChannel {
    sent: RwLock<Vec<SentMessage>>,
    edits: RwLock<Vec<EditedMessage>>,
    members: RwLock<HashMap<i64, MemberStatus>>,
    answered: RwLock<Vec<String>>,
    next_id: AtomicI64,
    member_lookups: AtomicUsize,
    fail_edits: AtomicBool,
    fail_lookups: AtomicBool,
}

impl RecordingChannel {
    /// Report `status` for `user_id` on every membership lookup.
    pub async fn set_member(&self, user_id: i64, status: MemberStatus) {
        self.members.write().await.insert(user_id, status);
    }

    /// Make every edit fail.
    pub fn fail_edits(&self) {
        self.fail_edits.store(true, Ordering::SeqCst);
    }

    /// Make every membership lookup fail.
    pub fn fail_lookups(&self) {
        self.fail_lookups.store(true, Ordering::SeqCst);
    }

    /// Messages posted so far.
    pub async fn sent(&self) -> Vec<SentMessage> {
        self.sent.read().await.clone()
    }

    /// Edits applied so far.
    pub async fn edits(&self) -> Vec<EditedMessage> {
        self.edits.read().await.clone()
    }

    /// Callback ids acknowledged so far.
    pub async fn answered(&self) -> Vec<String> {
        self.answered.read().await.clone()
    }

    /// Membership lookups performed so far.
    #[must_use]
    pub fn member_lookups(&self) -> usize {
        self.member_lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessagingChannel for RecordingChannel {
    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> CollaboratorResult<MessageHandle> {
        self.sent.write().await.push(SentMessage {
            chat_id,
            text: text.to_string(),
            keyboard: keyboard.cloned(),
        });
        Ok(MessageHandle {
            chat_id,
            message_id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
        })
    }

    async fn edit_text(
        &self,
        handle: &MessageHandle,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> CollaboratorResult<()> {
        if self.fail_edits.load(Ordering::SeqCst) {
            return Err(CollaboratorError::message("fake.edit_text", "edit rejected"));
        }
        self.edits.write().await.push(EditedMessage {
            handle: *handle,
            text: text.to_string(),
            keyboard: keyboard.cloned(),
        });
        Ok(())
    }

    async fn member_status(&self, _channel: &str, user_id: i64) -> CollaboratorResult<MemberStatus> {
        self.member_lookups.fetch_add(1, Ordering::SeqCst);
        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(CollaboratorError::message("fake.member_status", "lookup failed"));
        }
        Ok(self
            .members
            .read()
            .await
            .get(&user_id)
            .copied()
            .unwrap_or(MemberStatus::None))
    }

    async fn answer_callback(&self, callback_id: &str) -> CollaboratorResult<()> {
        self.answered.write().await.push(callback_id.to_string());
        Ok(())
    }
}

/// Notification sink that records deliveries or fails on demand.
#[derive(Debug, Default)]
pub struct RecordingSink {
    delivered: RwLock<Vec<String>>,
    attempts: AtomicUsize,
    fail: AtomicBool,
}

impl RecordingSink {
    /// Make every delivery fail.
    pub fn fail(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    /// Texts delivered so far.
    pub async fn delivered(&self) -> Vec<String> {
        self.delivered.read().await.clone()
    }

    /// Delivery attempts, including failed ones.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn notify(&self, text: &str) -> CollaboratorResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(CollaboratorError::message("fake.notify", "sink unavailable"));
        }
        self.delivered.write().await.push(text.to_string());
        Ok(())
    }
}

/// Behaviour of a fake download path.
#[derive(Debug, Clone)]
pub enum FakeSource {
    /// Serve these bytes.
    Serve(Vec<u8>),
    /// Fail every call.
    Fail,
    /// Report that the media does not exist (bulk path only).
    Missing,
}

/// Bulk path fake streaming a fixed payload in fixed-size chunks.
#[derive(Debug)]
pub struct FakeBulkPath {
    source: FakeSource,
    chunk_size: usize,
    fail_after: Option<usize>,
    identity_calls: AtomicUsize,
    opened: AtomicUsize,
}

impl FakeBulkPath {
    /// Fake that behaves as `source`, streaming in `chunk_size` pieces.
    #[must_use]
    pub const fn new(source: FakeSource, chunk_size: usize) -> Self {
        Self {
            source,
            chunk_size,
            fail_after: None,
            identity_calls: AtomicUsize::new(0),
            opened: AtomicUsize::new(0),
        }
    }

    /// Break the stream after `chunks` chunks.
    #[must_use]
    pub const fn failing_after(mut self, chunks: usize) -> Self {
        self.fail_after = Some(chunks);
        self
    }

    /// `get_self` invocations.
    #[must_use]
    pub fn identity_calls(&self) -> usize {
        self.identity_calls.load(Ordering::SeqCst)
    }

    /// Streams opened.
    #[must_use]
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BulkTransferPath for FakeBulkPath {
    async fn get_self(&self) -> CollaboratorResult<BotIdentity> {
        self.identity_calls.fetch_add(1, Ordering::SeqCst);
        Ok(BotIdentity {
            id: 1,
            username: Some("fake_bot".to_string()),
        })
    }

    async fn resolve_media(&self, source: &MediaRef) -> CollaboratorResult<Option<MediaHandle>> {
        match &self.source {
            FakeSource::Serve(bytes) => Ok(Some(MediaHandle {
                locator: source.file_id.clone(),
                size: Some(bytes.len() as u64),
            })),
            FakeSource::Missing => Ok(None),
            FakeSource::Fail => Err(CollaboratorError::message("fake.resolve_media", "bulk path down")),
        }
    }

    async fn open_chunks(&self, _media: &MediaHandle) -> CollaboratorResult<ChunkStream> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        let FakeSource::Serve(bytes) = &self.source else {
            return Err(CollaboratorError::message("fake.open_chunks", "bulk path down"));
        };
        let mut chunks: Vec<CollaboratorResult<Bytes>> = bytes
            .chunks(self.chunk_size.max(1))
            .map(|chunk| Ok(Bytes::copy_from_slice(chunk)))
            .collect();
        if let Some(limit) = self.fail_after {
            chunks.truncate(limit);
            chunks.push(Err(CollaboratorError::message(
                "fake.read_chunk",
                "stream interrupted",
            )));
        }
        Ok(futures_util::stream::iter(chunks).boxed())
    }
}

/// Direct path fake writing a fixed payload, optionally after a delay.
#[derive(Debug)]
pub struct FakeDirectPath {
    source: FakeSource,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl FakeDirectPath {
    /// Fake that behaves as `source`.
    #[must_use]
    pub const fn new(source: FakeSource) -> Self {
        Self {
            source,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Sleep for `delay` before writing.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// `fetch_to` invocations.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DirectFetchPath for FakeDirectPath {
    async fn fetch_to(&self, _source: &MediaRef, destination: &Path) -> CollaboratorResult<u64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.source {
            FakeSource::Serve(bytes) => {
                tokio::fs::write(destination, bytes)
                    .await
                    .map_err(|err| CollaboratorError::new("fake.fetch_to", err))?;
                Ok(bytes.len() as u64)
            }
            FakeSource::Fail | FakeSource::Missing => Err(CollaboratorError::message(
                "fake.fetch_to",
                "direct path down",
            )),
        }
    }
}

/// Object stored by [`FakeStorage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Assigned id.
    pub id: String,
    /// Parent folder id.
    pub folder_id: String,
    /// Display name.
    pub name: String,
    /// Uploaded content.
    pub content: Vec<u8>,
    /// Whether public read was granted.
    pub public: bool,
}

/// Storage fake with an injectable failing step.
#[derive(Debug, Default)]
pub struct FakeStorage {
    folders: RwLock<Vec<RemoteFolder>>,
    objects: RwLock<Vec<StoredObject>>,
    sessions: RwLock<HashMap<String, (String, String)>>,
    folder_lookups: AtomicUsize,
    folder_creations: AtomicUsize,
    lookup_delay: Option<Duration>,
    fail_at: Option<PublishStep>,
}

impl FakeStorage {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the given publication step.
    #[must_use]
    pub const fn failing_at(mut self, step: PublishStep) -> Self {
        self.fail_at = Some(step);
        self
    }

    /// Sleep inside folder lookups so concurrent callers overlap.
    #[must_use]
    pub const fn with_lookup_delay(mut self, delay: Duration) -> Self {
        self.lookup_delay = Some(delay);
        self
    }

    /// Folder creations performed.
    #[must_use]
    pub fn folder_creations(&self) -> usize {
        self.folder_creations.load(Ordering::SeqCst)
    }

    /// Folder lookups performed.
    #[must_use]
    pub fn folder_lookups(&self) -> usize {
        self.folder_lookups.load(Ordering::SeqCst)
    }

    /// Objects committed so far.
    pub async fn objects(&self) -> Vec<StoredObject> {
        self.objects.read().await.clone()
    }

    fn check(&self, step: PublishStep) -> CollaboratorResult<()> {
        if self.fail_at == Some(step) {
            return Err(CollaboratorError::message(step.as_str(), "storage failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl StorageProvider for FakeStorage {
    async fn find_folder(&self, name: &str) -> CollaboratorResult<Option<RemoteFolder>> {
        self.folder_lookups.fetch_add(1, Ordering::SeqCst);
        self.check(PublishStep::ResolveContainer)?;
        if let Some(delay) = self.lookup_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self
            .folders
            .read()
            .await
            .iter()
            .find(|folder| folder.name == name)
            .cloned())
    }

    async fn create_folder(&self, name: &str) -> CollaboratorResult<RemoteFolder> {
        let created = self.folder_creations.fetch_add(1, Ordering::SeqCst) + 1;
        let folder = RemoteFolder {
            id: format!("folder-{created}"),
            name: name.to_string(),
        };
        self.folders.write().await.push(folder.clone());
        Ok(folder)
    }

    async fn create_object(
        &self,
        parent: &RemoteFolder,
        name: &str,
    ) -> CollaboratorResult<UploadSession> {
        self.check(PublishStep::CreateObject)?;
        let mut sessions = self.sessions.write().await;
        let session_uri = format!("fake://session/{}", sessions.len() + 1);
        sessions.insert(session_uri.clone(), (parent.id.clone(), name.to_string()));
        drop(sessions);
        Ok(UploadSession {
            session_uri,
            name: name.to_string(),
        })
    }

    async fn upload_content(
        &self,
        session: &UploadSession,
        local: &Path,
    ) -> CollaboratorResult<RemoteObject> {
        self.check(PublishStep::UploadContent)?;
        let (folder_id, name) = self
            .sessions
            .read()
            .await
            .get(&session.session_uri)
            .cloned()
            .ok_or_else(|| CollaboratorError::message("fake.upload_content", "unknown session"))?;
        let content = tokio::fs::read(local)
            .await
            .map_err(|err| CollaboratorError::new("fake.upload_content", err))?;
        let mut objects = self.objects.write().await;
        let id = format!("obj-{}", objects.len() + 1);
        objects.push(StoredObject {
            id: id.clone(),
            folder_id,
            name,
            content,
            public: false,
        });
        drop(objects);
        Ok(RemoteObject { id })
    }

    async fn grant_public_read(&self, object: &RemoteObject) -> CollaboratorResult<()> {
        self.check(PublishStep::GrantPublicRead)?;
        let mut objects = self.objects.write().await;
        for stored in objects.iter_mut().filter(|stored| stored.id == object.id) {
            stored.public = true;
        }
        drop(objects);
        Ok(())
    }
}

/// Shortener fake returning `https://tiny.test/<n>` or failing.
#[derive(Debug, Default)]
pub struct FakeShortener {
    requests: RwLock<Vec<String>>,
    fail: AtomicBool,
}

impl FakeShortener {
    /// Make every call fail.
    pub fn fail(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    /// URLs submitted so far.
    pub async fn requests(&self) -> Vec<String> {
        self.requests.read().await.clone()
    }
}

#[async_trait]
impl LinkShortener for FakeShortener {
    async fn shorten(&self, url: &str) -> CollaboratorResult<String> {
        let count = {
            let mut requests = self.requests.write().await;
            requests.push(url.to_string());
            requests.len()
        };
        if self.fail.load(Ordering::SeqCst) {
            return Err(CollaboratorError::message("fake.shorten", "shortener unreachable"));
        }
        Ok(format!("https://tiny.test/{count}"))
    }
}

/// Progress observer recording every report.
#[derive(Debug, Default)]
pub struct RecordingProgress {
    reports: RwLock<Vec<u64>>,
    fail: AtomicBool,
}

impl RecordingProgress {
    /// Make every report fail after being recorded.
    pub fn fail(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    /// Cumulative byte counts reported so far.
    pub async fn reports(&self) -> Vec<u64> {
        self.reports.read().await.clone()
    }
}

#[async_trait]
impl ProgressObserver for RecordingProgress {
    async fn on_progress(&self, bytes_downloaded: u64) -> CollaboratorResult<()> {
        self.reports.write().await.push(bytes_downloaded);
        if self.fail.load(Ordering::SeqCst) {
            return Err(CollaboratorError::message("fake.on_progress", "observer failed"));
        }
        Ok(())
    }
}
