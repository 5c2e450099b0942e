//! Traits implemented by the messaging, storage, and shortening adapters.

use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;

use crate::error::CollaboratorResult;
use crate::model::{
    BotIdentity, Keyboard, MediaHandle, MediaRef, MemberStatus, MessageHandle, RemoteFolder,
    RemoteObject, UploadSession,
};

/// Byte chunks produced by the bulk path.
pub type ChunkStream = BoxStream<'static, CollaboratorResult<Bytes>>;

/// User-facing messaging surface.
#[async_trait]
pub trait MessagingChannel: Send + Sync {
    /// Post a new message, optionally with an inline keyboard.
    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> CollaboratorResult<MessageHandle>;

    /// Replace the text (and keyboard) of a previously posted message.
    async fn edit_text(
        &self,
        handle: &MessageHandle,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> CollaboratorResult<()>;

    /// Membership of `user_id` in `channel` (handle without `@`).
    async fn member_status(&self, channel: &str, user_id: i64) -> CollaboratorResult<MemberStatus>;

    /// Acknowledge a button press; adapters without callbacks need not override.
    async fn answer_callback(&self, callback_id: &str) -> CollaboratorResult<()> {
        let _ = callback_id;
        Ok(())
    }
}

/// Standard single-shot download path.
#[async_trait]
pub trait DirectFetchPath: Send + Sync {
    /// Fetch the whole object into `destination`, returning the byte count.
    async fn fetch_to(&self, source: &MediaRef, destination: &Path) -> CollaboratorResult<u64>;
}

/// High-throughput streaming download path.
///
/// Implementations authenticate lazily and reuse the session for the life of the process.
#[async_trait]
pub trait BulkTransferPath: Send + Sync {
    /// Identity of the authenticated session.
    async fn get_self(&self) -> CollaboratorResult<BotIdentity>;

    /// Locate the media behind `source`; `None` when it carries no readable media.
    async fn resolve_media(&self, source: &MediaRef) -> CollaboratorResult<Option<MediaHandle>>;

    /// Open a chunk stream over the media bytes.
    async fn open_chunks(&self, media: &MediaHandle) -> CollaboratorResult<ChunkStream>;
}

/// Durable remote object store.
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Look up a live folder by exact name.
    async fn find_folder(&self, name: &str) -> CollaboratorResult<Option<RemoteFolder>>;

    /// Create a folder.
    async fn create_folder(&self, name: &str) -> CollaboratorResult<RemoteFolder>;

    /// Create an object record under `parent` and open an upload session for it.
    async fn create_object(
        &self,
        parent: &RemoteFolder,
        name: &str,
    ) -> CollaboratorResult<UploadSession>;

    /// Stream the file at `local` into the session.
    async fn upload_content(
        &self,
        session: &UploadSession,
        local: &Path,
    ) -> CollaboratorResult<RemoteObject>;

    /// Allow anyone with the link to read the object.
    async fn grant_public_read(&self, object: &RemoteObject) -> CollaboratorResult<()>;
}

/// URL shortening service.
#[async_trait]
pub trait LinkShortener: Send + Sync {
    /// Shorten `url`.
    async fn shorten(&self, url: &str) -> CollaboratorResult<String>;
}

/// Fixed privileged recipient of completion notices.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver `text`.
    async fn notify(&self, text: &str) -> CollaboratorResult<()>;
}

/// Receiver of cumulative download progress.
#[async_trait]
pub trait ProgressObserver: Send + Sync {
    /// Called with the cumulative byte count.
    async fn on_progress(&self, bytes_downloaded: u64) -> CollaboratorResult<()>;
}
