//! Transfer state and the DTOs exchanged with collaborators.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TransferError;
use ferry_events::TransferPhase;

/// Name used when the messaging channel declares none.
pub const DEFAULT_MEDIA_NAME: &str = "file";

/// Opaque handle identifying an object held by the messaging channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    /// Channel-issued file identifier.
    pub file_id: String,
    /// Chat the carrying message was posted in.
    pub chat_id: Option<i64>,
    /// Identifier of the carrying message.
    pub message_id: Option<i64>,
}

impl MediaRef {
    /// Reference an object by file id only.
    #[must_use]
    pub fn new(file_id: impl Into<String>) -> Self {
        Self {
            file_id: file_id.into(),
            chat_id: None,
            message_id: None,
        }
    }
}

/// Payload categories accepted for transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    /// Generic document.
    Document,
    /// Photo (largest rendition).
    Photo,
    /// Video file.
    Video,
    /// Audio track.
    Audio,
    /// Voice note.
    Voice,
    /// Round video note.
    VideoNote,
}

/// Media as declared by the channel, before any bytes are fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredMedia {
    /// Handle used by the download paths.
    pub source: MediaRef,
    /// Payload category.
    pub kind: MediaKind,
    /// Display name (defaults to `file`).
    pub name: String,
    /// Declared size; `None` when unknown.
    pub size: Option<u64>,
}

impl DeclaredMedia {
    /// Normalise channel metadata: blank names become `file`, zero sizes become unknown.
    #[must_use]
    pub fn new(source: MediaRef, kind: MediaKind, name: Option<String>, size: Option<u64>) -> Self {
        let name = name
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MEDIA_NAME.to_string());
        Self {
            source,
            kind,
            name,
            size: size.filter(|value| *value > 0),
        }
    }

    /// Extension of the display name, if any.
    #[must_use]
    pub fn extension(&self) -> Option<&str> {
        std::path::Path::new(&self.name)
            .extension()
            .and_then(|ext| ext.to_str())
    }

    /// Declared size rendered for status texts (`0` when unknown).
    #[must_use]
    pub fn size_or_zero(&self) -> u64 {
        self.size.unwrap_or(0)
    }
}

/// Identity of the user who submitted a transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requester {
    /// Channel user id.
    pub user_id: i64,
    /// Chat the status line and result are posted to.
    pub chat_id: i64,
    /// Given name.
    pub first_name: String,
    /// Family name, when shared.
    pub last_name: Option<String>,
    /// Public handle without `@`, when set.
    pub username: Option<String>,
}

impl Requester {
    /// `first last` with the last name omitted when absent.
    #[must_use]
    pub fn full_name(&self) -> String {
        match self.last_name.as_deref() {
            Some(last) if !last.is_empty() => format!("{} {last}", self.first_name),
            _ => self.first_name.clone(),
        }
    }

    /// Handle rendered for admin texts (`N/A` when unset).
    #[must_use]
    pub fn handle(&self) -> &str {
        self.username.as_deref().unwrap_or("N/A")
    }
}

/// A message posted by the relay that can be edited later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHandle {
    /// Chat holding the message.
    pub chat_id: i64,
    /// Message identifier within the chat.
    pub message_id: i64,
}

/// Action attached to an inline button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ButtonAction {
    /// Opens the URL.
    Url(String),
    /// Sends the callback payload back to the relay.
    Callback(String),
}

/// Single inline button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineButton {
    /// Visible label.
    pub label: String,
    /// What pressing the button does.
    pub action: ButtonAction,
}

/// Inline keyboard laid out in rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keyboard {
    /// Button rows, top to bottom.
    pub rows: Vec<Vec<InlineButton>>,
}

impl Keyboard {
    /// A keyboard holding one URL button.
    #[must_use]
    pub fn link(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self::default().url_row(label, url)
    }

    /// Append a row with one URL button.
    #[must_use]
    pub fn url_row(mut self, label: impl Into<String>, url: impl Into<String>) -> Self {
        self.rows.push(vec![InlineButton {
            label: label.into(),
            action: ButtonAction::Url(url.into()),
        }]);
        self
    }

    /// Append a row with one callback button.
    #[must_use]
    pub fn callback_row(mut self, label: impl Into<String>, data: impl Into<String>) -> Self {
        self.rows.push(vec![InlineButton {
            label: label.into(),
            action: ButtonAction::Callback(data.into()),
        }]);
        self
    }
}

/// Membership of a user in the gating channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberStatus {
    /// Regular member.
    Member,
    /// Channel administrator.
    Administrator,
    /// Channel owner.
    Creator,
    /// Left, kicked, restricted, or never joined.
    None,
}

impl MemberStatus {
    /// Whether the status grants access to the relay.
    #[must_use]
    pub const fn is_subscribed(self) -> bool {
        matches!(self, Self::Member | Self::Administrator | Self::Creator)
    }
}

/// Identity of the bot account behind the bulk path session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotIdentity {
    /// Bot user id.
    pub id: i64,
    /// Bot handle.
    pub username: Option<String>,
}

/// Media located by the bulk path and ready to be streamed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaHandle {
    /// Server-side locator of the object.
    pub locator: String,
    /// Size reported by the server, if any.
    pub size: Option<u64>,
}

/// Download path that produced the scratch file contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadPath {
    /// High-throughput streaming path.
    Bulk,
    /// Single-shot standard path.
    Direct,
}

impl DownloadPath {
    /// Stable label for logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bulk => "bulk",
            Self::Direct => "direct",
        }
    }
}

/// Outcome of a successful download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadReport {
    /// Bytes actually on disk.
    pub bytes_written: u64,
    /// Path that produced them.
    pub path: DownloadPath,
}

/// Destination folder in the remote store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFolder {
    /// Store-assigned identifier.
    pub id: String,
    /// Folder name.
    pub name: String,
}

/// Remote object record awaiting content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSession {
    /// Session URI content is streamed to.
    pub session_uri: String,
    /// Display name recorded on the object.
    pub name: String,
}

/// Remote object with committed content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObject {
    /// Store-assigned identifier.
    pub id: String,
}

impl RemoteObject {
    /// Canonical public download URL for the object.
    #[must_use]
    pub fn canonical_url(&self) -> String {
        format!("https://drive.google.com/uc?id={}&export=download", self.id)
    }
}

/// Public link delivered to the requester.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortLink {
    /// Canonical store URL.
    pub canonical: String,
    /// Shortened URL; equals `canonical` when degraded.
    pub short: String,
    /// Whether shortening failed and the canonical URL is used instead.
    pub degraded: bool,
}

impl ShortLink {
    /// Link handed to the requester.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.short
    }
}

/// Non-fatal failures recorded on an otherwise successful transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Degradation {
    /// Shortener failed; canonical URL delivered.
    ShortenDegraded,
    /// Admin notification could not be delivered.
    NotificationFailed,
}

/// One in-flight request moving one object end to end.
///
/// The scratch file backing the transfer is owned by the orchestrator's
/// storage guard, not by this record.
#[derive(Debug)]
pub struct Transfer {
    /// Transfer identifier.
    pub id: Uuid,
    /// What is being moved.
    pub media: DeclaredMedia,
    /// Who asked for it.
    pub requester: Requester,
    phase: TransferPhase,
    history: Vec<TransferPhase>,
    result_url: Option<String>,
    error: Option<TransferError>,
    degradations: Vec<Degradation>,
}

impl Transfer {
    /// Create an admitted transfer.
    #[must_use]
    pub fn new(media: DeclaredMedia, requester: Requester) -> Self {
        Self {
            id: Uuid::new_v4(),
            media,
            requester,
            phase: TransferPhase::Admitted,
            history: vec![TransferPhase::Admitted],
            result_url: None,
            error: None,
            degradations: Vec::new(),
        }
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> TransferPhase {
        self.phase
    }

    /// Every phase entered, in order.
    #[must_use]
    pub fn history(&self) -> &[TransferPhase] {
        &self.history
    }

    /// Link delivered to the requester, once completed.
    #[must_use]
    pub fn result_url(&self) -> Option<&str> {
        self.result_url.as_deref()
    }

    /// Abort reason, once aborted.
    #[must_use]
    pub const fn error(&self) -> Option<&TransferError> {
        self.error.as_ref()
    }

    /// Degradations recorded along the way.
    #[must_use]
    pub fn degradations(&self) -> &[Degradation] {
        &self.degradations
    }

    /// Move to `target` on the success path.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::Internal`] when the transition is illegal;
    /// the phase is left unchanged.
    pub fn advance(&mut self, target: TransferPhase) -> Result<(), TransferError> {
        if target == TransferPhase::Aborted || !self.phase.can_transition_to(target) {
            return Err(TransferError::internal("transfer.advance"));
        }
        self.enter(target);
        Ok(())
    }

    /// Record the link and enter `Completed`.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::Internal`] unless the transfer is shortening.
    pub fn complete(&mut self, url: impl Into<String>) -> Result<(), TransferError> {
        self.advance(TransferPhase::Completed)?;
        self.result_url = Some(url.into());
        Ok(())
    }

    /// Record the abort reason and enter `Aborted`.
    ///
    /// Returns `false` (and keeps the first reason) when already terminal.
    pub fn abort(&mut self, error: TransferError) -> bool {
        if !self.phase.can_transition_to(TransferPhase::Aborted) {
            return false;
        }
        self.enter(TransferPhase::Aborted);
        self.error = Some(error);
        true
    }

    /// Record a non-fatal degradation.
    pub fn degrade(&mut self, degradation: Degradation) {
        self.degradations.push(degradation);
    }

    fn enter(&mut self, phase: TransferPhase) {
        self.phase = phase;
        self.history.push(phase);
    }
}
