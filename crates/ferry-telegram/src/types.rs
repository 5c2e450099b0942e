//! Bot API wire types.
//!
//! Only the fields the relay reads are modelled; unknown fields are ignored.

use ferry_core::{ButtonAction, DeclaredMedia, Keyboard, MediaKind, MediaRef, Requester};
use serde::{Deserialize, Serialize};

/// Envelope wrapping every Bot API response.
#[derive(Debug, Deserialize)]
pub struct TelegramResponse<T> {
    /// Whether the call succeeded.
    pub ok: bool,
    /// Payload on success.
    pub result: Option<T>,
    /// Error description on failure.
    pub description: Option<String>,
    /// Error code on failure.
    pub error_code: Option<i32>,
}

/// Incoming update.
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "RawUpdate")]
pub struct Update {
    /// Monotonic update identifier.
    pub update_id: i64,
    /// Update payload.
    pub kind: UpdateKind,
}

/// Update payloads the relay reacts to.
#[derive(Debug, Clone)]
pub enum UpdateKind {
    /// New message.
    Message(Message),
    /// Inline button press.
    CallbackQuery(CallbackQuery),
    /// Anything else (edits, polls, channel posts, ...).
    Unknown,
}

#[derive(Deserialize)]
struct RawUpdate {
    update_id: i64,
    message: Option<Message>,
    callback_query: Option<CallbackQuery>,
}

impl From<RawUpdate> for Update {
    fn from(raw: RawUpdate) -> Self {
        let kind = match (raw.message, raw.callback_query) {
            (Some(message), _) => UpdateKind::Message(message),
            (None, Some(query)) => UpdateKind::CallbackQuery(query),
            (None, None) => UpdateKind::Unknown,
        };
        Self {
            update_id: raw.update_id,
            kind,
        }
    }
}

/// Message object.
#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    /// Message identifier.
    pub message_id: i64,
    /// Sender, absent for channel posts.
    pub from: Option<User>,
    /// Chat the message belongs to.
    pub chat: Chat,
    /// Text body.
    pub text: Option<String>,
    /// Photo renditions, smallest first.
    pub photo: Option<Vec<PhotoSize>>,
    /// Attached document.
    pub document: Option<Document>,
    /// Attached video.
    pub video: Option<Video>,
    /// Attached audio track.
    pub audio: Option<Audio>,
    /// Attached voice note.
    pub voice: Option<Voice>,
    /// Attached round video.
    pub video_note: Option<VideoNote>,
}

impl Message {
    /// Bot command in the text (`/start@bot args` yields `start`).
    #[must_use]
    pub fn command(&self) -> Option<&str> {
        let text = self.text.as_deref()?.trim_start();
        let token = text.strip_prefix('/')?.split_whitespace().next()?;
        Some(token.split('@').next().unwrap_or(token))
    }

    /// Media attached to the message, first match in document, photo,
    /// video, audio, voice, video note order.
    #[must_use]
    pub fn declared_media(&self) -> Option<DeclaredMedia> {
        let reference = |file_id: &str| MediaRef {
            file_id: file_id.to_string(),
            chat_id: Some(self.chat.id),
            message_id: Some(self.message_id),
        };
        if let Some(doc) = &self.document {
            return Some(DeclaredMedia::new(
                reference(&doc.file_id),
                MediaKind::Document,
                doc.file_name.clone(),
                doc.file_size,
            ));
        }
        if let Some(largest) = self.photo.as_ref().and_then(|sizes| sizes.last()) {
            return Some(DeclaredMedia::new(
                reference(&largest.file_id),
                MediaKind::Photo,
                None,
                largest.file_size,
            ));
        }
        if let Some(video) = &self.video {
            return Some(DeclaredMedia::new(
                reference(&video.file_id),
                MediaKind::Video,
                video.file_name.clone(),
                video.file_size,
            ));
        }
        if let Some(audio) = &self.audio {
            return Some(DeclaredMedia::new(
                reference(&audio.file_id),
                MediaKind::Audio,
                audio.file_name.clone(),
                audio.file_size,
            ));
        }
        if let Some(voice) = &self.voice {
            return Some(DeclaredMedia::new(
                reference(&voice.file_id),
                MediaKind::Voice,
                None,
                voice.file_size,
            ));
        }
        self.video_note.as_ref().map(|note| {
            DeclaredMedia::new(
                reference(&note.file_id),
                MediaKind::VideoNote,
                None,
                note.file_size,
            )
        })
    }
}

/// User object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct User {
    /// User identifier.
    pub id: i64,
    /// Whether the account is a bot.
    #[serde(default)]
    pub is_bot: bool,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: Option<String>,
    /// Handle without `@`.
    pub username: Option<String>,
}

impl User {
    /// Requester identity for a transfer posted in `chat_id`.
    #[must_use]
    pub fn to_requester(&self, chat_id: i64) -> Requester {
        Requester {
            user_id: self.id,
            chat_id,
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            username: self.username.clone(),
        }
    }
}

/// Chat object.
#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    /// Chat identifier.
    pub id: i64,
    /// Chat type (`private`, `group`, ...).
    #[serde(rename = "type")]
    pub kind: String,
}

/// One photo rendition.
#[derive(Debug, Clone, Deserialize)]
pub struct PhotoSize {
    /// File identifier.
    pub file_id: String,
    /// Size in bytes.
    pub file_size: Option<u64>,
}

/// Document attachment.
#[derive(Debug, Clone, Deserialize)]
pub struct Document {
    /// File identifier.
    pub file_id: String,
    /// Original file name.
    pub file_name: Option<String>,
    /// Size in bytes.
    pub file_size: Option<u64>,
}

/// Video attachment.
#[derive(Debug, Clone, Deserialize)]
pub struct Video {
    /// File identifier.
    pub file_id: String,
    /// Original file name.
    pub file_name: Option<String>,
    /// Size in bytes.
    pub file_size: Option<u64>,
}

/// Audio attachment.
#[derive(Debug, Clone, Deserialize)]
pub struct Audio {
    /// File identifier.
    pub file_id: String,
    /// Original file name.
    pub file_name: Option<String>,
    /// Size in bytes.
    pub file_size: Option<u64>,
}

/// Voice note attachment.
#[derive(Debug, Clone, Deserialize)]
pub struct Voice {
    /// File identifier.
    pub file_id: String,
    /// Size in bytes.
    pub file_size: Option<u64>,
}

/// Round video attachment.
#[derive(Debug, Clone, Deserialize)]
pub struct VideoNote {
    /// File identifier.
    pub file_id: String,
    /// Size in bytes.
    pub file_size: Option<u64>,
}

/// Inline button press.
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    /// Query identifier, needed to answer it.
    pub id: String,
    /// User who pressed the button.
    pub from: User,
    /// Message carrying the keyboard.
    pub message: Option<Message>,
    /// Callback payload.
    pub data: Option<String>,
}

/// File metadata returned by `getFile`.
#[derive(Debug, Clone, Deserialize)]
pub struct File {
    /// File identifier.
    pub file_id: String,
    /// Size in bytes.
    pub file_size: Option<u64>,
    /// Server path for downloading; absent when unavailable.
    pub file_path: Option<String>,
}

/// Membership record returned by `getChatMember`.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatMember {
    /// `creator`, `administrator`, `member`, `restricted`, `left`, or `kicked`.
    pub status: String,
}

/// Inline keyboard markup.
#[derive(Debug, Clone, Serialize)]
pub struct InlineKeyboardMarkup {
    /// Button rows.
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

/// Inline keyboard button.
#[derive(Debug, Clone, Serialize)]
pub struct InlineKeyboardButton {
    /// Visible label.
    pub text: String,
    /// URL opened on press.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Payload sent back on press.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_data: Option<String>,
}

impl From<&Keyboard> for InlineKeyboardMarkup {
    fn from(keyboard: &Keyboard) -> Self {
        let inline_keyboard = keyboard
            .rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|button| {
                        let (url, callback_data) = match &button.action {
                            ButtonAction::Url(url) => (Some(url.clone()), None),
                            ButtonAction::Callback(data) => (None, Some(data.clone())),
                        };
                        InlineKeyboardButton {
                            text: button.label.clone(),
                            url,
                            callback_data,
                        }
                    })
                    .collect()
            })
            .collect();
        Self { inline_keyboard }
    }
}

/// `sendMessage` request body.
#[derive(Debug, Clone, Serialize)]
pub struct SendMessageRequest {
    /// Target chat.
    pub chat_id: i64,
    /// Message text.
    pub text: String,
    /// Inline keyboard.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<InlineKeyboardMarkup>,
}

/// `editMessageText` request body.
#[derive(Debug, Clone, Serialize)]
pub struct EditMessageTextRequest {
    /// Chat holding the message.
    pub chat_id: i64,
    /// Message to edit.
    pub message_id: i64,
    /// Replacement text.
    pub text: String,
    /// Replacement keyboard.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<InlineKeyboardMarkup>,
}

/// `getUpdates` request body.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GetUpdatesRequest {
    /// First update to return.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
    /// Long-poll timeout in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    /// Update kinds to receive.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub allowed_updates: Vec<&'static str>,
}
