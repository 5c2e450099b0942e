//! Messaging adapter over the public Bot API.
//!
//! # Design
//! - One `TelegramChannel` serves user messaging, the direct download path,
//!   and the admin notification sink; all three share a single client.
//! - Editing a message to identical text is treated as success.

use std::path::Path;

use async_trait::async_trait;
use ferry_core::{
    CollaboratorError, CollaboratorResult, DirectFetchPath, Keyboard, MediaRef, MemberStatus,
    MessageHandle, MessagingChannel, NotificationSink,
};
use tracing::debug;

use crate::client::TelegramClient;
use crate::error::TelegramError;
use crate::types::{EditMessageTextRequest, InlineKeyboardMarkup, SendMessageRequest};

const NOT_MODIFIED: &str = "message is not modified";

/// Bot API adapter for messaging, direct downloads, and admin notices.
#[derive(Debug, Clone)]
pub struct TelegramChannel {
    client: TelegramClient,
    admin_chat_id: i64,
}

impl TelegramChannel {
    /// Wrap `client`; notifications go to `admin_chat_id`.
    #[must_use]
    pub const fn new(client: TelegramClient, admin_chat_id: i64) -> Self {
        Self {
            client,
            admin_chat_id,
        }
    }

    /// Underlying client.
    #[must_use]
    pub const fn client(&self) -> &TelegramClient {
        &self.client
    }
}

/// Map a `getChatMember` status string onto [`MemberStatus`].
#[must_use]
pub fn member_status_from(status: &str) -> MemberStatus {
    match status {
        "creator" => MemberStatus::Creator,
        "administrator" => MemberStatus::Administrator,
        "member" => MemberStatus::Member,
        _ => MemberStatus::None,
    }
}

#[async_trait]
impl MessagingChannel for TelegramChannel {
    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> CollaboratorResult<MessageHandle> {
        let message = self
            .client
            .send_message(&SendMessageRequest {
                chat_id,
                text: text.to_string(),
                reply_markup: keyboard.map(InlineKeyboardMarkup::from),
            })
            .await?;
        Ok(MessageHandle {
            chat_id: message.chat.id,
            message_id: message.message_id,
        })
    }

    async fn edit_text(
        &self,
        handle: &MessageHandle,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> CollaboratorResult<()> {
        let request = EditMessageTextRequest {
            chat_id: handle.chat_id,
            message_id: handle.message_id,
            text: text.to_string(),
            reply_markup: keyboard.map(InlineKeyboardMarkup::from),
        };
        match self.client.edit_message_text(&request).await {
            Ok(()) => Ok(()),
            Err(TelegramError::Api { description, .. }) if description.contains(NOT_MODIFIED) => {
                debug!(message_id = handle.message_id, "edit skipped; text unchanged");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn member_status(&self, channel: &str, user_id: i64) -> CollaboratorResult<MemberStatus> {
        let chat = format!("@{}", channel.trim_start_matches('@'));
        let member = self.client.get_chat_member(&chat, user_id).await?;
        Ok(member_status_from(&member.status))
    }

    async fn answer_callback(&self, callback_id: &str) -> CollaboratorResult<()> {
        self.client.answer_callback_query(callback_id).await?;
        Ok(())
    }
}

#[async_trait]
impl DirectFetchPath for TelegramChannel {
    async fn fetch_to(&self, source: &MediaRef, destination: &Path) -> CollaboratorResult<u64> {
        let file = self.client.get_file(&source.file_id).await?;
        let file_path = file
            .file_path
            .ok_or_else(|| CollaboratorError::message("getFile", "file has no download path"))?;
        Ok(self.client.download_to(&file_path, destination).await?)
    }
}

#[async_trait]
impl NotificationSink for TelegramChannel {
    async fn notify(&self, text: &str) -> CollaboratorResult<()> {
        self.send_text(self.admin_chat_id, text, None).await.map(drop)
    }
}
