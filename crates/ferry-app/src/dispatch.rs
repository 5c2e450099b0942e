//! Update dispatch: commands, the subscription gate, and media submissions.
//!
//! # Design
//! - Updates are handled one at a time; transfers run on their own tasks so a
//!   long download never stalls the poll loop.
//! - The subscription gate caches positive answers only. A failed membership
//!   lookup counts as "not subscribed" and is retried on the next request.
//! - Transport errors in the poll loop back off and retry; a rejected token or
//!   other permanent API error stops the loop.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use ferry_core::{Keyboard, MessageHandle, MessagingChannel, NotificationSink};
use ferry_telegram::types::GetUpdatesRequest;
use ferry_telegram::{CallbackQuery, Message, TelegramClient, TelegramResult, Update, UpdateKind};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};
use crate::orchestrator::TransferOrchestrator;

/// Callback payload of the "I've Subscribed" button.
pub const CHECK_SUBSCRIPTION: &str = "check_subscription";

const NO_SENDER_TEXT: &str = "Sorry, I couldn't process this request. Please try again.";
const UNSUPPORTED_TEXT: &str = "Unsupported file type.";
const HELP_GATED_TEXT: &str = "Please use /start first and subscribe to our channel.";
/// Reply to uploads from users not confirmed as channel members.
pub const UPLOAD_GATED_TEXT: &str =
    "Please use /start first and subscribe to our channel to use this bot.";
const SUBSCRIBED_TEXT: &str = "Thank you for subscribing! ✅\n\n\
    Now you can send me any file and I'll upload it to Google Drive and generate a short \
    download link for you! Files are stored permanently on Google Drive.";
const NOT_SUBSCRIBED_TEXT: &str = "❌ I couldn't verify your subscription. Please make sure \
    you've subscribed to the channel and try again.";
const TEST_NOTICE: &str = "🔔 Test notification from your bot!\n\
    This confirms your notification system is working correctly.";
const TEST_SENT_TEXT: &str = "Test notification sent! Check your messages.";

const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Remembers users confirmed as channel members.
pub struct SubscriptionGate {
    channel: Arc<dyn MessagingChannel>,
    channel_username: String,
    verified: RwLock<HashSet<i64>>,
}

impl SubscriptionGate {
    /// Gate checking membership of `channel_username` (without `@`).
    #[must_use]
    pub fn new(channel: Arc<dyn MessagingChannel>, channel_username: impl Into<String>) -> Self {
        Self {
            channel,
            channel_username: channel_username.into(),
            verified: RwLock::new(HashSet::new()),
        }
    }

    /// Whether `user_id` may use the relay, consulting the cache first.
    pub async fn is_subscribed(&self, user_id: i64) -> bool {
        if self.verified.read().await.contains(&user_id) {
            return true;
        }
        self.verify(user_id).await
    }

    /// Ask the channel again, bypassing the cache.
    pub async fn verify(&self, user_id: i64) -> bool {
        match self
            .channel
            .member_status(&self.channel_username, user_id)
            .await
        {
            Ok(status) if status.is_subscribed() => {
                self.verified.write().await.insert(user_id);
                true
            }
            Ok(status) => {
                debug!(user_id, status = ?status, "user is not subscribed");
                false
            }
            Err(err) => {
                warn!(error = %err, operation = err.operation, user_id, "membership lookup failed");
                false
            }
        }
    }
}

/// Routes updates to command handlers and the orchestrator.
pub struct Dispatcher {
    channel: Arc<dyn MessagingChannel>,
    notifications: Arc<dyn NotificationSink>,
    orchestrator: Arc<TransferOrchestrator>,
    gate: SubscriptionGate,
    channel_username: String,
    creator_username: String,
}

impl Dispatcher {
    /// Assemble a dispatcher.
    #[must_use]
    pub fn new(
        channel: Arc<dyn MessagingChannel>,
        notifications: Arc<dyn NotificationSink>,
        orchestrator: Arc<TransferOrchestrator>,
        channel_username: impl Into<String>,
        creator_username: impl Into<String>,
    ) -> Self {
        let channel_username = channel_username.into();
        Self {
            gate: SubscriptionGate::new(Arc::clone(&channel), channel_username.clone()),
            channel,
            notifications,
            orchestrator,
            channel_username,
            creator_username: creator_username.into(),
        }
    }

    /// Subscription gate shared by every handler.
    #[must_use]
    pub const fn gate(&self) -> &SubscriptionGate {
        &self.gate
    }

    /// Handle one update. Returns the transfer task when a file was submitted.
    pub async fn handle(&self, update: Update) -> Option<JoinHandle<()>> {
        match update.kind {
            UpdateKind::Message(message) => self.on_message(message).await,
            UpdateKind::CallbackQuery(query) => {
                self.on_callback(query).await;
                None
            }
            UpdateKind::Unknown => {
                debug!(update_id = update.update_id, "ignoring unsupported update");
                None
            }
        }
    }

    async fn on_message(&self, message: Message) -> Option<JoinHandle<()>> {
        let chat_id = message.chat.id;
        if let Some(command) = message.command() {
            self.on_command(command, &message).await;
            return None;
        }
        let Some(user) = message.from.as_ref() else {
            warn!(chat_id, "message without a sender");
            self.reply(chat_id, NO_SENDER_TEXT, None).await;
            return None;
        };
        if !self.gate.is_subscribed(user.id).await {
            self.reply(chat_id, UPLOAD_GATED_TEXT, None).await;
            return None;
        }
        let Some(media) = message.declared_media() else {
            self.reply(chat_id, UNSUPPORTED_TEXT, None).await;
            return None;
        };
        info!(user_id = user.id, kind = ?media.kind, name = %media.name, "file received");
        Some(
            self.orchestrator
                .spawn(media, user.to_requester(chat_id)),
        )
    }

    async fn on_command(&self, command: &str, message: &Message) {
        let chat_id = message.chat.id;
        let Some(user) = message.from.as_ref() else {
            self.reply(chat_id, NO_SENDER_TEXT, None).await;
            return;
        };
        match command {
            "start" => {
                let text = welcome_text(&user.first_name, &self.creator_username, &self.channel_username);
                self.reply(chat_id, &text, Some(&self.subscribe_keyboard()))
                    .await;
            }
            "help" => {
                if self.gate.is_subscribed(user.id).await {
                    self.reply(chat_id, &help_text(&self.creator_username), None)
                        .await;
                } else {
                    self.reply(chat_id, HELP_GATED_TEXT, None).await;
                }
            }
            "myid" => {
                self.reply(chat_id, &format!("Your chat ID is: {}", user.id), None)
                    .await;
            }
            "test" => match self.notifications.notify(TEST_NOTICE).await {
                Ok(()) => self.reply(chat_id, TEST_SENT_TEXT, None).await,
                Err(err) => {
                    warn!(error = %err, operation = err.operation, "test notification failed");
                    self.reply(
                        chat_id,
                        &format!("Failed to send test notification: {err}"),
                        None,
                    )
                    .await;
                }
            },
            other => debug!(command = other, "ignoring unknown command"),
        }
    }

    async fn on_callback(&self, query: CallbackQuery) {
        if let Err(err) = self.channel.answer_callback(&query.id).await {
            debug!(error = %err, "failed to answer callback");
        }
        if query.data.as_deref() != Some(CHECK_SUBSCRIPTION) {
            debug!(data = ?query.data, "ignoring unknown callback");
            return;
        }
        let user_id = query.from.id;
        let (text, keyboard) = if self.gate.verify(user_id).await {
            (SUBSCRIBED_TEXT, None)
        } else {
            (NOT_SUBSCRIBED_TEXT, Some(self.subscribe_keyboard()))
        };
        match query.message.as_ref() {
            Some(message) => {
                let handle = MessageHandle {
                    chat_id: message.chat.id,
                    message_id: message.message_id,
                };
                if let Err(err) = self
                    .channel
                    .edit_text(&handle, text, keyboard.as_ref())
                    .await
                {
                    warn!(error = %err, operation = err.operation, "failed to update subscription prompt");
                }
            }
            None => self.reply(user_id, text, keyboard.as_ref()).await,
        }
    }

    fn subscribe_keyboard(&self) -> Keyboard {
        Keyboard::link(
            "Subscribe to Channel",
            format!("https://t.me/{}", self.channel_username),
        )
        .callback_row("I've Subscribed", CHECK_SUBSCRIPTION)
    }

    async fn reply(&self, chat_id: i64, text: &str, keyboard: Option<&Keyboard>) {
        if let Err(err) = self.channel.send_text(chat_id, text, keyboard).await {
            warn!(error = %err, operation = err.operation, chat_id, "failed to reply");
        }
    }
}

fn welcome_text(first_name: &str, creator: &str, channel: &str) -> String {
    format!(
        "Hi {first_name}!\n\n\
         File2Link is used to convert files into high-speed download links.\n\
         This bot is created by {creator}.\n\n\
         To use this bot, please subscribe to our channel @{channel} first.\n\n\
         After subscribing, click the 'I've Subscribed' button below."
    )
}

fn help_text(creator: &str) -> String {
    format!(
        "Just send me any file (document, image, video, audio) and I'll upload it to Google Drive \
         and generate a short download link for you! Files are stored permanently on Google Drive.\n\n\
         This bot is created by {creator}."
    )
}

/// Long-polls the Bot API and feeds the dispatcher.
pub struct UpdatePoller {
    client: TelegramClient,
    dispatcher: Arc<Dispatcher>,
    poll_timeout_secs: u64,
}

impl UpdatePoller {
    /// Poller holding each `getUpdates` open for `poll_timeout_secs`.
    #[must_use]
    pub const fn new(client: TelegramClient, dispatcher: Arc<Dispatcher>, poll_timeout_secs: u64) -> Self {
        Self {
            client,
            dispatcher,
            poll_timeout_secs,
        }
    }

    /// Fetch and dispatch one batch, returning the offset for the next poll.
    ///
    /// # Errors
    ///
    /// Returns the Bot API error when `getUpdates` fails.
    pub async fn poll_once(&self, offset: Option<i64>) -> TelegramResult<Option<i64>> {
        let updates = self
            .client
            .get_updates(&GetUpdatesRequest {
                offset,
                timeout: Some(self.poll_timeout_secs),
                allowed_updates: vec!["message", "callback_query"],
            })
            .await?;
        let mut next = offset;
        for update in updates {
            next = Some(update.update_id + 1);
            let _transfer = self.dispatcher.handle(update).await;
        }
        Ok(next)
    }

    /// Poll until `shutdown` resolves or the API rejects the bot permanently.
    ///
    /// # Errors
    ///
    /// Returns an error when `getUpdates` fails with a non-retryable error.
    pub async fn run<F>(&self, shutdown: F) -> AppResult<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut offset = None;
        let mut backoff = Duration::from_secs(1);
        loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!("update polling stopped");
                    return Ok(());
                }
                polled = self.poll_once(offset) => match polled {
                    Ok(next) => {
                        offset = next;
                        backoff = Duration::from_secs(1);
                    }
                    Err(err) if err.is_retryable() => {
                        warn!(error = %err, operation = err.operation(), backoff_secs = backoff.as_secs(), "polling failed; retrying");
                        tokio::time::sleep(backoff).await;
                        backoff = (backoff * 2).min(MAX_BACKOFF);
                    }
                    Err(err) => return Err(AppError::telegram("telegram.get_updates", err)),
                },
            }
        }
    }
}
