//! Bot API client.

use std::path::Path;
use std::time::Duration;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;
use tracing::instrument;
use url::Url;

use crate::error::{TelegramError, TelegramResult};
use crate::types::{
    ChatMember, EditMessageTextRequest, File, GetUpdatesRequest, Message, SendMessageRequest,
    TelegramResponse, Update, User,
};

/// Extra time allowed on top of the long-poll timeout.
const POLL_GRACE: Duration = Duration::from_secs(10);

/// Thin typed wrapper over the Bot API HTTP surface.
#[derive(Clone)]
pub struct TelegramClient {
    token: String,
    client: Client,
    base_url: String,
}

impl std::fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl TelegramClient {
    /// Build a client for `base_url` (public API or a self-hosted server).
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(token: impl Into<String>, base_url: &Url, timeout: Duration) -> TelegramResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| TelegramError::http("client.build", err))?;
        Ok(Self {
            token: token.into(),
            client,
            base_url: base_url.as_str().trim_end_matches('/').to_string(),
        })
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }

    /// Download URL for a `file_path` returned by `getFile`.
    #[must_use]
    pub fn file_url(&self, file_path: &str) -> String {
        format!(
            "{}/file/bot{}/{}",
            self.base_url,
            self.token,
            file_path.trim_start_matches('/')
        )
    }

    async fn call<B, T>(
        &self,
        method: &'static str,
        body: &B,
        timeout: Option<Duration>,
    ) -> TelegramResult<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let mut request = self.client.post(self.api_url(method)).json(body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }
        let response: TelegramResponse<T> = request
            .send()
            .await
            .map_err(|err| TelegramError::http(method, err))?
            .json()
            .await
            .map_err(|err| TelegramError::http(method, err))?;

        if response.ok {
            response
                .result
                .ok_or(TelegramError::EmptyResult { operation: method })
        } else {
            Err(TelegramError::Api {
                operation: method,
                code: response.error_code.unwrap_or(0),
                description: response.description.unwrap_or_default(),
            })
        }
    }

    /// Identity of the bot.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or API rejection.
    #[instrument(skip(self))]
    pub async fn get_me(&self) -> TelegramResult<User> {
        self.call("getMe", &serde_json::json!({}), None).await
    }

    /// Long-poll for updates.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or API rejection.
    #[instrument(skip(self, request))]
    pub async fn get_updates(&self, request: &GetUpdatesRequest) -> TelegramResult<Vec<Update>> {
        let timeout = Duration::from_secs(request.timeout.unwrap_or(0)) + POLL_GRACE;
        self.call("getUpdates", request, Some(timeout)).await
    }

    /// Post a message.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or API rejection.
    #[instrument(skip_all)]
    pub async fn send_message(&self, request: &SendMessageRequest) -> TelegramResult<Message> {
        self.call("sendMessage", request, None).await
    }

    /// Edit the text of a posted message.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or API rejection.
    #[instrument(skip_all)]
    pub async fn edit_message_text(&self, request: &EditMessageTextRequest) -> TelegramResult<()> {
        self.call::<_, serde_json::Value>("editMessageText", request, None)
            .await
            .map(drop)
    }

    /// Membership record of `user_id` in `chat` (`@handle` or numeric id).
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or API rejection.
    #[instrument(skip(self))]
    pub async fn get_chat_member(&self, chat: &str, user_id: i64) -> TelegramResult<ChatMember> {
        self.call(
            "getChatMember",
            &serde_json::json!({ "chat_id": chat, "user_id": user_id }),
            None,
        )
        .await
    }

    /// Resolve a file id to a downloadable path.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or API rejection.
    #[instrument(skip(self))]
    pub async fn get_file(&self, file_id: &str) -> TelegramResult<File> {
        self.call("getFile", &serde_json::json!({ "file_id": file_id }), None)
            .await
    }

    /// Acknowledge a callback query.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or API rejection.
    #[instrument(skip(self))]
    pub async fn answer_callback_query(&self, callback_query_id: &str) -> TelegramResult<bool> {
        self.call(
            "answerCallbackQuery",
            &serde_json::json!({ "callback_query_id": callback_query_id }),
            None,
        )
        .await
    }

    /// Open a byte stream over a file returned by `getFile`.
    ///
    /// # Errors
    ///
    /// Returns an error when the request fails or the server answers with a
    /// non-success status.
    pub async fn open_file_stream(
        &self,
        file_path: &str,
    ) -> TelegramResult<impl Stream<Item = TelegramResult<Bytes>> + Send + 'static> {
        let response = self
            .client
            .get(self.file_url(file_path))
            .send()
            .await
            .map_err(|err| TelegramError::http("file.open", err))?;
        let status = response.status();
        if !status.is_success() {
            return Err(TelegramError::DownloadStatus {
                operation: "file.open",
                status: status.as_u16(),
            });
        }
        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|err| TelegramError::http("file.read", err))))
    }

    /// Stream a file returned by `getFile` into `destination`, returning the byte count.
    ///
    /// # Errors
    ///
    /// Returns an error when the download or the local write fails.
    pub async fn download_to(&self, file_path: &str, destination: &Path) -> TelegramResult<u64> {
        let io_err = |source| TelegramError::Io {
            operation: "file.write",
            path: destination.to_path_buf(),
            source,
        };
        let mut stream = Box::pin(self.open_file_stream(file_path).await?);
        let mut file = tokio::fs::File::create(destination).await.map_err(io_err)?;
        let mut written = 0_u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await.map_err(io_err)?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(io_err)?;
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;
    use tempfile::TempDir;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn client_for(server: &MockServer) -> TelegramResult<TelegramClient> {
        let base = Url::parse(&server.base_url()).map_err(|_| TelegramError::EmptyResult {
            operation: "test.url",
        })?;
        TelegramClient::new("T0K3N", &base, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn get_me_decodes_user() -> TestResult {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST).path("/botT0K3N/getMe");
            then.status(200).json_body(json!({
                "ok": true,
                "result": {"id": 99, "is_bot": true, "first_name": "Ferry", "username": "ferry_bot"}
            }));
        });

        let me = client_for(&server)?.get_me().await?;
        assert_eq!(me.id, 99);
        assert_eq!(me.username.as_deref(), Some("ferry_bot"));
        mock.assert();
        Ok(())
    }

    #[tokio::test]
    async fn api_rejection_carries_code_and_description() -> TestResult {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/botT0K3N/getChatMember");
            then.status(400).json_body(json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: user not found"
            }));
        });

        let err = client_for(&server)?
            .get_chat_member("@ferry_files", 5)
            .await
            .err()
            .ok_or("expected rejection")?;
        assert!(matches!(
            err,
            TelegramError::Api { operation: "getChatMember", code: 400, ref description }
                if description.contains("user not found")
        ));
        Ok(())
    }

    #[tokio::test]
    async fn send_message_posts_keyboard() -> TestResult {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/botT0K3N/sendMessage")
                .json_body(json!({
                    "chat_id": 5,
                    "text": "hello",
                    "reply_markup": {"inline_keyboard": [[{"text": "Go", "url": "https://example.com"}]]}
                }));
            then.status(200).json_body(json!({
                "ok": true,
                "result": {"message_id": 77, "chat": {"id": 5, "type": "private"}}
            }));
        });

        let keyboard = ferry_core::Keyboard::link("Go", "https://example.com");
        let message = client_for(&server)?
            .send_message(&SendMessageRequest {
                chat_id: 5,
                text: "hello".into(),
                reply_markup: Some((&keyboard).into()),
            })
            .await?;
        assert_eq!(message.message_id, 77);
        mock.assert();
        Ok(())
    }

    #[tokio::test]
    async fn download_to_writes_streamed_bytes() -> TestResult {
        let server = MockServer::start_async().await;
        let payload = vec![3_u8; 64 * 1024];
        let body = payload.clone();
        server.mock(move |when, then| {
            when.method(GET).path("/file/botT0K3N/documents/file_1.bin");
            then.status(200).body(body.clone());
        });

        let dir = TempDir::new()?;
        let dest = dir.path().join("out.bin");
        let written = client_for(&server)?
            .download_to("documents/file_1.bin", &dest)
            .await?;
        assert_eq!(written, payload.len() as u64);
        assert_eq!(std::fs::read(&dest)?, payload);
        Ok(())
    }

    #[tokio::test]
    async fn download_status_errors_are_reported() -> TestResult {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/file/botT0K3N/missing");
            then.status(404);
        });

        let dir = TempDir::new()?;
        let err = client_for(&server)?
            .download_to("missing", &dir.path().join("x"))
            .await
            .err()
            .ok_or("expected failure")?;
        assert!(matches!(
            err,
            TelegramError::DownloadStatus { status: 404, .. }
        ));
        Ok(())
    }
}
