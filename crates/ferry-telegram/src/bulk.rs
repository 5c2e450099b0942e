//! Streaming download path through a self-hosted Bot API server.
//!
//! A self-hosted server lifts the public download ceiling, so large media is
//! fetched here first. The bot identity is resolved once per process and
//! reused for every later transfer.

use async_trait::async_trait;
use ferry_core::{
    BotIdentity, BulkTransferPath, ChunkStream, CollaboratorError, CollaboratorResult,
    MediaHandle, MediaRef,
};
use futures_util::StreamExt;
use tokio::sync::OnceCell;
use tracing::info;

use crate::client::TelegramClient;

/// Bulk transfer path backed by a self-hosted Bot API server.
#[derive(Debug)]
pub struct LocalBotApiPath {
    client: TelegramClient,
    identity: OnceCell<BotIdentity>,
}

impl LocalBotApiPath {
    /// Wrap a client whose base URL points at the self-hosted server.
    #[must_use]
    pub const fn new(client: TelegramClient) -> Self {
        Self {
            client,
            identity: OnceCell::const_new(),
        }
    }
}

#[async_trait]
impl BulkTransferPath for LocalBotApiPath {
    async fn get_self(&self) -> CollaboratorResult<BotIdentity> {
        let identity = self
            .identity
            .get_or_try_init(|| async {
                let me = self.client.get_me().await?;
                info!(bot_id = me.id, "bulk path session established");
                Ok::<_, CollaboratorError>(BotIdentity {
                    id: me.id,
                    username: me.username,
                })
            })
            .await?;
        Ok(identity.clone())
    }

    async fn resolve_media(&self, source: &MediaRef) -> CollaboratorResult<Option<MediaHandle>> {
        self.get_self().await?;
        let file = self.client.get_file(&source.file_id).await?;
        Ok(file.file_path.map(|locator| MediaHandle {
            locator,
            size: file.file_size,
        }))
    }

    async fn open_chunks(&self, media: &MediaHandle) -> CollaboratorResult<ChunkStream> {
        let stream = self.client.open_file_stream(&media.locator).await?;
        Ok(stream.map(|chunk| chunk.map_err(CollaboratorError::from)).boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use httpmock::prelude::*;
    use serde_json::json;
    use url::Url;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn path_for(server: &MockServer) -> Result<LocalBotApiPath, Box<dyn std::error::Error>> {
        let base = Url::parse(&server.base_url())?;
        Ok(LocalBotApiPath::new(TelegramClient::new(
            "TKN",
            &base,
            Duration::from_secs(5),
        )?))
    }

    #[tokio::test]
    async fn identity_is_resolved_once() -> TestResult {
        let server = MockServer::start_async().await;
        let me = server.mock(|when, then| {
            when.method(POST).path("/botTKN/getMe");
            then.status(200).json_body(json!({
                "ok": true,
                "result": {"id": 7, "is_bot": true, "first_name": "Ferry", "username": "ferry_bot"}
            }));
        });
        server.mock(|when, then| {
            when.method(POST).path("/botTKN/getFile");
            then.status(200).json_body(json!({
                "ok": true,
                "result": {"file_id": "f", "file_size": 4, "file_path": "videos/v.mp4"}
            }));
        });

        let path = path_for(&server)?;
        assert_eq!(path.get_self().await?.id, 7);
        let first = path.resolve_media(&MediaRef::new("f")).await?;
        let second = path.resolve_media(&MediaRef::new("f")).await?;
        assert_eq!(first, second);
        assert_eq!(
            first,
            Some(MediaHandle {
                locator: "videos/v.mp4".into(),
                size: Some(4),
            })
        );
        me.assert_calls(1);
        Ok(())
    }

    #[tokio::test]
    async fn media_without_path_resolves_to_none() -> TestResult {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/botTKN/getMe");
            then.status(200).json_body(json!({
                "ok": true,
                "result": {"id": 7, "is_bot": true, "first_name": "Ferry"}
            }));
        });
        server.mock(|when, then| {
            when.method(POST).path("/botTKN/getFile");
            then.status(200)
                .json_body(json!({"ok": true, "result": {"file_id": "f"}}));
        });

        assert!(path_for(&server)?
            .resolve_media(&MediaRef::new("f"))
            .await?
            .is_none());
        Ok(())
    }

    #[tokio::test]
    async fn chunks_stream_the_whole_object() -> TestResult {
        let server = MockServer::start_async().await;
        let payload = vec![9_u8; 200_000];
        let body = payload.clone();
        server.mock(move |when, then| {
            when.method(GET).path("/file/botTKN/videos/v.mp4");
            then.status(200).body(body.clone());
        });

        let handle = MediaHandle {
            locator: "videos/v.mp4".into(),
            size: None,
        };
        let mut stream = path_for(&server)?.open_chunks(&handle).await?;
        let mut received = Vec::new();
        while let Some(chunk) = stream.next().await {
            received.extend_from_slice(&chunk?);
        }
        assert_eq!(received, payload);
        Ok(())
    }
}
