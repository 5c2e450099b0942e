//! Drive v3 REST client implementing [`StorageProvider`].
//!
//! # Design
//! - Object records are created by opening a resumable session with metadata;
//!   content is then streamed into the session in fixed-size chunks.
//! - A transient chunk failure queries the session for the committed offset
//!   and resumes from there, up to `upload_retries` attempts per chunk. A
//!   308 that does not move the committed offset spends an attempt too.
//! - Chunk PUTs get their own timeout; every other call uses the client-wide one.
//! - A 401 forces one credential refresh and a single replay of the request.

use std::io::SeekFrom;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ferry_core::{
    CollaboratorResult, RemoteFolder, RemoteObject, StorageProvider, UploadSession,
};
use reqwest::header::{CONTENT_RANGE, LOCATION, RANGE};
use reqwest::redirect::Policy;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::auth::TokenStore;
use crate::error::{DriveError, DriveResult};

/// Public Drive API origin.
pub const DEFAULT_DRIVE_BASE_URL: &str = "https://www.googleapis.com";

const FOLDER_MIME: &str = "application/vnd.google-apps.folder";
const UPLOAD_CONTENT_TYPE: &str = "application/octet-stream";
const RESUME_INCOMPLETE: u16 = 308;

/// Tunables for [`DriveClient`].
#[derive(Debug, Clone)]
pub struct DriveClientConfig {
    /// API origin; tests point this at a mock server.
    pub base_url: Url,
    /// Timeout for metadata, session and permission requests.
    pub timeout: Duration,
    /// Timeout for a single chunk upload.
    pub chunk_timeout: Duration,
    /// Bytes per upload chunk.
    pub chunk_bytes: usize,
    /// Resume attempts per chunk.
    pub upload_retries: u32,
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<FileResource>,
}

#[derive(Debug, Deserialize)]
struct FileResource {
    id: String,
    #[serde(default)]
    name: String,
}

enum ChunkOutcome {
    Committed(u64),
    Finished(RemoteObject),
}

/// Google Drive storage adapter.
#[derive(Debug, Clone)]
pub struct DriveClient {
    http: Client,
    base_url: String,
    tokens: Arc<TokenStore>,
    chunk_bytes: usize,
    chunk_timeout: Duration,
    upload_retries: u32,
}

impl DriveClient {
    /// Build a client that authenticates with `tokens`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(tokens: Arc<TokenStore>, config: &DriveClientConfig) -> DriveResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .redirect(Policy::none())
            .build()
            .map_err(|err| DriveError::http("drive.client", err))?;
        Ok(Self {
            http,
            base_url: config.base_url.as_str().trim_end_matches('/').to_string(),
            tokens,
            chunk_bytes: config.chunk_bytes.max(1),
            chunk_timeout: config.chunk_timeout,
            upload_retries: config.upload_retries,
        })
    }

    fn files_url(&self) -> String {
        format!("{}/drive/v3/files", self.base_url)
    }

    async fn send<F>(&self, operation: &'static str, build: F) -> DriveResult<Response>
    where
        F: Fn(&Client, &str) -> RequestBuilder + Send + Sync,
    {
        let token = self.tokens.access_token().await?;
        let response = build(&self.http, &token)
            .send()
            .await
            .map_err(|err| DriveError::http(operation, err))?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }
        debug!(operation, "drive rejected token; refreshing");
        let token = self.tokens.force_refresh().await?;
        build(&self.http, &token)
            .send()
            .await
            .map_err(|err| DriveError::http(operation, err))
    }

    async fn expect_success(operation: &'static str, response: Response) -> DriveResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(DriveError::Status {
            operation,
            status: status.as_u16(),
            body,
        })
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        operation: &'static str,
        response: Response,
    ) -> DriveResult<T> {
        Self::expect_success(operation, response)
            .await?
            .json()
            .await
            .map_err(|err| DriveError::http(operation, err))
    }

    async fn lookup_folder(&self, name: &str) -> DriveResult<Option<RemoteFolder>> {
        let query = format!(
            "name='{}' and mimeType='{FOLDER_MIME}' and trashed=false",
            escape_query(name)
        );
        let url = self.files_url();
        let response = self
            .send("drive.find_folder", |http, token| {
                http.get(&url).bearer_auth(token).query(&[
                    ("q", query.as_str()),
                    ("spaces", "drive"),
                    ("fields", "files(id,name)"),
                ])
            })
            .await?;
        let list: FileList = Self::decode("drive.find_folder", response).await?;
        Ok(list.files.into_iter().next().map(|file| RemoteFolder {
            id: file.id,
            name: file.name,
        }))
    }

    async fn insert_folder(&self, name: &str) -> DriveResult<RemoteFolder> {
        let url = self.files_url();
        let body = json!({ "name": name, "mimeType": FOLDER_MIME });
        let response = self
            .send("drive.create_folder", |http, token| {
                http.post(&url)
                    .bearer_auth(token)
                    .query(&[("fields", "id,name")])
                    .json(&body)
            })
            .await?;
        let file: FileResource = Self::decode("drive.create_folder", response).await?;
        info!(folder_id = %file.id, name, "drive folder created");
        Ok(RemoteFolder {
            id: file.id,
            name: name.to_string(),
        })
    }

    async fn open_session(&self, parent: &RemoteFolder, name: &str) -> DriveResult<UploadSession> {
        let url = format!("{}/upload/drive/v3/files", self.base_url);
        let body = json!({ "name": name, "parents": [parent.id] });
        let response = self
            .send("drive.create_object", |http, token| {
                http.post(&url)
                    .bearer_auth(token)
                    .query(&[("uploadType", "resumable"), ("fields", "id")])
                    .header("X-Upload-Content-Type", UPLOAD_CONTENT_TYPE)
                    .json(&body)
            })
            .await?;
        let response = Self::expect_success("drive.create_object", response).await?;
        let session_uri = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(DriveError::MissingHeader {
                operation: "drive.create_object",
                header: "Location",
            })?
            .to_string();
        Ok(UploadSession {
            session_uri,
            name: name.to_string(),
        })
    }

    #[instrument(skip(self, session), fields(name = %session.name))]
    async fn stream_file(&self, session: &UploadSession, local: &Path) -> DriveResult<RemoteObject> {
        let mut file = tokio::fs::File::open(local)
            .await
            .map_err(|err| DriveError::io("drive.upload_content", local, err))?;
        let total = file
            .metadata()
            .await
            .map_err(|err| DriveError::io("drive.upload_content", local, err))?
            .len();

        if total == 0 {
            return match self.put_chunk(session, Vec::new(), 0, 0).await? {
                ChunkOutcome::Finished(object) => Ok(object),
                ChunkOutcome::Committed(_) => Err(DriveError::Status {
                    operation: "drive.upload_chunk",
                    status: RESUME_INCOMPLETE,
                    body: String::new(),
                }),
            };
        }

        let mut offset = 0_u64;
        let mut attempts = 0_u32;
        loop {
            let chunk = read_chunk(&mut file, local, offset, self.chunk_bytes, total).await?;
            match self.put_chunk(session, chunk, offset, total).await {
                Ok(ChunkOutcome::Finished(object)) => {
                    info!(object_id = %object.id, bytes = total, "drive upload finished");
                    return Ok(object);
                }
                Ok(ChunkOutcome::Committed(committed)) if committed > offset => {
                    attempts = 0;
                    offset = committed;
                }
                Ok(ChunkOutcome::Committed(committed)) => {
                    attempts = self.spend_retry(committed, attempts)?;
                    warn!(offset, committed, attempts, "drive session did not advance");
                    offset = committed;
                }
                Err(err) if err.is_transient() => {
                    attempts = self.spend_retry(offset, attempts)?;
                    warn!(error = %err, offset, attempts, "drive chunk failed; querying session");
                    match self.query_offset(session, total).await {
                        Ok(ChunkOutcome::Finished(object)) => return Ok(object),
                        Ok(ChunkOutcome::Committed(committed)) => {
                            if committed > offset {
                                attempts = 0;
                            }
                            offset = committed;
                        }
                        Err(err) if err.is_transient() => {
                            debug!(error = %err, "drive session status query failed");
                        }
                        Err(err) => return Err(err),
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Count one more attempt on the chunk at `offset`, failing once the budget is spent.
    fn spend_retry(&self, offset: u64, attempts: u32) -> DriveResult<u32> {
        let attempts = attempts + 1;
        if attempts > self.upload_retries {
            warn!(offset, attempts, "drive upload giving up");
            return Err(DriveError::RetriesExhausted { offset, attempts });
        }
        Ok(attempts)
    }

    async fn put_chunk(
        &self,
        session: &UploadSession,
        chunk: Vec<u8>,
        offset: u64,
        total: u64,
    ) -> DriveResult<ChunkOutcome> {
        let range = if chunk.is_empty() {
            format!("bytes */{total}")
        } else {
            format!("bytes {offset}-{}/{total}", offset + chunk.len() as u64 - 1)
        };
        let chunk_timeout = self.chunk_timeout;
        let response = self
            .send("drive.upload_chunk", |http, token| {
                http.put(&session.session_uri)
                    .bearer_auth(token)
                    .timeout(chunk_timeout)
                    .header(CONTENT_RANGE, range.as_str())
                    .body(chunk.clone())
            })
            .await?;
        Self::chunk_outcome("drive.upload_chunk", response).await
    }

    async fn query_offset(&self, session: &UploadSession, total: u64) -> DriveResult<ChunkOutcome> {
        let range = format!("bytes */{total}");
        let response = self
            .send("drive.query_offset", |http, token| {
                http.put(&session.session_uri)
                    .bearer_auth(token)
                    .header(CONTENT_RANGE, range.as_str())
                    .body(Vec::new())
            })
            .await?;
        Self::chunk_outcome("drive.query_offset", response).await
    }

    async fn chunk_outcome(operation: &'static str, response: Response) -> DriveResult<ChunkOutcome> {
        if response.status().as_u16() == RESUME_INCOMPLETE {
            let committed = response
                .headers()
                .get(RANGE)
                .and_then(|value| value.to_str().ok())
                .and_then(committed_offset)
                .unwrap_or(0);
            return Ok(ChunkOutcome::Committed(committed));
        }
        let file: FileResource = Self::decode(operation, response).await?;
        Ok(ChunkOutcome::Finished(RemoteObject { id: file.id }))
    }

    async fn share(&self, object: &RemoteObject) -> DriveResult<()> {
        let url = format!("{}/{}/permissions", self.files_url(), object.id);
        let body = json!({ "type": "anyone", "role": "reader" });
        let response = self
            .send("drive.grant_public_read", |http, token| {
                http.post(&url).bearer_auth(token).json(&body)
            })
            .await?;
        Self::expect_success("drive.grant_public_read", response)
            .await
            .map(drop)
    }
}

/// Escape a value for a single-quoted Drive query literal.
fn escape_query(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Offset after the last committed byte in a `Range: bytes=0-N` header.
fn committed_offset(range: &str) -> Option<u64> {
    let (_, end) = range.trim().strip_prefix("bytes=")?.split_once('-')?;
    end.trim().parse::<u64>().ok().map(|last| last + 1)
}

async fn read_chunk(
    file: &mut tokio::fs::File,
    path: &Path,
    offset: u64,
    chunk_bytes: usize,
    total: u64,
) -> DriveResult<Vec<u8>> {
    let remaining = total.saturating_sub(offset);
    let len = usize::try_from(remaining).map_or(chunk_bytes, |rem| rem.min(chunk_bytes));
    file.seek(SeekFrom::Start(offset))
        .await
        .map_err(|err| DriveError::io("drive.read_chunk", path, err))?;
    let mut buffer = vec![0_u8; len];
    file.read_exact(&mut buffer)
        .await
        .map_err(|err| DriveError::io("drive.read_chunk", path, err))?;
    Ok(buffer)
}

#[async_trait]
impl StorageProvider for DriveClient {
    async fn find_folder(&self, name: &str) -> CollaboratorResult<Option<RemoteFolder>> {
        Ok(self.lookup_folder(name).await?)
    }

    async fn create_folder(&self, name: &str) -> CollaboratorResult<RemoteFolder> {
        Ok(self.insert_folder(name).await?)
    }

    async fn create_object(
        &self,
        parent: &RemoteFolder,
        name: &str,
    ) -> CollaboratorResult<UploadSession> {
        Ok(self.open_session(parent, name).await?)
    }

    async fn upload_content(
        &self,
        session: &UploadSession,
        local: &Path,
    ) -> CollaboratorResult<RemoteObject> {
        Ok(self.stream_file(session, local).await?)
    }

    async fn grant_public_read(&self, object: &RemoteObject) -> CollaboratorResult<()> {
        Ok(self.share(object).await?)
    }
}
