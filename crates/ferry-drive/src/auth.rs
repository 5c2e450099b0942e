//! Refreshable OAuth credential persisted as a JSON blob.
//!
//! # Design
//! - The blob is loaded once at start. Interactive consent is out of scope;
//!   a valid blob with a refresh token must already exist.
//! - Tokens are refreshed 60 seconds ahead of expiry and the refreshed blob
//!   is written back through a temp file and rename.
//! - Unknown fields in the blob are carried through untouched.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{DriveError, DriveResult};

const REFRESH_SKEW_SECS: i64 = 60;
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// On-disk credential blob.
#[derive(Clone, Serialize, Deserialize)]
pub struct StoredCredential {
    /// Bearer token for Drive requests.
    #[serde(alias = "token")]
    pub access_token: String,
    /// Long-lived token used to mint new access tokens.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// OAuth client id.
    #[serde(default)]
    pub client_id: String,
    /// OAuth client secret.
    #[serde(default)]
    pub client_secret: String,
    /// Token endpoint.
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    /// Access token expiry; `None` means the token is assumed valid.
    #[serde(default)]
    pub expiry: Option<DateTime<Utc>>,
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

impl std::fmt::Debug for StoredCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredCredential")
            .field("client_id", &self.client_id)
            .field("token_uri", &self.token_uri)
            .field("expiry", &self.expiry)
            .finish_non_exhaustive()
    }
}

impl StoredCredential {
    /// Whether the access token must be refreshed before use at `now`.
    #[must_use]
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        self.expiry.is_some_and(|expiry| expiry - TimeDelta::seconds(REFRESH_SKEW_SECS) <= now)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
    refresh_token: Option<String>,
}

/// Shared credential with transparent refresh.
#[derive(Debug)]
pub struct TokenStore {
    path: PathBuf,
    client: Client,
    state: Mutex<StoredCredential>,
}

impl TokenStore {
    /// Read the credential blob at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or parsed.
    pub async fn load(path: impl Into<PathBuf>, timeout: Duration) -> DriveResult<Self> {
        let path = path.into();
        let raw = tokio::fs::read(&path)
            .await
            .map_err(|err| DriveError::io("drive.auth.load", &path, err))?;
        let credential: StoredCredential =
            serde_json::from_slice(&raw).map_err(|source| DriveError::CredentialFormat {
                path: path.clone(),
                source,
            })?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| DriveError::http("drive.auth.client", err))?;
        debug!(path = %path.display(), "drive credential loaded");
        Ok(Self {
            path,
            client,
            state: Mutex::new(credential),
        })
    }

    /// Location of the credential blob.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current access token, refreshed first when close to expiry.
    ///
    /// # Errors
    ///
    /// Returns an error when a needed refresh fails.
    pub async fn access_token(&self) -> DriveResult<String> {
        let mut state = self.state.lock().await;
        if state.needs_refresh(Utc::now()) {
            self.refresh_locked(&mut state).await?;
        }
        Ok(state.access_token.clone())
    }

    /// Refresh unconditionally, e.g. after the API rejected the token.
    ///
    /// # Errors
    ///
    /// Returns an error when the token endpoint or the write-back fails.
    pub async fn force_refresh(&self) -> DriveResult<String> {
        let mut state = self.state.lock().await;
        self.refresh_locked(&mut state).await?;
        Ok(state.access_token.clone())
    }

    async fn refresh_locked(&self, state: &mut StoredCredential) -> DriveResult<()> {
        let refresh_token = state
            .refresh_token
            .clone()
            .ok_or_else(|| DriveError::MissingRefreshToken {
                path: self.path.clone(),
            })?;
        let response = self
            .client
            .post(&state.token_uri)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.as_str()),
                ("client_id", state.client_id.as_str()),
                ("client_secret", state.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|err| DriveError::http("drive.auth.refresh", err))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DriveError::Status {
                operation: "drive.auth.refresh",
                status: status.as_u16(),
                body,
            });
        }
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|err| DriveError::http("drive.auth.refresh", err))?;

        state.access_token = token.access_token;
        state.expiry = token
            .expires_in
            .map(|secs| Utc::now() + TimeDelta::seconds(secs));
        if let Some(rotated) = token.refresh_token {
            state.refresh_token = Some(rotated);
        }
        self.persist(state).await?;
        info!(expiry = ?state.expiry, "drive credential refreshed");
        Ok(())
    }

    async fn persist(&self, credential: &StoredCredential) -> DriveResult<()> {
        let encoded =
            serde_json::to_vec_pretty(credential).map_err(|source| DriveError::CredentialFormat {
                path: self.path.clone(),
                source,
            })?;
        let mut staging = self.path.clone().into_os_string();
        staging.push(".tmp");
        let staging = PathBuf::from(staging);
        tokio::fs::write(&staging, &encoded)
            .await
            .map_err(|err| DriveError::io("drive.auth.persist", &staging, err))?;
        tokio::fs::rename(&staging, &self.path)
            .await
            .map_err(|err| DriveError::io("drive.auth.persist", &self.path, err))
    }
}
