//! TinyURL-compatible link shortener and the canonical-URL fallback.
//!
//! # Design
//! - The service is a plain `GET <endpoint>?url=<canonical>` returning the short
//!   link as the response body.
//! - Shortening never fails a transfer: any error degrades to the canonical URL.

use std::time::Duration;

use async_trait::async_trait;
use ferry_core::{CollaboratorError, CollaboratorResult, LinkShortener, ShortLink};
use ferry_telemetry::Metrics;
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::error::{AppError, AppResult};

/// Failures raised by the shortening service.
#[derive(Debug, Error)]
pub enum ShortenError {
    /// Transport failure.
    #[error("shortener request failed")]
    Http {
        /// Underlying client error.
        #[source]
        source: reqwest::Error,
    },
    /// Non-success status.
    #[error("shortener returned an error status")]
    Status {
        /// HTTP status code.
        status: u16,
    },
    /// Success status with an empty body.
    #[error("shortener returned an empty link")]
    Empty,
}

impl From<ShortenError> for CollaboratorError {
    fn from(err: ShortenError) -> Self {
        Self::new("shortener.shorten", err)
    }
}

/// HTTP client for a TinyURL-style endpoint.
#[derive(Debug, Clone)]
pub struct TinyUrlShortener {
    client: Client,
    endpoint: Url,
}

impl TinyUrlShortener {
    /// Build a shortener calling `endpoint` with a per-request `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error when the HTTP client cannot be constructed.
    pub fn new(endpoint: Url, timeout: Duration) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| AppError::http("shortener.client", err))?;
        Ok(Self { client, endpoint })
    }

    async fn request(&self, url: &str) -> Result<String, ShortenError> {
        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&[("url", url)])
            .send()
            .await
            .map_err(|source| ShortenError::Http { source })?;
        let status = response.status();
        if !status.is_success() {
            return Err(ShortenError::Status {
                status: status.as_u16(),
            });
        }
        let body = response
            .text()
            .await
            .map_err(|source| ShortenError::Http { source })?;
        let short = body.trim();
        if short.is_empty() {
            return Err(ShortenError::Empty);
        }
        Ok(short.to_string())
    }
}

#[async_trait]
impl LinkShortener for TinyUrlShortener {
    async fn shorten(&self, url: &str) -> CollaboratorResult<String> {
        Ok(self.request(url).await?)
    }
}

/// Shorten `canonical`, falling back to it unchanged when the service fails.
pub async fn shorten_or_fallback(
    shortener: &dyn LinkShortener,
    canonical: &str,
    metrics: &Metrics,
) -> ShortLink {
    match shortener.shorten(canonical).await {
        Ok(short) => {
            debug!(short = %short, "link shortened");
            ShortLink {
                canonical: canonical.to_string(),
                short,
                degraded: false,
            }
        }
        Err(err) => {
            warn!(
                error = %err,
                operation = err.operation,
                "link shortening failed; delivering canonical url"
            );
            metrics.inc_shorten_degraded();
            ShortLink {
                canonical: canonical.to_string(),
                short: canonical.to_string(),
                degraded: true,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_test_support::mocks::FakeShortener;
    use httpmock::prelude::*;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    const CANONICAL: &str = "https://drive.google.com/uc?id=abc&export=download";

    fn shortener(server: &MockServer) -> Result<TinyUrlShortener, Box<dyn std::error::Error>> {
        let endpoint = Url::parse(&format!("{}/api-create.php", server.base_url()))?;
        Ok(TinyUrlShortener::new(endpoint, Duration::from_secs(5))?)
    }

    #[tokio::test]
    async fn body_is_trimmed_into_short_link() -> TestResult {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api-create.php")
                .query_param("url", CANONICAL);
            then.status(200).body("https://tinyurl.com/abc12\n");
        });

        let short = shortener(&server)?.shorten(CANONICAL).await?;
        assert_eq!(short, "https://tinyurl.com/abc12");
        mock.assert();
        Ok(())
    }

    #[tokio::test]
    async fn error_status_and_empty_body_fail() -> TestResult {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/api-create.php");
            then.status(503).body("Error");
        });
        let err = shortener(&server)?
            .request(CANONICAL)
            .await
            .err()
            .ok_or("expected failure")?;
        assert!(matches!(err, ShortenError::Status { status: 503 }));

        let empty = MockServer::start_async().await;
        empty.mock(|when, then| {
            when.method(GET).path("/api-create.php");
            then.status(200).body("  \n");
        });
        let err = shortener(&empty)?
            .request(CANONICAL)
            .await
            .err()
            .ok_or("expected failure")?;
        assert!(matches!(err, ShortenError::Empty));
        Ok(())
    }

    #[tokio::test]
    async fn fallback_delivers_canonical_url_and_counts_degradation() -> TestResult {
        let metrics = Metrics::new()?;
        let fake = FakeShortener::default();

        let ok = shorten_or_fallback(&fake, CANONICAL, &metrics).await;
        assert!(!ok.degraded);
        assert_eq!(ok.url(), "https://tiny.test/1");

        fake.fail();
        let degraded = shorten_or_fallback(&fake, CANONICAL, &metrics).await;
        assert!(degraded.degraded);
        assert_eq!(degraded.url(), CANONICAL);
        assert_eq!(degraded.canonical, CANONICAL);
        assert_eq!(metrics.snapshot().shorten_degraded_total, 1);
        assert_eq!(fake.requests().await.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn unreachable_service_degrades() -> TestResult {
        let metrics = Metrics::new()?;
        let endpoint = Url::parse("http://127.0.0.1:9/api-create.php")?;
        let shortener = TinyUrlShortener::new(endpoint, Duration::from_millis(500))?;
        let link = shorten_or_fallback(&shortener, CANONICAL, &metrics).await;
        assert!(link.degraded);
        assert_eq!(link.short, CANONICAL);
        Ok(())
    }
}
