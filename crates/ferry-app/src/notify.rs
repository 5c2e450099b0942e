//! Admin notification sent once per completed transfer.

use std::sync::Arc;

use chrono::{DateTime, Local};
use ferry_core::{DeclaredMedia, NotificationSink, Requester};
use ferry_telemetry::Metrics;
use tracing::{error, info};

/// Render the admin notice for a completed transfer.
#[must_use]
pub fn completion_text(
    requester: &Requester,
    media: &DeclaredMedia,
    url: &str,
    at: DateTime<Local>,
) -> String {
    format!(
        "📊 Download Link Generated\n\n\
         👤 User: {} (@{})\n\
         🆔 User ID: {}\n\
         📁 File: {}\n\
         📦 Size: {} bytes\n\
         🔗 Short URL: {}\n\
         ⏰ Time: {}",
        requester.full_name(),
        requester.handle(),
        requester.user_id,
        media.name,
        media.size_or_zero(),
        url,
        at.format("%Y-%m-%d %H:%M:%S"),
    )
}

/// Delivers completion notices to the configured sink.
#[derive(Clone)]
pub struct CompletionNotifier {
    sink: Arc<dyn NotificationSink>,
    metrics: Metrics,
}

impl CompletionNotifier {
    /// Notifier writing to `sink`.
    #[must_use]
    pub fn new(sink: Arc<dyn NotificationSink>, metrics: Metrics) -> Self {
        Self { sink, metrics }
    }

    /// Send the notice; returns `false` when delivery failed.
    ///
    /// Failures are logged and counted, never propagated.
    pub async fn notify_completed(
        &self,
        requester: &Requester,
        media: &DeclaredMedia,
        url: &str,
    ) -> bool {
        let text = completion_text(requester, media, url, Local::now());
        match self.sink.notify(&text).await {
            Ok(()) => {
                info!(user_id = requester.user_id, "admin notified");
                true
            }
            Err(err) => {
                error!(
                    error = %err,
                    operation = err.operation,
                    user_id = requester.user_id,
                    "admin notification failed"
                );
                self.metrics.inc_notification_failed();
                false
            }
        }
    }
}
