//! Dual-path downloader: streaming bulk path first, direct fetch as fallback.
//!
//! # Design
//! - The bulk path is optional and treated as unreliable: an error or a zero-byte
//!   result discards what it wrote and hands the same scratch file to the direct path.
//! - Progress is reported only from the bulk path, each time the cumulative byte
//!   count crosses another multiple of the configured step.
//! - Observer failures never abort a download.

use std::path::Path;
use std::sync::Arc;

use ferry_core::{
    BulkTransferPath, CollaboratorError, CollaboratorResult, DirectFetchPath, DownloadPath,
    DownloadReport, MediaRef, ProgressObserver, TransferError,
};
use ferry_fsops::{FsOpsError, ScratchFile};
use ferry_telemetry::Metrics;
use futures_util::StreamExt;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Downloads media into a scratch file over one of two paths.
#[derive(Clone)]
pub struct DualPathDownloader {
    bulk: Option<Arc<dyn BulkTransferPath>>,
    direct: Arc<dyn DirectFetchPath>,
    progress_step: u64,
    metrics: Metrics,
}

impl DualPathDownloader {
    /// Downloader using `bulk` when present and `direct` otherwise.
    #[must_use]
    pub fn new(
        bulk: Option<Arc<dyn BulkTransferPath>>,
        direct: Arc<dyn DirectFetchPath>,
        progress_step: u64,
        metrics: Metrics,
    ) -> Self {
        Self {
            bulk,
            direct,
            progress_step,
            metrics,
        }
    }

    /// Fill `file` with the bytes behind `source`.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::DownloadFailed`] carrying the direct path's error
    /// when both paths fail, or [`TransferError::Internal`] when the scratch file
    /// cannot be reset or inspected.
    pub async fn download(
        &self,
        source: &MediaRef,
        file: &ScratchFile,
        progress: &dyn ProgressObserver,
    ) -> Result<DownloadReport, TransferError> {
        if let Some(bulk) = &self.bulk {
            match self.stream_bulk(bulk.as_ref(), source, file.path(), progress).await {
                Ok(bytes_written) if bytes_written > 0 => {
                    self.record(DownloadPath::Bulk, "ok", bytes_written);
                    return Ok(DownloadReport {
                        bytes_written,
                        path: DownloadPath::Bulk,
                    });
                }
                Ok(_) => {
                    info!("bulk path produced no bytes; falling back to direct fetch");
                    self.metrics
                        .inc_download_path(DownloadPath::Bulk.as_str(), "empty");
                }
                Err(err) => {
                    warn!(
                        error = %err,
                        operation = err.operation,
                        "bulk download failed; falling back to direct fetch"
                    );
                    self.metrics
                        .inc_download_path(DownloadPath::Bulk.as_str(), "failed");
                }
            }
            file.truncate()
                .await
                .map_err(|err| scratch_error("scratch.truncate", err))?;
        }

        if let Err(err) = self.direct.fetch_to(source, file.path()).await {
            self.metrics
                .inc_download_path(DownloadPath::Direct.as_str(), "failed");
            return Err(TransferError::DownloadFailed { source: err });
        }
        let bytes_written = file
            .len()
            .await
            .map_err(|err| scratch_error("scratch.len", err))?;
        self.record(DownloadPath::Direct, "ok", bytes_written);
        Ok(DownloadReport {
            bytes_written,
            path: DownloadPath::Direct,
        })
    }

    async fn stream_bulk(
        &self,
        bulk: &dyn BulkTransferPath,
        source: &MediaRef,
        destination: &Path,
        progress: &dyn ProgressObserver,
    ) -> CollaboratorResult<u64> {
        let identity = bulk.get_self().await?;
        debug!(bot_id = identity.id, "bulk session ready");
        let Some(media) = bulk.resolve_media(source).await? else {
            return Ok(0);
        };
        let mut chunks = bulk.open_chunks(&media).await?;
        let mut out = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(destination)
            .await
            .map_err(|err| CollaboratorError::new("bulk.open_scratch", err))?;

        let mut written = 0_u64;
        let mut reported_steps = 0_u64;
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk?;
            out.write_all(&chunk)
                .await
                .map_err(|err| CollaboratorError::new("bulk.write_scratch", err))?;
            written += chunk.len() as u64;
            if self.progress_step > 0 {
                let steps = written / self.progress_step;
                if steps > reported_steps {
                    reported_steps = steps;
                    if let Err(err) = progress.on_progress(written).await {
                        debug!(error = %err, "progress observer failed");
                    }
                }
            }
        }
        out.flush()
            .await
            .map_err(|err| CollaboratorError::new("bulk.write_scratch", err))?;
        Ok(written)
    }

    fn record(&self, path: DownloadPath, status: &str, bytes: u64) {
        self.metrics.inc_download_path(path.as_str(), status);
        self.metrics.add_bytes_downloaded(bytes);
        info!(path = path.as_str(), bytes, "download finished");
    }
}

fn scratch_error(operation: &'static str, err: FsOpsError) -> TransferError {
    TransferError::Internal {
        operation,
        source: Some(err.into()),
    }
}
