//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Exposes the counters and gauges the relay pipeline reports against.

use std::sync::Arc;

use prometheus::{
    Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
    core::Collector,
};
use serde::Serialize;

use crate::error::{Result, TelemetryError};

/// Prometheus-backed metrics registry shared across the relay.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    transfers_total: IntCounterVec,
    transfer_phase_total: IntCounterVec,
    download_path_total: IntCounterVec,
    events_emitted_total: IntCounterVec,
    bytes_downloaded_total: IntCounter,
    shorten_degraded_total: IntCounter,
    notifications_failed_total: IntCounter,
    active_transfers: IntGauge,
}

/// Snapshot of selected gauges and counters for health reporting.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Transfers currently between admission and a terminal phase.
    pub active_transfers: i64,
    /// Total bytes written to scratch files.
    pub bytes_downloaded_total: u64,
    /// Transfers that delivered the canonical URL because shortening failed.
    pub shorten_degraded_total: u64,
    /// Admin notifications that could not be delivered.
    pub notifications_failed_total: u64,
}

fn register<C>(registry: &Registry, name: &'static str, collector: C) -> Result<C>
where
    C: Collector + Clone + 'static,
{
    registry
        .register(Box::new(collector.clone()))
        .map_err(|source| TelemetryError::MetricsRegister { name, source })?;
    Ok(collector)
}

fn counter_vec(name: &'static str, help: &str, labels: &[&str]) -> Result<IntCounterVec> {
    IntCounterVec::new(Opts::new(name, help), labels)
        .map_err(|source| TelemetryError::MetricsCollector { name, source })
}

fn counter(name: &'static str, help: &str) -> Result<IntCounter> {
    IntCounter::with_opts(Opts::new(name, help))
        .map_err(|source| TelemetryError::MetricsCollector { name, source })
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// built or registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let transfers_total = register(
            &registry,
            "transfers_total",
            counter_vec(
                "transfers_total",
                "Transfers that reached a terminal phase by outcome",
                &["outcome"],
            )?,
        )?;
        let transfer_phase_total = register(
            &registry,
            "transfer_phase_total",
            counter_vec(
                "transfer_phase_total",
                "Phase transitions observed across all transfers",
                &["phase"],
            )?,
        )?;
        let download_path_total = register(
            &registry,
            "download_path_total",
            counter_vec(
                "download_path_total",
                "Download path attempts by path and status",
                &["path", "status"],
            )?,
        )?;
        let events_emitted_total = register(
            &registry,
            "events_emitted_total",
            counter_vec(
                "events_emitted_total",
                "Domain events emitted by type",
                &["type"],
            )?,
        )?;
        let bytes_downloaded_total = register(
            &registry,
            "bytes_downloaded_total",
            counter("bytes_downloaded_total", "Bytes written to scratch files")?,
        )?;
        let shorten_degraded_total = register(
            &registry,
            "shorten_degraded_total",
            counter(
                "shorten_degraded_total",
                "Transfers delivered with the canonical URL after shortening failed",
            )?,
        )?;
        let notifications_failed_total = register(
            &registry,
            "notifications_failed_total",
            counter(
                "notifications_failed_total",
                "Admin notifications that could not be delivered",
            )?,
        )?;
        let active_transfers = register(
            &registry,
            "active_transfers",
            IntGauge::with_opts(Opts::new(
                "active_transfers",
                "Transfers currently in flight",
            ))
            .map_err(|source| TelemetryError::MetricsCollector {
                name: "active_transfers",
                source,
            })?,
        )?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                transfers_total,
                transfer_phase_total,
                download_path_total,
                events_emitted_total,
                bytes_downloaded_total,
                shorten_degraded_total,
                notifications_failed_total,
                active_transfers,
            }),
        })
    }

    /// Increment the terminal outcome counter (`completed`, `aborted`, ...).
    pub fn inc_transfer(&self, outcome: &str) {
        self.inner
            .transfers_total
            .with_label_values(&[outcome])
            .inc();
    }

    /// Increment the phase transition counter.
    pub fn inc_phase(&self, phase: &str) {
        self.inner
            .transfer_phase_total
            .with_label_values(&[phase])
            .inc();
    }

    /// Record a download path attempt and its status.
    pub fn inc_download_path(&self, path: &str, status: &str) {
        self.inner
            .download_path_total
            .with_label_values(&[path, status])
            .inc();
    }

    /// Increment the emitted event counter for the specific event type.
    pub fn inc_event(&self, event_type: &str) {
        self.inner
            .events_emitted_total
            .with_label_values(&[event_type])
            .inc();
    }

    /// Add to the downloaded byte counter.
    pub fn add_bytes_downloaded(&self, bytes: u64) {
        self.inner.bytes_downloaded_total.inc_by(bytes);
    }

    /// Increment the shortener degradation counter.
    pub fn inc_shorten_degraded(&self) {
        self.inner.shorten_degraded_total.inc();
    }

    /// Increment the failed notification counter.
    pub fn inc_notification_failed(&self) {
        self.inner.notifications_failed_total.inc();
    }

    /// Mark a transfer as started.
    pub fn transfer_started(&self) {
        self.inner.active_transfers.inc();
    }

    /// Mark a transfer as finished.
    pub fn transfer_finished(&self) {
        self.inner.active_transfers.dec();
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::MetricsEncode { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::MetricsUtf8 { source })
    }

    /// Take a point-in-time snapshot of the most relevant gauges and counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            active_transfers: self.inner.active_transfers.get(),
            bytes_downloaded_total: self.inner.bytes_downloaded_total.get(),
            shorten_degraded_total: self.inner.shorten_degraded_total.get(),
            notifications_failed_total: self.inner.notifications_failed_total.get(),
        }
    }
}
