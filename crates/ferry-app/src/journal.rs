//! Event bus consumer that writes one audit line per finished transfer.
//!
//! The orchestrator publishes fine-grained lifecycle events; the journal folds
//! them per transfer and logs a single summary when the transfer completes or
//! aborts, plus every health change.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use ferry_events::{Event, EventBus, EventEnvelope, Subscription, TransferPhase};
use futures_util::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// How a journaled transfer ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// Link delivered.
    Completed {
        /// Link handed to the requester.
        url: String,
    },
    /// Terminated without a link.
    Aborted {
        /// Machine-readable abort reason.
        reason: String,
    },
}

/// Everything the journal learned about one transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferSummary {
    /// Transfer the summary describes.
    pub transfer_id: Uuid,
    /// Declared display name.
    pub name: String,
    /// Declared size, when the channel reported one.
    pub declared_size: Option<u64>,
    /// Phases entered after admission, in order.
    pub phases: Vec<TransferPhase>,
    /// Last progress figure reported by the bulk path.
    pub bytes_downloaded: Option<u64>,
    /// Time from admission to the terminal event.
    pub elapsed: Duration,
    /// Terminal outcome.
    pub outcome: TransferOutcome,
}

struct OpenTransfer {
    name: String,
    declared_size: Option<u64>,
    admitted_at: DateTime<Utc>,
    phases: Vec<TransferPhase>,
    bytes_downloaded: Option<u64>,
}

/// Per-transfer fold over the event stream.
#[derive(Default)]
pub struct TransferJournal {
    open: HashMap<Uuid, OpenTransfer>,
}

impl TransferJournal {
    /// Empty journal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Transfers admitted but not yet finished.
    #[must_use]
    pub fn open_transfers(&self) -> usize {
        self.open.len()
    }

    /// Fold `envelope` in, returning a summary when it closes a transfer.
    ///
    /// Events for transfers admitted before the journal started are ignored.
    pub fn record(&mut self, envelope: &EventEnvelope) -> Option<TransferSummary> {
        match &envelope.event {
            Event::TransferAdmitted {
                transfer_id,
                name,
                declared_size,
            } => {
                self.open.insert(
                    *transfer_id,
                    OpenTransfer {
                        name: name.clone(),
                        declared_size: *declared_size,
                        admitted_at: envelope.timestamp,
                        phases: Vec::new(),
                        bytes_downloaded: None,
                    },
                );
                None
            }
            Event::PhaseChanged { transfer_id, phase } => {
                if let Some(open) = self.open.get_mut(transfer_id) {
                    open.phases.push(*phase);
                }
                None
            }
            Event::Progress {
                transfer_id,
                bytes_downloaded,
            } => {
                if let Some(open) = self.open.get_mut(transfer_id) {
                    open.bytes_downloaded = Some(*bytes_downloaded);
                }
                None
            }
            Event::TransferCompleted { transfer_id, url } => self.close(
                *transfer_id,
                envelope.timestamp,
                TransferOutcome::Completed { url: url.clone() },
            ),
            Event::TransferAborted {
                transfer_id,
                reason,
            } => self.close(
                *transfer_id,
                envelope.timestamp,
                TransferOutcome::Aborted {
                    reason: reason.clone(),
                },
            ),
            Event::HealthChanged { .. } => None,
        }
    }

    fn close(
        &mut self,
        transfer_id: Uuid,
        at: DateTime<Utc>,
        outcome: TransferOutcome,
    ) -> Option<TransferSummary> {
        let Some(open) = self.open.remove(&transfer_id) else {
            debug!(%transfer_id, "terminal event for a transfer the journal never saw admitted");
            return None;
        };
        Some(TransferSummary {
            transfer_id,
            name: open.name,
            declared_size: open.declared_size,
            phases: open.phases,
            bytes_downloaded: open.bytes_downloaded,
            elapsed: (at - open.admitted_at).to_std().unwrap_or_default(),
            outcome,
        })
    }
}

fn log_summary(summary: &TransferSummary) {
    let phases: Vec<&str> = summary.phases.iter().map(|phase| phase.as_str()).collect();
    let elapsed_ms = u64::try_from(summary.elapsed.as_millis()).unwrap_or(u64::MAX);
    match &summary.outcome {
        TransferOutcome::Completed { url } => info!(
            transfer_id = %summary.transfer_id,
            name = %summary.name,
            declared_size = ?summary.declared_size,
            bytes_downloaded = ?summary.bytes_downloaded,
            elapsed_ms,
            phases = ?phases,
            url = %url,
            "transfer journal: completed"
        ),
        TransferOutcome::Aborted { reason } => warn!(
            transfer_id = %summary.transfer_id,
            name = %summary.name,
            declared_size = ?summary.declared_size,
            bytes_downloaded = ?summary.bytes_downloaded,
            elapsed_ms,
            phases = ?phases,
            reason = %reason,
            "transfer journal: aborted"
        ),
    }
}

/// Drain `subscription` into `journal` until the bus closes.
pub async fn run_journal(
    mut subscription: Subscription,
    mut journal: TransferJournal,
) -> TransferJournal {
    while let Some(item) = subscription.next().await {
        match item {
            Ok(envelope) => {
                if let Event::HealthChanged { degraded } = &envelope.event {
                    if degraded.is_empty() {
                        info!("relay health restored");
                    } else {
                        warn!(degraded = ?degraded, "relay health degraded");
                    }
                }
                if let Some(summary) = journal.record(&envelope) {
                    log_summary(&summary);
                }
            }
            Err(missed) => warn!(
                missed = missed.count,
                open = journal.open_transfers(),
                "transfer journal fell behind the event bus"
            ),
        }
    }
    debug!(open = journal.open_transfers(), "event bus closed; journal stopping");
    journal
}

/// Subscribe to `events` now and fold the stream on a background task.
///
/// The subscription is taken before returning, so nothing published after
/// this call is missed.
#[must_use]
pub fn spawn_journal(events: &EventBus) -> JoinHandle<TransferJournal> {
    tokio::spawn(run_journal(events.subscribe(None), TransferJournal::new()))
}
