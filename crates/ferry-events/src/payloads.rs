//! Event payload types carried across the relay.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Identifier assigned to each event emitted by the relay.
pub type EventId = u64;

/// Default buffer size for the in-memory replay ring.
pub const DEFAULT_REPLAY_CAPACITY: usize = 1_024;

/// Typed domain events surfaced across the system.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A transfer passed the size gate and was accepted for processing.
    TransferAdmitted {
        /// Identifier for the admitted transfer.
        transfer_id: Uuid,
        /// Display name declared by the messaging channel.
        name: String,
        /// Declared size in bytes, when the channel reported one.
        declared_size: Option<u64>,
    },
    /// Transfer entered a new pipeline phase.
    PhaseChanged {
        /// Identifier for the transfer whose phase changed.
        transfer_id: Uuid,
        /// Phase the transfer entered.
        phase: TransferPhase,
    },
    /// Periodic progress update emitted while the bulk path is downloading.
    Progress {
        /// Identifier for the transfer being tracked.
        transfer_id: Uuid,
        /// Aggregate bytes written to the scratch file so far.
        bytes_downloaded: u64,
    },
    /// Transfer finished and the public link was delivered.
    TransferCompleted {
        /// Identifier for the completed transfer.
        transfer_id: Uuid,
        /// Final link handed to the requester.
        url: String,
    },
    /// Transfer terminated without producing a link.
    TransferAborted {
        /// Identifier for the aborted transfer.
        transfer_id: Uuid,
        /// Machine-readable abort reason.
        reason: String,
    },
    /// System health status changed (degraded or restored components).
    HealthChanged {
        /// Components currently considered degraded.
        degraded: Vec<String>,
    },
}

impl Event {
    /// Machine-friendly discriminator for log and metric labels.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::TransferAdmitted { .. } => "transfer_admitted",
            Self::PhaseChanged { .. } => "phase_changed",
            Self::Progress { .. } => "progress",
            Self::TransferCompleted { .. } => "transfer_completed",
            Self::TransferAborted { .. } => "transfer_aborted",
            Self::HealthChanged { .. } => "health_changed",
        }
    }

    /// Transfer identifier carried by the event, if any.
    #[must_use]
    pub const fn transfer_id(&self) -> Option<Uuid> {
        match self {
            Self::TransferAdmitted { transfer_id, .. }
            | Self::PhaseChanged { transfer_id, .. }
            | Self::Progress { transfer_id, .. }
            | Self::TransferCompleted { transfer_id, .. }
            | Self::TransferAborted { transfer_id, .. } => Some(*transfer_id),
            Self::HealthChanged { .. } => None,
        }
    }
}

/// Metadata wrapper around events. Each envelope tracks the event id and emission timestamp.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct EventEnvelope {
    /// Monotonic identifier assigned to the wrapped event.
    pub id: EventId,
    /// Timestamp recording when the envelope was produced.
    pub timestamp: DateTime<Utc>,
    /// Wrapped event payload.
    pub event: Event,
}

/// Pipeline phases a transfer moves through.
///
/// Phases advance strictly in declaration order; `Aborted` is reachable from
/// every non-terminal phase.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TransferPhase {
    /// Size gate passed; no resources acquired yet.
    Admitted,
    /// Scratch file acquired and a download path is running.
    Downloading,
    /// Bytes are on local disk.
    Downloaded,
    /// Remote publisher is running.
    Uploading,
    /// Canonical URL is known.
    Uploaded,
    /// Shortener call in flight.
    Shortening,
    /// Link delivered to the requester.
    Completed,
    /// Transfer terminated without a link.
    Aborted,
}

impl TransferPhase {
    /// Lowercase label used in logs and metric labels.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admitted => "admitted",
            Self::Downloading => "downloading",
            Self::Downloaded => "downloaded",
            Self::Uploading => "uploading",
            Self::Uploaded => "uploaded",
            Self::Shortening => "shortening",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
        }
    }

    /// Whether the phase ends the transfer.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Aborted)
    }

    /// The phase that follows on the success path, if any.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Admitted => Some(Self::Downloading),
            Self::Downloading => Some(Self::Downloaded),
            Self::Downloaded => Some(Self::Uploading),
            Self::Uploading => Some(Self::Uploaded),
            Self::Uploaded => Some(Self::Shortening),
            Self::Shortening => Some(Self::Completed),
            Self::Completed | Self::Aborted => None,
        }
    }

    /// Whether moving from `self` to `target` is a legal transition.
    #[must_use]
    pub fn can_transition_to(self, target: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        target == Self::Aborted || self.next() == Some(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUCCESS_PATH: [TransferPhase; 7] = [
        TransferPhase::Admitted,
        TransferPhase::Downloading,
        TransferPhase::Downloaded,
        TransferPhase::Uploading,
        TransferPhase::Uploaded,
        TransferPhase::Shortening,
        TransferPhase::Completed,
    ];

    #[test]
    fn success_path_is_linear() {
        for pair in SUCCESS_PATH.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{pair:?}");
            assert!(!pair[1].can_transition_to(pair[0]), "{pair:?}");
        }
        assert!(
            !TransferPhase::Admitted.can_transition_to(TransferPhase::Uploading),
            "phases must not be skipped"
        );
    }

    #[test]
    fn aborted_reachable_only_from_non_terminal_phases() {
        for phase in SUCCESS_PATH {
            assert_eq!(
                phase.can_transition_to(TransferPhase::Aborted),
                !phase.is_terminal()
            );
        }
        assert!(!TransferPhase::Aborted.can_transition_to(TransferPhase::Aborted));
    }

    #[test]
    fn event_kind_and_transfer_id() {
        let id = Uuid::new_v4();
        let event = Event::PhaseChanged {
            transfer_id: id,
            phase: TransferPhase::Uploading,
        };
        assert_eq!(event.kind(), "phase_changed");
        assert_eq!(event.transfer_id(), Some(id));

        let health = Event::HealthChanged {
            degraded: vec!["drive".into()],
        };
        assert_eq!(health.kind(), "health_changed");
        assert_eq!(health.transfer_id(), None);
    }
}
