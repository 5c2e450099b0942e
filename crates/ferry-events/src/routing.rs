//! Broadcast bus with a bounded history.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, ready};

use chrono::Utc;
use tokio::sync::broadcast;
use tokio_stream::Stream;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

use crate::payloads::{DEFAULT_REPLAY_CAPACITY, Event, EventEnvelope, EventId};

/// Envelopes a subscriber failed to receive because it fell behind the live
/// channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventsMissed {
    /// Number of envelopes dropped for this subscriber.
    pub count: u64,
}

/// History ring and id counter, guarded together so ids are handed out in
/// the same order envelopes reach the ring and the live channel.
struct Ledger {
    history: VecDeque<EventEnvelope>,
    next_id: EventId,
}

/// Cloneable handle onto the relay's event bus.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
    ledger: Arc<Mutex<Ledger>>,
    capacity: usize,
}

impl EventBus {
    /// Bus retaining at most `capacity` envelopes of history.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "event bus capacity must be positive");
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            ledger: Arc::new(Mutex::new(Ledger {
                history: VecDeque::with_capacity(capacity),
                next_id: 1,
            })),
            capacity,
        }
    }

    /// Bus with [`DEFAULT_REPLAY_CAPACITY`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_REPLAY_CAPACITY)
    }

    /// Follow the bus from now on, or from just after `after` when resuming.
    ///
    /// A resumed subscription first yields the retained envelopes newer than
    /// `after`, then the live feed, with no gap or repeat between the two.
    #[must_use]
    pub fn subscribe(&self, after: Option<EventId>) -> Subscription {
        let ledger = self.lock();
        let live = self.sender.subscribe();
        let backlog: VecDeque<EventEnvelope> = after.map_or_else(VecDeque::new, |after| {
            ledger
                .history
                .iter()
                .filter(|env| env.id > after)
                .cloned()
                .collect()
        });
        let last_seen = ledger.next_id.saturating_sub(1);
        drop(ledger);
        Subscription {
            backlog,
            live: BroadcastStream::new(live),
            last_seen,
        }
    }

    /// Stamp `event`, retain it, and hand it to live subscribers.
    ///
    /// Never fails; with nobody listening the envelope only lands in history.
    pub fn publish(&self, event: Event) -> EventId {
        let mut ledger = self.lock();
        let id = ledger.next_id;
        ledger.next_id = id.saturating_add(1);
        let envelope = EventEnvelope {
            id,
            timestamp: Utc::now(),
            event,
        };
        if ledger.history.len() == self.capacity {
            let _ = ledger.history.pop_front();
        }
        ledger.history.push_back(envelope.clone());
        let _ = self.sender.send(envelope);
        id
    }

    /// Id of the newest retained envelope.
    #[must_use]
    pub fn last_event_id(&self) -> Option<EventId> {
        self.lock().history.back().map(|env| env.id)
    }

    /// Retained envelopes newer than `id`, oldest first.
    #[must_use]
    pub fn backlog_since(&self, id: EventId) -> Vec<EventEnvelope> {
        self.lock()
            .history
            .iter()
            .filter(|env| env.id > id)
            .cloned()
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// One subscriber's view of the bus.
///
/// Yields `Err(EventsMissed)` when the live channel overran this subscriber,
/// then carries on with the oldest envelope still buffered. Ends once every
/// [`EventBus`] handle is dropped.
pub struct Subscription {
    backlog: VecDeque<EventEnvelope>,
    live: BroadcastStream<EventEnvelope>,
    last_seen: EventId,
}

impl Stream for Subscription {
    type Item = Result<EventEnvelope, EventsMissed>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if let Some(envelope) = this.backlog.pop_front() {
            return Poll::Ready(Some(Ok(envelope)));
        }
        loop {
            match ready!(Pin::new(&mut this.live).poll_next(cx)) {
                Some(Ok(envelope)) if envelope.id <= this.last_seen => {}
                Some(Ok(envelope)) => {
                    this.last_seen = envelope.id;
                    return Poll::Ready(Some(Ok(envelope)));
                }
                Some(Err(BroadcastStreamRecvError::Lagged(count))) => {
                    return Poll::Ready(Some(Err(EventsMissed { count })));
                }
                None => return Poll::Ready(None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payloads::TransferPhase;
    use tokio_stream::StreamExt;
    use uuid::Uuid;

    fn progress(bytes: u64) -> Event {
        Event::Progress {
            transfer_id: Uuid::nil(),
            bytes_downloaded: bytes,
        }
    }

    async fn next_id(sub: &mut Subscription) -> Option<EventId> {
        match sub.next().await {
            Some(Ok(env)) => Some(env.id),
            _ => None,
        }
    }

    #[tokio::test]
    async fn backlog_since_filters_by_id() {
        let bus = EventBus::with_capacity(4);
        let first = bus.publish(Event::TransferAdmitted {
            transfer_id: Uuid::nil(),
            name: "clip.mp4".into(),
            declared_size: Some(1_024),
        });
        let second = bus.publish(Event::HealthChanged {
            degraded: vec!["bulk_path".into()],
        });

        assert_eq!(bus.last_event_id(), Some(second));
        let backlog = bus.backlog_since(first);
        assert_eq!(backlog.len(), 1);
        assert_eq!(backlog[0].id, second);
    }

    #[tokio::test]
    async fn history_keeps_only_the_newest_entries() {
        let bus = EventBus::with_capacity(2);
        for bytes in [1_u64, 2, 3] {
            let _ = bus.publish(progress(bytes));
        }
        let ids: Vec<EventId> = bus.backlog_since(0).iter().map(|env| env.id).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[tokio::test]
    async fn fresh_subscription_sees_only_later_events() {
        let bus = EventBus::new();
        let _ = bus.publish(progress(1));
        let mut sub = bus.subscribe(None);
        let id = bus.publish(Event::PhaseChanged {
            transfer_id: Uuid::nil(),
            phase: TransferPhase::Downloading,
        });
        let envelope = sub.next().await.expect("stream item").expect("not lagged");
        assert_eq!(envelope.id, id);
        assert!(matches!(
            envelope.event,
            Event::PhaseChanged {
                phase: TransferPhase::Downloading,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn resumed_subscription_replays_then_follows_without_repeats() {
        let bus = EventBus::with_capacity(8);
        let first = bus.publish(progress(1));
        let _ = bus.publish(progress(2));
        let _ = bus.publish(progress(3));

        let mut resumed = bus.subscribe(Some(first));
        let mut other = bus.subscribe(None);
        let _ = bus.publish(progress(4));

        assert_eq!(next_id(&mut resumed).await, Some(2));
        assert_eq!(next_id(&mut resumed).await, Some(3));
        assert_eq!(next_id(&mut resumed).await, Some(4));
        // The replay is private to the resuming subscriber.
        assert_eq!(next_id(&mut other).await, Some(4));
    }

    #[tokio::test]
    async fn overrun_subscriber_is_told_how_much_it_missed() {
        let bus = EventBus::with_capacity(2);
        let mut sub = bus.subscribe(None);
        for bytes in 1..=5 {
            let _ = bus.publish(progress(bytes));
        }

        assert_eq!(sub.next().await, Some(Err(EventsMissed { count: 3 })));
        assert_eq!(next_id(&mut sub).await, Some(4));
        assert_eq!(next_id(&mut sub).await, Some(5));
    }

    #[tokio::test]
    async fn subscription_ends_when_bus_is_dropped() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe(None);
        let _ = bus.publish(progress(1));
        drop(bus);

        assert_eq!(next_id(&mut sub).await, Some(1));
        assert!(sub.next().await.is_none());
    }
}
