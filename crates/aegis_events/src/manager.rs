//! Typed pub/sub event bus (spec.md §4.6).
//!
//! Subscribers get a bounded queue; `publish` never blocks. An overflowing
//! subscriber queue drops the event for that subscriber only and bumps a
//! drop counter — it never backs up the publisher and never affects other
//! subscribers.

use crate::event::{Event, EventType};
use crate::types::ServerId;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};
use uuid::Uuid;

/// What a subscriber wants to receive: an optional set of event types
/// (empty/`None` means "all types") and an optional server scope.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub types: Option<Vec<EventType>>,
    pub server_scope: Option<ServerId>,
}

impl EventFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_server(server_id: ServerId) -> Self {
        Self {
            types: None,
            server_scope: Some(server_id),
        }
    }

    fn matches(&self, event: &Event) -> bool {
        if let Some(scope) = self.server_scope {
            if scope != event.server_id {
                return false;
            }
        }
        match &self.types {
            None => true,
            Some(types) if types.is_empty() => true,
            Some(types) => types.contains(&event.event_type),
        }
    }
}

/// A live subscription: its id, its filter, and the receiving half of its
/// bounded channel. Returned by [`EventManager::subscribe`].
pub struct Subscriber {
    pub id: Uuid,
    pub receiver: mpsc::Receiver<Event>,
}

struct Subscription {
    filter: EventFilter,
    sender: mpsc::Sender<Event>,
    dropped: Arc<AtomicU64>,
}

/// Central event bus. Cheap to clone (internally `Arc`-backed via the
/// `DashMap`'s own sharding); in practice callers hold one instance behind
/// an `Arc<EventManager>`.
#[derive(Default)]
pub struct EventManager {
    subscribers: DashMap<Uuid, Subscription>,
    total_dropped: AtomicU64,
}

impl EventManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new subscriber with the given filter and bounded queue
    /// capacity. Returns the subscriber handle; the caller drains
    /// `subscriber.receiver` to consume events.
    pub fn subscribe(&self, filter: EventFilter, capacity: usize) -> Subscriber {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(capacity.max(1));
        self.subscribers.insert(
            id,
            Subscription {
                filter,
                sender: tx,
                dropped: Arc::new(AtomicU64::new(0)),
            },
        );
        debug!(subscriber = %id, capacity, "registered event subscriber");
        Subscriber { id, receiver: rx }
    }

    /// Removes a subscriber. Dropping its `Sender` half closes the
    /// subscriber's channel, which the caller observes as the receiver
    /// stream ending.
    pub fn unsubscribe(&self, id: Uuid) {
        if self.subscribers.remove(&id).is_some() {
            debug!(subscriber = %id, "unsubscribed");
        }
    }

    /// Number of events dropped for a given subscriber due to queue
    /// overflow, for metrics/testing.
    pub fn dropped_count(&self, id: Uuid) -> u64 {
        self.subscribers
            .get(&id)
            .map(|s| s.dropped.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Total drops across all subscribers, for `kOverflow` metrics.
    pub fn total_dropped(&self) -> u64 {
        self.total_dropped.load(Ordering::Relaxed)
    }

    /// Publishes an event to every subscriber whose filter matches. Never
    /// blocks: each subscriber gets a non-blocking `try_send`, and a full
    /// queue is a drop, not a stall.
    pub fn publish(&self, event: Event) {
        trace!(event_type = ?event.event_type, server = %event.server_id, "publishing event");
        for entry in self.subscribers.iter() {
            let sub = entry.value();
            if !sub.filter.matches(&event) {
                continue;
            }
            match sub.sender.try_send(event.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    sub.dropped.fetch_add(1, Ordering::Relaxed);
                    self.total_dropped.fetch_add(1, Ordering::Relaxed);
                    warn!(subscriber = %entry.key(), "subscriber queue full, dropping event");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    // Subscriber dropped its receiver without unsubscribing;
                    // leave cleanup to the next explicit unsubscribe/prune.
                }
            }
        }
    }

    /// Drops subscribers whose receiver has gone away. Call periodically;
    /// `publish` itself never does this to keep the hot path free of
    /// table mutation.
    pub fn prune_closed(&self) {
        self.subscribers.retain(|_, sub| !sub.sender.is_closed());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventPayload, LogEventKind, RconEventKind, SystemPayload};

    fn log_event(server: ServerId, kind: LogEventKind) -> Event {
        Event::new(
            server,
            EventType::Log(kind),
            EventPayload::System(SystemPayload {
                message: "test".into(),
            }),
        )
    }

    #[tokio::test]
    async fn delivers_matching_events_in_publish_order() {
        let manager = EventManager::new();
        let mut sub = manager.subscribe(EventFilter::all(), 10);
        let server = ServerId::new();

        for _ in 0..3 {
            manager.publish(log_event(server, LogEventKind::PlayerConnected));
        }

        for _ in 0..3 {
            let event = sub.receiver.recv().await.expect("event");
            assert_eq!(event.event_type, EventType::Log(LogEventKind::PlayerConnected));
        }
    }

    #[tokio::test]
    async fn server_scope_filters_out_other_servers() {
        let manager = EventManager::new();
        let server_a = ServerId::new();
        let server_b = ServerId::new();
        let mut sub = manager.subscribe(EventFilter::for_server(server_a), 10);

        manager.publish(log_event(server_b, LogEventKind::PlayerConnected));
        manager.publish(log_event(server_a, LogEventKind::PlayerDied));

        let event = sub.receiver.recv().await.expect("event");
        assert_eq!(event.server_id, server_a);
        assert_eq!(event.event_type, EventType::Log(LogEventKind::PlayerDied));
    }

    #[tokio::test]
    async fn type_filter_excludes_unlisted_types() {
        let manager = EventManager::new();
        let server = ServerId::new();
        let filter = EventFilter {
            types: Some(vec![EventType::Rcon(RconEventKind::ChatMessage)]),
            server_scope: None,
        };
        let mut sub = manager.subscribe(filter, 10);

        manager.publish(log_event(server, LogEventKind::PlayerDied));
        manager.publish(Event::new(
            server,
            EventType::Rcon(RconEventKind::ChatMessage),
            EventPayload::Connector(serde_json::Value::Null),
        ));

        let event = sub.receiver.recv().await.expect("event");
        assert_eq!(event.event_type, EventType::Rcon(RconEventKind::ChatMessage));
    }

    #[tokio::test]
    async fn overflowing_queue_drops_and_counts_but_never_blocks_publish() {
        let manager = EventManager::new();
        let server = ServerId::new();
        let sub = manager.subscribe(EventFilter::all(), 4);

        for _ in 0..100 {
            manager.publish(log_event(server, LogEventKind::TickRate));
        }

        assert!(manager.dropped_count(sub.id) >= 96);
        assert_eq!(manager.total_dropped(), manager.dropped_count(sub.id));
    }

    #[tokio::test]
    async fn unsubscribe_closes_the_channel() {
        let manager = EventManager::new();
        let server = ServerId::new();
        let mut sub = manager.subscribe(EventFilter::all(), 4);
        manager.unsubscribe(sub.id);

        manager.publish(log_event(server, LogEventKind::TickRate));
        assert!(sub.receiver.recv().await.is_none());
    }
}
