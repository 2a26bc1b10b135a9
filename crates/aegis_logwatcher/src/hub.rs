//! Fan-out from the single log pipeline to every connected gRPC stream
//! (spec.md §4.8/§5): one bounded, drop-on-full channel per client,
//! mirroring `aegis_events::manager::EventManager`'s subscriber table but
//! scoped to this process's one log source instead of the full event
//! plane.

use std::sync::atomic::{AtomicU64, Ordering};

use aegis_events::{EventPayload, LogEventKind};
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::trace;
use uuid::Uuid;

const CLIENT_QUEUE_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct ParsedEvent {
    pub kind: LogEventKind,
    pub payload: EventPayload,
}

#[derive(Default)]
pub struct LogHub {
    line_clients: DashMap<Uuid, mpsc::Sender<String>>,
    event_clients: DashMap<Uuid, mpsc::Sender<ParsedEvent>>,
    dropped: AtomicU64,
}

impl LogHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe_lines(&self) -> (Uuid, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(CLIENT_QUEUE_CAPACITY);
        let id = Uuid::new_v4();
        self.line_clients.insert(id, tx);
        (id, rx)
    }

    pub fn unsubscribe_lines(&self, id: Uuid) {
        self.line_clients.remove(&id);
    }

    pub fn subscribe_events(&self) -> (Uuid, mpsc::Receiver<ParsedEvent>) {
        let (tx, rx) = mpsc::channel(CLIENT_QUEUE_CAPACITY);
        let id = Uuid::new_v4();
        self.event_clients.insert(id, tx);
        (id, rx)
    }

    pub fn unsubscribe_events(&self, id: Uuid) {
        self.event_clients.remove(&id);
    }

    pub fn publish_line(&self, line: &str) {
        for entry in self.line_clients.iter() {
            if entry.value().try_send(line.to_string()).is_err() {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                trace!(client = %entry.key(), "log line dropped: client queue full or closed");
            }
        }
    }

    pub fn publish_event(&self, kind: LogEventKind, payload: EventPayload) {
        for entry in self.event_clients.iter() {
            if entry.value().try_send(ParsedEvent { kind, payload: payload.clone() }).is_err() {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                trace!(client = %entry.key(), "parsed event dropped: client queue full or closed");
            }
        }
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn a_published_line_reaches_every_subscriber() {
        let hub = LogHub::new();
        let (_, mut rx_a) = hub.subscribe_lines();
        let (_, mut rx_b) = hub.subscribe_lines();

        hub.publish_line("hello");

        assert_eq!(rx_a.recv().await.unwrap(), "hello");
        assert_eq!(rx_b.recv().await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn overflowing_a_clients_queue_drops_and_counts_without_affecting_others() {
        let hub = LogHub::new();
        let (_, mut rx_slow) = hub.subscribe_lines();
        let (_, mut rx_fast) = hub.subscribe_lines();

        for i in 0..(CLIENT_QUEUE_CAPACITY + 10) {
            hub.publish_line(&format!("line-{i}"));
        }

        assert!(hub.dropped_count() > 0);
        assert_eq!(rx_slow.recv().await.unwrap(), "line-0");
        assert_eq!(rx_fast.recv().await.unwrap(), "line-0");
    }

    #[tokio::test]
    async fn unsubscribing_stops_further_deliveries() {
        let hub = LogHub::new();
        let (id, mut rx) = hub.subscribe_lines();
        hub.unsubscribe_lines(id);
        hub.publish_line("after unsubscribe");
        assert!(rx.recv().await.is_none());
    }
}
