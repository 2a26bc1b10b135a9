//! The `LogWatcher` gRPC service (spec.md §4.8): two server-streaming
//! RPCs, bearer-token auth, bounded-queue-with-drop backpressure against
//! slow clients (handled by [`crate::hub::LogHub`]).

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::mpsc;
use tokio_stream::{wrappers::ReceiverStream, Stream, StreamExt};
use tonic::{Request, Response, Status};
use tracing::info;
use uuid::Uuid;

use crate::hub::LogHub;

pub mod proto {
    tonic::include_proto!("logwatcher");
}

use proto::log_watcher_server::LogWatcher;
use proto::{AuthRequest, EventEntry, LogEntry};

pub struct LogWatcherService {
    auth_token: String,
    hub: Arc<LogHub>,
}

impl LogWatcherService {
    pub fn new(auth_token: String, hub: Arc<LogHub>) -> Self {
        Self { auth_token, hub }
    }

    fn check_token(&self, token: &str) -> Result<(), Status> {
        if token == self.auth_token {
            Ok(())
        } else {
            Err(Status::unauthenticated("invalid auth token"))
        }
    }
}

/// Removes the subscriber's channel from the hub as soon as the gRPC
/// stream is dropped (client disconnect or server shutdown), not only
/// when the channel happens to close on its own.
struct UnsubscribeOnDrop<T> {
    inner: ReceiverStream<T>,
    id: Uuid,
    unsubscribe: fn(&LogHub, Uuid),
    hub: Arc<LogHub>,
}

impl<T> Stream for UnsubscribeOnDrop<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        let this = self.get_mut();
        Pin::new(&mut this.inner).poll_next(cx)
    }
}

impl<T> Drop for UnsubscribeOnDrop<T> {
    fn drop(&mut self) {
        (self.unsubscribe)(&self.hub, self.id);
    }
}

fn lines_stream(hub: Arc<LogHub>, id: Uuid, rx: mpsc::Receiver<String>) -> UnsubscribeOnDrop<String> {
    UnsubscribeOnDrop {
        inner: ReceiverStream::new(rx),
        id,
        unsubscribe: |hub, id| hub.unsubscribe_lines(id),
        hub,
    }
}

fn events_stream(hub: Arc<LogHub>, id: Uuid, rx: mpsc::Receiver<crate::hub::ParsedEvent>) -> UnsubscribeOnDrop<crate::hub::ParsedEvent> {
    UnsubscribeOnDrop {
        inner: ReceiverStream::new(rx),
        id,
        unsubscribe: |hub, id| hub.unsubscribe_events(id),
        hub,
    }
}

#[tonic::async_trait]
impl LogWatcher for LogWatcherService {
    type StreamLogsStream = Pin<Box<dyn Stream<Item = Result<LogEntry, Status>> + Send + 'static>>;
    type StreamEventsStream = Pin<Box<dyn Stream<Item = Result<EventEntry, Status>> + Send + 'static>>;

    async fn stream_logs(&self, request: Request<AuthRequest>) -> Result<Response<Self::StreamLogsStream>, Status> {
        self.check_token(&request.into_inner().token)?;

        let (id, rx) = self.hub.subscribe_lines();
        info!(client = %id, "StreamLogs client connected");

        let stream = StreamExt::map(lines_stream(self.hub.clone(), id, rx), |line| Ok(LogEntry { content: line.trim().to_string() }));
        Ok(Response::new(Box::pin(stream)))
    }

    async fn stream_events(&self, request: Request<AuthRequest>) -> Result<Response<Self::StreamEventsStream>, Status> {
        self.check_token(&request.into_inner().token)?;

        let (id, rx) = self.hub.subscribe_events();
        info!(client = %id, "StreamEvents client connected");

        let stream = StreamExt::map(events_stream(self.hub.clone(), id, rx), |parsed| {
            let data = serde_json::to_string(&parsed.payload).unwrap_or_else(|_| "null".to_string());
            Ok(EventEntry { event: format!("{:?}", parsed.kind), data })
        });
        Ok(Response::new(Box::pin(stream)))
    }
}
