//! A single authenticated RCON connection to one game server (spec.md §4.2).
//!
//! Internally a connection is two tasks sharing a TCP stream split via
//! [`tokio_util::codec::Framed`]: a writer that serializes outbound packets
//! from a channel (so concurrent `execute()` callers never interleave
//! writes) and a reader that demultiplexes responses by id and forwards
//! unsolicited type-1 packets to anyone calling [`RconConnection::events`].

use std::future::Future;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::codec::Framed;

use crate::codec::{Packet, RconCodec, TYPE_AUTH, TYPE_AUTH_RESPONSE_OR_EXECCOMMAND, TYPE_RESPONSE_VALUE};
use crate::error::RconError;
use crate::events::classify;

const EVENT_CHANNEL_CAPACITY: usize = 1024;
const WRITE_QUEUE_CAPACITY: usize = 64;

enum WriteCommand {
    Send(Packet),
    Shutdown,
}

/// A pending `execute()` call: accumulates `RESPONSE_VALUE` bodies for its
/// command id until the sentinel id echoes back.
struct PendingCommand {
    buffer: Mutex<String>,
    done: Mutex<Option<oneshot::Sender<Result<String, RconError>>>>,
}

/// An open, authenticated RCON connection.
///
/// Cheap to clone: every clone shares the same writer queue, pending-reply
/// table, and event broadcaster.
#[derive(Clone)]
pub struct RconConnection {
    inner: Arc<Inner>,
}

struct Inner {
    write_tx: mpsc::Sender<WriteCommand>,
    next_id: AtomicI32,
    pending: DashMap<i32, Arc<PendingCommand>>,
    sentinel_to_command: DashMap<i32, i32>,
    events_tx: broadcast::Sender<Packet>,
    closed: Arc<tokio::sync::Notify>,
    is_closed: std::sync::atomic::AtomicBool,
}

impl RconConnection {
    /// Dials `addr`, performs the AUTH handshake with `password`, and
    /// returns a ready-to-use connection.
    pub async fn connect(
        addr: &str,
        password: &str,
        connect_timeout: Duration,
        auth_timeout: Duration,
    ) -> Result<Self, RconError> {
        let stream = tokio::time::timeout(connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| RconError::ConnBroken(format!("connect to {addr} timed out")))?
            .map_err(|e| RconError::ConnBroken(format!("connect to {addr}: {e}")))?;
        stream.set_nodelay(true).ok();

        let framed = Framed::new(stream, RconCodec::new());
        Self::from_framed(framed, password, auth_timeout).await
    }

    async fn from_framed(
        mut framed: Framed<TcpStream, RconCodec>,
        password: &str,
        auth_timeout: Duration,
    ) -> Result<Self, RconError> {
        let auth_id = 1;
        framed
            .send(Packet::new(auth_id, TYPE_AUTH, password))
            .await
            .map_err(|e| RconError::ConnBroken(e.to_string()))?;

        let auth_result = tokio::time::timeout(auth_timeout, async {
            loop {
                match framed.next().await {
                    Some(Ok(packet)) if packet.kind == TYPE_AUTH_RESPONSE_OR_EXECCOMMAND => {
                        return Ok(packet.id);
                    }
                    // An empty RESPONSE_VALUE sometimes precedes the
                    // AUTH_RESPONSE; keep waiting for the real response.
                    Some(Ok(packet)) if packet.kind == TYPE_RESPONSE_VALUE => continue,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => return Err(RconError::Malformed(e.to_string())),
                    None => return Err(RconError::ShortRead),
                }
            }
        })
        .await
        .map_err(|_| RconError::AuthTimeout)??;

        if auth_result == -1 {
            return Err(RconError::AuthFailed);
        }

        let (write_tx, write_rx) = mpsc::channel(WRITE_QUEUE_CAPACITY);
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let inner = Arc::new(Inner {
            write_tx,
            next_id: AtomicI32::new(2),
            pending: DashMap::new(),
            sentinel_to_command: DashMap::new(),
            events_tx,
            closed: Arc::new(tokio::sync::Notify::new()),
            is_closed: std::sync::atomic::AtomicBool::new(false),
        });

        let (write_half, read_half) = framed.split();
        tokio::spawn(Self::writer_loop(write_half, write_rx));
        tokio::spawn(Self::reader_loop(read_half, inner.clone()));

        Ok(Self { inner })
    }

    async fn writer_loop(
        mut write_half: futures::stream::SplitSink<Framed<TcpStream, RconCodec>, Packet>,
        mut rx: mpsc::Receiver<WriteCommand>,
    ) {
        while let Some(cmd) = rx.recv().await {
            match cmd {
                WriteCommand::Send(packet) => {
                    if write_half.send(packet).await.is_err() {
                        break;
                    }
                }
                WriteCommand::Shutdown => break,
            }
        }
    }

    async fn reader_loop(
        mut read_half: futures::stream::SplitStream<Framed<TcpStream, RconCodec>>,
        inner: Arc<Inner>,
    ) {
        loop {
            match read_half.next().await {
                Some(Ok(packet)) => Self::handle_incoming(&inner, packet),
                Some(Err(e)) => {
                    Self::fail_all_pending(&inner, RconError::ConnBroken(e.to_string()));
                    break;
                }
                None => {
                    Self::fail_all_pending(&inner, RconError::ConnClosed);
                    break;
                }
            }
        }
        inner.is_closed.store(true, Ordering::SeqCst);
        inner.closed.notify_waiters();
    }

    fn handle_incoming(inner: &Arc<Inner>, packet: Packet) {
        if packet.is_event() {
            let _ = inner.events_tx.send(packet);
            return;
        }
        if packet.kind != TYPE_RESPONSE_VALUE {
            return;
        }

        if let Some((_, command_id)) = inner.sentinel_to_command.remove(&packet.id) {
            if let Some((_, pending)) = inner.pending.remove(&command_id) {
                let buffer = std::mem::take(&mut *pending.buffer.lock().unwrap());
                if let Some(done) = pending.done.lock().unwrap().take() {
                    let _ = done.send(Ok(buffer));
                }
            }
            return;
        }

        if let Some(pending) = inner.pending.get(&packet.id) {
            pending.buffer.lock().unwrap().push_str(&packet.body);
        }
    }

    fn fail_all_pending(inner: &Arc<Inner>, err: RconError) {
        let ids: Vec<i32> = inner.pending.iter().map(|e| *e.key()).collect();
        for id in ids {
            if let Some((_, pending)) = inner.pending.remove(&id) {
                if let Some(done) = pending.done.lock().unwrap().take() {
                    let _ = done.send(Err(match &err {
                        RconError::ConnBroken(m) => RconError::ConnBroken(m.clone()),
                        RconError::ConnClosed => RconError::ConnClosed,
                        other => RconError::ConnBroken(other.to_string()),
                    }));
                }
            }
        }
        inner.sentinel_to_command.clear();
    }

    /// Allocates the next command id: monotonic, wraps on overflow, and
    /// never yields `-1` or `0` (reserved: auth-failure sentinel and
    /// "no id" respectively).
    fn next_id(&self) -> i32 {
        loop {
            let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
            let id = if id == i32::MAX { 1 } else { id };
            if id != -1 && id != 0 {
                return id;
            }
        }
    }

    /// Runs `command`, returning the concatenated body of every
    /// `RESPONSE_VALUE` packet the server sent before echoing the sentinel.
    pub async fn execute(&self, command: &str, timeout: Duration) -> Result<String, RconError> {
        if self.inner.is_closed.load(Ordering::SeqCst) {
            return Err(RconError::ConnClosed);
        }

        let command_id = self.next_id();
        let sentinel_id = self.next_id();

        let (done_tx, done_rx) = oneshot::channel();
        let pending = Arc::new(PendingCommand {
            buffer: Mutex::new(String::new()),
            done: Mutex::new(Some(done_tx)),
        });
        self.inner.pending.insert(command_id, pending);
        self.inner.sentinel_to_command.insert(sentinel_id, command_id);

        let send_result = async {
            self.inner
                .write_tx
                .send(WriteCommand::Send(Packet::new(
                    command_id,
                    TYPE_AUTH_RESPONSE_OR_EXECCOMMAND,
                    command,
                )))
                .await
                .map_err(|_| RconError::ConnClosed)?;
            self.inner
                .write_tx
                .send(WriteCommand::Send(Packet::new(
                    sentinel_id,
                    TYPE_AUTH_RESPONSE_OR_EXECCOMMAND,
                    "",
                )))
                .await
                .map_err(|_| RconError::ConnClosed)
        }
        .await;

        if let Err(e) = send_result {
            self.inner.pending.remove(&command_id);
            self.inner.sentinel_to_command.remove(&sentinel_id);
            return Err(e);
        }

        match tokio::time::timeout(timeout, done_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(RconError::ConnClosed),
            Err(_) => {
                self.inner.pending.remove(&command_id);
                self.inner.sentinel_to_command.remove(&sentinel_id);
                Err(RconError::Timeout)
            }
        }
    }

    /// A live stream of classified unsolicited events pushed by the
    /// server. Ends once the connection closes.
    pub fn events(&self) -> impl futures::Stream<Item = (crate::codec::Packet, Option<(aegis_events::RconEventKind, aegis_events::EventPayload)>)> {
        let rx = self.inner.events_tx.subscribe();
        BroadcastStream::new(rx).filter_map(|res| {
            res.ok().map(|packet| {
                let classified = classify(&packet.body);
                (packet, classified)
            })
        })
    }

    /// Waits until the connection is torn down, either by `close()` or by
    /// an I/O error on the reader task.
    pub fn closed(&self) -> impl Future<Output = ()> + '_ {
        let notify = self.inner.closed.clone();
        async move {
            if self.inner.is_closed.load(Ordering::SeqCst) {
                return;
            }
            notify.notified().await;
        }
    }

    /// Tears down the connection: in-flight `execute()` calls fail with
    /// `kConnClosed`, and `events()` streams end.
    pub async fn close(&self) {
        if self
            .inner
            .is_closed
            .swap(true, Ordering::SeqCst)
        {
            return;
        }
        let _ = self.inner.write_tx.send(WriteCommand::Shutdown).await;
        Self::fail_all_pending(&self.inner, RconError::ConnClosed);
        self.inner.closed.notify_waiters();
    }
}
