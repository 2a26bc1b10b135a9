//! Multiplexed, auto-reconnecting RCON connection manager (spec.md §4.3).
//!
//! One [`RconManager`] supervises zero or more server connections. Each
//! server gets its own supervisor task that dials, authenticates, forwards
//! classified events onto the shared [`EventManager`], and on any
//! `kConnBroken`/`kConnClosed` reconnects with exponential backoff,
//! resetting the backoff once a connection has stayed up for 30s.

use std::sync::Arc;
use std::time::Duration;

use aegis_events::{Event, EventManager, EventType, ServerId, SystemEventKind, SystemPayload};
use dashmap::DashMap;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::connection::RconConnection;
use crate::error::RconError;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);
const STABLE_RESET_THRESHOLD: Duration = Duration::from_secs(30);
const DEFAULT_COMMAND_WAIT_DEADLINE: Duration = Duration::from_secs(5);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Dial target for one server.
#[derive(Debug, Clone)]
pub struct ServerTarget {
    pub server_id: ServerId,
    pub addr: String,
    pub password: String,
}

struct ManagedServer {
    connection: Arc<tokio::sync::RwLock<Option<RconConnection>>>,
    supervisor: tokio::task::JoinHandle<()>,
    shutdown: CancellationToken,
}

/// Owns every server's connection and supervisor task.
pub struct RconManager {
    events: Arc<EventManager>,
    servers: DashMap<ServerId, ManagedServer>,
    command_wait_deadline: Duration,
}

impl RconManager {
    pub fn new(events: Arc<EventManager>) -> Self {
        Self {
            events,
            servers: DashMap::new(),
            command_wait_deadline: DEFAULT_COMMAND_WAIT_DEADLINE,
        }
    }

    pub fn with_command_wait_deadline(mut self, deadline: Duration) -> Self {
        self.command_wait_deadline = deadline;
        self
    }

    /// Starts supervising `target`. Idempotent: calling it again for an
    /// already-managed server replaces the prior supervisor.
    pub fn connect(&self, target: ServerTarget) {
        let shutdown = CancellationToken::new();
        let connection_slot = Arc::new(tokio::sync::RwLock::new(None));
        let supervisor = tokio::spawn(Self::supervise(
            target.clone(),
            self.events.clone(),
            connection_slot.clone(),
            shutdown.clone(),
        ));

        if let Some((_, old)) = self.servers.remove(&target.server_id) {
            old.shutdown.cancel();
            old.supervisor.abort();
        }
        self.servers.insert(
            target.server_id,
            ManagedServer {
                connection: connection_slot,
                supervisor,
                shutdown,
            },
        );
    }

    /// Connects to every target, returning immediately (connections
    /// happen in the background via each server's supervisor).
    pub fn connect_all(&self, targets: impl IntoIterator<Item = ServerTarget>) {
        for target in targets {
            self.connect(target);
        }
    }

    async fn supervise(
        target: ServerTarget,
        events: Arc<EventManager>,
        connection_slot: Arc<tokio::sync::RwLock<Option<RconConnection>>>,
        shutdown: CancellationToken,
    ) {
        let mut backoff = INITIAL_BACKOFF;

        loop {
            if shutdown.is_cancelled() {
                return;
            }

            let connect_started = tokio::time::Instant::now();
            let connect_result = RconConnection::connect(
                &target.addr,
                &target.password,
                DEFAULT_CONNECT_TIMEOUT,
                DEFAULT_AUTH_TIMEOUT,
            )
            .await;

            let connection = match connect_result {
                Ok(conn) => conn,
                Err(e) => {
                    warn!(server_id = %target.server_id, error = %e, backoff_secs = backoff.as_secs(), "RCON connect failed, retrying");
                    tokio::select! {
                        _ = tokio::time::sleep(backoff) => {}
                        _ = shutdown.cancelled() => return,
                    }
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                    continue;
                }
            };

            info!(server_id = %target.server_id, "RCON connected");
            *connection_slot.write().await = Some(connection.clone());
            events.publish(Event::new(
                target.server_id,
                EventType::System(SystemEventKind::ServerConnected),
                aegis_events::EventPayload::System(SystemPayload {
                    message: format!("connected to {}", target.addr),
                }),
            ));

            let event_forwarder = tokio::spawn(Self::forward_events(
                target.server_id,
                connection.clone(),
                events.clone(),
            ));

            tokio::select! {
                _ = connection.closed() => {}
                _ = shutdown.cancelled() => {
                    connection.close().await;
                    event_forwarder.abort();
                    *connection_slot.write().await = None;
                    return;
                }
            }
            event_forwarder.abort();
            *connection_slot.write().await = None;

            events.publish(Event::new(
                target.server_id,
                EventType::System(SystemEventKind::ServerDisconnected),
                aegis_events::EventPayload::System(SystemPayload {
                    message: format!("disconnected from {}", target.addr),
                }),
            ));

            if connect_started.elapsed() >= STABLE_RESET_THRESHOLD {
                backoff = INITIAL_BACKOFF;
            } else {
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }
        }
    }

    async fn forward_events(server_id: ServerId, connection: RconConnection, events: Arc<EventManager>) {
        let mut stream = Box::pin(connection.events());
        while let Some((packet, classified)) = stream.next().await {
            let Some((kind, payload)) = classified else {
                continue;
            };
            let event = Event::new(server_id, EventType::Rcon(kind), payload).with_raw(packet.body);
            events.publish(event);
        }
    }

    /// Runs `command` on `server_id`, waiting up to `self.command_wait_deadline`
    /// for the connection to become ready if it isn't yet.
    pub async fn execute(&self, server_id: ServerId, command: &str) -> Result<String, RconError> {
        let connection = self.wait_for_connection(server_id).await?;
        connection.execute(command, self.command_wait_deadline).await
    }

    async fn wait_for_connection(&self, server_id: ServerId) -> Result<RconConnection, RconError> {
        let managed = self
            .servers
            .get(&server_id)
            .ok_or(RconError::NotConnected(server_id))?;
        let slot = managed.connection.clone();
        drop(managed);

        if let Some(conn) = slot.read().await.clone() {
            return Ok(conn);
        }

        let deadline = tokio::time::Instant::now() + self.command_wait_deadline;
        loop {
            if let Some(conn) = slot.read().await.clone() {
                return Ok(conn);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(RconError::NotConnected(server_id));
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    /// Stops supervising `server_id` and closes its connection, if any.
    pub async fn disconnect(&self, server_id: ServerId) {
        if let Some((_, managed)) = self.servers.remove(&server_id) {
            managed.shutdown.cancel();
            if let Some(conn) = managed.connection.read().await.clone() {
                conn.close().await;
            }
            managed.supervisor.abort();
        }
    }

    /// Stops every supervisor and closes every connection.
    pub async fn shutdown(&self) {
        let ids: Vec<ServerId> = self.servers.iter().map(|e| *e.key()).collect();
        for id in ids {
            self.disconnect(id).await;
        }
    }

    /// Whether `server_id` currently has a live, authenticated connection.
    pub async fn is_connected(&self, server_id: ServerId) -> bool {
        match self.servers.get(&server_id) {
            Some(managed) => managed.connection.read().await.is_some(),
            None => false,
        }
    }

    pub fn managed_server_ids(&self) -> Vec<ServerId> {
        self.servers.iter().map(|e| *e.key()).collect()
    }
}
