//! RCON error kinds, mapping onto spec.md §7's taxonomy.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RconError {
    /// `kMalformed`: protocol framing error. Never triggers a reconnect
    /// by itself — it's a bug in either side's framing.
    #[error("malformed RCON packet: {0}")]
    Malformed(String),

    /// `kShortRead`: the socket closed before a full frame arrived.
    #[error("short read while decoding RCON frame")]
    ShortRead,

    /// `kAuthFailed`: the server rejected the auth token (id echoed `-1`).
    #[error("RCON authentication rejected by server")]
    AuthFailed,

    /// `kAuthTimeout`: no AUTH_RESPONSE arrived before the deadline.
    #[error("RCON authentication timed out")]
    AuthTimeout,

    /// `kConnBroken`: an I/O error tore down the connection; pending
    /// replies are failed with this and the supervisor reconnects.
    #[error("RCON connection broken: {0}")]
    ConnBroken(String),

    /// `kConnClosed`: `execute` was called on (or outlived) a `close()`d
    /// connection.
    #[error("RCON connection closed")]
    ConnClosed,

    /// `kTimeout`: an in-flight `execute` exceeded its deadline.
    #[error("RCON command timed out")]
    Timeout,

    /// `kNotConnected`: a command was issued before the connection
    /// reached `ready`, and the manager's wait deadline expired.
    #[error("server {0} is not connected")]
    NotConnected(aegis_events::ServerId),
}
