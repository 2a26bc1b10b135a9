//! Identifiers shared across the event plane.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque 128-bit identifier for a managed Squad server.
///
/// Wraps a `Uuid` rather than re-using it directly so the rest of the
/// crate can't accidentally compare a `ServerID` against an unrelated
/// `Uuid` (an event id, a subscriber id) at the type level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServerId(pub Uuid);

impl ServerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }
}

impl Default for ServerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// A player identifier as it shows up in Squad log lines and RCON output:
/// keyed by EOS id when present, else falling back to the Steam id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayerId {
    Eos(String),
    Steam(String),
}

impl PlayerId {
    pub fn as_str(&self) -> &str {
        match self {
            PlayerId::Eos(id) | PlayerId::Steam(id) => id.as_str(),
        }
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerId::Eos(id) => write!(f, "eos:{id}"),
            PlayerId::Steam(id) => write!(f, "steam:{id}"),
        }
    }
}

/// The monotonic chain id the game server stamps into multi-stage log
/// lines (join request -> join succeeded) to correlate them.
pub type ChainId = String;
