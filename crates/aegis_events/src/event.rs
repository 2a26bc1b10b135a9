//! The closed event/payload sum types that flow across the event plane.
//!
//! The upstream Squad Aegis service represents event payloads as
//! duck-typed `map[string]any`. Here every [`EventType`] is a fixed enum
//! variant and every variant's data is a typed [`EventPayload`] struct, so
//! a subscriber can exhaustively `match` on what it receives instead of
//! probing a map. Event types the crate doesn't know about (e.g. sent by
//! a build of a plugin newer than the subscriber) still round-trip via
//! [`EventPayload::Unknown`].

use crate::types::{ChainId, PlayerId, ServerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unsolicited events surfaced by an RCON connection (chat, kill feed,
/// squad/admin activity pushed by the game server outside of a command
/// response). Non-exhaustive by design (spec lists "RCON_CHAT_MESSAGE,
/// RCON_SQUAD_CREATED, …"); this covers the representative set the
/// parser bank and capability APIs need.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RconEventKind {
    ChatMessage,
    SquadCreated,
    PlayerWarned,
    PlayerKicked,
    PlayerBanned,
}

/// Structured events produced by the log parser bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogEventKind {
    AdminBroadcast,
    DeployableDamaged,
    PlayerConnected,
    JoinSucceeded,
    PlayerDisconnected,
    PlayerDamaged,
    PlayerWounded,
    PlayerDied,
    PlayerRevived,
    PlayerPossess,
    PlayerSquadChange,
    PlayerTeamChange,
    NewGame,
    RoundEnded,
    TickRate,
    /// Derived event emitted alongside a teamkill-annotated WOUNDED/DIED.
    Teamkill,
}

/// Process-lifecycle events not tied to a specific server subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SystemEventKind {
    ServerConnected,
    ServerDisconnected,
    PluginInstanceError,
}

/// The closed set of event types flowing across the bus, grouped by
/// source exactly as spec.md §3 describes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    Rcon(RconEventKind),
    Log(LogEventKind),
    System(SystemEventKind),
    /// A connector-emitted event, identified by the connector's own name
    /// (connectors are defined outside this crate so their event names
    /// can't be a closed Rust enum).
    Connector(String),
    /// A plugin-published event. Per spec.md §4.7.4 the `EventAPI`
    /// prefixes whatever name the plugin chose with `PLUGIN_`; that full
    /// name is stored here.
    Plugin(String),
}

impl EventType {
    /// The stable string discriminant used for config-driven subscription
    /// matching (`PluginDefinition.subscribedEventTypes`, the `"*"`
    /// wildcard) and for JSON/log representation.
    pub fn discriminant(&self) -> String {
        match self {
            EventType::Rcon(kind) => format!("RCON_{}", screaming_snake(&format!("{kind:?}"))),
            EventType::Log(kind) => format!("LOG_{}", screaming_snake(&format!("{kind:?}"))),
            EventType::System(kind) => format!("SYSTEM_{}", screaming_snake(&format!("{kind:?}"))),
            EventType::Connector(name) => format!("CONNECTOR_{name}"),
            EventType::Plugin(name) => name.clone(),
        }
    }

    /// Whether a subscription filter string matches this event type.
    /// `"*"` matches everything; otherwise the match is against the
    /// exact discriminant string.
    pub fn matches_filter(&self, filter: &str) -> bool {
        filter == "*" || filter == self.discriminant()
    }
}

fn screaming_snake(camel_ish_debug: &str) -> String {
    let mut out = String::with_capacity(camel_ish_debug.len() + 4);
    for (i, c) in camel_ish_debug.chars().enumerate() {
        if c.is_uppercase() {
            if i != 0 {
                out.push('_');
            }
            out.extend(c.to_lowercase().flat_map(|c| c.to_uppercase()));
        } else {
            out.extend(c.to_uppercase());
        }
    }
    out
}

/// Typed payload carried by an [`Event`]. One variant per [`EventType`]
/// family, plus [`EventPayload::Unknown`] for forward compatibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    RconChatMessage(RconChatMessage),
    RconSquadCreated(RconSquadCreated),
    RconPlayerWarned(RconPlayerWarned),
    RconPlayerKicked(RconPlayerKicked),
    RconPlayerBanned(RconPlayerBanned),

    LogAdminBroadcast(AdminBroadcast),
    LogDeployableDamaged(DeployableDamaged),
    LogPlayerConnected(PlayerConnected),
    LogJoinSucceeded(JoinSucceeded),
    LogPlayerDisconnected(PlayerDisconnected),
    LogPlayerDamaged(PlayerDamaged),
    LogPlayerWounded(PlayerWounded),
    LogPlayerDied(PlayerDied),
    LogPlayerRevived(PlayerRevived),
    LogPlayerPossess(PlayerPossess),
    LogPlayerSquadChange(PlayerSquadChange),
    LogPlayerTeamChange(PlayerTeamChange),
    LogNewGame(NewGame),
    LogRoundEnded(RoundEnded),
    LogTickRate(TickRate),
    LogTeamkill(Teamkill),

    System(SystemPayload),
    Connector(serde_json::Value),
    Plugin(serde_json::Value),

    /// An event whose type this build doesn't recognize. Carries the raw
    /// discriminant string and JSON value so it can still be relayed
    /// (e.g. by the gRPC log relay) without being dropped.
    Unknown {
        type_name: String,
        raw: serde_json::Value,
    },
}

/// An event flowing through the bus: `{ id, serverID, type, data, raw?, timestamp }`
/// per spec.md §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub server_id: ServerId,
    pub event_type: EventType,
    pub data: EventPayload,
    pub raw: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    pub fn new(server_id: ServerId, event_type: EventType, data: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            server_id,
            event_type,
            data,
            raw: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_raw(mut self, raw: impl Into<String>) -> Self {
        self.raw = Some(raw.into());
        self
    }
}

// ===========================================================================
// RCON payloads
// ===========================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RconChatMessage {
    pub chat_type: String,
    pub player_name: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RconSquadCreated {
    pub player_name: String,
    pub squad_name: String,
    pub team_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RconPlayerWarned {
    pub player_name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RconPlayerKicked {
    pub player_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RconPlayerBanned {
    pub player_name: String,
    pub interval: String,
}

// ===========================================================================
// LOG payloads (one struct per parser in spec.md §4.5's table)
// ===========================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminBroadcast {
    pub chain_id: ChainId,
    pub message: String,
    pub from: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployableDamaged {
    pub chain_id: ChainId,
    pub deployable: String,
    pub damage: f64,
    pub weapon: String,
    pub player_suffix: String,
    pub damage_type: String,
    pub health_remaining: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConnected {
    pub chain_id: ChainId,
    pub controller: String,
    pub ip: String,
    pub eos_id: Option<String>,
    pub steam_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinSucceeded {
    pub chain_id: ChainId,
    pub player_suffix: String,
    /// False when no matching `joinRequests[chainID]` entry existed
    /// (spec.md §4.5: still emitted, but anomalous).
    pub matched_join_request: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerDisconnected {
    pub ip: String,
    pub controller: String,
    pub eos_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerDamaged {
    pub victim_name: String,
    pub damage: f64,
    pub attacker_name: String,
    pub attacker_eos_id: Option<String>,
    pub attacker_steam_id: Option<String>,
    pub attacker_controller: String,
    pub weapon: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerWounded {
    pub victim_name: String,
    pub victim_eos_id: Option<String>,
    pub damage: f64,
    pub attacker_name: String,
    pub attacker_eos_id: Option<String>,
    pub attacker_controller: String,
    pub weapon: String,
    pub teamkill: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerDied {
    pub victim_name: String,
    pub victim_eos_id: Option<String>,
    pub damage: f64,
    pub attacker_name: String,
    pub attacker_eos_id: Option<String>,
    pub attacker_controller: String,
    pub weapon: String,
    pub teamkill: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerRevived {
    pub reviver_name: String,
    pub reviver_eos_id: Option<String>,
    pub victim_name: String,
    pub victim_eos_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerPossess {
    pub player_suffix: String,
    pub eos_id: Option<String>,
    pub steam_id: Option<String>,
    pub pawn_classname: String,
    pub chain_id: ChainId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSquadChange {
    pub player_name: String,
    pub eos_id: Option<String>,
    pub team_id: u32,
    pub squad_id: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerTeamChange {
    pub player_name: String,
    pub eos_id: Option<String>,
    pub old_team_id: Option<u32>,
    pub new_team_id: u32,
}

/// The ticket-variant `NEW_GAME` line (`team X has won/lost...`) and the
/// map-loading variant both surface as `LOG_NEW_GAME`; which fields are
/// populated distinguishes them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewGame {
    pub map_loading: bool,
    pub team: Option<String>,
    pub subfaction: Option<String>,
    pub faction: Option<String>,
    pub won: Option<bool>,
    pub tickets: Option<i64>,
    pub layer: Option<String>,
    pub level: Option<String>,
    pub dlc: Option<String>,
    pub map_classname: Option<String>,
    pub layer_classname: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundEnded {
    pub winner: Option<String>,
    pub loser: Option<String>,
    pub layer: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickRate {
    pub rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Teamkill {
    pub victim_name: String,
    pub victim_eos_id: String,
    pub attacker_name: String,
    pub attacker_eos_id: String,
    pub team_id: u32,
}

// ===========================================================================
// SYSTEM payloads
// ===========================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemPayload {
    pub message: String,
}
