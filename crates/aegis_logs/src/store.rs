//! Per-log-source session state (spec.md §3, §4.5): `joinRequests`,
//! `players`, `session`, and `disconnected`, plus the mutations and
//! teamkill-correlation rule each parser relies on.

use dashmap::DashMap;

use crate::types::{DisconnectedRecord, JoinRequestRecord, PlayerRecord};
use aegis_events::ChainId;

/// A combat-related event snapshot cached under the victim's name, so a
/// later stage (wound, die) can merge details an earlier stage (damage)
/// already captured, and vice versa (spec.md §4.5).
#[derive(Debug, Clone)]
pub struct DamageSnapshot {
    pub attacker_name: String,
    pub attacker_eos_id: Option<String>,
    pub attacker_controller: String,
    pub weapon: String,
    pub damage: f64,
}

/// Scratch state keyed by player name, used to correlate multi-stage
/// events (damage → wound → die, possess) and to cache team/squad id,
/// plus the three well-known round-tracking keys (`ROUND_WINNER`,
/// `ROUND_LOSER`, `WON`).
#[derive(Debug, Clone, Default)]
pub struct PlayerSessionState {
    pub team_id: Option<u32>,
    pub squad_id: Option<u32>,
    pub eos_id: Option<String>,
    pub chain_id: Option<ChainId>,
    pub last_damage: Option<DamageSnapshot>,
}

#[derive(Debug, Clone)]
pub enum SessionEntry {
    Player(PlayerSessionState),
    RoundWinner(String),
    RoundLoser(String),
    Won {
        winner: Option<String>,
        layer: Option<String>,
    },
}

const KEY_ROUND_WINNER: &str = "ROUND_WINNER";
const KEY_ROUND_LOSER: &str = "ROUND_LOSER";
const KEY_WON: &str = "WON";

/// One log source's accumulated state. Cheap to share: every map is a
/// `DashMap` so concurrent parser invocations (there should only ever be
/// one reader per source, but the manager may inspect state concurrently)
/// never contend on a single lock.
#[derive(Debug, Default)]
pub struct EventStore {
    pub join_requests: DashMap<ChainId, JoinRequestRecord>,
    pub players: DashMap<String, PlayerRecord>,
    pub session: DashMap<String, SessionEntry>,
    pub disconnected: DashMap<String, DisconnectedRecord>,
}

impl EventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks a player up by EOS id, falling back to Steam id, returning
    /// the key that actually hit so callers can re-key on it.
    pub fn find_player(&self, eos_id: Option<&str>, steam_id: Option<&str>) -> Option<(String, PlayerRecord)> {
        if let Some(id) = eos_id {
            if let Some(r) = self.players.get(id) {
                return Some((id.to_string(), r.clone()));
            }
        }
        if let Some(id) = steam_id {
            if let Some(r) = self.players.get(id) {
                return Some((id.to_string(), r.clone()));
            }
        }
        None
    }

    fn player_key(eos_id: Option<&str>, steam_id: Option<&str>) -> Option<String> {
        eos_id.or(steam_id).map(|s| s.to_string())
    }

    /// `PLAYER_CONNECTED`: insert `joinRequests[chainID]`, upsert the
    /// player record, and clear any stale `disconnected` entry.
    pub fn on_player_connected(
        &self,
        chain_id: ChainId,
        controller: String,
        ip: String,
        eos_id: Option<String>,
        steam_id: Option<String>,
    ) {
        self.join_requests.insert(
            chain_id,
            JoinRequestRecord {
                controller: controller.clone(),
                ip: ip.clone(),
                eos_id: eos_id.clone(),
                steam_id: steam_id.clone(),
            },
        );

        if let Some(key) = Self::player_key(eos_id.as_deref(), steam_id.as_deref()) {
            self.players
                .entry(key.clone())
                .and_modify(|r| {
                    r.controller = Some(controller.clone());
                    r.ip = Some(ip.clone());
                })
                .or_insert_with(|| PlayerRecord {
                    eos_id: eos_id.clone(),
                    steam_id: steam_id.clone(),
                    player_suffix: None,
                    controller: Some(controller),
                    ip: Some(ip),
                    team_id: None,
                    squad_id: None,
                });
            self.disconnected.remove(&key);
        }
    }

    /// `JOIN_SUCCEEDED`: look up and remove `joinRequests[chainID]`,
    /// returning whether a matching request existed (the anomalous case
    /// per spec.md §4.5 still lets the caller emit the event).
    pub fn on_join_succeeded(&self, chain_id: &ChainId, player_suffix: &str) -> bool {
        match self.join_requests.remove(chain_id) {
            Some((_, record)) => {
                if let Some(key) = Self::player_key(record.eos_id.as_deref(), record.steam_id.as_deref()) {
                    if let Some(mut r) = self.players.get_mut(&key) {
                        r.player_suffix = Some(player_suffix.to_string());
                    }
                }
                true
            }
            None => false,
        }
    }

    /// `PLAYER_DISCONNECTED`: record in `disconnected`, keyed by EOS id
    /// when known, falling back to controller.
    pub fn on_player_disconnected(&self, ip: String, controller: String, eos_id: Option<String>) {
        let key = eos_id.clone().unwrap_or_else(|| controller.clone());
        self.disconnected.insert(
            key,
            DisconnectedRecord {
                ip,
                controller,
                eos_id,
            },
        );
    }

    fn player_team_id(&self, eos_id: Option<&str>) -> Option<u32> {
        let id = eos_id?;
        self.players.get(id).and_then(|r| r.team_id)
    }

    /// The team id cached for `name` in `session`, if any — used to stamp
    /// the `TEAMKILL` event's `team_id` once `is_teamkill` has confirmed
    /// victim and attacker share one.
    pub fn session_team_id(&self, name: &str) -> Option<u32> {
        match self.session.get(name)?.value() {
            SessionEntry::Player(p) => p.team_id,
            _ => None,
        }
    }

    fn session_eos_id(&self, name: &str) -> Option<String> {
        match self.session.get(name)?.value() {
            SessionEntry::Player(p) => p.eos_id.clone(),
            _ => None,
        }
    }

    /// Teamkill detection rule shared by `PLAYER_WOUNDED` and `PLAYER_DIED`
    /// (spec.md §4.5).
    pub fn is_teamkill(&self, victim_name: &str, attacker_eos_id: Option<&str>) -> bool {
        let victim_team = self.session_team_id(victim_name);
        let attacker_team = self.player_team_id(attacker_eos_id);
        let victim_eos = self.session_eos_id(victim_name);

        match (victim_team, attacker_team, victim_eos, attacker_eos_id) {
            (Some(vt), Some(at), Some(veos), Some(aeos)) => vt == at && veos != aeos,
            _ => false,
        }
    }

    /// `PLAYER_DAMAGED`: `session[victimName] = event`, and upsert the
    /// attacker's player record (by EOS id) with their controller name.
    pub fn on_player_damaged(&self, victim_name: &str, attacker_name: &str, attacker_eos_id: Option<&str>, attacker_controller: &str, weapon: &str, damage: f64) {
        let snapshot = DamageSnapshot {
            attacker_name: attacker_name.to_string(),
            attacker_eos_id: attacker_eos_id.map(|s| s.to_string()),
            attacker_controller: attacker_controller.to_string(),
            weapon: weapon.to_string(),
            damage,
        };
        self.store_damage_snapshot(victim_name, snapshot);

        if let Some(id) = attacker_eos_id {
            self.players
                .entry(id.to_string())
                .and_modify(|r| r.controller = Some(attacker_controller.to_string()))
                .or_insert_with(|| PlayerRecord {
                    eos_id: Some(id.to_string()),
                    steam_id: None,
                    player_suffix: None,
                    controller: Some(attacker_controller.to_string()),
                    ip: None,
                    team_id: None,
                    squad_id: None,
                });
        }
    }

    /// `PLAYER_WOUNDED`/`PLAYER_DIED`: merge with the snapshot cached under
    /// `session[victimName]` (returned, so the caller can backfill any
    /// field its own regex capture missed), then overwrite it with this
    /// stage's event.
    pub fn merge_and_update_combat_session(&self, victim_name: &str, attacker_name: &str, attacker_eos_id: Option<&str>, attacker_controller: &str, weapon: &str, damage: f64) -> Option<DamageSnapshot> {
        let previous = self.session.get(victim_name).and_then(|e| match e.value() {
            SessionEntry::Player(p) => p.last_damage.clone(),
            _ => None,
        });

        let snapshot = DamageSnapshot {
            attacker_name: attacker_name.to_string(),
            attacker_eos_id: attacker_eos_id.map(|s| s.to_string()),
            attacker_controller: attacker_controller.to_string(),
            weapon: weapon.to_string(),
            damage,
        };
        self.store_damage_snapshot(victim_name, snapshot);
        previous
    }

    fn store_damage_snapshot(&self, victim_name: &str, snapshot: DamageSnapshot) {
        self.session
            .entry(victim_name.to_string())
            .and_modify(|e| {
                if let SessionEntry::Player(p) = e {
                    p.last_damage = Some(snapshot.clone());
                }
            })
            .or_insert_with(|| {
                SessionEntry::Player(PlayerSessionState {
                    last_damage: Some(snapshot),
                    ..Default::default()
                })
            });
    }

    /// `PLAYER_REVIVED`: merge from `session[reviverName]`, backfilling the
    /// reviver's EOS id from the cached session entry when the log line's
    /// own `Online IDs` capture didn't include one.
    pub fn merge_reviver_eos_id(&self, reviver_name: &str, captured: Option<String>) -> Option<String> {
        captured.or_else(|| self.session_eos_id(reviver_name))
    }

    /// `PLAYER_POSSESS`: `session[playerSuffix] = {chainID}`, preserving
    /// any team/squad/EOS id already cached under that name.
    pub fn on_player_possess(&self, player_suffix: &str, chain_id: &ChainId) {
        self.session
            .entry(player_suffix.to_string())
            .and_modify(|e| {
                if let SessionEntry::Player(p) = e {
                    p.chain_id = Some(chain_id.clone());
                }
            })
            .or_insert_with(|| {
                SessionEntry::Player(PlayerSessionState {
                    chain_id: Some(chain_id.clone()),
                    ..Default::default()
                })
            });
    }

    /// `PLAYER_SQUAD_CHANGE`: update both the name-keyed session entry and
    /// the EOS-keyed player record.
    pub fn on_player_squad_change(&self, name: &str, eos_id: Option<&str>, team_id: u32, squad_id: u32) {
        self.session
            .entry(name.to_string())
            .and_modify(|e| {
                if let SessionEntry::Player(p) = e {
                    p.team_id = Some(team_id);
                    p.squad_id = Some(squad_id);
                    if let Some(id) = eos_id {
                        p.eos_id = Some(id.to_string());
                    }
                }
            })
            .or_insert_with(|| {
                SessionEntry::Player(PlayerSessionState {
                    team_id: Some(team_id),
                    squad_id: Some(squad_id),
                    eos_id: eos_id.map(|s| s.to_string()),
                })
            });

        if let Some(id) = eos_id {
            if let Some(mut r) = self.players.get_mut(id) {
                r.team_id = Some(team_id);
                r.squad_id = Some(squad_id);
                r.player_suffix = Some(name.to_string());
            }
        }
    }

    /// `PLAYER_TEAM_CHANGE`: same as squad change, returns the prior team
    /// id (`oldTeamID`) if one was cached.
    pub fn on_player_team_change(&self, name: &str, eos_id: Option<&str>, new_team_id: u32) -> Option<u32> {
        let old = self.session_team_id(name);
        self.on_player_squad_change(name, eos_id, new_team_id, 0);
        old
    }

    /// `NEW_GAME` (ticket variant): stash the winning/losing team under
    /// the well-known session keys.
    pub fn on_new_game_ticket(&self, team: String, won: bool) {
        let key = if won { KEY_ROUND_WINNER } else { KEY_ROUND_LOSER };
        self.session.insert(
            key.to_string(),
            if won {
                SessionEntry::RoundWinner(team)
            } else {
                SessionEntry::RoundLoser(team)
            },
        );
    }

    /// `ROUND_ENDED` (DetermineMatchWinner): set `session["WON"]`; a
    /// second arrival before it's cleared overwrites `winner` with `None`
    /// rather than merging (an Open Question the upstream service leaves
    /// ambiguous; this crate takes the literal "overwrite" reading).
    pub fn on_round_ended_determine_winner(&self, winner: String, layer: Option<String>) {
        let already_set = self.session.contains_key(KEY_WON);
        self.session.insert(
            KEY_WON.to_string(),
            SessionEntry::Won {
                winner: if already_set { None } else { Some(winner) },
                layer,
            },
        );
    }

    /// `ROUND_ENDED` (WaitingPostMatch transition): assemble
    /// `{winner, loser}` from the cached round-ticket keys and clear them.
    pub fn on_round_ended_waiting_post_match(&self) -> (Option<String>, Option<String>) {
        let winner = self
            .session
            .remove(KEY_ROUND_WINNER)
            .and_then(|(_, v)| match v {
                SessionEntry::RoundWinner(t) => Some(t),
                _ => None,
            });
        let loser = self
            .session
            .remove(KEY_ROUND_LOSER)
            .and_then(|(_, v)| match v {
                SessionEntry::RoundLoser(t) => Some(t),
                _ => None,
            });
        (winner, loser)
    }

    /// `NEW_GAME` (map loading): merge with `session["WON"]`, then clear
    /// `session` and `disconnected` while preserving `players` and
    /// `joinRequests`.
    pub fn on_new_game_map_loading(&self) -> Option<(Option<String>, Option<String>)> {
        let won = self.session.remove(KEY_WON).and_then(|(_, v)| match v {
            SessionEntry::Won { winner, layer } => Some((winner, layer)),
            _ => None,
        });
        self.session.clear();
        self.disconnected.clear();
        won
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_request_lifecycle() {
        let store = EventStore::new();
        store.on_player_connected(
            "42".to_string(),
            "ctrl1".into(),
            "1.2.3.4".into(),
            Some("EC".into()),
            None,
        );
        assert!(store.join_requests.contains_key("42"));
        let matched = store.on_join_succeeded(&"42".to_string(), "Carol");
        assert!(matched);
        assert!(!store.join_requests.contains_key("42"));
        assert_eq!(store.players.get("EC").unwrap().player_suffix.as_deref(), Some("Carol"));
    }

    #[test]
    fn join_succeeded_without_request_reports_anomalous() {
        let store = EventStore::new();
        assert!(!store.on_join_succeeded(&"999".to_string(), "Nobody"));
    }

    #[test]
    fn teamkill_rule_requires_equal_distinct_players_same_team() {
        let store = EventStore::new();
        store.on_player_squad_change("Alice", Some("EA"), 1, 2);
        store.on_player_squad_change("Bob", Some("EB"), 1, 3);
        assert!(store.is_teamkill("Alice", Some("EB")));
        assert!(!store.is_teamkill("Alice", Some("EA")));
    }

    #[test]
    fn map_loading_clears_session_and_disconnected_but_keeps_players_and_join_requests() {
        let store = EventStore::new();
        store.on_player_connected("42".into(), "ctrl".into(), "1.2.3.4".into(), Some("EC".into()), None);
        store.on_player_disconnected("1.2.3.4".into(), "ctrl".into(), Some("EC".into()));
        store.on_player_squad_change("Carol", Some("EC"), 1, 1);

        store.on_new_game_map_loading();

        assert!(store.session.is_empty());
        assert!(store.disconnected.is_empty());
        assert!(store.join_requests.contains_key("42"));
        assert!(store.players.contains_key("EC"));
    }

    #[test]
    fn round_ended_determine_winner_overwrites_on_second_arrival() {
        let store = EventStore::new();
        store.on_round_ended_determine_winner("Team1".into(), Some("Narva".into()));
        store.on_round_ended_determine_winner("Team2".into(), Some("Narva".into()));
        match store.session.get(KEY_WON).unwrap().value() {
            SessionEntry::Won { winner, .. } => assert!(winner.is_none()),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn player_damaged_upserts_attacker_controller_by_eos_id() {
        let store = EventStore::new();
        store.on_player_damaged("Victim", "Attacker", Some("EA"), "ctrl-attacker", "BP_AK", 25.0);
        assert_eq!(store.players.get("EA").unwrap().controller.as_deref(), Some("ctrl-attacker"));
        match store.session.get("Victim").unwrap().value() {
            SessionEntry::Player(p) => assert_eq!(p.last_damage.as_ref().unwrap().attacker_eos_id.as_deref(), Some("EA")),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn wounded_merges_and_overwrites_the_damaged_snapshot() {
        let store = EventStore::new();
        store.on_player_damaged("Victim", "Attacker", Some("EA"), "ctrl-attacker", "BP_AK", 25.0);

        let previous = store.merge_and_update_combat_session("Victim", "Attacker", Some("EA"), "ctrl-attacker", "BP_AK", 100.0);
        assert_eq!(previous.unwrap().damage, 25.0);

        match store.session.get("Victim").unwrap().value() {
            SessionEntry::Player(p) => assert_eq!(p.last_damage.as_ref().unwrap().damage, 100.0),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn revived_merges_reviver_eos_id_from_session_when_capture_is_missing() {
        let store = EventStore::new();
        store.on_player_squad_change("Medic", Some("EM"), 1, 1);
        assert_eq!(store.merge_reviver_eos_id("Medic", None), Some("EM".to_string()));
        assert_eq!(store.merge_reviver_eos_id("Medic", Some("EX".to_string())), Some("EX".to_string()));
    }

    #[test]
    fn possess_stores_chain_id_without_losing_cached_team_state() {
        let store = EventStore::new();
        store.on_player_squad_change("Carol", Some("EC"), 1, 2);
        store.on_player_possess("Carol", &"77".to_string());
        match store.session.get("Carol").unwrap().value() {
            SessionEntry::Player(p) => {
                assert_eq!(p.chain_id.as_deref(), Some("77"));
                assert_eq!(p.team_id, Some(1));
            }
            _ => panic!("wrong variant"),
        }
    }
}
