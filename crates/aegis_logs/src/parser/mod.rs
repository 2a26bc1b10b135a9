//! Ordered regex parser bank over Squad log lines (spec.md §4.5).
//!
//! Each input line is tested against every pattern in declaration order;
//! every match fires, so a single line can legitimately produce more than
//! one event (e.g. a `PLAYER_WOUNDED` teamkill also emits `TEAMKILL`).

use aegis_events::{
    AdminBroadcast, DeployableDamaged, EventPayload, JoinSucceeded, LogEventKind, NewGame,
    PlayerConnected, PlayerDamaged, PlayerDied, PlayerDisconnected, PlayerPossess, PlayerRevived,
    PlayerSquadChange, PlayerTeamChange, PlayerWounded, RoundEnded, Teamkill, TickRate,
};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::store::EventStore;

/// One parsed event: its closed `LogEventKind` plus its typed payload.
pub struct ParsedEvent {
    pub kind: LogEventKind,
    pub payload: EventPayload,
}

impl ParsedEvent {
    fn new(kind: LogEventKind, payload: EventPayload) -> Self {
        Self { kind, payload }
    }
}

type Handler = fn(&Captures, &EventStore) -> Vec<ParsedEvent>;

struct Parser {
    regex: Regex,
    handler: Handler,
}

/// The ordered set of line parsers and the `EventStore` mutations they
/// drive.
pub struct ParserBank {
    parsers: Vec<Parser>,
}

impl Default for ParserBank {
    fn default() -> Self {
        Self::new()
    }
}

impl ParserBank {
    pub fn new() -> Self {
        Self {
            parsers: vec![
                Parser { regex: ADMIN_BROADCAST.clone(), handler: handle_admin_broadcast },
                Parser { regex: DEPLOYABLE_DAMAGED.clone(), handler: handle_deployable_damaged },
                Parser { regex: PLAYER_CONNECTED.clone(), handler: handle_player_connected },
                Parser { regex: JOIN_SUCCEEDED.clone(), handler: handle_join_succeeded },
                Parser { regex: PLAYER_DISCONNECTED.clone(), handler: handle_player_disconnected },
                Parser { regex: PLAYER_DAMAGED.clone(), handler: handle_player_damaged },
                Parser { regex: PLAYER_WOUNDED.clone(), handler: handle_player_wounded },
                Parser { regex: PLAYER_DIED.clone(), handler: handle_player_died },
                Parser { regex: PLAYER_REVIVED.clone(), handler: handle_player_revived },
                Parser { regex: PLAYER_POSSESS.clone(), handler: handle_player_possess },
                Parser { regex: PLAYER_SQUAD_CHANGE.clone(), handler: handle_player_squad_change },
                Parser { regex: PLAYER_TEAM_CHANGE.clone(), handler: handle_player_team_change },
                Parser { regex: NEW_GAME_TICKET.clone(), handler: handle_new_game_ticket },
                Parser { regex: ROUND_ENDED_DETERMINE_WINNER.clone(), handler: handle_round_ended_determine_winner },
                Parser { regex: ROUND_ENDED_WAITING_POST_MATCH.clone(), handler: handle_round_ended_waiting_post_match },
                Parser { regex: NEW_GAME_MAP_LOADING.clone(), handler: handle_new_game_map_loading },
                Parser { regex: TICK_RATE.clone(), handler: handle_tick_rate },
            ],
        }
    }

    /// Runs every parser against `line`, returning every event that
    /// matched, in declaration order.
    pub fn parse_line(&self, line: &str, store: &EventStore) -> Vec<ParsedEvent> {
        let mut out = Vec::new();
        for parser in &self.parsers {
            if let Some(caps) = parser.regex.captures(line) {
                out.extend((parser.handler)(&caps, store));
            }
        }
        out
    }
}

fn parse_ids(text: &str) -> (Option<String>, Option<String>) {
    static EOS: Lazy<Regex> = Lazy::new(|| Regex::new(r"EOS:\s*([0-9a-fA-F]+)").unwrap());
    static STEAM: Lazy<Regex> = Lazy::new(|| Regex::new(r"steam:\s*(\d+)").unwrap());
    let eos = EOS.captures(text).map(|c| c[1].to_string());
    let steam = STEAM.captures(text).map(|c| c[1].to_string());
    (eos, steam)
}

fn opt(caps: &Captures, name: &str) -> Option<String> {
    caps.name(name).map(|m| m.as_str().to_string())
}

fn req(caps: &Captures, name: &str) -> String {
    caps.name(name).map(|m| m.as_str().to_string()).unwrap_or_default()
}

fn parse_f64(caps: &Captures, name: &str) -> f64 {
    req(caps, name).parse().unwrap_or(0.0)
}

fn parse_u32(caps: &Captures, name: &str) -> u32 {
    req(caps, name).parse().unwrap_or(0)
}

static ADMIN_BROADCAST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\[.+\]\[(?P<chain_id>\d+)\]LogSquad: ADMIN COMMAND: Message broadcasted <(?P<message>.+)> from (?P<from>.+)$").unwrap()
});
fn handle_admin_broadcast(caps: &Captures, _store: &EventStore) -> Vec<ParsedEvent> {
    vec![ParsedEvent::new(
        LogEventKind::AdminBroadcast,
        EventPayload::LogAdminBroadcast(AdminBroadcast {
            chain_id: req(caps, "chain_id"),
            message: req(caps, "message"),
            from: req(caps, "from"),
        }),
    )]
}

static DEPLOYABLE_DAMAGED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\[.+\]\[(?P<chain_id>\d+)\]LogSquadTrace: \[DedicatedServer\]ASQDeployable::TakeDamage\(\): (?P<deployable>[A-Za-z0-9_]+)_C_\d+: (?P<damage>[\d.]+) damage taken by (?P<weapon>[A-Za-z0-9_]+)_C_\d+ from (?P<player_suffix>.+), damage type: (?P<damage_type>[A-Za-z0-9_]+)_C, health remaining: (?P<health>[\d.-]+)$",
    )
    .unwrap()
});
fn handle_deployable_damaged(caps: &Captures, _store: &EventStore) -> Vec<ParsedEvent> {
    vec![ParsedEvent::new(
        LogEventKind::DeployableDamaged,
        EventPayload::LogDeployableDamaged(DeployableDamaged {
            chain_id: req(caps, "chain_id"),
            deployable: req(caps, "deployable"),
            damage: parse_f64(caps, "damage"),
            weapon: req(caps, "weapon"),
            player_suffix: req(caps, "player_suffix"),
            damage_type: req(caps, "damage_type"),
            health_remaining: parse_f64(caps, "health"),
        }),
    )]
}

static PLAYER_CONNECTED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\[.+\]\[(?P<chain_id>\d+)\]LogSquad: PostLogin: NewPlayer: .+PersistentLevel\.(?P<controller>[A-Za-z0-9_]+) \(IP: (?P<ip>[\d.]+) \| Online IDs:(?P<ids>.+)\)$").unwrap()
});
fn handle_player_connected(caps: &Captures, store: &EventStore) -> Vec<ParsedEvent> {
    let (eos_id, steam_id) = parse_ids(&req(caps, "ids"));
    let chain_id = req(caps, "chain_id");
    let controller = req(caps, "controller");
    let ip = req(caps, "ip");
    store.on_player_connected(chain_id.clone(), controller.clone(), ip.clone(), eos_id.clone(), steam_id.clone());
    vec![ParsedEvent::new(
        LogEventKind::PlayerConnected,
        EventPayload::LogPlayerConnected(PlayerConnected {
            chain_id,
            controller,
            ip,
            eos_id,
            steam_id,
        }),
    )]
}

static JOIN_SUCCEEDED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\[.+\]\[(?P<chain_id>\d+)\]LogNet: Join succeeded: (?P<player_suffix>.+)$").unwrap()
});
fn handle_join_succeeded(caps: &Captures, store: &EventStore) -> Vec<ParsedEvent> {
    let chain_id = req(caps, "chain_id");
    let player_suffix = req(caps, "player_suffix");
    let matched = store.on_join_succeeded(&chain_id, &player_suffix);
    vec![ParsedEvent::new(
        LogEventKind::JoinSucceeded,
        EventPayload::LogJoinSucceeded(JoinSucceeded {
            chain_id,
            player_suffix,
            matched_join_request: matched,
        }),
    )]
}

static PLAYER_DISCONNECTED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\[.+\]\[\d+\]LogSquad: PlayerController (?P<controller>[A-Za-z0-9_]+) Is Leaving The Game\. IP: (?P<ip>[\d.]+) Online IDs:(?P<ids>.+)$").unwrap()
});
fn handle_player_disconnected(caps: &Captures, store: &EventStore) -> Vec<ParsedEvent> {
    let (eos_id, _steam_id) = parse_ids(&req(caps, "ids"));
    let ip = req(caps, "ip");
    let controller = req(caps, "controller");
    store.on_player_disconnected(ip.clone(), controller.clone(), eos_id.clone());
    vec![ParsedEvent::new(
        LogEventKind::PlayerDisconnected,
        EventPayload::LogPlayerDisconnected(PlayerDisconnected { ip, controller, eos_id }),
    )]
}

static PLAYER_DAMAGED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\[.+\]\[\d+\]LogSquadTrace: \[DedicatedServer\]ASQSoldier::TakeDamage\(\): (?P<victim_name>.+): (?P<damage>[\d.]+) damage taken by (?P<weapon>[A-Za-z0-9_]+)_C from (?P<attacker_name>.+) \(Online IDs: attacker (?P<attacker_ids>[^)]+)\) Controller: (?P<attacker_controller>.+)$").unwrap()
});
fn handle_player_damaged(caps: &Captures, store: &EventStore) -> Vec<ParsedEvent> {
    let victim_name = req(caps, "victim_name");
    let (attacker_eos_id, attacker_steam_id) = parse_ids(&req(caps, "attacker_ids"));
    let damage = parse_f64(caps, "damage");
    let attacker_name = req(caps, "attacker_name");
    let attacker_controller = req(caps, "attacker_controller");
    let weapon = req(caps, "weapon");

    store.on_player_damaged(&victim_name, &attacker_name, attacker_eos_id.as_deref(), &attacker_controller, &weapon, damage);

    vec![ParsedEvent::new(
        LogEventKind::PlayerDamaged,
        EventPayload::LogPlayerDamaged(PlayerDamaged {
            victim_name,
            damage,
            attacker_name,
            attacker_eos_id,
            attacker_steam_id,
            attacker_controller,
            weapon,
        }),
    )]
}

static PLAYER_WOUNDED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\[.+\]\[\d+\]LogSquadTrace: \[DedicatedServer\]ASQSoldier::Wound\(\): Player:(?P<victim_name>.+) KillingDamage=(?P<damage>[\d.]+) from (?P<attacker_name>.+) caused by (?P<weapon>[A-Za-z0-9_]+)_C \(Online IDs: victim (?P<victim_ids>[^|]+)\| attacker (?P<attacker_ids>[^)]+)\) Controller: (?P<attacker_controller>.+)$").unwrap()
});
fn handle_player_wounded(caps: &Captures, store: &EventStore) -> Vec<ParsedEvent> {
    let fields = extract_wound_fields(caps);
    let teamkill = store.is_teamkill(&fields.victim_name, fields.attacker_eos_id.as_deref());
    let merged_attacker_eos_id = merge_combat_session(store, &fields);

    let mut events = vec![ParsedEvent::new(
        LogEventKind::PlayerWounded,
        EventPayload::LogPlayerWounded(PlayerWounded {
            victim_name: fields.victim_name.clone(),
            victim_eos_id: fields.victim_eos_id.clone(),
            damage: fields.damage,
            attacker_name: fields.attacker_name.clone(),
            attacker_eos_id: merged_attacker_eos_id,
            attacker_controller: fields.attacker_controller.clone(),
            weapon: fields.weapon.clone(),
            teamkill,
        }),
    )];
    if teamkill {
        events.push(teamkill_event(store, &fields));
    }
    events
}

static PLAYER_DIED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\[.+\]\[\d+\]LogSquadTrace: \[DedicatedServer\]ASQSoldier::Die\(\): Player:(?P<victim_name>.+) KillingDamage=(?P<damage>[\d.]+) from (?P<attacker_name>.+) caused by (?P<weapon>[A-Za-z0-9_]+)_C \(Online IDs: victim (?P<victim_ids>[^|]+)\| attacker (?P<attacker_ids>[^)]+)\) Controller: (?P<attacker_controller>.+)$").unwrap()
});
fn handle_player_died(caps: &Captures, store: &EventStore) -> Vec<ParsedEvent> {
    let fields = extract_wound_fields(caps);
    let teamkill = store.is_teamkill(&fields.victim_name, fields.attacker_eos_id.as_deref());
    let merged_attacker_eos_id = merge_combat_session(store, &fields);

    let mut events = vec![ParsedEvent::new(
        LogEventKind::PlayerDied,
        EventPayload::LogPlayerDied(PlayerDied {
            victim_name: fields.victim_name.clone(),
            victim_eos_id: fields.victim_eos_id.clone(),
            damage: fields.damage,
            attacker_name: fields.attacker_name.clone(),
            attacker_eos_id: merged_attacker_eos_id,
            attacker_controller: fields.attacker_controller.clone(),
            weapon: fields.weapon.clone(),
            teamkill,
        }),
    )];
    if teamkill {
        events.push(teamkill_event(store, &fields));
    }
    events
}

/// Merges this stage's event with the snapshot cached under
/// `session[victimName]` (spec.md §4.5): backfills `attacker_eos_id` from
/// the prior stage when this stage's own `Online IDs` capture is absent,
/// then overwrites the cached snapshot with the current stage.
fn merge_combat_session(store: &EventStore, fields: &WoundFields) -> Option<String> {
    let previous = store.merge_and_update_combat_session(
        &fields.victim_name,
        &fields.attacker_name,
        fields.attacker_eos_id.as_deref(),
        &fields.attacker_controller,
        &fields.weapon,
        fields.damage,
    );
    fields.attacker_eos_id.clone().or_else(|| previous.and_then(|p| p.attacker_eos_id))
}

struct WoundFields {
    victim_name: String,
    victim_eos_id: Option<String>,
    damage: f64,
    attacker_name: String,
    attacker_eos_id: Option<String>,
    attacker_controller: String,
    weapon: String,
}

fn extract_wound_fields(caps: &Captures) -> WoundFields {
    let (victim_eos_id, _) = parse_ids(&req(caps, "victim_ids"));
    let (attacker_eos_id, _) = parse_ids(&req(caps, "attacker_ids"));
    WoundFields {
        victim_name: req(caps, "victim_name"),
        victim_eos_id,
        damage: parse_f64(caps, "damage"),
        attacker_name: req(caps, "attacker_name"),
        attacker_eos_id,
        attacker_controller: req(caps, "attacker_controller"),
        weapon: req(caps, "weapon"),
    }
}

fn teamkill_event(store: &EventStore, fields: &WoundFields) -> ParsedEvent {
    let team_id = store.session_team_id(&fields.victim_name).unwrap_or(0);
    ParsedEvent::new(
        LogEventKind::Teamkill,
        EventPayload::LogTeamkill(Teamkill {
            victim_name: fields.victim_name.clone(),
            victim_eos_id: fields.victim_eos_id.clone().unwrap_or_default(),
            attacker_name: fields.attacker_name.clone(),
            attacker_eos_id: fields.attacker_eos_id.clone().unwrap_or_default(),
            team_id,
        }),
    )
}

static PLAYER_REVIVED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\[.+\]\[\d+\]LogSquadTrace: \[DedicatedServer\]ASQSoldier::Revive\(\): (?P<reviver_name>.+) \(Online IDs: reviver (?P<reviver_ids>[^)]+)\) revived (?P<victim_name>.+) \(Online IDs: victim (?P<victim_ids>[^)]+)\)$").unwrap()
});
fn handle_player_revived(caps: &Captures, store: &EventStore) -> Vec<ParsedEvent> {
    let (reviver_eos_id, _) = parse_ids(&req(caps, "reviver_ids"));
    let (victim_eos_id, _) = parse_ids(&req(caps, "victim_ids"));
    let reviver_name = req(caps, "reviver_name");
    let reviver_eos_id = store.merge_reviver_eos_id(&reviver_name, reviver_eos_id);

    vec![ParsedEvent::new(
        LogEventKind::PlayerRevived,
        EventPayload::LogPlayerRevived(PlayerRevived {
            reviver_name,
            reviver_eos_id,
            victim_name: req(caps, "victim_name"),
            victim_eos_id,
        }),
    )]
}

static PLAYER_POSSESS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\[.+\]\[(?P<chain_id>\d+)\]LogSquad: POSSESS: PC=(?P<player_suffix>.+) \(Online IDs: (?P<ids>[^)]+)\) Pawn=(?P<pawn>[A-Za-z0-9_]+)_C$").unwrap()
});
fn handle_player_possess(caps: &Captures, store: &EventStore) -> Vec<ParsedEvent> {
    let (eos_id, steam_id) = parse_ids(&req(caps, "ids"));
    let player_suffix = req(caps, "player_suffix");
    let chain_id = req(caps, "chain_id");
    store.on_player_possess(&player_suffix, &chain_id);
    vec![ParsedEvent::new(
        LogEventKind::PlayerPossess,
        EventPayload::LogPlayerPossess(PlayerPossess {
            player_suffix,
            eos_id,
            steam_id,
            pawn_classname: req(caps, "pawn"),
            chain_id,
        }),
    )]
}

static PLAYER_SQUAD_CHANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\[.+\]\[\d+\]LogSquad: Player (?P<name>.+) \(Online IDs: (?P<ids>[^)]+)\) has joined Team (?P<team_id>\d+) Squad (?P<squad_id>\d+)$").unwrap()
});
fn handle_player_squad_change(caps: &Captures, store: &EventStore) -> Vec<ParsedEvent> {
    let (eos_id, _) = parse_ids(&req(caps, "ids"));
    let name = req(caps, "name");
    let team_id = parse_u32(caps, "team_id");
    let squad_id = parse_u32(caps, "squad_id");
    store.on_player_squad_change(&name, eos_id.as_deref(), team_id, squad_id);
    vec![ParsedEvent::new(
        LogEventKind::PlayerSquadChange,
        EventPayload::LogPlayerSquadChange(PlayerSquadChange {
            player_name: name,
            eos_id,
            team_id,
            squad_id,
        }),
    )]
}

static PLAYER_TEAM_CHANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\[.+\]\[\d+\]LogSquadTrace: \[DedicatedServer\](?P<name>.+) \(Online IDs: (?P<ids>[^)]+)\) changed to Team (?P<new_team_id>\d+)$").unwrap()
});
fn handle_player_team_change(caps: &Captures, store: &EventStore) -> Vec<ParsedEvent> {
    let (eos_id, _) = parse_ids(&req(caps, "ids"));
    let name = req(caps, "name");
    let new_team_id = parse_u32(caps, "new_team_id");
    let old_team_id = store.on_player_team_change(&name, eos_id.as_deref(), new_team_id);
    vec![ParsedEvent::new(
        LogEventKind::PlayerTeamChange,
        EventPayload::LogPlayerTeamChange(PlayerTeamChange {
            player_name: name,
            eos_id,
            old_team_id,
            new_team_id,
        }),
    )]
}

static NEW_GAME_TICKET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\[.+\]\[\d+\]LogSquad: Team (?P<team>.+), (?P<subfaction>.+) \((?P<faction>.+)\) has (?P<action>won|lost) the match with (?P<tickets>\d+) tickets on layer (?P<layer>.+) \(level (?P<level>.+)\)$").unwrap()
});
fn handle_new_game_ticket(caps: &Captures, store: &EventStore) -> Vec<ParsedEvent> {
    let action = req(caps, "action");
    let team = req(caps, "team");
    store.on_new_game_ticket(team.clone(), action == "won");
    vec![ParsedEvent::new(
        LogEventKind::NewGame,
        EventPayload::LogNewGame(NewGame {
            map_loading: false,
            team: Some(team),
            subfaction: Some(req(caps, "subfaction")),
            faction: Some(req(caps, "faction")),
            won: Some(action == "won"),
            tickets: req(caps, "tickets").parse().ok(),
            layer: Some(req(caps, "layer")),
            level: Some(req(caps, "level")),
            dlc: None,
            map_classname: None,
            layer_classname: None,
        }),
    )]
}

static ROUND_ENDED_DETERMINE_WINNER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\[.+\]\[\d+\]LogSquadGameEvents: Display: DetermineMatchWinner\(\): (?P<winner>.+) won on layer (?P<layer>.+)$").unwrap()
});
fn handle_round_ended_determine_winner(caps: &Captures, store: &EventStore) -> Vec<ParsedEvent> {
    let winner = req(caps, "winner");
    let layer = opt(caps, "layer");
    store.on_round_ended_determine_winner(winner.clone(), layer.clone());
    vec![ParsedEvent::new(
        LogEventKind::RoundEnded,
        EventPayload::LogRoundEnded(RoundEnded { winner: Some(winner), loser: None, layer }),
    )]
}

static ROUND_ENDED_WAITING_POST_MATCH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\[.+\]\[\d+\]LogSquadGameEvents: Display: Match State Changed from InProgress to WaitingPostMatch$").unwrap()
});
fn handle_round_ended_waiting_post_match(_caps: &Captures, store: &EventStore) -> Vec<ParsedEvent> {
    let (winner, loser) = store.on_round_ended_waiting_post_match();
    vec![ParsedEvent::new(
        LogEventKind::RoundEnded,
        EventPayload::LogRoundEnded(RoundEnded { winner, loser, layer: None }),
    )]
}

static NEW_GAME_MAP_LOADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\[.+\]\[\d+\]LogWorld: Bringing World .+ up for play \(dlc: (?P<dlc>[^,]+), mapClassname: (?P<map_classname>[A-Za-z0-9_]+), layerClassname: (?P<layer_classname>[A-Za-z0-9_]+)\)$").unwrap()
});
fn handle_new_game_map_loading(caps: &Captures, store: &EventStore) -> Vec<ParsedEvent> {
    let layer_classname = req(caps, "layer_classname");
    if layer_classname == "TransitionMap" {
        return vec![];
    }
    let won = store.on_new_game_map_loading();
    let (winner, layer) = won.unwrap_or((None, None));
    vec![ParsedEvent::new(
        LogEventKind::NewGame,
        EventPayload::LogNewGame(NewGame {
            map_loading: true,
            team: None,
            subfaction: None,
            faction: None,
            won: winner.as_ref().map(|_| true),
            tickets: None,
            layer,
            level: None,
            dlc: Some(req(caps, "dlc")),
            map_classname: Some(req(caps, "map_classname")),
            layer_classname: Some(layer_classname),
        }),
    )]
}

static TICK_RATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\[.+\]\[\d+\]LogSquad: USQGameState: Server Tick Rate: (?P<rate>[\d.]+)$").unwrap()
});
fn handle_tick_rate(caps: &Captures, _store: &EventStore) -> Vec<ParsedEvent> {
    vec![ParsedEvent::new(
        LogEventKind::TickRate,
        EventPayload::LogTickRate(TickRate { rate: parse_f64(caps, "rate") }),
    )]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_admin_broadcast() {
        let bank = ParserBank::new();
        let store = EventStore::new();
        let events = bank.parse_line(
            "[2024.01.01-00.00.00:000][1]LogSquad: ADMIN COMMAND: Message broadcasted <Hello> from AdminName",
            &store,
        );
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, LogEventKind::AdminBroadcast);
    }

    #[test]
    fn player_connected_then_join_succeeded_consumes_join_request() {
        let bank = ParserBank::new();
        let store = EventStore::new();
        bank.parse_line(
            "[2024.01.01-00.00.00:000][42]LogSquad: PostLogin: NewPlayer: BP_PlayerController_C /Game/Maps/TransitionMap.TransitionMap:PersistentLevel.CarolCtrl (IP: 1.2.3.4 | Online IDs: EOS: ec000 steam: 7777)",
            &store,
        );
        assert!(store.join_requests.contains_key("42"));
        let events = bank.parse_line("[2024.01.01-00.00.01:000][42]LogNet: Join succeeded: Carol", &store);
        assert_eq!(events.len(), 1);
        match &events[0].payload {
            EventPayload::LogJoinSucceeded(j) => assert!(j.matched_join_request),
            _ => panic!("wrong payload"),
        }
        assert!(!store.join_requests.contains_key("42"));
    }

    #[test]
    fn squad_change_then_wounded_by_teammate_emits_teamkill() {
        let bank = ParserBank::new();
        let store = EventStore::new();
        bank.parse_line(
            "[t][1]LogSquad: Player Alice (Online IDs: EOS: ea000) has joined Team 1 Squad 2",
            &store,
        );
        bank.parse_line(
            "[t][1]LogSquad: Player Bob (Online IDs: EOS: eb000) has joined Team 1 Squad 3",
            &store,
        );
        let events = bank.parse_line(
            "[t][1]LogSquadTrace: [DedicatedServer]ASQSoldier::Wound(): Player:Alice KillingDamage=50 from Bob caused by BP_Weapon_C (Online IDs: victim ea000| attacker eb000) Controller: BobCtrl",
            &store,
        );
        let kinds: Vec<_> = events.iter().map(|e| e.kind).collect();
        assert!(kinds.contains(&LogEventKind::PlayerWounded));
        assert!(kinds.contains(&LogEventKind::Teamkill));
    }

    #[test]
    fn map_loading_skips_transition_map() {
        let bank = ParserBank::new();
        let store = EventStore::new();
        let events = bank.parse_line(
            "[t][0]LogWorld: Bringing World /Game/Maps/TransitionMap up for play (dlc: Core, mapClassname: TransitionMap, layerClassname: TransitionMap)",
            &store,
        );
        assert!(events.is_empty());
    }

    #[test]
    fn map_loading_non_transition_emits_new_game() {
        let bank = ParserBank::new();
        let store = EventStore::new();
        let events = bank.parse_line(
            "[t][0]LogWorld: Bringing World /Game/Maps/Narva up for play (dlc: Core, mapClassname: Narva_RAAS_v1, layerClassname: Narva_RAAS_v1_Layer)",
            &store,
        );
        assert_eq!(events.len(), 1);
        match &events[0].payload {
            EventPayload::LogNewGame(g) => assert!(g.map_loading),
            _ => panic!("wrong payload"),
        }
    }
}
