//! Record shapes held by the `EventStore`'s maps (spec.md §3, §4.5).

#[derive(Debug, Clone)]
pub struct PlayerRecord {
    pub eos_id: Option<String>,
    pub steam_id: Option<String>,
    pub player_suffix: Option<String>,
    pub controller: Option<String>,
    pub ip: Option<String>,
    pub team_id: Option<u32>,
    pub squad_id: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct JoinRequestRecord {
    pub controller: String,
    pub ip: String,
    pub eos_id: Option<String>,
    pub steam_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DisconnectedRecord {
    pub ip: String,
    pub controller: String,
    pub eos_id: Option<String>,
}
