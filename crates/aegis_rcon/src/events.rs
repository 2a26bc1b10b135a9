//! Classifies the unsolicited (type `1`) packets an RCON connection
//! receives into the closed [`RconEventKind`] set.

use aegis_events::{
    EventPayload, RconChatMessage, RconEventKind, RconPlayerBanned, RconPlayerKicked,
    RconPlayerWarned, RconSquadCreated,
};
use once_cell::sync::Lazy;
use regex::Regex;

static CHAT_MESSAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\[(?P<chat>ChatAll|ChatTeam|ChatSquad|ChatAdmin)\] (?P<name>.+?) : (?P<message>.*)$")
        .unwrap()
});
static SQUAD_CREATED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<name>.+) \(Team: (?P<team>.+)\) has created Squad (?P<squad>.+) \(Squad Leader: .+\)$")
        .unwrap()
});
static PLAYER_WARNED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Remote admin has warned player (?P<name>.+)\. Message was \"(?P<reason>.*)\"$").unwrap());
static PLAYER_KICKED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Kicked player .+ : (?P<name>.+)$").unwrap());
static PLAYER_BANNED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Banned player .+ : (?P<name>.+) for interval (?P<interval>.+)$").unwrap());

/// Classifies a raw async-event body into a typed RCON event, or `None`
/// if it doesn't match any recognized shape (the packet is still valid;
/// it simply carries nothing the capability APIs need to act on).
pub fn classify(body: &str) -> Option<(RconEventKind, EventPayload)> {
    if let Some(caps) = CHAT_MESSAGE.captures(body) {
        return Some((
            RconEventKind::ChatMessage,
            EventPayload::RconChatMessage(RconChatMessage {
                chat_type: caps["chat"].to_string(),
                player_name: caps["name"].to_string(),
                message: caps["message"].to_string(),
            }),
        ));
    }
    if let Some(caps) = SQUAD_CREATED.captures(body) {
        return Some((
            RconEventKind::SquadCreated,
            EventPayload::RconSquadCreated(RconSquadCreated {
                player_name: caps["name"].to_string(),
                squad_name: caps["squad"].to_string(),
                team_name: caps["team"].to_string(),
            }),
        ));
    }
    if let Some(caps) = PLAYER_WARNED.captures(body) {
        return Some((
            RconEventKind::PlayerWarned,
            EventPayload::RconPlayerWarned(RconPlayerWarned {
                player_name: caps["name"].to_string(),
                reason: caps["reason"].to_string(),
            }),
        ));
    }
    if let Some(caps) = PLAYER_KICKED.captures(body) {
        return Some((
            RconEventKind::PlayerKicked,
            EventPayload::RconPlayerKicked(RconPlayerKicked {
                player_name: caps["name"].to_string(),
            }),
        ));
    }
    if let Some(caps) = PLAYER_BANNED.captures(body) {
        return Some((
            RconEventKind::PlayerBanned,
            EventPayload::RconPlayerBanned(RconPlayerBanned {
                player_name: caps["name"].to_string(),
                interval: caps["interval"].to_string(),
            }),
        ));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_chat_message() {
        let (kind, payload) = classify("[ChatAll] SomePlayer : hello team").unwrap();
        assert_eq!(kind, RconEventKind::ChatMessage);
        match payload {
            EventPayload::RconChatMessage(msg) => {
                assert_eq!(msg.player_name, "SomePlayer");
                assert_eq!(msg.message, "hello team");
            }
            _ => panic!("wrong payload variant"),
        }
    }

    #[test]
    fn unrecognized_body_classifies_to_none() {
        assert!(classify("some unrelated async line").is_none());
    }
}
