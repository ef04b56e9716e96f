//! Message types for Volley's wire format.
//!
//! Every message is a JSON object with a `type` field naming its kind and
//! camelCase keys for everything else:
//!
//! ```text
//! {"type":"update","gameId":"lobby-1","playerId":"alice","position":{"x":120,"y":300}}
//! ```

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use volley_physics::{Ball, Side, Vec2};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Room identifier chosen by the first client that joins it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameId(pub String);

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GameId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Player identifier chosen by the client; unique within one room.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Roles and scores
// ---------------------------------------------------------------------------

/// The two active slots of a room.
///
/// There is no spectator slot: a third joiner is turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Player1,
    Player2,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Player1, Role::Player2];

    /// The team this role plays for: player1 is red, player2 is blue.
    pub fn side(self) -> Side {
        match self {
            Self::Player1 => Side::Red,
            Self::Player2 => Side::Blue,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Player1 => write!(f, "player1"),
            Self::Player2 => write!(f, "player2"),
        }
    }
}

/// Goal counters. They only ever go up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Scores {
    pub red: u32,
    pub blue: u32,
}

impl Scores {
    /// Adds one goal for `side` and returns its new total.
    pub fn record_goal(&mut self, side: Side) -> u32 {
        let counter = match side {
            Side::Red => &mut self.red,
            Side::Blue => &mut self.blue,
        };
        *counter += 1;
        *counter
    }
}

/// Why a player is no longer in a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaveReason {
    /// The client sent `leave`.
    Left,
    /// The connection dropped.
    Disconnected,
    /// The liveness reaper evicted the player.
    Timeout,
}

impl fmt::Display for LeaveReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Left => write!(f, "left"),
            Self::Disconnected => write!(f, "disconnected"),
            Self::Timeout => write!(f, "timeout"),
        }
    }
}

// ---------------------------------------------------------------------------
// Client → server
// ---------------------------------------------------------------------------

/// Everything a client can send.
///
/// Unknown `type` values and missing required fields fail to decode;
/// the router answers those with an `error` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    Join {
        game_id: GameId,
        player_id: PlayerId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        role: Option<Role>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },

    Update {
        game_id: GameId,
        player_id: PlayerId,
        position: Vec2,
    },

    Action {
        game_id: GameId,
        player_id: PlayerId,
        action: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<serde_json::Value>,
    },

    Chat {
        game_id: GameId,
        player_id: PlayerId,
        message: String,
    },

    Leave {
        game_id: GameId,
        player_id: PlayerId,
    },

    /// Liveness probe. When it names a room member, that member's
    /// activity clock is refreshed.
    Ping {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        game_id: Option<GameId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        player_id: Option<PlayerId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        client_time: Option<u64>,
    },
}

impl ClientMessage {
    /// The `(game, player)` pair this message addresses, if any.
    pub fn target(&self) -> Option<(&GameId, &PlayerId)> {
        match self {
            Self::Join { game_id, player_id, .. }
            | Self::Update { game_id, player_id, .. }
            | Self::Action { game_id, player_id, .. }
            | Self::Chat { game_id, player_id, .. }
            | Self::Leave { game_id, player_id } => Some((game_id, player_id)),
            Self::Ping {
                game_id: Some(game_id),
                player_id: Some(player_id),
                ..
            } => Some((game_id, player_id)),
            Self::Ping { .. } => None,
        }
    }

    /// Checks rules serde can't express. Blank ids count as missing.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if let Some((game_id, player_id)) = self.target() {
            if game_id.0.trim().is_empty() {
                return Err(ProtocolError::InvalidMessage("gameId must not be empty".into()));
            }
            if player_id.0.trim().is_empty() {
                return Err(ProtocolError::InvalidMessage(
                    "playerId must not be empty".into(),
                ));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Server → client
// ---------------------------------------------------------------------------

/// One player as seen by every member of the room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub id: PlayerId,
    pub name: String,
    pub role: Role,
    pub position: Vec2,
}

/// The full authoritative state of a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub game_id: GameId,
    pub players: Vec<PlayerView>,
    pub ball: Ball,
    pub scores: Scores,
    /// The winner, once a side reaches the winning score.
    pub outcome: Option<Side>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
}

/// Everything the server can send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Reply to a successful `join`, sent only to the joiner.
    Joined {
        player_id: PlayerId,
        assigned_role: Role,
        snapshot: Snapshot,
    },

    /// Full room state after any simulation-visible change.
    StateUpdate(Snapshot),

    /// A relayed chat line, or a notice from the server when `system` is set.
    Chat {
        game_id: GameId,
        sender: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        player_id: Option<PlayerId>,
        message: String,
        #[serde(default)]
        system: bool,
        timestamp: u64,
    },

    UserJoined {
        game_id: GameId,
        player_id: PlayerId,
        name: String,
        role: Role,
    },

    UserLeft {
        game_id: GameId,
        player_id: PlayerId,
        name: String,
        reason: LeaveReason,
    },

    /// Sent to the originator of a rejected message only.
    /// `code` follows HTTP conventions (400, 404, 409, 503).
    Error { code: u16, message: String },

    Pong {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        client_time: Option<u64>,
        server_time: u64,
    },
}

/// Display name used for server-generated chat lines.
pub const SYSTEM_SENDER: &str = "System";

/// Milliseconds since the Unix epoch, as stamped on outbound messages.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! The client speaks raw JSON, so these pin the exact shapes.

    use super::*;
    use serde_json::json;

    fn decode(value: serde_json::Value) -> Result<ClientMessage, serde_json::Error> {
        serde_json::from_value(value)
    }

    #[test]
    fn test_ids_serialize_as_plain_strings() {
        assert_eq!(serde_json::to_string(&GameId::from("g1")).unwrap(), "\"g1\"");
        assert_eq!(PlayerId::from("alice").to_string(), "alice");
    }

    #[test]
    fn test_role_maps_to_side() {
        assert_eq!(Role::Player1.side(), Side::Red);
        assert_eq!(Role::Player2.side(), Side::Blue);
        assert_eq!(serde_json::to_string(&Role::Player2).unwrap(), "\"player2\"");
    }

    #[test]
    fn test_scores_record_goal() {
        let mut scores = Scores::default();
        assert_eq!(scores.record_goal(Side::Blue), 1);
        assert_eq!(scores.record_goal(Side::Blue), 2);
        assert_eq!(scores, Scores { red: 0, blue: 2 });
    }

    // -- inbound --------------------------------------------------------

    #[test]
    fn test_join_with_optional_fields() {
        let msg = decode(json!({
            "type": "join", "gameId": "g1", "playerId": "p1",
            "role": "player2", "name": "Ada"
        }))
        .unwrap();
        assert_eq!(
            msg,
            ClientMessage::Join {
                game_id: "g1".into(),
                player_id: "p1".into(),
                role: Some(Role::Player2),
                name: Some("Ada".into()),
            }
        );
    }

    #[test]
    fn test_join_without_optional_fields() {
        let msg = decode(json!({ "type": "join", "gameId": "g1", "playerId": "p1" })).unwrap();
        assert!(matches!(msg, ClientMessage::Join { role: None, name: None, .. }));
    }

    #[test]
    fn test_update_requires_position() {
        assert!(decode(json!({ "type": "update", "gameId": "g", "playerId": "p" })).is_err());

        let msg = decode(json!({
            "type": "update", "gameId": "g", "playerId": "p",
            "position": { "x": -5, "y": 10 }
        }))
        .unwrap();
        assert!(matches!(
            msg,
            ClientMessage::Update { position, .. } if position == Vec2::new(-5.0, 10.0)
        ));
    }

    #[test]
    fn test_action_payload_is_optional() {
        let msg = decode(json!({
            "type": "action", "gameId": "g", "playerId": "p", "action": "shoot"
        }))
        .unwrap();
        assert!(matches!(msg, ClientMessage::Action { payload: None, .. }));

        let msg = decode(json!({
            "type": "action", "gameId": "g", "playerId": "p",
            "action": "dance", "payload": { "style": "robot" }
        }))
        .unwrap();
        assert!(matches!(msg, ClientMessage::Action { payload: Some(_), .. }));
    }

    #[test]
    fn test_ping_needs_no_fields() {
        let msg = decode(json!({ "type": "ping" })).unwrap();
        assert_eq!(msg.target(), None);
        assert!(msg.validate().is_ok());
    }

    #[test]
    fn test_unknown_type_fails_to_decode() {
        assert!(decode(json!({ "type": "teleport", "gameId": "g", "playerId": "p" })).is_err());
        assert!(decode(json!({ "gameId": "g", "playerId": "p" })).is_err());
    }

    #[test]
    fn test_chat_missing_message_fails_to_decode() {
        assert!(decode(json!({ "type": "chat", "gameId": "g", "playerId": "p" })).is_err());
    }

    #[test]
    fn test_validate_rejects_blank_ids() {
        let msg = decode(json!({ "type": "leave", "gameId": " ", "playerId": "p" })).unwrap();
        assert!(matches!(msg.validate(), Err(ProtocolError::InvalidMessage(_))));

        let msg = decode(json!({ "type": "leave", "gameId": "g", "playerId": "" })).unwrap();
        assert!(msg.validate().is_err());
    }

    // -- outbound -------------------------------------------------------

    fn snapshot() -> Snapshot {
        Snapshot {
            game_id: "g1".into(),
            players: vec![PlayerView {
                id: "p1".into(),
                name: "Ada".into(),
                role: Role::Player1,
                position: Vec2::new(200.0, 300.0),
            }],
            ball: Ball {
                position: Vec2::new(400.0, 300.0),
                velocity: Vec2::new(1.0, 0.0),
            },
            scores: Scores { red: 2, blue: 1 },
            outcome: None,
            timestamp: 1234,
        }
    }

    #[test]
    fn test_state_update_json_format() {
        let json = serde_json::to_value(ServerMessage::StateUpdate(snapshot())).unwrap();

        assert_eq!(json["type"], "state_update");
        assert_eq!(json["gameId"], "g1");
        assert_eq!(json["players"][0]["role"], "player1");
        assert_eq!(json["ball"]["position"]["x"], 400.0);
        assert_eq!(json["scores"], json!({ "red": 2, "blue": 1 }));
        assert!(json["outcome"].is_null());
        assert_eq!(json["timestamp"], 1234);
    }

    #[test]
    fn test_joined_json_format() {
        let json = serde_json::to_value(ServerMessage::Joined {
            player_id: "p1".into(),
            assigned_role: Role::Player1,
            snapshot: snapshot(),
        })
        .unwrap();

        assert_eq!(json["type"], "joined");
        assert_eq!(json["assignedRole"], "player1");
        assert_eq!(json["snapshot"]["scores"]["red"], 2);
    }

    #[test]
    fn test_user_left_json_format() {
        let json = serde_json::to_value(ServerMessage::UserLeft {
            game_id: "g1".into(),
            player_id: "p2".into(),
            name: "Bob".into(),
            reason: LeaveReason::Timeout,
        })
        .unwrap();

        assert_eq!(json["type"], "user_left");
        assert_eq!(json["playerId"], "p2");
        assert_eq!(json["reason"], "timeout");
    }

    #[test]
    fn test_pong_json_format() {
        let json = serde_json::to_value(ServerMessage::Pong {
            client_time: Some(5),
            server_time: 10,
        })
        .unwrap();
        assert_eq!(json, json!({ "type": "pong", "clientTime": 5, "serverTime": 10 }));
    }

    #[test]
    fn test_server_chat_round_trip() {
        let msg = ServerMessage::Chat {
            game_id: "g1".into(),
            sender: SYSTEM_SENDER.into(),
            player_id: None,
            message: "Bob timed out".into(),
            system: true,
            timestamp: 99,
        };
        let text = serde_json::to_string(&msg).unwrap();
        let decoded: ServerMessage = serde_json::from_str(&text).unwrap();
        assert_eq!(decoded, msg);
    }
}
