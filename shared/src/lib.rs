use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const PROTOCOL_VERSION: u32 = 1;

pub const WORLD_WIDTH: f32 = 4000.0;
pub const WORLD_HEIGHT: f32 = 4000.0;

pub const TICK_MS: u64 = 100;
/// Movement speeds are expressed per reference frame of ~60Hz.
pub const REFERENCE_FRAME_MS: f32 = 16.67;
pub const MAX_TICK_DELTA_MS: f32 = 250.0;

pub const FOOD_TARGET: usize = 300;
pub const FOOD_SPAWN_PER_TICK: usize = 10;
pub const FOOD_RADIUS_MIN: f32 = 8.0;
pub const FOOD_RADIUS_MAX: f32 = 14.0;

pub const CONSUME_THRESHOLD: f32 = 0.9;
pub const MIN_GROWTH: f32 = 1.2;
pub const GROWTH_FACTOR: f32 = 0.35;
pub const MAX_PLAYER_RADIUS: f32 = 1200.0;
pub const PLAYER_EAT_RATIO: f32 = 1.25;

pub const DEFAULT_PLAYER_RADIUS: f32 = 30.0;
pub const DEFAULT_PLAYER_SPEED: f32 = 2.4;
pub const DEFAULT_PLAYER_COLOR: &str = "#ccc";
pub const MIN_OVERRIDE_RADIUS: f32 = 10.0;
pub const MAX_OVERRIDE_RADIUS: f32 = 60.0;
pub const MAX_OVERRIDE_SPEED: f32 = 5.0;

pub const BOT_RADIUS: f32 = 24.0;
pub const BOT_SPEED: f32 = 1.5;

pub const LEADERBOARD_SIZE: usize = 10;
pub const MAX_NAME_LEN: usize = 24;
pub const MAX_CHAT_LEN: usize = 200;
pub const MAX_TAG_LEN: usize = 32;
pub const MAX_SKIN_LEN: usize = 256;

/// Largest payload a single UDP datagram can carry.
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

pub type ClientId = u32;
pub type EntityId = u32;
pub type RoomId = u32;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum Packet {
    Connect {
        client_version: u32,
    },
    ListRooms,
    Join {
        room_id: RoomId,
        request: JoinRequest,
    },
    Move {
        intent: MoveIntent,
    },
    Chat {
        text: String,
    },
    UpdatePlayer {
        update: PlayerUpdate,
    },
    Leave,
    Heartbeat,
    Disconnect,

    Connected {
        client_id: ClientId,
    },
    RoomList {
        rooms: Vec<RoomInfo>,
    },
    Init {
        id: EntityId,
        room_id: RoomId,
    },
    GameState(Snapshot),
    ChatMessage {
        sender: EntityId,
        name: String,
        text: String,
    },
    PlayerCountUpdate {
        counts: BTreeMap<RoomId, u32>,
    },
    Eliminated {
        by: EntityId,
    },
    Error {
        reason: String,
    },
    Disconnected {
        reason: String,
    },
}

/// How the server should interpret a client's movement input.
///
/// `Direction` is clamped to unit length before use. `Target` is an absolute
/// world point the server steps toward at the player's speed.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub enum MoveIntent {
    Direction { x: f32, y: f32 },
    Target { x: f32, y: f32 },
}

impl Default for MoveIntent {
    fn default() -> Self {
        MoveIntent::Direction { x: 0.0, y: 0.0 }
    }
}

impl MoveIntent {
    /// Replaces non-finite components with zero.
    pub fn sanitized(self) -> Self {
        match self {
            MoveIntent::Direction { x, y } => MoveIntent::Direction {
                x: finite_or_zero(x),
                y: finite_or_zero(y),
            },
            MoveIntent::Target { x, y } => MoveIntent::Target {
                x: finite_or_zero(x),
                y: finite_or_zero(y),
            },
        }
    }
}

pub fn finite_or_zero(value: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct JoinRequest {
    pub name: Option<String>,
    pub color: Option<String>,
    pub radius: Option<f32>,
    pub speed: Option<f32>,
}

/// Fields a client may change on its own player. Anything else is server owned.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct PlayerUpdate {
    pub color: Option<String>,
    /// Accepted on the wire but never applied: radius only grows by eating.
    pub radius: Option<f32>,
    pub flag: Option<String>,
    pub skin: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RoomInfo {
    pub id: RoomId,
    pub name: String,
    pub tags: Vec<String>,
    pub pvp: bool,
    pub players_cur: u32,
    pub players_max: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PlayerView {
    pub id: EntityId,
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub color: String,
    pub score: u32,
    pub flag: Option<String>,
    pub skin: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BotView {
    pub id: EntityId,
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub color: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct FoodView {
    pub id: EntityId,
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub color: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LeaderboardEntry {
    pub id: EntityId,
    pub name: String,
    pub score: u32,
    pub radius: f32,
}

/// Full state of one room, sent to every member each tick.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub room_id: RoomId,
    pub tick: u64,
    pub timestamp: u64,
    pub players: Vec<PlayerView>,
    pub bots: Vec<BotView>,
    pub foods: Vec<FoodView>,
    pub leaderboard: Vec<LeaderboardEntry>,
}

impl Snapshot {
    pub fn player(&self, id: EntityId) -> Option<&PlayerView> {
        self.players.iter().find(|p| p.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_move_intent_default_is_stationary() {
        assert_eq!(
            MoveIntent::default(),
            MoveIntent::Direction { x: 0.0, y: 0.0 }
        );
    }

    #[test]
    fn test_move_intent_sanitized_drops_non_finite() {
        let intent = MoveIntent::Target {
            x: f32::NAN,
            y: 12.5,
        }
        .sanitized();
        assert_eq!(intent, MoveIntent::Target { x: 0.0, y: 12.5 });

        let intent = MoveIntent::Direction {
            x: f32::INFINITY,
            y: f32::NEG_INFINITY,
        }
        .sanitized();
        assert_eq!(intent, MoveIntent::Direction { x: 0.0, y: 0.0 });
    }

    #[test]
    fn test_finite_or_zero() {
        assert_approx_eq!(finite_or_zero(3.5), 3.5);
        assert_eq!(finite_or_zero(f32::NAN), 0.0);
    }

    #[test]
    fn test_packet_serialization_join() {
        let packet = Packet::Join {
            room_id: 2,
            request: JoinRequest {
                name: Some("blob".to_string()),
                radius: Some(40.0),
                ..Default::default()
            },
        };
        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            Packet::Join { room_id, request } => {
                assert_eq!(room_id, 2);
                assert_eq!(request.name.as_deref(), Some("blob"));
                assert_eq!(request.radius, Some(40.0));
                assert_eq!(request.speed, None);
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_packet_serialization_game_state() {
        let snapshot = Snapshot {
            room_id: 1,
            tick: 42,
            timestamp: 123456789,
            players: vec![PlayerView {
                id: 7,
                name: "Guest-1".to_string(),
                x: 100.0,
                y: 200.0,
                radius: 30.0,
                color: DEFAULT_PLAYER_COLOR.to_string(),
                score: 4,
                flag: None,
                skin: None,
            }],
            bots: vec![],
            foods: vec![FoodView {
                id: 1,
                x: 5.0,
                y: 6.0,
                radius: 9.0,
                color: "hsl(120,70%,50%)".to_string(),
            }],
            leaderboard: vec![],
        };

        let serialized = bincode::serialize(&Packet::GameState(snapshot.clone())).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            Packet::GameState(received) => {
                assert_eq!(received, snapshot);
                assert_eq!(received.player(7).map(|p| p.score), Some(4));
                assert!(received.player(8).is_none());
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_truncated_packet_fails_to_decode() {
        let data = bincode::serialize(&Packet::Chat {
            text: "hello there".to_string(),
        })
        .unwrap();
        let result: Result<Packet, _> = bincode::deserialize(&data[..data.len() / 2]);
        assert!(result.is_err());
    }
}
