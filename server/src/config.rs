//! Server-wide configuration assembled from the command line.

use crate::room::RoomConfig;
use crate::world::World;
use shared::{FOOD_SPAWN_PER_TICK, FOOD_TARGET, TICK_MS};
use std::time::Duration;

/// Names of the rooms the server opens by default.
const ROOM_NAMES: [&str; 2] = ["EU #1", "US #1"];

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub tick_duration: Duration,
    pub max_clients: usize,
    pub client_timeout: Duration,
    pub world: World,
    pub rooms: Vec<RoomConfig>,
    /// Seeds every room's RNG when set, for reproducible runs.
    pub seed: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            tick_duration: Duration::from_millis(TICK_MS),
            max_clients: 400,
            client_timeout: Duration::from_secs(10),
            world: World::default(),
            rooms: default_rooms(ROOM_NAMES.len(), 200, FOOD_TARGET, 0),
            seed: None,
        }
    }
}

/// Builds `count` rooms with ids starting at 1.
///
/// Odd ids are PVE and even ids PVP, mirroring the default EU/US pair.
pub fn default_rooms(count: usize, capacity: usize, food_target: usize, bot_count: usize) -> Vec<RoomConfig> {
    (1..=count as u32)
        .map(|id| {
            let name = ROOM_NAMES
                .get(id as usize - 1)
                .map(|n| n.to_string())
                .unwrap_or_else(|| format!("Room #{}", id));
            RoomConfig {
                capacity,
                food_target,
                food_per_tick: FOOD_SPAWN_PER_TICK,
                bot_count,
                ..RoomConfig::new(id, &name).with_pvp(id % 2 == 0)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.tick_duration, Duration::from_millis(100));
        assert_eq!(config.rooms.len(), 2);
        assert_eq!(config.world, World::new(4000.0, 4000.0));
        assert!(config.seed.is_none());
    }

    #[test]
    fn test_default_rooms_alternate_modes() {
        let rooms = default_rooms(3, 50, 120, 2);
        assert_eq!(rooms[0].name, "EU #1");
        assert!(!rooms[0].pvp);
        assert_eq!(rooms[1].name, "US #1");
        assert!(rooms[1].pvp);
        assert_eq!(rooms[1].tags, vec!["PVP".to_string()]);
        assert_eq!(rooms[2].name, "Room #3");
        assert_eq!(rooms[2].id, 3);

        for room in &rooms {
            assert_eq!(room.capacity, 50);
            assert_eq!(room.food_target, 120);
            assert_eq!(room.bot_count, 2);
        }
    }
}
