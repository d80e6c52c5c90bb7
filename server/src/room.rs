//! Room engine: one independently simulated arena.
//!
//! A [`Room`] owns its entity store and member table and advances them with
//! [`Room::tick`], which always runs the same sequence:
//!
//! 1. **Integrate** players toward their last move intent and move bots
//! 2. **Collide** players with food (and with each other in PVP rooms)
//! 3. **Replenish** food toward the room's target, capped per tick
//!
//! after which [`Room::snapshot`] produces the full state sent to members.
//!
//! The room itself is plain data with `&mut self` methods. Serializing access
//! against concurrent joins and leaves is the job of the task that owns it
//! (see `room_task`).

use crate::bots::{self, BotStrategy, Wander};
use crate::collision::{self, ConsumptionEvent, GrowthRules};
use crate::entity::{Entity, EntityStore, PlayerState};
use crate::error::GameError;
use crate::food;
use crate::utils::{clip_text, get_timestamp};
use crate::world::{Vec2, World};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use shared::{
    BotView, ClientId, EntityId, FoodView, JoinRequest, LeaderboardEntry, MoveIntent, PlayerUpdate,
    PlayerView, RoomId, RoomInfo, Snapshot, DEFAULT_PLAYER_COLOR, DEFAULT_PLAYER_RADIUS,
    DEFAULT_PLAYER_SPEED, FOOD_SPAWN_PER_TICK, FOOD_TARGET, LEADERBOARD_SIZE, MAX_CHAT_LEN,
    MAX_NAME_LEN, MAX_OVERRIDE_RADIUS, MAX_OVERRIDE_SPEED, MAX_SKIN_LEN, MAX_TAG_LEN,
    MAX_TICK_DELTA_MS, MIN_OVERRIDE_RADIUS, REFERENCE_FRAME_MS,
};
use std::collections::BTreeMap;
use std::time::Duration;

/// Static description of a room, fixed at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomConfig {
    pub id: RoomId,
    pub name: String,
    pub tags: Vec<String>,
    pub capacity: usize,
    pub food_target: usize,
    pub food_per_tick: usize,
    pub bot_count: usize,
    /// Enables player-eats-player.
    pub pvp: bool,
}

impl RoomConfig {
    pub fn new(id: RoomId, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            tags: vec!["PVE".to_string()],
            capacity: 200,
            food_target: FOOD_TARGET,
            food_per_tick: FOOD_SPAWN_PER_TICK,
            bot_count: 0,
            pvp: false,
        }
    }

    pub fn with_pvp(mut self, pvp: bool) -> Self {
        self.pvp = pvp;
        self.tags = vec![if pvp { "PVP" } else { "PVE" }.to_string()];
        self
    }

    pub fn info(&self, players_cur: u32) -> RoomInfo {
        RoomInfo {
            id: self.id,
            name: self.name.clone(),
            tags: self.tags.clone(),
            pvp: self.pvp,
            players_cur,
            players_max: self.capacity as u32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomState {
    /// No members. The tick still runs.
    Idle,
    Active,
}

/// A member whose player was absorbed by another player.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Elimination {
    pub client_id: ClientId,
    pub entity_id: EntityId,
    pub by: EntityId,
}

/// What happened during one tick.
#[derive(Debug, Default)]
pub struct TickReport {
    pub tick: u64,
    pub consumed: Vec<ConsumptionEvent>,
    pub eliminations: Vec<Elimination>,
    pub spawned: usize,
}

pub struct Room {
    config: RoomConfig,
    world: World,
    store: EntityStore,
    rules: GrowthRules,
    members: BTreeMap<ClientId, EntityId>,
    tick: u64,
    rng: StdRng,
    bot_strategy: Box<dyn BotStrategy>,
}

impl Room {
    /// Creates the room and fills it with food and bots.
    pub fn new(config: RoomConfig, world: World, rng: StdRng) -> Self {
        if !world.is_valid() {
            warn!(
                "Room {} has a degenerate {}x{} world; everything will sit at the origin",
                config.id, world.width, world.height
            );
        }
        let mut room = Self {
            config,
            world,
            store: EntityStore::new(),
            rules: GrowthRules::default(),
            members: BTreeMap::new(),
            tick: 0,
            rng,
            bot_strategy: Box::new(Wander::default()),
        };

        let target = room.config.food_target;
        food::replenish(&mut room.store, &room.world, target, target, &mut room.rng);
        for _ in 0..room.config.bot_count {
            bots::spawn_bot(&mut room.store, &room.world, &mut room.rng);
        }

        info!(
            "Room {} '{}' ready with {} food and {} bots",
            room.config.id,
            room.config.name,
            room.store.food_count(),
            room.config.bot_count
        );
        room
    }

    pub fn with_bot_strategy(mut self, strategy: Box<dyn BotStrategy>) -> Self {
        self.bot_strategy = strategy;
        self
    }

    pub fn with_rules(mut self, rules: GrowthRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn id(&self) -> RoomId {
        self.config.id
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    /// Direct store access, mostly for seeding scenarios in tests.
    pub fn store_mut(&mut self) -> &mut EntityStore {
        &mut self.store
    }

    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    pub fn state(&self) -> RoomState {
        if self.members.is_empty() {
            RoomState::Idle
        } else {
            RoomState::Active
        }
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn member_entity(&self, client_id: ClientId) -> Option<EntityId> {
        self.members.get(&client_id).copied()
    }

    pub fn player(&self, client_id: ClientId) -> Option<&Entity> {
        self.member_entity(client_id).and_then(|id| self.store.get(id))
    }

    pub fn info(&self) -> RoomInfo {
        self.config.info(self.members.len() as u32)
    }

    /// Creates a player for `client_id` at a random spawn point.
    ///
    /// Join overrides outside their allowed bounds fall back to the defaults.
    pub fn join(&mut self, client_id: ClientId, request: &JoinRequest) -> Result<EntityId, GameError> {
        if self.members.contains_key(&client_id) {
            return Err(GameError::AlreadyJoined(client_id, self.config.id));
        }
        if self.members.len() >= self.config.capacity {
            return Err(GameError::RoomFull(self.config.id));
        }

        let name = request
            .name
            .as_deref()
            .map(|n| clip_text(n, MAX_NAME_LEN))
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| format!("Guest-{}", client_id));
        let color = request
            .color
            .as_deref()
            .map(|c| clip_text(c, MAX_TAG_LEN))
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| DEFAULT_PLAYER_COLOR.to_string());
        let radius = request
            .radius
            .filter(|r| valid_override_radius(*r))
            .unwrap_or(DEFAULT_PLAYER_RADIUS);
        let speed = request
            .speed
            .filter(|s| s.is_finite() && *s > 0.0 && *s <= MAX_OVERRIDE_SPEED)
            .unwrap_or(DEFAULT_PLAYER_SPEED);

        let id = self.store.allocate_id();
        let spawn = self.world.sample_point(&mut self.rng);
        let player = Entity::player(
            id,
            spawn,
            radius,
            color,
            PlayerState {
                name: name.clone(),
                intent: MoveIntent::default(),
                speed,
                score: 0,
                flag: None,
                skin: None,
            },
        );
        self.store.insert(player)?;

        let was_idle = self.state() == RoomState::Idle;
        self.members.insert(client_id, id);
        info!(
            "Client {} joined room {} as player {} '{}' at ({:.0}, {:.0})",
            client_id, self.config.id, id, name, spawn.x, spawn.y
        );
        if was_idle {
            info!("Room {} is now active", self.config.id);
        }

        Ok(id)
    }

    /// Removes the client's player. Leaving twice is harmless.
    pub fn leave(&mut self, client_id: ClientId) -> Option<EntityId> {
        let id = self.members.remove(&client_id)?;
        self.store.remove(id);
        info!(
            "Client {} left room {} (player {})",
            client_id, self.config.id, id
        );
        if self.state() == RoomState::Idle {
            info!("Room {} is now idle", self.config.id);
        }
        Some(id)
    }

    /// Stores the intent for the next integrate step. Nothing moves here.
    pub fn set_intent(&mut self, client_id: ClientId, intent: MoveIntent) -> bool {
        let world = self.world;
        let Some(entity) = self.member_entity(client_id).and_then(|id| self.store.get_mut(id)) else {
            return false;
        };
        let Some(state) = entity.player_state_mut() else {
            return false;
        };

        state.intent = match intent.sanitized() {
            MoveIntent::Target { x, y } => {
                let target = world.wrap(Vec2::new(x, y));
                MoveIntent::Target {
                    x: target.x,
                    y: target.y,
                }
            }
            direction => direction,
        };
        true
    }

    /// Applies the whitelisted fields of `update` to the caller's own player.
    ///
    /// Radius is server owned: it only grows through consumption, so a
    /// requested radius is ignored.
    pub fn update_player(&mut self, client_id: ClientId, update: PlayerUpdate) -> bool {
        let Some(entity) = self.member_entity(client_id).and_then(|id| self.store.get_mut(id)) else {
            return false;
        };

        if let Some(color) = update.color.as_deref().map(|c| clip_text(c, MAX_TAG_LEN)) {
            if !color.is_empty() {
                entity.color = color;
            }
        }
        if let Some(radius) = update.radius {
            debug!("Ignored radius {} requested for player {}", radius, entity.id);
        }
        if let Some(state) = entity.player_state_mut() {
            if let Some(flag) = update.flag.as_deref() {
                state.flag = Some(clip_text(flag, MAX_TAG_LEN));
            }
            if let Some(skin) = update.skin.as_deref() {
                state.skin = Some(clip_text(skin, MAX_SKIN_LEN));
            }
        }
        true
    }

    /// Name and entity id for a chat line, with the text clipped.
    pub fn chat_line(&self, client_id: ClientId, text: &str) -> Option<(EntityId, String, String)> {
        let player = self.player(client_id)?;
        let name = player.player_state()?.name.clone();
        let text = clip_text(text, MAX_CHAT_LEN);
        if text.is_empty() {
            return None;
        }
        Some((player.id, name, text))
    }

    /// Runs one integrate, collide, replenish pass.
    pub fn tick(&mut self, dt: Duration) -> TickReport {
        let scale = frame_scale(dt);

        integrate_players(&mut self.store, &self.world, scale);
        bots::advance_bots(
            &mut self.store,
            &self.world,
            self.bot_strategy.as_mut(),
            scale,
            &mut self.rng,
        );

        let mut consumed = collision::resolve(&mut self.store, &self.rules);
        let mut eliminations = Vec::new();
        if self.config.pvp {
            let kills = collision::resolve_players(&mut self.store, &self.rules);
            for event in &kills {
                let victim = self
                    .members
                    .iter()
                    .find(|(_, entity_id)| **entity_id == event.consumed)
                    .map(|(client_id, _)| *client_id);
                if let Some(client_id) = victim {
                    self.members.remove(&client_id);
                    info!(
                        "Player {} absorbed player {} in room {}",
                        event.consumer, event.consumed, self.config.id
                    );
                    eliminations.push(Elimination {
                        client_id,
                        entity_id: event.consumed,
                        by: event.consumer,
                    });
                }
            }
            consumed.extend(kills);
        }

        let spawned = food::replenish(
            &mut self.store,
            &self.world,
            self.config.food_target,
            self.config.food_per_tick,
            &mut self.rng,
        )
        .len();

        self.tick += 1;

        TickReport {
            tick: self.tick,
            consumed,
            eliminations,
            spawned,
        }
    }

    /// Full state of the room.
    pub fn snapshot(&self) -> Snapshot {
        let players: Vec<PlayerView> = self
            .store
            .players()
            .filter_map(|e| {
                let state = e.player_state()?;
                Some(PlayerView {
                    id: e.id,
                    name: state.name.clone(),
                    x: e.position.x,
                    y: e.position.y,
                    radius: e.radius,
                    color: e.color.clone(),
                    score: state.score,
                    flag: state.flag.clone(),
                    skin: state.skin.clone(),
                })
            })
            .collect();

        let bots = self
            .store
            .bots()
            .map(|e| BotView {
                id: e.id,
                x: e.position.x,
                y: e.position.y,
                radius: e.radius,
                color: e.color.clone(),
            })
            .collect();

        let foods = self
            .store
            .foods()
            .map(|e| FoodView {
                id: e.id,
                x: e.position.x,
                y: e.position.y,
                radius: e.radius,
                color: e.color.clone(),
            })
            .collect();

        Snapshot {
            room_id: self.config.id,
            tick: self.tick,
            timestamp: get_timestamp(),
            leaderboard: leaderboard(&players, LEADERBOARD_SIZE),
            players,
            bots,
            foods,
        }
    }
}

fn valid_override_radius(radius: f32) -> bool {
    radius.is_finite() && (MIN_OVERRIDE_RADIUS..=MAX_OVERRIDE_RADIUS).contains(&radius)
}

/// Converts a tick's wall-clock length into reference frames.
///
/// Overlong ticks are capped so a stalled scheduler cannot teleport players.
pub fn frame_scale(dt: Duration) -> f32 {
    let mut millis = dt.as_secs_f32() * 1000.0;
    if millis > MAX_TICK_DELTA_MS {
        warn!(
            "Large tick delta detected ({:.0}ms), capping to {:.0}ms",
            millis, MAX_TICK_DELTA_MS
        );
        millis = MAX_TICK_DELTA_MS;
    }
    millis / REFERENCE_FRAME_MS
}

/// Displacement for one player given its intent and the furthest it may move.
pub fn player_step(position: Vec2, intent: MoveIntent, max_step: f32) -> Vec2 {
    match intent.sanitized() {
        MoveIntent::Direction { x, y } => Vec2::new(x, y).clamp_length(1.0).scale(max_step),
        MoveIntent::Target { x, y } => Vec2::new(x, y).sub(&position).clamp_length(max_step),
    }
}

/// Moves every player by its intent and wraps it back into the world.
pub fn integrate_players(store: &mut EntityStore, world: &World, scale: f32) {
    for entity in store.iter_mut() {
        let Some(state) = entity.player_state() else {
            continue;
        };
        let step = player_step(entity.position, state.intent, state.speed * scale);
        entity.position = world.wrap(entity.position.add(&step));
    }
}

/// Top `size` players by score, then radius, then id.
pub fn leaderboard(players: &[PlayerView], size: usize) -> Vec<LeaderboardEntry> {
    let mut ranked: Vec<&PlayerView> = players.iter().collect();
    ranked.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then(b.radius.total_cmp(&a.radius))
            .then(a.id.cmp(&b.id))
    });
    ranked
        .into_iter()
        .take(size)
        .map(|p| LeaderboardEntry {
            id: p.id,
            name: p.name.clone(),
            score: p.score,
            radius: p.radius,
        })
        .collect()
}
