//! Pluggable movement for bots.

use crate::entity::{BotState, Entity, EntityKind, EntityStore};
use crate::world::{Vec2, World};
use rand::{Rng, RngCore};
use shared::{EntityId, BOT_RADIUS, BOT_SPEED};
use std::f32::consts::TAU;

/// Decides how a bot moves each tick.
pub trait BotStrategy: Send {
    /// Returns the displacement for this tick. `scale` is the tick length in
    /// reference frames.
    fn displacement(&mut self, bot: &mut BotState, position: Vec2, scale: f32, rng: &mut dyn RngCore) -> Vec2;
}

/// Bots that never move.
#[derive(Debug, Default, Clone, Copy)]
pub struct Idle;

impl BotStrategy for Idle {
    fn displacement(&mut self, _bot: &mut BotState, _position: Vec2, _scale: f32, _rng: &mut dyn RngCore) -> Vec2 {
        Vec2::ZERO
    }
}

/// Drifts forward while the heading jitters a little each tick.
#[derive(Debug, Clone, Copy)]
pub struct Wander {
    /// Largest heading change per tick, in radians.
    pub max_turn: f32,
}

impl Default for Wander {
    fn default() -> Self {
        Self { max_turn: 0.3 }
    }
}

impl BotStrategy for Wander {
    fn displacement(&mut self, bot: &mut BotState, _position: Vec2, scale: f32, rng: &mut dyn RngCore) -> Vec2 {
        if self.max_turn > 0.0 {
            bot.heading = (bot.heading + rng.gen_range(-self.max_turn..=self.max_turn)).rem_euclid(TAU);
        }
        Vec2::new(bot.heading.cos(), bot.heading.sin()).scale(bot.speed * scale)
    }
}

/// Creates a bot at a random point with a random heading.
pub fn spawn_bot<R: Rng + ?Sized>(store: &mut EntityStore, world: &World, rng: &mut R) -> Option<EntityId> {
    let id = store.allocate_id();
    let bot = Entity::bot(
        id,
        world.sample_point(rng),
        BOT_RADIUS,
        "#888".to_string(),
        BotState {
            heading: rng.gen_range(0.0..TAU),
            speed: BOT_SPEED,
        },
    );
    store.insert(bot).ok().map(|_| id)
}

/// Moves every bot by its strategy's displacement and wraps it into the world.
pub fn advance_bots(
    store: &mut EntityStore,
    world: &World,
    strategy: &mut dyn BotStrategy,
    scale: f32,
    rng: &mut dyn RngCore,
) {
    for entity in store.iter_mut() {
        if let EntityKind::Bot(state) = &mut entity.kind {
            let step = strategy.displacement(state, entity.position, scale, rng);
            entity.position = world.wrap(entity.position.add(&step));
        }
    }
}
