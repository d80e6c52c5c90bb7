//! Consumption collisions: players eating food, and optionally each other.

use crate::entity::EntityStore;
use crate::world::distance;
use log::debug;
use shared::{
    EntityId, CONSUME_THRESHOLD, GROWTH_FACTOR, MAX_PLAYER_RADIUS, MIN_GROWTH, PLAYER_EAT_RATIO,
};

/// Tunables for consumption and growth.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrowthRules {
    /// Fraction of the summed radii the centres must be within.
    pub threshold: f32,
    pub min_growth: f32,
    pub growth_factor: f32,
    pub max_radius: f32,
    /// How much larger a player must be to absorb another player.
    pub eat_ratio: f32,
}

impl Default for GrowthRules {
    fn default() -> Self {
        Self {
            threshold: CONSUME_THRESHOLD,
            min_growth: MIN_GROWTH,
            growth_factor: GROWTH_FACTOR,
            max_radius: MAX_PLAYER_RADIUS,
            eat_ratio: PLAYER_EAT_RATIO,
        }
    }
}

impl GrowthRules {
    /// Radius gained from eating a pellet of `food_radius`.
    pub fn food_growth(&self, food_radius: f32) -> f32 {
        self.min_growth.max(food_radius * self.growth_factor)
    }
}

/// One consumption that happened during a tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConsumptionEvent {
    pub consumer: EntityId,
    pub consumed: EntityId,
    pub growth: f32,
}

/// Score awarded for a growth amount.
pub fn score_for_growth(growth: f32) -> u32 {
    (growth * 2.0).floor().max(0.0) as u32
}

/// Applies growth to a player, never shrinking it and never passing the cap.
fn grow_player(store: &mut EntityStore, id: EntityId, growth: f32, rules: &GrowthRules) {
    if let Some(entity) = store.get_mut(id) {
        entity.radius = (entity.radius + growth).min(rules.max_radius).max(entity.radius);
        if let Some(state) = entity.player_state_mut() {
            state.score = state.score.saturating_add(score_for_growth(growth));
        }
    }
}

/// Resolves player-eats-food collisions for one tick.
///
/// Each pellet is matched against players in store order and goes to the
/// *first* player whose body overlaps it enough, not the nearest one. Radii
/// grown earlier in the same pass count for later pellets.
pub fn resolve(store: &mut EntityStore, rules: &GrowthRules) -> Vec<ConsumptionEvent> {
    let food_ids = store.ids_where(|e| e.is_food());
    let player_ids = store.ids_where(|e| e.is_player());
    let mut events = Vec::new();

    if player_ids.is_empty() {
        return events;
    }

    for food_id in food_ids {
        let Some(food) = store.get(food_id) else {
            continue;
        };
        let (food_position, food_radius) = (food.position, food.radius);

        let eater = player_ids.iter().copied().find(|player_id| {
            store.get(*player_id).is_some_and(|p| {
                distance(p.position, food_position) < (p.radius + food_radius) * rules.threshold
            })
        });

        if let Some(player_id) = eater {
            store.remove(food_id);
            let growth = rules.food_growth(food_radius);
            grow_player(store, player_id, growth, rules);
            events.push(ConsumptionEvent {
                consumer: player_id,
                consumed: food_id,
                growth,
            });
        }
    }

    if !events.is_empty() {
        debug!("{} food consumed this tick", events.len());
    }

    events
}

/// Resolves player-eats-player collisions for one tick.
///
/// A player at least `eat_ratio` times larger than another absorbs it when the
/// smaller one's centre is inside its body. Area is conserved. Every player is
/// eaten at most once, and an eaten player cannot eat later in the pass.
/// Eaten players are removed from the store.
pub fn resolve_players(store: &mut EntityStore, rules: &GrowthRules) -> Vec<ConsumptionEvent> {
    let player_ids = store.ids_where(|e| e.is_player());
    let mut events = Vec::new();

    for &eater_id in &player_ids {
        for &prey_id in &player_ids {
            if eater_id == prey_id {
                continue;
            }
            let (Some(eater), Some(prey)) = (store.get(eater_id), store.get(prey_id)) else {
                continue;
            };
            if eater.radius < prey.radius * rules.eat_ratio {
                continue;
            }
            if distance(eater.position, prey.position) >= eater.radius {
                continue;
            }

            let grown = (eater.radius * eater.radius + prey.radius * prey.radius).sqrt();
            let growth = grown - eater.radius;
            store.remove(prey_id);
            grow_player(store, eater_id, growth, rules);
            events.push(ConsumptionEvent {
                consumer: eater_id,
                consumed: prey_id,
                growth,
            });
        }
    }

    events
}
