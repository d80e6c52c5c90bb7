//! Food spawner keeping each room's pellet population near its target.

use crate::entity::{Entity, EntityStore};
use crate::utils::random_food_color;
use crate::world::World;
use log::{debug, warn};
use rand::Rng;
use shared::{EntityId, FOOD_RADIUS_MAX, FOOD_RADIUS_MIN};

/// Tops the store's food up toward `target`, creating at most `max_per_tick`
/// pellets in one call.
///
/// The cap keeps a single tick from spiking entity count and snapshot size
/// after many pellets are eaten at once. Never removes anything. Returns the
/// ids of the pellets it created.
pub fn replenish<R: Rng + ?Sized>(
    store: &mut EntityStore,
    world: &World,
    target: usize,
    max_per_tick: usize,
    rng: &mut R,
) -> Vec<EntityId> {
    let deficit = target.saturating_sub(store.food_count());
    let count = deficit.min(max_per_tick);
    let mut spawned = Vec::with_capacity(count);

    for _ in 0..count {
        let id = store.allocate_id();
        let food = Entity::food(
            id,
            world.sample_point(rng),
            rng.gen_range(FOOD_RADIUS_MIN..FOOD_RADIUS_MAX),
            random_food_color(rng),
        );
        match store.insert(food) {
            Ok(()) => spawned.push(id),
            Err(e) => warn!("Skipped food spawn: {}", e),
        }
    }

    if !spawned.is_empty() {
        debug!(
            "Spawned {} food ({} of {} present)",
            spawned.len(),
            store.food_count(),
            target
        );
    }

    spawned
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn setup() -> (EntityStore, World, StdRng) {
        (EntityStore::new(), World::default(), StdRng::seed_from_u64(11))
    }

    #[test]
    fn test_single_replenish_is_capped() {
        let (mut store, world, mut rng) = setup();
        let spawned = replenish(&mut store, &world, 300, 10, &mut rng);
        assert_eq!(spawned.len(), 10);
        assert_eq!(store.food_count(), 10);
    }

    #[test]
    fn test_converges_to_target_and_stays() {
        let (mut store, world, mut rng) = setup();
        for _ in 0..30 {
            replenish(&mut store, &world, 300, 10, &mut rng);
        }
        assert_eq!(store.food_count(), 300);

        for _ in 0..5 {
            let spawned = replenish(&mut store, &world, 300, 10, &mut rng);
            assert!(spawned.is_empty());
            assert_eq!(store.food_count(), 300);
        }
    }

    #[test]
    fn test_never_overshoots_target() {
        let (mut store, world, mut rng) = setup();
        let mut previous = 0;
        for _ in 0..10 {
            replenish(&mut store, &world, 25, 10, &mut rng);
            let count = store.food_count();
            assert!(count <= 25);
            assert!(count >= previous);
            assert!(count - previous <= 10);
            previous = count;
        }
        assert_eq!(previous, 25);
    }

    #[test]
    fn test_spawned_food_is_well_formed() {
        let (mut store, world, mut rng) = setup();
        let spawned = replenish(&mut store, &world, 50, 50, &mut rng);

        for id in spawned {
            let food = store.get(id).unwrap();
            assert!(food.is_food());
            assert!(world.contains(food.position));
            assert!(food.radius >= FOOD_RADIUS_MIN && food.radius < FOOD_RADIUS_MAX);
            assert!(food.color.starts_with("hsl("));
        }
    }

    #[test]
    fn test_replacement_food_gets_fresh_id() {
        let (mut store, world, mut rng) = setup();
        let first = replenish(&mut store, &world, 1, 10, &mut rng);
        assert_eq!(first.len(), 1);

        store.remove(first[0]);
        let second = replenish(&mut store, &world, 1, 10, &mut rng);
        assert_eq!(second.len(), 1);
        assert_ne!(first[0], second[0]);
    }

    #[test]
    fn test_counts_existing_food() {
        let (mut store, world, mut rng) = setup();
        let id = store.allocate_id();
        store
            .insert(Entity::food(id, world.sample_point(&mut rng), 9.0, "x".to_string()))
            .unwrap();
        replenish(&mut store, &world, 3, 10, &mut rng);
        assert_eq!(store.food_count(), 3);
    }
}
