//! Entity records and the per-room entity store.

use crate::error::GameError;
use crate::world::Vec2;
use shared::{EntityId, MoveIntent};
use std::collections::BTreeMap;

/// Player-only state.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerState {
    pub name: String,
    pub intent: MoveIntent,
    pub speed: f32,
    pub score: u32,
    pub flag: Option<String>,
    pub skin: Option<String>,
}

/// Bot-only state, driven by the room's bot strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct BotState {
    /// Heading in radians.
    pub heading: f32,
    pub speed: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntityKind {
    Player(PlayerState),
    Bot(BotState),
    Food,
}

/// Anything simulated in a room.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub id: EntityId,
    pub position: Vec2,
    pub radius: f32,
    /// Display only.
    pub color: String,
    pub kind: EntityKind,
}

impl Entity {
    pub fn player(id: EntityId, position: Vec2, radius: f32, color: String, state: PlayerState) -> Self {
        Self {
            id,
            position,
            radius,
            color,
            kind: EntityKind::Player(state),
        }
    }

    pub fn bot(id: EntityId, position: Vec2, radius: f32, color: String, state: BotState) -> Self {
        Self {
            id,
            position,
            radius,
            color,
            kind: EntityKind::Bot(state),
        }
    }

    pub fn food(id: EntityId, position: Vec2, radius: f32, color: String) -> Self {
        Self {
            id,
            position,
            radius,
            color,
            kind: EntityKind::Food,
        }
    }

    pub fn is_player(&self) -> bool {
        matches!(self.kind, EntityKind::Player(_))
    }

    pub fn is_bot(&self) -> bool {
        matches!(self.kind, EntityKind::Bot(_))
    }

    pub fn is_food(&self) -> bool {
        matches!(self.kind, EntityKind::Food)
    }

    pub fn player_state(&self) -> Option<&PlayerState> {
        match &self.kind {
            EntityKind::Player(state) => Some(state),
            _ => None,
        }
    }

    pub fn player_state_mut(&mut self) -> Option<&mut PlayerState> {
        match &mut self.kind {
            EntityKind::Player(state) => Some(state),
            _ => None,
        }
    }
}

/// Owns every entity of one room.
///
/// Ids come from a monotonic counter, so a destroyed id is never handed out
/// again. Iteration is in ascending id order, which for allocated ids is also
/// creation order. Callers should not lean on that beyond determinism.
#[derive(Debug)]
pub struct EntityStore {
    entities: BTreeMap<EntityId, Entity>,
    next_id: EntityId,
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityStore {
    pub fn new() -> Self {
        Self {
            entities: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Hands out a fresh id. Ids are never reused.
    pub fn allocate_id(&mut self) -> EntityId {
        let id = self.next_id.max(1);
        self.next_id = id + 1;
        id
    }

    /// Inserts an entity, refusing to overwrite a live one.
    pub fn insert(&mut self, entity: Entity) -> Result<(), GameError> {
        if self.entities.contains_key(&entity.id) {
            return Err(GameError::DuplicateId(entity.id));
        }
        // Keep the allocator ahead of externally chosen ids
        self.next_id = self.next_id.max(entity.id.saturating_add(1));
        self.entities.insert(entity.id, entity);
        Ok(())
    }

    /// Removes an entity. Removing an absent id is a no-op.
    pub fn remove(&mut self, id: EntityId) -> Option<Entity> {
        self.entities.remove(&id)
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Entity> {
        self.entities.values_mut()
    }

    /// Visits every entity matching `predicate`.
    pub fn for_each<P, F>(&self, predicate: P, mut f: F)
    where
        P: Fn(&Entity) -> bool,
        F: FnMut(&Entity),
    {
        self.entities.values().filter(|e| predicate(e)).for_each(|e| f(e));
    }

    pub fn players(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values().filter(|e| e.is_player())
    }

    pub fn bots(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values().filter(|e| e.is_bot())
    }

    pub fn foods(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values().filter(|e| e.is_food())
    }

    pub fn ids_where<P>(&self, predicate: P) -> Vec<EntityId>
    where
        P: Fn(&Entity) -> bool,
    {
        self.entities
            .values()
            .filter(|e| predicate(e))
            .map(|e| e.id)
            .collect()
    }

    pub fn food_count(&self) -> usize {
        self.foods().count()
    }

    pub fn player_count(&self) -> usize {
        self.players().count()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_player(id: EntityId, x: f32, y: f32) -> Entity {
        Entity::player(
            id,
            Vec2::new(x, y),
            20.0,
            "#ccc".to_string(),
            PlayerState {
                name: format!("p{}", id),
                intent: MoveIntent::default(),
                speed: 2.4,
                score: 0,
                flag: None,
                skin: None,
            },
        )
    }

    fn test_food(id: EntityId) -> Entity {
        Entity::food(id, Vec2::new(1.0, 1.0), 8.0, "hsl(0,70%,50%)".to_string())
    }

    #[test]
    fn test_allocate_id_is_monotonic() {
        let mut store = EntityStore::new();
        let a = store.allocate_id();
        let b = store.allocate_id();
        assert_eq!(a, 1);
        assert_eq!(b, 2);
    }

    #[test]
    fn test_insert_and_get() {
        let mut store = EntityStore::new();
        store.insert(test_player(1, 10.0, 20.0)).unwrap();

        let entity = store.get(1).unwrap();
        assert!(entity.is_player());
        assert_eq!(entity.position, Vec2::new(10.0, 20.0));
        assert!(store.get(2).is_none());
    }

    #[test]
    fn test_insert_duplicate_is_rejected() {
        let mut store = EntityStore::new();
        store.insert(test_player(1, 10.0, 20.0)).unwrap();

        let result = store.insert(test_player(1, 500.0, 500.0));
        assert_eq!(result, Err(GameError::DuplicateId(1)));
        // original survives untouched
        assert_eq!(store.get(1).unwrap().position, Vec2::new(10.0, 20.0));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_allocator_skips_inserted_ids() {
        let mut store = EntityStore::new();
        store.insert(test_food(5)).unwrap();
        assert_eq!(store.allocate_id(), 6);
    }

    #[test]
    fn test_removed_id_is_not_reallocated() {
        let mut store = EntityStore::new();
        let id = store.allocate_id();
        store.insert(test_food(id)).unwrap();
        store.remove(id);
        assert_ne!(store.allocate_id(), id);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut store = EntityStore::new();
        store.insert(test_player(1, 0.0, 0.0)).unwrap();
        store.insert(test_food(2)).unwrap();

        assert!(store.remove(1).is_some());
        let after_once: Vec<EntityId> = store.iter().map(|e| e.id).collect();

        assert!(store.remove(1).is_none());
        let after_twice: Vec<EntityId> = store.iter().map(|e| e.id).collect();

        assert_eq!(after_once, after_twice);
        assert_eq!(after_twice, vec![2]);
    }

    #[test]
    fn test_variant_filters() {
        let mut store = EntityStore::new();
        store.insert(test_player(1, 0.0, 0.0)).unwrap();
        store.insert(test_food(2)).unwrap();
        store.insert(test_food(3)).unwrap();
        store
            .insert(Entity::bot(
                4,
                Vec2::ZERO,
                24.0,
                "#888".to_string(),
                BotState {
                    heading: 0.0,
                    speed: 1.0,
                },
            ))
            .unwrap();

        assert_eq!(store.player_count(), 1);
        assert_eq!(store.food_count(), 2);
        assert_eq!(store.bots().count(), 1);
        assert_eq!(store.ids_where(|e| e.is_food()), vec![2, 3]);

        let mut seen = Vec::new();
        store.for_each(|e| !e.is_food(), |e| seen.push(e.id));
        assert_eq!(seen, vec![1, 4]);
    }

    #[test]
    fn test_player_state_access() {
        let mut store = EntityStore::new();
        store.insert(test_player(1, 0.0, 0.0)).unwrap();
        store.insert(test_food(2)).unwrap();

        store.get_mut(1).unwrap().player_state_mut().unwrap().score = 9;
        assert_eq!(store.get(1).unwrap().player_state().unwrap().score, 9);
        assert!(store.get(2).unwrap().player_state().is_none());
    }
}
