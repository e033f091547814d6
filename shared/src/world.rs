//! In-memory world model and the observer bridge fired by its mutations
//!
//! The world is owned by one simulation task. Mutations tagged
//! [`Provenance::Local`] notify the installed [`WorldObserver`] synchronously;
//! mutations applied on behalf of a remote message are tagged
//! [`Provenance::Remote`] and stay silent, so a received message never turns
//! back into an outgoing one.

use crate::error::{PersistenceError, WorldError};
use crate::protocol::{
    EntityId, EntityKind, EntityRef, EntityState, InventoryId, ItemId, PlayerId, Vec3,
};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// In-game hours per real second at the default day length of ten minutes.
pub const HOURS_PER_SECOND: f32 = 24.0 / 600.0;

pub const DEFAULT_MAX_ENTITIES: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    /// Decided by this endpoint; observers are notified.
    Local,
    /// Applied from a received message; observers are not notified.
    Remote,
}

/// Hooks fired at the instant of a local world mutation.
///
/// Every hook defaults to a no-op so each role overrides only the ones it
/// needs. Implementations must not block; they only queue messages.
pub trait WorldObserver: Send {
    fn entity_added(&mut self, _entity: &Entity) {}
    fn entity_removed(&mut self, _entity_id: EntityId) {}
    fn day_night_changed(&mut self, _time_of_day: f32) {}
    fn effect_created(&mut self, _name: &str, _position: Vec3) {}
    fn item_equipped(&mut self, _player_id: PlayerId, _item_id: Option<ItemId>) {}
    fn item_activated(&mut self, _player_id: PlayerId, _item_id: ItemId) {}
    fn item_picked_up(&mut self, _player_id: PlayerId, _item_id: ItemId) {}
    fn game_won(&mut self, _winner: &str) {}
}

/// Observer with every hook left at its no-op default.
#[derive(Debug, Default)]
pub struct NullObserver;

impl WorldObserver for NullObserver {}

#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub id: EntityId,
    pub kind: EntityKind,
    pub state: EntityState,
}

impl Entity {
    pub fn to_ref(&self) -> EntityRef {
        EntityRef::new(self.id, self.kind, &self.state)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub enum ItemLocation {
    Ground(Vec3),
    Inventory(InventoryId),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Attack,
    Interact(Option<EntityId>),
    Activate(ItemId),
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct WorldSnapshot {
    pub entities: Vec<EntityRef>,
    pub items: Vec<(ItemId, ItemLocation)>,
    pub time_of_day: f32,
    pub next_entity_id: EntityId,
    pub next_item_id: ItemId,
}

pub struct World {
    entities: BTreeMap<EntityId, Entity>,
    items: BTreeMap<ItemId, ItemLocation>,
    players: HashMap<PlayerId, EntityId>,
    time_of_day: f32,
    effects: Vec<(String, Vec3)>,
    actions: Vec<(PlayerId, Action)>,
    winner: Option<String>,
    next_entity_id: EntityId,
    next_item_id: ItemId,
    max_entities: usize,
    observer: Box<dyn WorldObserver>,
}

impl World {
    /// Creates an empty world that holds at most `max_entities` entities
    ///
    /// The clock starts at noon and entity and item ids are minted from 1.
    /// Local mutations go to a [`NullObserver`] until one is installed.
    pub fn new(max_entities: usize) -> Self {
        Self {
            entities: BTreeMap::new(),
            items: BTreeMap::new(),
            players: HashMap::new(),
            time_of_day: 12.0,
            effects: Vec::new(),
            actions: Vec::new(),
            winner: None,
            next_entity_id: 1,
            next_item_id: 1,
            max_entities,
            observer: Box::new(NullObserver),
        }
    }

    /// Creates an empty world whose local mutations are reported to `observer`
    pub fn with_observer(max_entities: usize, observer: Box<dyn WorldObserver>) -> Self {
        let mut world = Self::new(max_entities);
        world.observer = observer;
        world
    }

    /// Replaces the observer
    ///
    /// Used once the role is known, for example after a client has joined
    /// and can start authoring changes of its own.
    pub fn set_observer(&mut self, observer: Box<dyn WorldObserver>) {
        self.observer = observer;
    }

    // Entities

    /// Creates an entity with a freshly minted id and announces it.
    pub fn spawn(&mut self, kind: EntityKind, state: EntityState) -> Result<EntityId, WorldError> {
        if self.entities.len() >= self.max_entities {
            return Err(WorldError::Full(self.max_entities));
        }
        let id = self.next_entity_id;
        self.next_entity_id += 1;

        let entity = Entity { id, kind, state };
        debug!("Spawned {:?} {}", kind, id);
        self.observer.entity_added(&entity);
        self.entities.insert(id, entity);
        Ok(id)
    }

    /// Inserts an entity replicated from the authoritative side, keeping its id.
    /// Items listed in the replicated state are placed in its inventory.
    pub fn insert(
        &mut self,
        id: EntityId,
        kind: EntityKind,
        mut state: EntityState,
    ) -> Result<(), WorldError> {
        if self.entities.contains_key(&id) {
            return Err(WorldError::DuplicateEntity(id));
        }
        if self.entities.len() >= self.max_entities {
            return Err(WorldError::Full(self.max_entities));
        }
        for item in state.inventory.drain(..) {
            self.items.insert(item, ItemLocation::Inventory(id));
            self.next_item_id = self.next_item_id.max(item + 1);
        }
        self.next_entity_id = self.next_entity_id.max(id + 1);
        self.entities.insert(id, Entity { id, kind, state });
        Ok(())
    }

    /// Reference for replicating an entity, inventory contents included.
    pub fn replication_ref(&self, id: EntityId) -> Option<EntityRef> {
        let entity = self.entities.get(&id)?;
        let mut state = entity.state.clone();
        state.inventory = self.inventory(id).unwrap_or_default();
        Some(EntityRef::new(id, entity.kind, &state))
    }

    /// Removes an entity and returns it
    ///
    /// Any player bound to the entity is unbound. Items held by an entity
    /// with an inventory drop to the ground at its last position. Only a
    /// local removal is reported to the observer.
    pub fn remove(&mut self, id: EntityId, provenance: Provenance) -> Option<Entity> {
        let entity = self.entities.remove(&id)?;
        self.players.retain(|_, entity_id| *entity_id != id);
        if entity.kind.has_inventory() {
            // Contents of a destroyed container fall where it stood.
            let position = entity.state.position;
            for location in self.items.values_mut() {
                if *location == ItemLocation::Inventory(id) {
                    *location = ItemLocation::Ground(position);
                }
            }
        }
        if provenance == Provenance::Local {
            self.observer.entity_removed(id);
        }
        Some(entity)
    }

    /// Looks up an entity by id
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    /// Iterates over all entities in id order
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// How many more entities fit under the limit.
    pub fn remaining_capacity(&self) -> usize {
        self.max_entities.saturating_sub(self.entities.len())
    }

    /// Sets an entity's position and heading
    ///
    /// Movement is never announced through the observer; the caller decides
    /// whether it is worth a `Move` message. Fails if the entity is unknown.
    pub fn move_entity(&mut self, id: EntityId, position: Vec3, heading: f32) -> Result<(), WorldError> {
        let entity = self
            .entities
            .get_mut(&id)
            .ok_or(WorldError::UnknownEntity(id))?;
        entity.state.position = position;
        entity.state.heading = heading;
        Ok(())
    }

    // Players

    /// Records that `entity` is the avatar of `player`
    ///
    /// A later binding for the same player replaces the earlier one.
    pub fn bind_player(&mut self, player: PlayerId, entity: EntityId) {
        self.players.insert(player, entity);
    }

    /// Avatar entity of a player, if that player is in the world
    pub fn player_entity(&self, player: PlayerId) -> Option<EntityId> {
        self.players.get(&player).copied()
    }

    /// Updates the movement speed of a player's avatar
    pub fn set_speed(&mut self, player: PlayerId, speed: f32) -> Result<(), WorldError> {
        let entity = self.player_entity_mut(player)?;
        entity.state.speed = speed;
        Ok(())
    }

    fn player_entity_mut(&mut self, player: PlayerId) -> Result<&mut Entity, WorldError> {
        let id = self
            .player_entity(player)
            .ok_or(WorldError::UnknownPlayer(player))?;
        self.entities
            .get_mut(&id)
            .ok_or(WorldError::UnknownEntity(id))
    }

    // Items and inventories

    /// Mints a new item at `location` and returns its id
    ///
    /// Item creation is local bookkeeping only; replication happens through
    /// the inventory contents of entity refs or explicit item transfers.
    pub fn create_item(&mut self, location: ItemLocation) -> ItemId {
        let id = self.next_item_id;
        self.next_item_id += 1;
        self.items.insert(id, location);
        id
    }

    pub fn item_location(&self, item: ItemId) -> Option<ItemLocation> {
        self.items.get(&item).copied()
    }

    /// Items lying on the ground with their positions, in id order
    pub fn items_on_ground(&self) -> Vec<(ItemId, Vec3)> {
        self.items
            .iter()
            .filter_map(|(item, location)| match location {
                ItemLocation::Ground(position) => Some((*item, *position)),
                ItemLocation::Inventory(_) => None,
            })
            .collect()
    }

    /// Puts an item where the authoritative side says it is.
    pub fn place_item(&mut self, item: ItemId, location: ItemLocation) {
        self.items.insert(item, location);
        self.next_item_id = self.next_item_id.max(item + 1);
    }

    /// Items held by an inventory, or `None` if no entity owns that inventory.
    pub fn inventory(&self, id: InventoryId) -> Option<Vec<ItemId>> {
        let owner = self.entities.get(&id)?;
        if !owner.kind.has_inventory() {
            return None;
        }
        Some(
            self.items
                .iter()
                .filter(|(_, location)| **location == ItemLocation::Inventory(id))
                .map(|(item, _)| *item)
                .collect(),
        )
    }

    /// Moves an item between two inventories
    ///
    /// The item must currently be held by `from` and `to` must belong to an
    /// entity with an inventory. On failure nothing changes.
    pub fn move_item(
        &mut self,
        item: ItemId,
        from: InventoryId,
        to: InventoryId,
    ) -> Result<(), WorldError> {
        if self.inventory(to).is_none() {
            return Err(WorldError::UnknownInventory(to));
        }
        match self.items.get_mut(&item) {
            Some(location) if *location == ItemLocation::Inventory(from) => {
                *location = ItemLocation::Inventory(to);
                Ok(())
            }
            _ => Err(WorldError::ItemNotHeld {
                item,
                inventory: from,
            }),
        }
    }

    /// Moves an item from the ground into a player's inventory.
    pub fn pick_up(
        &mut self,
        player: PlayerId,
        item: ItemId,
        provenance: Provenance,
    ) -> Result<(), WorldError> {
        let inventory = self
            .player_entity(player)
            .ok_or(WorldError::UnknownPlayer(player))?;
        let location = self
            .items
            .entry(item)
            .or_insert(ItemLocation::Ground(Vec3::ZERO));
        *location = ItemLocation::Inventory(inventory);
        if provenance == Provenance::Local {
            self.observer.item_picked_up(player, item);
        }
        Ok(())
    }

    /// Puts an item on the ground at `position`
    ///
    /// Whoever had the item equipped loses it from their hands.
    pub fn drop_item(&mut self, item: ItemId, position: Vec3) {
        self.items.insert(item, ItemLocation::Ground(position));
        for entity in self.entities.values_mut() {
            if entity.state.equipped == Some(item) {
                entity.state.equipped = None;
            }
        }
    }

    /// Sets or clears the item held in a player's hands
    ///
    /// Fails if the player has no avatar. Only a local change reaches the
    /// observer.
    pub fn equip(
        &mut self,
        player: PlayerId,
        item: Option<ItemId>,
        provenance: Provenance,
    ) -> Result<(), WorldError> {
        let entity = self.player_entity_mut(player)?;
        entity.state.equipped = item;
        if provenance == Provenance::Local {
            self.observer.item_equipped(player, item);
        }
        Ok(())
    }

    // Actions and effects

    /// Uses an item on behalf of a player
    ///
    /// The use is queued as an [`Action::Activate`] for animation consumers
    /// and, when local, announced through the observer.
    pub fn activate(&mut self, player: PlayerId, item: ItemId, provenance: Provenance) {
        self.actions.push((player, Action::Activate(item)));
        if provenance == Provenance::Local {
            self.observer.item_activated(player, item);
        }
    }

    pub fn record_action(&mut self, player: PlayerId, action: Action) {
        self.actions.push((player, action));
    }

    /// Actions performed since the last call, for animation consumers.
    pub fn take_actions(&mut self) -> Vec<(PlayerId, Action)> {
        std::mem::take(&mut self.actions)
    }

    pub fn play_effect(&mut self, name: &str, position: Vec3, provenance: Provenance) {
        self.effects.push((name.to_string(), position));
        if provenance == Provenance::Local {
            self.observer.effect_created(name, position);
        }
    }

    pub fn take_effects(&mut self) -> Vec<(String, Vec3)> {
        std::mem::take(&mut self.effects)
    }

    /// Ends the game in favour of `winner`
    ///
    /// Only the first declaration counts; later ones are ignored.
    pub fn declare_won(&mut self, winner: &str, provenance: Provenance) {
        if self.winner.is_some() {
            return;
        }
        info!("Game won by {}", winner);
        self.winner = Some(winner.to_string());
        if provenance == Provenance::Local {
            self.observer.game_won(winner);
        }
    }

    pub fn winner(&self) -> Option<&str> {
        self.winner.as_deref()
    }

    // Day-night cycle

    pub fn time_of_day(&self) -> f32 {
        self.time_of_day
    }

    /// Jumps the clock to `hours`, wrapped into the range `[0, 24)`
    pub fn set_time_of_day(&mut self, hours: f32, provenance: Provenance) {
        self.time_of_day = hours.rem_euclid(24.0);
        if provenance == Provenance::Local {
            self.observer.day_night_changed(self.time_of_day);
        }
    }

    /// Advances the clock by `dt` seconds, announcing each whole hour crossed.
    pub fn advance(&mut self, dt: f32) {
        let before = self.time_of_day;
        self.time_of_day = (before + dt * HOURS_PER_SECOND).rem_euclid(24.0);
        if before.floor() != self.time_of_day.floor() {
            self.observer.day_night_changed(self.time_of_day);
        }
    }

    // Persistence

    /// Captures entities, item locations, the clock and id counters
    ///
    /// Pending effects, actions and player bindings are transient and are
    /// not part of a snapshot.
    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            entities: self.entities.values().map(Entity::to_ref).collect(),
            items: self.items.iter().map(|(id, loc)| (*id, *loc)).collect(),
            time_of_day: self.time_of_day,
            next_entity_id: self.next_entity_id,
            next_item_id: self.next_item_id,
        }
    }

    /// Rebuilds world contents from a snapshot
    ///
    /// Player entities are skipped: their owners are no longer connected and
    /// respawn when they rejoin. Whatever a skipped player carried is left on
    /// the ground where that player stood, the same as when a live entity
    /// with an inventory is removed.
    pub fn restore(&mut self, snapshot: WorldSnapshot) -> Result<(), PersistenceError> {
        self.entities.clear();
        self.players.clear();
        let mut departed: HashMap<InventoryId, Vec3> = HashMap::new();
        for entity_ref in snapshot.entities {
            let kind = EntityKind::from_tag(entity_ref.kind).ok_or_else(|| {
                PersistenceError::Corrupt(format!("unknown kind tag {}", entity_ref.kind))
            })?;
            let state = EntityState::from_blob(&entity_ref.state)?;
            if kind == EntityKind::Player {
                departed.insert(entity_ref.id, state.position);
                continue;
            }
            self.entities.insert(
                entity_ref.id,
                Entity {
                    id: entity_ref.id,
                    kind,
                    state,
                },
            );
        }
        self.items = snapshot
            .items
            .into_iter()
            .map(|(item, location)| match location {
                ItemLocation::Inventory(owner) => match departed.get(&owner) {
                    Some(position) => (item, ItemLocation::Ground(*position)),
                    None => (item, location),
                },
                ground => (item, ground),
            })
            .collect();
        if !departed.is_empty() {
            debug!("Dropped inventories of {} departed players", departed.len());
        }
        self.time_of_day = snapshot.time_of_day;
        self.next_entity_id = snapshot.next_entity_id;
        self.next_item_id = snapshot.next_item_id;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Recorder {
        events: Arc<Mutex<Vec<String>>>,
    }

    impl WorldObserver for Recorder {
        fn entity_added(&mut self, entity: &Entity) {
            self.events.lock().unwrap().push(format!("added {}", entity.id));
        }

        fn entity_removed(&mut self, entity_id: EntityId) {
            self.events.lock().unwrap().push(format!("removed {}", entity_id));
        }

        fn day_night_changed(&mut self, time_of_day: f32) {
            self.events
                .lock()
                .unwrap()
                .push(format!("time {}", time_of_day.floor()));
        }
    }

    fn recorded_world() -> (World, Arc<Mutex<Vec<String>>>) {
        let recorder = Recorder::default();
        let events = Arc::clone(&recorder.events);
        (World::with_observer(16, Box::new(recorder)), events)
    }

    #[test]
    fn test_local_mutations_notify() {
        let (mut world, events) = recorded_world();
        let id = world
            .spawn(EntityKind::Mob, EntityState::at(Vec3::ZERO))
            .unwrap();
        world.remove(id, Provenance::Local);

        assert_eq!(
            *events.lock().unwrap(),
            vec![format!("added {}", id), format!("removed {}", id)]
        );
    }

    #[test]
    fn test_remote_mutations_stay_silent() {
        let (mut world, events) = recorded_world();
        world
            .insert(40, EntityKind::Mob, EntityState::at(Vec3::ZERO))
            .unwrap();
        world.remove(40, Provenance::Remote);
        world.set_time_of_day(3.0, Provenance::Remote);

        assert!(events.lock().unwrap().is_empty());
    }

    #[test]
    fn test_unimplemented_hooks_are_noops() {
        let (mut world, events) = recorded_world();
        let avatar = world
            .spawn(EntityKind::Player, EntityState::at(Vec3::ZERO))
            .unwrap();
        world.bind_player(1, avatar);
        world.equip(1, Some(3), Provenance::Local).unwrap();
        world.play_effect("spark", Vec3::ZERO, Provenance::Local);

        assert_eq!(events.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_insert_rejects_duplicates_and_overflow() {
        let mut world = World::new(1);
        world
            .insert(5, EntityKind::Mob, EntityState::at(Vec3::ZERO))
            .unwrap();
        assert_eq!(
            world.insert(5, EntityKind::Mob, EntityState::at(Vec3::ZERO)),
            Err(WorldError::DuplicateEntity(5))
        );
        assert_eq!(
            world.insert(6, EntityKind::Mob, EntityState::at(Vec3::ZERO)),
            Err(WorldError::Full(1))
        );
        assert_eq!(
            world.spawn(EntityKind::Mob, EntityState::at(Vec3::ZERO)),
            Err(WorldError::Full(1))
        );
    }

    #[test]
    fn test_spawn_after_insert_does_not_reuse_ids() {
        let mut world = World::new(8);
        world
            .insert(10, EntityKind::Mob, EntityState::at(Vec3::ZERO))
            .unwrap();
        let id = world
            .spawn(EntityKind::Mob, EntityState::at(Vec3::ZERO))
            .unwrap();
        assert_eq!(id, 11);
    }

    #[test]
    fn test_inventory_moves() {
        let mut world = World::new(8);
        let chest = world
            .spawn(EntityKind::Chest, EntityState::at(Vec3::ZERO))
            .unwrap();
        let player = world
            .spawn(EntityKind::Player, EntityState::at(Vec3::ZERO))
            .unwrap();
        let item = world.create_item(ItemLocation::Inventory(chest));

        assert_eq!(world.inventory(chest), Some(vec![item]));
        world.move_item(item, chest, player).unwrap();
        assert_eq!(world.inventory(chest), Some(vec![]));
        assert_eq!(world.inventory(player), Some(vec![item]));

        assert_eq!(
            world.move_item(item, chest, player),
            Err(WorldError::ItemNotHeld {
                item,
                inventory: chest
            })
        );
        assert_eq!(
            world.move_item(item, player, 999),
            Err(WorldError::UnknownInventory(999))
        );
    }

    #[test]
    fn test_replication_ref_carries_inventory() {
        let mut server = World::new(8);
        let chest = server
            .spawn(EntityKind::Chest, EntityState::at(Vec3::ZERO))
            .unwrap();
        let item = server.create_item(ItemLocation::Inventory(chest));
        let entity_ref = server.replication_ref(chest).unwrap();

        let mut client = World::new(8);
        let state = EntityState::from_blob(&entity_ref.state).unwrap();
        client.insert(entity_ref.id, EntityKind::Chest, state).unwrap();

        assert_eq!(client.inventory(chest), Some(vec![item]));
        assert!(client.entity(chest).unwrap().state.inventory.is_empty());
    }

    #[test]
    fn test_removed_container_spills_items() {
        let mut world = World::new(8);
        let chest = world
            .spawn(EntityKind::Chest, EntityState::at(Vec3::new(2.0, 0.0, 1.0)))
            .unwrap();
        let item = world.create_item(ItemLocation::Inventory(chest));
        world.remove(chest, Provenance::Remote);

        assert_eq!(
            world.item_location(item),
            Some(ItemLocation::Ground(Vec3::new(2.0, 0.0, 1.0)))
        );
        assert_eq!(world.inventory(chest), None);
    }

    #[test]
    fn test_day_night_announces_whole_hours() {
        let (mut world, events) = recorded_world();
        world.set_time_of_day(5.5, Provenance::Remote);

        world.advance(1.0);
        assert!(events.lock().unwrap().is_empty());

        world.advance(20.0);
        assert_eq!(*events.lock().unwrap(), vec!["time 6".to_string()]);
        assert_approx_eq!(world.time_of_day(), 5.5 + 21.0 * HOURS_PER_SECOND, 0.001);
    }

    #[test]
    fn test_clock_wraps_at_midnight() {
        let mut world = World::new(1);
        world.set_time_of_day(23.9, Provenance::Remote);
        world.advance(10.0);
        assert!(world.time_of_day() < 1.0);
    }

    #[test]
    fn test_snapshot_restore() {
        let mut world = World::new(8);
        let chest = world
            .spawn(EntityKind::Chest, EntityState::at(Vec3::new(1.0, 2.0, 3.0)))
            .unwrap();
        let player = world
            .spawn(EntityKind::Player, EntityState::named(Vec3::ZERO, "Bob"))
            .unwrap();
        let item = world.create_item(ItemLocation::Inventory(chest));
        world.set_time_of_day(18.0, Provenance::Remote);

        let snapshot = world.snapshot();
        let bytes = bincode::serialize(&snapshot).unwrap();
        let decoded: WorldSnapshot = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded, snapshot);

        let mut restored = World::new(8);
        restored.restore(decoded).unwrap();
        assert_eq!(restored.entity(chest), world.entity(chest));
        assert!(restored.entity(player).is_none());
        assert_eq!(restored.inventory(chest), Some(vec![item]));
        assert_approx_eq!(restored.time_of_day(), 18.0, 0.0001);

        let next = restored
            .spawn(EntityKind::Mob, EntityState::at(Vec3::ZERO))
            .unwrap();
        assert!(next > player);
    }

    #[test]
    fn test_restore_leaves_departed_players_items_on_ground() {
        let mut world = World::new(8);
        let chest = world
            .spawn(EntityKind::Chest, EntityState::at(Vec3::ZERO))
            .unwrap();
        let player = world
            .spawn(
                EntityKind::Player,
                EntityState::named(Vec3::new(4.0, 0.0, -2.0), "Bob"),
            )
            .unwrap();
        world.bind_player(1, player);
        let carried = world.create_item(ItemLocation::Inventory(player));
        let stored = world.create_item(ItemLocation::Inventory(chest));

        let mut restored = World::new(8);
        restored.restore(world.snapshot()).unwrap();

        assert_eq!(
            restored.item_location(carried),
            Some(ItemLocation::Ground(Vec3::new(4.0, 0.0, -2.0)))
        );
        assert_eq!(
            restored.items_on_ground(),
            vec![(carried, Vec3::new(4.0, 0.0, -2.0))]
        );
        assert_eq!(restored.inventory(chest), Some(vec![stored]));

        // A rejoining player starts with an empty inventory under a fresh id.
        let respawned = restored
            .spawn(EntityKind::Player, EntityState::named(Vec3::ZERO, "Bob"))
            .unwrap();
        assert_ne!(respawned, player);
        assert_eq!(restored.inventory(respawned), Some(vec![]));
    }

    #[test]
    fn test_declare_won_once() {
        let mut world = World::new(1);
        world.declare_won("Bob", Provenance::Remote);
        world.declare_won("Eve", Provenance::Remote);
        assert_eq!(world.winner(), Some("Bob"));
    }
}
