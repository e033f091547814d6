//! GUI bindings
//!
//! The presentation layer talks to a [`GuiObserver`] and never learns whether
//! a server sits behind it. [`NetworkedGui`] turns every intent into one
//! request for the server; [`LocalGui`] runs a single-participant session on
//! a world of its own.

use crate::hud::HudState;
use log::{debug, info};
use shared::world::{Action, ItemLocation};
use shared::{
    Chat, ChestAccess, ChestOutcome, ContainerLockTable, EntityId, EntityKind, EntityState,
    GuiObserver, InventoryId, InventoryTransfer, ItemId, ItemTransfer, Message, OutboundQueue,
    PlayerId, PlayerRegistry, PlayerSetup, Provenance, RightClick, Vec3, World, WorldError,
};

/// Participant id used by a single-participant session.
pub const LOCAL_PLAYER: PlayerId = 1;

pub struct NetworkedGui {
    queue: OutboundQueue,
    player_id: Option<PlayerId>,
}

impl NetworkedGui {
    pub fn new(queue: OutboundQueue, player_id: Option<PlayerId>) -> Self {
        Self { queue, player_id }
    }

    /// Requests carry id 0 until the join completes; the server refuses them.
    fn player(&self) -> PlayerId {
        self.player_id.unwrap_or_default()
    }
}

impl GuiObserver for NetworkedGui {
    fn drop_item(&mut self, item: ItemId, position: Vec3) {
        self.queue.to_server(Message::ItemTransfer(ItemTransfer {
            item_id: item,
            holder: None,
            position,
        }));
    }

    fn transfer_item(&mut self, item: ItemId, from: InventoryId, to: InventoryId) {
        self.queue
            .to_server(Message::InventoryTransfer(InventoryTransfer {
                item_id: item,
                from_inventory: from,
                to_inventory: to,
            }));
    }

    fn send_chat(&mut self, text: &str) {
        // The server fills in the sender from its registry.
        self.queue.to_server(Message::Chat(Chat {
            sender: String::new(),
            text: text.to_string(),
            private: false,
        }));
    }

    fn open_chest(&mut self, chest: InventoryId) {
        self.queue.to_server(Message::ChestAccess(ChestAccess::request(
            chest,
            self.player(),
            true,
        )));
    }

    fn close_chest(&mut self, chest: InventoryId) {
        self.queue.to_server(Message::ChestAccess(ChestAccess::request(
            chest,
            self.player(),
            false,
        )));
    }

    fn right_click(&mut self, target: Option<EntityId>) {
        self.queue.to_server(Message::RightClick(RightClick {
            player_id: self.player(),
            target,
        }));
    }

    fn start_game(&mut self, name: &str) {
        self.queue.to_server(Message::PlayerSetup(PlayerSetup {
            name: name.to_string(),
        }));
    }
}

/// Single-participant session: intents are applied straight to the world.
pub struct LocalGui {
    world: World,
    registry: PlayerRegistry,
    locks: ContainerLockTable,
    hud: HudState,
    entity: Option<EntityId>,
}

impl LocalGui {
    pub fn new(world: World, hud: HudState) -> Self {
        Self {
            world,
            registry: PlayerRegistry::new(),
            locks: ContainerLockTable::new(),
            hud,
            entity: None,
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn registry(&self) -> &PlayerRegistry {
        &self.registry
    }

    pub fn locks(&self) -> &ContainerLockTable {
        &self.locks
    }

    pub fn hud(&self) -> &HudState {
        &self.hud
    }

    pub fn player_entity(&self) -> Option<EntityId> {
        self.entity
    }

    pub fn tick(&mut self, dt: f32) {
        self.world.advance(dt);
        for (name, position) in self.world.take_effects() {
            self.hud.push_effect(name, position);
        }
        self.world.take_actions();
    }

    fn player_name(&self) -> String {
        self.registry
            .get_name(LOCAL_PLAYER)
            .unwrap_or_default()
            .to_string()
    }

    fn can_access(&self, inventory: InventoryId) -> bool {
        match self.world.entity(inventory).map(|e| e.kind) {
            Some(EntityKind::Chest) => self.locks.holder(inventory) == Some(LOCAL_PLAYER),
            Some(EntityKind::Player) => Some(inventory) == self.entity,
            _ => false,
        }
    }

    fn spawn_player(&mut self, name: &str) -> Result<EntityId, WorldError> {
        if let Some(entity) = self.entity {
            if let Some(existing) = self.world.entity_mut(entity) {
                existing.state.name = Some(name.to_string());
            }
            return Ok(entity);
        }
        let entity = self
            .world
            .spawn(EntityKind::Player, EntityState::named(Vec3::ZERO, name))?;
        self.world.bind_player(LOCAL_PLAYER, entity);
        self.entity = Some(entity);
        Ok(entity)
    }
}

impl GuiObserver for LocalGui {
    fn drop_item(&mut self, item: ItemId, position: Vec3) {
        match (self.entity, self.world.item_location(item)) {
            (Some(own), Some(ItemLocation::Inventory(holder))) if holder == own => {
                self.world.drop_item(item, position);
            }
            _ => debug!("Item {} is not held, nothing to drop", item),
        }
    }

    fn transfer_item(&mut self, item: ItemId, from: InventoryId, to: InventoryId) {
        if !self.can_access(from) || !self.can_access(to) {
            debug!("Transfer of item {} from {} to {} refused", item, from, to);
            return;
        }
        if let Err(e) = self.world.move_item(item, from, to) {
            debug!("Transfer of item {} failed: {}", item, e);
        }
    }

    fn send_chat(&mut self, text: &str) {
        let text = text.trim();
        if !text.is_empty() {
            let name = self.player_name();
            self.hud.push_chat(&name, text, false);
        }
    }

    fn open_chest(&mut self, chest: InventoryId) {
        if self.world.entity(chest).map(|e| e.kind) != Some(EntityKind::Chest) {
            debug!("Entity {} is not a chest", chest);
            return;
        }
        match self.locks.request_open(chest, LOCAL_PLAYER) {
            ChestOutcome::Opened => {
                self.hud.open_container = Some(chest);
                self.hud.denied_container = None;
            }
            _ => self.hud.denied_container = Some(chest),
        }
    }

    fn close_chest(&mut self, chest: InventoryId) {
        if self.locks.request_close(chest, LOCAL_PLAYER).is_some()
            && self.hud.open_container == Some(chest)
        {
            self.hud.open_container = None;
        }
    }

    fn right_click(&mut self, target: Option<EntityId>) {
        self.world
            .record_action(LOCAL_PLAYER, Action::Interact(target));
    }

    fn start_game(&mut self, name: &str) {
        self.registry.put(name, LOCAL_PLAYER);
        match self.spawn_player(name) {
            Ok(entity) => info!("Started single-participant game as {} (entity {})", name, entity),
            Err(e) => debug!("Could not place the player: {}", e),
        }
    }
}

impl LocalGui {
    /// Picks up a ground item into the local player's inventory.
    pub fn pick_up(&mut self, item: ItemId) -> Result<(), WorldError> {
        self.world.pick_up(LOCAL_PLAYER, item, Provenance::Local)
    }

    pub fn declare_won(&mut self) {
        let name = self.player_name();
        self.world.declare_won(&name, Provenance::Local);
        self.hud.game_over = self.world.winner().map(str::to_string);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::outbound::drain;
    use shared::{MessageKind, Target};

    #[test]
    fn test_networked_gui_maps_each_intent_to_one_request() {
        let (queue, mut rx) = OutboundQueue::channel();
        let mut gui = NetworkedGui::new(queue, Some(3));

        gui.start_game("Alice");
        gui.drop_item(4, Vec3::new(1.0, 0.0, 0.0));
        gui.transfer_item(4, 10, 11);
        gui.send_chat("hello");
        gui.open_chest(11);
        gui.close_chest(11);
        gui.right_click(Some(2));

        let out = drain(&mut rx);
        assert!(out.iter().all(|o| o.target == Target::Server));
        let kinds: Vec<MessageKind> = out.iter().map(|o| o.message.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                MessageKind::PlayerSetup,
                MessageKind::ItemTransfer,
                MessageKind::InventoryTransfer,
                MessageKind::Chat,
                MessageKind::ChestAccess,
                MessageKind::ChestAccess,
                MessageKind::RightClick,
            ]
        );
        assert_eq!(
            out[4].message,
            Message::ChestAccess(ChestAccess::request(11, 3, true))
        );
    }

    fn local_session() -> (LocalGui, EntityId) {
        let mut world = World::new(32);
        let chest = world
            .spawn(EntityKind::Chest, EntityState::at(Vec3::new(2.0, 0.0, 0.0)))
            .unwrap();
        world.create_item(ItemLocation::Inventory(chest));
        let mut gui = LocalGui::new(world, HudState::default());
        gui.start_game("Solo");
        (gui, chest)
    }

    #[test]
    fn test_local_start_game_spawns_player() {
        let (gui, _) = local_session();
        assert_eq!(gui.registry().get_id("Solo"), Some(LOCAL_PLAYER));
        let entity = gui.player_entity().unwrap();
        assert_eq!(gui.world().player_entity(LOCAL_PLAYER), Some(entity));
        assert_eq!(gui.world().entity_count(), 2);
    }

    #[test]
    fn test_local_chest_transfer_needs_open_chest() {
        let (mut gui, chest) = local_session();
        let own = gui.player_entity().unwrap();

        gui.transfer_item(1, chest, own);
        assert_eq!(gui.world().inventory(own), Some(vec![]));

        gui.open_chest(chest);
        assert_eq!(gui.hud().open_container, Some(chest));
        gui.transfer_item(1, chest, own);
        assert_eq!(gui.world().inventory(own), Some(vec![1]));

        gui.close_chest(chest);
        assert_eq!(gui.hud().open_container, None);
        assert!(!gui.locks().is_open(chest));
    }

    #[test]
    fn test_local_drop_and_pick_up() {
        let (mut gui, chest) = local_session();
        let own = gui.player_entity().unwrap();
        gui.open_chest(chest);
        gui.transfer_item(1, chest, own);

        gui.drop_item(1, Vec3::new(5.0, 0.0, 0.0));
        assert_eq!(
            gui.world().item_location(1),
            Some(ItemLocation::Ground(Vec3::new(5.0, 0.0, 0.0)))
        );
        gui.pick_up(1).unwrap();
        assert_eq!(gui.world().inventory(own), Some(vec![1]));
    }

    #[test]
    fn test_local_chat_and_win() {
        let (mut gui, _) = local_session();
        gui.send_chat("  hi  ");
        gui.send_chat("   ");
        assert_eq!(gui.hud().chat_log.len(), 1);
        assert_eq!(gui.hud().last_chat().unwrap().sender, "Solo");

        gui.declare_won();
        assert_eq!(gui.hud().game_over.as_deref(), Some("Solo"));
    }
}
