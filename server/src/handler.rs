//! Server-side interpretation of every message kind
//!
//! The server is the authority: it validates what clients ask for, applies
//! it to the world, and relays the result according to the kind's
//! rebroadcast policy. Mutations made on a client's behalf are applied with
//! [`Provenance::Remote`] so only the explicit relay goes out.

use crate::game::spawn_point;
use crate::observer::AuthoringObserver;
use crate::save::{SaveCoordinator, SaveRequest};
use log::{debug, info, warn};
use shared::dispatch::unexpected;
use shared::world::{Action, ItemLocation};
use shared::{
    Attack, Chat, ChestAccess, ChestOutcome, ContainerLockTable, DayNight, Effect, EntityId,
    EntityKind, EntityRef, EntityState, EquipItem, GameWon, HandlerResult, InventoryId,
    InventoryTransfer, ItemTransfer, Message, MessageKind, Move, OnActivate, OutboundQueue,
    PacketHandler, Ping, PlayerId, PlayerJoined, PlayerRegistry, PlayerSetup, PlayerSpeed,
    ProtocolError, Provenance, RemoveEntity, RightClick, Role, Snapshot, Target, World,
    MAX_PLAYER_SPEED,
};

/// Longest display name accepted in PlayerSetup.
pub const MAX_NAME_LEN: usize = 24;

/// Sender name stamped on replies generated by the server itself.
pub const SYSTEM_SENDER: &str = "server";

pub struct ServerHandler {
    world: World,
    registry: PlayerRegistry,
    locks: ContainerLockTable,
    queue: OutboundQueue,
    saves: SaveCoordinator,
}

impl ServerHandler {
    /// Takes ownership of a seeded world and wires the authoring hooks into it.
    pub fn new(
        mut world: World,
        registry: PlayerRegistry,
        queue: OutboundQueue,
        saves: SaveCoordinator,
    ) -> Self {
        world.set_observer(Box::new(AuthoringObserver::new(queue.clone())));
        Self {
            world,
            registry,
            locks: ContainerLockTable::new(),
            queue,
            saves,
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

    pub fn saves(&self) -> &SaveCoordinator {
        &self.saves
    }

    /// Advances the world clock and services pending saves.
    pub fn tick(&mut self, dt: f32) {
        self.world.advance(dt);
        let actions = self.world.take_actions();
        let effects = self.world.take_effects();
        if !actions.is_empty() || !effects.is_empty() {
            debug!("Tick consumed {} actions, {} effects", actions.len(), effects.len());
        }
        let (world, registry) = (&self.world, &self.registry);
        self.saves.poll(|| snapshot(world, registry));
    }

    /// Waits for outstanding saves, then writes the final state.
    pub fn shutdown(&mut self) {
        let (world, registry) = (&self.world, &self.registry);
        self.saves.request(|| snapshot(world, registry));
        self.saves.flush(|| snapshot(world, registry));
    }

    /// Cleanup for a lost connection: locks released, entity removed,
    /// registry record dropped.
    pub fn disconnect(&mut self, player: PlayerId) {
        for chest in self.locks.release_all(player) {
            self.queue.broadcast(Message::ChestAccess(ChestAccess {
                chest_id: chest,
                player_id: player,
                open: false,
                outcome: Some(ChestOutcome::Closed),
            }));
        }
        if let Some(entity) = self.world.player_entity(player) {
            self.world.remove(entity, Provenance::Local);
        }
        if let Some(name) = self.registry.remove_id(player) {
            info!("Player {} ({}) left", name, player);
        }
    }

    /// Entity of a player that has completed setup.
    fn joined(&self, kind: MessageKind, from: PlayerId) -> Result<EntityId, ProtocolError> {
        self.world
            .player_entity(from)
            .ok_or(ProtocolError::NotJoined { kind, peer: from })
    }

    /// Rejects payloads that claim to act for another player.
    fn check_actor(kind: MessageKind, from: PlayerId, claimed: PlayerId) -> Result<(), ProtocolError> {
        if claimed != from {
            return Err(ProtocolError::rejected(
                kind,
                format!("player {} cannot act as {}", from, claimed),
            ));
        }
        Ok(())
    }

    /// An inventory a player may touch: its own, or a chest whose lock it holds.
    fn check_inventory_access(
        &self,
        kind: MessageKind,
        from: PlayerId,
        own: EntityId,
        inventory: InventoryId,
    ) -> Result<(), ProtocolError> {
        match self.world.entity(inventory).map(|e| e.kind) {
            Some(EntityKind::Chest) if self.locks.holder(inventory) == Some(from) => Ok(()),
            Some(EntityKind::Chest) => Err(ProtocolError::rejected(
                kind,
                format!("chest {} is not held by player {}", inventory, from),
            )),
            Some(EntityKind::Player) if inventory == own => Ok(()),
            _ => Err(ProtocolError::rejected(
                kind,
                format!("inventory {} is not accessible", inventory),
            )),
        }
    }

    fn send_system(&self, to: PlayerId, text: String) {
        self.queue.to_player(
            to,
            Message::Chat(Chat {
                sender: SYSTEM_SENDER.to_string(),
                text,
                private: true,
            }),
        );
    }

    /// Brings a newcomer up to date: every live entity as one phased batch,
    /// ground items, the clock and the players already present.
    fn send_world_to(&self, player: PlayerId) {
        let refs: Vec<EntityRef> = self
            .world
            .entities()
            .filter_map(|entity| self.world.replication_ref(entity.id))
            .collect();
        debug!("Sending {} entities to player {}", refs.len(), player);
        for entity_ref in refs {
            self.queue.to_player(player, Message::AddEntity(entity_ref));
        }
        self.queue.to_player(player, Message::AddEntityFinish);

        for (item_id, position) in self.world.items_on_ground() {
            self.queue.to_player(
                player,
                Message::ItemTransfer(ItemTransfer {
                    item_id,
                    holder: None,
                    position,
                }),
            );
        }
        self.queue.to_player(
            player,
            Message::DayNight(DayNight {
                time_of_day: self.world.time_of_day(),
            }),
        );

        for record in self.registry.iter().filter(|r| r.id != player) {
            if let Some(entity_id) = self.world.player_entity(record.id) {
                self.queue.to_player(
                    player,
                    Message::PlayerJoined(PlayerJoined {
                        player_id: record.id,
                        name: record.name.clone(),
                        entity_id,
                        local: false,
                    }),
                );
            }
        }
        for chest in self.open_chests() {
            if let Some(holder) = self.locks.holder(chest) {
                self.queue.to_player(
                    player,
                    Message::ChestAccess(ChestAccess {
                        chest_id: chest,
                        player_id: holder,
                        open: true,
                        outcome: Some(ChestOutcome::Opened),
                    }),
                );
            }
        }
    }

    fn open_chests(&self) -> Vec<InventoryId> {
        self.world
            .entities()
            .filter(|e| e.kind == EntityKind::Chest && self.locks.is_open(e.id))
            .map(|e| e.id)
            .collect()
    }

    fn announce_joined(&self, player: PlayerId, name: &str, entity_id: EntityId) {
        let joined = PlayerJoined {
            player_id: player,
            name: name.to_string(),
            entity_id,
            local: true,
        };
        self.queue.push(
            Target::AllExcept(player),
            Message::PlayerJoined(PlayerJoined {
                local: false,
                ..joined.clone()
            }),
        );
        self.queue.to_player(player, Message::PlayerJoined(joined));
    }

    /// Handles `/`-prefixed chat. Returns false if the text is not a command.
    fn run_command(&self, from: PlayerId, sender: &str, text: &str) -> bool {
        let mut parts = text.splitn(3, char::is_whitespace);
        match parts.next() {
            Some("/msg") | Some("/w") => {
                let target = parts.next().unwrap_or_default();
                let body = parts.next().unwrap_or_default().trim();
                // Records restored from a save may name players who are not connected.
                let online = self
                    .registry
                    .get_id(target)
                    .filter(|id| self.world.player_entity(*id).is_some());
                match online {
                    Some(id) if !body.is_empty() => {
                        self.queue.to_player(
                            id,
                            Message::Chat(Chat {
                                sender: sender.to_string(),
                                text: body.to_string(),
                                private: true,
                            }),
                        );
                    }
                    Some(_) => self.send_system(from, "Nothing to send".to_string()),
                    None => self.send_system(from, format!("No player named '{}'", target)),
                }
                true
            }
            Some("/who") => {
                let names: Vec<&str> = self
                    .registry
                    .iter()
                    .filter(|r| self.world.player_entity(r.id).is_some())
                    .map(|r| r.name.as_str())
                    .collect();
                self.send_system(from, format!("Online: {}", names.join(", ")));
                true
            }
            Some(command) if command.starts_with('/') => {
                self.send_system(from, format!("Unknown command {}", command));
                true
            }
            _ => false,
        }
    }
}

fn snapshot(world: &World, registry: &PlayerRegistry) -> Snapshot {
    Snapshot {
        world: world.snapshot(),
        registry: registry.clone(),
    }
}

impl PacketHandler for ServerHandler {
    fn role(&self) -> Role {
        Role::Server
    }

    fn on_move(&mut self, from: PlayerId, msg: Move) -> HandlerResult {
        let own = self.joined(MessageKind::Move, from)?;
        if msg.entity_id != own {
            return Err(ProtocolError::rejected(
                MessageKind::Move,
                format!("player {} does not control entity {}", from, msg.entity_id),
            )
            .into());
        }
        self.world
            .move_entity(msg.entity_id, msg.position, msg.heading)
            .map_err(|e| ProtocolError::rejected(MessageKind::Move, e.to_string()))?;
        self.queue.relay(from, Message::Move(msg));
        Ok(())
    }

    fn on_attack(&mut self, from: PlayerId, msg: Attack) -> HandlerResult {
        self.joined(MessageKind::Attack, from)?;
        Self::check_actor(MessageKind::Attack, from, msg.player_id)?;
        self.world.record_action(from, Action::Attack);
        self.queue.relay(from, Message::Attack(msg));
        Ok(())
    }

    fn on_right_click(&mut self, from: PlayerId, msg: RightClick) -> HandlerResult {
        self.joined(MessageKind::RightClick, from)?;
        Self::check_actor(MessageKind::RightClick, from, msg.player_id)?;
        self.world.record_action(from, Action::Interact(msg.target));
        self.queue.relay(from, Message::RightClick(msg));
        Ok(())
    }

    fn on_activate(&mut self, from: PlayerId, msg: OnActivate) -> HandlerResult {
        let own = self.joined(MessageKind::OnActivate, from)?;
        Self::check_actor(MessageKind::OnActivate, from, msg.player_id)?;
        if self.world.item_location(msg.item_id) != Some(ItemLocation::Inventory(own)) {
            return Err(ProtocolError::rejected(
                MessageKind::OnActivate,
                format!("item {} is not held by player {}", msg.item_id, from),
            )
            .into());
        }
        self.world.activate(from, msg.item_id, Provenance::Remote);
        self.queue.relay(from, Message::OnActivate(msg));
        Ok(())
    }

    fn on_player_setup(&mut self, from: PlayerId, msg: PlayerSetup) -> HandlerResult {
        let name = msg.name.trim();
        if name.is_empty() || name.len() > MAX_NAME_LEN || name.starts_with('/') {
            return Err(
                ProtocolError::rejected(MessageKind::PlayerSetup, "invalid display name").into(),
            );
        }

        let entity_id = match self.world.player_entity(from) {
            Some(entity_id) => {
                self.registry.put(name, from);
                if let Some(entity) = self.world.entity_mut(entity_id) {
                    entity.state.name = Some(name.to_string());
                }
                info!("Player {} is now known as {}", from, name);
                entity_id
            }
            None => {
                // A joiner the world cannot hold learns nothing and is not registered.
                if self.world.remaining_capacity() == 0 {
                    return Err(ProtocolError::rejected(
                        MessageKind::PlayerSetup,
                        format!("world is full, player {} cannot join", from),
                    )
                    .into());
                }
                self.send_world_to(from);
                let entity_id = self
                    .world
                    .spawn(EntityKind::Player, EntityState::named(spawn_point(from), name))
                    .map_err(|e| ProtocolError::rejected(MessageKind::PlayerSetup, e.to_string()))?;
                self.world.bind_player(from, entity_id);
                self.registry.put(name, from);
                info!("Player {} joined as {} (entity {})", from, name, entity_id);
                entity_id
            }
        };

        self.announce_joined(from, name, entity_id);
        Ok(())
    }

    fn on_player_joined(&mut self, _from: PlayerId, _msg: PlayerJoined) -> HandlerResult {
        unexpected(MessageKind::PlayerJoined, Role::Server)
    }

    fn on_player_speed(&mut self, from: PlayerId, msg: PlayerSpeed) -> HandlerResult {
        self.joined(MessageKind::PlayerSpeed, from)?;
        Self::check_actor(MessageKind::PlayerSpeed, from, msg.player_id)?;

        let speed = if msg.speed.is_finite() {
            msg.speed.clamp(0.0, MAX_PLAYER_SPEED)
        } else {
            0.0
        };
        self.world
            .set_speed(from, speed)
            .map_err(|e| ProtocolError::rejected(MessageKind::PlayerSpeed, e.to_string()))?;

        let corrected = PlayerSpeed {
            player_id: from,
            speed,
        };
        if speed != msg.speed {
            debug!("Clamped speed of player {} from {} to {}", from, msg.speed, speed);
            self.queue
                .to_player(from, Message::PlayerSpeed(corrected.clone()));
        }
        self.queue.relay(from, Message::PlayerSpeed(corrected));
        Ok(())
    }

    fn on_day_night(&mut self, _from: PlayerId, _msg: DayNight) -> HandlerResult {
        unexpected(MessageKind::DayNight, Role::Server)
    }

    fn on_effect(&mut self, _from: PlayerId, msg: Effect) -> HandlerResult {
        self.world
            .play_effect(&msg.name, msg.position, Provenance::Remote);
        Ok(())
    }

    fn on_game_won(&mut self, from: PlayerId, msg: GameWon) -> HandlerResult {
        self.joined(MessageKind::GameWon, from)?;
        if let Some(winner) = self.world.winner() {
            debug!("Ignoring late GameWon, {} already won", winner);
            return Ok(());
        }
        self.world.declare_won(&msg.winner, Provenance::Remote);
        self.queue.relay(from, Message::GameWon(msg));
        Ok(())
    }

    fn on_add_entity(&mut self, _from: PlayerId, _entity: EntityRef) -> HandlerResult {
        unexpected(MessageKind::AddEntity, Role::Server)
    }

    fn on_add_entity_finish(&mut self, _from: PlayerId) -> HandlerResult {
        unexpected(MessageKind::AddEntityFinish, Role::Server)
    }

    fn on_remove_entity(&mut self, _from: PlayerId, _msg: RemoveEntity) -> HandlerResult {
        unexpected(MessageKind::RemoveEntity, Role::Server)
    }

    fn on_item_transfer(&mut self, from: PlayerId, msg: ItemTransfer) -> HandlerResult {
        let own = self.joined(MessageKind::ItemTransfer, from)?;
        let location = self.world.item_location(msg.item_id);
        match msg.holder {
            Some(holder) => {
                Self::check_actor(MessageKind::ItemTransfer, from, holder)?;
                if !matches!(location, Some(ItemLocation::Ground(_))) {
                    return Err(ProtocolError::rejected(
                        MessageKind::ItemTransfer,
                        format!("item {} is not on the ground", msg.item_id),
                    )
                    .into());
                }
                self.world
                    .pick_up(from, msg.item_id, Provenance::Remote)
                    .map_err(|e| ProtocolError::rejected(MessageKind::ItemTransfer, e.to_string()))?;
            }
            None => {
                if location != Some(ItemLocation::Inventory(own)) {
                    return Err(ProtocolError::rejected(
                        MessageKind::ItemTransfer,
                        format!("item {} is not held by player {}", msg.item_id, from),
                    )
                    .into());
                }
                self.world.drop_item(msg.item_id, msg.position);
            }
        }
        self.queue.relay(from, Message::ItemTransfer(msg));
        Ok(())
    }

    fn on_inventory_transfer(&mut self, from: PlayerId, msg: InventoryTransfer) -> HandlerResult {
        let kind = MessageKind::InventoryTransfer;
        let own = self.joined(kind, from)?;
        self.check_inventory_access(kind, from, own, msg.from_inventory)?;
        self.check_inventory_access(kind, from, own, msg.to_inventory)?;
        self.world
            .move_item(msg.item_id, msg.from_inventory, msg.to_inventory)
            .map_err(|e| ProtocolError::rejected(kind, e.to_string()))?;
        self.queue.relay(from, Message::InventoryTransfer(msg));
        Ok(())
    }

    fn on_equip_item(&mut self, from: PlayerId, msg: EquipItem) -> HandlerResult {
        let own = self.joined(MessageKind::EquipItem, from)?;
        Self::check_actor(MessageKind::EquipItem, from, msg.player_id)?;
        if let Some(item) = msg.item_id {
            if self.world.item_location(item) != Some(ItemLocation::Inventory(own)) {
                return Err(ProtocolError::rejected(
                    MessageKind::EquipItem,
                    format!("item {} is not held by player {}", item, from),
                )
                .into());
            }
        }
        self.world
            .equip(from, msg.item_id, Provenance::Remote)
            .map_err(|e| ProtocolError::rejected(MessageKind::EquipItem, e.to_string()))?;
        self.queue.relay(from, Message::EquipItem(msg));
        Ok(())
    }

    fn on_chest_access(&mut self, from: PlayerId, msg: ChestAccess) -> HandlerResult {
        self.joined(MessageKind::ChestAccess, from)?;
        Self::check_actor(MessageKind::ChestAccess, from, msg.player_id)?;
        match self.world.entity(msg.chest_id).map(|e| e.kind) {
            Some(EntityKind::Chest) => {}
            _ => {
                return Err(ProtocolError::rejected(
                    MessageKind::ChestAccess,
                    format!("entity {} is not a chest", msg.chest_id),
                )
                .into())
            }
        }

        let outcome = if msg.open {
            Some(self.locks.request_open(msg.chest_id, from))
        } else {
            self.locks.request_close(msg.chest_id, from)
        };

        match outcome {
            Some(ChestOutcome::Denied) => {
                debug!("Player {} denied chest {}", from, msg.chest_id);
                self.queue
                    .to_player(from, Message::ChestAccess(msg.reply(ChestOutcome::Denied)));
            }
            Some(outcome) => {
                let reply = msg.reply(outcome);
                self.queue
                    .push(Target::AllExcept(from), Message::ChestAccess(reply.clone()));
                self.queue.to_player(from, Message::ChestAccess(reply));
            }
            None => debug!(
                "Ignoring close of chest {} from non-holder {}",
                msg.chest_id, from
            ),
        }
        Ok(())
    }

    fn on_chat(&mut self, from: PlayerId, msg: Chat) -> HandlerResult {
        self.joined(MessageKind::Chat, from)?;
        let sender = self
            .registry
            .get_name(from)
            .ok_or(ProtocolError::NotJoined {
                kind: MessageKind::Chat,
                peer: from,
            })?
            .to_string();
        let text = msg.text.trim();
        if text.is_empty() {
            return Ok(());
        }
        if self.run_command(from, &sender, text) {
            return Ok(());
        }
        self.queue.relay(
            from,
            Message::Chat(Chat {
                sender,
                text: text.to_string(),
                private: false,
            }),
        );
        Ok(())
    }

    fn on_ping(&mut self, from: PlayerId, msg: Ping) -> HandlerResult {
        if !msg.reply {
            self.queue.to_player(
                from,
                Message::Ping(Ping {
                    timestamp: msg.timestamp,
                    reply: true,
                }),
            );
        }
        Ok(())
    }

    fn on_server_save(&mut self, from: PlayerId) -> HandlerResult {
        let (world, registry) = (&self.world, &self.registry);
        match self.saves.request(|| snapshot(world, registry)) {
            SaveRequest::Started => info!("Save requested by player {}", from),
            SaveRequest::Queued => info!("Save requested by player {} queued", from),
        }
        Ok(())
    }
}

impl Drop for ServerHandler {
    fn drop(&mut self) {
        if self.saves.is_saving() {
            warn!("Waiting for in-flight save before shutdown");
            let (world, registry) = (&self.world, &self.registry);
            self.saves.flush(|| snapshot(world, registry));
        }
    }
}
