//! Client-side interpretation of every message kind
//!
//! Everything arriving here comes from the server and is applied with
//! [`Provenance::Remote`], so no hook turns it back into a request. Local
//! player actions go through the control methods instead, which mutate the
//! world with [`Provenance::Local`] and let the reactive observer queue the
//! matching request.

use crate::entity_sync::EntitySyncController;
use crate::hud::HudState;
use crate::observer::ReactiveObserver;
use log::{debug, info};
use shared::dispatch::unexpected;
use shared::world::{Action, ItemLocation};
use shared::{
    timestamp_millis, Attack, Chat, ChestAccess, ChestOutcome, ContainerLockTable, DayNight,
    Effect, EntityId, EntityRef, EquipItem, GameWon, HandlerResult, InventoryTransfer, ItemId,
    ItemTransfer, Message, MessageKind, Move, OnActivate, OutboundQueue, PacketHandler, Ping,
    PlayerId, PlayerJoined, PlayerRegistry, PlayerSetup, PlayerSpeed, ProtocolError, Provenance,
    RemoveEntity, RightClick, Role, Vec3, World, WorldError,
};

/// Distance beyond which the server's position for the local player wins.
pub const CORRECTION_THRESHOLD: f32 = 5.0;

/// Fraction of the error removed by one correction.
pub const CORRECTION_BLEND: f32 = 0.5;

/// Client side of the protocol
///
/// Owns the client's replica of the world together with the player registry,
/// the last known chest holders and the batch being received. The handler
/// never writes to the network itself; requests go into the outbound queue
/// and the network layer sends them to the server.
pub struct ClientHandler {
    world: World,
    registry: PlayerRegistry,
    locks: ContainerLockTable,
    sync: EntitySyncController,
    queue: OutboundQueue,
    hud: HudState,
    local_player: Option<PlayerId>,
    local_entity: Option<EntityId>,
    ping_ms: Option<u64>,
}

impl ClientHandler {
    /// Creates a handler for a client that has not joined yet
    ///
    /// The world's observer queues requests for local mutations on `queue`.
    /// No local player is known until the server answers the setup with a
    /// `PlayerJoined` marked local.
    pub fn new(max_entities: usize, queue: OutboundQueue, hud: HudState) -> Self {
        let world = World::with_observer(max_entities, Box::new(ReactiveObserver::new(queue.clone())));
        Self {
            world,
            registry: PlayerRegistry::new(),
            locks: ContainerLockTable::new(),
            sync: EntitySyncController::new(),
            queue,
            hud,
            local_player: None,
            local_entity: None,
            ping_ms: None,
        }
    }

    /// Replica of the server's world as far as it has been committed
    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn registry(&self) -> &PlayerRegistry {
        &self.registry
    }

    /// Chest holders as last reported by the server
    ///
    /// This is a mirror for display only. Arbitration happens on the server.
    pub fn locks(&self) -> &ContainerLockTable {
        &self.locks
    }

    /// Entity batch in progress; empty between batches
    pub fn sync(&self) -> &EntitySyncController {
        &self.sync
    }

    pub fn hud(&self) -> &HudState {
        &self.hud
    }

    /// Player id assigned by the server, once joined
    pub fn local_player(&self) -> Option<PlayerId> {
        self.local_player
    }

    /// Entity controlled by the local player
    ///
    /// Cleared when the server removes it, even though the player id stays
    /// known until the connection ends.
    pub fn local_entity(&self) -> Option<EntityId> {
        self.local_entity
    }

    /// Round-trip time measured by the most recent answered ping
    pub fn ping_ms(&self) -> Option<u64> {
        self.ping_ms
    }

    /// Runs the local clock between server updates and hands transient
    /// effects to the HUD.
    pub fn tick(&mut self, dt: f32) {
        self.world.advance(dt);
        for (name, position) in self.world.take_effects() {
            self.hud.push_effect(name, position);
        }
        let actions = self.world.take_actions();
        if !actions.is_empty() {
            debug!("{} actions played", actions.len());
        }
    }

    /// Connection lost: an unfinished batch must never become visible.
    pub fn disconnected(&mut self) {
        self.sync.discard();
        self.hud.open_container = None;
    }

    // Local controls

    fn local(&self) -> Result<(PlayerId, EntityId), WorldError> {
        match (self.local_player, self.local_entity) {
            (Some(player), Some(entity)) => Ok((player, entity)),
            _ => Err(WorldError::UnknownPlayer(self.local_player.unwrap_or_default())),
        }
    }

    /// Moves the local player and reports the new position.
    pub fn move_local(&mut self, position: Vec3, heading: f32) -> Result<(), WorldError> {
        let (_, entity_id) = self.local()?;
        self.world.move_entity(entity_id, position, heading)?;
        self.queue.to_server(Message::Move(Move {
            entity_id,
            position,
            heading,
        }));
        Ok(())
    }

    /// Plays the attack animation locally and tells the server
    ///
    /// Fails before anything is queued if the client has not joined.
    pub fn attack(&mut self) -> Result<(), WorldError> {
        let (player_id, _) = self.local()?;
        self.world.record_action(player_id, Action::Attack);
        self.queue.to_server(Message::Attack(Attack { player_id }));
        Ok(())
    }

    /// Changes the local player's movement speed and reports it
    pub fn set_speed(&mut self, speed: f32) -> Result<(), WorldError> {
        let (player_id, _) = self.local()?;
        self.world.set_speed(player_id, speed)?;
        self.queue
            .to_server(Message::PlayerSpeed(PlayerSpeed { player_id, speed }));
        Ok(())
    }

    /// Takes an item into the local player's inventory
    ///
    /// The world observer turns the local pick-up into an `ItemTransfer`
    /// request. The server's answer is authoritative.
    pub fn pick_up(&mut self, item: ItemId) -> Result<(), WorldError> {
        let (player_id, _) = self.local()?;
        self.world.pick_up(player_id, item, Provenance::Local)
    }

    /// Holds `item` in the local player's hands, or empties them with `None`
    pub fn equip(&mut self, item: Option<ItemId>) -> Result<(), WorldError> {
        let (player_id, _) = self.local()?;
        self.world.equip(player_id, item, Provenance::Local)
    }

    /// Uses an item; the observer queues the matching `OnActivate`
    pub fn activate(&mut self, item: ItemId) -> Result<(), WorldError> {
        let (player_id, _) = self.local()?;
        self.world.activate(player_id, item, Provenance::Local);
        Ok(())
    }

    /// Claims victory for the local player
    ///
    /// The game is won under the local player's registered name. A world
    /// that already has a winner keeps it and nothing is sent.
    pub fn declare_won(&mut self) -> Result<(), WorldError> {
        let (player_id, _) = self.local()?;
        let name = self
            .registry
            .get_name(player_id)
            .unwrap_or_default()
            .to_string();
        self.world.declare_won(&name, Provenance::Local);
        Ok(())
    }

    /// Asks the server to save the world
    pub fn request_save(&self) {
        self.queue.to_server(Message::ServerSave);
    }

    /// Heartbeat; the reply also measures round-trip time.
    pub fn ping(&self) {
        self.queue.to_server(Message::Ping(Ping {
            timestamp: timestamp_millis(),
            reply: false,
        }));
    }

    fn is_local(&self, player: PlayerId) -> bool {
        self.local_player == Some(player)
    }

    fn reject(kind: MessageKind, e: WorldError) -> ProtocolError {
        ProtocolError::rejected(kind, e.to_string())
    }
}

impl PacketHandler for ClientHandler {
    fn role(&self) -> Role {
        Role::Client
    }

    fn on_move(&mut self, _from: PlayerId, msg: Move) -> HandlerResult {
        let Some(entity) = self.world.entity(msg.entity_id) else {
            debug!("Move for unknown entity {}", msg.entity_id);
            return Ok(());
        };

        if Some(msg.entity_id) == self.local_entity {
            let current = entity.state.position;
            let heading = entity.state.heading;
            if current.distance(&msg.position) > CORRECTION_THRESHOLD {
                let corrected = current.lerp(&msg.position, CORRECTION_BLEND);
                debug!("Correcting local player towards server position");
                self.world
                    .move_entity(msg.entity_id, corrected, heading)
                    .map_err(|e| Self::reject(MessageKind::Move, e))?;
            }
            return Ok(());
        }

        self.world
            .move_entity(msg.entity_id, msg.position, msg.heading)
            .map_err(|e| Self::reject(MessageKind::Move, e))?;
        Ok(())
    }

    fn on_attack(&mut self, _from: PlayerId, msg: Attack) -> HandlerResult {
        self.world.record_action(msg.player_id, Action::Attack);
        Ok(())
    }

    fn on_right_click(&mut self, _from: PlayerId, msg: RightClick) -> HandlerResult {
        self.world
            .record_action(msg.player_id, Action::Interact(msg.target));
        Ok(())
    }

    fn on_activate(&mut self, _from: PlayerId, msg: OnActivate) -> HandlerResult {
        self.world
            .activate(msg.player_id, msg.item_id, Provenance::Remote);
        Ok(())
    }

    fn on_player_setup(&mut self, _from: PlayerId, _msg: PlayerSetup) -> HandlerResult {
        unexpected(MessageKind::PlayerSetup, Role::Client)
    }

    fn on_player_joined(&mut self, _from: PlayerId, msg: PlayerJoined) -> HandlerResult {
        self.registry.put(&msg.name, msg.player_id);
        self.world.bind_player(msg.player_id, msg.entity_id);
        if msg.local {
            info!("Joined as {} (player {})", msg.name, msg.player_id);
            self.local_player = Some(msg.player_id);
            self.local_entity = Some(msg.entity_id);
        } else {
            info!("{} joined", msg.name);
        }
        Ok(())
    }

    fn on_player_speed(&mut self, _from: PlayerId, msg: PlayerSpeed) -> HandlerResult {
        self.world
            .set_speed(msg.player_id, msg.speed)
            .map_err(|e| Self::reject(MessageKind::PlayerSpeed, e))?;
        Ok(())
    }

    fn on_day_night(&mut self, _from: PlayerId, msg: DayNight) -> HandlerResult {
        self.world
            .set_time_of_day(msg.time_of_day, Provenance::Remote);
        Ok(())
    }

    fn on_effect(&mut self, _from: PlayerId, msg: Effect) -> HandlerResult {
        self.world
            .play_effect(&msg.name, msg.position, Provenance::Remote);
        Ok(())
    }

    fn on_game_won(&mut self, _from: PlayerId, msg: GameWon) -> HandlerResult {
        self.world.declare_won(&msg.winner, Provenance::Remote);
        if let Some(winner) = self.world.winner() {
            self.hud.game_over = Some(winner.to_string());
        }
        Ok(())
    }

    fn on_add_entity(&mut self, _from: PlayerId, entity: EntityRef) -> HandlerResult {
        self.sync.buffer(entity);
        Ok(())
    }

    fn on_add_entity_finish(&mut self, _from: PlayerId) -> HandlerResult {
        self.sync.commit(&mut self.world)?;
        Ok(())
    }

    fn on_remove_entity(&mut self, _from: PlayerId, msg: RemoveEntity) -> HandlerResult {
        let id = msg.entity_id;
        if self.sync.remove_pending(id) {
            debug!("Entity {} removed before its batch committed", id);
        }

        let owner = self
            .registry
            .iter()
            .find(|record| self.world.player_entity(record.id) == Some(id))
            .map(|record| record.id);
        if let Some(player) = owner {
            if let Some(name) = self.registry.remove_id(player) {
                info!("{} left", name);
            }
        }
        if self.local_entity == Some(id) {
            self.local_entity = None;
        }

        self.world.remove(id, Provenance::Remote);
        Ok(())
    }

    fn on_item_transfer(&mut self, _from: PlayerId, msg: ItemTransfer) -> HandlerResult {
        match msg.holder {
            Some(player) => self
                .world
                .pick_up(player, msg.item_id, Provenance::Remote)
                .map_err(|e| Self::reject(MessageKind::ItemTransfer, e))?,
            None => self.world.drop_item(msg.item_id, msg.position),
        }
        Ok(())
    }

    fn on_inventory_transfer(&mut self, _from: PlayerId, msg: InventoryTransfer) -> HandlerResult {
        if self
            .world
            .move_item(msg.item_id, msg.from_inventory, msg.to_inventory)
            .is_err()
        {
            // The server's view wins over a stale local one.
            self.world
                .place_item(msg.item_id, ItemLocation::Inventory(msg.to_inventory));
        }
        Ok(())
    }

    fn on_equip_item(&mut self, _from: PlayerId, msg: EquipItem) -> HandlerResult {
        self.world
            .equip(msg.player_id, msg.item_id, Provenance::Remote)
            .map_err(|e| Self::reject(MessageKind::EquipItem, e))?;
        Ok(())
    }

    fn on_chest_access(&mut self, _from: PlayerId, msg: ChestAccess) -> HandlerResult {
        let local = self.is_local(msg.player_id);
        match msg.outcome {
            Some(ChestOutcome::Opened) => {
                self.locks.set_holder(msg.chest_id, Some(msg.player_id));
                if local {
                    self.hud.open_container = Some(msg.chest_id);
                    self.hud.denied_container = None;
                }
            }
            Some(ChestOutcome::Closed) => {
                self.locks.set_holder(msg.chest_id, None);
                if local && self.hud.open_container == Some(msg.chest_id) {
                    self.hud.open_container = None;
                }
            }
            Some(ChestOutcome::Denied) => {
                if local {
                    info!("Chest {} is in use", msg.chest_id);
                    self.hud.denied_container = Some(msg.chest_id);
                }
            }
            None => {
                return Err(ProtocolError::rejected(
                    MessageKind::ChestAccess,
                    "reply carries no outcome",
                )
                .into())
            }
        }
        Ok(())
    }

    fn on_chat(&mut self, _from: PlayerId, msg: Chat) -> HandlerResult {
        self.hud.push_chat(&msg.sender, &msg.text, msg.private);
        Ok(())
    }

    fn on_ping(&mut self, _from: PlayerId, msg: Ping) -> HandlerResult {
        if msg.reply {
            self.ping_ms = Some(timestamp_millis().saturating_sub(msg.timestamp));
        } else {
            self.queue.to_server(Message::Ping(Ping {
                timestamp: msg.timestamp,
                reply: true,
            }));
        }
        Ok(())
    }

    fn on_server_save(&mut self, _from: PlayerId) -> HandlerResult {
        unexpected(MessageKind::ServerSave, Role::Client)
    }
}
