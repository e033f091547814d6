//! Role-specific packet handling
//!
//! [`PacketHandler`] has one method per message kind and no default bodies,
//! so the server and client handlers must each decide what every kind means
//! for them. [`dispatch`] is the only place a [`Message`] is taken apart.

use crate::authority::{accepts, Role};
use crate::error::{DispatchError, ProtocolError};
use crate::protocol::{
    Attack, Chat, ChestAccess, DayNight, Effect, EntityRef, EquipItem, GameWon,
    InventoryTransfer, ItemTransfer, Message, MessageKind, Move, OnActivate, Ping, PlayerId, PlayerJoined,
    PlayerSetup, PlayerSpeed, RemoveEntity, RightClick,
};

/// Peer id clients use for messages that arrive from the server.
pub const SERVER_PEER: PlayerId = 0;

pub type HandlerResult = Result<(), DispatchError>;

pub trait PacketHandler {
    fn role(&self) -> Role;

    fn on_move(&mut self, from: PlayerId, msg: Move) -> HandlerResult;
    fn on_attack(&mut self, from: PlayerId, msg: Attack) -> HandlerResult;
    fn on_right_click(&mut self, from: PlayerId, msg: RightClick) -> HandlerResult;
    fn on_activate(&mut self, from: PlayerId, msg: OnActivate) -> HandlerResult;
    fn on_player_setup(&mut self, from: PlayerId, msg: PlayerSetup) -> HandlerResult;
    fn on_player_joined(&mut self, from: PlayerId, msg: PlayerJoined) -> HandlerResult;
    fn on_player_speed(&mut self, from: PlayerId, msg: PlayerSpeed) -> HandlerResult;
    fn on_day_night(&mut self, from: PlayerId, msg: DayNight) -> HandlerResult;
    fn on_effect(&mut self, from: PlayerId, msg: Effect) -> HandlerResult;
    fn on_game_won(&mut self, from: PlayerId, msg: GameWon) -> HandlerResult;
    fn on_add_entity(&mut self, from: PlayerId, entity: EntityRef) -> HandlerResult;
    fn on_add_entity_finish(&mut self, from: PlayerId) -> HandlerResult;
    fn on_remove_entity(&mut self, from: PlayerId, msg: RemoveEntity) -> HandlerResult;
    fn on_item_transfer(&mut self, from: PlayerId, msg: ItemTransfer) -> HandlerResult;
    fn on_inventory_transfer(&mut self, from: PlayerId, msg: InventoryTransfer) -> HandlerResult;
    fn on_equip_item(&mut self, from: PlayerId, msg: EquipItem) -> HandlerResult;
    fn on_chest_access(&mut self, from: PlayerId, msg: ChestAccess) -> HandlerResult;
    fn on_chat(&mut self, from: PlayerId, msg: Chat) -> HandlerResult;
    fn on_ping(&mut self, from: PlayerId, msg: Ping) -> HandlerResult;
    fn on_server_save(&mut self, from: PlayerId) -> HandlerResult;
}

/// Checks the message against the handler's role and routes it.
pub fn dispatch<H: PacketHandler + ?Sized>(
    handler: &mut H,
    from: PlayerId,
    message: Message,
) -> HandlerResult {
    let kind = message.kind();
    let role = handler.role();
    if !accepts(role, kind) {
        return Err(ProtocolError::UnexpectedKind { kind, role }.into());
    }

    match message {
        Message::Move(msg) => handler.on_move(from, msg),
        Message::Attack(msg) => handler.on_attack(from, msg),
        Message::RightClick(msg) => handler.on_right_click(from, msg),
        Message::OnActivate(msg) => handler.on_activate(from, msg),
        Message::PlayerSetup(msg) => handler.on_player_setup(from, msg),
        Message::PlayerJoined(msg) => handler.on_player_joined(from, msg),
        Message::PlayerSpeed(msg) => handler.on_player_speed(from, msg),
        Message::DayNight(msg) => handler.on_day_night(from, msg),
        Message::Effect(msg) => handler.on_effect(from, msg),
        Message::GameWon(msg) => handler.on_game_won(from, msg),
        Message::AddEntity(entity) => handler.on_add_entity(from, entity),
        Message::AddEntityFinish => handler.on_add_entity_finish(from),
        Message::RemoveEntity(msg) => handler.on_remove_entity(from, msg),
        Message::ItemTransfer(msg) => handler.on_item_transfer(from, msg),
        Message::InventoryTransfer(msg) => handler.on_inventory_transfer(from, msg),
        Message::EquipItem(msg) => handler.on_equip_item(from, msg),
        Message::ChestAccess(msg) => handler.on_chest_access(from, msg),
        Message::Chat(msg) => handler.on_chat(from, msg),
        Message::Ping(msg) => handler.on_ping(from, msg),
        Message::ServerSave => handler.on_server_save(from),
    }
}

/// Shorthand for handler methods of kinds a role can never receive once
/// [`dispatch`] has checked acceptance.
pub fn unexpected(kind: MessageKind, role: Role) -> HandlerResult {
    Err(ProtocolError::UnexpectedKind { kind, role }.into())
}
