//! Bridge from local UI intents to the session

use crate::protocol::{EntityId, InventoryId, ItemId, Vec3};

/// Intents raised by the local user interface.
///
/// A networked binding turns each call into exactly one message for the
/// server; a single-participant binding applies it to the local world
/// directly. Callers cannot tell the two apart.
pub trait GuiObserver {
    fn drop_item(&mut self, item: ItemId, position: Vec3);
    fn transfer_item(&mut self, item: ItemId, from: InventoryId, to: InventoryId);
    fn send_chat(&mut self, text: &str);
    fn open_chest(&mut self, chest: InventoryId);
    fn close_chest(&mut self, chest: InventoryId);
    fn right_click(&mut self, target: Option<EntityId>);
    fn start_game(&mut self, name: &str);
}
