//! Reactive hooks: the local player's own actions become requests to the server.

use shared::{
    EquipItem, GameWon, ItemId, ItemTransfer, Message, OnActivate, OutboundQueue, PlayerId, Vec3,
    WorldObserver,
};

/// Wired into the client's world. Entity, clock and effect hooks stay at
/// their no-op defaults: those changes are the server's to announce.
pub struct ReactiveObserver {
    queue: OutboundQueue,
}

impl ReactiveObserver {
    pub fn new(queue: OutboundQueue) -> Self {
        Self { queue }
    }
}

impl WorldObserver for ReactiveObserver {
    fn item_equipped(&mut self, player_id: PlayerId, item_id: Option<ItemId>) {
        self.queue
            .to_server(Message::EquipItem(EquipItem { player_id, item_id }));
    }

    fn item_activated(&mut self, player_id: PlayerId, item_id: ItemId) {
        self.queue
            .to_server(Message::OnActivate(OnActivate { player_id, item_id }));
    }

    fn item_picked_up(&mut self, player_id: PlayerId, item_id: ItemId) {
        self.queue.to_server(Message::ItemTransfer(ItemTransfer {
            item_id,
            holder: Some(player_id),
            position: Vec3::ZERO,
        }));
    }

    fn game_won(&mut self, winner: &str) {
        self.queue.to_server(Message::GameWon(GameWon {
            winner: winner.to_string(),
        }));
    }
}
