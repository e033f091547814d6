//! Authoring hooks: local world changes on the server become broadcasts.

use log::debug;
use shared::world::Entity;
use shared::{DayNight, Effect, EntityId, Message, OutboundQueue, RemoveEntity, Vec3, WorldObserver};

/// Wired into the server's world. Every hook only queues a message; the
/// simulation loop delivers the queue after the step.
pub struct AuthoringObserver {
    queue: OutboundQueue,
}

impl AuthoringObserver {
    pub fn new(queue: OutboundQueue) -> Self {
        Self { queue }
    }
}

impl WorldObserver for AuthoringObserver {
    /// A live entity is announced as a batch of one.
    fn entity_added(&mut self, entity: &Entity) {
        debug!("Announcing {:?} {}", entity.kind, entity.id);
        self.queue.broadcast(Message::AddEntity(entity.to_ref()));
        self.queue.broadcast(Message::AddEntityFinish);
    }

    fn entity_removed(&mut self, entity_id: EntityId) {
        self.queue
            .broadcast(Message::RemoveEntity(RemoveEntity { entity_id }));
    }

    fn day_night_changed(&mut self, time_of_day: f32) {
        self.queue.broadcast(Message::DayNight(DayNight { time_of_day }));
    }

    fn effect_created(&mut self, name: &str, position: Vec3) {
        self.queue.broadcast(Message::Effect(Effect {
            name: name.to_string(),
            position,
        }));
    }
}
