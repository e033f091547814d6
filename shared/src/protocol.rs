//! Wire message catalog
//!
//! Every message exchanged between the server and its clients is one case of
//! [`Message`]. The set is closed: handlers match on it exhaustively, so adding
//! a kind breaks the build until every role handles it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier minted by the server for each connected participant.
pub type PlayerId = u32;
/// World-unique entity identifier, minted by the authoritative world.
pub type EntityId = u32;
/// Inventory identifier. Inventories share the id of the entity owning them.
pub type InventoryId = u32;
/// Item identifier.
pub type ItemId = u32;

/// Movement speed entities start with, in world units per second.
pub const DEFAULT_SPEED: f32 = 4.0;
/// Fastest speed the server lets a player run at.
pub const MAX_PLAYER_SPEED: f32 = 12.0;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn distance(&self, other: &Vec3) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        let dz = other.z - self.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    pub fn lerp(&self, other: &Vec3, alpha: f32) -> Vec3 {
        Vec3 {
            x: self.x + (other.x - self.x) * alpha,
            y: self.y + (other.y - self.y) * alpha,
            z: self.z + (other.z - self.z) * alpha,
        }
    }
}

/// Closed set of entity kinds with stable wire tags.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Player,
    Mob,
    Item,
    Chest,
    Projectile,
}

impl EntityKind {
    pub fn tag(self) -> u16 {
        match self {
            EntityKind::Player => 1,
            EntityKind::Mob => 2,
            EntityKind::Item => 3,
            EntityKind::Chest => 4,
            EntityKind::Projectile => 5,
        }
    }

    pub fn from_tag(tag: u16) -> Option<Self> {
        match tag {
            1 => Some(EntityKind::Player),
            2 => Some(EntityKind::Mob),
            3 => Some(EntityKind::Item),
            4 => Some(EntityKind::Chest),
            5 => Some(EntityKind::Projectile),
            _ => None,
        }
    }

    /// Kinds that own an inventory keyed by their entity id.
    pub fn has_inventory(self) -> bool {
        matches!(self, EntityKind::Player | EntityKind::Chest)
    }
}

/// Initial state of an entity, carried as an opaque blob inside [`EntityRef`].
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct EntityState {
    pub position: Vec3,
    pub heading: f32,
    pub health: u32,
    pub name: Option<String>,
    pub speed: f32,
    pub equipped: Option<ItemId>,
    /// Items held by the entity's inventory. Filled only when replicating.
    pub inventory: Vec<ItemId>,
}

impl EntityState {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            heading: 0.0,
            health: 100,
            name: None,
            speed: DEFAULT_SPEED,
            equipped: None,
            inventory: Vec::new(),
        }
    }

    pub fn named(position: Vec3, name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            ..Self::at(position)
        }
    }

    pub fn to_blob(&self) -> Vec<u8> {
        // Plain structs of integers, floats and strings always encode.
        bincode::serialize(self).unwrap_or_default()
    }

    pub fn from_blob(blob: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(blob)
    }
}

/// Reference to an entity introduced through the phased creation protocol.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct EntityRef {
    pub id: EntityId,
    pub kind: u16,
    pub state: Vec<u8>,
}

impl EntityRef {
    pub fn new(id: EntityId, kind: EntityKind, state: &EntityState) -> Self {
        Self {
            id,
            kind: kind.tag(),
            state: state.to_blob(),
        }
    }
}

/// Result of a chest access request, set only on server replies.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum ChestOutcome {
    Opened,
    Denied,
    Closed,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Move {
    pub entity_id: EntityId,
    pub position: Vec3,
    pub heading: f32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Attack {
    pub player_id: PlayerId,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RightClick {
    pub player_id: PlayerId,
    pub target: Option<EntityId>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct OnActivate {
    pub player_id: PlayerId,
    pub item_id: ItemId,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PlayerSetup {
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PlayerJoined {
    pub player_id: PlayerId,
    pub name: String,
    pub entity_id: EntityId,
    /// Set only on the copy sent to the participant who joined.
    pub local: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PlayerSpeed {
    pub player_id: PlayerId,
    pub speed: f32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DayNight {
    /// Hours since midnight, in `0.0..24.0`.
    pub time_of_day: f32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Effect {
    pub name: String,
    pub position: Vec3,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GameWon {
    pub winner: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RemoveEntity {
    pub entity_id: EntityId,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ItemTransfer {
    pub item_id: ItemId,
    /// `None` drops the item into the world at `position`.
    pub holder: Option<PlayerId>,
    pub position: Vec3,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct InventoryTransfer {
    pub item_id: ItemId,
    pub from_inventory: InventoryId,
    pub to_inventory: InventoryId,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct EquipItem {
    pub player_id: PlayerId,
    pub item_id: Option<ItemId>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChestAccess {
    pub chest_id: InventoryId,
    pub player_id: PlayerId,
    pub open: bool,
    pub outcome: Option<ChestOutcome>,
}

impl ChestAccess {
    pub fn request(chest_id: InventoryId, player_id: PlayerId, open: bool) -> Self {
        Self {
            chest_id,
            player_id,
            open,
            outcome: None,
        }
    }

    pub fn reply(&self, outcome: ChestOutcome) -> Self {
        Self {
            outcome: Some(outcome),
            ..self.clone()
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Chat {
    pub sender: String,
    pub text: String,
    pub private: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Ping {
    pub timestamp: u64,
    pub reply: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Message {
    Move(Move),
    Attack(Attack),
    RightClick(RightClick),
    OnActivate(OnActivate),
    PlayerSetup(PlayerSetup),
    PlayerJoined(PlayerJoined),
    PlayerSpeed(PlayerSpeed),
    DayNight(DayNight),
    Effect(Effect),
    GameWon(GameWon),
    AddEntity(EntityRef),
    AddEntityFinish,
    RemoveEntity(RemoveEntity),
    ItemTransfer(ItemTransfer),
    InventoryTransfer(InventoryTransfer),
    EquipItem(EquipItem),
    ChestAccess(ChestAccess),
    Chat(Chat),
    Ping(Ping),
    ServerSave,
}

/// Fieldless mirror of [`Message`], used for policy lookups and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Move,
    Attack,
    RightClick,
    OnActivate,
    PlayerSetup,
    PlayerJoined,
    PlayerSpeed,
    DayNight,
    Effect,
    GameWon,
    AddEntity,
    AddEntityFinish,
    RemoveEntity,
    ItemTransfer,
    InventoryTransfer,
    EquipItem,
    ChestAccess,
    Chat,
    Ping,
    ServerSave,
}

impl MessageKind {
    pub const ALL: [MessageKind; 20] = [
        MessageKind::Move,
        MessageKind::Attack,
        MessageKind::RightClick,
        MessageKind::OnActivate,
        MessageKind::PlayerSetup,
        MessageKind::PlayerJoined,
        MessageKind::PlayerSpeed,
        MessageKind::DayNight,
        MessageKind::Effect,
        MessageKind::GameWon,
        MessageKind::AddEntity,
        MessageKind::AddEntityFinish,
        MessageKind::RemoveEntity,
        MessageKind::ItemTransfer,
        MessageKind::InventoryTransfer,
        MessageKind::EquipItem,
        MessageKind::ChestAccess,
        MessageKind::Chat,
        MessageKind::Ping,
        MessageKind::ServerSave,
    ];
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Move(_) => MessageKind::Move,
            Message::Attack(_) => MessageKind::Attack,
            Message::RightClick(_) => MessageKind::RightClick,
            Message::OnActivate(_) => MessageKind::OnActivate,
            Message::PlayerSetup(_) => MessageKind::PlayerSetup,
            Message::PlayerJoined(_) => MessageKind::PlayerJoined,
            Message::PlayerSpeed(_) => MessageKind::PlayerSpeed,
            Message::DayNight(_) => MessageKind::DayNight,
            Message::Effect(_) => MessageKind::Effect,
            Message::GameWon(_) => MessageKind::GameWon,
            Message::AddEntity(_) => MessageKind::AddEntity,
            Message::AddEntityFinish => MessageKind::AddEntityFinish,
            Message::RemoveEntity(_) => MessageKind::RemoveEntity,
            Message::ItemTransfer(_) => MessageKind::ItemTransfer,
            Message::InventoryTransfer(_) => MessageKind::InventoryTransfer,
            Message::EquipItem(_) => MessageKind::EquipItem,
            Message::ChestAccess(_) => MessageKind::ChestAccess,
            Message::Chat(_) => MessageKind::Chat,
            Message::Ping(_) => MessageKind::Ping,
            Message::ServerSave => MessageKind::ServerSave,
        }
    }
}
