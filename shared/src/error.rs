//! Error types shared by both endpoints

use crate::authority::Role;
use crate::protocol::{EntityId, MessageKind};

/// A message that cannot be interpreted by the receiving role.
///
/// Never fatal: the offending message is logged and dropped, the connection
/// stays open.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ProtocolError {
    #[error("{kind} is not accepted by the {role} role")]
    UnexpectedKind { kind: MessageKind, role: Role },

    #[error("{kind} rejected: {reason}")]
    Rejected { kind: MessageKind, reason: String },

    #[error("{kind} from an unregistered connection {peer}")]
    NotJoined { kind: MessageKind, peer: u32 },
}

impl ProtocolError {
    pub fn rejected(kind: MessageKind, reason: impl Into<String>) -> Self {
        ProtocolError::Rejected {
            kind,
            reason: reason.into(),
        }
    }
}

/// A phased entity batch that could not be applied as a whole.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum BatchIntegrityError {
    #[error("entity {id} has unknown kind tag {tag}")]
    UnknownKind { id: EntityId, tag: u16 },

    #[error("entity {id} carries a malformed state blob")]
    MalformedState { id: EntityId },

    #[error("entity {id} could not be inserted: {source}")]
    Rejected {
        id: EntityId,
        #[source]
        source: WorldError,
    },
}

#[derive(Debug, thiserror::Error, PartialEq, Clone)]
pub enum WorldError {
    #[error("entity {0} already exists")]
    DuplicateEntity(EntityId),

    #[error("entity limit of {0} reached")]
    Full(usize),

    #[error("no entity {0}")]
    UnknownEntity(EntityId),

    #[error("no entity for player {0}")]
    UnknownPlayer(u32),

    #[error("no inventory {0}")]
    UnknownInventory(u32),

    #[error("item {item} is not in inventory {inventory}")]
    ItemNotHeld { item: u32, inventory: u32 },
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("payload size {size} exceeds maximum {max}")]
    PayloadTooLarge { size: u32, max: u32 },

    #[error("protocol version {found} does not match {expected}")]
    VersionMismatch { found: u16, expected: u16 },

    #[error("frame too short to carry a version header")]
    Truncated,

    #[error("connection closed")]
    ConnectionClosed,

    #[error("encoding error: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("no saved state at {0}")]
    NotFound(String),

    #[error("corrupt saved state: {0}")]
    Corrupt(String),

    #[error("encoding error: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Anything a packet handler can fail with. Neither case closes the connection.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum DispatchError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    BatchIntegrity(#[from] BatchIntegrityError),
}
