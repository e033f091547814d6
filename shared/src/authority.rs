//! Per-kind authority and rebroadcast policy
//!
//! The server consults [`policy`] for every inbound message it relays, and both
//! endpoints consult [`accepts`] before dispatching. The tables are exhaustive
//! matches so a new message kind cannot be added without deciding its policy.

use crate::protocol::MessageKind;
use std::fmt;

/// Which side of a connection an endpoint plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Server,
    Client,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Server => write!(f, "server"),
            Role::Client => write!(f, "client"),
        }
    }
}

/// Endpoint whose state is canonical for a kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    ServerAuthoritative,
    ClientOriginated,
}

/// What the server does with an accepted client message once applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rebroadcast {
    /// Re-issue the validated message to every client, requester included.
    /// The requester's copy is the authoritative confirmation.
    ToAll,
    /// Relay to every client except the one it came from.
    ExceptSender,
    /// Never relayed; any reply is produced explicitly by the handler.
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthorityPolicy {
    pub origin: Origin,
    pub rebroadcast: Rebroadcast,
}

const fn client(rebroadcast: Rebroadcast) -> AuthorityPolicy {
    AuthorityPolicy {
        origin: Origin::ClientOriginated,
        rebroadcast,
    }
}

const SERVER: AuthorityPolicy = AuthorityPolicy {
    origin: Origin::ServerAuthoritative,
    rebroadcast: Rebroadcast::None,
};

pub fn policy(kind: MessageKind) -> AuthorityPolicy {
    match kind {
        MessageKind::Move => client(Rebroadcast::ExceptSender),
        MessageKind::Attack => client(Rebroadcast::ExceptSender),
        MessageKind::RightClick => client(Rebroadcast::ExceptSender),
        MessageKind::OnActivate => client(Rebroadcast::ExceptSender),
        MessageKind::PlayerSetup => client(Rebroadcast::None),
        MessageKind::PlayerJoined => SERVER,
        MessageKind::PlayerSpeed => client(Rebroadcast::ExceptSender),
        MessageKind::DayNight => SERVER,
        MessageKind::Effect => SERVER,
        MessageKind::GameWon => client(Rebroadcast::ToAll),
        MessageKind::AddEntity => SERVER,
        MessageKind::AddEntityFinish => SERVER,
        MessageKind::RemoveEntity => SERVER,
        MessageKind::ItemTransfer => client(Rebroadcast::ToAll),
        MessageKind::InventoryTransfer => client(Rebroadcast::ToAll),
        MessageKind::EquipItem => client(Rebroadcast::ExceptSender),
        MessageKind::ChestAccess => client(Rebroadcast::None),
        MessageKind::Chat => client(Rebroadcast::ToAll),
        MessageKind::Ping => client(Rebroadcast::None),
        MessageKind::ServerSave => client(Rebroadcast::None),
    }
}

/// Kinds both endpoints handle regardless of origin.
fn is_symmetric(kind: MessageKind) -> bool {
    matches!(kind, MessageKind::Ping | MessageKind::Effect)
}

/// Kinds a client sends but never receives back.
fn is_client_request_only(kind: MessageKind) -> bool {
    matches!(kind, MessageKind::PlayerSetup | MessageKind::ServerSave)
}

/// Whether an endpoint playing `role` may receive `kind`.
pub fn accepts(role: Role, kind: MessageKind) -> bool {
    if is_symmetric(kind) {
        return true;
    }
    match role {
        Role::Server => policy(kind).origin == Origin::ClientOriginated,
        Role::Client => !is_client_request_only(kind),
    }
}
