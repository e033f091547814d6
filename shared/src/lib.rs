//! Protocol, policy and state shared by the server and client endpoints.

pub mod authority;
pub mod codec;
pub mod container;
pub mod dispatch;
pub mod error;
pub mod gui;
pub mod outbound;
pub mod persistence;
pub mod protocol;
pub mod registry;
pub mod world;

pub use authority::{accepts, policy, AuthorityPolicy, Origin, Rebroadcast, Role};
pub use container::{ContainerLock, ContainerLockTable};
pub use dispatch::{dispatch, HandlerResult, PacketHandler, SERVER_PEER};
pub use error::{
    BatchIntegrityError, CodecError, DispatchError, PersistenceError, ProtocolError, WorldError,
};
pub use gui::GuiObserver;
pub use outbound::{OutboundQueue, OutboundReceiver, Outgoing, Target};
pub use persistence::{FileStore, MemoryStore, Persistence, Snapshot};
pub use protocol::*;
pub use registry::{PlayerRecord, PlayerRegistry};
pub use world::{Entity, NullObserver, Provenance, World, WorldObserver};

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch, used for ping timestamps.
pub fn timestamp_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}
