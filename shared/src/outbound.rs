//! Outbound message queue
//!
//! Hooks and handlers never write to a socket. They push onto an
//! [`OutboundQueue`] and the endpoint's loop drains it once the current
//! simulation step has finished.

use crate::authority::{policy, Rebroadcast};
use crate::protocol::{Message, PlayerId};
use log::debug;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// The server, from a client.
    Server,
    /// One client, from the server.
    Player(PlayerId),
    /// Every connected client.
    All,
    /// Every connected client but one.
    AllExcept(PlayerId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Outgoing {
    pub target: Target,
    pub message: Message,
}

/// Producer side of an endpoint's outbound queue. Cheap to clone, never blocks.
#[derive(Debug, Clone)]
pub struct OutboundQueue {
    tx: mpsc::UnboundedSender<Outgoing>,
}

pub type OutboundReceiver = mpsc::UnboundedReceiver<Outgoing>;

impl OutboundQueue {
    pub fn channel() -> (Self, OutboundReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn push(&self, target: Target, message: Message) {
        if self.tx.send(Outgoing { target, message }).is_err() {
            debug!("Outbound queue closed, dropping message");
        }
    }

    pub fn to_server(&self, message: Message) {
        self.push(Target::Server, message);
    }

    pub fn to_player(&self, player: PlayerId, message: Message) {
        self.push(Target::Player(player), message);
    }

    pub fn broadcast(&self, message: Message) {
        self.push(Target::All, message);
    }

    /// Routes an accepted client message according to its rebroadcast policy.
    pub fn relay(&self, from: PlayerId, message: Message) {
        match policy(message.kind()).rebroadcast {
            Rebroadcast::ToAll => self.push(Target::All, message),
            Rebroadcast::ExceptSender => self.push(Target::AllExcept(from), message),
            Rebroadcast::None => {}
        }
    }
}

/// Drains everything queued so far without waiting.
pub fn drain(rx: &mut OutboundReceiver) -> Vec<Outgoing> {
    let mut out = Vec::new();
    while let Ok(item) = rx.try_recv() {
        out.push(item);
    }
    out
}
