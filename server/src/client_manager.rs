//! Connection management for the authoritative server
//!
//! This module tracks every open TCP connection, including:
//! - Connection lifecycle (accept, disconnect, heartbeat timeout)
//! - Player id minting, one id per connection
//! - Routing of outbound messages to per-connection writer tasks
//!
//! Connections are identified by the player id minted when they are
//! accepted. That id is the `from` value every inbound message is
//! dispatched with, so two connections can never share an identity.

use log::{debug, info};
use shared::{Message, Outgoing, PlayerId, Target};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

/// One accepted connection
#[derive(Debug)]
pub struct Client {
    /// Player id assigned by the server
    pub id: PlayerId,
    /// Remote address, for logging
    pub addr: SocketAddr,
    /// Last time any frame arrived from this connection
    pub last_seen: Instant,
    /// Queue feeding this connection's writer task
    writer: mpsc::UnboundedSender<Message>,
    /// Reader task, aborted when the connection is dropped by the server
    reader: Option<AbortHandle>,
}

impl Client {
    pub fn new(id: PlayerId, addr: SocketAddr, writer: mpsc::UnboundedSender<Message>) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
            writer,
            reader: None,
        }
    }

    /// Returns true if nothing has been received within `timeout`
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }

    /// Queues a message for the writer task. Returns false once the writer is gone.
    pub fn send(&self, message: Message) -> bool {
        self.writer.send(message).is_ok()
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

/// Owns the set of live connections
///
/// Shared between the accept task, reader tasks, the timeout checker and the
/// simulation loop behind a `tokio::sync::RwLock`. It never touches world
/// state.
pub struct ClientManager {
    /// Live connections indexed by player id
    clients: HashMap<PlayerId, Client>,
    /// Next player id to hand out
    next_client_id: PlayerId,
    /// Maximum number of concurrent connections
    max_clients: usize,
    /// Silence after which a connection counts as lost
    timeout: Duration,
}

impl ClientManager {
    /// Creates an empty manager. Player ids start at 1; 0 is reserved for the server.
    pub fn new(max_clients: usize, timeout: Duration) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
            timeout,
        }
    }

    /// Skips ids that may still appear in restored state.
    pub fn reserve_ids_through(&mut self, id: PlayerId) {
        self.next_client_id = self.next_client_id.max(id + 1);
    }

    /// Registers a new connection
    ///
    /// Returns the minted player id, or None if the server is at capacity.
    pub fn add_client(
        &mut self,
        addr: SocketAddr,
        writer: mpsc::UnboundedSender<Message>,
    ) -> Option<PlayerId> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        info!("Client {} connected from {}", client_id, addr);
        self.clients
            .insert(client_id, Client::new(client_id, addr, writer));
        Some(client_id)
    }

    /// Attaches the reader task so it is stopped when the client is removed.
    pub fn attach_reader(&mut self, client_id: PlayerId, reader: AbortHandle) {
        match self.clients.get_mut(&client_id) {
            Some(client) => client.reader = Some(reader),
            None => reader.abort(),
        }
    }

    /// Removes a connection
    ///
    /// Dropping the client closes its writer queue, which ends the writer task
    /// and shuts the socket. Returns false if the client was already gone.
    pub fn remove_client(&mut self, client_id: &PlayerId) -> bool {
        if let Some(client) = self.clients.remove(client_id) {
            info!("Client {} ({}) disconnected", client.id, client.addr);
            true
        } else {
            false
        }
    }

    /// Marks a connection as alive
    pub fn touch(&mut self, client_id: PlayerId) {
        if let Some(client) = self.clients.get_mut(&client_id) {
            client.last_seen = Instant::now();
        }
    }

    /// Ids of connections that have been silent for longer than the timeout
    ///
    /// The connections are not removed here; the simulation loop removes
    /// them after running disconnect cleanup.
    pub fn check_timeouts(&self) -> Vec<PlayerId> {
        let mut timed_out: Vec<PlayerId> = self
            .clients
            .values()
            .filter(|client| client.is_timed_out(self.timeout))
            .map(|client| client.id)
            .collect();
        timed_out.sort_unstable();
        timed_out
    }

    /// Delivers one outbound entry to the connections its target names
    pub fn route(&self, outgoing: Outgoing) {
        let Outgoing { target, message } = outgoing;
        match target {
            Target::Player(id) => self.send_to(id, message),
            Target::All => {
                for client in self.clients.values() {
                    client.send(message.clone());
                }
            }
            Target::AllExcept(excluded) => {
                for client in self.clients.values().filter(|c| c.id != excluded) {
                    client.send(message.clone());
                }
            }
            Target::Server => {
                debug!("Dropping {} addressed to the server itself", message.kind());
            }
        }
    }

    pub fn send_to(&self, client_id: PlayerId, message: Message) {
        match self.clients.get(&client_id) {
            Some(client) => {
                if !client.send(message) {
                    debug!("Writer for client {} already closed", client_id);
                }
            }
            None => debug!(
                "Dropping {} for departed client {}",
                message.kind(),
                client_id
            ),
        }
    }

    pub fn contains(&self, client_id: PlayerId) -> bool {
        self.clients.contains_key(&client_id)
    }

    pub fn ids(&self) -> Vec<PlayerId> {
        let mut ids: Vec<PlayerId> = self.clients.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
