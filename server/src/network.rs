//! Server network layer: TCP connections and the fixed-step simulation loop

use crate::client_manager::ClientManager;
use crate::config::ServerConfig;
use crate::game;
use crate::handler::ServerHandler;
use crate::save::SaveCoordinator;
use log::{debug, error, info, warn};
use shared::codec::{read_message, write_message};
use shared::outbound::drain;
use shared::{
    dispatch, CodecError, FileStore, Message, OutboundQueue, OutboundReceiver, Persistence,
    PersistenceError, PlayerId, PlayerRegistry, World,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, RwLock};
use tokio::time::{interval, MissedTickBehavior};

/// Messages sent from network tasks to the main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived {
        client_id: PlayerId,
        message: Message,
    },
    ClientDisconnected {
        client_id: PlayerId,
    },
    ClientTimeout {
        client_id: PlayerId,
    },
    Shutdown,
}

/// Inbound work buffered until the start of the next tick
#[derive(Debug)]
enum Inbound {
    Packet { client_id: PlayerId, message: Message },
    Left { client_id: PlayerId },
}

/// Stops a running server from another task.
#[derive(Debug, Clone)]
pub struct ServerHandle {
    tx: mpsc::UnboundedSender<ServerMessage>,
}

impl ServerHandle {
    pub fn shutdown(&self) {
        if self.tx.send(ServerMessage::Shutdown).is_err() {
            debug!("Server already stopped");
        }
    }
}

/// Main server coordinating connections and the world simulation
pub struct Server {
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    clients: Arc<RwLock<ClientManager>>,
    handler: ServerHandler,
    outbound: OutboundReceiver,
    pending: Vec<Inbound>,
    tick_duration: Duration,
    heartbeat_timeout: Duration,

    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Server {
    /// Binds the listener and loads the saved world, or seeds a new one.
    pub async fn new(config: ServerConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(&config.bind_addr).await?;
        let local_addr = listener.local_addr()?;
        info!("Server listening on {}", local_addr);

        let store: Arc<dyn Persistence> = Arc::new(FileStore::new(&config.save_dir));
        if config.clean_save {
            info!("Discarding saved world '{}'", config.save_location);
            store.delete(&config.save_location)?;
        }

        let mut world = World::new(config.max_entities);
        let mut registry = PlayerRegistry::new();
        match store.load(&config.save_location) {
            Ok(snapshot) => {
                world.restore(snapshot.world)?;
                registry = snapshot.registry;
                info!(
                    "Loaded saved world: {} entities, {} known players",
                    world.entity_count(),
                    registry.len()
                );
            }
            Err(PersistenceError::NotFound(_)) => seed(&mut world, &config)?,
            Err(e) => {
                warn!("Saved world unreadable ({}), starting fresh", e);
                seed(&mut world, &config)?;
            }
        }

        let mut clients = ClientManager::new(config.max_clients, config.heartbeat_timeout);
        if let Some(highest) = registry.iter().map(|record| record.id).max() {
            clients.reserve_ids_through(highest);
        }

        let (queue, outbound) = OutboundQueue::channel();
        let saves = SaveCoordinator::new(store, config.save_location.clone());
        let handler = ServerHandler::new(world, registry, queue, saves);
        let (server_tx, server_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener: Some(listener),
            local_addr,
            clients: Arc::new(RwLock::new(clients)),
            handler,
            outbound,
            pending: Vec::new(),
            tick_duration: config.tick_duration,
            heartbeat_timeout: config.heartbeat_timeout,
            server_tx,
            server_rx,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            tx: self.server_tx.clone(),
        }
    }

    pub fn handler(&self) -> &ServerHandler {
        &self.handler
    }

    /// Spawns the task accepting new connections
    fn spawn_acceptor(&mut self) -> std::io::Result<()> {
        let listener = self.listener.take().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::Other, "server is already running")
        })?;
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        Self::spawn_connection(stream, addr, &clients, &server_tx).await;
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
        Ok(())
    }

    /// Registers a connection and spawns its reader and writer tasks
    async fn spawn_connection(
        stream: TcpStream,
        addr: SocketAddr,
        clients: &Arc<RwLock<ClientManager>>,
        server_tx: &mpsc::UnboundedSender<ServerMessage>,
    ) {
        if let Err(e) = stream.set_nodelay(true) {
            warn!("Failed to set TCP_NODELAY for {}: {}", addr, e);
        }
        let (read_half, write_half) = stream.into_split();
        let (writer_tx, writer_rx) = mpsc::unbounded_channel();

        let client_id = {
            let mut clients_guard = clients.write().await;
            clients_guard.add_client(addr, writer_tx)
        };
        let Some(client_id) = client_id else {
            warn!("Rejecting connection from {}: server full", addr);
            return;
        };

        tokio::spawn(Self::write_loop(client_id, write_half, writer_rx));
        let reader = tokio::spawn(Self::read_loop(
            client_id,
            read_half,
            Arc::clone(clients),
            server_tx.clone(),
        ));
        clients
            .write()
            .await
            .attach_reader(client_id, reader.abort_handle());
    }

    /// Decodes frames from one connection and forwards them to the main loop
    async fn read_loop(
        client_id: PlayerId,
        mut reader: OwnedReadHalf,
        clients: Arc<RwLock<ClientManager>>,
        server_tx: mpsc::UnboundedSender<ServerMessage>,
    ) {
        loop {
            match read_message(&mut reader).await {
                Ok(message) => {
                    clients.write().await.touch(client_id);
                    if let Err(e) = server_tx.send(ServerMessage::PacketReceived { client_id, message }) {
                        error!("Failed to send packet to main loop: {}", e);
                        return;
                    }
                }
                // The frame boundary is intact, so only this message is lost.
                Err(
                    e @ (CodecError::VersionMismatch { .. }
                    | CodecError::Bincode(_)
                    | CodecError::Truncated),
                ) => {
                    clients.write().await.touch(client_id);
                    warn!("Dropping undecodable frame from client {}: {}", client_id, e);
                }
                Err(CodecError::ConnectionClosed) => {
                    debug!("Client {} closed the connection", client_id);
                    break;
                }
                Err(e) => {
                    warn!("Connection to client {} failed: {}", client_id, e);
                    break;
                }
            }
        }

        if let Err(e) = server_tx.send(ServerMessage::ClientDisconnected { client_id }) {
            error!("Failed to send disconnect to main loop: {}", e);
        }
    }

    /// Writes queued messages to one connection until its queue is closed
    async fn write_loop(
        client_id: PlayerId,
        mut writer: OwnedWriteHalf,
        mut rx: mpsc::UnboundedReceiver<Message>,
    ) {
        while let Some(message) = rx.recv().await {
            if let Err(e) = write_message(&mut writer, &message).await {
                warn!("Failed to send {} to client {}: {}", message.kind(), client_id, e);
                break;
            }
        }
        if let Err(e) = writer.shutdown().await {
            debug!("Shutdown of client {} socket failed: {}", client_id, e);
        }
    }

    /// Spawns task that reports connections silent for too long
    fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();
        let period = (self.heartbeat_timeout / 2).clamp(Duration::from_millis(10), Duration::from_secs(1));

        tokio::spawn(async move {
            let mut interval = interval(period);

            loop {
                interval.tick().await;

                let timed_out = {
                    let clients_guard = clients.read().await;
                    clients_guard.check_timeouts()
                };

                for client_id in timed_out {
                    if let Err(e) = server_tx.send(ServerMessage::ClientTimeout { client_id }) {
                        error!("Failed to send timeout message: {}", e);
                        return;
                    }
                }
            }
        });
    }

    /// Applies everything received since the last tick, in arrival order
    async fn apply_pending(&mut self) {
        for inbound in std::mem::take(&mut self.pending) {
            match inbound {
                Inbound::Packet { client_id, message } => {
                    if !self.clients.read().await.contains(client_id) {
                        debug!("Dropping {} from departed client {}", message.kind(), client_id);
                        continue;
                    }
                    let kind = message.kind();
                    if let Err(e) = dispatch(&mut self.handler, client_id, message) {
                        warn!("Dropped {} from client {}: {}", kind, client_id, e);
                    }
                }
                Inbound::Left { client_id } => {
                    let removed = self.clients.write().await.remove_client(&client_id);
                    if removed {
                        self.handler.disconnect(client_id);
                    }
                }
            }
        }
    }

    /// Routes everything hooks and handlers queued to the connection writers
    async fn flush(&mut self) {
        let outgoing = drain(&mut self.outbound);
        if outgoing.is_empty() {
            return;
        }
        let clients = self.clients.read().await;
        for entry in outgoing {
            clients.route(entry);
        }
    }

    /// One fixed step: apply inbound, advance the world, send what it produced
    async fn step(&mut self, dt: f32) {
        self.apply_pending().await;
        self.handler.tick(dt);
        self.flush().await;
    }

    /// Main server loop
    pub async fn run(&mut self) -> std::io::Result<()> {
        self.spawn_acceptor()?;
        self.spawn_timeout_checker();

        let mut tick_interval = interval(self.tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_tick = Instant::now();
        let mut tick: u64 = 0;

        info!("Server started successfully");

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { client_id, message }) => {
                            self.pending.push(Inbound::Packet { client_id, message });
                        }
                        Some(ServerMessage::ClientDisconnected { client_id }) => {
                            self.pending.push(Inbound::Left { client_id });
                        }
                        Some(ServerMessage::ClientTimeout { client_id }) => {
                            info!("Client {} timed out", client_id);
                            self.pending.push(Inbound::Left { client_id });
                        }
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                _ = tick_interval.tick() => {
                    let now = Instant::now();
                    let dt = now.duration_since(last_tick).as_secs_f32();
                    last_tick = now;

                    self.step(dt).await;
                    tick += 1;

                    if tick % 600 == 0 {
                        let client_count = self.clients.read().await.len();
                        debug!(
                            "Tick {}: {} clients, {} entities, {:.1}h",
                            tick,
                            client_count,
                            self.handler.world().entity_count(),
                            self.handler.world().time_of_day()
                        );
                    }
                },
            }
        }

        self.step(0.0).await;
        self.handler.shutdown();
        Ok(())
    }
}

fn seed(world: &mut World, config: &ServerConfig) -> Result<(), shared::WorldError> {
    if config.test_map {
        game::seed_test_map(world)
    } else {
        game::seed_random(world, config.seed)
    }
}
