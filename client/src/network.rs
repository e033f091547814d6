//! Client network layer: one TCP connection to the server and the local loop

use crate::config::ClientConfig;
use crate::gui::NetworkedGui;
use crate::handler::ClientHandler;
use crate::hud::HudState;
use log::{debug, error, info, warn};
use shared::codec::{read_message, write_message};
use shared::outbound::drain;
use shared::{
    dispatch, CodecError, GuiObserver, Message, OutboundQueue, OutboundReceiver, Target,
    SERVER_PEER,
};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Events sent from the reader task to the client loop
#[derive(Debug)]
pub enum ClientEvent {
    Received(Message),
    Disconnected,
}

pub struct Client {
    server_addr: SocketAddr,
    writer: OwnedWriteHalf,
    reader: JoinHandle<()>,
    events: mpsc::UnboundedReceiver<ClientEvent>,
    pending: Vec<ClientEvent>,

    handler: ClientHandler,
    queue: OutboundQueue,
    outbound: OutboundReceiver,
    connected: bool,
    last_received: Instant,

    tick_duration: Duration,
    ping_interval: Duration,
    server_timeout: Duration,
}

impl Client {
    /// Connects to the server and asks to join under `config.name`.
    pub async fn connect(config: ClientConfig) -> Result<Self, Box<dyn std::error::Error>> {
        info!("Connecting to {}...", config.server_addr);
        let stream = TcpStream::connect(&config.server_addr).await?;
        if let Err(e) = stream.set_nodelay(true) {
            warn!("Failed to set TCP_NODELAY: {}", e);
        }
        let server_addr = stream.peer_addr()?;
        let (read_half, writer) = stream.into_split();

        let (events_tx, events) = mpsc::unbounded_channel();
        let reader = tokio::spawn(Self::read_loop(read_half, events_tx));

        let (queue, outbound) = OutboundQueue::channel();
        let handler = ClientHandler::new(
            config.max_entities,
            queue.clone(),
            HudState::new(config.low_graphics),
        );

        let mut client = Client {
            server_addr,
            writer,
            reader,
            events,
            pending: Vec::new(),
            handler,
            queue,
            outbound,
            connected: true,
            last_received: Instant::now(),
            tick_duration: config.tick_duration,
            ping_interval: config.ping_interval,
            server_timeout: config.server_timeout,
        };

        client.gui().start_game(&config.name);
        client.flush().await?;
        info!("Connected to {}", server_addr);
        Ok(client)
    }

    pub fn server_addr(&self) -> SocketAddr {
        self.server_addr
    }

    pub fn handler(&self) -> &ClientHandler {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut ClientHandler {
        &mut self.handler
    }

    pub fn queue(&self) -> &OutboundQueue {
        &self.queue
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Binding for the presentation layer; requests go out on the next step.
    pub fn gui(&self) -> NetworkedGui {
        NetworkedGui::new(self.queue.clone(), self.handler.local_player())
    }

    async fn read_loop(mut reader: OwnedReadHalf, events: mpsc::UnboundedSender<ClientEvent>) {
        loop {
            match read_message(&mut reader).await {
                Ok(message) => {
                    if events.send(ClientEvent::Received(message)).is_err() {
                        return;
                    }
                }
                Err(
                    e @ (CodecError::VersionMismatch { .. }
                    | CodecError::Bincode(_)
                    | CodecError::Truncated),
                ) => {
                    warn!("Dropping undecodable frame from server: {}", e);
                }
                Err(CodecError::ConnectionClosed) => {
                    info!("Server closed the connection");
                    break;
                }
                Err(e) => {
                    error!("Connection to server failed: {}", e);
                    break;
                }
            }
        }
        let _ = events.send(ClientEvent::Disconnected);
    }

    fn collect_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            self.pending.push(event);
        }
    }

    fn apply_pending(&mut self) {
        for event in std::mem::take(&mut self.pending) {
            match event {
                ClientEvent::Received(message) => {
                    self.last_received = Instant::now();
                    let kind = message.kind();
                    if let Err(e) = dispatch(&mut self.handler, SERVER_PEER, message) {
                        warn!("Dropped {} from server: {}", kind, e);
                    }
                }
                ClientEvent::Disconnected => self.mark_disconnected(),
            }
        }
    }

    fn mark_disconnected(&mut self) {
        if self.connected {
            info!("Disconnected from {}", self.server_addr);
            self.connected = false;
            self.handler.disconnected();
        }
    }

    /// Gives up on a server that has sent nothing for longer than the
    /// configured timeout, as if the connection had closed.
    fn check_timeout(&mut self) {
        if self.connected && self.last_received.elapsed() > self.server_timeout {
            warn!(
                "No data from {} for {:?}, disconnecting",
                self.server_addr, self.server_timeout
            );
            self.reader.abort();
            self.mark_disconnected();
        }
    }

    /// Writes every queued request to the server
    async fn flush(&mut self) -> Result<(), CodecError> {
        for entry in drain(&mut self.outbound) {
            if entry.target != Target::Server {
                debug!("Ignoring {} addressed to {:?}", entry.message.kind(), entry.target);
                continue;
            }
            if !self.connected {
                debug!("Not connected, dropping {}", entry.message.kind());
                continue;
            }
            write_message(&mut self.writer, &entry.message).await?;
        }
        Ok(())
    }

    /// One step: apply what arrived, advance local state, send requests.
    pub async fn step(&mut self, dt: f32) {
        self.collect_events();
        self.apply_pending();
        self.check_timeout();
        self.handler.tick(dt);
        if let Err(e) = self.flush().await {
            warn!("Failed to send to server: {}", e);
            self.mark_disconnected();
        }
    }

    /// Waits up to `timeout` for traffic, then steps once. Returns whether
    /// anything arrived.
    pub async fn pump(&mut self, timeout: Duration) -> bool {
        if let Ok(event) = tokio::time::timeout(timeout, self.events.recv()).await {
            self.pending.push(event.unwrap_or(ClientEvent::Disconnected));
        }
        let received = !self.pending.is_empty();
        self.step(0.0).await;
        received
    }

    /// Pumps until `condition` holds for the handler or `timeout` passes.
    pub async fn wait_for<F>(&mut self, timeout: Duration, condition: F) -> bool
    where
        F: Fn(&ClientHandler) -> bool,
    {
        let deadline = Instant::now() + timeout;
        loop {
            if condition(&self.handler) {
                return true;
            }
            let now = Instant::now();
            if now >= deadline || !self.connected {
                return false;
            }
            self.pump((deadline - now).min(self.tick_duration)).await;
        }
    }

    /// Interprets one line of user input. Returns `false` to quit.
    pub fn handle_input(&mut self, line: &str) -> bool {
        match line.trim() {
            "" => {}
            "/quit" => return false,
            "/save" => self.handler.request_save(),
            "/ping" => match self.handler.ping_ms() {
                Some(ms) => info!("Ping: {} ms", ms),
                None => info!("Ping: unknown"),
            },
            text => self.gui().send_chat(text),
        }
        true
    }

    /// Closes the connection; any half-received batch is dropped.
    pub async fn disconnect(&mut self) {
        if let Err(e) = self.writer.shutdown().await {
            debug!("Socket shutdown failed: {}", e);
        }
        self.reader.abort();
        self.mark_disconnected();
    }

    /// Main client loop, fed with user input lines until the connection ends.
    pub async fn run(
        &mut self,
        mut input: mpsc::UnboundedReceiver<String>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let mut tick_interval = interval(self.tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut ping_interval = interval(self.ping_interval);
        ping_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_tick = Instant::now();
        let mut input_open = true;

        while self.connected {
            tokio::select! {
                event = self.events.recv() => {
                    self.pending.push(event.unwrap_or(ClientEvent::Disconnected));
                },

                line = input.recv(), if input_open => {
                    match line {
                        Some(line) => {
                            if !self.handle_input(&line) {
                                break;
                            }
                        }
                        None => input_open = false,
                    }
                },

                _ = tick_interval.tick() => {
                    let now = Instant::now();
                    let dt = now.duration_since(last_tick).as_secs_f32();
                    last_tick = now;
                    self.step(dt).await;
                },

                _ = ping_interval.tick() => {
                    self.handler.ping();
                },
            }
        }

        self.step(0.0).await;
        self.disconnect().await;
        Ok(())
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{PlayerJoined, PlayerSetup};
    use tokio::net::TcpListener;

    async fn accept_one() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        (listener, addr)
    }

    #[tokio::test]
    async fn test_connect_requests_join() {
        let (listener, addr) = accept_one().await;
        let config = ClientConfig {
            server_addr: addr,
            name: "Alice".into(),
            ..ClientConfig::default()
        };
        let (client, accepted) = tokio::join!(Client::connect(config), listener.accept());
        let client = client.unwrap();
        let (mut stream, _) = accepted.unwrap();

        let first = read_message(&mut stream).await.unwrap();
        assert_eq!(first, Message::PlayerSetup(PlayerSetup { name: "Alice".into() }));
        assert!(client.is_connected());
    }

    #[tokio::test]
    async fn test_messages_applied_on_step() {
        let (listener, addr) = accept_one().await;
        let config = ClientConfig {
            server_addr: addr,
            ..ClientConfig::default()
        };
        let (client, accepted) = tokio::join!(Client::connect(config), listener.accept());
        let mut client = client.unwrap();
        let (mut stream, _) = accepted.unwrap();

        write_message(&mut stream, &Message::AddEntity(shared::EntityRef::new(
            7,
            shared::EntityKind::Player,
            &shared::EntityState::at(shared::Vec3::ZERO),
        )))
        .await
        .unwrap();
        write_message(&mut stream, &Message::AddEntityFinish).await.unwrap();
        write_message(
            &mut stream,
            &Message::PlayerJoined(PlayerJoined {
                player_id: 1,
                name: "Player".into(),
                entity_id: 7,
                local: true,
            }),
        )
        .await
        .unwrap();

        let joined = client
            .wait_for(Duration::from_secs(2), |h| h.local_player() == Some(1))
            .await;
        assert!(joined);
        assert!(client.handler().world().entity(7).is_some());
    }

    #[tokio::test]
    async fn test_server_close_discards_state() {
        let (listener, addr) = accept_one().await;
        let config = ClientConfig {
            server_addr: addr,
            ..ClientConfig::default()
        };
        let (client, accepted) = tokio::join!(Client::connect(config), listener.accept());
        let mut client = client.unwrap();
        let (stream, _) = accepted.unwrap();
        drop(stream);

        let gone = client
            .wait_for(Duration::from_secs(2), |_| false)
            .await;
        assert!(!gone);
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn test_silent_server_times_out() {
        let (listener, addr) = accept_one().await;
        let config = ClientConfig {
            server_addr: addr,
            tick_duration: Duration::from_millis(10),
            server_timeout: Duration::from_millis(150),
            ..ClientConfig::default()
        };
        let (client, accepted) = tokio::join!(Client::connect(config), listener.accept());
        let mut client = client.unwrap();
        let (mut stream, _) = accepted.unwrap();

        // Half a batch, then nothing while the socket stays open.
        write_message(&mut stream, &Message::AddEntity(shared::EntityRef::new(
            7,
            shared::EntityKind::Mob,
            &shared::EntityState::at(shared::Vec3::ZERO),
        )))
        .await
        .unwrap();
        assert!(
            client
                .wait_for(Duration::from_secs(2), |h| h.sync().pending_len() == 1)
                .await
        );
        assert!(client.is_connected());

        let started = Instant::now();
        assert!(!client.wait_for(Duration::from_secs(3), |_| false).await);
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(!client.is_connected());
        assert_eq!(client.handler().sync().pending_len(), 0);
        assert_eq!(client.handler().world().entity_count(), 0);
        drop(stream);
    }

    #[tokio::test]
    async fn test_quit_and_save_input() {
        let (listener, addr) = accept_one().await;
        let config = ClientConfig {
            server_addr: addr,
            ..ClientConfig::default()
        };
        let (client, accepted) = tokio::join!(Client::connect(config), listener.accept());
        let mut client = client.unwrap();
        let (mut stream, _) = accepted.unwrap();
        let _setup = read_message(&mut stream).await.unwrap();

        assert!(client.handle_input("/save"));
        assert!(!client.handle_input("/quit"));
        client.step(0.0).await;
        assert_eq!(read_message(&mut stream).await.unwrap(), Message::ServerSave);
    }
}
