//! Integration tests for the networked world-sync components
//!
//! These tests run a real server on localhost and talk to it either through
//! the client library or through bare framed connections that record every
//! message they receive.

use assert_approx_eq::assert_approx_eq;
use client::{Client, ClientConfig};
use server::{Server, ServerConfig, ServerHandle};
use shared::codec::{read_message, write_message};
use shared::{
    timestamp_millis, Attack, Chat, ChestAccess, ChestOutcome, EntityId, Message, PlayerId, Ping,
    PlayerSetup, Vec3,
};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(3);
const QUIET: Duration = Duration::from_millis(200);
const PING_EVERY: Duration = Duration::from_millis(50);

/// Chest ids of the fixed test layout.
const CHEST_A: EntityId = 1;

struct TestServer {
    addr: String,
    handle: ServerHandle,
    task: JoinHandle<std::io::Result<()>>,
}

impl TestServer {
    async fn start(tag: &str) -> Self {
        Self::start_with(tag, |_| {}).await
    }

    async fn start_with(tag: &str, customize: impl FnOnce(&mut ServerConfig)) -> Self {
        let save_dir: PathBuf = std::env::temp_dir()
            .join(format!("worldsync-it-{}-{}", tag, std::process::id()));
        let mut config = ServerConfig {
            bind_addr: "127.0.0.1:0".to_string(),
            tick_duration: Duration::from_millis(5),
            save_dir,
            clean_save: true,
            test_map: true,
            ..ServerConfig::default()
        };
        customize(&mut config);
        let mut server = Server::new(config).await.unwrap();
        let addr = server.local_addr().to_string();
        let handle = server.handle();
        let task = tokio::spawn(async move { server.run().await });
        TestServer { addr, handle, task }
    }

    async fn stop(self) {
        self.handle.shutdown();
        let result = timeout(WAIT, self.task).await;
        assert!(matches!(result, Ok(Ok(Ok(())))));
    }

    fn client_config(&self, name: &str) -> ClientConfig {
        ClientConfig {
            server_addr: self.addr.clone(),
            name: name.to_string(),
            ..ClientConfig::default()
        }
    }
}

/// Bare connection speaking the wire protocol directly.
struct Peer {
    writer: OwnedWriteHalf,
    inbox: mpsc::UnboundedReceiver<Message>,
    player_id: PlayerId,
    entity_id: EntityId,
}

impl Peer {
    async fn join(addr: &str, name: &str) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (mut reader, writer) = stream.into_split();
        let (tx, inbox) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Ok(message) = read_message(&mut reader).await {
                if tx.send(message).is_err() {
                    break;
                }
            }
        });

        let mut peer = Peer {
            writer,
            inbox,
            player_id: 0,
            entity_id: 0,
        };
        peer.send(Message::PlayerSetup(PlayerSetup {
            name: name.to_string(),
        }))
        .await;
        let joined = peer
            .expect(|m| matches!(m, Message::PlayerJoined(j) if j.local))
            .await;
        if let Message::PlayerJoined(joined) = joined {
            peer.player_id = joined.player_id;
            peer.entity_id = joined.entity_id;
        }
        peer
    }

    async fn send(&mut self, message: Message) {
        write_message(&mut self.writer, &message).await.unwrap();
    }

    /// Next message matching `predicate`, skipping others.
    async fn expect(&mut self, predicate: impl Fn(&Message) -> bool) -> Message {
        let found = timeout(WAIT, async {
            while let Some(message) = self.inbox.recv().await {
                if predicate(&message) {
                    return Some(message);
                }
            }
            None
        })
        .await;
        match found {
            Ok(Some(message)) => message,
            _ => panic!("expected message did not arrive"),
        }
    }

    /// Like `expect`, but pings while waiting so the server keeps the
    /// connection when its heartbeat timeout is short.
    async fn expect_pinging(&mut self, predicate: impl Fn(&Message) -> bool) -> Message {
        let deadline = Instant::now() + WAIT;
        let mut next_ping = Instant::now();
        while Instant::now() < deadline {
            if Instant::now() >= next_ping {
                self.send(Message::Ping(Ping {
                    timestamp: timestamp_millis(),
                    reply: false,
                }))
                .await;
                next_ping = Instant::now() + PING_EVERY;
            }
            match timeout(PING_EVERY, self.inbox.recv()).await {
                Ok(Some(message)) if predicate(&message) => return message,
                Ok(None) => break,
                _ => {}
            }
        }
        panic!("expected message did not arrive");
    }

    /// Everything received until the connection has been quiet for a while.
    async fn drain(&mut self) -> Vec<Message> {
        let mut received = Vec::new();
        while let Ok(Some(message)) = timeout(QUIET, self.inbox.recv()).await {
            received.push(message);
        }
        received
    }
}

fn chest_reply(message: &Message, player: PlayerId, outcome: ChestOutcome) -> bool {
    matches!(message, Message::ChestAccess(c)
        if c.chest_id == CHEST_A && c.player_id == player && c.outcome == Some(outcome))
}

/// JOIN AND REPLICATION TESTS
mod join_tests {
    use super::*;

    #[tokio::test]
    async fn newcomer_receives_whole_world_as_one_batch() {
        let server = TestServer::start("batch").await;
        let mut alice = Client::connect(server.client_config("Alice")).await.unwrap();

        let ready = alice
            .wait_for(WAIT, |h| {
                h.local_entity().is_some() && h.world().entity_count() == 6
            })
            .await;
        assert!(ready);
        let world = alice.handler().world();
        assert_eq!(world.inventory(CHEST_A).map(|items| items.len()), Some(2));
        assert_eq!(world.items_on_ground().len(), 2);
        assert_eq!(alice.handler().registry().get_id("Alice"), alice.handler().local_player());

        drop(alice);
        server.stop().await;
    }

    #[tokio::test]
    async fn players_learn_about_each_other() {
        let server = TestServer::start("players").await;
        let mut alice = Client::connect(server.client_config("Alice")).await.unwrap();
        assert!(alice.wait_for(WAIT, |h| h.local_player().is_some()).await);

        let mut bob = Client::connect(server.client_config("Bob")).await.unwrap();
        assert!(
            bob.wait_for(WAIT, |h| h.registry().contains_name("Alice")
                && h.world().entity_count() == 7)
                .await
        );
        assert!(alice.wait_for(WAIT, |h| h.registry().contains_name("Bob")).await);
        assert_ne!(alice.handler().local_player(), bob.handler().local_player());

        drop((alice, bob));
        server.stop().await;
    }

    #[tokio::test]
    async fn movement_reaches_other_clients() {
        let server = TestServer::start("move").await;
        let mut alice = Client::connect(server.client_config("Alice")).await.unwrap();
        assert!(alice.wait_for(WAIT, |h| h.local_entity().is_some()).await);
        let mut bob = Client::connect(server.client_config("Bob")).await.unwrap();
        assert!(bob.wait_for(WAIT, |h| h.registry().contains_name("Alice")).await);

        let alice_entity = alice.handler().local_entity().unwrap();
        alice
            .handler_mut()
            .move_local(Vec3::new(1.5, 0.0, -2.0), 0.5)
            .unwrap();
        alice.step(0.0).await;

        let moved = bob
            .wait_for(WAIT, |h| {
                h.world()
                    .entity(alice_entity)
                    .map_or(false, |e| e.state.position.x == 1.5)
            })
            .await;
        assert!(moved);
        let heading = bob.handler().world().entity(alice_entity).unwrap().state.heading;
        assert_approx_eq!(heading, 0.5);

        drop((alice, bob));
        server.stop().await;
    }
}

/// RELAY POLICY TESTS
mod relay_tests {
    use super::*;

    #[tokio::test]
    async fn attack_relayed_without_echo() {
        let server = TestServer::start("attack").await;
        let mut alice = Peer::join(&server.addr, "Alice").await;
        let mut bob = Peer::join(&server.addr, "Bob").await;
        alice.drain().await;

        let attack = Message::Attack(Attack {
            player_id: alice.player_id,
        });
        alice.send(attack.clone()).await;

        assert_eq!(bob.expect(|m| matches!(m, Message::Attack(_))).await, attack);
        assert!(!alice.drain().await.iter().any(|m| matches!(m, Message::Attack(_))));

        server.stop().await;
    }

    #[tokio::test]
    async fn spoofed_attack_is_dropped() {
        let server = TestServer::start("spoof").await;
        let mut alice = Peer::join(&server.addr, "Alice").await;
        let mut bob = Peer::join(&server.addr, "Bob").await;
        bob.drain().await;

        alice
            .send(Message::Attack(Attack {
                player_id: bob.player_id,
            }))
            .await;
        assert!(!bob.drain().await.iter().any(|m| matches!(m, Message::Attack(_))));

        server.stop().await;
    }

    #[tokio::test]
    async fn public_chat_reaches_everyone_private_only_target() {
        let server = TestServer::start("chat").await;
        let mut alice = Peer::join(&server.addr, "Alice").await;
        let mut bob = Peer::join(&server.addr, "Bob").await;
        let mut carol = Peer::join(&server.addr, "Carol").await;

        let say = |text: &str| {
            Message::Chat(Chat {
                sender: String::new(),
                text: text.to_string(),
                private: false,
            })
        };

        alice.send(say("hello all")).await;
        for peer in [&mut alice, &mut bob, &mut carol] {
            let message = peer.expect(|m| matches!(m, Message::Chat(_))).await;
            assert!(matches!(message, Message::Chat(c)
                if c.sender == "Alice" && c.text == "hello all" && !c.private));
        }

        alice.send(say("/msg Bob psst")).await;
        let whisper = bob.expect(|m| matches!(m, Message::Chat(_))).await;
        assert!(matches!(whisper, Message::Chat(c)
            if c.sender == "Alice" && c.text == "psst" && c.private));
        assert!(!carol.drain().await.iter().any(|m| matches!(m, Message::Chat(_))));
        assert!(!alice.drain().await.iter().any(|m| matches!(m, Message::Chat(_))));

        server.stop().await;
    }
}

/// CONTAINER LOCK TESTS
mod chest_tests {
    use super::*;

    #[tokio::test]
    async fn chest_arbitration_between_two_players() {
        let server = TestServer::start("chest").await;
        let mut alice = Peer::join(&server.addr, "Alice").await;
        let mut bob = Peer::join(&server.addr, "Bob").await;
        let (a, b) = (alice.player_id, bob.player_id);

        alice.send(Message::ChestAccess(ChestAccess::request(CHEST_A, a, true))).await;
        alice.expect(|m| chest_reply(m, a, ChestOutcome::Opened)).await;
        bob.expect(|m| chest_reply(m, a, ChestOutcome::Opened)).await;

        bob.send(Message::ChestAccess(ChestAccess::request(CHEST_A, b, true))).await;
        bob.expect(|m| chest_reply(m, b, ChestOutcome::Denied)).await;
        assert!(!alice
            .drain()
            .await
            .iter()
            .any(|m| chest_reply(m, b, ChestOutcome::Denied)));

        alice.send(Message::ChestAccess(ChestAccess::request(CHEST_A, a, false))).await;
        bob.expect(|m| chest_reply(m, a, ChestOutcome::Closed)).await;

        bob.send(Message::ChestAccess(ChestAccess::request(CHEST_A, b, true))).await;
        bob.expect(|m| chest_reply(m, b, ChestOutcome::Opened)).await;

        server.stop().await;
    }

    #[tokio::test]
    async fn disconnect_releases_locks_and_removes_player() {
        let server = TestServer::start("leave").await;
        let mut alice = Peer::join(&server.addr, "Alice").await;
        let mut bob = Peer::join(&server.addr, "Bob").await;
        let (a, b, alice_entity) = (alice.player_id, bob.player_id, alice.entity_id);

        alice.send(Message::ChestAccess(ChestAccess::request(CHEST_A, a, true))).await;
        bob.expect(|m| chest_reply(m, a, ChestOutcome::Opened)).await;

        drop(alice);
        bob.expect(|m| chest_reply(m, a, ChestOutcome::Closed)).await;
        bob.expect(|m| matches!(m, Message::RemoveEntity(r) if r.entity_id == alice_entity))
            .await;

        bob.send(Message::ChestAccess(ChestAccess::request(CHEST_A, b, true))).await;
        bob.expect(|m| chest_reply(m, b, ChestOutcome::Opened)).await;

        // The name is free again and the newcomer does not inherit Alice's id.
        let again = Peer::join(&server.addr, "Alice").await;
        assert_ne!(again.player_id, a);

        server.stop().await;
    }
    #[tokio::test]
    async fn silent_connection_times_out_and_is_cleaned_up() {
        let server = TestServer::start_with("silent", |config| {
            config.heartbeat_timeout = Duration::from_millis(500);
        })
        .await;
        let mut alice = Peer::join(&server.addr, "Alice").await;
        let mut bob = Peer::join(&server.addr, "Bob").await;
        let (a, b, alice_entity) = (alice.player_id, bob.player_id, alice.entity_id);

        alice.send(Message::ChestAccess(ChestAccess::request(CHEST_A, a, true))).await;
        bob.expect_pinging(|m| chest_reply(m, a, ChestOutcome::Opened)).await;

        // The first peer keeps its socket open but never speaks again.
        bob.expect_pinging(|m| chest_reply(m, a, ChestOutcome::Closed)).await;
        bob.expect_pinging(|m| matches!(m, Message::RemoveEntity(r) if r.entity_id == alice_entity))
            .await;

        bob.send(Message::ChestAccess(ChestAccess::request(CHEST_A, b, true))).await;
        bob.expect_pinging(|m| chest_reply(m, b, ChestOutcome::Opened)).await;

        // The server hangs up on the silent side.
        let closed = timeout(WAIT, async { while alice.inbox.recv().await.is_some() {} }).await;
        assert!(closed.is_ok());

        server.stop().await;
    }
}
