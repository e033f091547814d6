//! # World Server Library
//!
//! This library provides the authoritative endpoint of the world
//! synchronization layer. It owns the canonical world, decides every
//! contested question (who holds a chest, which name belongs to which
//! player, where an entity really is) and relays the outcome to every
//! connected client.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! A single simulation loop owns the world, the player registry and the
//! container lock table. Clients only ever request changes; the server
//! validates, applies and rebroadcasts them according to each message
//! kind's authority policy.
//!
//! ### Connection Management
//! Handles the complete lifecycle of client connections including:
//! - Accepting TCP connections and minting one player id per connection
//! - Heartbeat tracking and timeout detection
//! - Disconnect cleanup: chest locks released, the player's entity removed
//!   and its registry record dropped
//!
//! ### Replication
//! Newcomers receive the whole world as one phased entity batch. Afterwards
//! every local world change reaches clients through the authoring world
//! observer, which queues a message at the moment of the mutation.
//!
//! ## Architecture Design
//!
//! ### Apply-Before-Tick Event Loop
//! Reader tasks forward decoded messages to the main loop, which buffers
//! them and applies them all at the start of the next fixed tick. The world
//! is then stepped and the outbound queue is drained to the per-connection
//! writer tasks. I/O tasks never touch world state.
//!
//! ### TCP-Based Communication
//! Each connection is a reliable, ordered stream carrying length-prefixed,
//! versioned frames (see `shared::codec`). Undecodable frames are dropped
//! without closing the connection.
//!
//! ## Module Organization
//!
//! ### Client Manager Module (`client_manager`)
//! Connection tracking, id assignment, timeout detection and message routing.
//!
//! ### Handler Module (`handler`)
//! The server's `PacketHandler`: one method per message kind, each the only
//! place that kind is interpreted on the server.
//!
//! ### Observer Module (`observer`)
//! The authoring `WorldObserver` turning entity, clock and effect changes
//! into broadcasts.
//!
//! ### Game Module (`game`)
//! World seeding, either the fixed test map or a random layout.
//!
//! ### Save Module (`save`)
//! Background saves with coalescing of requests that arrive mid-save.
//!
//! ### Network Module (`network`)
//! The TCP listener, per-connection tasks and the main loop.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig {
//!         bind_addr: "0.0.0.0:8080".to_string(),
//!         test_map: true,
//!         ..ServerConfig::default()
//!     };
//!     let mut server = Server::new(config).await?;
//!
//!     // Runs until shut down through a `ServerHandle`:
//!     // - accepts connections and reads their messages
//!     // - applies messages at the start of each tick, then steps the world
//!     // - flushes queued messages to the clients
//!     // - drops connections that stop sending heartbeats
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod config;
pub mod game;
pub mod handler;
pub mod network;
pub mod observer;
pub mod save;

pub use config::ServerConfig;
pub use network::{Server, ServerHandle};
