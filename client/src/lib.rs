//! # World Sync Client Library
//!
//! Client-side endpoint of the world-synchronization layer. A client keeps a
//! replica of the server's world, applies everything the server announces,
//! and turns the local player's actions into requests.
//!
//! ## Architecture Overview
//!
//! The client never decides shared state on its own. It mutates its replica
//! optimistically for the local player and lets the server's confirmations
//! and corrections win.
//!
//! ### Remote Application
//! Every inbound message goes through [`shared::dispatch`] into
//! [`handler::ClientHandler`]. Changes are applied with remote provenance, so
//! world hooks stay silent and nothing received is sent back.
//!
//! ### Reactive Requests
//! Local actions (equipping, activating, picking up, declaring a win) mutate
//! the world with local provenance. [`observer::ReactiveObserver`] sees those
//! mutations and queues the matching request for the server.
//!
//! ### Phased Entity Creation
//! Entities arrive as a run of `AddEntity` messages closed by
//! `AddEntityFinish`. [`entity_sync::EntitySyncController`] keeps the run out
//! of the world until it closes, then applies all of it or none of it.
//!
//! ### Position Correction
//! Remote entities take the server's position directly. The local player is
//! only pulled back when the server disagrees by more than
//! [`handler::CORRECTION_THRESHOLD`], and then only halfway per update.
//!
//! ## Module Organization
//!
//! - `config`: [`ClientConfig`] built by the launcher
//! - `entity_sync`: all-or-nothing entity batches
//! - `gui`: [`gui::NetworkedGui`] and the single-participant [`gui::LocalGui`]
//! - `handler`: per-kind interpretation of server messages
//! - `hud`: chat log, container and end-of-game state for the interface
//! - `network`: TCP connection, reader task and the client loop
//! - `observer`: hooks that turn local actions into requests
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::{Client, ClientConfig};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig {
//!     server_addr: "127.0.0.1:8080".to_string(),
//!     name: "Alice".to_string(),
//!     ..ClientConfig::default()
//! };
//! let mut client = Client::connect(config).await?;
//!
//! // Wait until the server has placed us in the world
//! client
//!     .wait_for(Duration::from_secs(5), |h| h.local_player().is_some())
//!     .await;
//! client.handle_input("hello everyone");
//! client.step(0.05).await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod entity_sync;
pub mod gui;
pub mod handler;
pub mod hud;
pub mod network;
pub mod observer;

pub use config::ClientConfig;
pub use network::{Client, ClientEvent};
