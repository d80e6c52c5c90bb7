//! # Growth Arena Server
//!
//! Authoritative server for a multiplayer "growth" arena. Players steer a
//! circle around a wrapping world, absorb food (and, in PVP rooms, smaller
//! players) to grow, and compete on a per-room leaderboard. Clients only send
//! intentions; every position, radius and score is decided here.
//!
//! ## Architecture
//!
//! ### Session Gateway (`network`)
//! Owns the UDP socket and the session table. It accepts connections, hands
//! out client ids, lists rooms, routes join/move/chat/update requests to the
//! right room and keeps live player counts flowing to every client.
//!
//! ### Rooms (`room`, `room_task`)
//! Each room is an independent world driven by its own tokio task. Requests
//! reach a room as messages and are applied between ticks, so a tick always
//! sees a consistent entity store. A tick integrates movement, advances bots,
//! resolves consumption, tops up food and broadcasts a snapshot to members.
//!
//! ### Simulation building blocks
//! - `world`: vector math, world extent and coordinate wrapping
//! - `entity`: the per-room entity store with creation-ordered iteration
//! - `food`: bounded food replenishment
//! - `collision`: food and player consumption with the growth rules
//! - `bots`: pluggable bot movement
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = Server::new(ServerConfig::default()).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! The gateway runs these tasks next to the rooms:
//! - **Network Receiver**: decodes incoming datagrams
//! - **Network Sender**: encodes and delivers unicast, room and server-wide packets
//! - **Timeout Checker**: drops sessions that went silent

pub mod bots;
pub mod client_manager;
pub mod collision;
pub mod config;
pub mod entity;
pub mod error;
pub mod food;
pub mod network;
pub mod room;
pub mod room_task;
pub mod utils;
pub mod world;
