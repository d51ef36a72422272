//! # Game Server Library
//!
//! This library provides the authoritative server implementation for the
//! multiplayer tag arena. It manages game rooms, runs the fixed-rate match
//! simulation, and broadcasts updates to keep every connected client
//! synchronized with the server's canonical state.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! The server runs the definitive version of each match. Movement, tagging,
//! orb collection, scoring, and the countdown timer are all resolved here.
//! Clients only send intents; they receive and render the server's state.
//!
//! ### Room Management
//! Players gather in rooms identified by short shareable codes. Each room
//! holds up to four players, with the creator acting as host. Rooms are
//! created and destroyed on demand and simulated independently.
//!
//! ### State Broadcasting
//! While a match runs, the room's simulation emits a snapshot every tick.
//! Snapshots and discrete events (tags, phase changes, match end) are routed
//! to exactly the clients seated in the room that produced them.
//!
//! ## Module Organization
//!
//! - `client_manager`: connection tracking, client IDs, heartbeat timeouts
//! - `registry`: room codes, room lifecycle, client-to-room lookup
//! - `session`: per-room match state and the fixed 60Hz tick loop
//! - `collision`: tag and orb overlap detection over a tick snapshot
//! - `bridge`: translates simulation events into outbound packets
//! - `network`: UDP socket handling and the main server event loop
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = Server::new("127.0.0.1:8080", 64).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod bridge;
pub mod client_manager;
pub mod collision;
pub mod network;
pub mod registry;
pub mod session;
pub mod utils;
