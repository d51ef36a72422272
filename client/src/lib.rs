//! # Game Client Library
//!
//! This library provides the client-side implementation for the multiplayer
//! tag arena. It handles the connection to the server, room creation and
//! joining, and smooth presentation of the authoritative match state.
//!
//! ## Architecture Overview
//!
//! The client is intentionally thin. The server owns every gameplay
//! decision; the client sends intents (movement, room actions) and renders
//! what the server reports. Two components make that rendering smooth:
//!
//! ### Snapshot Interpolation
//! Server snapshots arrive at the simulation tick rate, which does not line
//! up with the client's render cadence. The client buffers recent snapshots
//! and renders slightly in the past, blending entity positions between the
//! two snapshots that bracket each render time.
//!
//! ### Heartbeating
//! The connection is UDP, so the client periodically tells the server it is
//! still there. A client that goes quiet is timed out and removed from its
//! room by the server.
//!
//! ## Module Organization
//!
//! ### Interpolation Module (`interpolation`)
//! Snapshot buffering and time-based sampling:
//! - Fixed-size ring of timestamped snapshots
//! - Position blending between bracketing snapshots
//! - Clamping at both ends of the buffered window
//!
//! ### Network Module (`network`)
//! Manages all client-server communication:
//! - UDP socket management and connection handling
//! - Packet serialization and deserialization
//! - Room create/join negotiation
//! - Heartbeats and disconnect handling

pub mod interpolation;
pub mod network;
