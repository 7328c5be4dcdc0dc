//! # Breakshot Server Library
//!
//! Authoritative server for a two-player, turn-based pocketing game.
//! The server pairs waiting clients into isolated sessions, validates and
//! applies their move intents, advances a deterministic physics simulation,
//! arbitrates scoring and turn ownership, and broadcasts the resulting
//! state to both clients. Clients are pure renderers; every game decision
//! is made here.
//!
//! ## Architecture Design
//!
//! ### Single-Threaded Session Handling
//! One event loop owns the whole session table: inbound packets and the
//! tick interval are multiplexed through a `select!`, so tick handling and
//! move handling for a given session never interleave. Sessions share no
//! state with each other, and a session that loses a player is removed
//! from the table immediately.
//!
//! ### UDP-Based Communication
//! Clients talk to the server over UDP with bincode-serialized packets.
//! Delivery is fire-and-forget: a lost state update is replaced by the
//! next one, which carries the full snapshot.
//!
//! ### Event-Driven Simulation
//! The loop ticks at a fixed rate, but bodies only move while a shot is in
//! flight, so idle sessions cost nothing and produce no traffic. Each tick
//! runs the physics step and then the rule arbiter, which resolves the
//! turn exactly once when the table settles.
//!
//! ## Module Organization
//!
//! - [`physics`] — the deterministic per-tick step: integration, rail
//!   reflection, pairwise collision resolution, friction, and the
//!   motion-settled predicate.
//! - [`arbiter`] — the turn/score state machine: captures, fouls, extra
//!   turns, and win detection.
//! - [`session`] — session pairing and the keyed table of live games.
//! - [`clients`] — connected-client roster with liveness timeouts.
//! - [`network`] — UDP socket management, packet routing, and the main
//!   server loop.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::Server;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Bind to an address with a 60Hz tick rate and up to 64 clients
//!     let mut server = Server::new(
//!         "127.0.0.1:8080",
//!         Duration::from_millis(16),
//!         64
//!     ).await?;
//!
//!     // Runs the main loop: pairs joining clients into sessions,
//!     // validates moves, simulates shots, and broadcasts state.
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Failure Semantics
//!
//! Nothing in this crate is fatal to the process. Malformed packets are
//! dropped, rule violations are no-ops answered with an optional rejection
//! notice, lifecycle mistakes get an explicit error packet, and a
//! disconnect is an ordinary transition that ends the affected session.

pub mod arbiter;
pub mod clients;
pub mod network;
pub mod physics;
pub mod session;
