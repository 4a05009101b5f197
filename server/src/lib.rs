//! # Shrinking Bar Server Library
//!
//! This library provides the authoritative server for the shrinking-bar party
//! game. Every participant steers a cursor that sweeps across its own bar;
//! each bounce input cuts the bar down to the cursor, unless it lands within
//! the last few percent before the edge, in which case the bar grows back a
//! little. The last participant whose cursor is still inside its bar wins.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! The server runs the definitive version of the cursor physics using the
//! same functions from the `shared` crate that a local practice mode would
//! use. Clients only render what the server tells them.
//!
//! ### Room Management
//! Handles the complete lifecycle of a room:
//! - Admitting up to four participants while the lobby is open
//! - Match configuration (difficulty, speed ramp) before the start
//! - Start, win detection, rematch and abort on disconnect
//!
//! ### State Broadcasting
//! Every tick a full snapshot of all participants, eliminated ones included,
//! is sent to every client. Discrete events (bounces, perfect bounces,
//! shield breaks, deaths) are sent the moment they happen.
//!
//! ## Architecture Design
//!
//! ### Single-Threaded Event Loop
//! One task owns the [`session::Session`] and processes inbound connection
//! events and timer ticks sequentially inside a `tokio::select!`. No tick
//! ever overlaps with message handling, so the room needs no locks.
//!
//! ### WebSocket Communication
//! Each participant holds one WebSocket exchanging JSON text frames. Every
//! connection gets a reader task and a writer task; the writer is fed by a
//! bounded queue, and broadcasts never wait on a slow client.
//!
//! ## Module Organization
//!
//! ### Client Module (`client`)
//! The outbound half of a connection: a cheap handle that queues encoded
//! packets or a close frame without blocking.
//!
//! ### Session Module (`session`)
//! The room state machine (`WAITING → ACTIVE → ENDED`), the roster, bounce
//! routing and the per-tick driver.
//!
//! ### CLI Module (`cli`)
//! Argument types shared by the `server` and `bot_client` binaries.
//!
//! ### Network Module (`network`)
//! Socket acceptance, WebSocket framing, packet decoding and the main loop.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::Server;
//! use shared::MatchConfig;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Bind a 60Hz room on port 8080 with the default settings
//!     let mut server = Server::new(
//!         "127.0.0.1:8080",
//!         Duration::from_secs_f64(1.0 / 60.0),
//!         MatchConfig::default(),
//!     ).await?;
//!
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod client;
pub mod network;
pub mod session;
