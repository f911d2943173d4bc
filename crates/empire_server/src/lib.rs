//! # Empires Dedicated Server
//!
//! Headless authoritative server for one match: accepts the expected
//! number of TCP connections, waits for every player to finish
//! loading, then drives the fixed-timestep simulation loop and streams
//! per-tick delta batches to each client.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod accumulator;
pub mod game_loop;
pub mod network;

use std::time::Duration;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on.
    pub port: u16,
    /// Number of players the match starts with.
    pub player_count: u8,
    /// Map generation seed.
    pub map_seed: u64,
    /// Silent connections are dropped after this long without any
    /// message (including pings).
    pub ping_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 7777,
            player_count: 2,
            map_seed: 12345,
            ping_timeout: Duration::from_secs(5),
        }
    }
}
