//! Per-player match state: resource ledger, population, connection.

use serde::{Deserialize, Serialize};

use crate::resources::ResourceAmount;

/// Why a player stopped playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum LeaveReason {
    /// Voluntary resignation.
    Resign = 0,
    /// Connection lost or ping timeout.
    Drop = 1,
    /// Lost the match.
    Defeat = 2,
}

/// A player participating in the match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerInGame {
    /// Current resource stockpile.
    pub resources: ResourceAmount,
    /// Population space provided by completed buildings.
    pub available_population_space: u32,
    /// Live units plus units whose production has started. Used for
    /// housing checks before population space is actually consumed, so
    /// queued units can never exceed capacity.
    pub population_including_production: u32,
    /// Whether population capacity currently blocks production.
    pub is_housed: bool,
    /// Previous housed value; the flag is notified edge-triggered.
    pub was_housed_before: bool,
    /// Whether the player's connection is alive.
    pub is_connected: bool,
    /// Whether the player reported loading completion.
    pub finished_loading: bool,
    /// Set with a reason once the player can no longer play.
    pub left: Option<LeaveReason>,
}

impl PlayerInGame {
    /// Create a connected player with the standard starting stockpile.
    #[must_use]
    pub fn new() -> Self {
        Self {
            resources: ResourceAmount::new(200, 200, 100, 100),
            available_population_space: 0,
            population_including_production: 0,
            is_housed: false,
            was_housed_before: false,
            is_connected: true,
            finished_loading: false,
            left: None,
        }
    }

    /// Whether the player can still act in the match.
    #[must_use]
    pub const fn is_playing(&self) -> bool {
        self.left.is_none()
    }
}

impl Default for PlayerInGame {
    fn default() -> Self {
        Self::new()
    }
}
