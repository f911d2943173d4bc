//! # Empire Core
//!
//! Deterministic game-simulation core for the Empires RTS server.
//!
//! This crate contains **only** simulation logic:
//! - No rendering
//! - No IO
//! - No wall-clock access
//! - No system randomness (map generation uses a seeded PRNG)
//!
//! The server crate owns the clock and the sockets; it feeds validated
//! player commands into [`game::Game`] between fixed steps and drains
//! the resulting delta events after each step.
//!
//! ## Crate Structure
//!
//! - [`map`] - tile grid, elevation, occupancy bitmaps
//! - [`pathfinding`] - grid A* with direction-encoded backtracking and
//!   corridor smoothing
//! - [`collision`] - circle/grid and circle/circle queries, evasion
//! - [`units`] / [`buildings`] / [`objects`] - the object model
//! - [`game`] - the match aggregate and per-tick update
//! - [`data`] - the read-only stats context

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod buildings;
pub mod collision;
pub mod command;
pub mod data;
pub mod error;
pub mod events;
pub mod game;
pub mod map;
pub mod map_generation;
pub mod math;
pub mod objects;
pub mod pathfinding;
pub mod player;
pub mod resources;
pub mod units;
mod unit_actions;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::buildings::{Building, BuildingType, MAX_PRODUCTION_QUEUE_SIZE};
    pub use crate::command::PlayerCommand;
    pub use crate::data::{GameData, ATTACK_ANIMATION_FPS};
    pub use crate::error::{GameError, Result};
    pub use crate::events::{AddObjectPayload, GameEvent, Recipient};
    pub use crate::game::{Game, HP_DEATH_THRESHOLD, TICK_DURATION, TICK_RATE};
    pub use crate::map::Map;
    pub use crate::map_generation::MapConfig;
    pub use crate::math::Vec2;
    pub use crate::objects::{GameObject, ObjectId, ObjectKind, ObjectTable, GAIA_PLAYER_INDEX};
    pub use crate::player::{LeaveReason, PlayerInGame};
    pub use crate::resources::{ResourceAmount, ResourceType};
    pub use crate::units::{Unit, UnitAction, UnitClass, UnitType, VillagerTask};
}
