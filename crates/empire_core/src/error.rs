//! Error types for the game simulation.

use thiserror::Error;

use crate::resources::ResourceType;

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Top-level error type for all game simulation errors.
#[derive(Debug, Error)]
pub enum GameError {
    /// A command referenced an object id that is not (or no longer) present.
    #[error("Object not found: {0}")]
    ObjectNotFound(u32),

    /// A command expected a unit but the id resolves to a building.
    #[error("Object {0} is not a unit")]
    NotAUnit(u32),

    /// A command expected a building but the id resolves to a unit.
    #[error("Object {0} is not a building")]
    NotABuilding(u32),

    /// A command referenced an object owned by another player.
    #[error("Object {object} is not owned by player {player}")]
    NotOwned {
        /// The referenced object.
        object: u32,
        /// The commanding player.
        player: u8,
    },

    /// Insufficient resources for a purchase.
    #[error("Insufficient resources: need {required} {resource}, have {available}")]
    InsufficientResources {
        /// Resource type that ran short.
        resource: ResourceType,
        /// Amount required.
        required: u32,
        /// Amount available.
        available: u32,
    },

    /// A production queue is at its maximum size.
    #[error("Production queue of building {0} is full")]
    QueueFull(u32),

    /// A building type cannot produce the requested unit type.
    #[error("Building {building} cannot produce unit type {unit_type}")]
    CannotProduce {
        /// The producing building.
        building: u32,
        /// The requested wire unit type.
        unit_type: u16,
    },

    /// A foundation footprint overlaps occupied tiles or leaves the map.
    #[error("Foundation placement blocked at tile ({x}, {y})")]
    FoundationBlocked {
        /// Base tile x.
        x: u32,
        /// Base tile y.
        y: u32,
    },

    /// Invalid game state.
    #[error("Invalid game state: {0}")]
    InvalidState(String),
}
