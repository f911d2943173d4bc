//! Validated player intents applied to the simulation.
//!
//! Commands mirror the client-to-server wire messages one to one; the
//! server decodes a frame, builds the matching command and hands it to
//! [`Game::apply_command`](crate::game::Game::apply_command).

use crate::buildings::BuildingType;
use crate::math::Vec2;
use crate::objects::ObjectId;

/// A player command.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerCommand {
    /// Order units to a bare map coordinate.
    MoveToMapCoord {
        /// Goal coordinate.
        target: Vec2,
        /// Commanded units.
        units: Vec<ObjectId>,
    },
    /// Order units onto an object (auto-interaction on arrival).
    SetTarget {
        /// Target object.
        target: ObjectId,
        /// Commanded units.
        units: Vec<ObjectId>,
    },
    /// Enqueue a unit in a building's production queue.
    ProduceUnit {
        /// Producing building.
        building: ObjectId,
        /// Requested wire unit type.
        unit_type: u16,
    },
    /// Place a building foundation and send villagers to build it.
    PlaceBuildingFoundation {
        /// Requested building type.
        building_type: BuildingType,
        /// Top-left footprint tile.
        base_tile: (u32, u32),
        /// Villagers ordered to construct.
        villagers: Vec<ObjectId>,
    },
    /// Remove a production queue item, indexed from the back of the
    /// queue so a front item completing in flight cannot shift the
    /// meaning of the index.
    DequeueProductionQueueItem {
        /// Producing building.
        building: ObjectId,
        /// Index counted from the back.
        index_from_back: u8,
    },
    /// Delete an own object (foundations refund pro-rated).
    DeleteObject {
        /// Object to delete.
        object: ObjectId,
    },
}
