//! Per-tick state deltas emitted by the simulation.
//!
//! Events are self-contained snapshots: the outer layer can encode
//! them into wire messages without reaching back into simulation
//! state, which keeps encode order independent of later mutations in
//! the same tick (an object may die in the tick it was created).

use crate::math::Vec2;
use crate::objects::ObjectId;
use crate::player::LeaveReason;
use crate::resources::{ResourceAmount, ResourceType};
use crate::units::{UnitAction, UnitType};

/// Who a delta is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    /// Every connected player.
    All,
    /// One player only.
    Player(u8),
}

/// Payload of an object-creation delta.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AddObjectPayload {
    /// A new unit.
    Unit {
        /// Wire-visible unit type.
        unit_type: UnitType,
        /// Spawn position.
        position: Vec2,
    },
    /// A new building or foundation.
    Building {
        /// Wire building type value.
        building_type: u16,
        /// Top-left footprint tile.
        base_tile: (u32, u32),
        /// Construction progress at creation.
        build_percentage: f32,
    },
}

/// A single state delta generated during a simulation step or command
/// application.
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    /// An object entered the world.
    ObjectAdded {
        /// New object id.
        id: ObjectId,
        /// Owner index (or gaia).
        player: u8,
        /// Rounded HP at creation.
        hp: u32,
        /// Type-specific payload.
        payload: AddObjectPayload,
    },
    /// A unit's movement segment changed: new start point, velocity and
    /// action. Clients extrapolate from this until the next segment.
    UnitMovement {
        /// Moving unit.
        id: ObjectId,
        /// Segment start position.
        start: Vec2,
        /// Velocity in tiles per second (zero when stationary).
        speed: Vec2,
        /// Action shown while the segment plays.
        action: UnitAction,
    },
    /// An object's rounded HP changed.
    HpUpdate {
        /// Damaged or repaired object.
        id: ObjectId,
        /// New rounded HP.
        hp: u32,
    },
    /// An object died or was deleted.
    ObjectDeath {
        /// The removed object.
        id: ObjectId,
    },
    /// A building's construction progressed.
    BuildPercentageUpdate {
        /// The foundation.
        id: ObjectId,
        /// New progress, 0..=100.
        percentage: f32,
    },
    /// A unit's wire-visible type changed (task change).
    ChangeUnitType {
        /// The unit.
        id: ObjectId,
        /// New derived type.
        new_type: UnitType,
    },
    /// A villager's carried cargo changed (whole points).
    CarriedResourcesChanged {
        /// The villager.
        id: ObjectId,
        /// Carried resource type.
        resource: ResourceType,
        /// Whole carried points.
        amount: u32,
    },
    /// A player's stockpile changed.
    ResourcesUpdate {
        /// Ledger owner; the delta goes only to this player.
        player: u8,
        /// New stockpile.
        resources: ResourceAmount,
    },
    /// A player's housed flag flipped.
    HousedUpdate {
        /// Affected player; the delta goes only to this player.
        player: u8,
        /// New housed value.
        housed: bool,
    },
    /// A unit entered a production queue.
    QueueUnit {
        /// Producing building.
        building: ObjectId,
        /// Queued wire unit type.
        unit_type: UnitType,
    },
    /// The front production item's progress rate changed.
    UpdateProduction {
        /// Producing building.
        building: ObjectId,
        /// Current progress, 0..=100.
        percentage: f32,
        /// Progress rate in percentage points per second (zero while
        /// housed-frozen).
        speed: f32,
    },
    /// A production queue item was removed (completed or dequeued).
    RemoveFromProductionQueue {
        /// Producing building.
        building: ObjectId,
        /// Index from the front of the queue.
        index: u8,
    },
    /// A player stopped playing.
    PlayerLeft {
        /// The leaving player.
        player: u8,
        /// Why.
        reason: LeaveReason,
    },
}

impl GameEvent {
    /// Which players this delta is addressed to.
    #[must_use]
    pub const fn recipient(&self) -> Recipient {
        match self {
            Self::ResourcesUpdate { player, .. } | Self::HousedUpdate { player, .. } => {
                Recipient::Player(*player)
            }
            _ => Recipient::All,
        }
    }
}
