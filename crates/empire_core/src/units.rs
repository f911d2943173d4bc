//! Unit state: class, current task, action, movement and cargo.
//!
//! A unit's identity (`UnitClass`) and its current activity
//! (`VillagerTask`) are stored as two orthogonal fields. The wire
//! protocol exposes a single combined `UnitType`, re-announced through
//! a `ChangeUnitType` message whenever the derived value changes, so
//! clients keep seeing task-driven type changes exactly as before.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::math::Vec2;
use crate::objects::ObjectId;
use crate::resources::ResourceType;

/// Fixed unit identity, independent of what the unit is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitClass {
    /// Economic unit: gathers, builds, drops off.
    Villager,
    /// Basic melee fighter.
    Militia,
    /// Fast unarmored scout.
    Scout,
}

/// What a villager is currently doing, orthogonal to its class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VillagerTask {
    /// No task.
    #[default]
    None,
    /// Chopping a tree.
    Lumberjack,
    /// Picking a forage bush.
    Forager,
    /// Mining gold or stone.
    Miner,
    /// Constructing a foundation.
    Builder,
}

impl VillagerTask {
    /// The gathering task matching a resource type.
    #[must_use]
    pub const fn for_resource(resource: ResourceType) -> Self {
        match resource {
            ResourceType::Wood => Self::Lumberjack,
            ResourceType::Food => Self::Forager,
            ResourceType::Gold | ResourceType::Stone => Self::Miner,
        }
    }
}

/// The externally visible unit type carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum UnitType {
    /// Villager with no task.
    Villager = 0,
    /// Villager chopping wood.
    Lumberjack = 1,
    /// Villager foraging food.
    Forager = 2,
    /// Villager mining gold or stone.
    Miner = 3,
    /// Villager constructing.
    Builder = 4,
    /// Militia fighter.
    Militia = 5,
    /// Scout.
    Scout = 6,
}

impl UnitType {
    /// Decode a wire value.
    #[must_use]
    pub const fn from_u16(value: u16) -> Option<Self> {
        match value {
            0 => Some(Self::Villager),
            1 => Some(Self::Lumberjack),
            2 => Some(Self::Forager),
            3 => Some(Self::Miner),
            4 => Some(Self::Builder),
            5 => Some(Self::Militia),
            6 => Some(Self::Scout),
            _ => None,
        }
    }

    /// The unit class a producible wire type maps to.
    ///
    /// Task-flavored villager types are not producible and return `None`.
    #[must_use]
    pub const fn producible_class(self) -> Option<UnitClass> {
        match self {
            Self::Villager => Some(UnitClass::Villager),
            Self::Militia => Some(UnitClass::Militia),
            Self::Scout => Some(UnitClass::Scout),
            _ => None,
        }
    }
}

/// A unit's current action state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum UnitAction {
    /// Standing still.
    #[default]
    Idle = 0,
    /// Following a path.
    Moving = 1,
    /// Gathering or constructing.
    Task = 2,
    /// Melee attack cycle running.
    Attack = 3,
}

/// Per-unit simulation state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unit {
    /// Fixed identity.
    pub class: UnitClass,
    /// Current villager activity (always `None` for non-villagers).
    pub task: VillagerTask,
    /// Continuous position in map coordinates.
    pub position: Vec2,
    /// Current action state.
    pub action: UnitAction,
    /// Server time at which the current action began. Drives the melee
    /// attack cycle.
    pub action_start_time: f64,
    /// Set once the current attack cycle's damage has been dealt.
    pub attack_damage_applied: bool,
    /// Object currently approached / interacted with.
    pub target: Option<ObjectId>,
    /// Last explicitly player-commanded target; survives auto-retargets
    /// such as drop-off detours.
    pub manual_target: Option<ObjectId>,
    /// Bare coordinate goal (exclusive with `target`).
    pub move_to: Option<Vec2>,
    /// Cached waypoints, consumed front to back. `None` forces a replan
    /// before the next movement integration.
    pub path: Option<VecDeque<Vec2>>,
    /// Unit direction vector of the current movement segment.
    pub movement_direction: Vec2,
    /// Carried resource type (villagers only).
    pub carried_resource: Option<ResourceType>,
    /// Carried amount; accumulates fractionally, clamped to capacity.
    pub carried_amount: f32,
    /// When the unit first became fully blocked while trying to move.
    /// Keeps the move animation during a short grace window.
    pub blocked_since: Option<f64>,
}

impl Unit {
    /// Create an idle unit at a position.
    #[must_use]
    pub fn new(class: UnitClass, position: Vec2) -> Self {
        Self {
            class,
            task: VillagerTask::None,
            position,
            action: UnitAction::Idle,
            action_start_time: 0.0,
            attack_damage_applied: false,
            target: None,
            manual_target: None,
            move_to: None,
            path: None,
            movement_direction: Vec2::ZERO,
            carried_resource: None,
            carried_amount: 0.0,
            blocked_since: None,
        }
    }

    /// The combined wire-visible unit type.
    #[must_use]
    pub const fn unit_type(&self) -> UnitType {
        match self.class {
            UnitClass::Militia => UnitType::Militia,
            UnitClass::Scout => UnitType::Scout,
            UnitClass::Villager => match self.task {
                VillagerTask::None => UnitType::Villager,
                VillagerTask::Lumberjack => UnitType::Lumberjack,
                VillagerTask::Forager => UnitType::Forager,
                VillagerTask::Miner => UnitType::Miner,
                VillagerTask::Builder => UnitType::Builder,
            },
        }
    }

    /// Drop any cached path and movement goal.
    pub fn clear_movement(&mut self) {
        self.move_to = None;
        self.path = None;
        self.movement_direction = Vec2::ZERO;
        self.blocked_since = None;
    }

    /// Whole carried resource points, as shown to clients.
    #[must_use]
    pub fn carried_whole_points(&self) -> u32 {
        self.carried_amount as u32
    }
}
