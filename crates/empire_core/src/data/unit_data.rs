//! Data-driven unit stat definitions.

use serde::{Deserialize, Serialize};

use crate::resources::ResourceAmount;

/// Stats for one unit class.
///
/// Consulted by the simulation through the read-only [`GameData`]
/// context; never mutated after game start.
///
/// [`GameData`]: crate::data::GameData
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitStats {
    /// Collision radius in map-coordinate units (tiles).
    pub radius: f32,

    /// Movement speed in tiles per second.
    pub speed: f32,

    /// Maximum hit points.
    pub max_hp: u32,

    /// Melee attack value.
    pub attack: u32,

    /// Armor value subtracted from incoming attacks.
    pub armor: u32,

    /// Number of frames in one attack animation cycle.
    pub attack_frames: u32,

    /// Resource cost to produce this unit.
    pub cost: ResourceAmount,

    /// Production time in seconds.
    pub production_time: f32,

    /// Population space this unit occupies.
    pub population_demand: u32,

    /// Resource points gathered per second (villagers only).
    #[serde(default)]
    pub gather_rate: f32,

    /// Maximum carried resource amount (villagers only).
    #[serde(default)]
    pub carry_capacity: u32,

    /// Construction contribution in build-percentage points per second
    /// (villagers only).
    #[serde(default)]
    pub build_rate: f32,
}
