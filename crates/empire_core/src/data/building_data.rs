//! Data-driven building stat definitions.

use serde::{Deserialize, Serialize};

use crate::resources::{ResourceAmount, ResourceType};
use crate::units::UnitClass;

/// Stats for one building type.
///
/// Gaia resource nodes (trees, mines, forage bushes) are 1x1 buildings
/// whose `resource_node` field names the carried resource and its
/// starting amount.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildingStats {
    /// Footprint size in tiles (width, height).
    pub size: (u32, u32),

    /// Maximum hit points when fully constructed.
    pub max_hp: u32,

    /// Armor value subtracted from incoming attacks.
    pub armor: u32,

    /// Resource cost to place a foundation.
    pub cost: ResourceAmount,

    /// Construction time in seconds (one builder).
    pub construction_time: f32,

    /// Population space provided once fully constructed.
    pub population_space: u32,

    /// Unit classes this building can produce.
    #[serde(default)]
    pub produces: Vec<UnitClass>,

    /// Resource types villagers may drop off here.
    #[serde(default)]
    pub dropoff: Vec<ResourceType>,

    /// For gaia resource nodes: the resource and its starting amount.
    #[serde(default)]
    pub resource_node: Option<(ResourceType, u32)>,
}

impl BuildingStats {
    /// Whether this building can produce the given unit class.
    #[must_use]
    pub fn can_produce(&self, class: UnitClass) -> bool {
        self.produces.contains(&class)
    }

    /// Whether villagers may drop off `resource` here.
    #[must_use]
    pub fn accepts_dropoff(&self, resource: ResourceType) -> bool {
        self.dropoff.contains(&resource)
    }
}
