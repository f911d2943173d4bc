//! The read-only stats context consulted by the simulation.
//!
//! All per-type numbers (costs, speeds, production times, footprints)
//! live in [`GameData`], which is built once at startup and passed
//! explicitly into the simulation — there are no global lookup tables.
//! The compiled-in standard set can be overridden from a RON document.

mod building_data;
mod unit_data;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::buildings::BuildingType;
use crate::error::{GameError, Result};
use crate::resources::{ResourceAmount, ResourceType};
use crate::units::UnitClass;

pub use building_data::BuildingStats;
pub use unit_data::UnitStats;

/// Frame rate the attack animation cycle is defined against.
pub const ATTACK_ANIMATION_FPS: f32 = 30.0;

/// Immutable per-type stats for every unit class and building type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameData {
    units: HashMap<UnitClass, UnitStats>,
    buildings: HashMap<BuildingType, BuildingStats>,
}

impl GameData {
    /// The compiled-in standard stat set.
    #[must_use]
    pub fn standard() -> Self {
        let mut units = HashMap::new();
        units.insert(
            UnitClass::Villager,
            UnitStats {
                radius: 0.15,
                speed: 0.8,
                max_hp: 25,
                attack: 3,
                armor: 0,
                attack_frames: 45,
                cost: ResourceAmount::new(0, 50, 0, 0),
                production_time: 25.0,
                population_demand: 1,
                gather_rate: 0.5,
                carry_capacity: 10,
                build_rate: 1.0,
            },
        );
        units.insert(
            UnitClass::Militia,
            UnitStats {
                radius: 0.2,
                speed: 0.9,
                max_hp: 40,
                attack: 4,
                armor: 1,
                attack_frames: 30,
                cost: ResourceAmount::new(0, 60, 20, 0),
                production_time: 21.0,
                population_demand: 1,
                gather_rate: 0.0,
                carry_capacity: 0,
                build_rate: 0.0,
            },
        );
        units.insert(
            UnitClass::Scout,
            UnitStats {
                radius: 0.25,
                speed: 1.55,
                max_hp: 45,
                attack: 3,
                armor: 0,
                attack_frames: 30,
                cost: ResourceAmount::new(0, 80, 0, 0),
                production_time: 30.0,
                population_demand: 1,
                gather_rate: 0.0,
                carry_capacity: 0,
                build_rate: 0.0,
            },
        );

        let mut buildings = HashMap::new();
        buildings.insert(
            BuildingType::TownCenter,
            BuildingStats {
                size: (3, 3),
                max_hp: 2400,
                armor: 3,
                cost: ResourceAmount::new(275, 0, 0, 100),
                construction_time: 150.0,
                population_space: 5,
                produces: vec![UnitClass::Villager],
                dropoff: vec![
                    ResourceType::Wood,
                    ResourceType::Food,
                    ResourceType::Gold,
                    ResourceType::Stone,
                ],
                resource_node: None,
            },
        );
        buildings.insert(
            BuildingType::House,
            BuildingStats {
                size: (2, 2),
                max_hp: 550,
                armor: 0,
                cost: ResourceAmount::new(30, 0, 0, 0),
                construction_time: 25.0,
                population_space: 5,
                produces: Vec::new(),
                dropoff: Vec::new(),
                resource_node: None,
            },
        );
        buildings.insert(
            BuildingType::Barracks,
            BuildingStats {
                size: (3, 3),
                max_hp: 1200,
                armor: 1,
                cost: ResourceAmount::new(175, 0, 0, 0),
                construction_time: 50.0,
                population_space: 0,
                produces: vec![UnitClass::Militia, UnitClass::Scout],
                dropoff: Vec::new(),
                resource_node: None,
            },
        );
        buildings.insert(
            BuildingType::Mill,
            BuildingStats {
                size: (2, 2),
                max_hp: 600,
                armor: 0,
                cost: ResourceAmount::new(100, 0, 0, 0),
                construction_time: 35.0,
                population_space: 0,
                produces: Vec::new(),
                dropoff: vec![ResourceType::Food],
                resource_node: None,
            },
        );
        buildings.insert(
            BuildingType::LumberCamp,
            BuildingStats {
                size: (2, 2),
                max_hp: 600,
                armor: 0,
                cost: ResourceAmount::new(100, 0, 0, 0),
                construction_time: 35.0,
                population_space: 0,
                produces: Vec::new(),
                dropoff: vec![ResourceType::Wood],
                resource_node: None,
            },
        );
        buildings.insert(
            BuildingType::MiningCamp,
            BuildingStats {
                size: (2, 2),
                max_hp: 600,
                armor: 0,
                cost: ResourceAmount::new(100, 0, 0, 0),
                construction_time: 35.0,
                population_space: 0,
                produces: Vec::new(),
                dropoff: vec![ResourceType::Gold, ResourceType::Stone],
                resource_node: None,
            },
        );
        buildings.insert(
            BuildingType::Tree,
            BuildingStats {
                size: (1, 1),
                max_hp: 25,
                armor: 0,
                cost: ResourceAmount::ZERO,
                construction_time: 0.0,
                population_space: 0,
                produces: Vec::new(),
                dropoff: Vec::new(),
                resource_node: Some((ResourceType::Wood, 100)),
            },
        );
        buildings.insert(
            BuildingType::ForageBush,
            BuildingStats {
                size: (1, 1),
                max_hp: 25,
                armor: 0,
                cost: ResourceAmount::ZERO,
                construction_time: 0.0,
                population_space: 0,
                produces: Vec::new(),
                dropoff: Vec::new(),
                resource_node: Some((ResourceType::Food, 125)),
            },
        );
        buildings.insert(
            BuildingType::GoldMine,
            BuildingStats {
                size: (1, 1),
                max_hp: 25,
                armor: 0,
                cost: ResourceAmount::ZERO,
                construction_time: 0.0,
                population_space: 0,
                produces: Vec::new(),
                dropoff: Vec::new(),
                resource_node: Some((ResourceType::Gold, 800)),
            },
        );
        buildings.insert(
            BuildingType::StoneMine,
            BuildingStats {
                size: (1, 1),
                max_hp: 25,
                armor: 0,
                cost: ResourceAmount::ZERO,
                construction_time: 0.0,
                population_space: 0,
                produces: Vec::new(),
                dropoff: Vec::new(),
                resource_node: Some((ResourceType::Stone, 350)),
            },
        );

        Self { units, buildings }
    }

    /// Parse a stat set from a RON document and validate completeness.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidState`] on parse failure or when the
    /// document omits a unit class or building type.
    pub fn from_ron_str(source: &str) -> Result<Self> {
        let data: Self = ron::from_str(source)
            .map_err(|e| GameError::InvalidState(format!("failed to parse game data: {e}")))?;
        data.validate()?;
        Ok(data)
    }

    /// Validate that every unit class and building type has stats.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidState`] naming the first missing
    /// entry.
    pub fn validate(&self) -> Result<()> {
        for class in [UnitClass::Villager, UnitClass::Militia, UnitClass::Scout] {
            if !self.units.contains_key(&class) {
                return Err(GameError::InvalidState(format!(
                    "missing unit stats for {class:?}"
                )));
            }
        }
        for value in 0..=u16::MAX {
            let Some(building_type) = BuildingType::from_u16(value) else {
                break;
            };
            if !self.buildings.contains_key(&building_type) {
                return Err(GameError::InvalidState(format!(
                    "missing building stats for {building_type:?}"
                )));
            }
        }
        Ok(())
    }

    /// Stats for a unit class.
    #[must_use]
    pub fn unit(&self, class: UnitClass) -> &UnitStats {
        &self.units[&class]
    }

    /// Stats for a building type.
    #[must_use]
    pub fn building(&self, building_type: BuildingType) -> &BuildingStats {
        &self.buildings[&building_type]
    }
}

impl Default for GameData {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_set_is_complete() {
        GameData::standard().validate().unwrap();
    }

    #[test]
    fn test_gaia_nodes_carry_resources() {
        let data = GameData::standard();
        assert_eq!(
            data.building(BuildingType::Tree).resource_node,
            Some((ResourceType::Wood, 100))
        );
        assert_eq!(
            data.building(BuildingType::GoldMine).resource_node,
            Some((ResourceType::Gold, 800))
        );
        assert!(data.building(BuildingType::House).resource_node.is_none());
    }

    #[test]
    fn test_dropoff_tables() {
        let data = GameData::standard();
        let town_center = data.building(BuildingType::TownCenter);
        for resource in ResourceType::ALL {
            assert!(town_center.accepts_dropoff(resource));
        }
        assert!(data
            .building(BuildingType::LumberCamp)
            .accepts_dropoff(ResourceType::Wood));
        assert!(!data
            .building(BuildingType::LumberCamp)
            .accepts_dropoff(ResourceType::Gold));
    }

    #[test]
    fn test_ron_override_is_validated() {
        let text = ron::to_string(&GameData::standard()).unwrap();
        let parsed = GameData::from_ron_str(&text).unwrap();
        assert_eq!(parsed.unit(UnitClass::Villager).carry_capacity, 10);

        assert!(GameData::from_ron_str("(units: {}, buildings: {})").is_err());
    }

    #[test]
    fn test_production_tables() {
        let data = GameData::standard();
        assert!(data
            .building(BuildingType::TownCenter)
            .can_produce(UnitClass::Villager));
        assert!(data
            .building(BuildingType::Barracks)
            .can_produce(UnitClass::Militia));
        assert!(!data
            .building(BuildingType::House)
            .can_produce(UnitClass::Villager));
    }
}
