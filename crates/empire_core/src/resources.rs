//! Resource types and the per-player resource ledger.
//!
//! All ledger amounts are integers; fractional gathering progress lives
//! on the carrying unit and only whole points ever reach the ledger.

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};

/// The four gatherable resource types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ResourceType {
    /// Gathered from trees.
    Wood = 0,
    /// Gathered from forage bushes (and later farms).
    Food = 1,
    /// Gathered from gold mines.
    Gold = 2,
    /// Gathered from stone mines.
    Stone = 3,
}

impl ResourceType {
    /// All resource types in wire order.
    pub const ALL: [Self; 4] = [Self::Wood, Self::Food, Self::Gold, Self::Stone];

    /// Decode a wire value.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Wood),
            1 => Some(Self::Food),
            2 => Some(Self::Gold),
            3 => Some(Self::Stone),
            _ => None,
        }
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Wood => "wood",
            Self::Food => "food",
            Self::Gold => "gold",
            Self::Stone => "stone",
        };
        f.write_str(name)
    }
}

/// An amount of each resource type; used both as a player ledger and
/// as a cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResourceAmount {
    /// Wood points.
    pub wood: u32,
    /// Food points.
    pub food: u32,
    /// Gold points.
    pub gold: u32,
    /// Stone points.
    pub stone: u32,
}

impl ResourceAmount {
    /// No resources.
    pub const ZERO: Self = Self::new(0, 0, 0, 0);

    /// Create a new amount.
    #[must_use]
    pub const fn new(wood: u32, food: u32, gold: u32, stone: u32) -> Self {
        Self {
            wood,
            food,
            gold,
            stone,
        }
    }

    /// Amount of a single resource type.
    #[must_use]
    pub const fn get(&self, resource: ResourceType) -> u32 {
        match resource {
            ResourceType::Wood => self.wood,
            ResourceType::Food => self.food,
            ResourceType::Gold => self.gold,
            ResourceType::Stone => self.stone,
        }
    }

    /// Mutable access to a single resource type.
    pub fn get_mut(&mut self, resource: ResourceType) -> &mut u32 {
        match resource {
            ResourceType::Wood => &mut self.wood,
            ResourceType::Food => &mut self.food,
            ResourceType::Gold => &mut self.gold,
            ResourceType::Stone => &mut self.stone,
        }
    }

    /// Check whether every component covers `cost`.
    #[must_use]
    pub const fn can_afford(&self, cost: &Self) -> bool {
        self.wood >= cost.wood
            && self.food >= cost.food
            && self.gold >= cost.gold
            && self.stone >= cost.stone
    }

    /// Subtract `cost` from the ledger.
    ///
    /// The ledger is unchanged on failure; affordability is checked
    /// before any component is touched.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InsufficientResources`] naming the first
    /// short resource type.
    pub fn spend(&mut self, cost: &Self) -> Result<()> {
        for resource in ResourceType::ALL {
            if self.get(resource) < cost.get(resource) {
                return Err(GameError::InsufficientResources {
                    resource,
                    required: cost.get(resource),
                    available: self.get(resource),
                });
            }
        }
        self.wood -= cost.wood;
        self.food -= cost.food;
        self.gold -= cost.gold;
        self.stone -= cost.stone;
        Ok(())
    }

    /// Add `amount` to the ledger (refunds, drop-offs).
    pub fn add(&mut self, amount: &Self) {
        self.wood += amount.wood;
        self.food += amount.food;
        self.gold += amount.gold;
        self.stone += amount.stone;
    }

    /// Scale each component by `fraction` (used for pro-rated refunds),
    /// rounding down.
    #[must_use]
    pub fn scaled(&self, fraction: f32) -> Self {
        let scale = |v: u32| (v as f32 * fraction) as u32;
        Self::new(
            scale(self.wood),
            scale(self.food),
            scale(self.gold),
            scale(self.stone),
        )
    }

    /// Sum of all components.
    #[must_use]
    pub const fn total(&self) -> u32 {
        self.wood + self.food + self.gold + self.stone
    }
}
