//! Building state: construction progress, production queue, footprints.
//!
//! Gaia resource nodes (trees, mines, forage bushes) are modeled as 1x1
//! neutral buildings carrying a remaining-resource amount; everything
//! that works on building footprints (targeting, pathfinding goals,
//! collision) applies to them unchanged.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::math::{closest_point_on_rect, Vec2};
use crate::units::UnitClass;

/// Maximum number of queued production items per building.
pub const MAX_PRODUCTION_QUEUE_SIZE: usize = 10;

/// All building types, including gaia resource nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum BuildingType {
    /// Main base: produces villagers, accepts every drop-off.
    TownCenter = 0,
    /// Provides population space.
    House = 1,
    /// Produces military units.
    Barracks = 2,
    /// Food drop-off.
    Mill = 3,
    /// Wood drop-off.
    LumberCamp = 4,
    /// Gold/stone drop-off.
    MiningCamp = 5,
    /// Gaia: wood node.
    Tree = 6,
    /// Gaia: food node.
    ForageBush = 7,
    /// Gaia: gold node.
    GoldMine = 8,
    /// Gaia: stone node.
    StoneMine = 9,
}

impl BuildingType {
    /// Decode a wire value.
    #[must_use]
    pub const fn from_u16(value: u16) -> Option<Self> {
        match value {
            0 => Some(Self::TownCenter),
            1 => Some(Self::House),
            2 => Some(Self::Barracks),
            3 => Some(Self::Mill),
            4 => Some(Self::LumberCamp),
            5 => Some(Self::MiningCamp),
            6 => Some(Self::Tree),
            7 => Some(Self::ForageBush),
            8 => Some(Self::GoldMine),
            9 => Some(Self::StoneMine),
            _ => None,
        }
    }

    /// Whether players may place foundations of this type.
    #[must_use]
    pub const fn player_constructible(self) -> bool {
        !matches!(
            self,
            Self::Tree | Self::ForageBush | Self::GoldMine | Self::StoneMine
        )
    }
}

/// Per-building simulation state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Building {
    /// Building type.
    pub building_type: BuildingType,
    /// Top-left tile of the footprint.
    pub base_tile: (u32, u32),
    /// Construction progress, 0..=100. Below 100 the building provides
    /// no population space and cannot produce.
    pub build_percentage: f32,
    /// Set once the footprint occupancy has been committed to the map
    /// at construction start.
    pub footprint_committed: bool,
    /// FIFO of unit classes awaiting production.
    pub production_queue: VecDeque<UnitClass>,
    /// Progress of the front queue item only, 0..=100.
    pub production_progress: f32,
    /// Whether the front queue item is actively progressing (false while
    /// the owner is housed).
    pub production_active: bool,
    /// Remaining resource points (gaia nodes only).
    pub resource_remaining: f32,
}

impl Building {
    /// Create a 0% foundation.
    #[must_use]
    pub fn new_foundation(building_type: BuildingType, base_tile: (u32, u32)) -> Self {
        Self {
            building_type,
            base_tile,
            build_percentage: 0.0,
            footprint_committed: false,
            production_queue: VecDeque::new(),
            production_progress: 0.0,
            production_active: false,
            resource_remaining: 0.0,
        }
    }

    /// Create a fully constructed building (map generation, tests).
    #[must_use]
    pub fn new_completed(building_type: BuildingType, base_tile: (u32, u32)) -> Self {
        Self {
            building_type,
            base_tile,
            build_percentage: 100.0,
            footprint_committed: true,
            production_queue: VecDeque::new(),
            production_progress: 0.0,
            production_active: false,
            resource_remaining: 0.0,
        }
    }

    /// Whether construction has finished.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.build_percentage >= 100.0
    }

    /// Footprint rectangle in map coordinates for a given size.
    #[must_use]
    pub fn footprint_rect(&self, size: (u32, u32)) -> (f32, f32, f32, f32) {
        let (bx, by) = self.base_tile;
        (
            bx as f32,
            by as f32,
            (bx + size.0) as f32,
            (by + size.1) as f32,
        )
    }

    /// Center of the footprint in map coordinates.
    #[must_use]
    pub fn center(&self, size: (u32, u32)) -> Vec2 {
        let (min_x, min_y, max_x, max_y) = self.footprint_rect(size);
        Vec2::new((min_x + max_x) / 2.0, (min_y + max_y) / 2.0)
    }

    /// Closest point of the footprint to `p`.
    #[must_use]
    pub fn closest_point(&self, size: (u32, u32), p: Vec2) -> Vec2 {
        let (min_x, min_y, max_x, max_y) = self.footprint_rect(size);
        closest_point_on_rect(p, min_x, min_y, max_x, max_y)
    }
}
