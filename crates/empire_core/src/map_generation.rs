//! Match-start map generation: elevation, gaia resources, player
//! starts.
//!
//! Generation is fully deterministic for a given seed and runs once at
//! `StartGame`; afterwards the elevation grid is read-only. The output
//! is a plain description (tiles and positions) that the match
//! aggregate turns into live objects, so occupancy and creation deltas
//! flow through the normal spawn paths.

use serde::{Deserialize, Serialize};

use crate::buildings::BuildingType;
use crate::map::{Map, MAX_ELEVATION};
use crate::math::Vec2;

/// Map generation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapConfig {
    /// Map width in tiles.
    pub width: u32,
    /// Map height in tiles.
    pub height: u32,
    /// Random seed for deterministic generation.
    pub seed: u64,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            width: 64,
            height: 64,
            seed: 12345,
        }
    }
}

/// One player's starting position.
#[derive(Debug, Clone)]
pub struct PlayerStart {
    /// Base tile of the starting town center.
    pub town_center: (u32, u32),
    /// Starting villager positions.
    pub villagers: Vec<Vec2>,
}

/// Everything the match aggregate needs to populate a new map.
#[derive(Debug)]
pub struct GeneratedMap {
    /// The terrain with elevation applied.
    pub map: Map,
    /// Gaia resource nodes as (type, tile) pairs. Tiles that turn out
    /// to be occupied at insert time are skipped.
    pub gaia: Vec<(BuildingType, (u32, u32))>,
    /// Per-player starts, index = player index.
    pub starts: Vec<PlayerStart>,
}

/// Simple deterministic PRNG for map generation.
///
/// Linear congruential; not suitable for anything security-related,
/// but stable across platforms which is all map generation needs.
struct MapRng {
    state: u64,
}

impl MapRng {
    fn new(seed: u64) -> Self {
        Self {
            state: seed.wrapping_add(0x9E37_79B9_7F4A_7C15),
        }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        self.state
    }

    /// Uniform value in `[lo, hi)`.
    fn next_range(&mut self, lo: u32, hi: u32) -> u32 {
        debug_assert!(lo < hi);
        lo + (self.next_u64() >> 32) as u32 % (hi - lo)
    }
}

/// Side length of the area reserved around each player start.
const START_CLEARANCE: u32 = 8;

/// Town-center footprint edge (matches the stats table).
const TOWN_CENTER_SIZE: u32 = 3;

/// Generate a map for the given player count.
pub fn generate(config: &MapConfig, player_count: u8) -> GeneratedMap {
    let mut rng = MapRng::new(config.seed);
    let mut map = Map::new(config.width, config.height);

    generate_elevation(config, &mut map, &mut rng);
    let starts = generate_starts(config, player_count, &mut rng);
    let gaia = generate_gaia(config, &starts, &mut rng);

    GeneratedMap { map, gaia, starts }
}

/// Raise a handful of gentle hills in the corner-elevation grid.
fn generate_elevation(config: &MapConfig, map: &mut Map, rng: &mut MapRng) {
    let hill_count = (config.width * config.height / 512).max(2);
    for _ in 0..hill_count {
        let cx = rng.next_range(0, config.width + 1) as i64;
        let cy = rng.next_range(0, config.height + 1) as i64;
        let peak = rng.next_range(1, MAX_ELEVATION as u32 + 1) as i64;
        let radius = rng.next_range(3, 9) as i64;

        for y in (cy - radius).max(0)..=(cy + radius).min(config.height as i64) {
            for x in (cx - radius).max(0)..=(cx + radius).min(config.width as i64) {
                let dist = (x - cx).abs().max((y - cy).abs());
                let height = peak - dist;
                if height > 0 {
                    let current = map.elevation_at(x as u32, y as u32) as i64;
                    if height > current {
                        map.set_elevation(x as u32, y as u32, height as i32);
                    }
                }
            }
        }
    }
}

/// Place player starts in opposing map regions with jitter.
fn generate_starts(config: &MapConfig, player_count: u8, rng: &mut MapRng) -> Vec<PlayerStart> {
    let padding = (config.width.min(config.height) / 6).max(START_CLEARANCE);

    // Anchor corners: two players face off diagonally, four take all
    // corners.
    let anchors = [
        (padding, padding),
        (config.width - padding, config.height - padding),
        (config.width - padding, padding),
        (padding, config.height - padding),
    ];

    let mut starts = Vec::new();
    for index in 0..player_count as usize {
        let (ax, ay) = anchors[index];
        let jitter = 2;
        let bx = (ax + rng.next_range(0, jitter * 2 + 1))
            .saturating_sub(jitter)
            .clamp(1, config.width - TOWN_CENTER_SIZE - 1);
        let by = (ay + rng.next_range(0, jitter * 2 + 1))
            .saturating_sub(jitter)
            .clamp(1, config.height - TOWN_CENTER_SIZE - 1);

        // Villagers line up under the town center.
        let villagers = (0..3)
            .map(|i| {
                Vec2::new(
                    bx as f32 + 0.5 + i as f32,
                    (by + TOWN_CENTER_SIZE) as f32 + 0.5,
                )
            })
            .collect();

        starts.push(PlayerStart {
            town_center: (bx, by),
            villagers,
        });
    }
    starts
}

/// Scatter gaia resources: forests, mines and forage bushes, with a
/// guaranteed set near each player start.
fn generate_gaia(
    config: &MapConfig,
    starts: &[PlayerStart],
    rng: &mut MapRng,
) -> Vec<(BuildingType, (u32, u32))> {
    let mut gaia = Vec::new();

    let too_close_to_start = |x: u32, y: u32| {
        starts.iter().any(|start| {
            let (sx, sy) = start.town_center;
            x.abs_diff(sx) < START_CLEARANCE && y.abs_diff(sy) < START_CLEARANCE
        })
    };

    // Starter resources just outside each clearance zone.
    for start in starts {
        let (sx, sy) = start.town_center;
        let cx = sx.min(config.width - START_CLEARANCE - 4);
        let cy = sy.min(config.height - START_CLEARANCE - 4);

        for i in 0..6 {
            gaia.push((
                BuildingType::Tree,
                (cx + START_CLEARANCE + (i % 3), cy + (i / 3)),
            ));
        }
        for i in 0..4 {
            gaia.push((BuildingType::ForageBush, (cx + (i % 2), cy + START_CLEARANCE + (i / 2))));
        }
        for i in 0..3 {
            gaia.push((
                BuildingType::GoldMine,
                (cx + START_CLEARANCE + i, cy + START_CLEARANCE),
            ));
        }
        for i in 0..2 {
            gaia.push((
                BuildingType::StoneMine,
                (cx + START_CLEARANCE + i, cy + START_CLEARANCE + 2),
            ));
        }
    }

    // Random forests across the rest of the map.
    let forest_count = (config.width * config.height / 256).max(4);
    for _ in 0..forest_count {
        let cx = rng.next_range(1, config.width - 1);
        let cy = rng.next_range(1, config.height - 1);
        if too_close_to_start(cx, cy) {
            continue;
        }
        let tree_count = rng.next_range(4, 12);
        for _ in 0..tree_count {
            let dx = rng.next_range(0, 7) as i64 - 3;
            let dy = rng.next_range(0, 7) as i64 - 3;
            let tx = cx as i64 + dx;
            let ty = cy as i64 + dy;
            if tx < 0 || ty < 0 || tx >= config.width as i64 || ty >= config.height as i64 {
                continue;
            }
            if too_close_to_start(tx as u32, ty as u32) {
                continue;
            }
            gaia.push((BuildingType::Tree, (tx as u32, ty as u32)));
        }
    }

    gaia
}
