//! Grid-based pathfinding: A* with direction-encoded backtracking and
//! corridor smoothing.
//!
//! The search runs over the unit-occupancy grid with 8-connected
//! movement (orthogonal cost 1, diagonal cost sqrt(2)) and the octile
//! distance heuristic. Each expanded tile stores the direction it was
//! entered from as a one-byte code, which both replaces a
//! predecessor map and encodes the corner-cutting rule: a diagonal
//! step is only taken when the two flanking orthogonal neighbors are
//! free.
//!
//! When the literal goal is unreachable the search falls back to the
//! expanded tile with the smallest heuristic value, so units walk as
//! close as they can get. The raw tile-center path is then smoothed by
//! removing waypoints whose neighbors are joined by a unit-radius-wide
//! corridor free of building-occupied tiles (standing units are
//! deliberately ignored by smoothing; they are handled by collision
//! and evasion at move time).

use crate::map::Map;
use crate::math::Vec2;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Cost of a diagonal step.
const SQRT_2: f32 = std::f32::consts::SQRT_2;

/// A pathfinding goal: a bare coordinate or a building footprint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathGoal {
    /// Free movement to an exact map coordinate.
    Point(Vec2),
    /// Movement onto/against a footprint; its tiles are treated as
    /// passable so a path can be planned "into" the target.
    Footprint {
        /// Top-left tile.
        base: (u32, u32),
        /// Size in tiles.
        size: (u32, u32),
    },
}

impl PathGoal {
    fn contains_tile(&self, x: u32, y: u32) -> bool {
        match *self {
            Self::Point(p) => {
                let (gx, gy) = p.tile();
                x == gx && y == gy
            }
            Self::Footprint { base, size } => {
                x >= base.0 && x < base.0 + size.0 && y >= base.1 && y < base.1 + size.1
            }
        }
    }

    fn reference_tile(&self) -> (u32, u32) {
        match *self {
            Self::Point(p) => p.tile(),
            Self::Footprint { base, size } => (base.0 + size.0 / 2, base.1 + size.1 / 2),
        }
    }
}

/// Per-tile backpointer code: the direction the tile was entered from
/// during the current search.
///
/// Eleven codes: unvisited, the search start, the eight entry
/// directions, and a blocked marker caching impassability for the
/// remainder of the search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum DirectionCode {
    Unvisited = 0,
    Start = 1,
    East = 2,
    SouthEast = 3,
    South = 4,
    SouthWest = 5,
    West = 6,
    NorthWest = 7,
    North = 8,
    NorthEast = 9,
    Blocked = 10,
}

impl DirectionCode {
    /// The step (dx, dy) that entered a tile with this code.
    const fn step(self) -> (i32, i32) {
        match self {
            Self::East => (1, 0),
            Self::SouthEast => (1, 1),
            Self::South => (0, 1),
            Self::SouthWest => (-1, 1),
            Self::West => (-1, 0),
            Self::NorthWest => (-1, -1),
            Self::North => (0, -1),
            Self::NorthEast => (1, -1),
            _ => (0, 0),
        }
    }
}

/// Neighbor expansion order; fixed so tie-breaking is deterministic.
const DIRECTIONS: [(i32, i32, DirectionCode); 8] = [
    (1, 0, DirectionCode::East),
    (1, 1, DirectionCode::SouthEast),
    (0, 1, DirectionCode::South),
    (-1, 1, DirectionCode::SouthWest),
    (-1, 0, DirectionCode::West),
    (-1, -1, DirectionCode::NorthWest),
    (0, -1, DirectionCode::North),
    (1, -1, DirectionCode::NorthEast),
];

/// A node in the A* open set.
#[derive(Debug, Clone, Copy, PartialEq)]
struct AStarNode {
    x: u32,
    y: u32,
    f_score: f32,
    /// Tie-breaker for determinism: lower coordinates first.
    tie_breaker: u64,
}

impl Eq for AStarNode {}

impl Ord for AStarNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse for min-heap behavior.
        match other
            .f_score
            .partial_cmp(&self.f_score)
            .unwrap_or(Ordering::Equal)
        {
            Ordering::Equal => other.tie_breaker.cmp(&self.tie_breaker),
            ord => ord,
        }
    }
}

impl PartialOrd for AStarNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[inline]
fn tie_breaker(x: u32, y: u32) -> u64 {
    (u64::from(y) << 32) | u64::from(x)
}

/// Octile distance: exact path length on an empty 8-connected grid.
#[inline]
fn octile_heuristic(x1: u32, y1: u32, x2: u32, y2: u32) -> f32 {
    let dx = x1.abs_diff(x2) as f32;
    let dy = y1.abs_diff(y2) as f32;
    dx.max(dy) + (SQRT_2 - 1.0) * dx.min(dy)
}

/// Scratch grids for one search.
struct SearchGrid {
    width: u32,
    codes: Vec<DirectionCode>,
    g_score: Vec<f32>,
}

impl SearchGrid {
    fn new(width: u32, height: u32) -> Self {
        let len = (width as usize) * (height as usize);
        Self {
            width,
            codes: vec![DirectionCode::Unvisited; len],
            g_score: vec![f32::INFINITY; len],
        }
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        (y as usize) * (self.width as usize) + (x as usize)
    }

    #[inline]
    fn code(&self, x: u32, y: u32) -> DirectionCode {
        self.codes[self.index(x, y)]
    }

    #[inline]
    fn set_code(&mut self, x: u32, y: u32, code: DirectionCode) {
        let index = self.index(x, y);
        self.codes[index] = code;
    }

    #[inline]
    fn g(&self, x: u32, y: u32) -> f32 {
        self.g_score[self.index(x, y)]
    }

    #[inline]
    fn set_g(&mut self, x: u32, y: u32, g: f32) {
        let index = self.index(x, y);
        self.g_score[index] = g;
    }

    /// Passability with per-search caching via the blocked code.
    fn passable(&mut self, map: &Map, goal: &PathGoal, x: u32, y: u32) -> bool {
        if !map.tile_in_bounds(x, y) {
            return false;
        }
        match self.code(x, y) {
            DirectionCode::Blocked => false,
            DirectionCode::Unvisited => {
                if goal.contains_tile(x, y) || !map.is_occupied_for_units(x, y) {
                    true
                } else {
                    self.set_code(x, y, DirectionCode::Blocked);
                    false
                }
            }
            _ => true,
        }
    }
}

/// Plan a path from `start` to `goal` for a unit of the given radius.
///
/// Returns waypoints in consumption order (nearest first). The starting
/// position itself is not included. Returns `None` when the unit cannot
/// move toward the goal at all; when only the literal goal is
/// unreachable the path leads to the closest reachable approach
/// instead.
#[must_use]
pub fn plan_path(map: &Map, start: Vec2, goal: &PathGoal, radius: f32) -> Option<Vec<Vec2>> {
    if !map.coord_in_bounds(start) {
        return None;
    }
    let (start_x, start_y) = start.tile();

    let mut grid = SearchGrid::new(map.width(), map.height());
    let mut open_set: BinaryHeap<AStarNode> = BinaryHeap::new();

    let (ref_x, ref_y) = goal.reference_tile();
    let start_h = octile_heuristic(start_x, start_y, ref_x, ref_y);

    grid.set_code(start_x, start_y, DirectionCode::Start);
    grid.set_g(start_x, start_y, 0.0);
    open_set.push(AStarNode {
        x: start_x,
        y: start_y,
        f_score: start_h,
        tie_breaker: tie_breaker(start_x, start_y),
    });

    // Closest reachable approach, used when the literal goal cannot be
    // expanded.
    let mut best = (start_x, start_y);
    let mut best_h = start_h;

    let mut goal_tile = None;

    while let Some(current) = open_set.pop() {
        if goal.contains_tile(current.x, current.y) {
            goal_tile = Some((current.x, current.y));
            break;
        }

        let current_g = grid.g(current.x, current.y);

        let current_h = octile_heuristic(current.x, current.y, ref_x, ref_y);
        if current_h < best_h {
            best_h = current_h;
            best = (current.x, current.y);
        }

        for (dx, dy, code) in DIRECTIONS {
            let nx = current.x as i64 + i64::from(dx);
            let ny = current.y as i64 + i64::from(dy);
            if nx < 0 || ny < 0 || nx >= i64::from(map.width()) || ny >= i64::from(map.height()) {
                continue;
            }
            let (nx, ny) = (nx as u32, ny as u32);

            if !grid.passable(map, goal, nx, ny) {
                continue;
            }

            // Diagonal steps must not cut a blocked corner: both
            // flanking orthogonal neighbors have to be free.
            let diagonal = dx != 0 && dy != 0;
            if diagonal {
                let flank_a = ((current.x as i64 + i64::from(dx)) as u32, current.y);
                let flank_b = (current.x, (current.y as i64 + i64::from(dy)) as u32);
                if !grid.passable(map, goal, flank_a.0, flank_a.1)
                    || !grid.passable(map, goal, flank_b.0, flank_b.1)
                {
                    continue;
                }
            }

            let step_cost = if diagonal { SQRT_2 } else { 1.0 };
            let tentative_g = current_g + step_cost;

            if tentative_g < grid.g(nx, ny) {
                grid.set_code(nx, ny, code);
                grid.set_g(nx, ny, tentative_g);
                open_set.push(AStarNode {
                    x: nx,
                    y: ny,
                    f_score: tentative_g + octile_heuristic(nx, ny, ref_x, ref_y),
                    tie_breaker: tie_breaker(nx, ny),
                });
            }
        }
    }

    let end_tile = match goal_tile {
        Some(tile) => tile,
        None => {
            if best == (start_x, start_y) {
                // Not even one step toward the goal is possible.
                return None;
            }
            best
        }
    };

    let mut waypoints = reconstruct(&grid, start, end_tile);

    // A bare point goal ends at the exact requested coordinate rather
    // than the tile center, provided the literal goal was reached.
    if let PathGoal::Point(p) = *goal {
        if goal_tile.is_some() {
            if waypoints.len() == 1 {
                // Start tile is the goal tile; step to the point itself.
                waypoints.push(p);
            } else if let Some(last) = waypoints.last_mut() {
                *last = p;
            }
        }
    }

    smooth_path(map, &mut waypoints, radius);

    // Drop the leading entry (the start position itself).
    waypoints.remove(0);
    Some(waypoints)
}

/// Walk the direction codes back from the end tile. The first entry is
/// the exact start coordinate; subsequent entries are tile centers.
fn reconstruct(grid: &SearchGrid, start: Vec2, end_tile: (u32, u32)) -> Vec<Vec2> {
    let mut tiles = Vec::new();
    let (mut x, mut y) = end_tile;

    loop {
        let code = grid.code(x, y);
        if code == DirectionCode::Start {
            break;
        }
        tiles.push((x, y));
        let (dx, dy) = code.step();
        x = (x as i64 - i64::from(dx)) as u32;
        y = (y as i64 - i64::from(dy)) as u32;
    }

    let mut waypoints = Vec::with_capacity(tiles.len() + 1);
    waypoints.push(start);
    for &(tx, ty) in tiles.iter().rev() {
        waypoints.push(Vec2::new(tx as f32 + 0.5, ty as f32 + 0.5));
    }
    waypoints
}

/// Remove interior waypoints whose neighbors are joined by a clear
/// unit-radius corridor.
///
/// Proceeds back to front so a removal never disturbs segments that
/// were already validated.
fn smooth_path(map: &Map, waypoints: &mut Vec<Vec2>, radius: f32) {
    if waypoints.len() < 3 {
        return;
    }
    let mut i = waypoints.len() - 2;
    while i >= 1 {
        if corridor_is_free(map, waypoints[i - 1], waypoints[i + 1], radius) {
            waypoints.remove(i);
        }
        i -= 1;
    }
}

/// Whether a straight corridor of the given radius between two points
/// crosses no building-occupied tile.
///
/// Rasterizes the circle-swept segment against the building-occupancy
/// grid only; unit occupancy is intentionally not consulted.
#[must_use]
pub fn corridor_is_free(map: &Map, from: Vec2, to: Vec2, radius: f32) -> bool {
    let min_x = (from.x.min(to.x) - radius).floor().max(0.0) as u32;
    let min_y = (from.y.min(to.y) - radius).floor().max(0.0) as u32;
    let max_x = ((from.x.max(to.x) + radius).ceil() as u32).min(map.width());
    let max_y = ((from.y.max(to.y) + radius).ceil() as u32).min(map.height());

    let radius_sq = radius * radius;
    for ty in min_y..max_y {
        for tx in min_x..max_x {
            if !map.is_occupied_for_buildings(tx, ty) {
                continue;
            }
            let dist_sq = segment_rect_distance_squared(
                from,
                to,
                tx as f32,
                ty as f32,
                (tx + 1) as f32,
                (ty + 1) as f32,
            );
            if dist_sq < radius_sq {
                return false;
            }
        }
    }
    true
}

/// Squared distance between a segment and an axis-aligned rectangle.
///
/// The distance from a point to a convex set is convex along the
/// segment, so a ternary search converges on the minimum.
fn segment_rect_distance_squared(
    a: Vec2,
    b: Vec2,
    min_x: f32,
    min_y: f32,
    max_x: f32,
    max_y: f32,
) -> f32 {
    let dist_at = |t: f32| -> f32 {
        let p = a + (b - a) * t;
        let clamped = Vec2::new(p.x.clamp(min_x, max_x), p.y.clamp(min_y, max_y));
        p.distance_squared(clamped)
    };

    let mut lo = 0.0_f32;
    let mut hi = 1.0_f32;
    for _ in 0..32 {
        let m1 = lo + (hi - lo) / 3.0;
        let m2 = hi - (hi - lo) / 3.0;
        if dist_at(m1) <= dist_at(m2) {
            hi = m2;
        } else {
            lo = m1;
        }
    }
    dist_at((lo + hi) / 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vec2(x: f32, y: f32) -> Vec2 {
        Vec2::new(x, y)
    }

    #[test]
    fn test_octile_heuristic() {
        assert_eq!(octile_heuristic(0, 0, 5, 0), 5.0);
        assert!((octile_heuristic(0, 0, 3, 3) - 3.0 * SQRT_2).abs() < 1e-5);
        assert!((octile_heuristic(0, 0, 5, 2) - (3.0 + 2.0 * SQRT_2)).abs() < 1e-5);
    }

    #[test]
    fn test_straight_path_smooths_to_goal() {
        let map = Map::new(10, 10);
        let path = plan_path(
            &map,
            vec2(0.5, 0.5),
            &PathGoal::Point(vec2(7.3, 0.5)),
            0.2,
        )
        .unwrap();

        // An open row smooths down to the exact goal coordinate.
        assert_eq!(path.last().copied(), Some(vec2(7.3, 0.5)));
        assert_eq!(path.len(), 1);
    }

    #[test]
    fn test_path_routes_around_wall() {
        let mut map = Map::new(10, 10);
        for y in 0..8 {
            map.set_footprint_occupied(5, y, 1, 1, true);
        }

        let path = plan_path(
            &map,
            vec2(2.5, 2.5),
            &PathGoal::Point(vec2(8.5, 2.5)),
            0.2,
        )
        .unwrap();

        // Every segment must clear the wall by the unit radius.
        let mut prev = vec2(2.5, 2.5);
        for &wp in &path {
            assert!(corridor_is_free(&map, prev, wp, 0.2));
            prev = wp;
        }
        assert_eq!(path.last().copied(), Some(vec2(8.5, 2.5)));
    }

    #[test]
    fn test_unreachable_goal_falls_back_to_closest_approach() {
        let mut map = Map::new(10, 10);
        // Wall off the right-hand side entirely.
        for y in 0..10 {
            map.set_footprint_occupied(6, y, 1, 1, true);
        }

        let path = plan_path(
            &map,
            vec2(1.5, 5.5),
            &PathGoal::Point(vec2(8.5, 5.5)),
            0.2,
        )
        .unwrap();

        // The path ends just west of the wall: the closest reachable tile.
        let end = path.last().unwrap();
        assert!(end.x < 6.0);
        assert!(end.x > 4.0);
    }

    #[test]
    fn test_fully_enclosed_start_has_no_path() {
        let mut map = Map::new(5, 5);
        for (x, y) in [(1, 1), (2, 1), (3, 1), (1, 2), (3, 2), (1, 3), (2, 3), (3, 3)] {
            map.set_footprint_occupied(x, y, 1, 1, true);
        }

        assert!(plan_path(
            &map,
            vec2(2.5, 2.5),
            &PathGoal::Point(vec2(4.5, 4.5)),
            0.2,
        )
        .is_none());
    }

    #[test]
    fn test_no_corner_cutting() {
        let mut map = Map::new(6, 6);
        // Two blocks meeting diagonally at (3, 3)
        map.set_footprint_occupied(2, 2, 1, 1, true);
        map.set_footprint_occupied(3, 3, 1, 1, true);

        let path = plan_path(
            &map,
            vec2(2.5, 3.5),
            &PathGoal::Point(vec2(3.5, 2.5)),
            0.1,
        )
        .unwrap();

        // The direct diagonal squeezes between two blocked corners and
        // must not be taken; the route has to go around.
        assert!(path.len() >= 2);
    }

    #[test]
    fn test_footprint_goal_is_passable() {
        let mut map = Map::new(10, 10);
        // A committed 3x3 building at (4, 4)
        map.set_footprint_occupied(4, 4, 3, 3, true);

        let path = plan_path(
            &map,
            vec2(0.5, 0.5),
            &PathGoal::Footprint {
                base: (4, 4),
                size: (3, 3),
            },
            0.2,
        )
        .unwrap();

        // The final waypoint lies inside the footprint.
        let end = path.last().unwrap();
        assert!(end.x >= 4.0 && end.x <= 7.0);
        assert!(end.y >= 4.0 && end.y <= 7.0);
    }

    #[test]
    fn test_determinism() {
        let mut map = Map::new(20, 20);
        for y in 5..15 {
            map.set_footprint_occupied(10, y, 1, 1, true);
        }

        let start = vec2(5.5, 10.5);
        let goal = PathGoal::Point(vec2(15.5, 10.5));

        let path1 = plan_path(&map, start, &goal, 0.2).unwrap();
        let path2 = plan_path(&map, start, &goal, 0.2).unwrap();
        let path3 = plan_path(&map, start, &goal, 0.2).unwrap();

        assert_eq!(path1, path2);
        assert_eq!(path2, path3);
    }

    #[test]
    fn test_smoothing_never_crosses_buildings() {
        let mut map = Map::new(16, 16);
        map.set_footprint_occupied(6, 6, 2, 2, true);
        map.set_footprint_occupied(10, 3, 3, 3, true);
        map.set_footprint_occupied(3, 10, 1, 4, true);

        let radius = 0.3;
        let path = plan_path(
            &map,
            vec2(1.5, 1.5),
            &PathGoal::Point(vec2(14.5, 14.5)),
            radius,
        )
        .unwrap();

        let mut prev = vec2(1.5, 1.5);
        for &wp in &path {
            assert!(
                corridor_is_free(&map, prev, wp, radius),
                "segment {prev:?} -> {wp:?} clips a building"
            );
            prev = wp;
        }
    }

    #[test]
    fn test_segment_rect_distance() {
        // Segment passing straight over the rect: distance 0
        let d = segment_rect_distance_squared(
            vec2(0.0, 0.5),
            vec2(4.0, 0.5),
            1.0,
            0.0,
            2.0,
            1.0,
        );
        assert!(d < 1e-6);

        // Segment parallel to the rect at distance 1
        let d = segment_rect_distance_squared(
            vec2(0.0, 2.0),
            vec2(4.0, 2.0),
            1.0,
            0.0,
            2.0,
            1.0,
        );
        assert!((d - 1.0).abs() < 1e-4);
    }
}
