//! Collision queries between circular unit bodies, the occupancy grid,
//! and other units, plus the sideways evade maneuver.
//!
//! All queries are pure; nothing here mutates simulation state.

use crate::map::Map;
use crate::math::{circle_circle_intersection, closest_point_on_rect, Vec2};
use crate::objects::{ObjectId, ObjectKind, ObjectTable};

/// What a candidate position collided with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionHit {
    /// Outside the map (or a NaN coordinate).
    OutOfBounds,
    /// An occupied tile.
    Tile(u32, u32),
    /// Another live unit.
    Unit(ObjectId),
}

/// Test whether a unit of `radius`, identified by `unit_id`, would
/// collide when placed at `candidate`.
///
/// Checks in order: map bounds including the radius (NaN coordinates
/// fail the negated comparison), circle versus every unit-occupied
/// tile inside the bounding box, then circle versus every other live
/// unit using the sum of both radii.
#[must_use]
pub fn unit_collides_at(
    map: &Map,
    objects: &ObjectTable,
    unit_id: ObjectId,
    radius: f32,
    candidate: Vec2,
    unit_radius_of: impl Fn(ObjectId) -> f32,
) -> Option<CollisionHit> {
    // Bounds, written so NaN fails.
    if !(candidate.x >= radius
        && candidate.y >= radius
        && candidate.x <= map.width() as f32 - radius
        && candidate.y <= map.height() as f32 - radius)
    {
        return Some(CollisionHit::OutOfBounds);
    }

    // Circle vs. occupied tiles in the bounding box.
    let min_x = (candidate.x - radius).floor().max(0.0) as u32;
    let min_y = (candidate.y - radius).floor().max(0.0) as u32;
    let max_x = ((candidate.x + radius).ceil() as u32).min(map.width());
    let max_y = ((candidate.y + radius).ceil() as u32).min(map.height());

    let radius_sq = radius * radius;
    for ty in min_y..max_y {
        for tx in min_x..max_x {
            if !map.is_occupied_for_units(tx, ty) {
                continue;
            }
            let closest = closest_point_on_rect(
                candidate,
                tx as f32,
                ty as f32,
                (tx + 1) as f32,
                (ty + 1) as f32,
            );
            if candidate.distance_squared(closest) < radius_sq {
                return Some(CollisionHit::Tile(tx, ty));
            }
        }
    }

    // Circle vs. every other live unit. Sorted order keeps the reported
    // collider deterministic.
    for other_id in objects.sorted_ids() {
        if other_id == unit_id {
            continue;
        }
        let Some(other) = objects.get(other_id) else {
            continue;
        };
        let ObjectKind::Unit(other_unit) = &other.kind else {
            continue;
        };
        let combined = radius + unit_radius_of(other_id);
        if candidate.distance_squared(other_unit.position) < combined * combined {
            return Some(CollisionHit::Unit(other_id));
        }
    }

    None
}

/// Compute a sideways step around a single blocking unit.
///
/// Intersects the circle of radius `move_distance` around the mover's
/// current position with the circle of radius `combined_radius` around
/// the obstacle, and returns the intersection point closest to the
/// originally desired position. Returns `None` when the circles do not
/// intersect — the obstacle is too close or too far for any valid
/// side-step at this move distance.
#[must_use]
pub fn try_evade_unit(
    mover_position: Vec2,
    desired_position: Vec2,
    move_distance: f32,
    obstacle_position: Vec2,
    combined_radius: f32,
) -> Option<Vec2> {
    let (p1, p2) = circle_circle_intersection(
        mover_position,
        move_distance,
        obstacle_position,
        combined_radius,
    )?;

    if p1.distance_squared(desired_position) <= p2.distance_squared(desired_position) {
        Some(p1)
    } else {
        Some(p2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::{Unit, UnitClass};

    const RADIUS: f32 = 0.2;

    fn table_with_unit_at(pos: Vec2) -> (ObjectTable, ObjectId) {
        let mut objects = ObjectTable::new();
        let id = objects.insert(0, 25.0, ObjectKind::Unit(Unit::new(UnitClass::Villager, pos)));
        (objects, id)
    }

    #[test]
    fn test_out_of_bounds_and_nan() {
        let map = Map::new(8, 8);
        let objects = ObjectTable::new();

        let hit = |p: Vec2| unit_collides_at(&map, &objects, 0, RADIUS, p, |_| RADIUS);

        assert_eq!(hit(Vec2::new(0.1, 4.0)), Some(CollisionHit::OutOfBounds));
        assert_eq!(hit(Vec2::new(7.95, 4.0)), Some(CollisionHit::OutOfBounds));
        assert_eq!(hit(Vec2::new(f32::NAN, 4.0)), Some(CollisionHit::OutOfBounds));
        assert_eq!(hit(Vec2::new(4.0, 4.0)), None);
    }

    #[test]
    fn test_circle_vs_tile() {
        let mut map = Map::new(8, 8);
        map.set_footprint_occupied(3, 3, 1, 1, true);
        let objects = ObjectTable::new();

        // Center inside the tile
        assert_eq!(
            unit_collides_at(&map, &objects, 0, RADIUS, Vec2::new(3.5, 3.5), |_| RADIUS),
            Some(CollisionHit::Tile(3, 3))
        );
        // Grazing the tile edge from outside
        assert_eq!(
            unit_collides_at(&map, &objects, 0, RADIUS, Vec2::new(2.9, 3.5), |_| RADIUS),
            Some(CollisionHit::Tile(3, 3))
        );
        // Clear of the tile by more than the radius
        assert_eq!(
            unit_collides_at(&map, &objects, 0, RADIUS, Vec2::new(2.7, 3.5), |_| RADIUS),
            None
        );
    }

    #[test]
    fn test_circle_vs_unit_uses_combined_radii() {
        let map = Map::new(8, 8);
        let (objects, blocker) = table_with_unit_at(Vec2::new(4.0, 4.0));

        // Mover id 99 does not exist in the table; only the query matters.
        assert_eq!(
            unit_collides_at(&map, &objects, 99, RADIUS, Vec2::new(4.3, 4.0), |_| RADIUS),
            Some(CollisionHit::Unit(blocker))
        );
        assert_eq!(
            unit_collides_at(&map, &objects, 99, RADIUS, Vec2::new(4.5, 4.0), |_| RADIUS),
            None
        );
    }

    #[test]
    fn test_unit_ignores_itself() {
        let map = Map::new(8, 8);
        let (objects, id) = table_with_unit_at(Vec2::new(4.0, 4.0));

        assert_eq!(
            unit_collides_at(&map, &objects, id, RADIUS, Vec2::new(4.05, 4.0), |_| RADIUS),
            None
        );
    }

    #[test]
    fn test_collision_symmetry() {
        let map = Map::new(8, 8);
        let pos_a = Vec2::new(4.0, 4.0);
        let pos_b = Vec2::new(4.3, 4.1);

        let (objects_b, id_b) = table_with_unit_at(pos_b);
        let a_hits_b =
            unit_collides_at(&map, &objects_b, 0, RADIUS, pos_a, |_| RADIUS).is_some();

        let (objects_a, id_a) = table_with_unit_at(pos_a);
        let b_hits_a =
            unit_collides_at(&map, &objects_a, 0, RADIUS, pos_b, |_| RADIUS).is_some();

        assert_eq!(a_hits_b, b_hits_a);
        let _ = (id_a, id_b);
    }

    #[test]
    fn test_evade_picks_point_nearest_desired() {
        let mover = Vec2::new(0.0, 0.0);
        let obstacle = Vec2::new(0.5, 0.0);
        let desired = Vec2::new(0.3, 0.1);

        let evade = try_evade_unit(mover, desired, 0.3, obstacle, 0.4).expect("circles intersect");

        // The evade point keeps the move distance from the mover and
        // clears the obstacle by the combined radius.
        assert!((evade.distance(mover) - 0.3).abs() < 1e-4);
        assert!((evade.distance(obstacle) - 0.4).abs() < 1e-4);
        // Desired position is above the axis, so the returned point is too.
        assert!(evade.y > 0.0);
    }

    #[test]
    fn test_evade_fails_when_no_intersection() {
        let mover = Vec2::new(0.0, 0.0);
        // Obstacle too far: the move circle never reaches its radius ring.
        assert!(try_evade_unit(mover, Vec2::new(1.0, 0.0), 0.1, Vec2::new(5.0, 0.0), 0.4).is_none());
        // Mover deep inside the combined-radius ring with a tiny step.
        assert!(try_evade_unit(mover, Vec2::new(0.1, 0.0), 0.01, Vec2::new(0.05, 0.0), 0.4).is_none());
    }
}
