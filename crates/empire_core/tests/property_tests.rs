//! Property-based tests for the simulation's core guarantees.

use proptest::prelude::*;

use empire_core::collision::unit_collides_at;
use empire_core::prelude::*;
use empire_test_utils::fixtures;

/// Build an object table holding one villager at `pos`.
fn table_with_unit(pos: Vec2) -> ObjectTable {
    let mut objects = ObjectTable::new();
    objects.insert(0, 25.0, ObjectKind::Unit(Unit::new(UnitClass::Villager, pos)));
    objects
}

proptest! {
    /// `DoesUnitCollide(A, posA)` considering B agrees with
    /// `DoesUnitCollide(B, posB)` considering A: the distance test is
    /// symmetric in the pair of positions and the summed radii.
    #[test]
    fn collision_is_symmetric(
        ax in 1.0f32..15.0, ay in 1.0f32..15.0,
        bx in 1.0f32..15.0, by in 1.0f32..15.0,
        ra in 0.1f32..0.5, rb in 0.1f32..0.5,
    ) {
        let map = Map::new(16, 16);
        let pos_a = Vec2::new(ax, ay);
        let pos_b = Vec2::new(bx, by);

        let objects_b = table_with_unit(pos_b);
        let a_hits = unit_collides_at(&map, &objects_b, 0, ra, pos_a, |_| rb)
            .map_or(false, |hit| matches!(hit, empire_core::collision::CollisionHit::Unit(_)));

        let objects_a = table_with_unit(pos_a);
        let b_hits = unit_collides_at(&map, &objects_a, 0, rb, pos_b, |_| ra)
            .map_or(false, |hit| matches!(hit, empire_core::collision::CollisionHit::Unit(_)));

        prop_assert_eq!(a_hits, b_hits);
    }

    /// Path smoothing never produces a segment that clips a
    /// building-occupied tile within the unit's radius.
    #[test]
    fn smoothed_paths_clear_buildings(
        seed in 0u64..500,
        start_x in 0u32..4, start_y in 0u32..4,
        goal_x in 12u32..16, goal_y in 12u32..16,
    ) {
        let mut map = Map::new(16, 16);

        // Scatter deterministic pseudo-random blocks, keeping start
        // and goal tiles free.
        let mut state = seed.wrapping_add(1);
        for _ in 0..24 {
            state = state.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
            let tx = ((state >> 33) % 16) as u32;
            let ty = ((state >> 17) % 16) as u32;
            if (tx, ty) != (start_x, start_y) && (tx, ty) != (goal_x, goal_y) {
                map.set_footprint_occupied(tx, ty, 1, 1, true);
            }
        }

        let radius = 0.2;
        let start = Vec2::new(start_x as f32 + 0.5, start_y as f32 + 0.5);
        let goal = Vec2::new(goal_x as f32 + 0.5, goal_y as f32 + 0.5);

        if let Some(path) = empire_core::pathfinding::plan_path(
            &map,
            start,
            &empire_core::pathfinding::PathGoal::Point(goal),
            radius,
        ) {
            let mut prev = start;
            for wp in path {
                prop_assert!(
                    empire_core::pathfinding::corridor_is_free(&map, prev, wp, radius),
                    "segment {:?} -> {:?} clips a building", prev, wp
                );
                prev = wp;
            }
        }
    }

    /// Resources reconcile exactly across any sequence of enqueue and
    /// dequeue operations: ledger plus queued costs is invariant.
    #[test]
    fn resource_conservation_across_queue_ops(ops in proptest::collection::vec(0u8..3, 1..40)) {
        let mut game = fixtures::flat_game(16, 16, 1);
        fixtures::grant_resources(&mut game, 0);
        let barracks = game.spawn_building(0, BuildingType::Barracks, (4, 4), true);

        let invariant_before = game.resources_including_queued(0);

        for op in ops {
            match op {
                0 | 1 => {
                    // Enqueue; rejections must not mutate anything.
                    let _ = game.apply_command(0, PlayerCommand::ProduceUnit {
                        building: barracks,
                        unit_type: UnitType::Militia as u16,
                    });
                }
                _ => {
                    let _ = game.apply_command(0, PlayerCommand::DequeueProductionQueueItem {
                        building: barracks,
                        index_from_back: 0,
                    });
                }
            }
            prop_assert_eq!(game.resources_including_queued(0), invariant_before);
        }

        // Queue bound holds throughout.
        let queue_len = game.objects().get(barracks).unwrap()
            .as_building().unwrap().production_queue.len();
        prop_assert!(queue_len <= MAX_PRODUCTION_QUEUE_SIZE);
    }

    /// The evade point, when it exists, preserves the move distance
    /// from the mover and the combined radius from the obstacle.
    #[test]
    fn evade_point_lies_on_both_circles(
        ox in -1.0f32..1.0, oy in -1.0f32..1.0,
        move_distance in 0.05f32..0.5,
        combined in 0.2f32..0.8,
    ) {
        let mover = Vec2::ZERO;
        let obstacle = Vec2::new(ox, oy);
        let desired = Vec2::new(ox * 0.5, oy * 0.5);

        if let Some(point) = empire_core::collision::try_evade_unit(
            mover, desired, move_distance, obstacle, combined,
        ) {
            prop_assert!((point.distance(mover) - move_distance).abs() < 1e-3);
            prop_assert!((point.distance(obstacle) - combined).abs() < 1e-3);
        }
    }
}
