//! End-to-end scenarios over the simulation core: construction,
//! crowd movement, housing, and combat to the death.

use empire_core::prelude::*;
use empire_test_utils::fixtures;

/// Run one step and append the produced events to `log`.
fn step_collecting(game: &mut Game, log: &mut Vec<GameEvent>) {
    game.simulate(TICK_DURATION);
    log.extend(game.take_events());
}

#[test]
fn scenario_place_foundation_and_build_to_completion() {
    let mut game = fixtures::flat_game(20, 20, 1);
    fixtures::grant_resources(&mut game, 0);
    let villager = game.spawn_unit(0, UnitClass::Villager, Vec2::new(4.5, 6.5));
    let wood_before = game.player(0).unwrap().resources.wood;
    game.take_events();

    game.apply_command(
        0,
        PlayerCommand::PlaceBuildingFoundation {
            building_type: BuildingType::Barracks,
            base_tile: (5, 5),
            villagers: vec![villager],
        },
    )
    .unwrap();

    // Cost subtracted exactly once at placement.
    assert_eq!(game.player(0).unwrap().resources.wood, wood_before - 175);

    let foundation = game
        .objects()
        .sorted_ids()
        .into_iter()
        .last()
        .expect("foundation exists");

    // Build to completion; 50 s of construction plus the walk.
    let mut log = Vec::new();
    for _ in 0..2200 {
        step_collecting(&mut game, &mut log);
        let done = game
            .objects()
            .get(foundation)
            .and_then(GameObject::as_building)
            .is_some_and(Building::is_completed);
        if done {
            break;
        }
    }

    let building = game
        .objects()
        .get(foundation)
        .and_then(GameObject::as_building)
        .expect("building survives");
    assert!(building.is_completed());

    // The progress stream is monotonically increasing and reaches 100.
    let percentages: Vec<f32> = log
        .iter()
        .filter_map(|e| match e {
            GameEvent::BuildPercentageUpdate { id, percentage } if *id == foundation => {
                Some(*percentage)
            }
            _ => None,
        })
        .collect();
    assert!(!percentages.is_empty());
    assert!(percentages.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(*percentages.last().unwrap(), 100.0);

    // The committed footprint blocks both grids.
    assert!(game.map().is_occupied_for_buildings(6, 6));
    assert!(game.map().is_occupied_for_units(5, 5));
}

#[test]
fn scenario_movers_route_around_stationary_units_without_collisions() {
    let mut game = fixtures::flat_game(24, 24, 1);

    // Three stationary units camp on the goal.
    for pos in [
        Vec2::new(12.5, 12.5),
        Vec2::new(13.5, 12.5),
        Vec2::new(12.5, 13.5),
    ] {
        game.spawn_unit(0, UnitClass::Villager, pos);
    }

    let movers: Vec<ObjectId> = (0..5)
        .map(|i| {
            game.spawn_unit(
                0,
                UnitClass::Villager,
                Vec2::new(3.5 + i as f32 * 1.5, 4.5),
            )
        })
        .collect();

    game.apply_command(
        0,
        PlayerCommand::MoveToMapCoord {
            target: Vec2::new(12.5, 12.5),
            units: movers.clone(),
        },
    )
    .unwrap();

    for _ in 0..900 {
        game.simulate(TICK_DURATION);

        // Invariant: no unit ever occupies a collided position.
        for &id in &movers {
            let unit = game.objects().get(id).unwrap().as_unit().unwrap();
            let radius = game.data().unit(unit.class).radius;
            assert!(
                game_collision_free(&game, id, radius, unit.position),
                "unit {id} rests at a collided position {:?}",
                unit.position
            );
        }
    }

    // Everyone came to rest somewhere near the goal.
    for &id in &movers {
        let unit = game.objects().get(id).unwrap().as_unit().unwrap();
        assert!(unit.position.distance(Vec2::new(12.5, 12.5)) < 6.0);
    }
}

fn game_collision_free(game: &Game, id: ObjectId, radius: f32, pos: Vec2) -> bool {
    use empire_core::collision::unit_collides_at;
    // Unit-occupancy tiles include the unit's own stationary mark, so
    // only the bounds and circle-circle parts are meaningful here.
    unit_collides_at(
        game.map(),
        game.objects(),
        id,
        radius,
        pos,
        |other| {
            game.objects()
                .get(other)
                .and_then(GameObject::as_unit)
                .map_or(0.0, |u| game.data().unit(u.class).radius)
        },
    )
    .map_or(true, |hit| {
        matches!(hit, empire_core::collision::CollisionHit::Tile(..))
    })
}

#[test]
fn scenario_production_stalls_while_housed() {
    let mut game = fixtures::flat_game(24, 24, 1);
    fixtures::grant_resources(&mut game, 0);

    // Town center provides 5 space; 4 villagers leave one slot free.
    game.spawn_building(0, BuildingType::TownCenter, (2, 2), true);
    let barracks = game.spawn_building(0, BuildingType::Barracks, (8, 8), true);
    for i in 0..4 {
        game.spawn_unit(0, UnitClass::Villager, Vec2::new(14.5 + i as f32, 14.5));
    }
    game.take_events();

    for _ in 0..3 {
        game.apply_command(
            0,
            PlayerCommand::ProduceUnit {
                building: barracks,
                unit_type: UnitType::Militia as u16,
            },
        )
        .unwrap();
    }

    // First unit occupies the last slot: the player is housed while it
    // produces, and the second item stays frozen at 0%.
    let mut log = Vec::new();
    let unit_count_before = game.objects().len();
    fixtures::run_until(&mut game, 700, |game| {
        game.objects().len() > unit_count_before
    });
    log.extend(game.take_events());

    assert!(log
        .iter()
        .any(|e| matches!(e, GameEvent::HousedUpdate { player: 0, housed: true })));

    let building = game
        .objects()
        .get(barracks)
        .unwrap()
        .as_building()
        .unwrap();
    assert_eq!(building.production_queue.len(), 2);
    assert_eq!(building.production_progress, 0.0);
    assert!(game.player(0).unwrap().is_housed);

    // A house frees space: production resumes and the housed flag
    // clears.
    game.spawn_building(0, BuildingType::House, (16, 2), true);
    fixtures::run_steps(&mut game, 60);
    let events = game.take_events();
    assert!(events
        .iter()
        .any(|e| matches!(e, GameEvent::HousedUpdate { player: 0, housed: false })));
    let building = game
        .objects()
        .get(barracks)
        .unwrap()
        .as_building()
        .unwrap();
    assert!(building.production_active);
}

#[test]
fn scenario_mutual_attack_kills_exactly_one() {
    let mut game = fixtures::flat_game(16, 16, 2);
    let first = game.spawn_unit(0, UnitClass::Militia, Vec2::new(5.0, 5.0));
    let second = game.spawn_unit(1, UnitClass::Militia, Vec2::new(5.45, 5.0));
    game.take_events();

    game.apply_command(
        0,
        PlayerCommand::SetTarget {
            target: second,
            units: vec![first],
        },
    )
    .unwrap();
    game.apply_command(
        1,
        PlayerCommand::SetTarget {
            target: first,
            units: vec![second],
        },
    )
    .unwrap();

    // Militia: 40 HP, attack 4, armor 1 -> 3 net damage per cycle of
    // 1 s. ceil(40 / 3) = 14 completed cycles to the kill.
    let mut log = Vec::new();
    for _ in 0..(31 * 15) {
        step_collecting(&mut game, &mut log);
        if !game.objects().contains(second) {
            break;
        }
    }

    let deaths: Vec<ObjectId> = log
        .iter()
        .filter_map(|e| match e {
            GameEvent::ObjectDeath { id } => Some(*id),
            _ => None,
        })
        .collect();

    // The lower id strikes first within the tick, so exactly the
    // second unit dies, exactly once.
    assert_eq!(deaths, vec![second]);
    assert!(game.objects().contains(first));

    // No HP update for the loser after its death event.
    let death_index = log
        .iter()
        .position(|e| matches!(e, GameEvent::ObjectDeath { id } if *id == second))
        .unwrap();
    assert!(log[death_index..]
        .iter()
        .all(|e| !matches!(e, GameEvent::HpUpdate { id, .. } if *id == second)));

    // The survivor took 13 hits of 3: 40 - 39 = 1 HP.
    assert_eq!(game.objects().get(first).unwrap().displayed_hp(), 1);

    // Run on: the winner stops attacking and emits nothing further
    // about the dead id.
    let events_after: Vec<GameEvent> = {
        fixtures::run_steps(&mut game, 90);
        game.take_events()
    };
    assert!(events_after
        .iter()
        .all(|e| !matches!(e, GameEvent::HpUpdate { id, .. } if *id == second)));
}

#[test]
fn scenario_villager_gathers_and_drops_off() {
    let mut game = fixtures::flat_game(20, 20, 1);
    game.spawn_building(0, BuildingType::TownCenter, (2, 2), true);
    let tree = game.spawn_building(GAIA_PLAYER_INDEX, BuildingType::Tree, (10, 3), true);
    let villager = game.spawn_unit(0, UnitClass::Villager, Vec2::new(8.5, 3.5));
    let wood_before = game.player(0).unwrap().resources.wood;
    game.take_events();

    game.apply_command(
        0,
        PlayerCommand::SetTarget {
            target: tree,
            units: vec![villager],
        },
    )
    .unwrap();

    // Gather a full load (capacity 10 at 0.5/s = 20 s) plus travel.
    let mut log = Vec::new();
    for _ in 0..(31 * 45) {
        step_collecting(&mut game, &mut log);
        if game.player(0).unwrap().resources.wood > wood_before {
            break;
        }
    }

    // A full carry deposits exactly the carry capacity.
    assert_eq!(game.player(0).unwrap().resources.wood, wood_before + 10);

    // The task change was announced on the wire.
    assert!(log.iter().any(|e| matches!(
        e,
        GameEvent::ChangeUnitType {
            id,
            new_type: UnitType::Lumberjack
        } if *id == villager
    )));

    // After the drop-off the villager returns toward its tree.
    let unit = game.objects().get(villager).unwrap().as_unit().unwrap();
    assert_eq!(unit.manual_target, Some(tree));
}
