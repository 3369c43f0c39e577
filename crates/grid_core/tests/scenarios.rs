//! End-to-end movement and placement scenarios through `Simulation`.

use grid_core::buildings::BuildingFootprint;
use grid_core::coherence::CoherenceViolation;
use grid_core::error::GridError;
use grid_core::movement::{MovementEvent, MovementState};
use grid_core::occupant::{Liveness, OccupantId};
use grid_core::simulation::SpawnOutcome;
use grid_test_utils::fixtures::{artillery, building, buggy, grid, occupant, pos, simulation, tick_until};

#[test]
fn test_diagonal_move_frees_start_cell() {
    let mut sim = simulation(5, 5);
    let unit = sim.spawn_unit(&buggy(), pos(2, 2)).unwrap();

    sim.move_unit(unit, pos(4, 4)).unwrap();
    let path = sim
        .unit(unit)
        .and_then(|u| u.locomotion.as_vehicle())
        .map(|v| v.path().to_vec());
    assert_eq!(path, Some(vec![pos(3, 3), pos(4, 4)]));

    let ticks = tick_until(&mut sim, 500, |s| s.unit_state(unit) == Some(MovementState::Idle));
    assert!(ticks.is_some());

    assert_eq!(sim.current_grid_position(unit), Some(pos(4, 4)));
    assert!(sim.grid().is_free(pos(2, 2)));
    assert_eq!(sim.grid().occupant_at(pos(4, 4)), Some(unit));
}

#[test]
fn test_same_tick_race_has_one_winner() {
    let mut sim = simulation(3, 1);
    let u1 = sim.spawn_unit(&buggy(), pos(0, 0)).unwrap();
    let u2 = sim.spawn_unit(&buggy(), pos(2, 0)).unwrap();
    sim.move_unit(u1, pos(1, 0)).unwrap();
    sim.move_unit(u2, pos(1, 0)).unwrap();

    // First retry interval elapses on tick 2
    sim.tick();
    let events = sim.tick();

    let states = [sim.unit_state(u1), sim.unit_state(u2)];
    assert_eq!(
        states
            .iter()
            .filter(|s| **s == Some(MovementState::Moving))
            .count(),
        1
    );
    assert_eq!(sim.unit_state(u2), Some(MovementState::WaitingForNextCell));
    assert!(events
        .movement
        .contains(&(u1, MovementEvent::CellReserved { cell: pos(1, 0) })));

    // u1 parks on the contested cell, so u2 exhausts its retries
    let blocked = tick_until(&mut sim, 200, |s| s.unit_state(u2) == Some(MovementState::Blocked));
    assert!(blocked.is_some());
    assert_eq!(sim.current_grid_position(u2), Some(pos(2, 0)));
    assert_eq!(sim.grid().occupant_at(pos(2, 0)), Some(u2));
}

#[test]
fn test_partial_building_placement_rolls_back() {
    let mut grid = grid(12, 12);
    let blocker = occupant(1);
    let building_id = occupant(2);
    grid.register_unit(blocker, pos(7, 9)).unwrap();
    let footprint = BuildingFootprint::new(4, 2);

    let result = grid.try_occupy_building_cells(building_id, pos(5, 9), footprint);

    assert!(result.is_err());
    assert!(!grid.can_place_building(pos(5, 9), footprint));
    for cell in footprint.cells(pos(5, 9)) {
        if cell == pos(7, 9) {
            assert_eq!(grid.occupant_at(cell), Some(blocker));
        } else {
            assert!(grid.is_free(cell), "{cell} leaked");
        }
    }
    assert_eq!(grid.registered_building_count(), 0);
}

#[test]
fn test_redirect_mid_flight_walks_back() {
    let mut sim = simulation(10, 10);
    let unit = sim.spawn_unit(&buggy(), pos(0, 0)).unwrap();
    sim.move_unit(unit, pos(9, 9)).unwrap();

    let between = tick_until(&mut sim, 1000, |s| {
        s.is_moving(unit)
            && s.current_grid_position(unit) == Some(pos(4, 4))
            && s.grid().unit_position(unit) == Some(pos(5, 5))
    });
    assert!(between.is_some());

    sim.move_unit(unit, pos(0, 0)).unwrap();

    let mut entered = Vec::new();
    for _ in 0..2000 {
        let events = sim.tick();
        for (_, event) in events.movement {
            match event {
                MovementEvent::CellEntered { cell } => entered.push(cell),
                MovementEvent::CellReserved { cell } => assert_ne!(cell, pos(9, 9)),
                _ => {}
            }
        }
        if sim.unit_state(unit) == Some(MovementState::Idle) {
            break;
        }
    }

    assert_eq!(
        entered,
        vec![pos(5, 5), pos(4, 4), pos(3, 3), pos(2, 2), pos(1, 1), pos(0, 0)]
    );
    assert!(sim.grid().is_free(pos(9, 9)));
    assert_eq!(sim.grid().occupant_at(pos(0, 0)), Some(unit));
}

#[test]
fn test_convoy_follows_leader() {
    let mut sim = simulation(10, 1);
    let leader = sim.spawn_unit(&buggy(), pos(1, 0)).unwrap();
    let follower = sim.spawn_unit(&artillery(), pos(0, 0)).unwrap();

    sim.move_unit(leader, pos(9, 0)).unwrap();
    sim.move_unit(follower, pos(8, 0)).unwrap();

    let done = tick_until(&mut sim, 2000, |s| {
        s.unit_state(leader) == Some(MovementState::Idle)
            && s.unit_state(follower) == Some(MovementState::Idle)
    });
    assert!(done.is_some());
    assert_eq!(sim.current_grid_position(leader), Some(pos(9, 0)));
    assert_eq!(sim.current_grid_position(follower), Some(pos(8, 0)));
}

#[test]
fn test_spawn_queue_drains_in_order() {
    let mut sim = simulation(10, 10);
    let factory = sim.place_building(&building(2, 2, (2, 0)), pos(0, 0)).unwrap();

    let first = match sim.request_spawn(factory, &buggy()) {
        Ok(SpawnOutcome::Spawned(id)) => id,
        other => panic!("expected immediate spawn, got {other:?}"),
    };
    assert_eq!(
        sim.request_spawn(factory, &artillery()),
        Ok(SpawnOutcome::Queued { place: 1 })
    );

    sim.move_unit(first, pos(2, 5)).unwrap();
    let spawned = tick_until(&mut sim, 200, |s| s.units().count() == 2);
    assert!(spawned.is_some());

    let second = sim.units().find(|u| u.data_id == "artillery");
    assert_eq!(
        second.map(|u| u.locomotion.current_cell()),
        Some(pos(2, 0))
    );
}

#[test]
fn test_coherence_pass_heals_dead_holder() {
    let mut grid = grid(6, 6);
    let alive: std::collections::BTreeSet<OccupantId> = [occupant(1)].into_iter().collect();
    grid.register_unit(occupant(1), pos(0, 0)).unwrap();
    grid.register_unit(occupant(2), pos(1, 0)).unwrap();
    assert!(!alive.is_alive(occupant(2)));

    let report = grid.run_coherence_pass(60, &alive).unwrap();

    assert_eq!(report.purged, vec![occupant(2)]);
    assert!(report.is_clean());
    assert!(grid.is_free(pos(1, 0)));
    assert!(!report
        .violations
        .iter()
        .any(|v| matches!(v, CoherenceViolation::OrphanedCell { .. })));
}

#[test]
fn test_despawned_unit_frees_path_for_waiter() {
    let mut sim = simulation(3, 1);
    let parked = sim.spawn_unit(&buggy(), pos(1, 0)).unwrap();
    let mover = sim.spawn_unit(&buggy(), pos(0, 0)).unwrap();
    sim.move_unit(mover, pos(2, 0)).unwrap();

    tick_until(&mut sim, 10, |s| s.unit_state(mover) == Some(MovementState::WaitingForNextCell));
    sim.despawn_unit(parked).unwrap();
    assert_eq!(sim.despawn_unit(parked), Err(GridError::UnknownOccupant(parked)));

    let done = tick_until(&mut sim, 500, |s| s.unit_state(mover) == Some(MovementState::Idle));
    assert!(done.is_some());
    assert_eq!(sim.current_grid_position(mover), Some(pos(2, 0)));
}
