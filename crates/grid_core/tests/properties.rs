//! Property tests for the occupancy and movement invariants.

use std::collections::{BTreeMap, BTreeSet};

use grid_core::movement::{MovementEvent, MovementState};
use grid_core::pathfinding::calculate_straight_path;
use grid_core::position::GridPosition;
use grid_test_utils::determinism::strategies::{
    arb_any_position, arb_distinct_positions, arb_footprint, arb_grid_position, arb_order,
};
use grid_test_utils::fixtures::{buggy, grid, occupant, simulation};
use proptest::prelude::*;

const W: u32 = 12;
const H: u32 = 10;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// No two units ever track the same cell, and tracking and cells agree
    /// after every tick.
    #[test]
    fn prop_mutual_exclusion(
        starts in arb_distinct_positions(W, H, 6),
        orders in proptest::collection::vec(arb_order(W, H, 6, 120), 1..30),
    ) {
        let mut sim = simulation(W, H);
        let ids: Vec<_> = starts
            .iter()
            .map(|&p| sim.spawn_unit(&buggy(), p).unwrap())
            .collect();

        let mut by_tick: BTreeMap<u64, Vec<(usize, GridPosition)>> = BTreeMap::new();
        for (tick, unit, target) in orders {
            by_tick.entry(tick).or_default().push((unit, target));
        }

        for tick in 0..300u64 {
            for &(unit, target) in by_tick.get(&tick).into_iter().flatten() {
                let _ = sim.move_unit(ids[unit], target);
            }
            sim.tick();

            let tracked: Vec<_> = sim.grid().units().map(|(_, p)| p).collect();
            let distinct: BTreeSet<_> = tracked.iter().copied().collect();
            prop_assert_eq!(tracked.len(), distinct.len());
            prop_assert!(sim.grid().structural_violations().is_empty());
            prop_assert_eq!(sim.grid().occupied_cells().count(), ids.len());
        }
    }

    /// A failed building placement leaves every cell as it was.
    #[test]
    fn prop_failed_placement_changes_nothing(
        blockers in arb_distinct_positions(W, H, 8),
        origin in arb_any_position(W, H),
        footprint in arb_footprint(5),
    ) {
        let mut grid = grid(W, H);
        for (i, &p) in blockers.iter().enumerate() {
            grid.register_unit(occupant(i as u32), p).unwrap();
        }
        let before: Vec<_> = grid.occupied_cells().collect();
        let hash = grid.occupancy_hash();
        let building = occupant(100);

        let placeable = grid.can_place_building(origin, footprint);
        let result = grid.try_occupy_building_cells(building, origin, footprint);

        prop_assert_eq!(result.is_ok(), placeable);
        if result.is_err() {
            prop_assert_eq!(grid.occupied_cells().collect::<Vec<_>>(), before);
            prop_assert_eq!(grid.occupancy_hash(), hash);
        } else {
            prop_assert_eq!(
                grid.building_footprint(building).map(<[_]>::len),
                Some(footprint.cell_count() as usize)
            );
        }
        prop_assert!(grid.structural_violations().is_empty());
    }

    /// Grid to world and back is the identity for every in-bounds cell.
    #[test]
    fn prop_coordinate_round_trip(p in arb_grid_position(200, 200)) {
        let grid = grid(200, 200);
        prop_assert_eq!(grid.get_grid_position(grid.get_world_position(p)), p);
    }

    /// Moving a unit onto its own cell succeeds and changes nothing.
    #[test]
    fn prop_self_move_is_noop(
        cells in arb_distinct_positions(W, H, 4),
    ) {
        let mut grid = grid(W, H);
        for (i, &p) in cells.iter().enumerate() {
            grid.register_unit(occupant(i as u32), p).unwrap();
        }
        let hash = grid.occupancy_hash();

        for (i, &p) in cells.iter().enumerate() {
            prop_assert!(grid.try_move_unit_to(occupant(i as u32), p).is_ok());
        }
        prop_assert_eq!(grid.occupancy_hash(), hash);
    }

    /// Straight paths terminate at the target with Chebyshev length and
    /// single-cell steps.
    #[test]
    fn prop_straight_path_terminates(
        start in arb_grid_position(W, H),
        end in arb_grid_position(W, H),
    ) {
        let grid = grid(W, H);
        let path = calculate_straight_path(&grid, start, end);
        prop_assert!(path.is_some());
        let path = path.unwrap_or_default();

        if start == end {
            prop_assert!(path.is_empty());
        } else {
            prop_assert_eq!(path.last(), Some(&end));
            prop_assert_eq!(path.len() as u32, start.chebyshev_distance(end));
            let mut previous = start;
            for &cell in &path {
                prop_assert_eq!(previous.chebyshev_distance(cell), 1);
                previous = cell;
            }
        }
    }

    /// After a redirect the unit enters exactly the spliced path: the cell
    /// it was entering first, then the new straight route, with no cell
    /// reserved twice.
    #[test]
    fn prop_redirect_follows_spliced_path(
        start in arb_grid_position(W, H),
        first in arb_grid_position(W, H),
        second in arb_grid_position(W, H),
        delay in 2u64..40,
    ) {
        prop_assume!(start != first);
        let mut sim = simulation(W, H);
        let unit = sim.spawn_unit(&buggy(), start).unwrap();
        sim.move_unit(unit, first).unwrap();

        for _ in 0..delay {
            sim.tick();
        }
        prop_assume!(sim.is_moving(unit));

        let vehicle = sim.unit(unit).and_then(|u| u.locomotion.as_vehicle()).cloned();
        prop_assume!(vehicle.is_some());
        let entering = vehicle.map(|v| v.target_cell()).unwrap_or(start);

        sim.move_unit(unit, second).unwrap();
        let spliced: Vec<_> = sim
            .unit(unit)
            .and_then(|u| u.locomotion.as_vehicle())
            .map(|v| v.path().to_vec())
            .unwrap_or_default();
        prop_assert_eq!(spliced.first(), Some(&entering));

        let distinct: BTreeSet<_> = spliced.iter().collect();
        prop_assert_eq!(distinct.len(), spliced.len());

        let mut entered = Vec::new();
        for _ in 0..2000 {
            for (_, event) in sim.tick().movement {
                if let MovementEvent::CellEntered { cell } = event {
                    entered.push(cell);
                }
            }
            if sim.unit_state(unit) == Some(MovementState::Idle) {
                break;
            }
        }

        prop_assert_eq!(entered, spliced);
        prop_assert_eq!(sim.current_grid_position(unit), Some(second));
    }
}
