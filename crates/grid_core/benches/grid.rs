//! Grid and movement benchmarks for grid_core.
//!
//! Run with: `cargo bench -p grid_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use grid_core::buildings::BuildingFootprint;
use grid_core::data::{LocomotionKind, UnitData};
use grid_core::grid::GridManager;
use grid_core::math::Fixed;
use grid_core::occupant::OccupantId;
use grid_core::pathfinding::calculate_straight_path;
use grid_core::position::GridPosition;
use grid_core::simulation::{Simulation, SimulationConfig};

fn buggy() -> UnitData {
    UnitData {
        id: "buggy".to_string(),
        name: "Buggy".to_string(),
        speed: Fixed::from_num(3),
        can_move: true,
        locomotion: LocomotionKind::Vehicle,
    }
}

/// Reservation primitive throughput on a crowded grid.
pub fn reservation_benchmark(c: &mut Criterion) {
    let mut grid = GridManager::new(128, 128).unwrap();
    for i in 0..1024u32 {
        let pos = GridPosition::new((i % 64) as i32 * 2, (i / 64) as i32 * 2);
        grid.register_unit(OccupantId::from_raw(i, 0), pos).unwrap();
    }

    c.bench_function("try_move_unit_to_back_and_forth", |b| {
        let unit = OccupantId::from_raw(0, 0);
        let mut flip = false;
        b.iter(|| {
            flip = !flip;
            let target = if flip {
                GridPosition::new(1, 0)
            } else {
                GridPosition::new(0, 0)
            };
            black_box(grid.try_move_unit_to(unit, target)).ok();
        });
    });

    c.bench_function("can_place_building_8x8", |b| {
        b.iter(|| {
            black_box(grid.can_place_building(
                black_box(GridPosition::new(1, 1)),
                BuildingFootprint::square(8),
            ))
        });
    });
}

pub fn pathfinding_benchmark(c: &mut Criterion) {
    let grid = GridManager::new(256, 256).unwrap();
    c.bench_function("straight_path_diagonal_255", |b| {
        b.iter(|| {
            calculate_straight_path(
                &grid,
                black_box(GridPosition::new(0, 0)),
                black_box(GridPosition::new(255, 200)),
            )
        });
    });
}

/// Full tick cost with many units crossing paths.
pub fn simulation_benchmark(c: &mut Criterion) {
    let mut config = SimulationConfig::with_grid_size(64, 64);
    config.grid.coherence_interval_ticks = 10;
    let mut sim = Simulation::new(config).unwrap();

    let data = buggy();
    let mut units = Vec::new();
    for i in 0..200 {
        let pos = GridPosition::new(i % 64, (i / 64) * 3);
        if let Ok(id) = sim.spawn_unit(&data, pos) {
            units.push(id);
        }
    }
    for (i, id) in units.iter().enumerate() {
        let target = GridPosition::new(63 - (i as i32 % 64), 63 - (i as i32 / 64));
        sim.move_unit(*id, target).ok();
    }

    c.bench_function("tick_200_units", |b| {
        b.iter(|| black_box(sim.tick()));
    });
}

criterion_group!(
    benches,
    reservation_benchmark,
    pathfinding_benchmark,
    simulation_benchmark
);
criterion_main!(benches);
