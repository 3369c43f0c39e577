//! Test fixtures and helpers.
//!
//! Pre-built grids, simulations, and definitions for consistent testing.

use fixed::types::I32F32;
use grid_core::data::{BuildingData, LocomotionKind, UnitData};
use grid_core::grid::GridManager;
use grid_core::occupant::OccupantId;
use grid_core::position::GridPosition;
use grid_core::simulation::{Simulation, SimulationConfig};

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a fixed-point number from a float (for tests only).
///
/// Note: In real simulation code, never use floats.
/// This is only for convenient test setup.
#[must_use]
pub fn fixed_f(n: f64) -> I32F32 {
    I32F32::from_num(n)
}

/// Shorthand for a grid position.
#[must_use]
pub const fn pos(x: i32, y: i32) -> GridPosition {
    GridPosition::new(x, y)
}

/// Occupant handle with generation zero, for grid-only tests.
#[must_use]
pub const fn occupant(index: u32) -> OccupantId {
    OccupantId::from_raw(index, 0)
}

/// An empty grid.
///
/// # Panics
///
/// Panics on zero dimensions.
#[must_use]
pub fn grid(width: u32, height: u32) -> GridManager {
    GridManager::new(width, height).expect("fixture grid dimensions must be non-zero")
}

/// An empty simulation with default tuning.
///
/// # Panics
///
/// Panics on zero dimensions.
#[must_use]
pub fn simulation(width: u32, height: u32) -> Simulation {
    Simulation::new(SimulationConfig::with_grid_size(width, height))
        .expect("fixture grid dimensions must be non-zero")
}

/// A light vehicle moving two cells per second.
#[must_use]
pub fn buggy() -> UnitData {
    UnitData {
        id: "buggy".to_string(),
        name: "Buggy".to_string(),
        speed: fixed(2),
        can_move: true,
        locomotion: LocomotionKind::Vehicle,
    }
}

/// A slow vehicle.
#[must_use]
pub fn artillery() -> UnitData {
    UnitData {
        id: "artillery".to_string(),
        name: "Artillery".to_string(),
        speed: fixed_f(0.75),
        can_move: true,
        locomotion: LocomotionKind::Vehicle,
    }
}

/// A unit that cannot move.
#[must_use]
pub fn turret() -> UnitData {
    UnitData {
        id: "turret".to_string(),
        name: "Turret".to_string(),
        speed: fixed(0),
        can_move: false,
        locomotion: LocomotionKind::Vehicle,
    }
}

/// A `width` × `height` building with its exit at `spawn_offset`.
#[must_use]
pub fn building(width: u32, height: u32, spawn_offset: (i32, i32)) -> BuildingData {
    BuildingData {
        id: format!("building_{width}x{height}"),
        name: "Test Building".to_string(),
        width,
        height,
        spawn_offset,
        spawn_queue_capacity: 10,
    }
}

/// Tick `sim` up to `max_ticks` times until `done` holds.
///
/// Returns the number of ticks run, or `None` if `done` never held.
pub fn tick_until(
    sim: &mut Simulation,
    max_ticks: u64,
    mut done: impl FnMut(&Simulation) -> bool,
) -> Option<u64> {
    for n in 1..=max_ticks {
        sim.tick();
        if done(sim) {
            return Some(n);
        }
    }
    None
}
