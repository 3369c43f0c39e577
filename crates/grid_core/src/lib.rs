//! # Grid Core
//!
//! Deterministic grid occupancy and movement reservation for an RTS.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No IO
//! - No floating-point math in the tick (uses fixed-point)
//!
//! [`grid::GridManager`] is the single authority on which cell is held by
//! whom. Units reserve one cell at a time through it, buildings reserve
//! their whole footprint or nothing, and a periodic coherence pass checks
//! that the tracking maps and the cells still agree.
//!
//! ## Crate Structure
//!
//! - [`grid`] - Cell array, unit registration and atomic moves
//! - [`buildings`] - Multi-cell placement with rollback
//! - [`coherence`] - Periodic self-check
//! - [`pathfinding`] - Straight-line 8-direction paths
//! - [`movement`] - Per-unit reservation state machine
//! - [`spawn`] - Building exits and spawn queues
//! - [`simulation`] - Tick loop tying it all together
//! - [`data`] - RON unit and building definitions

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod buildings;
pub mod cell;
pub mod coherence;
pub mod data;
pub mod error;
pub mod grid;
pub mod math;
pub mod movement;
pub mod occupant;
pub mod pathfinding;
pub mod position;
pub mod simulation;
pub mod spawn;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::buildings::{BuildingFootprint, PlacementPreview};
    pub use crate::coherence::{CoherenceReport, CoherenceViolation};
    pub use crate::data::{BuildingData, LocomotionKind, UnitData};
    pub use crate::error::{GridError, Result};
    pub use crate::grid::{GridConfig, GridManager};
    pub use crate::math::{Fixed, Vec2Fixed};
    pub use crate::movement::{
        Locomotion, MovementEvent, MovementState, MovementTuning, TickContext, VehicleMovement,
    };
    pub use crate::occupant::{Liveness, OccupantArena, OccupantId, OccupantKind};
    pub use crate::pathfinding::calculate_straight_path;
    pub use crate::position::{Direction, GridPosition};
    pub use crate::simulation::{
        BuildingState, Simulation, SimulationConfig, SpawnOutcome, TickEvents, UnitState,
    };
    pub use crate::spawn::SpawnPoint;
}
