//! Per-unit movement state machine.
//!
//! A [`VehicleMovement`] turns a straight path into a sequence of atomic
//! cell reservations. The unit always reserves a cell before moving into
//! it, waits on a retry timer when the next cell is taken, and gives up
//! after a bounded number of retries.
//!
//! ```text
//!   Idle ──move_to──▶ WaitingForNextCell ──reserved──▶ Moving ──path done──▶ Idle
//!                        ▲          │                    │
//!                        └──taken───┼────────────────────┘
//!                                   └──retries exhausted──▶ Blocked
//! ```
//!
//! Timers run on integer milliseconds from the [`TickContext`] so that the
//! retry cadence is exact and identical across runs.

use serde::{Deserialize, Serialize};

use crate::data::LocomotionKind;
use crate::error::{GridError, Result};
use crate::grid::GridManager;
use crate::math::{fixed_decimal_serde, Fixed, Vec2Fixed};
use crate::occupant::OccupantId;
use crate::pathfinding::calculate_straight_path;
use crate::position::{Direction, GridPosition};

/// Timing information supplied by the tick collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickContext {
    /// Tick counter.
    pub tick: u64,
    /// Time elapsed since the previous tick, in milliseconds.
    pub delta_ms: u32,
}

impl TickContext {
    /// Create a new tick context.
    #[must_use]
    pub const fn new(tick: u64, delta_ms: u32) -> Self {
        Self { tick, delta_ms }
    }

    /// Elapsed time in seconds, as fixed-point.
    #[must_use]
    pub fn delta_seconds(&self) -> Fixed {
        Fixed::from_num(self.delta_ms) / Fixed::from_num(1000)
    }
}

/// Tunable movement constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementTuning {
    /// Distance under which a unit counts as arrived at a cell center.
    #[serde(with = "fixed_decimal_serde")]
    pub arrival_epsilon: Fixed,
    /// Time between reservation attempts while waiting.
    pub retry_interval_ms: u32,
    /// Attempts before giving up and going `Blocked`.
    pub max_retries: u32,
}

impl Default for MovementTuning {
    fn default() -> Self {
        Self {
            arrival_epsilon: Fixed::from_num(0.01),
            retry_interval_ms: 100,
            max_retries: 30,
        }
    }
}

/// Movement states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MovementState {
    /// Not moving.
    #[default]
    Idle,
    /// Interpolating toward a reserved cell.
    Moving,
    /// Gave up waiting; needs a fresh `move_to`.
    Blocked,
    /// Retrying the reservation of the next path cell.
    WaitingForNextCell,
}

/// Notable transitions, returned to the host for logging or presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MovementEvent {
    /// A new order was accepted from rest.
    PathAssigned {
        /// Final cell.
        destination: GridPosition,
        /// Number of cells to traverse.
        steps: usize,
    },
    /// An in-flight order was replaced.
    Redirected {
        /// New final cell.
        destination: GridPosition,
        /// Cells remaining, the one being entered included.
        steps: usize,
    },
    /// Next cell reserved; interpolation toward it begins.
    CellReserved {
        /// Reserved cell.
        cell: GridPosition,
    },
    /// Position snapped onto a cell center.
    CellEntered {
        /// Entered cell.
        cell: GridPosition,
    },
    /// Path finished.
    Arrived {
        /// Final cell.
        cell: GridPosition,
    },
    /// Next cell is taken; retry timer started.
    Waiting {
        /// Contended cell.
        cell: GridPosition,
    },
    /// Retries exhausted or the unit lost its registration.
    Blocked {
        /// Cell that could not be reserved.
        cell: GridPosition,
    },
}

/// Movement state for a ground vehicle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleMovement {
    tuning: MovementTuning,
    state: MovementState,
    destination: Option<GridPosition>,
    path: Vec<GridPosition>,
    path_index: usize,
    /// Last cell fully entered.
    current_cell: GridPosition,
    /// Cell being approached while `Moving`.
    target_cell: GridPosition,
    target_world_position: Vec2Fixed,
    world_position: Vec2Fixed,
    facing: Direction,
    retry_timer_ms: u32,
    retry_count: u32,
}

impl VehicleMovement {
    /// Create an idle vehicle resting at the center of `cell`.
    #[must_use]
    pub fn new(grid: &GridManager, cell: GridPosition, tuning: MovementTuning) -> Self {
        let world_position = grid.get_world_position(cell);
        Self {
            tuning,
            state: MovementState::Idle,
            destination: None,
            path: Vec::new(),
            path_index: 0,
            current_cell: cell,
            target_cell: cell,
            target_world_position: world_position,
            world_position,
            facing: Direction::North,
            retry_timer_ms: 0,
            retry_count: 0,
        }
    }

    /// Issue a movement order.
    ///
    /// From rest (`Idle`, `Blocked`, `WaitingForNextCell`) the path starts
    /// at the current cell and the unit first waits to reserve its first
    /// step. While `Moving` the order is a redirect: the new path starts at
    /// the cell being entered, which is kept as the first step so the unit
    /// finishes entering it. A redirect that cannot be pathed keeps the old
    /// order.
    ///
    /// Returns `Ok(None)` when already resting on `target`.
    ///
    /// # Errors
    ///
    /// - [`GridError::OutOfBounds`] if `target` is outside the grid
    /// - [`GridError::NoPath`] if no straight path exists. From rest this
    ///   also moves the unit to `Blocked`.
    pub fn move_to(
        &mut self,
        grid: &GridManager,
        occupant: OccupantId,
        target: GridPosition,
    ) -> Result<Option<MovementEvent>> {
        if !grid.is_valid_grid_position(target) {
            tracing::warn!(%occupant, target = %target, "Invalid move target");
            return Err(GridError::OutOfBounds(target));
        }

        if self.state == MovementState::Moving {
            return self.redirect(grid, occupant, target).map(Some);
        }

        if target == self.current_cell {
            // A waiting unit ordered back onto its own cell just stops waiting
            if self.state == MovementState::WaitingForNextCell {
                self.state = MovementState::Idle;
                self.clear_order();
            }
            tracing::debug!(%occupant, target = %target, "Already at target");
            return Ok(None);
        }

        let Some(path) = calculate_straight_path(grid, self.current_cell, target) else {
            tracing::warn!(%occupant, from = %self.current_cell, to = %target, "No valid path");
            self.state = MovementState::Blocked;
            self.clear_order();
            return Err(GridError::NoPath {
                from: self.current_cell,
                to: target,
            });
        };

        let steps = path.len();
        self.destination = Some(target);
        self.path = path;
        self.path_index = 0;
        self.state = MovementState::WaitingForNextCell;
        self.retry_timer_ms = 0;
        self.retry_count = 0;
        if let Some(&first) = self.path.first() {
            self.face(first);
        }

        tracing::debug!(%occupant, destination = %target, steps, "Path assigned, waiting for first cell");
        Ok(Some(MovementEvent::PathAssigned {
            destination: target,
            steps,
        }))
    }

    fn redirect(
        &mut self,
        grid: &GridManager,
        occupant: OccupantId,
        target: GridPosition,
    ) -> Result<MovementEvent> {
        let Some(tail) = calculate_straight_path(grid, self.target_cell, target) else {
            tracing::warn!(
                %occupant,
                target = %target,
                destination = ?self.destination,
                "Cannot redirect, keeping current order"
            );
            return Err(GridError::NoPath {
                from: self.target_cell,
                to: target,
            });
        };

        let mut path = Vec::with_capacity(tail.len() + 1);
        path.push(self.target_cell);
        path.extend(tail);

        let steps = path.len();
        self.destination = Some(target);
        self.path = path;
        self.path_index = 0;

        tracing::debug!(%occupant, destination = %target, steps, "Redirected in flight");
        Ok(MovementEvent::Redirected {
            destination: target,
            steps,
        })
    }

    /// Advance the state machine by one tick.
    ///
    /// `speed` is in world units per second.
    pub fn update(
        &mut self,
        ctx: TickContext,
        grid: &mut GridManager,
        occupant: OccupantId,
        speed: Fixed,
    ) -> Vec<MovementEvent> {
        let mut events = Vec::new();
        match self.state {
            MovementState::Idle | MovementState::Blocked => {}
            MovementState::Moving => self.handle_moving(ctx, grid, occupant, speed, &mut events),
            MovementState::WaitingForNextCell => {
                self.handle_waiting(ctx, grid, occupant, &mut events);
            }
        }
        events
    }

    fn handle_moving(
        &mut self,
        ctx: TickContext,
        grid: &mut GridManager,
        occupant: OccupantId,
        speed: Fixed,
        events: &mut Vec<MovementEvent>,
    ) {
        let epsilon = self.tuning.arrival_epsilon;
        if self.world_position.distance_squared(self.target_world_position) < epsilon * epsilon {
            self.on_reached_cell(grid, occupant, events);
        } else {
            let step = speed * ctx.delta_seconds();
            self.world_position = self
                .world_position
                .move_towards(self.target_world_position, step);
        }
    }

    fn handle_waiting(
        &mut self,
        ctx: TickContext,
        grid: &mut GridManager,
        occupant: OccupantId,
        events: &mut Vec<MovementEvent>,
    ) {
        self.retry_timer_ms = self.retry_timer_ms.saturating_add(ctx.delta_ms);
        if self.retry_timer_ms < self.tuning.retry_interval_ms {
            return;
        }

        self.retry_timer_ms = 0;
        self.retry_count += 1;

        let Some(&next) = self.path.get(self.path_index) else {
            self.finish(occupant, events);
            return;
        };

        match grid.try_move_unit_to(occupant, next) {
            Ok(()) => {
                tracing::debug!(%occupant, cell = %next, attempts = self.retry_count, "Cell reserved");
                self.retry_count = 0;
                self.state = MovementState::Moving;
                self.start_moving_to(grid, next, events);
            }
            Err(GridError::NotRegistered(_)) => {
                tracing::error!(%occupant, "Unit not registered on the grid, disabling movement");
                self.block(next, events);
            }
            Err(_) if self.retry_count >= self.tuning.max_retries => {
                tracing::warn!(
                    %occupant,
                    cell = %next,
                    retries = self.retry_count,
                    "Gave up waiting for cell"
                );
                self.block(next, events);
            }
            Err(_) => {}
        }
    }

    fn on_reached_cell(
        &mut self,
        grid: &mut GridManager,
        occupant: OccupantId,
        events: &mut Vec<MovementEvent>,
    ) {
        self.world_position = self.target_world_position;
        self.current_cell = self.target_cell;
        self.path_index += 1;
        events.push(MovementEvent::CellEntered {
            cell: self.current_cell,
        });

        let Some(&next) = self.path.get(self.path_index) else {
            self.finish(occupant, events);
            return;
        };

        match grid.try_move_unit_to(occupant, next) {
            Ok(()) => self.start_moving_to(grid, next, events),
            Err(GridError::NotRegistered(_)) => {
                tracing::error!(%occupant, "Unit not registered on the grid, disabling movement");
                self.block(next, events);
            }
            Err(_) => {
                tracing::debug!(%occupant, cell = %next, "Next cell occupied, waiting");
                self.state = MovementState::WaitingForNextCell;
                self.retry_timer_ms = 0;
                self.retry_count = 0;
                self.face(next);
                events.push(MovementEvent::Waiting { cell: next });
            }
        }
    }

    fn start_moving_to(
        &mut self,
        grid: &GridManager,
        cell: GridPosition,
        events: &mut Vec<MovementEvent>,
    ) {
        self.face(cell);
        self.target_cell = cell;
        self.target_world_position = grid.get_world_position(cell);
        events.push(MovementEvent::CellReserved { cell });
    }

    fn finish(&mut self, occupant: OccupantId, events: &mut Vec<MovementEvent>) {
        self.state = MovementState::Idle;
        self.path.clear();
        self.path_index = 0;
        tracing::debug!(%occupant, cell = %self.current_cell, "Reached destination");
        events.push(MovementEvent::Arrived {
            cell: self.current_cell,
        });
    }

    fn block(&mut self, cell: GridPosition, events: &mut Vec<MovementEvent>) {
        self.state = MovementState::Blocked;
        self.clear_order();
        events.push(MovementEvent::Blocked { cell });
    }

    fn clear_order(&mut self) {
        self.destination = None;
        self.path.clear();
        self.path_index = 0;
        self.retry_timer_ms = 0;
        self.retry_count = 0;
    }

    fn face(&mut self, cell: GridPosition) {
        if let Some(direction) = Direction::from_delta(cell - self.current_cell) {
            self.facing = direction;
        }
    }

    /// True only while interpolating toward a reserved cell.
    #[must_use]
    pub fn is_moving(&self) -> bool {
        self.state == MovementState::Moving
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> MovementState {
        self.state
    }

    /// Final cell of the current order.
    #[must_use]
    pub const fn destination(&self) -> Option<GridPosition> {
        self.destination
    }

    /// Remaining order as a path; empty when idle or blocked.
    #[must_use]
    pub fn path(&self) -> &[GridPosition] {
        &self.path
    }

    /// Index into [`path`](Self::path) of the next cell to reserve or enter.
    #[must_use]
    pub const fn path_index(&self) -> usize {
        self.path_index
    }

    /// Cell being approached, or the current cell at rest.
    #[must_use]
    pub const fn target_cell(&self) -> GridPosition {
        self.target_cell
    }

    /// World-space center of the cell being approached.
    #[must_use]
    pub const fn current_target_world_position(&self) -> Vec2Fixed {
        self.target_world_position
    }

    /// Last cell fully entered.
    #[must_use]
    pub const fn current_cell(&self) -> GridPosition {
        self.current_cell
    }

    /// Interpolated world position.
    #[must_use]
    pub const fn world_position(&self) -> Vec2Fixed {
        self.world_position
    }

    /// Direction of the most recent step taken or attempted.
    #[must_use]
    pub const fn facing(&self) -> Direction {
        self.facing
    }

    /// Failed attempts for the cell currently waited on.
    #[must_use]
    pub const fn retry_count(&self) -> u32 {
        self.retry_count
    }
}

/// Closed set of movement strategies, chosen when a unit is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Locomotion {
    /// Cell-by-cell ground movement.
    Vehicle(VehicleMovement),
    /// Cannot move at all (turrets, static defenses).
    Immobile {
        /// Cell the unit stands on.
        cell: GridPosition,
        /// World position of that cell.
        world_position: Vec2Fixed,
    },
}

impl Locomotion {
    /// Movement for a unit standing at `cell`; `None` makes it immobile.
    #[must_use]
    pub fn new(
        grid: &GridManager,
        cell: GridPosition,
        kind: Option<LocomotionKind>,
        tuning: MovementTuning,
    ) -> Self {
        match kind {
            Some(LocomotionKind::Vehicle) => Self::Vehicle(VehicleMovement::new(grid, cell, tuning)),
            None => Self::Immobile {
                cell,
                world_position: grid.get_world_position(cell),
            },
        }
    }

    /// Forward an order to the vehicle.
    ///
    /// # Errors
    ///
    /// [`GridError::CannotMove`] for immobile units, otherwise as
    /// [`VehicleMovement::move_to`].
    pub fn move_to(
        &mut self,
        grid: &GridManager,
        occupant: OccupantId,
        target: GridPosition,
    ) -> Result<Option<MovementEvent>> {
        match self {
            Self::Vehicle(vehicle) => vehicle.move_to(grid, occupant, target),
            Self::Immobile { .. } => {
                tracing::warn!(%occupant, target = %target, "Immobile unit ignored move order");
                Err(GridError::CannotMove(occupant))
            }
        }
    }

    /// Advance one tick. Immobile units never produce events.
    pub fn update(
        &mut self,
        ctx: TickContext,
        grid: &mut GridManager,
        occupant: OccupantId,
        speed: Fixed,
    ) -> Vec<MovementEvent> {
        match self {
            Self::Vehicle(vehicle) => vehicle.update(ctx, grid, occupant, speed),
            Self::Immobile { .. } => Vec::new(),
        }
    }

    /// True while interpolating between cells.
    #[must_use]
    pub fn is_moving(&self) -> bool {
        matches!(self, Self::Vehicle(vehicle) if vehicle.is_moving())
    }

    /// Movement state; immobile units are always idle.
    #[must_use]
    pub fn state(&self) -> MovementState {
        match self {
            Self::Vehicle(vehicle) => vehicle.state(),
            Self::Immobile { .. } => MovementState::Idle,
        }
    }

    /// Last cell fully entered.
    #[must_use]
    pub fn current_cell(&self) -> GridPosition {
        match self {
            Self::Vehicle(vehicle) => vehicle.current_cell(),
            Self::Immobile { cell, .. } => *cell,
        }
    }

    /// Interpolated world position.
    #[must_use]
    pub fn world_position(&self) -> Vec2Fixed {
        match self {
            Self::Vehicle(vehicle) => vehicle.world_position(),
            Self::Immobile { world_position, .. } => *world_position,
        }
    }

    /// The vehicle state machine, if this unit has one.
    #[must_use]
    pub fn as_vehicle(&self) -> Option<&VehicleMovement> {
        match self {
            Self::Vehicle(vehicle) => Some(vehicle),
            Self::Immobile { .. } => None,
        }
    }
}
