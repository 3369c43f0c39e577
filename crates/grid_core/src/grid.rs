//! Grid occupancy authority.
//!
//! [`GridManager`] is the single source of truth for "is cell X free". It
//! owns every [`GridCell`] plus two tracking maps: the last reserved cell of
//! every unit, and the full footprint of every building. All occupancy
//! changes go through it, and each mutating operation either fully succeeds
//! or leaves the grid exactly as it was.
//!
//! Building placement lives in [`crate::buildings`] and the periodic
//! self-check in [`crate::coherence`]; both are further `impl GridManager`
//! blocks over the same state.

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::cell::GridCell;
use crate::error::{GridError, Result};
use crate::math::{Fixed, Vec2Fixed};
use crate::occupant::OccupantId;
use crate::position::GridPosition;

/// Run the coherence pass once every this many ticks by default.
pub const DEFAULT_COHERENCE_INTERVAL_TICKS: u64 = 60;

/// Static grid configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridConfig {
    /// Number of columns.
    pub width: u32,
    /// Number of rows.
    pub height: u32,
    /// Ticks between coherence passes. Zero disables the pass.
    #[serde(default = "default_coherence_interval")]
    pub coherence_interval_ticks: u64,
}

const fn default_coherence_interval() -> u64 {
    DEFAULT_COHERENCE_INTERVAL_TICKS
}

impl GridConfig {
    /// Configuration for a `width` × `height` grid with default intervals.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            coherence_interval_ticks: DEFAULT_COHERENCE_INTERVAL_TICKS,
        }
    }
}

impl Default for GridConfig {
    /// A 20x20 battlefield.
    fn default() -> Self {
        Self::new(20, 20)
    }
}

/// Owner of all cells and occupancy tracking.
///
/// Cell size is one world unit; a cell's world position is its center.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridManager {
    pub(crate) config: GridConfig,
    /// Cell data stored in row-major order.
    pub(crate) cells: Vec<GridCell>,
    /// Last reserved cell of every registered unit.
    pub(crate) unit_positions: BTreeMap<OccupantId, GridPosition>,
    /// Complete footprint of every placed building, in row-major order.
    pub(crate) building_cells: BTreeMap<OccupantId, Vec<GridPosition>>,
}

impl GridManager {
    /// Create an empty `width` × `height` grid.
    pub fn new(width: u32, height: u32) -> Result<Self> {
        Self::with_config(GridConfig::new(width, height))
    }

    /// Create an empty grid from a full configuration.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::InvalidFootprint`] if either dimension is zero
    /// or does not fit in an `i32` coordinate.
    pub fn with_config(config: GridConfig) -> Result<Self> {
        if config.width == 0
            || config.height == 0
            || config.width > i32::MAX as u32
            || config.height > i32::MAX as u32
        {
            return Err(GridError::InvalidFootprint {
                width: config.width,
                height: config.height,
            });
        }

        let mut cells = Vec::with_capacity(config.width as usize * config.height as usize);
        for y in 0..config.height as i32 {
            for x in 0..config.width as i32 {
                cells.push(GridCell::new(GridPosition::new(x, y)));
            }
        }

        tracing::debug!(
            width = config.width,
            height = config.height,
            "Grid initialized"
        );

        Ok(Self {
            config,
            cells,
            unit_positions: BTreeMap::new(),
            building_cells: BTreeMap::new(),
        })
    }

    /// Grid width in cells.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.config.width
    }

    /// Grid height in cells.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.config.height
    }

    /// Grid configuration.
    #[must_use]
    pub const fn config(&self) -> &GridConfig {
        &self.config
    }

    #[inline]
    fn index_of(&self, pos: GridPosition) -> Option<usize> {
        self.is_valid_grid_position(pos)
            .then(|| pos.y as usize * self.config.width as usize + pos.x as usize)
    }

    pub(crate) fn cell_mut(&mut self, pos: GridPosition) -> Option<&mut GridCell> {
        let index = self.index_of(pos)?;
        self.cells.get_mut(index)
    }

    // ------------------------------------------------------------------
    // Coordinates
    // ------------------------------------------------------------------

    /// World-space center of a cell.
    #[must_use]
    pub fn get_world_position(&self, pos: GridPosition) -> Vec2Fixed {
        let half = Fixed::ONE / Fixed::from_num(2);
        Vec2Fixed::new(
            Fixed::from_num(pos.x) + half,
            Fixed::from_num(pos.y) + half,
        )
    }

    /// Cell containing a world-space point.
    ///
    /// Floors each axis, so a point exactly on a boundary belongs to the
    /// upper cell. The result is not bounds-checked.
    #[must_use]
    pub fn get_grid_position(&self, point: Vec2Fixed) -> GridPosition {
        GridPosition::new(
            point.x.floor().to_num::<i32>(),
            point.y.floor().to_num::<i32>(),
        )
    }

    /// True if `pos` lies inside `[0, width) x [0, height)`.
    #[must_use]
    pub fn is_valid_grid_position(&self, pos: GridPosition) -> bool {
        pos.x >= 0
            && pos.y >= 0
            && (pos.x as u32) < self.config.width
            && (pos.y as u32) < self.config.height
    }

    /// Cell at `pos`, or `None` if out of bounds.
    #[must_use]
    pub fn cell(&self, pos: GridPosition) -> Option<&GridCell> {
        self.index_of(pos).map(|index| &self.cells[index])
    }

    /// Occupant of the cell at `pos`.
    #[must_use]
    pub fn occupant_at(&self, pos: GridPosition) -> Option<OccupantId> {
        self.cell(pos).and_then(GridCell::occupant)
    }

    /// True if `pos` is in bounds and unoccupied.
    #[must_use]
    pub fn is_free(&self, pos: GridPosition) -> bool {
        self.cell(pos).is_some_and(|cell| !cell.is_occupied())
    }

    /// Non-mutating check: `pos` is in bounds and either free or already
    /// held by `requester`.
    ///
    /// Does not reserve anything; use [`try_move_unit_to`](Self::try_move_unit_to)
    /// to actually claim the cell.
    #[must_use]
    pub fn is_cell_available_for(&self, pos: GridPosition, requester: OccupantId) -> bool {
        self.cell(pos)
            .is_some_and(|cell| cell.is_available_for(requester))
    }

    // ------------------------------------------------------------------
    // Units
    // ------------------------------------------------------------------

    fn is_tracked(&self, occupant: OccupantId) -> bool {
        self.unit_positions.contains_key(&occupant) || self.building_cells.contains_key(&occupant)
    }

    /// Place a unit on the grid for the first time.
    ///
    /// # Errors
    ///
    /// - [`GridError::OutOfBounds`] if `pos` is outside the grid
    /// - [`GridError::CellOccupied`] if another occupant holds `pos`
    /// - [`GridError::AlreadyRegistered`] if `occupant` is already tracked
    pub fn register_unit(&mut self, occupant: OccupantId, pos: GridPosition) -> Result<()> {
        if self.is_tracked(occupant) {
            tracing::warn!(%occupant, position = %pos, "Occupant already registered");
            return Err(GridError::AlreadyRegistered(occupant));
        }

        let Some(cell) = self.cell_mut(pos) else {
            tracing::error!(%occupant, position = %pos, "Cannot register unit at invalid position");
            return Err(GridError::OutOfBounds(pos));
        };

        if let Some(holder) = cell.occupant() {
            tracing::warn!(%occupant, position = %pos, %holder, "Cannot register unit at occupied cell");
            return Err(GridError::CellOccupied {
                position: pos,
                holder,
            });
        }

        cell.try_occupy(occupant);
        self.unit_positions.insert(occupant, pos);
        tracing::debug!(%occupant, position = %pos, "Registered unit");
        self.debug_validate();
        Ok(())
    }

    /// Remove a unit from the grid, freeing its cell.
    ///
    /// No-op if the unit is not registered.
    pub fn unregister_unit(&mut self, occupant: OccupantId) {
        let Some(pos) = self.unit_positions.remove(&occupant) else {
            return;
        };

        self.release_if_held(pos, occupant);
        tracing::debug!(%occupant, position = %pos, "Unregistered unit");
        self.debug_validate();
    }

    /// Atomically move a unit's reservation to `new_pos`.
    ///
    /// This is the only way a unit changes cells, and the only serialization
    /// point between units racing for the same destination: whichever calls
    /// first within a tick wins, and the loser sees an `Err` with no state
    /// change.
    ///
    /// Moving to the cell the unit already holds succeeds without touching
    /// anything.
    ///
    /// # Errors
    ///
    /// - [`GridError::NotRegistered`] if `occupant` is not a tracked unit
    /// - [`GridError::OutOfBounds`] if `new_pos` is outside the grid
    /// - [`GridError::CellOccupied`] if another occupant holds `new_pos`
    pub fn try_move_unit_to(&mut self, occupant: OccupantId, new_pos: GridPosition) -> Result<()> {
        let Some(&old_pos) = self.unit_positions.get(&occupant) else {
            tracing::warn!(%occupant, target = %new_pos, "Unit not registered");
            return Err(GridError::NotRegistered(occupant));
        };

        if old_pos == new_pos {
            return Ok(());
        }

        let Some(target) = self.cell(new_pos) else {
            tracing::warn!(%occupant, target = %new_pos, "Cannot move unit to invalid position");
            return Err(GridError::OutOfBounds(new_pos));
        };

        if let Some(holder) = target.occupant().filter(|&holder| holder != occupant) {
            tracing::warn!(%occupant, target = %new_pos, %holder, "Cell occupied, cannot move unit");
            return Err(GridError::CellOccupied {
                position: new_pos,
                holder,
            });
        }

        // Target is known free: release and claim cannot fail past this point.
        self.release_if_held(old_pos, occupant);
        if let Some(cell) = self.cell_mut(new_pos) {
            cell.try_occupy(occupant);
        }
        self.unit_positions.insert(occupant, new_pos);

        tracing::debug!(%occupant, from = %old_pos, to = %new_pos, "Moved unit");
        self.debug_validate();
        Ok(())
    }

    /// Last reserved cell of a unit, or [`GridPosition::INVALID`] if unknown.
    #[must_use]
    pub fn get_unit_grid_position(&self, occupant: OccupantId) -> GridPosition {
        self.unit_position(occupant)
            .unwrap_or(GridPosition::INVALID)
    }

    /// Last reserved cell of a unit.
    #[must_use]
    pub fn unit_position(&self, occupant: OccupantId) -> Option<GridPosition> {
        self.unit_positions.get(&occupant).copied()
    }

    /// Number of registered units.
    #[must_use]
    pub fn registered_unit_count(&self) -> usize {
        self.unit_positions.len()
    }

    /// Registered units and their reserved cells, in ascending id order.
    pub fn units(&self) -> impl Iterator<Item = (OccupantId, GridPosition)> + '_ {
        self.unit_positions.iter().map(|(&id, &pos)| (id, pos))
    }

    /// All occupied cells in row-major order.
    pub fn occupied_cells(&self) -> impl Iterator<Item = (GridPosition, OccupantId)> + '_ {
        self.cells
            .iter()
            .filter_map(|cell| cell.occupant().map(|id| (cell.position(), id)))
    }

    /// Free `pos` only if `occupant` is the one holding it.
    pub(crate) fn release_if_held(&mut self, pos: GridPosition, occupant: OccupantId) -> bool {
        match self.cell_mut(pos) {
            Some(cell) if cell.occupant() == Some(occupant) => {
                cell.release();
                true
            }
            _ => false,
        }
    }

    /// Hash of the occupancy picture: every cell's occupant plus both
    /// tracking maps, in deterministic order.
    #[must_use]
    pub fn occupancy_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.config.width.hash(&mut hasher);
        self.config.height.hash(&mut hasher);
        for cell in &self.cells {
            cell.occupant().hash(&mut hasher);
        }
        for (id, pos) in &self.unit_positions {
            id.hash(&mut hasher);
            pos.hash(&mut hasher);
        }
        for (id, footprint) in &self.building_cells {
            id.hash(&mut hasher);
            footprint.hash(&mut hasher);
        }
        hasher.finish()
    }

    /// Full structural check after every mutation when the
    /// `debug-validation` feature is on.
    #[inline]
    pub(crate) fn debug_validate(&self) {
        #[cfg(feature = "debug-validation")]
        {
            let violations = self.structural_violations();
            for violation in &violations {
                tracing::error!(%violation, "Grid invariant broken after mutation");
            }
            debug_assert!(violations.is_empty(), "grid invariants broken: {violations:?}");
        }
    }
}
