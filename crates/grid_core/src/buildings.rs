//! Multi-cell building placement.
//!
//! A building reserves a `width × height` footprint anchored at its origin
//! (lowest x, lowest y). Placement is all-or-nothing: cells are claimed in
//! row-major order and, on the first cell that cannot be claimed, every cell
//! claimed so far in that call is released again before returning.

use serde::{Deserialize, Serialize};

use crate::error::{GridError, Result};
use crate::grid::GridManager;
use crate::occupant::OccupantId;
use crate::position::GridPosition;

// ============================================================================
// Building Footprint
// ============================================================================

/// Defines the size of a building in grid cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BuildingFootprint {
    /// Width in cells.
    pub width: u32,
    /// Height in cells.
    pub height: u32,
}

impl BuildingFootprint {
    /// Create a new building footprint.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Create a square footprint.
    #[must_use]
    pub const fn square(size: u32) -> Self {
        Self::new(size, size)
    }

    /// Get the total number of cells this footprint covers.
    #[must_use]
    pub const fn cell_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// A footprint must cover at least one cell.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0 && self.width <= i32::MAX as u32 && self.height <= i32::MAX as u32
    }

    /// True if the footprint is no wider or taller than `grid`.
    #[must_use]
    pub fn fits_within(&self, grid: &GridManager) -> bool {
        self.width <= grid.width() && self.height <= grid.height()
    }

    /// Cells covered when anchored at `origin`, in row-major order.
    ///
    /// Cells whose coordinates would overflow `i32` are skipped; they lie
    /// outside every grid.
    pub fn cells(&self, origin: GridPosition) -> impl Iterator<Item = GridPosition> {
        let (width, height) = (self.width as i32, self.height as i32);
        (0..height).flat_map(move |dy| {
            (0..width).filter_map(move |dx| {
                Some(GridPosition::new(
                    origin.x.checked_add(dx)?,
                    origin.y.checked_add(dy)?,
                ))
            })
        })
    }
}

impl Default for BuildingFootprint {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

// ============================================================================
// Placement
// ============================================================================

impl GridManager {
    /// True iff every cell of `footprint` at `origin` is in bounds and free.
    ///
    /// Non-mutating; a degenerate footprint, or one larger than the grid,
    /// is never placeable.
    #[must_use]
    pub fn can_place_building(&self, origin: GridPosition, footprint: BuildingFootprint) -> bool {
        footprint.is_valid()
            && footprint.fits_within(self)
            && self.is_valid_grid_position(origin)
            && footprint.cells(origin).all(|pos| self.is_free(pos))
    }

    /// Atomically reserve a building's whole footprint.
    ///
    /// On success the footprint is recorded for `occupant`. On failure the
    /// grid is exactly as it was before the call.
    ///
    /// # Errors
    ///
    /// - [`GridError::InvalidFootprint`] for a zero-sized footprint or one
    ///   wider or taller than the grid
    /// - [`GridError::AlreadyRegistered`] if `occupant` is already tracked
    /// - [`GridError::OutOfBounds`] / [`GridError::CellOccupied`] for the
    ///   first cell (row-major) that could not be claimed
    pub fn try_occupy_building_cells(
        &mut self,
        occupant: OccupantId,
        origin: GridPosition,
        footprint: BuildingFootprint,
    ) -> Result<()> {
        if !footprint.is_valid() || !footprint.fits_within(self) {
            tracing::warn!(%occupant, origin = %origin, ?footprint, "Invalid building footprint");
            return Err(GridError::InvalidFootprint {
                width: footprint.width,
                height: footprint.height,
            });
        }

        if self.unit_positions.contains_key(&occupant) || self.building_cells.contains_key(&occupant)
        {
            tracing::warn!(%occupant, origin = %origin, "Building already registered");
            return Err(GridError::AlreadyRegistered(occupant));
        }

        let mut claimed = Vec::new();
        for pos in footprint.cells(origin) {
            if let Err(error) = self.claim_free_cell(occupant, pos) {
                tracing::warn!(
                    %occupant,
                    origin = %origin,
                    failed_at = %pos,
                    rolled_back = claimed.len(),
                    %error,
                    "Cannot place building, rolling back"
                );
                for &done in &claimed {
                    self.release_if_held(done, occupant);
                }
                self.debug_validate();
                return Err(error);
            }
            claimed.push(pos);
        }

        tracing::debug!(%occupant, origin = %origin, cells = claimed.len(), "Placed building");
        self.building_cells.insert(occupant, claimed);
        self.debug_validate();
        Ok(())
    }

    /// Release every cell of a building's recorded footprint.
    ///
    /// No-op if the building is not registered.
    pub fn release_building_cells(&mut self, occupant: OccupantId) {
        let Some(footprint) = self.building_cells.remove(&occupant) else {
            return;
        };

        for &pos in &footprint {
            self.release_if_held(pos, occupant);
        }
        tracing::debug!(%occupant, cells = footprint.len(), "Released building");
        self.debug_validate();
    }

    /// Recorded footprint of a building, in row-major order.
    #[must_use]
    pub fn building_footprint(&self, occupant: OccupantId) -> Option<&[GridPosition]> {
        self.building_cells.get(&occupant).map(Vec::as_slice)
    }

    /// Number of registered buildings.
    #[must_use]
    pub fn registered_building_count(&self) -> usize {
        self.building_cells.len()
    }

    /// Claim a cell that must currently be empty.
    fn claim_free_cell(&mut self, occupant: OccupantId, pos: GridPosition) -> Result<()> {
        let Some(cell) = self.cell_mut(pos) else {
            return Err(GridError::OutOfBounds(pos));
        };
        if let Some(holder) = cell.occupant() {
            return Err(GridError::CellOccupied {
                position: pos,
                holder,
            });
        }
        cell.try_occupy(occupant);
        Ok(())
    }
}

// ============================================================================
// Placement Preview (Ghost Building)
// ============================================================================

/// Placement feedback for a hover/cursor collaborator.
///
/// Computed without touching the grid, so it can be refreshed every frame
/// while the player moves the ghost around.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacementPreview {
    /// Anchor cell under the cursor.
    pub origin: GridPosition,
    /// Building footprint.
    pub footprint: BuildingFootprint,
    /// Whether the current placement is valid.
    pub is_valid: bool,
    /// In-bounds cells that are already occupied.
    pub blocked_cells: Vec<GridPosition>,
    /// Footprint cells that fall outside the grid.
    pub out_of_bounds_cells: Vec<GridPosition>,
}

impl PlacementPreview {
    /// Evaluate a placement against the current grid.
    ///
    /// A footprint larger than the grid is invalid and its cells are not
    /// listed.
    #[must_use]
    pub fn new(grid: &GridManager, origin: GridPosition, footprint: BuildingFootprint) -> Self {
        let mut blocked_cells = Vec::new();
        let mut out_of_bounds_cells = Vec::new();
        let usable = footprint.is_valid() && footprint.fits_within(grid);

        if usable {
            for pos in footprint.cells(origin) {
                if !grid.is_valid_grid_position(pos) {
                    out_of_bounds_cells.push(pos);
                } else if !grid.is_free(pos) {
                    blocked_cells.push(pos);
                }
            }
        }

        Self {
            origin,
            footprint,
            is_valid: usable
                && blocked_cells.is_empty()
                && out_of_bounds_cells.is_empty(),
            blocked_cells,
            out_of_bounds_cells,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u32) -> OccupantId {
        OccupantId::from_raw(n, 0)
    }

    fn pos(x: i32, y: i32) -> GridPosition {
        GridPosition::new(x, y)
    }

    #[test]
    fn test_building_footprint() {
        let footprint = BuildingFootprint::new(3, 2);
        assert_eq!(footprint.cell_count(), 6);
        assert!(footprint.is_valid());
        assert!(!BuildingFootprint::new(0, 2).is_valid());
        assert_eq!(BuildingFootprint::square(4).cell_count(), 16);
        assert_eq!(BuildingFootprint::default(), BuildingFootprint::new(1, 1));
    }

    #[test]
    fn test_footprint_cells_row_major() {
        let cells: Vec<_> = BuildingFootprint::new(2, 2).cells(pos(5, 9)).collect();
        assert_eq!(cells, vec![pos(5, 9), pos(6, 9), pos(5, 10), pos(6, 10)]);
    }

    #[test]
    fn test_can_place_building_valid() {
        let grid = GridManager::new(10, 10).unwrap();
        assert!(grid.can_place_building(pos(2, 2), BuildingFootprint::new(3, 3)));
    }

    #[test]
    fn test_can_place_building_out_of_bounds() {
        let grid = GridManager::new(10, 10).unwrap();
        assert!(!grid.can_place_building(pos(8, 8), BuildingFootprint::new(3, 3)));
        assert!(!grid.can_place_building(pos(-1, 0), BuildingFootprint::new(2, 2)));
        assert!(!grid.can_place_building(pos(0, 0), BuildingFootprint::new(0, 1)));
    }

    #[test]
    fn test_can_place_building_occupied() {
        let mut grid = GridManager::new(10, 10).unwrap();
        grid.register_unit(id(9), pos(3, 3)).unwrap();
        assert!(!grid.can_place_building(pos(2, 2), BuildingFootprint::new(3, 3)));
    }

    #[test]
    fn test_occupy_building_cells() {
        let mut grid = GridManager::new(10, 10).unwrap();
        let footprint = BuildingFootprint::new(2, 3);

        grid.try_occupy_building_cells(id(1), pos(4, 4), footprint)
            .unwrap();

        for cell in footprint.cells(pos(4, 4)) {
            assert_eq!(grid.occupant_at(cell), Some(id(1)));
        }
        assert_eq!(grid.building_footprint(id(1)).map(<[_]>::len), Some(6));
        assert_eq!(grid.registered_building_count(), 1);
        assert!(!grid.can_place_building(pos(4, 4), footprint));
    }

    #[test]
    fn test_occupy_rolls_back_on_blocked_cell() {
        let mut grid = GridManager::new(12, 12).unwrap();
        grid.register_unit(id(9), pos(7, 9)).unwrap();
        let before = grid.occupancy_hash();

        let result = grid.try_occupy_building_cells(id(1), pos(5, 9), BuildingFootprint::new(4, 2));

        assert_eq!(
            result,
            Err(GridError::CellOccupied {
                position: pos(7, 9),
                holder: id(9)
            })
        );
        assert_eq!(grid.occupancy_hash(), before);
        assert!(grid.is_free(pos(5, 9)));
        assert!(grid.is_free(pos(6, 9)));
        assert!(grid.building_footprint(id(1)).is_none());
    }

    #[test]
    fn test_occupy_rolls_back_on_out_of_bounds() {
        let mut grid = GridManager::new(5, 5).unwrap();
        let result = grid.try_occupy_building_cells(id(1), pos(3, 3), BuildingFootprint::new(3, 1));

        assert_eq!(result, Err(GridError::OutOfBounds(pos(5, 3))));
        assert!(grid.is_free(pos(3, 3)));
        assert!(grid.is_free(pos(4, 3)));
    }

    #[test]
    fn test_occupy_twice_rejected() {
        let mut grid = GridManager::new(10, 10).unwrap();
        grid.try_occupy_building_cells(id(1), pos(0, 0), BuildingFootprint::square(2))
            .unwrap();
        assert_eq!(
            grid.try_occupy_building_cells(id(1), pos(5, 5), BuildingFootprint::square(2)),
            Err(GridError::AlreadyRegistered(id(1)))
        );
        assert!(grid.is_free(pos(5, 5)));
    }

    #[test]
    fn test_release_building_cells() {
        let mut grid = GridManager::new(10, 10).unwrap();
        let footprint = BuildingFootprint::new(3, 2);
        grid.try_occupy_building_cells(id(1), pos(1, 1), footprint)
            .unwrap();

        grid.release_building_cells(id(1));

        assert!(grid.can_place_building(pos(1, 1), footprint));
        assert_eq!(grid.registered_building_count(), 0);

        // No-op when unknown
        grid.release_building_cells(id(1));
    }

    #[test]
    fn test_unit_cannot_enter_building() {
        let mut grid = GridManager::new(10, 10).unwrap();
        grid.try_occupy_building_cells(id(1), pos(2, 2), BuildingFootprint::square(2))
            .unwrap();
        grid.register_unit(id(2), pos(1, 1)).unwrap();

        assert!(grid.try_move_unit_to(id(2), pos(2, 2)).is_err());
        assert_eq!(grid.get_unit_grid_position(id(2)), pos(1, 1));
    }

    #[test]
    fn test_oversized_footprint_rejected_without_change() {
        let mut grid = GridManager::new(5, 5).unwrap();
        let before = grid.occupancy_hash();
        let huge = BuildingFootprint::new(100_000, 100_000);

        assert_eq!(huge.cell_count(), 10_000_000_000);
        assert!(!grid.can_place_building(pos(0, 0), huge));
        assert_eq!(
            grid.try_occupy_building_cells(id(1), pos(0, 0), huge),
            Err(GridError::InvalidFootprint {
                width: 100_000,
                height: 100_000
            })
        );
        assert_eq!(
            grid.try_occupy_building_cells(id(1), pos(0, 0), BuildingFootprint::new(6, 1)),
            Err(GridError::InvalidFootprint { width: 6, height: 1 })
        );
        assert_eq!(grid.occupancy_hash(), before);
        assert_eq!(grid.registered_building_count(), 0);
    }

    #[test]
    fn test_footprint_far_off_grid() {
        let mut grid = GridManager::new(5, 5).unwrap();
        let footprint = BuildingFootprint::new(2, 1);

        let cells: Vec<_> = footprint.cells(pos(i32::MAX, 0)).collect();
        assert_eq!(cells, vec![pos(i32::MAX, 0)]);

        assert!(!grid.can_place_building(pos(i32::MAX, i32::MAX), footprint));
        assert_eq!(
            grid.try_occupy_building_cells(id(1), pos(i32::MAX, 0), footprint),
            Err(GridError::OutOfBounds(pos(i32::MAX, 0)))
        );

        let preview = PlacementPreview::new(&grid, pos(i32::MAX, 0), footprint);
        assert!(!preview.is_valid);
        assert!(preview.blocked_cells.is_empty());
        assert_eq!(preview.out_of_bounds_cells, vec![pos(i32::MAX, 0)]);

        let preview = PlacementPreview::new(&grid, pos(0, 0), BuildingFootprint::square(50));
        assert!(!preview.is_valid);
        assert!(preview.out_of_bounds_cells.is_empty());
    }

    #[test]
    fn test_placement_preview_valid() {
        let grid = GridManager::new(10, 10).unwrap();
        let preview = PlacementPreview::new(&grid, pos(1, 1), BuildingFootprint::square(2));
        assert!(preview.is_valid);
        assert!(preview.blocked_cells.is_empty());
        assert!(preview.out_of_bounds_cells.is_empty());
    }

    #[test]
    fn test_placement_preview_invalid() {
        let mut grid = GridManager::new(4, 4).unwrap();
        grid.register_unit(id(3), pos(2, 3)).unwrap();

        let preview = PlacementPreview::new(&grid, pos(2, 3), BuildingFootprint::new(3, 1));

        assert!(!preview.is_valid);
        assert_eq!(preview.blocked_cells, vec![pos(2, 3)]);
        assert_eq!(preview.out_of_bounds_cells, vec![pos(4, 3)]);
    }
}
