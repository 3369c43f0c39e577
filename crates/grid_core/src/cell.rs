//! A single occupancy slot.

use serde::{Deserialize, Serialize};

use crate::occupant::OccupantId;
use crate::position::GridPosition;

/// One cell of the grid. Holds at most one occupant.
///
/// Cells are owned by [`GridManager`](crate::grid::GridManager); everything
/// else reads them through it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridCell {
    position: GridPosition,
    occupant: Option<OccupantId>,
}

impl GridCell {
    /// Create an empty cell.
    #[must_use]
    pub const fn new(position: GridPosition) -> Self {
        Self {
            position,
            occupant: None,
        }
    }

    /// Coordinates of this cell.
    #[must_use]
    pub const fn position(&self) -> GridPosition {
        self.position
    }

    /// Current occupant, if any.
    #[must_use]
    pub const fn occupant(&self) -> Option<OccupantId> {
        self.occupant
    }

    /// True if some occupant holds this cell.
    #[must_use]
    pub const fn is_occupied(&self) -> bool {
        self.occupant.is_some()
    }

    /// True if the cell is empty or already held by `occupant`.
    #[must_use]
    pub fn is_available_for(&self, occupant: OccupantId) -> bool {
        self.occupant.map_or(true, |holder| holder == occupant)
    }

    /// Claim the cell. Succeeds if empty or already held by `occupant`.
    pub(crate) fn try_occupy(&mut self, occupant: OccupantId) -> bool {
        if !self.is_available_for(occupant) {
            return false;
        }
        self.occupant = Some(occupant);
        true
    }

    /// Empty the cell, returning the previous occupant.
    pub(crate) fn release(&mut self) -> Option<OccupantId> {
        self.occupant.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_cell_is_empty() {
        let cell = GridCell::new(GridPosition::new(3, 4));
        assert!(!cell.is_occupied());
        assert_eq!(cell.occupant(), None);
        assert_eq!(cell.position(), GridPosition::new(3, 4));
    }

    #[test]
    fn test_occupy_is_exclusive() {
        let a = OccupantId::from_raw(0, 0);
        let b = OccupantId::from_raw(1, 0);
        let mut cell = GridCell::new(GridPosition::ZERO);

        assert!(cell.try_occupy(a));
        assert!(!cell.try_occupy(b));
        assert_eq!(cell.occupant(), Some(a));
    }

    #[test]
    fn test_reoccupy_by_holder_is_idempotent() {
        let a = OccupantId::from_raw(0, 0);
        let mut cell = GridCell::new(GridPosition::ZERO);

        assert!(cell.try_occupy(a));
        assert!(cell.try_occupy(a));
        assert!(cell.is_available_for(a));
    }

    #[test]
    fn test_release() {
        let a = OccupantId::from_raw(0, 0);
        let mut cell = GridCell::new(GridPosition::ZERO);
        cell.try_occupy(a);

        assert_eq!(cell.release(), Some(a));
        assert!(!cell.is_occupied());
        assert_eq!(cell.release(), None);
    }
}
