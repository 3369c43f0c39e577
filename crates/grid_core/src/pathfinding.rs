//! Straight-line 8-direction path generation.
//!
//! This is not a search: each step moves one cell along the sign of the
//! remaining delta on both axes. Paths are checked against grid bounds only.
//! Occupancy is re-checked cell by cell at reservation time, since by the
//! time a unit gets there the picture will have changed anyway.

use crate::grid::GridManager;
use crate::position::{Direction, GridPosition};

/// Safety cap on stepping iterations. Hitting it counts as failure.
pub const MAX_PATH_ITERATIONS: usize = 1000;

/// Cells from `start` (exclusive) to `end` (inclusive).
///
/// Returns an empty path when `start == end`, and `None` when either end or
/// any intermediate step falls outside the grid, or the iteration cap is
/// reached.
#[must_use]
pub fn calculate_straight_path(
    grid: &GridManager,
    start: GridPosition,
    end: GridPosition,
) -> Option<Vec<GridPosition>> {
    if !grid.is_valid_grid_position(start) || !grid.is_valid_grid_position(end) {
        tracing::warn!(start = %start, end = %end, "Path endpoint out of bounds");
        return None;
    }

    let mut path = Vec::with_capacity(start.chebyshev_distance(end) as usize);
    let mut current = start;

    for _ in 0..MAX_PATH_ITERATIONS {
        let Some(direction) = Direction::from_delta(end - current) else {
            tracing::debug!(start = %start, end = %end, steps = path.len(), "Path computed");
            return Some(path);
        };

        current = current.step(direction);
        if !grid.is_valid_grid_position(current) {
            tracing::warn!(start = %start, end = %end, step = %current, "Path left the grid");
            return None;
        }
        path.push(current);
    }

    tracing::error!(
        start = %start,
        end = %end,
        max = MAX_PATH_ITERATIONS,
        "Path exceeded iteration cap"
    );
    None
}
