//! Error types for grid occupancy and movement.
//!
//! Expected failures (contended cells, out-of-bounds requests) are ordinary
//! `Err` values here. Callers decide whether to retry; nothing in the core
//! panics on them.

use thiserror::Error;

use crate::occupant::OccupantId;
use crate::position::GridPosition;

/// Result type alias using [`GridError`].
pub type Result<T> = std::result::Result<T, GridError>;

/// Top-level error type for the grid core.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    /// Grid position outside `[0, width) x [0, height)`.
    #[error("Grid position {0} is out of bounds")]
    OutOfBounds(GridPosition),

    /// Cell already held by another occupant.
    #[error("Cell {position} is occupied by {holder}")]
    CellOccupied {
        /// Contended cell.
        position: GridPosition,
        /// Current holder of the cell.
        holder: OccupantId,
    },

    /// Occupant has no tracking entry in the grid.
    #[error("Occupant {0} is not registered on the grid")]
    NotRegistered(OccupantId),

    /// Occupant already has a tracking entry.
    #[error("Occupant {0} is already registered on the grid")]
    AlreadyRegistered(OccupantId),

    /// Footprint or grid dimensions that cannot exist.
    #[error("Invalid dimensions {width}x{height}")]
    InvalidFootprint {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },

    /// No straight path between two cells.
    #[error("No straight path from {from} to {to}")]
    NoPath {
        /// Path start.
        from: GridPosition,
        /// Path end.
        to: GridPosition,
    },

    /// Handle does not refer to a live occupant.
    #[error("Unknown occupant {0}")]
    UnknownOccupant(OccupantId),

    /// Occupant has no locomotion.
    #[error("Occupant {0} cannot move")]
    CannotMove(OccupantId),

    /// Spawn queue already holds as many units as it may.
    #[error("Spawn queue of building {building} is full ({capacity})")]
    SpawnQueueFull {
        /// Producing building.
        building: OccupantId,
        /// Queue capacity.
        capacity: usize,
    },

    /// Unit definition that cannot be simulated.
    #[error("Invalid unit '{unit}': {reason}")]
    InvalidUnitData {
        /// Unit type identifier.
        unit: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Data file parsing error.
    #[error("Failed to parse data '{source_name}': {message}")]
    DataParseError {
        /// Name or path of the data source.
        source_name: String,
        /// Error message.
        message: String,
    },

    /// State (de)serialization failure.
    #[error("Serialization failed: {0}")]
    Serialization(String),
}
