//! Building definitions.

use serde::{Deserialize, Serialize};

use crate::buildings::BuildingFootprint;
use crate::error::{GridError, Result};
use crate::position::GridPosition;

/// Queue capacity used when a definition does not set one.
#[must_use]
pub const fn default_spawn_queue_capacity() -> usize {
    10
}

const fn default_size() -> u32 {
    1
}

/// Data-driven building definition.
///
/// # Example RON
///
/// ```ron
/// BuildingData(
///     id: "factory",
///     name: "Factory",
///     width: 4,
///     height: 2,
///     spawn_offset: (1, -1),
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildingData {
    /// Unique string identifier for this building type.
    pub id: String,

    /// Display name.
    pub name: String,

    /// Width in cells.
    #[serde(default = "default_size")]
    pub width: u32,

    /// Height in cells.
    #[serde(default = "default_size")]
    pub height: u32,

    /// Where produced units appear, relative to the building origin.
    #[serde(default)]
    pub spawn_offset: (i32, i32),

    /// Units waiting for a blocked spawn cell beyond this are refused.
    #[serde(default = "default_spawn_queue_capacity")]
    pub spawn_queue_capacity: usize,
}

impl BuildingData {
    /// Parse a single building definition from RON text.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::DataParseError`] naming `source_name` if the
    /// text is not a valid definition.
    pub fn from_ron_str(source_name: &str, text: &str) -> Result<Self> {
        super::parse_ron(source_name, text)
    }

    /// Parse a list of building definitions from RON text.
    ///
    /// # Errors
    ///
    /// As [`from_ron_str`](Self::from_ron_str).
    pub fn list_from_ron_str(source_name: &str, text: &str) -> Result<Vec<Self>> {
        super::parse_ron(source_name, text)
    }

    /// Footprint of this building.
    ///
    /// # Errors
    ///
    /// [`GridError::InvalidFootprint`] for a zero-sized building.
    pub fn footprint(&self) -> Result<BuildingFootprint> {
        let footprint = BuildingFootprint::new(self.width, self.height);
        if footprint.is_valid() {
            Ok(footprint)
        } else {
            Err(GridError::InvalidFootprint {
                width: self.width,
                height: self.height,
            })
        }
    }

    /// Spawn cell for a building anchored at `origin`.
    #[must_use]
    pub fn spawn_cell(&self, origin: GridPosition) -> GridPosition {
        origin + GridPosition::from(self.spawn_offset)
    }
}
