//! Integer grid coordinates and the eight stepping directions.

use serde::{Deserialize, Serialize};

/// A cell coordinate on the grid.
///
/// Plain value type: no bounds are implied. Validity is always checked by
/// [`GridManager`](crate::grid::GridManager).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct GridPosition {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
}

impl GridPosition {
    /// Create a new grid position.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The origin cell.
    pub const ZERO: Self = Self::new(0, 0);

    /// Sentinel returned for occupants the grid does not know about.
    pub const INVALID: Self = Self::new(-1, -1);

    /// Manhattan distance to another cell.
    #[must_use]
    pub const fn manhattan_distance(self, other: Self) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    /// Chebyshev distance: the number of 8-directional steps between cells.
    #[must_use]
    pub fn chebyshev_distance(self, other: Self) -> u32 {
        self.x.abs_diff(other.x).max(self.y.abs_diff(other.y))
    }

    /// The neighbouring cell in `direction`.
    #[must_use]
    pub fn step(self, direction: Direction) -> Self {
        self + direction.offset()
    }
}

impl std::ops::Add for GridPosition {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub for GridPosition {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl From<(i32, i32)> for GridPosition {
    fn from((x, y): (i32, i32)) -> Self {
        Self::new(x, y)
    }
}

impl std::fmt::Display for GridPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// The eight compass directions a unit can step or face.
///
/// `y` grows northward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// +y.
    North,
    /// +x, +y.
    NorthEast,
    /// +x.
    East,
    /// +x, -y.
    SouthEast,
    /// -y.
    South,
    /// -x, -y.
    SouthWest,
    /// -x.
    West,
    /// -x, +y.
    NorthWest,
}

impl Direction {
    /// All directions, clockwise from north.
    pub const ALL: [Self; 8] = [
        Self::North,
        Self::NorthEast,
        Self::East,
        Self::SouthEast,
        Self::South,
        Self::SouthWest,
        Self::West,
        Self::NorthWest,
    ];

    /// Direction of the greedy step from `delta`, using only the signs of
    /// each axis. Returns `None` for a zero delta.
    #[must_use]
    pub fn from_delta(delta: GridPosition) -> Option<Self> {
        match (delta.x.signum(), delta.y.signum()) {
            (0, 1) => Some(Self::North),
            (1, 1) => Some(Self::NorthEast),
            (1, 0) => Some(Self::East),
            (1, -1) => Some(Self::SouthEast),
            (0, -1) => Some(Self::South),
            (-1, -1) => Some(Self::SouthWest),
            (-1, 0) => Some(Self::West),
            (-1, 1) => Some(Self::NorthWest),
            _ => None,
        }
    }

    /// Unit offset for one step in this direction.
    #[must_use]
    pub const fn offset(self) -> GridPosition {
        match self {
            Self::North => GridPosition::new(0, 1),
            Self::NorthEast => GridPosition::new(1, 1),
            Self::East => GridPosition::new(1, 0),
            Self::SouthEast => GridPosition::new(1, -1),
            Self::South => GridPosition::new(0, -1),
            Self::SouthWest => GridPosition::new(-1, -1),
            Self::West => GridPosition::new(-1, 0),
            Self::NorthWest => GridPosition::new(-1, 1),
        }
    }

    /// True for the four diagonal directions.
    #[must_use]
    pub const fn is_diagonal(self) -> bool {
        matches!(
            self,
            Self::NorthEast | Self::SouthEast | Self::SouthWest | Self::NorthWest
        )
    }
}
