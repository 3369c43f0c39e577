//! Fixed-point math utilities for deterministic simulation.
//!
//! World positions and speeds use fixed-point arithmetic so that two
//! simulations fed the same orders land on bit-identical positions.

use fixed::types::I32F32;
use serde::{Deserialize, Serialize};

/// Fixed-point number type for all world-space math.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
pub type Fixed = I32F32;

/// Fixed-point 2D vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Vec2Fixed {
    /// X coordinate.
    #[serde(with = "fixed_serde")]
    pub x: Fixed,
    /// Y coordinate.
    #[serde(with = "fixed_serde")]
    pub y: Fixed,
}

/// Serde support for fixed-point numbers.
///
/// Serializes fixed-point numbers as their raw bit representation (i64)
/// to preserve exact precision across serialization boundaries.
pub mod fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as its raw bit representation.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_bits().serialize(serializer)
    }

    /// Deserialize a fixed-point number from its raw bit representation.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = i64::deserialize(deserializer)?;
        Ok(Fixed::from_bits(bits))
    }
}

/// Serde support for human-written decimal values.
///
/// Data files say `speed: 2.5` rather than raw bits. The value is parsed as
/// `f64` once at load time and converted; simulation math never sees floats.
pub mod fixed_decimal_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize a fixed-point number as a decimal.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(value.to_num::<f64>())
    }

    /// Deserialize a decimal into a fixed-point number.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = f64::deserialize(deserializer)?;
        Fixed::checked_from_num(raw)
            .ok_or_else(|| serde::de::Error::custom(format!("{raw} out of fixed-point range")))
    }
}

impl Vec2Fixed {
    /// Create a new fixed-point vector.
    #[must_use]
    pub const fn new(x: Fixed, y: Fixed) -> Self {
        Self { x, y }
    }

    /// Zero vector.
    pub const ZERO: Self = Self {
        x: Fixed::ZERO,
        y: Fixed::ZERO,
    };

    /// Calculate squared distance (avoids sqrt for comparisons).
    #[must_use]
    pub fn distance_squared(self, other: Self) -> Fixed {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Euclidean distance.
    #[must_use]
    pub fn distance(self, other: Self) -> Fixed {
        fixed_sqrt(self.distance_squared(other))
    }

    /// Dot product of two vectors.
    #[must_use]
    pub fn dot(self, other: Self) -> Fixed {
        self.x * other.x + self.y * other.y
    }

    /// Multiply both components by a scalar.
    #[must_use]
    pub fn scale(self, factor: Fixed) -> Self {
        Self::new(self.x * factor, self.y * factor)
    }

    /// Step toward `target` by at most `max_delta`, never overshooting.
    ///
    /// Returns `target` exactly once it is within reach.
    #[must_use]
    pub fn move_towards(self, target: Self, max_delta: Fixed) -> Self {
        if max_delta <= Fixed::ZERO {
            return self;
        }

        let delta = target - self;
        let dist_sq = delta.dot(delta);
        if dist_sq == Fixed::ZERO || dist_sq <= max_delta.saturating_mul(max_delta) {
            return target;
        }

        let dist = fixed_sqrt(dist_sq);
        if dist == Fixed::ZERO {
            return target;
        }

        self + delta.scale(max_delta / dist)
    }
}

/// Computes the square root of a fixed-point number using binary search.
fn fixed_sqrt(value: Fixed) -> Fixed {
    if value <= Fixed::ZERO {
        return Fixed::ZERO;
    }

    let mut low = Fixed::ZERO;
    let mut high = if value > Fixed::ONE {
        value
    } else {
        Fixed::ONE
    };

    for _ in 0..48 {
        let mid = (low + high) / Fixed::from_num(2);
        let mid_sq = mid.saturating_mul(mid);

        if mid_sq <= value {
            low = mid;
        } else {
            high = mid;
        }
    }

    low
}

impl std::ops::Add for Vec2Fixed {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl std::ops::Sub for Vec2Fixed {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

impl std::fmt::Display for Vec2Fixed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vec2(x: f64, y: f64) -> Vec2Fixed {
        Vec2Fixed::new(Fixed::from_num(x), Fixed::from_num(y))
    }

    #[test]
    fn test_vec2_distance_squared() {
        let a = vec2(3.0, 0.0);
        let b = vec2(0.0, 4.0);
        // 3² + 4² = 25
        assert_eq!(a.distance_squared(b), Fixed::from_num(25));
    }

    #[test]
    fn test_distance() {
        let d = vec2(0.0, 0.0).distance(vec2(3.0, 4.0));
        let epsilon = Fixed::ONE / Fixed::from_num(10_000);
        assert!((d - Fixed::from_num(5)).abs() < epsilon, "got {d}");
    }

    #[test]
    fn test_move_towards_partial_step() {
        let start = vec2(0.5, 0.5);
        let target = vec2(2.5, 0.5);
        let next = start.move_towards(target, Fixed::from_num(0.5));
        assert_eq!(next.y, Fixed::from_num(0.5));
        let epsilon = Fixed::ONE / Fixed::from_num(10_000);
        assert!((next.x - Fixed::from_num(1.0)).abs() < epsilon);
    }

    #[test]
    fn test_move_towards_snaps_when_in_reach() {
        let start = vec2(0.5, 0.5);
        let target = vec2(1.5, 1.5);
        assert_eq!(start.move_towards(target, Fixed::from_num(2)), target);
    }

    #[test]
    fn test_move_towards_zero_step_stays() {
        let start = vec2(0.5, 0.5);
        assert_eq!(start.move_towards(vec2(4.0, 4.0), Fixed::ZERO), start);
    }

    #[test]
    fn test_move_towards_never_overshoots_diagonal() {
        let target = vec2(3.5, 3.5);
        let mut pos = vec2(2.5, 2.5);
        let step = Fixed::from_num(0.1);
        for _ in 0..100 {
            let before = pos.distance_squared(target);
            pos = pos.move_towards(target, step);
            assert!(pos.distance_squared(target) <= before);
            if pos == target {
                break;
            }
        }
        assert_eq!(pos, target);
    }

    #[test]
    fn test_fixed_determinism() {
        let a = Fixed::from_num(1) / Fixed::from_num(3);
        let b = Fixed::from_num(1) / Fixed::from_num(3);
        assert_eq!(a * Fixed::from_num(7), b * Fixed::from_num(7));
    }
}
