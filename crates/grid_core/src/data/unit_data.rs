//! Unit definitions.

use serde::{Deserialize, Serialize};

use crate::error::{GridError, Result};
use crate::math::{fixed_decimal_serde, Fixed};

/// How a unit gets around. Picked once when the unit is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LocomotionKind {
    /// Ground vehicle moving cell by cell.
    #[default]
    Vehicle,
}

/// Data-driven unit definition.
///
/// # Example RON
///
/// ```ron
/// UnitData(
///     id: "buggy",
///     name: "Buggy",
///     speed: 2.5,
///     can_move: true,
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitData {
    /// Unique string identifier for this unit type.
    pub id: String,

    /// Display name.
    pub name: String,

    /// Movement speed in world units per second.
    #[serde(with = "fixed_decimal_serde", default = "default_speed")]
    pub speed: Fixed,

    /// False for static units such as turrets.
    #[serde(default = "default_true")]
    pub can_move: bool,

    /// Movement strategy when `can_move` is set.
    #[serde(default)]
    pub locomotion: LocomotionKind,
}

fn default_speed() -> Fixed {
    Fixed::from_num(5)
}

const fn default_true() -> bool {
    true
}

impl UnitData {
    /// Parse a single unit definition from RON text.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::DataParseError`](crate::error::GridError::DataParseError)
    /// naming `source_name` if the text is not a valid definition.
    pub fn from_ron_str(source_name: &str, text: &str) -> Result<Self> {
        let unit: Self = super::parse_ron(source_name, text)?;
        unit.validate()?;
        Ok(unit)
    }

    /// Parse a list of unit definitions from RON text.
    ///
    /// # Errors
    ///
    /// As [`from_ron_str`](Self::from_ron_str).
    pub fn list_from_ron_str(source_name: &str, text: &str) -> Result<Vec<Self>> {
        let units: Vec<Self> = super::parse_ron(source_name, text)?;
        for unit in &units {
            unit.validate()?;
        }
        Ok(units)
    }

    /// Movement strategy, or `None` for a unit that cannot move.
    #[must_use]
    pub const fn locomotion_kind(&self) -> Option<LocomotionKind> {
        if self.can_move {
            Some(self.locomotion)
        } else {
            None
        }
    }

    /// Check the definition can be simulated.
    ///
    /// # Errors
    ///
    /// [`GridError::InvalidUnitData`] for a mobile unit without a positive
    /// speed.
    pub fn validate(&self) -> Result<()> {
        if self.can_move && self.speed <= Fixed::ZERO {
            tracing::warn!(unit = %self.id, speed = %self.speed, "Mobile unit needs a positive speed");
            return Err(GridError::InvalidUnitData {
                unit: self.id.clone(),
                reason: format!("speed {} must be positive for a mobile unit", self.speed),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_definition() {
        let unit = UnitData::from_ron_str(
            "buggy.ron",
            r#"UnitData(id: "buggy", name: "Buggy", speed: 2.5, can_move: true, locomotion: Vehicle)"#,
        )
        .unwrap();

        assert_eq!(unit.id, "buggy");
        assert_eq!(unit.speed, Fixed::from_num(2.5));
        assert!(unit.can_move);
        assert_eq!(unit.locomotion, LocomotionKind::Vehicle);
    }

    #[test]
    fn test_defaults() {
        let unit = UnitData::from_ron_str("turret.ron", r#"(id: "turret", name: "Turret", can_move: false)"#)
            .unwrap();
        assert_eq!(unit.speed, Fixed::from_num(5));
        assert!(!unit.can_move);
    }

    #[test]
    fn test_parse_error_names_source() {
        let err = UnitData::from_ron_str("broken.ron", "UnitData(id: 3)").unwrap_err();
        assert!(matches!(
            err,
            GridError::DataParseError { ref source_name, .. } if source_name == "broken.ron"
        ));
    }

    #[test]
    fn test_mobile_unit_needs_positive_speed() {
        let err = UnitData::from_ron_str("stuck.ron", r#"(id: "stuck", name: "Stuck", speed: 0.0)"#)
            .unwrap_err();
        assert!(matches!(err, GridError::InvalidUnitData { ref unit, .. } if unit == "stuck"));

        assert!(UnitData::list_from_ron_str("units.ron", r#"[(id: "a", name: "A"), (id: "b", name: "B", speed: -1.0)]"#)
            .is_err());

        let turret = UnitData::from_ron_str(
            "turret.ron",
            r#"(id: "turret", name: "Turret", speed: 0.0, can_move: false)"#,
        )
        .unwrap();
        assert_eq!(turret.locomotion_kind(), None);
    }

    #[test]
    fn test_locomotion_kind() {
        let unit = UnitData::from_ron_str("buggy.ron", r#"(id: "buggy", name: "Buggy")"#).unwrap();
        assert_eq!(unit.locomotion_kind(), Some(LocomotionKind::Vehicle));
    }

    #[test]
    fn test_list() {
        let units = UnitData::list_from_ron_str(
            "units.ron",
            r#"[(id: "a", name: "A"), (id: "b", name: "B", speed: 1.0)]"#,
        )
        .unwrap();
        assert_eq!(units.len(), 2);
        assert_eq!(units[1].speed, Fixed::ONE);
    }
}
