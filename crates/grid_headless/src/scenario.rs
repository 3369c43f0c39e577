//! Scenario loading and configuration.
//!
//! A scenario describes a grid, the unit and building definitions it uses,
//! what stands where at tick zero, and a schedule of orders to issue while
//! it runs. Units and buildings are referred to by the label given in
//! their placement.

use std::collections::BTreeSet;
use std::path::Path;

use grid_core::data::{BuildingData, UnitData};
use grid_core::error::GridError;
use grid_core::grid::GridConfig;
use grid_core::movement::MovementTuning;
use grid_core::position::GridPosition;
use grid_core::simulation::SimulationConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Ticks to run when neither the scenario nor the caller says otherwise.
pub const DEFAULT_SCENARIO_TICKS: u64 = 600;

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// Placement names a unit kind with no definition.
    #[error("Unknown unit kind '{0}'")]
    UnknownUnitKind(String),
    /// Placement names a building kind with no definition.
    #[error("Unknown building kind '{0}'")]
    UnknownBuildingKind(String),
    /// Order refers to a label no placement declares.
    #[error("Unknown label '{0}'")]
    UnknownLabel(String),
    /// Two placements share a label.
    #[error("Duplicate label '{0}'")]
    DuplicateLabel(String),
    /// Grid rejected the initial setup.
    #[error("Scenario setup failed: {0}")]
    Setup(#[from] GridError),
}

/// A complete scenario configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Grid dimensions (width, height) in cells.
    pub grid_size: (u32, u32),
    /// Override for the coherence pass interval.
    #[serde(default)]
    pub coherence_interval_ticks: Option<u64>,
    /// Movement tuning shared by every unit.
    #[serde(default)]
    pub movement: MovementTuning,
    /// Default run length.
    #[serde(default)]
    pub ticks: Option<u64>,
    /// Unit definitions.
    #[serde(default)]
    pub unit_types: Vec<UnitData>,
    /// Building definitions.
    #[serde(default)]
    pub building_types: Vec<BuildingData>,
    /// Buildings standing at tick zero. Placed before units.
    #[serde(default)]
    pub buildings: Vec<BuildingPlacement>,
    /// Units standing at tick zero.
    #[serde(default)]
    pub units: Vec<UnitPlacement>,
    /// Orders issued while the scenario runs.
    #[serde(default)]
    pub orders: Vec<TimedOrder>,
}

impl Default for Scenario {
    fn default() -> Self {
        Self::crossing()
    }
}

impl Scenario {
    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        let scenario = Self::from_ron_str(&contents)?;
        tracing::debug!(path = %path.display(), name = %scenario.name, "Loaded scenario");
        Ok(scenario)
    }

    /// Load from a RON string (useful for embedded scenarios).
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = ron::from_str(ron)?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Check that every kind and label the scenario mentions is declared.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        let mut labels = BTreeSet::new();

        for unit in &self.unit_types {
            unit.validate()?;
        }
        for placement in &self.buildings {
            self.building_type(&placement.kind)?;
            if !labels.insert(placement.label.as_str()) {
                return Err(ScenarioError::DuplicateLabel(placement.label.clone()));
            }
        }
        for placement in &self.units {
            self.unit_type(&placement.kind)?;
            if !labels.insert(placement.label.as_str()) {
                return Err(ScenarioError::DuplicateLabel(placement.label.clone()));
            }
        }

        for order in &self.orders {
            match &order.order {
                Order::Move { unit, .. } | Order::Despawn { unit } => {
                    if !labels.contains(unit.as_str()) {
                        return Err(ScenarioError::UnknownLabel(unit.clone()));
                    }
                }
                Order::Produce { building, unit_kind } => {
                    if !labels.contains(building.as_str()) {
                        return Err(ScenarioError::UnknownLabel(building.clone()));
                    }
                    self.unit_type(unit_kind)?;
                }
                Order::Demolish { building } => {
                    if !labels.contains(building.as_str()) {
                        return Err(ScenarioError::UnknownLabel(building.clone()));
                    }
                }
            }
        }
        Ok(())
    }

    /// Look up a unit definition by id.
    pub fn unit_type(&self, kind: &str) -> Result<&UnitData, ScenarioError> {
        self.unit_types
            .iter()
            .find(|data| data.id == kind)
            .ok_or_else(|| ScenarioError::UnknownUnitKind(kind.to_string()))
    }

    /// Look up a building definition by id.
    pub fn building_type(&self, kind: &str) -> Result<&BuildingData, ScenarioError> {
        self.building_types
            .iter()
            .find(|data| data.id == kind)
            .ok_or_else(|| ScenarioError::UnknownBuildingKind(kind.to_string()))
    }

    /// Simulation configuration for this scenario.
    #[must_use]
    pub fn simulation_config(&self) -> SimulationConfig {
        let mut grid = GridConfig::new(self.grid_size.0, self.grid_size.1);
        if let Some(interval) = self.coherence_interval_ticks {
            grid.coherence_interval_ticks = interval;
        }
        SimulationConfig {
            grid,
            movement: self.movement,
            ..SimulationConfig::default()
        }
    }

    /// Run length: `requested`, else the scenario's own, else the default.
    #[must_use]
    pub fn run_length(&self, requested: Option<u64>) -> u64 {
        requested.or(self.ticks).unwrap_or(DEFAULT_SCENARIO_TICKS)
    }

    /// Orders sorted by tick, stable for orders sharing a tick.
    #[must_use]
    pub fn schedule(&self) -> Vec<TimedOrder> {
        let mut orders = self.orders.clone();
        orders.sort_by_key(|order| order.tick);
        orders
    }

    /// Two vehicles crossing paths next to a producing depot.
    #[must_use]
    pub fn crossing() -> Self {
        Self {
            name: "Crossing".to_string(),
            description: "Two buggies cross paths while a depot produces".to_string(),
            grid_size: (12, 6),
            coherence_interval_ticks: None,
            movement: MovementTuning::default(),
            ticks: Some(400),
            unit_types: vec![UnitData {
                id: "buggy".to_string(),
                name: "Buggy".to_string(),
                speed: grid_core::math::Fixed::from_num(2),
                can_move: true,
                locomotion: grid_core::data::LocomotionKind::Vehicle,
            }],
            building_types: vec![BuildingData {
                id: "depot".to_string(),
                name: "Depot".to_string(),
                width: 2,
                height: 2,
                spawn_offset: (2, 0),
                spawn_queue_capacity: 4,
            }],
            buildings: vec![BuildingPlacement::new("depot", "home", 0, 0)],
            units: vec![
                UnitPlacement::new("buggy", "west", 1, 3),
                UnitPlacement::new("buggy", "east", 10, 5),
            ],
            orders: vec![
                TimedOrder::new(0, Order::move_unit("west", 10, 3)),
                TimedOrder::new(0, Order::move_unit("east", 3, 1)),
                TimedOrder::new(
                    20,
                    Order::Produce {
                        building: "home".to_string(),
                        unit_kind: "buggy".to_string(),
                    },
                ),
            ],
        }
    }
}

/// Placement of a unit at scenario start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitPlacement {
    /// Unit type identifier.
    pub kind: String,
    /// Name orders use to refer to this unit.
    pub label: String,
    /// Cell (x, y).
    pub position: (i32, i32),
}

impl UnitPlacement {
    /// Create a new unit placement.
    #[must_use]
    pub fn new(kind: impl Into<String>, label: impl Into<String>, x: i32, y: i32) -> Self {
        Self {
            kind: kind.into(),
            label: label.into(),
            position: (x, y),
        }
    }

    /// Placement cell.
    #[must_use]
    pub const fn cell(&self) -> GridPosition {
        GridPosition::new(self.position.0, self.position.1)
    }
}

/// Placement of a building at scenario start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildingPlacement {
    /// Building type identifier.
    pub kind: String,
    /// Name orders use to refer to this building.
    pub label: String,
    /// Bottom-left footprint cell (x, y).
    pub origin: (i32, i32),
}

impl BuildingPlacement {
    /// Create a new building placement.
    #[must_use]
    pub fn new(kind: impl Into<String>, label: impl Into<String>, x: i32, y: i32) -> Self {
        Self {
            kind: kind.into(),
            label: label.into(),
            origin: (x, y),
        }
    }

    /// Footprint origin cell.
    #[must_use]
    pub const fn cell(&self) -> GridPosition {
        GridPosition::new(self.origin.0, self.origin.1)
    }
}

/// An order and the tick it is issued on.
///
/// Orders for tick `n` are issued after `n` ticks have run, before the next.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimedOrder {
    /// Tick the order is issued on.
    pub tick: u64,
    /// What to do.
    pub order: Order,
}

impl TimedOrder {
    /// Create a new timed order.
    #[must_use]
    pub const fn new(tick: u64, order: Order) -> Self {
        Self { tick, order }
    }
}

/// Scripted orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Order {
    /// Send a unit to a cell.
    Move {
        /// Unit label.
        unit: String,
        /// Destination cell (x, y).
        to: (i32, i32),
    },
    /// Queue a unit at a building's exit.
    Produce {
        /// Building label.
        building: String,
        /// Unit type identifier.
        unit_kind: String,
    },
    /// Remove a unit.
    Despawn {
        /// Unit label.
        unit: String,
    },
    /// Remove a building.
    Demolish {
        /// Building label.
        building: String,
    },
}

impl Order {
    /// Shorthand for [`Order::Move`].
    #[must_use]
    pub fn move_unit(unit: impl Into<String>, x: i32, y: i32) -> Self {
        Self::Move {
            unit: unit.into(),
            to: (x, y),
        }
    }

    /// Short name for logs and reports.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Move { .. } => "move",
            Self::Produce { .. } => "produce",
            Self::Despawn { .. } => "despawn",
            Self::Demolish { .. } => "demolish",
        }
    }
}
