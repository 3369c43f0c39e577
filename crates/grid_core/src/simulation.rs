//! Core simulation loop.
//!
//! [`Simulation`] owns the grid, the occupant arena, and every unit and
//! building, and advances them on a fixed tick.
//!
//! # Determinism
//!
//! - No floating-point math in the tick (fixed-point via [`Fixed`])
//! - Integer millisecond timers
//! - Consistent iteration order (ascending occupant ids, `BTreeMap`)
//! - Same inputs always produce the same [`state_hash`](Simulation::state_hash)
//!
//! # Example
//!
//! ```
//! use grid_core::data::UnitData;
//! use grid_core::position::GridPosition;
//! use grid_core::simulation::{Simulation, SimulationConfig};
//!
//! let mut sim = Simulation::new(SimulationConfig::with_grid_size(5, 5)).unwrap();
//! let buggy = UnitData::from_ron_str("buggy", r#"(id: "buggy", name: "Buggy", speed: 2.0)"#).unwrap();
//!
//! let unit = sim.spawn_unit(&buggy, GridPosition::new(2, 2)).unwrap();
//! sim.move_unit(unit, GridPosition::new(4, 4)).unwrap();
//!
//! for _ in 0..100 {
//!     sim.tick();
//! }
//! assert_eq!(sim.current_grid_position(unit), Some(GridPosition::new(4, 4)));
//! ```

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::buildings::BuildingFootprint;
use crate::coherence::CoherenceReport;
use crate::data::{BuildingData, UnitData};
use crate::error::{GridError, Result};
use crate::grid::{GridConfig, GridManager};
use crate::math::{fixed_serde, Fixed};
use crate::movement::{Locomotion, MovementEvent, MovementState, MovementTuning, TickContext};
use crate::occupant::{OccupantArena, OccupantId, OccupantKind};
use crate::position::GridPosition;
use crate::spawn::SpawnPoint;

/// Ticks per second for the simulation.
pub const TICK_RATE: u32 = 20;

/// Duration of one tick in milliseconds.
pub const TICK_DURATION_MS: u32 = 1000 / TICK_RATE;

/// Static simulation configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Grid dimensions and coherence cadence.
    pub grid: GridConfig,
    /// Movement constants shared by every vehicle.
    #[serde(default)]
    pub movement: MovementTuning,
    /// Milliseconds advanced per tick.
    #[serde(default = "default_tick_duration")]
    pub tick_duration_ms: u32,
}

const fn default_tick_duration() -> u32 {
    TICK_DURATION_MS
}

impl SimulationConfig {
    /// Default configuration on a `width` × `height` grid.
    #[must_use]
    pub fn with_grid_size(width: u32, height: u32) -> Self {
        Self {
            grid: GridConfig::new(width, height),
            ..Self::default()
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            grid: GridConfig::default(),
            movement: MovementTuning::default(),
            tick_duration_ms: TICK_DURATION_MS,
        }
    }
}

/// A unit in the simulation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitState {
    /// Grid identity.
    pub id: OccupantId,
    /// Definition this unit was created from.
    pub data_id: String,
    /// World units per second.
    #[serde(with = "fixed_serde")]
    pub speed: Fixed,
    /// Movement strategy.
    pub locomotion: Locomotion,
}

/// A building in the simulation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildingState {
    /// Grid identity.
    pub id: OccupantId,
    /// Definition this building was created from.
    pub data_id: String,
    /// Anchor cell (lowest x, lowest y).
    pub origin: GridPosition,
    /// Size in cells.
    pub footprint: BuildingFootprint,
    /// Exit for produced units.
    pub spawn: SpawnPoint,
}

/// Result of asking a building to produce a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpawnOutcome {
    /// The unit is on the grid.
    Spawned(OccupantId),
    /// The spawn cell was blocked; the unit waits at this 1-based place.
    Queued {
        /// Place in line.
        place: usize,
    },
}

/// Events generated during a simulation tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickEvents {
    /// Tick these events belong to.
    pub tick: u64,
    /// Units released from spawn queues, as `(building, unit)`.
    pub spawned: Vec<(OccupantId, OccupantId)>,
    /// Movement transitions in unit id order.
    pub movement: Vec<(OccupantId, MovementEvent)>,
    /// Present on ticks where the coherence pass ran.
    pub coherence: Option<CoherenceReport>,
}

/// The core simulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Simulation {
    config: SimulationConfig,
    tick: u64,
    grid: GridManager,
    arena: OccupantArena,
    units: BTreeMap<OccupantId, UnitState>,
    buildings: BTreeMap<OccupantId, BuildingState>,
}

impl Simulation {
    /// Create an empty simulation.
    ///
    /// # Errors
    ///
    /// Propagates [`GridManager::with_config`] failures.
    pub fn new(config: SimulationConfig) -> Result<Self> {
        Ok(Self {
            grid: GridManager::with_config(config.grid)?,
            config,
            tick: 0,
            arena: OccupantArena::new(),
            units: BTreeMap::new(),
            buildings: BTreeMap::new(),
        })
    }

    /// Get the current tick number.
    #[must_use]
    pub const fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Configuration in use.
    #[must_use]
    pub const fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Read access to the grid.
    #[must_use]
    pub const fn grid(&self) -> &GridManager {
        &self.grid
    }

    /// Live occupant identities.
    #[must_use]
    pub const fn arena(&self) -> &OccupantArena {
        &self.arena
    }

    // ------------------------------------------------------------------
    // Units
    // ------------------------------------------------------------------

    /// Create a unit and register it on `pos`.
    ///
    /// # Errors
    ///
    /// [`GridError::InvalidUnitData`] if `data` fails
    /// [`UnitData::validate`], otherwise any [`GridManager::register_unit`]
    /// failure; nothing is created then.
    pub fn spawn_unit(&mut self, data: &UnitData, pos: GridPosition) -> Result<OccupantId> {
        data.validate()?;
        let id = self.arena.insert(OccupantKind::Unit);
        if let Err(error) = self.grid.register_unit(id, pos) {
            self.arena.remove(id);
            return Err(error);
        }

        let locomotion = Locomotion::new(&self.grid, pos, data.locomotion_kind(), self.config.movement);
        self.units.insert(
            id,
            UnitState {
                id,
                data_id: data.id.clone(),
                speed: data.speed,
                locomotion,
            },
        );
        tracing::debug!(unit = %id, kind = %data.id, position = %pos, "Spawned unit");
        Ok(id)
    }

    /// Remove a unit, freeing its reserved cell.
    ///
    /// # Errors
    ///
    /// [`GridError::UnknownOccupant`] if `id` is not a live unit.
    pub fn despawn_unit(&mut self, id: OccupantId) -> Result<()> {
        if self.units.remove(&id).is_none() {
            return Err(GridError::UnknownOccupant(id));
        }
        self.grid.unregister_unit(id);
        self.arena.remove(id);
        tracing::debug!(unit = %id, "Despawned unit");
        Ok(())
    }

    /// Order a unit to move.
    ///
    /// # Errors
    ///
    /// [`GridError::UnknownOccupant`] for a dead handle, otherwise as
    /// [`Locomotion::move_to`].
    pub fn move_unit(
        &mut self,
        id: OccupantId,
        target: GridPosition,
    ) -> Result<Option<MovementEvent>> {
        let Some(unit) = self.units.get_mut(&id) else {
            tracing::warn!(unit = %id, "Move order for unknown unit");
            return Err(GridError::UnknownOccupant(id));
        };
        unit.locomotion.move_to(&self.grid, id, target)
    }

    /// True while the unit is interpolating between cells.
    #[must_use]
    pub fn is_moving(&self, id: OccupantId) -> bool {
        self.units
            .get(&id)
            .is_some_and(|unit| unit.locomotion.is_moving())
    }

    /// Last cell the unit fully entered.
    #[must_use]
    pub fn current_grid_position(&self, id: OccupantId) -> Option<GridPosition> {
        self.units.get(&id).map(|unit| unit.locomotion.current_cell())
    }

    /// Movement state of a unit.
    #[must_use]
    pub fn unit_state(&self, id: OccupantId) -> Option<MovementState> {
        self.units.get(&id).map(|unit| unit.locomotion.state())
    }

    /// A unit by id.
    #[must_use]
    pub fn unit(&self, id: OccupantId) -> Option<&UnitState> {
        self.units.get(&id)
    }

    /// All units in ascending id order.
    pub fn units(&self) -> impl Iterator<Item = &UnitState> {
        self.units.values()
    }

    // ------------------------------------------------------------------
    // Buildings
    // ------------------------------------------------------------------

    /// Place a building with its whole footprint at `origin`.
    ///
    /// # Errors
    ///
    /// [`GridError::InvalidFootprint`] for a zero-sized definition, or any
    /// [`GridManager::try_occupy_building_cells`] failure.
    pub fn place_building(&mut self, data: &BuildingData, origin: GridPosition) -> Result<OccupantId> {
        let footprint = data.footprint()?;
        let id = self.arena.insert(OccupantKind::Building);
        if let Err(error) = self.grid.try_occupy_building_cells(id, origin, footprint) {
            self.arena.remove(id);
            return Err(error);
        }

        let spawn = SpawnPoint::new(data.spawn_cell(origin), data.spawn_queue_capacity);
        tracing::debug!(
            building = %id,
            kind = %data.id,
            origin = %origin,
            spawn_cell = %spawn.cell(),
            "Placed building"
        );
        self.buildings.insert(
            id,
            BuildingState {
                id,
                data_id: data.id.clone(),
                origin,
                footprint,
                spawn,
            },
        );
        Ok(id)
    }

    /// Remove a building, freeing its footprint and dropping its spawn queue.
    ///
    /// Returns how many queued units were dropped.
    ///
    /// # Errors
    ///
    /// [`GridError::UnknownOccupant`] if `id` is not a live building.
    pub fn demolish_building(&mut self, id: OccupantId) -> Result<usize> {
        let Some(mut building) = self.buildings.remove(&id) else {
            return Err(GridError::UnknownOccupant(id));
        };
        self.grid.release_building_cells(id);
        self.arena.remove(id);

        let dropped = building.spawn.clear();
        tracing::debug!(building = %id, dropped, "Demolished building");
        Ok(dropped)
    }

    /// Ask a building to produce a unit at its spawn cell.
    ///
    /// The unit appears at once if the spawn cell is free and nobody is
    /// already waiting; otherwise it joins the back of the queue.
    ///
    /// # Errors
    ///
    /// - [`GridError::InvalidUnitData`] if `data` fails [`UnitData::validate`]
    /// - [`GridError::UnknownOccupant`] if `building` is not a live building
    /// - [`GridError::SpawnQueueFull`] if the queue is at capacity
    pub fn request_spawn(&mut self, building: OccupantId, data: &UnitData) -> Result<SpawnOutcome> {
        data.validate()?;
        let Some(state) = self.buildings.get(&building) else {
            tracing::warn!(%building, "Spawn request for unknown building");
            return Err(GridError::UnknownOccupant(building));
        };

        let cell = state.spawn.cell();
        if state.spawn.is_empty() && state.spawn.is_clear(&self.grid) {
            return self.spawn_unit(data, cell).map(SpawnOutcome::Spawned);
        }

        let Some(state) = self.buildings.get_mut(&building) else {
            return Err(GridError::UnknownOccupant(building));
        };
        match state.spawn.enqueue(data.clone()) {
            Ok(place) => {
                tracing::debug!(%building, kind = %data.id, place, "Spawn cell blocked, unit queued");
                Ok(SpawnOutcome::Queued { place })
            }
            Err(_) => {
                let capacity = state.spawn.capacity();
                tracing::warn!(%building, kind = %data.id, capacity, "Spawn queue full");
                Err(GridError::SpawnQueueFull { building, capacity })
            }
        }
    }

    /// A building by id.
    #[must_use]
    pub fn building(&self, id: OccupantId) -> Option<&BuildingState> {
        self.buildings.get(&id)
    }

    /// All buildings in ascending id order.
    pub fn buildings(&self) -> impl Iterator<Item = &BuildingState> {
        self.buildings.values()
    }

    // ------------------------------------------------------------------
    // Tick
    // ------------------------------------------------------------------

    /// Advance the simulation by one tick.
    ///
    /// Order: spawn queues, then unit movement, then the coherence pass on
    /// ticks that are a multiple of the configured interval. Buildings and
    /// units are processed in ascending id order.
    pub fn tick(&mut self) -> TickEvents {
        self.tick += 1;
        let ctx = TickContext::new(self.tick, self.config.tick_duration_ms);
        let mut events = TickEvents {
            tick: self.tick,
            ..TickEvents::default()
        };

        // 1. Spawn queues, each seeing the spawns released before it
        let building_ids: Vec<OccupantId> = self.buildings.keys().copied().collect();
        for building in building_ids {
            let Some(state) = self.buildings.get_mut(&building) else {
                continue;
            };
            let cell = state.spawn.cell();
            let Some(data) = state.spawn.update(ctx, &self.grid) else {
                continue;
            };
            match self.spawn_unit(&data, cell) {
                Ok(unit) => events.spawned.push((building, unit)),
                Err(error) => {
                    tracing::warn!(%building, kind = %data.id, %error, "Queued spawn failed, requeued");
                    if let Some(state) = self.buildings.get_mut(&building) {
                        state.spawn.requeue_front(data);
                    }
                }
            }
        }

        // 2. Movement
        for (&id, unit) in &mut self.units {
            for event in unit.locomotion.update(ctx, &mut self.grid, id, unit.speed) {
                events.movement.push((id, event));
            }
        }

        // 3. Coherence
        events.coherence = self.grid.run_coherence_pass(self.tick, &self.arena);

        events
    }

    /// Compute a hash of the simulation state.
    ///
    /// Two simulations fed the same operations produce the same hash.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.tick.hash(&mut hasher);
        self.grid.occupancy_hash().hash(&mut hasher);

        self.units.len().hash(&mut hasher);
        for (id, unit) in &self.units {
            id.hash(&mut hasher);
            unit.speed.to_bits().hash(&mut hasher);
            unit.locomotion.state().hash(&mut hasher);
            unit.locomotion.current_cell().hash(&mut hasher);
            unit.locomotion.world_position().hash(&mut hasher);
            if let Some(vehicle) = unit.locomotion.as_vehicle() {
                vehicle.destination().hash(&mut hasher);
                vehicle.path().hash(&mut hasher);
                vehicle.path_index().hash(&mut hasher);
                vehicle.retry_count().hash(&mut hasher);
            }
        }

        self.buildings.len().hash(&mut hasher);
        for (id, building) in &self.buildings {
            id.hash(&mut hasher);
            building.origin.hash(&mut hasher);
            building.spawn.len().hash(&mut hasher);
        }

        hasher.finish()
    }

    /// Serialize simulation state to bytes.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::Serialization`] if encoding fails.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| GridError::Serialization(format!("Failed to serialize simulation: {e}")))
    }

    /// Deserialize simulation state from bytes.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::Serialization`] if decoding fails.
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data)
            .map_err(|e| GridError::Serialization(format!("Failed to deserialize simulation: {e}")))
    }
}
