//! Scenario runner.
//!
//! Builds a [`Simulation`] from a [`Scenario`], issues its orders on
//! schedule, and tallies what happened into a JSON-friendly report.

use std::collections::{BTreeMap, VecDeque};

use grid_core::movement::{MovementEvent, MovementState};
use grid_core::occupant::OccupantId;
use grid_core::position::GridPosition;
use grid_core::simulation::{Simulation, SpawnOutcome, TickEvents};
use serde::{Deserialize, Serialize};

use crate::scenario::{Order, Scenario, ScenarioError, TimedOrder};

/// Event tallies over a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Move orders that produced a path.
    pub paths_assigned: u32,
    /// Move orders that changed an in-flight route.
    pub redirects: u32,
    /// Successful cell reservations.
    pub reservations: u32,
    /// Cells fully entered.
    pub cells_entered: u32,
    /// Units that reached their destination.
    pub arrivals: u32,
    /// Times a unit found its next cell taken.
    pub waits: u32,
    /// Units that gave up.
    pub blocks: u32,
    /// Units released from spawn queues.
    pub spawned: u32,
    /// Coherence passes run.
    pub coherence_passes: u32,
    /// Violations found by those passes.
    pub coherence_violations: u32,
}

impl RunStats {
    fn record_movement(&mut self, event: &MovementEvent) {
        match event {
            MovementEvent::PathAssigned { .. } => self.paths_assigned += 1,
            MovementEvent::Redirected { .. } => self.redirects += 1,
            MovementEvent::CellReserved { .. } => self.reservations += 1,
            MovementEvent::CellEntered { .. } => self.cells_entered += 1,
            MovementEvent::Arrived { .. } => self.arrivals += 1,
            MovementEvent::Waiting { .. } => self.waits += 1,
            MovementEvent::Blocked { .. } => self.blocks += 1,
        }
    }

    fn record_tick(&mut self, events: &TickEvents) {
        for (_, event) in &events.movement {
            self.record_movement(event);
        }
        self.spawned += events.spawned.len() as u32;
        if let Some(report) = &events.coherence {
            self.coherence_passes += 1;
            self.coherence_violations += report.violations.len() as u32;
        }
    }
}

/// An order the simulation refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderFailure {
    /// Tick the order was issued on.
    pub tick: u64,
    /// Order name.
    pub order: String,
    /// Why it failed.
    pub reason: String,
}

/// Final state of one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitReport {
    /// Occupant handle.
    pub id: String,
    /// Placement label, absent for produced units.
    pub label: Option<String>,
    /// Unit type identifier.
    pub kind: String,
    /// Movement state.
    pub state: MovementState,
    /// Last cell fully entered.
    pub cell: GridPosition,
    /// Cell the grid tracks for the unit.
    pub reserved: Option<GridPosition>,
}

/// Final state of one building.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildingReport {
    /// Occupant handle.
    pub id: String,
    /// Placement label.
    pub label: Option<String>,
    /// Building type identifier.
    pub kind: String,
    /// Footprint origin.
    pub origin: GridPosition,
    /// Units waiting in the spawn queue.
    pub queued: usize,
}

/// Result of running a scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Scenario name.
    pub scenario: String,
    /// Ticks run.
    pub ticks: u64,
    /// Simulation state hash after the last tick.
    pub state_hash: u64,
    /// Occupied cells after the last tick.
    pub occupied_cells: usize,
    /// Event tallies.
    pub stats: RunStats,
    /// Units in id order.
    pub units: Vec<UnitReport>,
    /// Buildings in id order.
    pub buildings: Vec<BuildingReport>,
    /// Orders the simulation refused.
    pub failures: Vec<OrderFailure>,
}

impl RunReport {
    /// Pretty-printed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Report for a unit by placement label.
    #[must_use]
    pub fn unit(&self, label: &str) -> Option<&UnitReport> {
        self.units
            .iter()
            .find(|unit| unit.label.as_deref() == Some(label))
    }
}

/// Drives one scenario through a simulation.
pub struct ScenarioRunner {
    scenario: Scenario,
    sim: Simulation,
    labels: BTreeMap<String, OccupantId>,
    pending: VecDeque<TimedOrder>,
    stats: RunStats,
    failures: Vec<OrderFailure>,
}

impl ScenarioRunner {
    /// Set up the scenario's grid, buildings and units.
    ///
    /// Buildings are placed before units, each in file order.
    pub fn new(scenario: Scenario) -> Result<Self, ScenarioError> {
        scenario.validate()?;
        let mut sim = Simulation::new(scenario.simulation_config())?;
        let mut labels = BTreeMap::new();

        for placement in &scenario.buildings {
            let data = scenario.building_type(&placement.kind)?;
            let id = sim.place_building(data, placement.cell())?;
            labels.insert(placement.label.clone(), id);
        }
        for placement in &scenario.units {
            let data = scenario.unit_type(&placement.kind)?;
            let id = sim.spawn_unit(data, placement.cell())?;
            labels.insert(placement.label.clone(), id);
        }

        tracing::info!(
            scenario = %scenario.name,
            width = scenario.grid_size.0,
            height = scenario.grid_size.1,
            buildings = scenario.buildings.len(),
            units = scenario.units.len(),
            orders = scenario.orders.len(),
            "Scenario ready"
        );

        let pending = scenario.schedule().into();
        Ok(Self {
            scenario,
            sim,
            labels,
            pending,
            stats: RunStats::default(),
            failures: Vec::new(),
        })
    }

    /// The simulation being driven.
    #[must_use]
    pub fn simulation(&self) -> &Simulation {
        &self.sim
    }

    /// The scenario being run.
    #[must_use]
    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    /// Occupant behind a placement label.
    #[must_use]
    pub fn occupant(&self, label: &str) -> Option<OccupantId> {
        self.labels.get(label).copied()
    }

    /// Tallies so far.
    #[must_use]
    pub fn stats(&self) -> RunStats {
        self.stats
    }

    /// Issue due orders, then advance one tick.
    pub fn step(&mut self) -> TickEvents {
        self.issue_due_orders();
        let events = self.sim.tick();
        self.stats.record_tick(&events);
        events
    }

    /// Run `ticks` ticks and report.
    pub fn run(&mut self, ticks: u64) -> RunReport {
        for _ in 0..ticks {
            self.step();
        }
        let report = self.report();
        tracing::info!(
            scenario = %report.scenario,
            ticks = report.ticks,
            hash = format_args!("{:016x}", report.state_hash),
            arrivals = report.stats.arrivals,
            blocks = report.stats.blocks,
            failures = report.failures.len(),
            "Scenario complete"
        );
        report
    }

    /// Snapshot of the current state.
    #[must_use]
    pub fn report(&self) -> RunReport {
        let names: BTreeMap<OccupantId, &str> = self
            .labels
            .iter()
            .map(|(label, &id)| (id, label.as_str()))
            .collect();
        let label_of = |id: OccupantId| names.get(&id).map(|label| (*label).to_string());

        let units = self
            .sim
            .units()
            .map(|unit| UnitReport {
                id: unit.id.to_string(),
                label: label_of(unit.id),
                kind: unit.data_id.clone(),
                state: unit.locomotion.state(),
                cell: unit.locomotion.current_cell(),
                reserved: self.sim.grid().unit_position(unit.id),
            })
            .collect();

        let buildings = self
            .sim
            .buildings()
            .map(|building| BuildingReport {
                id: building.id.to_string(),
                label: label_of(building.id),
                kind: building.data_id.clone(),
                origin: building.origin,
                queued: building.spawn.len(),
            })
            .collect();

        RunReport {
            scenario: self.scenario.name.clone(),
            ticks: self.sim.current_tick(),
            state_hash: self.sim.state_hash(),
            occupied_cells: self.sim.grid().occupied_cells().count(),
            stats: self.stats,
            units,
            buildings,
            failures: self.failures.clone(),
        }
    }

    fn issue_due_orders(&mut self) {
        let now = self.sim.current_tick();
        while self.pending.front().is_some_and(|order| order.tick <= now) {
            let Some(timed) = self.pending.pop_front() else {
                break;
            };
            if let Err(reason) = self.issue(&timed.order) {
                tracing::warn!(tick = now, order = timed.order.name(), %reason, "Order failed");
                self.failures.push(OrderFailure {
                    tick: now,
                    order: timed.order.name().to_string(),
                    reason,
                });
            }
        }
    }

    fn issue(&mut self, order: &Order) -> Result<(), String> {
        match order {
            Order::Move { unit, to } => {
                let id = self.lookup(unit)?;
                let target = GridPosition::new(to.0, to.1);
                match self.sim.move_unit(id, target) {
                    Ok(Some(event)) => {
                        self.stats.record_movement(&event);
                        Ok(())
                    }
                    Ok(None) => Ok(()),
                    Err(error) => Err(error.to_string()),
                }
            }
            Order::Produce {
                building,
                unit_kind,
            } => {
                let id = self.lookup(building)?;
                let data = self
                    .scenario
                    .unit_type(unit_kind)
                    .map_err(|error| error.to_string())?
                    .clone();
                match self.sim.request_spawn(id, &data) {
                    Ok(SpawnOutcome::Spawned(_)) => {
                        self.stats.spawned += 1;
                        Ok(())
                    }
                    Ok(SpawnOutcome::Queued { place }) => {
                        tracing::debug!(%building, place, "Production queued");
                        Ok(())
                    }
                    Err(error) => Err(error.to_string()),
                }
            }
            Order::Despawn { unit } => {
                let id = self.lookup(unit)?;
                self.sim.despawn_unit(id).map_err(|error| error.to_string())
            }
            Order::Demolish { building } => {
                let id = self.lookup(building)?;
                self.sim
                    .demolish_building(id)
                    .map(|_| ())
                    .map_err(|error| error.to_string())
            }
        }
    }

    fn lookup(&self, label: &str) -> Result<OccupantId, String> {
        self.occupant(label)
            .ok_or_else(|| format!("unknown label '{label}'"))
    }
}

/// Build, run and report in one call.
pub fn run_scenario(scenario: Scenario, ticks: Option<u64>) -> Result<RunReport, ScenarioError> {
    let ticks = scenario.run_length(ticks);
    let mut runner = ScenarioRunner::new(scenario)?;
    Ok(runner.run(ticks))
}
