//! Periodic cross-check between the tracking maps and the cell array.
//!
//! The atomic primitives in [`crate::grid`] and [`crate::buildings`] keep
//! both views in agreement on their own. This pass exists to catch bugs,
//! not to paper over them: every disagreement is reported, and the only
//! thing it repairs is a cell still held by an occupant that no longer
//! exists.

use serde::{Deserialize, Serialize};

use crate::grid::GridManager;
use crate::occupant::{Liveness, OccupantId};
use crate::position::GridPosition;

/// One detected disagreement between tracking and cell state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoherenceViolation {
    /// A tracked unit's cell is empty.
    UnitCellEmpty {
        /// Tracked unit.
        occupant: OccupantId,
        /// Its recorded cell.
        position: GridPosition,
    },
    /// A tracked unit's cell is held by someone else.
    UnitCellHeldByOther {
        /// Tracked unit.
        occupant: OccupantId,
        /// Its recorded cell.
        position: GridPosition,
        /// Actual holder.
        holder: OccupantId,
    },
    /// A building footprint cell is empty.
    BuildingCellEmpty {
        /// Tracked building.
        occupant: OccupantId,
        /// Footprint cell.
        position: GridPosition,
    },
    /// A building footprint cell is held by someone else.
    BuildingCellHeldByOther {
        /// Tracked building.
        occupant: OccupantId,
        /// Footprint cell.
        position: GridPosition,
        /// Actual holder.
        holder: OccupantId,
    },
    /// Tracking refers to a cell outside the grid.
    TrackedOutOfBounds {
        /// Tracked occupant.
        occupant: OccupantId,
        /// Recorded position.
        position: GridPosition,
    },
    /// Occupant appears in both the unit and the building map.
    TrackedTwice(OccupantId),
    /// Cell held by an occupant that no longer exists. Healed by release.
    OrphanedCell {
        /// Cell that was freed.
        position: GridPosition,
        /// Dangling holder.
        occupant: OccupantId,
    },
    /// Cell held by an occupant neither map knows about.
    UntrackedOccupant {
        /// Occupied cell.
        position: GridPosition,
        /// Holder.
        occupant: OccupantId,
    },
    /// Cell held by a unit whose tracked position is a different cell.
    UnitTrackedElsewhere {
        /// Occupied cell.
        position: GridPosition,
        /// Holder.
        occupant: OccupantId,
        /// Where the unit map says it is.
        tracked: GridPosition,
    },
    /// Cell held by a building but not part of its recorded footprint.
    CellOutsideFootprint {
        /// Occupied cell.
        position: GridPosition,
        /// Holder.
        occupant: OccupantId,
    },
}

impl CoherenceViolation {
    /// True for the one case the pass repairs itself.
    #[must_use]
    pub const fn is_healed(&self) -> bool {
        matches!(self, Self::OrphanedCell { .. })
    }
}

impl std::fmt::Display for CoherenceViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnitCellEmpty { occupant, position } => {
                write!(f, "unit {occupant} tracked at {position} but the cell is empty")
            }
            Self::UnitCellHeldByOther {
                occupant,
                position,
                holder,
            } => write!(
                f,
                "unit {occupant} tracked at {position} but the cell is held by {holder}"
            ),
            Self::BuildingCellEmpty { occupant, position } => write!(
                f,
                "building {occupant} footprint cell {position} is empty"
            ),
            Self::BuildingCellHeldByOther {
                occupant,
                position,
                holder,
            } => write!(
                f,
                "building {occupant} footprint cell {position} is held by {holder}"
            ),
            Self::TrackedOutOfBounds { occupant, position } => {
                write!(f, "{occupant} tracked at out-of-bounds cell {position}")
            }
            Self::TrackedTwice(occupant) => {
                write!(f, "{occupant} tracked as both unit and building")
            }
            Self::OrphanedCell { position, occupant } => write!(
                f,
                "cell {position} held by destroyed occupant {occupant} (released)"
            ),
            Self::UntrackedOccupant { position, occupant } => {
                write!(f, "cell {position} held by untracked occupant {occupant}")
            }
            Self::UnitTrackedElsewhere {
                position,
                occupant,
                tracked,
            } => write!(
                f,
                "cell {position} held by unit {occupant} which is tracked at {tracked}"
            ),
            Self::CellOutsideFootprint { position, occupant } => write!(
                f,
                "cell {position} held by building {occupant} outside its footprint"
            ),
        }
    }
}

/// Outcome of one coherence pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoherenceReport {
    /// Tick the pass ran on.
    pub tick: u64,
    /// Dangling tracking entries that were dropped.
    pub purged: Vec<OccupantId>,
    /// Every disagreement found, healed ones included.
    pub violations: Vec<CoherenceViolation>,
    /// Cells freed because their holder no longer exists.
    pub healed: Vec<GridPosition>,
}

impl CoherenceReport {
    /// No violations were found.
    ///
    /// Purging dangling entries is routine cleanup and does not count.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

impl GridManager {
    /// Check tracking against cells in both directions without consulting
    /// occupant liveness.
    #[must_use]
    pub fn structural_violations(&self) -> Vec<CoherenceViolation> {
        let mut violations = Vec::new();

        // Tracked -> cells
        for (&occupant, &position) in &self.unit_positions {
            if self.building_cells.contains_key(&occupant) {
                violations.push(CoherenceViolation::TrackedTwice(occupant));
            }
            match self.cell(position).map(|cell| cell.occupant()) {
                None => violations.push(CoherenceViolation::TrackedOutOfBounds {
                    occupant,
                    position,
                }),
                Some(None) => {
                    violations.push(CoherenceViolation::UnitCellEmpty { occupant, position });
                }
                Some(Some(holder)) if holder != occupant => {
                    violations.push(CoherenceViolation::UnitCellHeldByOther {
                        occupant,
                        position,
                        holder,
                    });
                }
                Some(Some(_)) => {}
            }
        }

        for (&occupant, footprint) in &self.building_cells {
            for &position in footprint {
                match self.cell(position).map(|cell| cell.occupant()) {
                    None => violations.push(CoherenceViolation::TrackedOutOfBounds {
                        occupant,
                        position,
                    }),
                    Some(None) => violations
                        .push(CoherenceViolation::BuildingCellEmpty { occupant, position }),
                    Some(Some(holder)) if holder != occupant => {
                        violations.push(CoherenceViolation::BuildingCellHeldByOther {
                            occupant,
                            position,
                            holder,
                        });
                    }
                    Some(Some(_)) => {}
                }
            }
        }

        // Cells -> tracked
        for (position, occupant) in self.occupied_cells() {
            if let Some(&tracked) = self.unit_positions.get(&occupant) {
                if tracked != position {
                    violations.push(CoherenceViolation::UnitTrackedElsewhere {
                        position,
                        occupant,
                        tracked,
                    });
                }
            } else if let Some(footprint) = self.building_cells.get(&occupant) {
                if !footprint.contains(&position) {
                    violations
                        .push(CoherenceViolation::CellOutsideFootprint { position, occupant });
                }
            } else {
                violations.push(CoherenceViolation::UntrackedOccupant { position, occupant });
            }
        }

        violations
    }

    /// Drop tracking entries of destroyed occupants and free their cells.
    ///
    /// A cell is only released if the dead occupant still holds it.
    /// Returns the purged ids in ascending order.
    pub fn cleanup_destroyed(&mut self, liveness: &impl Liveness) -> Vec<OccupantId> {
        let dead_units: Vec<(OccupantId, GridPosition)> = self
            .unit_positions
            .iter()
            .filter(|(&id, _)| !liveness.is_alive(id))
            .map(|(&id, &pos)| (id, pos))
            .collect();

        let dead_buildings: Vec<OccupantId> = self
            .building_cells
            .keys()
            .copied()
            .filter(|&id| !liveness.is_alive(id))
            .collect();

        let mut purged = Vec::with_capacity(dead_units.len() + dead_buildings.len());

        for (occupant, position) in dead_units {
            self.unit_positions.remove(&occupant);
            let released = self.release_if_held(position, occupant);
            tracing::warn!(%occupant, position = %position, released, "Purged destroyed unit");
            purged.push(occupant);
        }

        for occupant in dead_buildings {
            if let Some(footprint) = self.building_cells.remove(&occupant) {
                let released = footprint
                    .iter()
                    .filter(|&&pos| self.release_if_held(pos, occupant))
                    .count();
                tracing::warn!(%occupant, released, "Purged destroyed building");
            }
            purged.push(occupant);
        }

        purged.sort_unstable();
        purged
    }

    /// Full cross-check of tracking against cells.
    ///
    /// Cells held by a dead occupant are released and reported as
    /// [`CoherenceViolation::OrphanedCell`]. Everything else is reported
    /// and left as found.
    pub fn verify_coherence(&mut self, liveness: &impl Liveness) -> CoherenceReport {
        let mut report = CoherenceReport::default();

        let orphaned: Vec<(GridPosition, OccupantId)> = self
            .occupied_cells()
            .filter(|&(_, id)| !liveness.is_alive(id))
            .collect();

        for (position, occupant) in orphaned {
            if let Some(cell) = self.cell_mut(position) {
                cell.release();
            }
            tracing::error!(position = %position, %occupant, "Occupied cell has no live occupant, releasing");
            report.healed.push(position);
            report
                .violations
                .push(CoherenceViolation::OrphanedCell { position, occupant });
        }

        for violation in self.structural_violations() {
            tracing::error!(%violation, "Grid coherence violation");
            report.violations.push(violation);
        }

        report
    }

    /// Cleanup and verify, but only on ticks that are a multiple of the
    /// configured interval.
    pub fn run_coherence_pass(
        &mut self,
        tick: u64,
        liveness: &impl Liveness,
    ) -> Option<CoherenceReport> {
        let interval = self.config.coherence_interval_ticks;
        if interval == 0 || tick % interval != 0 {
            return None;
        }

        let purged = self.cleanup_destroyed(liveness);
        let mut report = self.verify_coherence(liveness);
        report.tick = tick;
        report.purged = purged;

        tracing::debug!(
            tick,
            purged = report.purged.len(),
            violations = report.violations.len(),
            healed = report.healed.len(),
            "Coherence pass complete"
        );
        Some(report)
    }
}
