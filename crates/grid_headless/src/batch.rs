//! Repeated scenario runs for determinism checks.
//!
//! Runs the same scenario several times in parallel using rayon and
//! compares final state hashes. A second check serializes the simulation
//! halfway through and confirms the restored copy ends on the same hash.

use std::time::Instant;

use grid_core::simulation::Simulation;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::runner::ScenarioRunner;
use crate::scenario::{Scenario, ScenarioError};

/// Outcome of a determinism check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifyReport {
    /// Scenario name.
    pub scenario: String,
    /// Ticks per run.
    pub ticks: u64,
    /// Final state hash of every run, in run order.
    pub hashes: Vec<u64>,
    /// Whether a mid-run snapshot restored to the same final hash.
    pub snapshot_matches: bool,
    /// Wall-clock duration.
    pub duration_seconds: f64,
}

impl VerifyReport {
    /// Every run agreed and the snapshot check held.
    #[must_use]
    pub fn is_deterministic(&self) -> bool {
        self.snapshot_matches && self.hashes.windows(2).all(|pair| pair[0] == pair[1])
    }

    /// Index of the first run whose hash differs from run 0.
    #[must_use]
    pub fn first_divergent_run(&self) -> Option<usize> {
        let first = self.hashes.first()?;
        self.hashes.iter().position(|hash| hash != first)
    }
}

/// Run `scenario` `runs` times for `ticks` ticks each and compare.
///
/// # Errors
///
/// Setup errors from [`ScenarioRunner::new`].
pub fn verify_determinism(
    scenario: &Scenario,
    runs: u32,
    ticks: u64,
) -> Result<VerifyReport, ScenarioError> {
    let start = Instant::now();
    info!(scenario = %scenario.name, runs, ticks, "Verifying determinism");

    let hashes = (0..runs.max(1))
        .into_par_iter()
        .map(|run| {
            let mut runner = ScenarioRunner::new(scenario.clone())?;
            let hash = runner.run(ticks).state_hash;
            debug!(run, hash = format_args!("{hash:016x}"), "Run finished");
            Ok(hash)
        })
        .collect::<Result<Vec<u64>, ScenarioError>>()?;

    let snapshot_matches = verify_snapshot(scenario, ticks)?;

    let report = VerifyReport {
        scenario: scenario.name.clone(),
        ticks,
        hashes,
        snapshot_matches,
        duration_seconds: start.elapsed().as_secs_f64(),
    };

    if let Some(run) = report.first_divergent_run() {
        warn!(run, "Non-determinism detected");
    }
    Ok(report)
}

/// Serialize at the halfway point and compare the two continuations.
///
/// Orders issued after the snapshot are not replayed on the restored copy,
/// so both sides run with orders switched off after the split.
fn verify_snapshot(scenario: &Scenario, ticks: u64) -> Result<bool, ScenarioError> {
    let mut runner = ScenarioRunner::new(scenario.clone())?;
    for _ in 0..ticks / 2 {
        runner.step();
    }

    let mut original = runner.simulation().clone();
    let mut restored = match original
        .serialize()
        .and_then(|bytes| Simulation::deserialize(&bytes))
    {
        Ok(sim) => sim,
        Err(error) => {
            warn!(%error, "Snapshot round-trip failed");
            return Ok(false);
        }
    };

    for _ in ticks / 2..ticks {
        original.tick();
        restored.tick();
    }
    Ok(original.state_hash() == restored.state_hash())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crossing_is_deterministic() {
        let report = verify_determinism(&Scenario::crossing(), 4, 200).unwrap();
        assert_eq!(report.hashes.len(), 4);
        assert!(report.snapshot_matches);
        assert!(report.is_deterministic());
        assert_eq!(report.first_divergent_run(), None);
    }

    #[test]
    fn test_divergence_detection() {
        let report = VerifyReport {
            scenario: "x".to_string(),
            ticks: 1,
            hashes: vec![7, 7, 8],
            snapshot_matches: true,
            duration_seconds: 0.0,
        };
        assert!(!report.is_deterministic());
        assert_eq!(report.first_divergent_run(), Some(2));
    }

    #[test]
    fn test_zero_runs_still_runs_once() {
        let report = verify_determinism(&Scenario::crossing(), 0, 10).unwrap();
        assert_eq!(report.hashes.len(), 1);
    }
}
