//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the simulation produces identical
//! results given identical inputs.
//!
//! # Testing Strategy
//!
//! Sources of non-determinism this guards against:
//!
//! - **Floating-point math**: world positions and speeds use
//!   [`grid_core::math::Fixed`]; timers are integer milliseconds.
//!
//! - **HashMap iteration order**: the grid and simulation iterate
//!   `BTreeMap`s in ascending occupant order.
//!
//! - **Call order**: two units racing for one cell are resolved by the
//!   order they are updated in, which is the id order above.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;

use grid_core::simulation::Simulation;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for deterministic simulation).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the simulation was deterministic, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the simulation produced different hashes across runs.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Simulation is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a state machine multiple times and verify determinism.
///
/// # Example
///
/// ```ignore
/// use grid_test_utils::determinism::verify_determinism;
///
/// let result = verify_determinism(
///     5,   // Run 5 times
///     100, // 100 ticks each
///     || setup_crossing_scenario(),
///     |sim| { sim.tick(); },
///     |sim| sim.state_hash(),
/// );
/// result.assert_deterministic();
/// ```
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();

        for _ in 0..ticks {
            step(&mut state);
        }

        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
    }
}

/// Run a [`Simulation`] `runs` times for `ticks` ticks and compare hashes.
pub fn verify_simulation_determinism<F>(setup_fn: F, runs: usize, ticks: u64) -> DeterminismResult
where
    F: Fn() -> Simulation,
{
    verify_determinism(
        runs,
        ticks,
        &setup_fn,
        |sim| {
            sim.tick();
        },
        Simulation::state_hash,
    )
}

/// Run `num_sims` simulations on scoped threads and collect final hashes.
///
/// # Panics
///
/// Panics if a simulation thread panics.
pub fn run_parallel_simulations<F>(setup_fn: F, num_sims: usize, ticks: u64) -> DeterminismResult
where
    F: Fn() -> Simulation + Sync,
{
    let hashes: Vec<u64> = thread::scope(|s| {
        let handles: Vec<_> = (0..num_sims)
            .map(|_| {
                s.spawn(|| {
                    let mut sim = setup_fn();
                    for _ in 0..ticks {
                        sim.tick();
                    }
                    sim.state_hash()
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().expect("simulation thread panicked"))
            .collect()
    });

    DeterminismResult {
        is_deterministic: hashes.windows(2).all(|w| w[0] == w[1]),
        hashes,
        ticks,
    }
}

/// Compare two simulation runs tick-by-tick, finding first divergence.
///
/// # Returns
///
/// `None` if simulations are deterministic, `Some(tick)` if they diverge
/// at that tick.
pub fn find_first_divergence<F>(setup_fn: F, num_ticks: u64) -> Option<u64>
where
    F: Fn() -> Simulation,
{
    let mut sim1 = setup_fn();
    let mut sim2 = setup_fn();

    if sim1.state_hash() != sim2.state_hash() {
        return Some(0);
    }

    for tick in 1..=num_ticks {
        sim1.tick();
        sim2.tick();

        if sim1.state_hash() != sim2.state_hash() {
            return Some(tick);
        }
    }

    None
}

/// Verify that a save/restore mid-run does not change the outcome.
///
/// Runs `before` ticks, round-trips through bincode, then runs `after`
/// ticks on both the original and the restored copy.
pub fn verify_serialization_determinism<F>(setup_fn: F, before: u64, after: u64) -> bool
where
    F: Fn() -> Simulation,
{
    let mut sim = setup_fn();
    for _ in 0..before {
        sim.tick();
    }

    let Ok(bytes) = sim.serialize() else {
        return false;
    };
    let Ok(mut restored) = Simulation::deserialize(&bytes) else {
        return false;
    };
    if restored.state_hash() != sim.state_hash() {
        return false;
    }

    for _ in 0..after {
        sim.tick();
        restored.tick();
    }
    restored.state_hash() == sim.state_hash()
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Proptest strategies for grid and movement testing.
pub mod strategies {
    use grid_core::buildings::BuildingFootprint;
    use grid_core::position::GridPosition;
    use proptest::prelude::*;

    /// Any position inside a `width` × `height` grid.
    pub fn arb_grid_position(width: u32, height: u32) -> impl Strategy<Value = GridPosition> {
        (0..width as i32, 0..height as i32).prop_map(|(x, y)| GridPosition::new(x, y))
    }

    /// Positions in and somewhat around a `width` × `height` grid.
    pub fn arb_any_position(width: u32, height: u32) -> impl Strategy<Value = GridPosition> {
        (-3..width as i32 + 3, -3..height as i32 + 3).prop_map(|(x, y)| GridPosition::new(x, y))
    }

    /// Building footprints from 1×1 to `max` × `max`.
    pub fn arb_footprint(max: u32) -> impl Strategy<Value = BuildingFootprint> {
        (1..=max, 1..=max).prop_map(|(w, h)| BuildingFootprint::new(w, h))
    }

    /// Distinct start cells for `count` units.
    pub fn arb_distinct_positions(
        width: u32,
        height: u32,
        count: usize,
    ) -> impl Strategy<Value = Vec<GridPosition>> {
        proptest::collection::btree_set(arb_grid_position(width, height), count)
            .prop_map(|set| set.into_iter().collect())
    }

    /// A timed order: `(tick, unit index, target)`.
    pub fn arb_order(
        width: u32,
        height: u32,
        units: usize,
        max_tick: u64,
    ) -> impl Strategy<Value = (u64, usize, GridPosition)> {
        (0..max_tick, 0..units, arb_grid_position(width, height))
    }
}
