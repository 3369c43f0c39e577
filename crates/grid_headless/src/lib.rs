//! Headless scenario runner for grid testing and CI verification.
//!
//! Loads RON scenarios, drives a [`grid_core::simulation::Simulation`]
//! through them, and reports the outcome. This enables:
//!
//! - **Scenario testing**: Scripted move and production orders on a real grid
//! - **CI verification**: Determinism checks across runs and snapshots
//! - **Quick inspection**: ASCII occupancy maps in the terminal
//!
//! # Output
//!
//! - **stdout**: JSON reports and ASCII maps
//! - **stderr**: Logs (human-readable)
//!
//! # Example
//!
//! ```bash
//! # Run a scenario and print the JSON report
//! cargo run -p grid_headless -- run --scenario demos/crossing.ron
//!
//! # Verify determinism
//! cargo run -p grid_headless -- verify --scenario demos/crossing.ron --runs 8
//!
//! # Show the grid after 120 ticks
//! cargo run -p grid_headless -- render --scenario demos/crossing.ron --ticks 120
//! ```

pub mod ascii;
pub mod batch;
pub mod runner;
pub mod scenario;

pub use ascii::{render_occupancy, AsciiConfig};
pub use batch::{verify_determinism, VerifyReport};
pub use runner::{run_scenario, RunReport, RunStats, ScenarioRunner};
pub use scenario::{Order, Scenario, ScenarioError, TimedOrder};
