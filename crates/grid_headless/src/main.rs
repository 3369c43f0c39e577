//! Headless grid scenario runner.
//!
//! # Usage
//!
//! ```bash
//! # Run the built-in scenario
//! cargo run -p grid_headless -- run
//!
//! # Run a scenario file for 300 ticks and show the final grid
//! cargo run -p grid_headless -- run --scenario demos/crossing.ron --ticks 300 --ascii
//!
//! # Verify determinism
//! cargo run -p grid_headless -- verify --scenario demos/crossing.ron --runs 8
//!
//! # Render the grid at a given tick
//! cargo run -p grid_headless -- render --scenario demos/crossing.ron --ticks 60
//! ```
//!
//! Reports go to stdout, logs to stderr.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use grid_headless::{
    ascii::{render_occupancy, AsciiConfig},
    batch::verify_determinism,
    runner::ScenarioRunner,
    scenario::Scenario,
};

#[derive(Parser)]
#[command(name = "grid_headless")]
#[command(about = "Headless grid scenario runner for testing and CI")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario and print a JSON report
    Run {
        /// Scenario file to load (built-in crossing if omitted)
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Ticks to run (scenario default if omitted)
        #[arg(short, long)]
        ticks: Option<u64>,

        /// Also print the final grid to stderr
        #[arg(long)]
        ascii: bool,
    },

    /// Verify determinism by running the same scenario several times
    Verify {
        /// Scenario file to load (built-in crossing if omitted)
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Number of verification runs
        #[arg(short, long, default_value = "5")]
        runs: u32,

        /// Ticks per run (scenario default if omitted)
        #[arg(short, long)]
        ticks: Option<u64>,
    },

    /// Print the occupancy map after some ticks
    Render {
        /// Scenario file to load (built-in crossing if omitted)
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Ticks to run before rendering
        #[arg(short, long, default_value = "0")]
        ticks: u64,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging to stderr (stdout is for reports)
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(filter)
        .init();

    let result = match cli.command {
        Some(Commands::Run {
            scenario,
            ticks,
            ascii,
        }) => cmd_run(scenario, ticks, ascii),
        Some(Commands::Verify {
            scenario,
            runs,
            ticks,
        }) => cmd_verify(scenario, runs, ticks),
        Some(Commands::Render {
            scenario,
            ticks,
            no_color,
        }) => cmd_render(scenario, ticks, no_color),
        None => cmd_run(None, None, false),
    };

    match result {
        Ok(code) => code,
        Err(message) => {
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}

fn load_scenario(path: Option<PathBuf>) -> Result<Scenario, String> {
    match path {
        Some(path) => {
            tracing::info!("Loading scenario: {}", path.display());
            Scenario::load(&path).map_err(|e| format!("Failed to load scenario: {e}"))
        }
        None => Ok(Scenario::crossing()),
    }
}

/// Run a scenario and print its report
fn cmd_run(scenario: Option<PathBuf>, ticks: Option<u64>, ascii: bool) -> Result<ExitCode, String> {
    let scenario = load_scenario(scenario)?;
    let ticks = scenario.run_length(ticks);

    let mut runner =
        ScenarioRunner::new(scenario).map_err(|e| format!("Failed to set up scenario: {e}"))?;
    let report = runner.run(ticks);

    let json = report
        .to_json()
        .map_err(|e| format!("Failed to serialize report: {e}"))?;
    println!("{json}");

    if ascii {
        let config = AsciiConfig {
            use_color: false,
            ..AsciiConfig::default()
        };
        eprintln!("{}", render_occupancy(runner.simulation(), &config));
    }

    if report.stats.coherence_violations > 0 {
        eprintln!(
            "FAIL: {} coherence violations",
            report.stats.coherence_violations
        );
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

/// Verify determinism
fn cmd_verify(scenario: Option<PathBuf>, runs: u32, ticks: Option<u64>) -> Result<ExitCode, String> {
    let scenario = load_scenario(scenario)?;
    let ticks = scenario.run_length(ticks);

    let report = verify_determinism(&scenario, runs, ticks)
        .map_err(|e| format!("Failed to set up scenario: {e}"))?;

    if report.is_deterministic() {
        eprintln!(
            "PASS: All {} runs produced identical results ({:016x})",
            report.hashes.len(),
            report.hashes.first().copied().unwrap_or_default()
        );
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!("FAIL: Non-determinism detected!");
        if let Some(run) = report.first_divergent_run() {
            eprintln!("  First divergent run: {run}");
        }
        if !report.snapshot_matches {
            eprintln!("  Snapshot restore diverged");
        }
        for (run, hash) in report.hashes.iter().enumerate() {
            eprintln!("  Run {run}: {hash:016x}");
        }
        Ok(ExitCode::FAILURE)
    }
}

/// Display the ASCII occupancy map
fn cmd_render(scenario: Option<PathBuf>, ticks: u64, no_color: bool) -> Result<ExitCode, String> {
    let scenario = load_scenario(scenario)?;
    let mut runner =
        ScenarioRunner::new(scenario).map_err(|e| format!("Failed to set up scenario: {e}"))?;
    for _ in 0..ticks {
        runner.step();
    }

    let config = AsciiConfig {
        use_color: !no_color,
        ..AsciiConfig::default()
    };
    println!("{}", render_occupancy(runner.simulation(), &config));
    Ok(ExitCode::SUCCESS)
}
