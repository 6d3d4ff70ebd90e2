//! Simulation binary for Cohort.
//!
//! This is the main entry point that wires together the statistics, the
//! seed population, the step loop, and the end-of-run outputs. It loads
//! configuration, initializes all subsystems, runs the simulation to its
//! end date (or until the population floor stops it), and writes the
//! results.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `cohort-config.yaml` (or the path given as
//!    the first argument or in `COHORT_CONFIG`)
//! 2. Initialize structured logging (tracing)
//! 3. Load the target statistics and fill them to the input width
//! 4. Spawn the seed population
//! 5. Run the simulation loop
//! 6. Write the run summary and analytics report
//! 7. Build and write the contingency tables, when enabled

mod error;
mod output;

use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate};
use tracing::info;
use tracing_subscriber::EnvFilter;

use cohort_analytics::AnalyticsReport;
use cohort_core::config::SimulationConfig;
use cohort_core::runner;
use cohort_core::spawner;
use cohort_core::tick::SimulationState;
use cohort_population::PeopleCollection;
use cohort_stats::PopulationStatistics;
use cohort_tree::ContingencyTree;

use crate::error::EngineError;
use crate::output::{RunOutput, RunSummary, StepLog};

/// Default configuration file, relative to the working directory.
const DEFAULT_CONFIG_PATH: &str = "cohort-config.yaml";

/// Application entry point.
///
/// Initializes all subsystems and runs the simulation. Returns an error
/// code on failure.
///
/// # Errors
///
/// Returns an error if any initialization step, the simulation, or writing
/// its output fails.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let config = load_config()?;

    // 2. Initialize structured logging. RUST_LOG wins over the config.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_target(true)
        .init();

    info!(
        name = config.run.name,
        run_id = config.run.run_id,
        seed = config.run.seed,
        start = %config.time.start,
        end = %config.time.end,
        time_step = %config.time.time_step,
        "cohort-engine starting"
    );

    run(&config)?;
    Ok(())
}

/// Everything after configuration and logging.
fn run(config: &SimulationConfig) -> Result<(), EngineError> {
    // 3. Load statistics.
    let mut statistics =
        PopulationStatistics::load(&config.statistics.input_dir, config.load_options())?;
    statistics.fill_to_input_width(config.time.start, config.time.end, config.time.input_width)?;
    info!(
        input_dir = %config.statistics.input_dir.display(),
        input_width = %config.time.input_width,
        "Statistics ready"
    );

    // 4. Spawn the seed population.
    let mut state = SimulationState::new(config, statistics, PeopleCollection::new())?;
    let seeded = spawner::spawn_seed_population(
        &mut state.population,
        &state.statistics,
        &config.population,
        config.time.start,
        &mut state.rng,
    )?;
    info!(seed_size = seeded.len(), "Seed population spawned");

    // 5. Run the simulation loop.
    let mut step_log = StepLog::default();
    let result = runner::run_simulation(&mut state, &mut step_log)?;
    runner::log_simulation_end(&result);

    // 6. Write the summary and analytics.
    let output = RunOutput::create(&config.run.output_dir, &config.run.run_id)?;
    output.write_json(
        "summary.json",
        &RunSummary {
            name: &config.run.name,
            run_id: &config.run.run_id,
            seed: config.run.seed,
            result: &result,
            steps: &step_log.steps,
        },
    )?;

    let report = AnalyticsReport::build(&state.population);
    report.log_summary();
    output.write_json("analytics.json", &report)?;

    // 7. Contingency tables.
    if config.tables.enabled {
        let start_year = config.time.start.year();
        let end_year = exclusive_end_year(state.clock.current());
        let tree = ContingencyTree::build(&state.population, &state.statistics, start_year, end_year)?;
        let rows = tree.rows()?;
        output.write_json("contingency.json", &rows)?;
        output.write_rows_tsv("contingency.tsv", &rows)?;
    }

    info!(dir = %output.dir().display(), complete = result.complete(), "Run finished");
    Ok(())
}

/// First year not covered by a run that stopped at `end`.
fn exclusive_end_year(end: NaiveDate) -> i32 {
    if end.ordinal() == 1 {
        end.year()
    } else {
        end.year().saturating_add(1)
    }
}

/// Load configuration from the first argument, `COHORT_CONFIG`, or
/// `cohort-config.yaml`.
///
/// Falls back to [`SimulationConfig::default`] (with environment overrides)
/// if the default file does not exist.
fn load_config() -> Result<SimulationConfig, EngineError> {
    let explicit = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("COHORT_CONFIG").ok())
        .map(PathBuf::from);

    match explicit {
        Some(path) => Ok(SimulationConfig::from_file(&path)?),
        None => {
            let config_path = Path::new(DEFAULT_CONFIG_PATH);
            if config_path.exists() {
                Ok(SimulationConfig::from_file(config_path)?)
            } else {
                let mut config = SimulationConfig::default();
                config.apply_env_overrides();
                config.validate()?;
                Ok(config)
            }
        }
    }
}
