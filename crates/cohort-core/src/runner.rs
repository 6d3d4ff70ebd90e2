//! Simulation loop runner.
//!
//! This module provides [`run_simulation`], which drives the step loop from
//! the start date to the end date. A run ends early, marked incomplete,
//! when the living population falls below the configured minimum.
//!
//! The runner wraps the single-step [`run_tick`] function and adds the
//! stopping rules around it.
//!
//! [`run_tick`]: crate::tick::run_tick

use serde::Serialize;
use tracing::{info, warn};

use crate::tick::{self, SimulationState, TickError, TickSummary};

/// Errors that can occur during the simulation run.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// A step execution failed.
    #[error("tick error: {source}")]
    Tick {
        /// The underlying tick error.
        #[from]
        source: TickError,
    },
}

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum EndReason {
    /// The clock reached the end date.
    Completed,
    /// The living population fell below the minimum.
    BelowMinimumPopulation {
        /// Living population when the run stopped.
        living: u64,
        /// Configured minimum.
        minimum: u64,
    },
}

/// Result of the simulation run.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationResult {
    /// The reason the simulation ended.
    pub end_reason: EndReason,
    /// The last step summary, if any step completed.
    pub final_summary: Option<TickSummary>,
    /// Total number of steps executed.
    pub total_steps: u64,
    /// Largest living population seen during the run.
    pub peak_population: u64,
}

impl SimulationResult {
    /// Whether the run reached its end date.
    pub const fn complete(&self) -> bool {
        matches!(self.end_reason, EndReason::Completed)
    }
}

/// Callback invoked after each step completes.
///
/// Implementations can use this to record per-step summaries. The callback
/// receives the step summary and the current simulation state.
pub trait TickCallback {
    /// Called after a step completes successfully.
    fn on_tick(&mut self, summary: &TickSummary, state: &SimulationState);
}

/// A no-op step callback.
pub struct NoOpCallback;

impl TickCallback for NoOpCallback {
    fn on_tick(&mut self, _summary: &TickSummary, _state: &SimulationState) {}
}

/// Run the simulation loop until the end date or the population floor.
///
/// # Errors
///
/// Returns [`RunnerError`] if a step fails unrecoverably.
pub fn run_simulation(
    state: &mut SimulationState,
    callback: &mut dyn TickCallback,
) -> Result<SimulationResult, RunnerError> {
    let min_population = state.config.min_population;
    let mut last_summary: Option<TickSummary> = None;
    let mut total_steps: u64 = 0;

    info!(
        start = %state.clock.current(),
        end = %state.clock.end(),
        step = %state.clock.step(),
        living = state.population.counts().living_population(),
        min_population,
        "Simulation starting"
    );

    loop {
        // --- Check population floor (before step) ---
        let living = state.population.counts().living_population();
        if living < min_population {
            info!(living, min_population, "Population below minimum");
            return Ok(SimulationResult {
                end_reason: EndReason::BelowMinimumPopulation {
                    living,
                    minimum: min_population,
                },
                final_summary: last_summary,
                total_steps,
                peak_population: state.population.counts().peak_population(),
            });
        }

        // --- Check end date ---
        if state.clock.is_finished() {
            return Ok(SimulationResult {
                end_reason: EndReason::Completed,
                final_summary: last_summary,
                total_steps,
                peak_population: state.population.counts().peak_population(),
            });
        }

        // --- Execute step ---
        let summary = tick::run_tick(state)?;
        total_steps = total_steps.saturating_add(1);

        // --- Notify callback ---
        callback.on_tick(&summary, state);

        last_summary = Some(summary);
    }
}

/// Log the simulation end sequence.
pub fn log_simulation_end(result: &SimulationResult) {
    info!(
        reason = ?result.end_reason,
        complete = result.complete(),
        total_steps = result.total_steps,
        peak_population = result.peak_population,
        final_living = result.final_summary.as_ref().map(|s| s.living),
        "Simulation ended"
    );

    if let Some(ref summary) = result.final_summary {
        info!(
            step = summary.step,
            date = %summary.date,
            living = summary.living,
            "Final step summary"
        );
    } else {
        warn!("Simulation ended with no steps executed");
    }
}
