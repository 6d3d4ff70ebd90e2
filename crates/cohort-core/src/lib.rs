//! Clock, timestep driver, and run loop for the Cohort simulation.
//!
//! Each timestep sizes births, partnerships, separations, and deaths by
//! asking the statistics for a count, applies up to that many events to the
//! population, and reports the achieved count back so the next step can
//! correct for any shortfall.
//!
//! # Modules
//!
//! - [`clock`] -- [`SimulationClock`](clock::SimulationClock): current date
//!   and checked advancement by the configured time step.
//! - [`config`] -- Configuration loading from `cohort-config.yaml` into
//!   strongly-typed structs.
//! - [`spawner`] -- The seed population.
//! - [`tick`] -- One timestep: births, separations, deaths.
//! - [`runner`] -- The loop from start to end date with the minimum
//!   population stop.

pub mod clock;
pub mod config;
pub mod runner;
pub mod spawner;
pub mod tick;
