//! Simulation clock for the Cohort simulation.
//!
//! The clock holds the current date and moves it forward by the configured
//! time step. Every timestep covers the half-open interval
//! `[current, current + step)`.
//!
//! # Design Principles
//!
//! - Date arithmetic is checked; stepping past the representable range is
//!   an error, not a wrap.
//! - The step counter and the date always move together.

use chrono::{Datelike, NaiveDate};

use cohort_types::CompoundTimeUnit;
use cohort_types::time;

use crate::config::TimeConfig;

/// Errors that can occur during clock operations.
#[derive(Debug, thiserror::Error)]
pub enum ClockError {
    /// Advancing would leave the representable date range.
    #[error("date overflow: cannot advance {date} by {step}")]
    DateOverflow {
        /// Date the clock was at.
        date: NaiveDate,
        /// The step that overflowed.
        step: CompoundTimeUnit,
    },

    /// Step counter would overflow.
    #[error("step counter overflow")]
    StepOverflow,

    /// Invalid time configuration (e.g. a zero time step).
    #[error("invalid time configuration: {reason}")]
    InvalidConfig {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

/// Current date of a run and how far it moves per step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationClock {
    /// First simulated date.
    start: NaiveDate,

    /// Date the run ends at (exclusive).
    end: NaiveDate,

    /// Length of one timestep.
    step: CompoundTimeUnit,

    /// Start of the current timestep.
    current: NaiveDate,

    /// Steps completed so far.
    steps: u64,
}

impl SimulationClock {
    /// Create a clock positioned at the configured start date.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidConfig`] if the period is empty or the
    /// step does not move forward.
    pub fn new(config: &TimeConfig) -> Result<Self, ClockError> {
        Self::from_parts(config.start, config.end, config.time_step, config.start, 0)
    }

    /// Create a clock from explicit parameters (useful for testing and
    /// state restoration).
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidConfig`] if `end` is not after `start`,
    /// `step` is not positive, or `current` lies before `start`.
    pub fn from_parts(
        start: NaiveDate,
        end: NaiveDate,
        step: CompoundTimeUnit,
        current: NaiveDate,
        steps: u64,
    ) -> Result<Self, ClockError> {
        if end <= start {
            return Err(ClockError::InvalidConfig {
                reason: format!("end {end} must be after start {start}"),
            });
        }
        if !step.is_positive() {
            return Err(ClockError::InvalidConfig {
                reason: format!("time step must be positive, got {step}"),
            });
        }
        if current < start {
            return Err(ClockError::InvalidConfig {
                reason: format!("current date {current} precedes start {start}"),
            });
        }
        Ok(Self {
            start,
            end,
            step,
            current,
            steps,
        })
    }

    /// Move to the next timestep. Returns the new current date.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::DateOverflow`] or [`ClockError::StepOverflow`]
    /// if either counter would leave its range.
    pub fn advance(&mut self) -> Result<NaiveDate, ClockError> {
        let next = self.step_end()?;
        self.steps = self.steps.checked_add(1).ok_or(ClockError::StepOverflow)?;
        self.current = next;
        Ok(next)
    }

    /// First day after the current timestep.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::DateOverflow`] if that date is unrepresentable.
    pub fn step_end(&self) -> Result<NaiveDate, ClockError> {
        time::advance(self.current, self.step).ok_or(ClockError::DateOverflow {
            date: self.current,
            step: self.step,
        })
    }

    /// Start of the current timestep.
    pub const fn current(&self) -> NaiveDate {
        self.current
    }

    /// First simulated date.
    pub const fn start(&self) -> NaiveDate {
        self.start
    }

    /// Date the run ends at.
    pub const fn end(&self) -> NaiveDate {
        self.end
    }

    /// Length of one timestep.
    pub const fn step(&self) -> CompoundTimeUnit {
        self.step
    }

    /// Steps completed so far.
    pub const fn steps(&self) -> u64 {
        self.steps
    }

    /// Calendar year of the current date.
    pub fn year(&self) -> i32 {
        self.current.year()
    }

    /// Whether the end date has been reached.
    pub fn is_finished(&self) -> bool {
        self.current >= self.end
    }
}
