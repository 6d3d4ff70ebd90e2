//! Determined event counts returned by a self-correcting lookup.
//!
//! A determination carries the rounded count to apply, the raw fractional
//! value it was rounded from, the uncorrected value (target times the
//! population at risk), and the key that produced it. Once the caller has
//! acted it records the fulfilled count and hands the determination back
//! to the statistics, which consumes it.

use serde::Serialize;

use cohort_types::IntegerRange;

use crate::labeled::LabeledValueSet;
use crate::{StatsError, StatsKey};

/// A determined count of type `C` computed from raw values of type `R`.
///
/// Not `Clone`: a determination is reported back at most once.
#[derive(Debug, PartialEq, Serialize)]
pub struct DeterminedCount<C, R> {
    key: StatsKey,
    determined: C,
    raw: R,
    raw_uncorrected: R,
    fulfilled: Option<C>,
}

/// A single event count (rate tables).
pub type SingleDeterminedCount = DeterminedCount<i64, f64>;

/// Event counts per column label (proportional tables).
pub type MultipleDeterminedCount = DeterminedCount<
    LabeledValueSet<IntegerRange, i64>,
    LabeledValueSet<IntegerRange, f64>,
>;

impl<C, R> DeterminedCount<C, R> {
    /// Bind a determination to its key.
    pub const fn new(key: StatsKey, determined: C, raw: R, raw_uncorrected: R) -> Self {
        Self {
            key,
            determined,
            raw,
            raw_uncorrected,
            fulfilled: None,
        }
    }

    /// Key this count was determined for.
    pub const fn key(&self) -> &StatsKey {
        &self.key
    }

    /// Rounded count to apply.
    pub const fn determined(&self) -> &C {
        &self.determined
    }

    /// Fractional value before rounding.
    pub const fn raw(&self) -> &R {
        &self.raw
    }

    /// Target times the population at risk, ignoring prior periods.
    pub const fn raw_uncorrected(&self) -> &R {
        &self.raw_uncorrected
    }

    /// Count the caller actually achieved, once set.
    pub const fn fulfilled(&self) -> Option<&C> {
        self.fulfilled.as_ref()
    }

    /// Record what the caller actually achieved.
    pub fn set_fulfilled_count(&mut self, fulfilled: C) {
        self.fulfilled = Some(fulfilled);
    }

    /// The fulfilled count, or an error if the caller never set it.
    pub(crate) fn require_fulfilled(&self) -> Result<&C, StatsError> {
        self.fulfilled
            .as_ref()
            .ok_or(StatsError::MissingFulfilledCount {
                kind: self.key.kind(),
            })
    }
}

/// A determination from either kind of table.
///
/// Handing it to
/// [`PopulationStatistics::return_achieved_count`](crate::PopulationStatistics::return_achieved_count)
/// moves it, and it cannot be copied first:
///
/// ```compile_fail
/// fn report_twice(stats: &mut cohort_stats::PopulationStatistics, count: cohort_stats::Determined) {
///     let copy = count.clone();
///     let _ = stats.return_achieved_count(count);
///     let _ = stats.return_achieved_count(copy);
/// }
/// ```
#[derive(Debug, PartialEq, Serialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum Determined {
    /// From a rate table.
    Single(SingleDeterminedCount),
    /// From a proportional table.
    Multiple(MultipleDeterminedCount),
}

impl Determined {
    /// Key the count was determined for.
    pub const fn key(&self) -> &StatsKey {
        match self {
            Self::Single(c) => c.key(),
            Self::Multiple(c) => c.key(),
        }
    }

    /// Unwrap a single count.
    pub fn into_single(self) -> Result<SingleDeterminedCount, StatsError> {
        match self {
            Self::Single(c) => Ok(c),
            Self::Multiple(c) => Err(StatsError::CountShapeMismatch {
                kind: c.key().kind(),
            }),
        }
    }

    /// Unwrap a labeled count.
    pub fn into_multiple(self) -> Result<MultipleDeterminedCount, StatsError> {
        match self {
            Self::Multiple(c) => Ok(c),
            Self::Single(c) => Err(StatsError::CountShapeMismatch {
                kind: c.key().kind(),
            }),
        }
    }
}

impl From<SingleDeterminedCount> for Determined {
    fn from(count: SingleDeterminedCount) -> Self {
        Self::Single(count)
    }
}

impl From<MultipleDeterminedCount> for Determined {
    fn from(count: MultipleDeterminedCount) -> Self {
        Self::Multiple(count)
    }
}
