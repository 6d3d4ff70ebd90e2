//! Target distributions and self-correcting event counts for the Cohort
//! simulation.
//!
//! Every demographic event the simulation applies (deaths, births,
//! maternity sizes, separations, partner choices) is sized by asking this
//! crate how many events a group of people should experience, then telling
//! it how many actually happened. The gap between the two feeds into the
//! next determination, so the simulated population tracks the target
//! tables over time rather than drifting with rounding and chance.
//!
//! # Architecture
//!
//! - [`labeled`] -- [`LabeledValueSet`]: label-keyed arithmetic and
//!   controlled rounding that preserves the rounded total.
//! - [`key`] -- [`StatsKey`]: immutable query descriptors.
//! - [`determined`] -- [`DeterminedCount`]: the answer to a query, handed
//!   back with the fulfilled count.
//! - [`one_dimension`], [`two_dimension`], [`proportional`] -- the three
//!   self-correcting distribution shapes.
//! - [`table`] -- [`DistributionTable`]: year-indexed distributions with
//!   nearest-year lookup and gap filling.
//! - [`input`] -- tab-separated input files.
//! - [`statistics`] -- [`PopulationStatistics`]: the facade dispatching
//!   keys to tables.
//!
//! # Determine, apply, report
//!
//! ```text
//! let count = stats.determine_count(&key)?;   // read-only
//! // ... apply up to count.determined() events ...
//! count.set_fulfilled_count(achieved);
//! stats.return_achieved_count(count)?;        // consumes the count
//! ```

pub mod determined;
pub mod input;
pub mod key;
pub mod labeled;
pub mod one_dimension;
pub mod proportional;
pub mod statistics;
pub mod table;
pub mod two_dimension;

pub use determined::{Determined, DeterminedCount, MultipleDeterminedCount, SingleDeterminedCount};
pub use key::{StatsKey, StatsKind};
pub use labeled::LabeledValueSet;
pub use one_dimension::SelfCorrectingOneDimensionDistribution;
pub use proportional::SelfCorrectingProportionalDistribution;
pub use statistics::{DemographicConstants, LoadOptions, PopulationStatistics, StatisticsTables};
pub use table::{DistributionTable, TableMetadata};
pub use two_dimension::SelfCorrectingTwoDimensionDistribution;

use std::path::PathBuf;

use cohort_types::CompoundTimeUnit;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors raised while loading or querying statistics.
#[derive(Debug, thiserror::Error)]
pub enum StatsError {
    /// Two labeled value sets do not carry the same labels.
    #[error("label sets differ at label {label}")]
    LabelMismatch {
        /// First label found in one set but not the other.
        label: String,
    },

    /// No bucket of the distribution covers the queried label.
    #[error("value {value} not covered by any bucket of the {year} distribution")]
    RangeNotCovered {
        /// The queried label value.
        value: i32,
        /// Year of the distribution queried.
        year: i32,
    },

    /// A two-dimensional lookup was made with a key lacking a column.
    #[error("{kind} key has no column label")]
    MissingColumnLabel {
        /// Kind of the offending key.
        kind: StatsKind,
    },

    /// The table has no years at all.
    #[error("no data available in table {table}")]
    NoDataAvailable {
        /// Table name.
        table: &'static str,
    },

    /// Two input files describe the same year of one table.
    #[error("table {table} has more than one file for year {year}")]
    DuplicateYear {
        /// Table name.
        table: &'static str,
        /// Repeated year.
        year: i32,
    },

    /// Gap filling was asked to step by a non-positive width.
    #[error("input width {width} must be positive")]
    InvalidInputWidth {
        /// The rejected width.
        width: CompoundTimeUnit,
    },

    /// A proportional row does not sum to one.
    #[error("proportions for row {row} of year {year} sum to {sum}, not 1")]
    InconsistentWeights {
        /// Year of the offending table.
        year: i32,
        /// Row label.
        row: String,
        /// Actual sum.
        sum: f64,
    },

    /// A required input directory holds no files.
    #[error("no input files in {}", dir.display())]
    EmptyInput {
        /// The empty (or missing) directory.
        dir: PathBuf,
    },

    /// A single-file input directory holds several files.
    #[error("expected one input file in {}, found {count}", dir.display())]
    AmbiguousInput {
        /// The directory.
        dir: PathBuf,
        /// Number of files found.
        count: usize,
    },

    /// An input file is malformed.
    #[error("{}:{line}: {reason}", path.display())]
    InvalidInput {
        /// File path.
        path: PathBuf,
        /// 1-based line number, 0 for whole-file problems.
        line: usize,
        /// What is wrong.
        reason: String,
    },

    /// Reading an input file or directory failed.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// Path being read.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// A determination was returned without a fulfilled count.
    #[error("{kind} determination returned without a fulfilled count")]
    MissingFulfilledCount {
        /// Kind of the determination.
        kind: StatsKind,
    },

    /// A single count was used where a labeled one was expected, or the
    /// reverse.
    #[error("count shape does not match {kind} table")]
    CountShapeMismatch {
        /// Kind of the key.
        kind: StatsKind,
    },
}
