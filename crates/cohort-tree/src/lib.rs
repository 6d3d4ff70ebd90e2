//! Contingency tree for the Cohort simulation.
//!
//! The tree cross-classifies two populations side by side: the simulated
//! people (`SIM` branch) and the counts the target statistics predict for
//! the same starting population (`STAT` branch). Each level of the tree is
//! one [`Dimension`]; a leaf path reads as one row of a contingency table
//! (`SIM, 1840, F, 25, NO, 1, 1, YES, 1, 2, NO, na: 14`).
//!
//! # Architecture
//!
//! - [`label`] -- [`NodeLabel`] and [`Dimension`].
//! - [`node`] -- arena storage and typed ancestor lookup.
//! - [`classify`] -- rules routing a simulated person down the tree.
//! - [`expected`] -- expected-count tasks filling the `STAT` branch.
//! - [`scheduler`] -- [`DeferredTasks`], the dependency-ordered executor.
//! - [`rows`] -- flattened leaf rows for output.
//!
//! The `STAT` branch cannot be built top-down in one pass: a node's counts
//! depend on counts computed for other dimensions of the same cohort and
//! year, and ageing a cohort depends on the whole year being settled. Work
//! is therefore queued as tasks and run once every task kind it depends on
//! has drained.

pub mod classify;
pub mod expected;
pub mod label;
pub mod node;
pub mod rows;
pub mod scheduler;

mod build;

pub use label::{Dimension, NodeLabel, SeparationOption, SourceType};
pub use node::{ContingencyTree, Node, NodeId, PriorChildren};
pub use rows::ContingencyRow;
pub use scheduler::{DeferredTasks, TaskKind};

use cohort_types::PersonId;
use cohort_stats::StatsError;

/// Nodes whose expected count falls below this are not created.
pub const NODE_MIN_COUNT: f64 = 0.01;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors raised while building the contingency tree.
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    /// A node has no ancestor (or self) on the requested dimension.
    #[error("node {node} has no ancestor on dimension {dimension:?}")]
    MissingAncestor {
        /// The node searched from.
        node: NodeId,
        /// The dimension looked for.
        dimension: Dimension,
    },

    /// A value fell outside every label the statistics define for it.
    #[error("value {value} cannot be classified on dimension {dimension:?}")]
    Unclassifiable {
        /// Dimension being classified.
        dimension: Dimension,
        /// Value with no matching label.
        value: i32,
    },

    /// A node id not present in the arena.
    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    /// A partner or child referenced by the population is missing.
    #[error("person {0} referenced but not present in the population")]
    MissingPerson(PersonId),

    /// The year range to tabulate is empty.
    #[error("invalid tree period: start year {start} must precede end year {end}")]
    InvalidPeriod {
        /// First simulated year.
        start: i32,
        /// Year the simulation ended.
        end: i32,
    },

    /// A year whose first day does not exist in the calendar.
    #[error("year {0} out of calendar range")]
    YearOutOfRange(i32),

    /// A statistics lookup failed.
    #[error(transparent)]
    Statistics(#[from] StatsError),
}
