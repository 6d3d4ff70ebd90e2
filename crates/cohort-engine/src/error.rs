//! Error types for the engine binary.
//!
//! [`EngineError`] is the top-level error type that wraps all possible
//! failure modes during engine startup, the run, and output.

use std::path::PathBuf;

/// Top-level error for the engine binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: cohort_core::config::ConfigError,
    },

    /// Loading or filling the statistics failed.
    #[error("statistics error: {source}")]
    Statistics {
        /// The underlying statistics error.
        #[from]
        source: cohort_stats::StatsError,
    },

    /// Seeding the population failed.
    #[error("spawner error: {source}")]
    Spawner {
        /// The underlying spawner error.
        #[from]
        source: cohort_core::spawner::SpawnError,
    },

    /// Building the simulation state failed.
    #[error("tick error: {source}")]
    Tick {
        /// The underlying tick error.
        #[from]
        source: cohort_core::tick::TickError,
    },

    /// Simulation runner failed.
    #[error("runner error: {source}")]
    Runner {
        /// The underlying runner error.
        #[from]
        source: cohort_core::runner::RunnerError,
    },

    /// Contingency tree construction failed.
    #[error("tree error: {source}")]
    Tree {
        /// The underlying tree error.
        #[from]
        source: cohort_tree::TreeError,
    },

    /// Writing an output file failed.
    #[error("failed to write {}: {source}", path.display())]
    Output {
        /// File being written.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Serializing an output document failed.
    #[error("failed to serialize {}: {source}", path.display())]
    Serialize {
        /// File being written.
        path: PathBuf,
        /// The underlying JSON error.
        source: serde_json::Error,
    },
}
