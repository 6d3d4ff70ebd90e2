//! Configuration loading and typed config structures for the Cohort
//! simulation.
//!
//! The canonical configuration lives in `cohort-config.yaml` at the project
//! root. This module defines strongly-typed structs that mirror the YAML
//! structure, and provides a loader that reads and validates the file.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Deserialize;

use cohort_stats::{DemographicConstants, LoadOptions};
use cohort_types::CompoundTimeUnit;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The values parsed but do not describe a runnable simulation.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// What is wrong.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level simulation configuration.
///
/// Mirrors the structure of `cohort-config.yaml`. Every field has a
/// default, so a partial file (or an empty one) is enough to run.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SimulationConfig {
    /// Run identity, seed, and output location.
    #[serde(default)]
    pub run: RunConfig,

    /// Simulated period and step sizes.
    #[serde(default)]
    pub time: TimeConfig,

    /// Seed population and demographic limits.
    #[serde(default)]
    pub population: PopulationConfig,

    /// Where the target statistics are read from.
    #[serde(default)]
    pub statistics: StatisticsConfig,

    /// Contingency table output.
    #[serde(default)]
    pub tables: TablesConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SimulationConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values for directories:
    /// - `COHORT_INPUT_DIR` overrides `statistics.input_dir`
    /// - `COHORT_OUTPUT_DIR` overrides `run.output_dir`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if validation fails.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if validation fails.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Override directories with environment variables when set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("COHORT_INPUT_DIR") {
            self.statistics.input_dir = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("COHORT_OUTPUT_DIR") {
            self.run.output_dir = PathBuf::from(val);
        }
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: String| Err(ConfigError::Invalid { reason });

        if self.time.end <= self.time.start {
            return invalid(format!(
                "time.end ({}) must be after time.start ({})",
                self.time.end, self.time.start
            ));
        }
        if !self.time.time_step.is_positive() {
            return invalid(format!("time.time_step must be positive, got {}", self.time.time_step));
        }
        if !self.time.input_width.is_positive() {
            return invalid(format!(
                "time.input_width must be positive, got {}",
                self.time.input_width
            ));
        }
        if self.population.max_seed_age < 0 {
            return invalid("population.max_seed_age must not be negative".to_owned());
        }
        if self.population.min_child_bearing_age >= self.population.max_child_bearing_age {
            return invalid(format!(
                "population.min_child_bearing_age ({}) must be below max_child_bearing_age ({})",
                self.population.min_child_bearing_age, self.population.max_child_bearing_age
            ));
        }
        if self.population.min_birth_spacing_days < 0 {
            return invalid("population.min_birth_spacing_days must not be negative".to_owned());
        }
        let infidelity = self.population.max_infidelity_proportion;
        if !(0.0..=1.0).contains(&infidelity) {
            return invalid(format!(
                "population.max_infidelity_proportion must be between 0 and 1, got {infidelity}"
            ));
        }
        let tolerance = self.statistics.consistency_tolerance;
        if !tolerance.is_finite() || tolerance < 0.0 {
            return invalid(format!(
                "statistics.consistency_tolerance must be a non-negative number, got {tolerance}"
            ));
        }
        Ok(())
    }

    /// Options for loading the statistics tables.
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            consistency_tolerance: self.statistics.consistency_tolerance,
            constants: DemographicConstants {
                min_birth_spacing_days: self.population.min_birth_spacing_days,
                max_infidelity_proportion: self.population.max_infidelity_proportion,
                ..DemographicConstants::default()
            },
        }
    }
}

/// Run identity and output location.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RunConfig {
    /// Human-readable run name.
    #[serde(default = "default_run_name")]
    pub name: String,

    /// Unique run identifier; output is written under this name.
    #[serde(default = "default_run_id")]
    pub run_id: String,

    /// Random seed for reproducibility.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Directory run output is written below.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            name: default_run_name(),
            run_id: default_run_id(),
            seed: default_seed(),
            output_dir: default_output_dir(),
        }
    }
}

/// Simulated period and step sizes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TimeConfig {
    /// First simulated date.
    #[serde(default = "default_start")]
    pub start: NaiveDate,

    /// Date the simulation stops at.
    #[serde(default = "default_end")]
    pub end: NaiveDate,

    /// Length of one timestep, e.g. `1y` or `6m`.
    #[serde(default = "default_time_step")]
    pub time_step: CompoundTimeUnit,

    /// Spacing tables are filled to between tabulated years.
    #[serde(default = "default_input_width")]
    pub input_width: CompoundTimeUnit,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            start: default_start(),
            end: default_end(),
            time_step: default_time_step(),
            input_width: default_input_width(),
        }
    }
}

/// Seed population and demographic limits.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PopulationConfig {
    /// People created at the start date.
    #[serde(default = "default_seed_size")]
    pub seed_size: u32,

    /// Oldest age given to a seed person.
    #[serde(default = "default_max_seed_age")]
    pub max_seed_age: i32,

    /// The run stops, incomplete, when the living population falls below
    /// this.
    #[serde(default = "default_min_population")]
    pub min_population: u64,

    /// Youngest age at which a woman can give birth.
    #[serde(default = "default_min_child_bearing_age")]
    pub min_child_bearing_age: i32,

    /// Age from which a woman no longer gives birth.
    #[serde(default = "default_max_child_bearing_age")]
    pub max_child_bearing_age: i32,

    /// Minimum days between two births to the same mother.
    #[serde(default = "default_min_birth_spacing_days")]
    pub min_birth_spacing_days: i64,

    /// Largest share of births to partnered mothers fathered by another
    /// man, between 0 and 1.
    #[serde(default = "default_max_infidelity_proportion")]
    pub max_infidelity_proportion: f64,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            seed_size: default_seed_size(),
            max_seed_age: default_max_seed_age(),
            min_population: default_min_population(),
            min_child_bearing_age: default_min_child_bearing_age(),
            max_child_bearing_age: default_max_child_bearing_age(),
            min_birth_spacing_days: default_min_birth_spacing_days(),
            max_infidelity_proportion: default_max_infidelity_proportion(),
        }
    }
}

/// Location and loading of the target statistics.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StatisticsConfig {
    /// Directory holding one subdirectory per table.
    #[serde(default = "default_input_dir")]
    pub input_dir: PathBuf,

    /// Allowed deviation of a proportional row sum from one.
    #[serde(default = "default_consistency_tolerance")]
    pub consistency_tolerance: f64,
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self {
            input_dir: default_input_dir(),
            consistency_tolerance: default_consistency_tolerance(),
        }
    }
}

/// Contingency table output.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TablesConfig {
    /// Whether to build and write the contingency tree at the end of a run.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for TablesConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

fn default_run_name() -> String {
    "Cohort Run".to_owned()
}

fn default_run_id() -> String {
    uuid::Uuid::now_v7().to_string()
}

const fn default_seed() -> u64 {
    42
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(1855, 1, 1).unwrap_or_default()
}

fn default_end() -> NaiveDate {
    NaiveDate::from_ymd_opt(1875, 1, 1).unwrap_or_default()
}

const fn default_time_step() -> CompoundTimeUnit {
    CompoundTimeUnit::years(1)
}

const fn default_input_width() -> CompoundTimeUnit {
    CompoundTimeUnit::years(5)
}

const fn default_seed_size() -> u32 {
    1000
}

const fn default_max_seed_age() -> i32 {
    80
}

const fn default_min_population() -> u64 {
    100
}

const fn default_min_child_bearing_age() -> i32 {
    15
}

const fn default_max_child_bearing_age() -> i32 {
    50
}

const fn default_min_birth_spacing_days() -> i64 {
    147
}

const fn default_max_infidelity_proportion() -> f64 {
    0.2
}

fn default_input_dir() -> PathBuf {
    PathBuf::from("data/statistics")
}

const fn default_consistency_tolerance() -> f64 {
    1e-6
}

const fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_owned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = SimulationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.run.seed, 42);
        assert_eq!(config.time.time_step, CompoundTimeUnit::years(1));
        assert_eq!(config.population.min_population, 100);
        assert_eq!(config.population.min_birth_spacing_days, 147);
        assert!(config.tables.enabled);
    }

    #[test]
    fn run_ids_are_unique() {
        assert_ne!(RunConfig::default().run_id, RunConfig::default().run_id);
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
run:
  name: "Test Run"
  run_id: "fixed"
  seed: 123
  output_dir: "target/out"

time:
  start: 1860-01-01
  end: 1870-01-01
  time_step: 6m
  input_width: 1y

population:
  seed_size: 50
  max_seed_age: 60
  min_population: 10
  min_child_bearing_age: 16
  max_child_bearing_age: 45
  min_birth_spacing_days: 200
  max_infidelity_proportion: 0.05

statistics:
  consistency_tolerance: 0.001

tables:
  enabled: false

logging:
  level: "debug"
"#;

        let config = SimulationConfig::parse(yaml).unwrap();
        assert_eq!(config.run.name, "Test Run");
        assert_eq!(config.run.run_id, "fixed");
        assert_eq!(config.run.seed, 123);
        assert_eq!(config.time.start, NaiveDate::from_ymd_opt(1860, 1, 1).unwrap());
        assert_eq!(config.time.time_step, CompoundTimeUnit::months(6));
        assert_eq!(config.time.input_width, CompoundTimeUnit::years(1));
        assert_eq!(config.population.seed_size, 50);
        assert_eq!(config.population.max_child_bearing_age, 45);
        assert!(!config.tables.enabled);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.load_options().constants.min_birth_spacing_days, 200);
        assert!((config.load_options().constants.max_infidelity_proportion - 0.05).abs() < 1e-12);
    }

    #[test]
    fn parse_minimal_yaml() {
        let config = SimulationConfig::parse("run:\n  seed: 7\n").unwrap();

        // Seed is overridden
        assert_eq!(config.run.seed, 7);
        // Everything else uses defaults
        assert_eq!(config.population.seed_size, 1000);
        assert_eq!(config.time.input_width, CompoundTimeUnit::years(5));
    }

    #[test]
    fn rejects_reversed_period() {
        let yaml = "time:\n  start: 1900-01-01\n  end: 1850-01-01\n";
        let err = SimulationConfig::parse(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn rejects_zero_time_step() {
        let yaml = "time:\n  time_step: 0y\n";
        assert!(matches!(
            SimulationConfig::parse(yaml),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn rejects_malformed_time_unit() {
        let yaml = "time:\n  time_step: fortnight\n";
        assert!(matches!(
            SimulationConfig::parse(yaml),
            Err(ConfigError::Yaml { .. })
        ));
    }

    #[test]
    fn rejects_inverted_child_bearing_ages() {
        let mut config = SimulationConfig::default();
        config.population.min_child_bearing_age = 50;
        config.population.max_child_bearing_age = 15;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_infidelity_share_outside_unit_interval() {
        let mut config = SimulationConfig::default();
        config.population.max_infidelity_proportion = 1.5;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
        config.population.max_infidelity_proportion = f64::NAN;
        assert!(config.validate().is_err());
        config.population.max_infidelity_proportion = 0.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn load_project_config_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("cohort-config.yaml");
        if path.exists() {
            let config = SimulationConfig::from_file(&path);
            assert!(config.is_ok(), "Failed to load project config: {config:?}");
        }
    }
}
