//! Shared type definitions for the Cohort demographic simulation.
//!
//! This crate is the single source of truth for the small value types used
//! across the workspace: identifiers, sex, integer label ranges used as
//! statistical row and column keys, and compound time units with the date
//! arithmetic built on them.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe sequential identifiers for people and partnerships
//! - [`enums`] -- Enumeration types (sex)
//! - [`range`] -- Integer ranges (`5`, `0-14`, `85+`) used as table labels
//! - [`time`] -- Compound time units and year-granular date helpers
//! - [`error`] -- Parse errors for the textual forms above

pub mod enums;
pub mod error;
pub mod ids;
pub mod range;
pub mod time;

pub use enums::Sex;
pub use error::ParseError;
pub use ids::{PartnershipId, PersonId};
pub use range::IntegerRange;
pub use time::{CompoundTimeUnit, TimeUnit};
