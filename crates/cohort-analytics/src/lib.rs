//! Population analytics for the Cohort simulation.
//!
//! Every analytic is a single pass over a [`Population`](cohort_population::Population)
//! and returns plain serialisable values:
//!
//! - [`marriage`] -- how many partnerships each man has had.
//! - [`children`] -- family sizes and the fertility rate by year.
//! - [`report`] -- [`AnalyticsReport`], everything above plus headline
//!   population counts, with a log summary.

pub mod children;
pub mod marriage;
pub mod report;

pub use children::{FertilityRate, children_per_partnership, fertility_by_year};
pub use marriage::partnerships_per_male;
pub use report::AnalyticsReport;

/// Lowest age (inclusive) counted as child-bearing.
pub const MIN_CHILD_BEARING_AGE: i32 = 15;

/// Age (exclusive) at which child-bearing is no longer counted.
pub const MAX_CHILD_BEARING_AGE: i32 = 50;

/// `part / whole` as a percentage, zero when `whole` is zero.
pub fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let pct = part as f64 / whole as f64 * 100.0;
    pct
}
