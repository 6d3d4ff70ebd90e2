//! Self-correcting distribution over a single labeled axis of rates.
//!
//! Each bucket keeps two accumulators: events achieved so far and the
//! population at risk those events were drawn from. A corrected count is
//! the number of events the cumulative exposure should have produced,
//! minus what was already achieved:
//!
//! ```text
//! raw = rate * (exposure + n) - achieved
//! ```

use std::collections::BTreeMap;

use tracing::trace;

use cohort_types::IntegerRange;

use crate::determined::SingleDeterminedCount;
use crate::labeled::to_count;
use crate::table::TableMetadata;
use crate::{StatsError, StatsKey};

/// Running state of one bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct BucketState {
    pub(crate) achieved: f64,
    pub(crate) exposure: f64,
}

impl BucketState {
    /// Corrected or plain raw count for `rate` and `key`.
    pub(crate) fn raw_count(self, rate: f64, key: &StatsKey) -> f64 {
        let n = key.for_n_people();
        if key.self_correction() {
            rate.mul_add(self.exposure + n, -self.achieved)
        } else {
            rate * n
        }
    }

    pub(crate) fn record(&mut self, fulfilled: i64, for_n: f64) {
        self.achieved = (self.achieved + crate::labeled::count_to_real(fulfilled)).floor();
        self.exposure += for_n;
    }
}

/// Round a clamped raw count to the integer count to apply.
pub(crate) fn round_single(raw: f64) -> i64 {
    to_count(raw.max(0.0).round())
}

/// Rates keyed by a single integer-range label.
#[derive(Debug, Clone)]
pub struct SelfCorrectingOneDimensionDistribution {
    metadata: TableMetadata,
    rates: BTreeMap<IntegerRange, f64>,
    state: BTreeMap<IntegerRange, BucketState>,
}

impl SelfCorrectingOneDimensionDistribution {
    /// Build from per-bucket target rates. Accumulators start at zero.
    pub fn new(metadata: TableMetadata, rates: BTreeMap<IntegerRange, f64>) -> Self {
        let state = rates.keys().map(|r| (*r, BucketState::default())).collect();
        Self {
            metadata,
            rates,
            state,
        }
    }

    /// Header of the source table.
    pub const fn metadata(&self) -> &TableMetadata {
        &self.metadata
    }

    /// Bucket labels in natural order.
    pub fn labels(&self) -> impl Iterator<Item = &IntegerRange> {
        self.rates.keys()
    }

    /// Target rate of the bucket containing `value`.
    pub fn rate(&self, value: i32) -> Option<f64> {
        self.rates
            .iter()
            .find(|(r, _)| r.contains(value))
            .map(|(_, rate)| *rate)
    }

    /// Events achieved so far in the bucket containing `value`.
    pub fn achieved(&self, value: i32) -> Option<f64> {
        let bucket = self.resolve(value).ok()?;
        self.state.get(&bucket).map(|s| s.achieved)
    }

    /// Bucket containing `value`.
    pub fn resolve(&self, value: i32) -> Result<IntegerRange, StatsError> {
        IntegerRange::find_containing(self.rates.keys(), value).ok_or(
            StatsError::RangeNotCovered {
                value,
                year: self.metadata.year,
            },
        )
    }

    /// Number of events to apply for `key`.
    pub fn determine_count(&self, key: &StatsKey) -> Result<SingleDeterminedCount, StatsError> {
        let bucket = self.resolve(key.y_label())?;
        let rate = self.rates.get(&bucket).copied().unwrap_or(0.0);
        let state = self.state.get(&bucket).copied().unwrap_or_default();

        let raw = state.raw_count(rate, key).max(0.0);
        let uncorrected = rate * key.for_n_people();
        let determined = round_single(raw);

        trace!(
            table_year = self.metadata.year,
            bucket = %bucket,
            raw,
            determined,
            "Determined count"
        );
        Ok(SingleDeterminedCount::new(key.clone(), determined, raw, uncorrected))
    }

    /// Fold a fulfilled count back into its bucket. Counts for labels no
    /// bucket covers are ignored.
    pub fn return_achieved_count(&mut self, count: &SingleDeterminedCount) -> Result<(), StatsError> {
        let fulfilled = *count.require_fulfilled()?;
        let Ok(bucket) = self.resolve(count.key().y_label()) else {
            return Ok(());
        };
        if let Some(state) = self.state.get_mut(&bucket) {
            state.record(fulfilled, count.key().for_n_people());
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::NaiveDate;
    use cohort_types::{CompoundTimeUnit, Sex};

    use super::*;

    fn death_distribution() -> SelfCorrectingOneDimensionDistribution {
        let mut rates = BTreeMap::new();
        rates.insert(IntegerRange::new(0, 50).unwrap(), 0.1);
        rates.insert(IntegerRange::open(51), 0.3);
        SelfCorrectingOneDimensionDistribution::new(TableMetadata::for_year(1855), rates)
    }

    fn key(age: i32, n: f64) -> StatsKey {
        StatsKey::death(
            age,
            Sex::Male,
            n,
            CompoundTimeUnit::years(1),
            NaiveDate::from_ymd_opt(1855, 1, 1).unwrap(),
        )
    }

    fn report(d: &mut SelfCorrectingOneDimensionDistribution, age: i32, n: f64, fulfilled: i64) {
        let mut c = d.determine_count(&key(age, n)).unwrap();
        c.set_fulfilled_count(fulfilled);
        d.return_achieved_count(&c).unwrap();
    }

    #[test]
    fn uncorrected_counts_match_rates() {
        let d = death_distribution();
        let young = d.determine_count(&key(20, 100.0).with_self_correction(false)).unwrap();
        let old = d.determine_count(&key(70, 100.0).with_self_correction(false)).unwrap();
        assert!((young.raw() - 10.0).abs() < 1e-9);
        assert!((old.raw() - 30.0).abs() < 1e-9);
        assert_eq!(*young.determined(), 10);
        assert_eq!(*old.determined(), 30);
    }

    #[test]
    fn shortfall_is_carried_forward() {
        let mut d = death_distribution();
        report(&mut d, 20, 100.0, 8);
        assert!((d.achieved(20).unwrap() - 8.0).abs() < f64::EPSILON);

        // 0.1 * (100 + 100) - 8 = 12
        let next = d.determine_count(&key(20, 100.0)).unwrap();
        assert!((next.raw() - 12.0).abs() < 1e-9);
        assert_eq!(*next.determined(), 12);
        assert!((next.raw_uncorrected() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn excess_is_clamped_to_zero() {
        let mut d = death_distribution();
        report(&mut d, 70, 10.0, 9);
        // 0.3 * (10 + 1) - 9 is negative.
        let next = d.determine_count(&key(70, 1.0)).unwrap();
        assert_eq!(*next.determined(), 0);
        assert!(next.raw().abs() < f64::EPSILON);
    }

    #[test]
    fn correction_converges_to_rate() {
        let mut d = death_distribution();
        let mut exposure = 0.0;
        let mut events = 0;
        for _ in 0..50 {
            let mut c = d.determine_count(&key(30, 7.0)).unwrap();
            let applied = *c.determined();
            c.set_fulfilled_count(applied);
            d.return_achieved_count(&c).unwrap();
            exposure += 7.0;
            events += applied;
        }
        let achieved_rate = crate::labeled::count_to_real(events) / exposure;
        assert!((achieved_rate - 0.1).abs() < 0.01);
    }

    #[test]
    fn uncovered_label_is_an_error_here() {
        let d = death_distribution();
        assert!(matches!(
            d.determine_count(&key(-1, 10.0)),
            Err(StatsError::RangeNotCovered { value: -1, year: 1855 })
        ));
    }

    #[test]
    fn missing_fulfilled_count_is_rejected() {
        let mut d = death_distribution();
        let c = d.determine_count(&key(20, 10.0)).unwrap();
        assert!(matches!(
            d.return_achieved_count(&c),
            Err(StatsError::MissingFulfilledCount { .. })
        ));
    }
}
