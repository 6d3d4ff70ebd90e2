//! Self-correcting distribution over a matrix of rates.
//!
//! Rows are keyed by the key's `y_label` (mother's age for ordered births)
//! and columns by its `x_label` (birth order). Every cell corrects
//! independently, exactly like a one-dimensional bucket.

use std::collections::BTreeMap;

use tracing::trace;

use cohort_types::IntegerRange;

use crate::determined::SingleDeterminedCount;
use crate::labeled::LabeledValueSet;
use crate::one_dimension::{BucketState, round_single};
use crate::table::TableMetadata;
use crate::{StatsError, StatsKey};

/// Rates keyed by row and column integer ranges.
#[derive(Debug, Clone)]
pub struct SelfCorrectingTwoDimensionDistribution {
    metadata: TableMetadata,
    rows: BTreeMap<IntegerRange, LabeledValueSet<IntegerRange, f64>>,
    state: BTreeMap<(IntegerRange, IntegerRange), BucketState>,
}

impl SelfCorrectingTwoDimensionDistribution {
    /// Build from rows of per-column target rates.
    pub fn new(
        metadata: TableMetadata,
        rows: BTreeMap<IntegerRange, LabeledValueSet<IntegerRange, f64>>,
    ) -> Self {
        let state = rows
            .iter()
            .flat_map(|(row, cols)| cols.labels().map(|col| ((*row, *col), BucketState::default())))
            .collect();
        Self {
            metadata,
            rows,
            state,
        }
    }

    /// Header of the source table.
    pub const fn metadata(&self) -> &TableMetadata {
        &self.metadata
    }

    /// Row labels in natural order.
    pub fn row_labels(&self) -> impl Iterator<Item = &IntegerRange> {
        self.rows.keys()
    }

    /// Column labels of the first row, in natural order.
    pub fn column_labels(&self) -> Vec<IntegerRange> {
        self.rows
            .values()
            .next()
            .map(|cols| cols.labels().copied().collect())
            .unwrap_or_default()
    }

    /// Events achieved so far in the cell containing (`row`, `column`).
    pub fn achieved(&self, row: i32, column: i32) -> Option<f64> {
        let (r, c) = self.resolve(row, column).ok()?;
        self.state.get(&(r, c)).map(|s| s.achieved)
    }

    fn resolve(&self, row: i32, column: i32) -> Result<(IntegerRange, IntegerRange), StatsError> {
        let not_covered = |value| StatsError::RangeNotCovered {
            value,
            year: self.metadata.year,
        };
        let r = IntegerRange::find_containing(self.rows.keys(), row).ok_or_else(|| not_covered(row))?;
        let cols = self.rows.get(&r).ok_or_else(|| not_covered(row))?;
        let c = IntegerRange::find_containing(cols.labels(), column)
            .ok_or_else(|| not_covered(column))?;
        Ok((r, c))
    }

    /// Number of events to apply for `key`. The key must carry a column.
    pub fn determine_count(&self, key: &StatsKey) -> Result<SingleDeterminedCount, StatsError> {
        let column = key.x_label().ok_or(StatsError::MissingColumnLabel { kind: key.kind() })?;
        let (row, col) = self.resolve(key.y_label(), column)?;
        let rate = self
            .rows
            .get(&row)
            .and_then(|cols| cols.get(&col))
            .unwrap_or(0.0);
        let state = self.state.get(&(row, col)).copied().unwrap_or_default();

        let raw = state.raw_count(rate, key).max(0.0);
        let determined = round_single(raw);

        trace!(
            table_year = self.metadata.year,
            row = %row,
            column = %col,
            raw,
            determined,
            "Determined count"
        );
        Ok(SingleDeterminedCount::new(
            key.clone(),
            determined,
            raw,
            rate * key.for_n_people(),
        ))
    }

    /// Fold a fulfilled count back into its cell. Uncovered cells are
    /// ignored.
    pub fn return_achieved_count(&mut self, count: &SingleDeterminedCount) -> Result<(), StatsError> {
        let fulfilled = *count.require_fulfilled()?;
        let Some(column) = count.key().x_label() else {
            return Ok(());
        };
        let Ok(cell) = self.resolve(count.key().y_label(), column) else {
            return Ok(());
        };
        if let Some(state) = self.state.get_mut(&cell) {
            state.record(fulfilled, count.key().for_n_people());
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::NaiveDate;
    use cohort_types::CompoundTimeUnit;

    use super::*;

    fn births() -> SelfCorrectingTwoDimensionDistribution {
        let cols = |a: f64, b: f64| {
            LabeledValueSet::new(
                [(IntegerRange::single(0), a), (IntegerRange::open(1), b)]
                    .into_iter()
                    .collect(),
            )
        };
        let mut rows = BTreeMap::new();
        rows.insert(IntegerRange::new(15, 29).unwrap(), cols(0.2, 0.1));
        rows.insert(IntegerRange::new(30, 49).unwrap(), cols(0.05, 0.15));
        SelfCorrectingTwoDimensionDistribution::new(TableMetadata::for_year(1880), rows)
    }

    fn key(age: i32, order: i32, n: f64) -> StatsKey {
        StatsKey::ordered_birth(
            age,
            order,
            n,
            CompoundTimeUnit::years(1),
            NaiveDate::from_ymd_opt(1880, 1, 1).unwrap(),
        )
    }

    #[test]
    fn cell_rates_apply() {
        let d = births();
        assert_eq!(*d.determine_count(&key(20, 0, 50.0)).unwrap().determined(), 10);
        assert_eq!(*d.determine_count(&key(35, 4, 20.0)).unwrap().determined(), 3);
        assert_eq!(d.column_labels().len(), 2);
    }

    #[test]
    fn cells_correct_independently() {
        let mut d = births();
        let mut c = d.determine_count(&key(20, 0, 50.0)).unwrap();
        c.set_fulfilled_count(6);
        d.return_achieved_count(&c).unwrap();

        // 0.2 * 100 - 6 = 14
        assert_eq!(*d.determine_count(&key(20, 0, 50.0)).unwrap().determined(), 14);
        // Neighbouring cell untouched.
        assert_eq!(*d.determine_count(&key(20, 1, 50.0)).unwrap().determined(), 5);
        assert!((d.achieved(25, 0).unwrap() - 6.0).abs() < f64::EPSILON);
    }

    #[test]
    fn missing_column_and_uncovered_cells() {
        let d = births();
        let no_column = StatsKey::multiple_birth(
            20,
            1.0,
            CompoundTimeUnit::years(1),
            NaiveDate::from_ymd_opt(1880, 1, 1).unwrap(),
        );
        assert!(matches!(
            d.determine_count(&no_column),
            Err(StatsError::MissingColumnLabel { .. })
        ));
        assert!(matches!(
            d.determine_count(&key(60, 0, 1.0)),
            Err(StatsError::RangeNotCovered { value: 60, .. })
        ));
    }
}
