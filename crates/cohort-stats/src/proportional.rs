//! Self-correcting distribution over rows of proportions.
//!
//! Each row (keyed by age) splits a number of events across column labels.
//! The row's achieved counts are the running total of everything handed
//! out so far; a corrected determination distributes the whole cumulative
//! total by the target proportions and subtracts what was already given:
//!
//! ```text
//! total = sum(achieved_row) + n
//! raw   = proportions * total - achieved_row
//! ```
//!
//! Rows must sum to one within the configured tolerance at load time.

use std::collections::BTreeMap;

use tracing::trace;

use cohort_types::IntegerRange;

use crate::determined::MultipleDeterminedCount;
use crate::labeled::LabeledValueSet;
use crate::table::TableMetadata;
use crate::{StatsError, StatsKey};

type Row = LabeledValueSet<IntegerRange, f64>;

/// Target proportions keyed by row and column integer ranges.
#[derive(Debug, Clone)]
pub struct SelfCorrectingProportionalDistribution {
    metadata: TableMetadata,
    targets: BTreeMap<IntegerRange, Row>,
    achieved: BTreeMap<IntegerRange, Row>,
}

impl SelfCorrectingProportionalDistribution {
    /// Build from rows of proportions, rejecting any row whose sum differs
    /// from one by more than `tolerance`.
    pub fn new(
        metadata: TableMetadata,
        targets: BTreeMap<IntegerRange, Row>,
        tolerance: f64,
    ) -> Result<Self, StatsError> {
        for (row, proportions) in &targets {
            let sum = proportions.sum();
            if (sum - 1.0).abs() > tolerance {
                return Err(StatsError::InconsistentWeights {
                    year: metadata.year,
                    row: row.to_string(),
                    sum,
                });
            }
        }
        let achieved = targets
            .iter()
            .map(|(row, proportions)| (*row, proportions.map(|_| 0.0)))
            .collect();
        Ok(Self {
            metadata,
            targets,
            achieved,
        })
    }

    /// Header of the source table.
    pub const fn metadata(&self) -> &TableMetadata {
        &self.metadata
    }

    /// Row labels in natural order.
    pub fn row_labels(&self) -> impl Iterator<Item = &IntegerRange> {
        self.targets.keys()
    }

    /// Column labels of the row containing `row`, or of the first row when
    /// no row covers it.
    pub fn column_labels(&self, row: i32) -> Vec<IntegerRange> {
        let chosen = IntegerRange::find_containing(self.targets.keys(), row)
            .and_then(|r| self.targets.get(&r))
            .or_else(|| self.targets.values().next());
        chosen
            .map(|cols| cols.labels().copied().collect())
            .unwrap_or_default()
    }

    /// Achieved counts of the row containing `row`.
    pub fn achieved(&self, row: i32) -> Option<&Row> {
        let r = IntegerRange::find_containing(self.targets.keys(), row)?;
        self.achieved.get(&r)
    }

    fn resolve(&self, row: i32) -> Result<IntegerRange, StatsError> {
        IntegerRange::find_containing(self.targets.keys(), row).ok_or(StatsError::RangeNotCovered {
            value: row,
            year: self.metadata.year,
        })
    }

    /// Event counts per column for `key`.
    pub fn determine_count(&self, key: &StatsKey) -> Result<MultipleDeterminedCount, StatsError> {
        let row = self.resolve(key.y_label())?;
        let missing = || StatsError::RangeNotCovered {
            value: key.y_label(),
            year: self.metadata.year,
        };
        let targets = self.targets.get(&row).ok_or_else(missing)?;
        let achieved = self.achieved.get(&row).ok_or_else(missing)?;

        let (targets, achieved) = match key.max_x_label() {
            Some(max) => (restrict(targets, max).normalized(), restrict(achieved, max)),
            None => (targets.clone(), achieved.clone()),
        };

        let n = key.for_n_people();
        let raw = if key.self_correction() {
            let total = achieved.sum() + n;
            targets
                .product_of_values_and_n(total)
                .values_subtract_values(&achieved)?
        } else {
            targets.product_of_values_and_n(n)
        }
        .clamp_negative();
        let uncorrected = targets.product_of_values_and_n(n);
        let determined = raw.controlled_rounding_maintaining_sum();

        trace!(
            table_year = self.metadata.year,
            row = %row,
            total = determined.sum(),
            "Determined proportional count"
        );
        Ok(MultipleDeterminedCount::new(
            key.clone(),
            determined,
            raw,
            uncorrected,
        ))
    }

    /// Add the fulfilled counts to the row's achieved counts and floor
    /// them. Rows no label covers are ignored.
    pub fn return_achieved_count(
        &mut self,
        count: &MultipleDeterminedCount,
    ) -> Result<(), StatsError> {
        let fulfilled = count.require_fulfilled()?;
        let Ok(row) = self.resolve(count.key().y_label()) else {
            return Ok(());
        };
        let Some(previous) = self.achieved.get(&row) else {
            return Ok(());
        };
        let updated = previous
            .values_plus_values(&fulfilled.to_real())?
            .floor_values();
        self.achieved.insert(row, updated);
        Ok(())
    }
}

/// Zero out columns starting above `max`.
fn restrict(row: &Row, max: i32) -> Row {
    row.map_labeled(|label, v| if label.min() > max { 0.0 } else { v })
}
