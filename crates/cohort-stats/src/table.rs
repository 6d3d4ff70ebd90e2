//! Year-indexed tables of distributions.
//!
//! # Architecture
//!
//! Distributions live in a `Vec`; the year index maps each tabulated year
//! to a slot. Gap filling inserts extra years that point at an existing
//! slot, so a duplicated year shares the distribution instance, including
//! its self-correction state, with the year it was copied from.
//!
//! # Lookup
//!
//! [`nearest_year`] truncates the query date to its year, then scans the
//! years in ascending order and keeps the first year with the smallest
//! month difference, so the earlier year wins an exact tie.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use tracing::debug;

use cohort_types::CompoundTimeUnit;
use cohort_types::time::{advance, days_between, months_between, truncate_to_year, year_start};

use crate::StatsError;

/// Header information of an input table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableMetadata {
    /// Year the data describes.
    pub year: i32,
    /// Population the data was drawn from.
    pub source_population: String,
    /// Organisation that published the data.
    pub source_organisation: String,
}

impl TableMetadata {
    /// Metadata with empty provenance.
    pub const fn for_year(year: i32) -> Self {
        Self {
            year,
            source_population: String::new(),
            source_organisation: String::new(),
        }
    }
}

/// Year of `years` nearest to the year of `date` by whole-month
/// difference. Earlier years win ties. `None` when `years` is empty.
pub fn nearest_year<I>(years: I, date: NaiveDate) -> Option<i32>
where
    I: IntoIterator<Item = i32>,
{
    let date = truncate_to_year(date);
    let mut sorted: Vec<i32> = years.into_iter().collect();
    sorted.sort_unstable();

    let mut best: Option<(i32, i64)> = None;
    for year in sorted {
        let Some(start) = year_start(year) else {
            continue;
        };
        let diff = months_between(start, date);
        match best {
            Some((_, best_diff)) if diff >= best_diff => {}
            _ => best = Some((year, diff)),
        }
    }
    best.map(|(year, _)| year)
}

/// A year-indexed collection of distributions of type `D`.
#[derive(Debug, Clone)]
pub struct DistributionTable<D> {
    name: &'static str,
    distributions: Vec<D>,
    years: BTreeMap<i32, usize>,
}

impl<D> DistributionTable<D> {
    /// An empty table. `name` appears in logs and errors.
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            distributions: Vec::new(),
            years: BTreeMap::new(),
        }
    }

    /// Table name.
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Add the distribution tabulated for `year`.
    pub fn insert(&mut self, year: i32, distribution: D) -> Result<(), StatsError> {
        if self.years.contains_key(&year) {
            return Err(StatsError::DuplicateYear {
                table: self.name,
                year,
            });
        }
        self.years.insert(year, self.distributions.len());
        self.distributions.push(distribution);
        Ok(())
    }

    /// Indexed years in ascending order, including gap-filled ones.
    pub fn years(&self) -> impl Iterator<Item = i32> + '_ {
        self.years.keys().copied()
    }

    /// Whether the table holds no data.
    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }

    /// Whether two indexed years resolve to the same distribution.
    pub fn shares_distribution(&self, a: i32, b: i32) -> bool {
        match (self.years.get(&a), self.years.get(&b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        }
    }

    /// Year whose distribution applies to `date`.
    pub fn nearest_year(&self, date: NaiveDate) -> Result<i32, StatsError> {
        nearest_year(self.years(), date).ok_or(StatsError::NoDataAvailable { table: self.name })
    }

    /// Distribution applying to `date`.
    pub fn get(&self, date: NaiveDate) -> Result<&D, StatsError> {
        let slot = self.slot(date)?;
        self.distributions
            .get(slot)
            .ok_or(StatsError::NoDataAvailable { table: self.name })
    }

    /// Mutable distribution applying to `date`.
    pub fn get_mut(&mut self, date: NaiveDate) -> Result<&mut D, StatsError> {
        let slot = self.slot(date)?;
        self.distributions
            .get_mut(slot)
            .ok_or(StatsError::NoDataAvailable { table: self.name })
    }

    fn slot(&self, date: NaiveDate) -> Result<usize, StatsError> {
        let year = self.nearest_year(date)?;
        self.years
            .get(&year)
            .copied()
            .ok_or(StatsError::NoDataAvailable { table: self.name })
    }

    /// Index additional years so that consecutive indexed years are at most
    /// `width` apart between `start` and `end`.
    ///
    /// Years before the first tabulated year copy the first one; years after
    /// the last copy the last one. Years between two tabulated years copy
    /// whichever is nearer by days, the later one on a tie. Tabulated years
    /// are never overwritten.
    pub fn fill_to_input_width(
        &mut self,
        start: NaiveDate,
        end: NaiveDate,
        width: CompoundTimeUnit,
    ) -> Result<(), StatsError> {
        if !width.is_positive() {
            return Err(StatsError::InvalidInputWidth { width });
        }
        let tabulated: Vec<(NaiveDate, usize)> = self
            .years
            .iter()
            .filter_map(|(year, slot)| year_start(*year).map(|d| (d, *slot)))
            .collect();
        let (Some(&(first, first_slot)), Some(&(last, last_slot))) =
            (tabulated.first(), tabulated.last())
        else {
            return Ok(());
        };
        let before = self.years.len();

        // Lead-in: from the start of the run up to the first tabulated year.
        let mut prev = truncate_to_year(start);
        self.fill_span(prev, first, width, |_| first_slot)?;

        // Between consecutive tabulated years.
        prev = first;
        let mut prev_slot = first_slot;
        for &(next, next_slot) in tabulated.iter().skip(1) {
            self.fill_span(prev, next, width, |cur| {
                if days_between(cur, prev) < days_between(cur, next) {
                    prev_slot
                } else {
                    next_slot
                }
            })?;
            prev = next;
            prev_slot = next_slot;
        }

        // Tail: from the last tabulated year to the end of the run.
        self.fill_span(last, end, width, |_| last_slot)?;

        debug!(
            table = self.name,
            added = self.years.len().saturating_sub(before),
            "Filled distribution table to input width"
        );
        Ok(())
    }

    /// Index every `from + k * width` (k >= 1) up to and including `to`.
    fn fill_span<F>(
        &mut self,
        from: NaiveDate,
        to: NaiveDate,
        width: CompoundTimeUnit,
        pick: F,
    ) -> Result<(), StatsError>
    where
        F: Fn(NaiveDate) -> usize,
    {
        let mut step: i32 = 1;
        loop {
            let cur = advance(from, width.times(step))
                .ok_or(StatsError::InvalidInputWidth { width })?;
            if cur > to {
                return Ok(());
            }
            self.years.entry(cur.year()).or_insert_with(|| pick(cur));
            step = step
                .checked_add(1)
                .ok_or(StatsError::InvalidInputWidth { width })?;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn date(y: i32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, 1, 1).unwrap()
    }

    fn table(years: &[i32]) -> DistributionTable<i32> {
        let mut t = DistributionTable::new("test");
        for y in years {
            t.insert(*y, *y).unwrap();
        }
        t
    }

    #[test]
    fn nearest_year_prefers_closer() {
        let t = table(&[1850, 1860, 1870]);
        assert_eq!(t.nearest_year(date(1866)).unwrap(), 1870);
        assert_eq!(t.nearest_year(date(1864)).unwrap(), 1860);
        assert_eq!(t.nearest_year(date(1700)).unwrap(), 1850);
        assert_eq!(t.nearest_year(date(2000)).unwrap(), 1870);
    }

    #[test]
    fn nearest_year_tie_goes_to_earlier() {
        let t = table(&[1870, 1860, 1850]);
        assert_eq!(t.nearest_year(date(1865)).unwrap(), 1860);
    }

    #[test]
    fn mid_year_query_resolves_from_its_year() {
        let t = table(&[1860, 1870]);
        let mid = NaiveDate::from_ymd_opt(1865, 7, 1).unwrap();
        assert_eq!(t.nearest_year(mid).unwrap(), 1860);
        let late = NaiveDate::from_ymd_opt(1866, 11, 30).unwrap();
        assert_eq!(t.nearest_year(late).unwrap(), 1870);
    }

    #[test]
    fn empty_table_has_no_data() {
        let t = table(&[]);
        assert!(matches!(
            t.get(date(1900)),
            Err(StatsError::NoDataAvailable { table: "test" })
        ));
    }

    #[test]
    fn duplicate_year_rejected() {
        let mut t = table(&[1850]);
        assert!(matches!(
            t.insert(1850, 0),
            Err(StatsError::DuplicateYear { year: 1850, .. })
        ));
    }

    #[test]
    fn fill_covers_lead_in_gaps_and_tail() {
        let mut t = table(&[1860, 1880]);
        t.fill_to_input_width(date(1850), date(1895), CompoundTimeUnit::years(5))
            .unwrap();
        let years: Vec<i32> = t.years().collect();
        assert_eq!(years, vec![1855, 1860, 1865, 1870, 1875, 1880, 1885, 1890, 1895]);

        assert!(t.shares_distribution(1855, 1860));
        assert!(t.shares_distribution(1865, 1860));
        // 1870 is fewer days from 1880 (one less leap day).
        assert!(t.shares_distribution(1870, 1880));
        assert!(t.shares_distribution(1875, 1880));
        assert!(t.shares_distribution(1895, 1880));
        assert!(!t.shares_distribution(1860, 1880));
    }

    #[test]
    fn filled_years_resolve_to_shared_distribution() {
        let mut t = table(&[1860, 1880]);
        t.fill_to_input_width(date(1860), date(1880), CompoundTimeUnit::years(5))
            .unwrap();
        *t.get_mut(date(1865)).unwrap() += 100;
        assert_eq!(*t.get(date(1860)).unwrap(), 1960);
    }

    #[test]
    fn fill_rejects_non_positive_width() {
        let mut t = table(&[1860]);
        assert!(
            t.fill_to_input_width(date(1850), date(1870), CompoundTimeUnit::years(0))
                .is_err()
        );
    }

    #[test]
    fn fill_on_empty_table_is_noop() {
        let mut t = table(&[]);
        t.fill_to_input_width(date(1850), date(1870), CompoundTimeUnit::years(1))
            .unwrap();
        assert!(t.is_empty());
    }
}
