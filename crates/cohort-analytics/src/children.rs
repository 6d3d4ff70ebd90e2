//! Family sizes and fertility by year.

use std::collections::BTreeMap;

use chrono::Datelike;
use serde::Serialize;

use cohort_population::Population;

use crate::{MAX_CHILD_BEARING_AGE, MIN_CHILD_BEARING_AGE};

/// Partnerships keyed by how many children they produced, counted through
/// the female partner so each partnership is seen once. Illegitimate
/// unions are left out.
pub fn children_per_partnership<P: Population>(population: &P) -> BTreeMap<usize, u64> {
    let mut counts = BTreeMap::new();
    for woman in population.people().filter(|p| p.is_female()) {
        for partnership in population
            .partnerships_of(woman)
            .filter(|p| !p.illegitimate)
        {
            let entry = counts.entry(partnership.children.len()).or_insert(0_u64);
            *entry = entry.saturating_add(1);
        }
    }
    counts
}

/// Births per woman of child-bearing age in one year.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FertilityRate {
    /// Calendar year.
    pub year: i32,
    /// Children born in the year.
    pub births: u64,
    /// Women alive in the year aged within the child-bearing range.
    pub women: u64,
    /// `births / women`, zero when there are no women.
    pub rate: f64,
}

/// Fertility rate for every year from the earliest to the latest year in
/// which either a birth or a woman of child-bearing age is recorded.
pub fn fertility_by_year<P: Population>(population: &P) -> Vec<FertilityRate> {
    let mut births: BTreeMap<i32, u64> = BTreeMap::new();
    let mut women: BTreeMap<i32, u64> = BTreeMap::new();

    for woman in population.people().filter(|p| p.is_female()) {
        for partnership in population.partnerships_of(woman) {
            for child in partnership
                .children
                .iter()
                .filter_map(|id| population.person(*id))
            {
                let entry = births.entry(child.birth_date.year()).or_insert(0);
                *entry = entry.saturating_add(1);
            }
        }
        let yob = woman.birth_year();
        let first = yob.saturating_add(MIN_CHILD_BEARING_AGE);
        let last = yob.saturating_add(MAX_CHILD_BEARING_AGE);
        for year in (first..last).filter(|y| woman.alive_in_year(*y)) {
            let entry = women.entry(year).or_insert(0);
            *entry = entry.saturating_add(1);
        }
    }

    let years = births.keys().chain(women.keys()).copied();
    let (Some(earliest), Some(latest)) = (years.clone().min(), years.max()) else {
        return Vec::new();
    };

    (earliest..=latest)
        .map(|year| {
            let b = births.get(&year).copied().unwrap_or(0);
            let w = women.get(&year).copied().unwrap_or(0);
            #[allow(clippy::cast_precision_loss)]
            let rate = if w == 0 { 0.0 } else { b as f64 / w as f64 };
            FertilityRate {
                year,
                births: b,
                women: w,
                rate,
            }
        })
        .collect()
}
