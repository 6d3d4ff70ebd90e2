//! The end-of-run analytics report.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::info;

use cohort_population::{PeopleCollection, Population};

use crate::children::{FertilityRate, children_per_partnership, fertility_by_year};
use crate::marriage::partnerships_per_male;
use crate::percentage;

/// Headline counts of a finished population.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PopulationSummary {
    /// Everyone ever created.
    pub created_people: u64,
    /// Alive at the end of the run.
    pub living_people: u64,
    /// Living men.
    pub living_males: u64,
    /// Living women.
    pub living_females: u64,
    /// Partnerships ever formed.
    pub created_partnerships: u64,
    /// Partnerships not separated.
    pub current_partnerships: u64,
    /// Children fathered outside the mother's partnership.
    pub illegitimate_births: u64,
    /// Largest living population observed.
    pub peak_population: u64,
    /// Men per woman among everyone ever created.
    pub all_time_sex_ratio: f64,
}

/// All analytics for one population.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsReport {
    /// Headline counts.
    pub summary: PopulationSummary,
    /// Men keyed by number of partnerships.
    pub partnerships_per_male: BTreeMap<usize, u64>,
    /// Partnerships keyed by number of children.
    pub children_per_partnership: BTreeMap<usize, u64>,
    /// Births per woman of child-bearing age, by year.
    pub fertility: Vec<FertilityRate>,
}

impl AnalyticsReport {
    /// Analyse `population`.
    pub fn build(population: &PeopleCollection) -> Self {
        let counts = population.counts();
        let summary = PopulationSummary {
            created_people: counts.created_people(),
            living_people: counts.living_population(),
            living_males: counts.living_males(),
            living_females: counts.living_females(),
            created_partnerships: counts.created_partnerships(),
            current_partnerships: counts.current_partnerships(),
            illegitimate_births: counts.illegitimate_births(),
            peak_population: counts.peak_population(),
            all_time_sex_ratio: counts.all_time_sex_ratio(),
        };
        Self::from_parts(summary, population)
    }

    /// Analyse any [`Population`] with an already computed summary.
    pub fn from_parts<P: Population>(summary: PopulationSummary, population: &P) -> Self {
        Self {
            summary,
            partnerships_per_male: partnerships_per_male(population),
            children_per_partnership: children_per_partnership(population),
            fertility: fertility_by_year(population),
        }
    }

    /// Men who never had a partnership, as a percentage of all men.
    pub fn never_partnered_male_pct(&self) -> f64 {
        let total: u64 = self.partnerships_per_male.values().sum();
        let never = self.partnerships_per_male.get(&0).copied().unwrap_or(0);
        percentage(never, total)
    }

    /// Mean children per partnership, zero without partnerships.
    pub fn mean_children_per_partnership(&self) -> f64 {
        let partnerships: u64 = self.children_per_partnership.values().sum();
        let children: u64 = self
            .children_per_partnership
            .iter()
            .map(|(size, n)| u64::try_from(*size).unwrap_or(u64::MAX).saturating_mul(*n))
            .fold(0, u64::saturating_add);
        if partnerships == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let mean = children as f64 / partnerships as f64;
        mean
    }

    /// Write the report's headline figures to the log.
    pub fn log_summary(&self) {
        info!(
            created = self.summary.created_people,
            living = self.summary.living_people,
            peak = self.summary.peak_population,
            partnerships = self.summary.created_partnerships,
            illegitimate = self.summary.illegitimate_births,
            sex_ratio = self.summary.all_time_sex_ratio,
            "Population summary"
        );
        info!(
            never_partnered_pct = self.never_partnered_male_pct(),
            mean_children = self.mean_children_per_partnership(),
            years = self.fertility.len(),
            "Family analytics"
        );
        let total: u64 = self.children_per_partnership.values().sum();
        for (size, count) in &self.children_per_partnership {
            info!(
                children = size,
                partnerships = count,
                pct = percentage(*count, total),
                "Children per partnership"
            );
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::NaiveDate;
    use cohort_types::Sex;

    use super::*;

    fn date(y: i32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, 3, 1).unwrap()
    }

    fn report() -> AnalyticsReport {
        let mut pop = PeopleCollection::new();
        let m = pop.add_person(Sex::Male, date(1800), None).unwrap();
        let f = pop.add_person(Sex::Female, date(1802), None).unwrap();
        pop.add_person(Sex::Male, date(1801), None).unwrap();
        let p = pop.form_partnership(m, f, date(1824)).unwrap();
        for y in [1825, 1827, 1830] {
            pop.add_person(Sex::Female, date(y), Some(p)).unwrap();
        }
        AnalyticsReport::build(&pop)
    }

    #[test]
    fn summary_reflects_counts() {
        let r = report();
        assert_eq!(r.summary.created_people, 6);
        assert_eq!(r.summary.living_people, 6);
        assert_eq!(r.summary.created_partnerships, 1);
        assert_eq!(r.summary.illegitimate_births, 0);
    }

    #[test]
    fn derived_figures() {
        let r = report();
        // Two men, one never partnered.
        assert!((r.never_partnered_male_pct() - 50.0).abs() < 1e-9);
        assert!((r.mean_children_per_partnership() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn serialises_to_json() {
        let json = serde_json::to_value(report()).unwrap();
        assert_eq!(json["summary"]["living_males"], 2);
        assert_eq!(json["children_per_partnership"]["3"], 1);
    }
}
