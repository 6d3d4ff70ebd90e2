//! Rules routing a simulated person down the tree for one year.
//!
//! Each rule looks at the label of the node the person currently sits in
//! and yields the label of the next level, or `None` once the person's
//! path is complete. Men stop after [`Dimension::Died`]; women continue
//! through the fertility and partnership dimensions.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};

use cohort_population::{Partnership, Person, Population};
use cohort_stats::PopulationStatistics;
use cohort_types::{IntegerRange, time};

use crate::TreeError;
use crate::label::{Dimension, NodeLabel, SeparationOption};

/// Label sets looked up from the statistics, cached per year (and age).
#[derive(Debug, Default)]
struct LabelCache {
    separation: BTreeMap<i32, Vec<IntegerRange>>,
    birth_order: BTreeMap<i32, Vec<IntegerRange>>,
    multiple_birth: BTreeMap<(i32, i32), Vec<IntegerRange>>,
    partner_age: BTreeMap<(i32, i32), Vec<IntegerRange>>,
}

/// Classifies simulated people against the label sets of the statistics.
pub struct Classifier<'a, P> {
    population: &'a P,
    statistics: &'a PopulationStatistics,
    cache: LabelCache,
}

impl<'a, P: Population> Classifier<'a, P> {
    /// A classifier reading `population` and `statistics`.
    pub fn new(population: &'a P, statistics: &'a PopulationStatistics) -> Self {
        Self {
            population,
            statistics,
            cache: LabelCache::default(),
        }
    }

    /// Whether `person` is tabulated in `year`: alive through some part of
    /// it having been born earlier, or born and died within it.
    pub fn counted_in_year(person: &Person, year: i32) -> bool {
        let born = person.born_in_year(year);
        (born && person.died_in_year(year)) || (!born && person.alive_in_year(year))
    }

    /// Label of the level below `current` for `person` in `year`.
    pub fn next(
        &mut self,
        person: &Person,
        year: i32,
        current: &NodeLabel,
    ) -> Result<Option<NodeLabel>, TreeError> {
        let label = match current.dimension() {
            Dimension::Source => NodeLabel::YearOfBirth(person.birth_year()),
            Dimension::YearOfBirth => NodeLabel::Sex(person.sex),
            Dimension::Sex => NodeLabel::Age(person.age_in_year(year)),
            Dimension::Age => NodeLabel::Died(person.died_in_year(year)),
            Dimension::Died if !person.is_female() => return Ok(None),
            Dimension::Died => {
                NodeLabel::PreviousChildrenInPartnership(self.previous_in_partnership(person, year)?)
            }
            Dimension::PreviousChildrenInPartnership => NodeLabel::PreviousChildrenInAnyPartnership(
                self.previous_in_any_partnership(person, year)?,
            ),
            Dimension::PreviousChildrenInAnyPartnership => {
                NodeLabel::ChildrenInYear(self.births_in_year(person, year) > 0)
            }
            Dimension::ChildrenInYear => {
                NodeLabel::NumberOfChildrenInYear(self.number_in_year(person, year)?)
            }
            Dimension::NumberOfChildrenInYear => {
                NodeLabel::ChildrenInPartnership(self.in_partnership_by_end(person, year)?)
            }
            Dimension::ChildrenInPartnership => {
                NodeLabel::Separation(self.separation(person, year))
            }
            Dimension::Separation => NodeLabel::NewPartnerAge(self.new_partner_age(person, year)?),
            Dimension::NewPartnerAge => return Ok(None),
        };
        Ok(Some(label))
    }

    // -----------------------------------------------------------------------
    // Dimension rules
    // -----------------------------------------------------------------------

    fn previous_in_partnership(
        &mut self,
        person: &Person,
        year: i32,
    ) -> Result<IntegerRange, TreeError> {
        let start = year_start(year)?;
        let count = self
            .active(person, year)
            .map_or(0, |p| self.population.children_born_before(p, start));
        let labels = self.separation_labels(year)?;
        resolve(
            Dimension::PreviousChildrenInPartnership,
            labels,
            to_value(count),
        )
    }

    fn previous_in_any_partnership(
        &mut self,
        person: &Person,
        year: i32,
    ) -> Result<IntegerRange, TreeError> {
        let start = year_start(year)?;
        let count = self.population.total_children_born_before(person, start);
        let labels = self.birth_order_labels(year)?;
        resolve(
            Dimension::PreviousChildrenInAnyPartnership,
            labels,
            to_value(count),
        )
    }

    fn births_in_year(&self, person: &Person, year: i32) -> usize {
        self.active(person, year)
            .map_or(0, |p| self.population.children_born_in_year(p, year))
    }

    fn number_in_year(&mut self, person: &Person, year: i32) -> Result<IntegerRange, TreeError> {
        let count = self.births_in_year(person, year);
        let labels = self.multiple_birth_labels(year, person.age_in_year(year))?;
        resolve(Dimension::NumberOfChildrenInYear, labels, to_value(count))
    }

    fn in_partnership_by_end(
        &mut self,
        person: &Person,
        year: i32,
    ) -> Result<IntegerRange, TreeError> {
        let count = self
            .active(person, year)
            .map_or(0, |p| self.population.children_born_by_end_of_year(p, year));
        let labels = self.separation_labels(year)?;
        resolve(Dimension::ChildrenInPartnership, labels, to_value(count))
    }

    fn separation(&self, person: &Person, year: i32) -> SeparationOption {
        let Some(partnership) = self.active(person, year) else {
            return SeparationOption::NotApplicable;
        };
        let last_born_this_year = self
            .population
            .last_child(partnership)
            .is_some_and(|c| c.born_in_year(year));
        if !last_born_this_year {
            return SeparationOption::No;
        }
        if partnership
            .separation_date
            .is_some_and(|d| d.year() == year)
        {
            SeparationOption::Yes
        } else {
            SeparationOption::No
        }
    }

    fn new_partner_age(
        &mut self,
        person: &Person,
        year: i32,
    ) -> Result<Option<IntegerRange>, TreeError> {
        let Some(partnership) = self.active(person, year) else {
            return Ok(None);
        };
        if !partnership.started_in_year(year) {
            return Ok(None);
        }
        let partner_id = partnership
            .partner_of(person.id)
            .ok_or(TreeError::MissingPerson(person.id))?;
        let partner_age = self
            .population
            .person(partner_id)
            .ok_or(TreeError::MissingPerson(partner_id))?
            .age_in_year(year);
        let labels = self.partner_age_labels(year, person.age_in_year(year))?;
        resolve(Dimension::NewPartnerAge, labels, partner_age).map(Some)
    }

    fn active(&self, person: &'a Person, year: i32) -> Option<&'a Partnership> {
        let population: &'a P = self.population;
        population
            .partnerships_of(person)
            .filter(|p| !p.illegitimate && p.active_in_year(year))
            .max_by_key(|p| (p.start_date, p.id))
    }

    // -----------------------------------------------------------------------
    // Cached label sets
    // -----------------------------------------------------------------------

    fn separation_labels(&mut self, year: i32) -> Result<&[IntegerRange], TreeError> {
        if !self.cache.separation.contains_key(&year) {
            let labels = self.statistics.separation_labels(year_start(year)?)?;
            self.cache.separation.insert(year, labels);
        }
        Ok(self.cache.separation.get(&year).map_or(&[], Vec::as_slice))
    }

    fn birth_order_labels(&mut self, year: i32) -> Result<&[IntegerRange], TreeError> {
        if !self.cache.birth_order.contains_key(&year) {
            let labels = self.statistics.birth_order_labels(year_start(year)?)?;
            self.cache.birth_order.insert(year, labels);
        }
        Ok(self.cache.birth_order.get(&year).map_or(&[], Vec::as_slice))
    }

    fn multiple_birth_labels(&mut self, year: i32, age: i32) -> Result<&[IntegerRange], TreeError> {
        if !self.cache.multiple_birth.contains_key(&(year, age)) {
            let labels = self
                .statistics
                .multiple_birth_labels(year_start(year)?, age)?;
            self.cache.multiple_birth.insert((year, age), labels);
        }
        Ok(self
            .cache
            .multiple_birth
            .get(&(year, age))
            .map_or(&[], Vec::as_slice))
    }

    fn partner_age_labels(&mut self, year: i32, age: i32) -> Result<&[IntegerRange], TreeError> {
        if !self.cache.partner_age.contains_key(&(year, age)) {
            let labels = self.statistics.partner_age_labels(year_start(year)?, age)?;
            self.cache.partner_age.insert((year, age), labels);
        }
        Ok(self
            .cache
            .partner_age
            .get(&(year, age))
            .map_or(&[], Vec::as_slice))
    }
}

/// Label of `labels` containing `value`. A zero outside every label still
/// classifies as the single label `0`.
pub fn resolve(
    dimension: Dimension,
    labels: &[IntegerRange],
    value: i32,
) -> Result<IntegerRange, TreeError> {
    match IntegerRange::find_containing(labels, value) {
        Some(label) => Ok(label),
        None if value == 0 => Ok(IntegerRange::single(0)),
        None => Err(TreeError::Unclassifiable { dimension, value }),
    }
}

/// First day of `year`.
pub fn year_start(year: i32) -> Result<NaiveDate, TreeError> {
    time::year_start(year).ok_or(TreeError::YearOutOfRange(year))
}

fn to_value(count: usize) -> i32 {
    i32::try_from(count).unwrap_or(i32::MAX)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn labels() -> Vec<IntegerRange> {
        vec![
            IntegerRange::single(1),
            IntegerRange::single(2),
            IntegerRange::open(3),
        ]
    }

    #[test]
    fn resolve_finds_bucket() {
        let found = resolve(Dimension::ChildrenInPartnership, &labels(), 5).unwrap();
        assert_eq!(found, IntegerRange::open(3));
    }

    #[test]
    fn resolve_zero_falls_back() {
        let found = resolve(Dimension::NumberOfChildrenInYear, &labels(), 0).unwrap();
        assert_eq!(found, IntegerRange::single(0));
    }

    #[test]
    fn resolve_uncovered_value_fails() {
        let short = vec![IntegerRange::single(1), IntegerRange::single(2)];
        let err = resolve(Dimension::NumberOfChildrenInYear, &short, 3).unwrap_err();
        assert!(matches!(
            err,
            TreeError::Unclassifiable {
                dimension: Dimension::NumberOfChildrenInYear,
                value: 3
            }
        ));
    }
}
