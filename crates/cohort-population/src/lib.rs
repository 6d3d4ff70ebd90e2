//! People, partnerships, and population bookkeeping for the Cohort
//! simulation.
//!
//! # Architecture
//!
//! - [`person`] -- [`Person`] records with year and date predicates.
//! - [`partnership`] -- [`Partnership`] records.
//! - [`collection`] -- [`PeopleCollection`], the in-memory store the
//!   simulation mutates.
//! - [`counts`] -- [`PopulationCounts`], running totals kept by the store.
//!
//! Readers (the contingency tree and the analytics) go through the
//! [`Population`] trait, which needs only lookup by id and enumeration;
//! every derived query is provided on top of those three methods.

pub mod collection;
pub mod counts;
pub mod error;
pub mod partnership;
pub mod person;

pub use collection::PeopleCollection;
pub use counts::PopulationCounts;
pub use error::PopulationError;
pub use partnership::Partnership;
pub use person::Person;

use chrono::{Datelike, NaiveDate};

use cohort_types::{PartnershipId, PersonId};

/// Read access to a population.
pub trait Population {
    /// Everyone ever created, dead or alive.
    fn people(&self) -> impl Iterator<Item = &Person>;

    /// Look up a person.
    fn person(&self, id: PersonId) -> Option<&Person>;

    /// Look up a partnership.
    fn partnership(&self, id: PartnershipId) -> Option<&Partnership>;

    /// Partnerships `person` has been in, oldest first.
    fn partnerships_of<'a>(&'a self, person: &'a Person) -> impl Iterator<Item = &'a Partnership> {
        person
            .partnerships
            .iter()
            .filter_map(move |id| self.partnership(*id))
    }

    /// The partnership `person` was in during `year`. When several were
    /// active that year, the most recently started one. Illegitimate
    /// unions are skipped.
    fn active_partnership<'a>(&'a self, person: &'a Person, year: i32) -> Option<&'a Partnership> {
        self.partnerships_of(person)
            .filter(|p| !p.illegitimate && p.active_in_year(year))
            .max_by_key(|p| (p.start_date, p.id))
    }

    /// Children of `partnership` born strictly before `date`.
    fn children_born_before(&self, partnership: &Partnership, date: NaiveDate) -> usize {
        self.children_matching(partnership, |c| c.birth_date < date)
    }

    /// Children of `partnership` born in `year`.
    fn children_born_in_year(&self, partnership: &Partnership, year: i32) -> usize {
        self.children_matching(partnership, |c| c.birth_date.year() == year)
    }

    /// Children of `partnership` born in or before `year`.
    fn children_born_by_end_of_year(&self, partnership: &Partnership, year: i32) -> usize {
        self.children_matching(partnership, |c| c.birth_date.year() <= year)
    }

    /// Children of `partnership` satisfying `predicate`.
    fn children_matching<F>(&self, partnership: &Partnership, predicate: F) -> usize
    where
        F: Fn(&Person) -> bool,
    {
        partnership
            .children
            .iter()
            .filter_map(|id| self.person(*id))
            .filter(|c| predicate(c))
            .count()
    }

    /// Children of `person` across all partnerships born before `date`.
    fn total_children_born_before(&self, person: &Person, date: NaiveDate) -> usize {
        self.partnerships_of(person)
            .map(|p| self.children_born_before(p, date))
            .sum()
    }

    /// Most recently born child of `partnership`.
    fn last_child(&self, partnership: &Partnership) -> Option<&Person> {
        partnership
            .children
            .iter()
            .filter_map(|id| self.person(*id))
            .max_by_key(|c| (c.birth_date, c.id))
    }
}
