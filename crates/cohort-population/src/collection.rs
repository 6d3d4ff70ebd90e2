//! In-memory population store.
//!
//! # Architecture
//!
//! People and partnerships live in id-keyed `BTreeMap`s so iteration order
//! is allocation order, which keeps seeded runs reproducible. A separate
//! index tracks the living, since every timestep walks them and the dead
//! accumulate without bound.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::Serialize;
use tracing::trace;

use cohort_types::{PartnershipId, PersonId, Sex};

use crate::counts::PopulationCounts;
use crate::error::PopulationError;
use crate::partnership::Partnership;
use crate::person::Person;
use crate::Population;

/// Every person and partnership ever created in a run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PeopleCollection {
    people: BTreeMap<PersonId, Person>,
    partnerships: BTreeMap<PartnershipId, Partnership>,
    #[serde(skip)]
    living: BTreeSet<PersonId>,
    #[serde(skip)]
    next_person: u64,
    #[serde(skip)]
    next_partnership: u64,
    counts: PopulationCounts,
}

impl PeopleCollection {
    /// An empty population.
    pub fn new() -> Self {
        Self::default()
    }

    /// Running totals.
    pub const fn counts(&self) -> &PopulationCounts {
        &self.counts
    }

    /// Number of people ever created.
    pub fn len(&self) -> usize {
        self.people.len()
    }

    /// Whether nobody was ever created.
    pub fn is_empty(&self) -> bool {
        self.people.is_empty()
    }

    /// Identifiers of the living, in allocation order.
    pub fn living_ids(&self) -> impl Iterator<Item = PersonId> + '_ {
        self.living.iter().copied()
    }

    /// The living, in allocation order.
    pub fn living_people(&self) -> impl Iterator<Item = &Person> {
        self.living.iter().filter_map(|id| self.people.get(id))
    }

    /// Every partnership, in allocation order.
    pub fn partnerships(&self) -> impl Iterator<Item = &Partnership> {
        self.partnerships.values()
    }

    /// Create a person. When `parents` is given the person is appended to
    /// that partnership's children, and is illegitimate when that
    /// partnership is.
    pub fn add_person(
        &mut self,
        sex: Sex,
        birth_date: NaiveDate,
        parents: Option<PartnershipId>,
    ) -> Result<PersonId, PopulationError> {
        if let Some(pid) = parents
            && !self.partnerships.contains_key(&pid)
        {
            return Err(PopulationError::PartnershipNotFound(pid));
        }

        let id = PersonId::new(self.next_person);
        self.next_person = self
            .next_person
            .checked_add(1)
            .ok_or(PopulationError::IdSpaceExhausted)?;

        let mut illegitimate = false;
        if let Some(partnership) = parents.and_then(|pid| self.partnerships.get_mut(&pid)) {
            partnership.children.push(id);
            illegitimate = partnership.illegitimate;
        }
        self.people.insert(
            id,
            Person {
                id,
                sex,
                birth_date,
                death_date: None,
                partnerships: Vec::new(),
                parents,
                illegitimate,
            },
        );
        self.living.insert(id);
        self.counts.new_person(sex);
        if illegitimate {
            self.counts.new_illegitimate_birth();
        }
        trace!(person = %id, ?sex, %birth_date, "Person created");
        Ok(id)
    }

    /// Record the death of a living person.
    pub fn record_death(&mut self, id: PersonId, date: NaiveDate) -> Result<(), PopulationError> {
        let person = self
            .people
            .get_mut(&id)
            .ok_or(PopulationError::PersonNotFound(id))?;
        if person.death_date.is_some() {
            return Err(PopulationError::AlreadyDead(id));
        }
        if date < person.birth_date {
            return Err(PopulationError::BeforeBirth {
                person: id,
                date,
                birth: person.birth_date,
            });
        }
        person.death_date = Some(date);
        let sex = person.sex;
        self.living.remove(&id);
        self.counts.death(sex);
        Ok(())
    }

    /// Start a partnership between `male` and `female` on `start`.
    pub fn form_partnership(
        &mut self,
        male: PersonId,
        female: PersonId,
        start: NaiveDate,
    ) -> Result<PartnershipId, PopulationError> {
        for (person, expected) in [(male, Sex::Male), (female, Sex::Female)] {
            let p = self
                .people
                .get(&person)
                .ok_or(PopulationError::PersonNotFound(person))?;
            if p.sex != expected {
                return Err(PopulationError::WrongPartnerSex {
                    person,
                    expected,
                    actual: p.sex,
                });
            }
            if start < p.birth_date {
                return Err(PopulationError::BeforeBirth {
                    person,
                    date: start,
                    birth: p.birth_date,
                });
            }
        }

        let id = PartnershipId::new(self.next_partnership);
        self.next_partnership = self
            .next_partnership
            .checked_add(1)
            .ok_or(PopulationError::IdSpaceExhausted)?;

        self.partnerships.insert(
            id,
            Partnership {
                id,
                male,
                female,
                start_date: start,
                separation_date: None,
                children: Vec::new(),
                illegitimate: false,
            },
        );
        for person in [male, female] {
            if let Some(p) = self.people.get_mut(&person) {
                p.partnerships.push(id);
            }
        }
        self.counts.new_partnership();
        Ok(id)
    }

    /// Record the union of a mother with a man outside her partnership for
    /// a birth on `date`. The union starts and ends that day; children
    /// added to it are illegitimate.
    pub fn form_illegitimate_union(
        &mut self,
        father: PersonId,
        mother: PersonId,
        date: NaiveDate,
    ) -> Result<PartnershipId, PopulationError> {
        let id = self.form_partnership(father, mother, date)?;
        if let Some(partnership) = self.partnerships.get_mut(&id) {
            partnership.illegitimate = true;
        }
        self.separate(id, date)?;
        trace!(partnership = %id, %father, %mother, %date, "Illegitimate union recorded");
        Ok(id)
    }

    /// End a partnership on `date`.
    pub fn separate(&mut self, id: PartnershipId, date: NaiveDate) -> Result<(), PopulationError> {
        let partnership = self
            .partnerships
            .get_mut(&id)
            .ok_or(PopulationError::PartnershipNotFound(id))?;
        if partnership.separation_date.is_some() {
            return Err(PopulationError::AlreadySeparated(id));
        }
        if date < partnership.start_date {
            return Err(PopulationError::SeparationBeforeStart {
                partnership: id,
                date,
                start: partnership.start_date,
            });
        }
        partnership.separation_date = Some(date);
        self.counts.partnership_ended();
        Ok(())
    }
}

impl Population for PeopleCollection {
    fn people(&self) -> impl Iterator<Item = &Person> {
        self.people.values()
    }

    fn person(&self, id: PersonId) -> Option<&Person> {
        self.people.get(&id)
    }

    fn partnership(&self, id: PartnershipId) -> Option<&Partnership> {
        self.partnerships.get(&id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn couple(pop: &mut PeopleCollection) -> (PersonId, PersonId, PartnershipId) {
        let m = pop.add_person(Sex::Male, d(1840, 1, 1), None).unwrap();
        let f = pop.add_person(Sex::Female, d(1845, 1, 1), None).unwrap();
        let p = pop.form_partnership(m, f, d(1865, 6, 1)).unwrap();
        (m, f, p)
    }

    #[test]
    fn ids_follow_allocation_order() {
        let mut pop = PeopleCollection::new();
        let (m, f, _) = couple(&mut pop);
        assert_eq!(m, PersonId::new(0));
        assert_eq!(f, PersonId::new(1));
        assert_eq!(pop.len(), 2);
    }

    #[test]
    fn children_join_parents_partnership() {
        let mut pop = PeopleCollection::new();
        let (_, f, p) = couple(&mut pop);
        let c1 = pop.add_person(Sex::Female, d(1866, 3, 1), Some(p)).unwrap();
        let c2 = pop.add_person(Sex::Male, d(1868, 3, 1), Some(p)).unwrap();
        let partnership = pop.partnership(p).unwrap();
        assert_eq!(partnership.children, vec![c1, c2]);
        assert_eq!(pop.person(c1).unwrap().parents, Some(p));

        let mother = pop.person(f).unwrap();
        assert_eq!(pop.children_born_before(partnership, d(1868, 3, 1)), 1);
        assert_eq!(pop.children_born_in_year(partnership, 1868), 1);
        assert_eq!(pop.total_children_born_before(mother, d(1900, 1, 1)), 2);
        assert_eq!(pop.last_child(partnership).map(|c| c.id), Some(c2));
    }

    #[test]
    fn unknown_parents_rejected() {
        let mut pop = PeopleCollection::new();
        assert_eq!(
            pop.add_person(Sex::Male, d(1900, 1, 1), Some(PartnershipId::new(9))),
            Err(PopulationError::PartnershipNotFound(PartnershipId::new(9)))
        );
        assert!(pop.is_empty());
    }

    #[test]
    fn deaths_update_living_index() {
        let mut pop = PeopleCollection::new();
        let (m, _, _) = couple(&mut pop);
        pop.record_death(m, d(1880, 1, 1)).unwrap();
        assert_eq!(pop.living_ids().count(), 1);
        assert_eq!(pop.counts().living_males(), 0);
        assert_eq!(pop.record_death(m, d(1881, 1, 1)), Err(PopulationError::AlreadyDead(m)));
    }

    #[test]
    fn death_before_birth_rejected() {
        let mut pop = PeopleCollection::new();
        let id = pop.add_person(Sex::Male, d(1900, 1, 1), None).unwrap();
        assert!(matches!(
            pop.record_death(id, d(1899, 1, 1)),
            Err(PopulationError::BeforeBirth { .. })
        ));
    }

    #[test]
    fn partnership_sex_checked() {
        let mut pop = PeopleCollection::new();
        let a = pop.add_person(Sex::Female, d(1840, 1, 1), None).unwrap();
        let b = pop.add_person(Sex::Female, d(1840, 1, 1), None).unwrap();
        assert!(matches!(
            pop.form_partnership(a, b, d(1860, 1, 1)),
            Err(PopulationError::WrongPartnerSex { expected: Sex::Male, .. })
        ));
    }

    #[test]
    fn separation_and_active_partnership() {
        let mut pop = PeopleCollection::new();
        let (m, f, p) = couple(&mut pop);
        pop.separate(p, d(1870, 1, 1)).unwrap();
        assert_eq!(pop.separate(p, d(1871, 1, 1)), Err(PopulationError::AlreadySeparated(p)));

        let m2 = pop.add_person(Sex::Male, d(1842, 1, 1), None).unwrap();
        let p2 = pop.form_partnership(m2, f, d(1870, 8, 1)).unwrap();
        let mother = pop.person(f).unwrap();
        // Both are active during 1870; the later one wins.
        assert_eq!(pop.active_partnership(mother, 1870).map(|x| x.id), Some(p2));
        assert_eq!(pop.active_partnership(mother, 1869).map(|x| x.id), Some(p));
        assert_eq!(pop.counts().current_partnerships(), 1);
        let father = pop.person(m).unwrap();
        assert!(pop.active_partnership(father, 1875).is_none());
    }

    #[test]
    fn illegitimate_union_marks_children() {
        let mut pop = PeopleCollection::new();
        let (m, f, p) = couple(&mut pop);
        let lover = pop.add_person(Sex::Male, d(1838, 1, 1), None).unwrap();
        let union = pop.form_illegitimate_union(lover, f, d(1868, 4, 2)).unwrap();
        let child = pop.add_person(Sex::Male, d(1868, 4, 2), Some(union)).unwrap();
        let legit = pop.add_person(Sex::Female, d(1870, 5, 1), Some(p)).unwrap();

        assert!(pop.person(child).unwrap().illegitimate);
        assert!(!pop.person(legit).unwrap().illegitimate);
        assert_eq!(pop.counts().illegitimate_births(), 1);

        let record = pop.partnership(union).unwrap();
        assert!(record.illegitimate);
        assert_eq!(record.separation_date, Some(d(1868, 4, 2)));
        assert_eq!(pop.counts().current_partnerships(), 1);

        // The standing partnership stays the active one.
        let mother = pop.person(f).unwrap();
        assert_eq!(pop.active_partnership(mother, 1868).map(|x| x.id), Some(p));
        assert_eq!(pop.total_children_born_before(mother, d(1871, 1, 1)), 2);
        assert_eq!(pop.person(m).unwrap().partnerships.len(), 1);
    }
}
