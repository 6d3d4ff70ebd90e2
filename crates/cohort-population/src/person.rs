//! Simulated individuals.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use cohort_types::{PartnershipId, PersonId, Sex};

/// A simulated person.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    /// Unique identifier.
    pub id: PersonId,
    /// Sex.
    pub sex: Sex,
    /// Date of birth.
    pub birth_date: NaiveDate,
    /// Date of death, if dead.
    pub death_date: Option<NaiveDate>,
    /// Partnerships the person has been in, oldest first.
    pub partnerships: Vec<PartnershipId>,
    /// Partnership the person was born into, if any.
    pub parents: Option<PartnershipId>,
    /// Fathered outside the mother's partnership.
    #[serde(default)]
    pub illegitimate: bool,
}

impl Person {
    /// Year of birth.
    pub fn birth_year(&self) -> i32 {
        self.birth_date.year()
    }

    /// Whether the person is female.
    pub fn is_female(&self) -> bool {
        self.sex == Sex::Female
    }

    /// Whether the person was born in `year`.
    pub fn born_in_year(&self, year: i32) -> bool {
        self.birth_date.year() == year
    }

    /// Whether the person died in `year`.
    pub fn died_in_year(&self, year: i32) -> bool {
        self.death_date.is_some_and(|d| d.year() == year)
    }

    /// Whether the person was alive at any point in `year`.
    pub fn alive_in_year(&self, year: i32) -> bool {
        self.birth_date.year() <= year && self.death_date.is_none_or(|d| d.year() >= year)
    }

    /// Whether the person is alive on `date`.
    pub fn alive_on(&self, date: NaiveDate) -> bool {
        self.birth_date <= date && self.death_date.is_none_or(|d| d > date)
    }

    /// Completed years of age on `date`, zero before birth.
    pub fn age_on(&self, date: NaiveDate) -> i32 {
        date.years_since(self.birth_date)
            .and_then(|y| i32::try_from(y).ok())
            .unwrap_or(0)
    }

    /// Age reached during `year` (calendar-year difference).
    pub fn age_in_year(&self, year: i32) -> i32 {
        year.saturating_sub(self.birth_year())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn person(birth: (i32, u32, u32), death: Option<(i32, u32, u32)>) -> Person {
        let d = |(y, m, day): (i32, u32, u32)| NaiveDate::from_ymd_opt(y, m, day).unwrap();
        Person {
            id: PersonId::new(1),
            sex: Sex::Female,
            birth_date: d(birth),
            death_date: death.map(d),
            partnerships: Vec::new(),
            parents: None,
            illegitimate: false,
        }
    }

    #[test]
    fn year_predicates() {
        let p = person((1850, 6, 1), Some((1870, 3, 1)));
        assert!(p.born_in_year(1850));
        assert!(p.died_in_year(1870));
        assert!(p.alive_in_year(1850));
        assert!(p.alive_in_year(1870));
        assert!(!p.alive_in_year(1871));
        assert!(!p.alive_in_year(1849));
        assert_eq!(p.age_in_year(1860), 10);
    }

    #[test]
    fn date_predicates() {
        let p = person((1850, 6, 1), Some((1870, 3, 1)));
        let d = |y, m, day| NaiveDate::from_ymd_opt(y, m, day).unwrap();
        assert!(p.alive_on(d(1850, 6, 1)));
        assert!(!p.alive_on(d(1870, 3, 1)));
        assert_eq!(p.age_on(d(1860, 5, 31)), 9);
        assert_eq!(p.age_on(d(1860, 6, 1)), 10);
        assert_eq!(p.age_on(d(1840, 1, 1)), 0);
    }

    #[test]
    fn json_without_legitimacy_defaults_to_legitimate() {
        let json = r#"{
            "id": 7,
            "sex": "female",
            "birth_date": "1850-06-01",
            "death_date": null,
            "partnerships": [],
            "parents": 3
        }"#;
        let p: Person = serde_json::from_str(json).unwrap();
        assert!(!p.illegitimate);
        assert_eq!(p.parents, Some(PartnershipId::new(3)));

        let back = serde_json::to_value(&p).unwrap();
        assert_eq!(back["illegitimate"], false);
        assert_eq!(back["birth_date"], "1850-06-01");
    }
}
