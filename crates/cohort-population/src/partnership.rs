//! Partnerships between a male and a female partner.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use cohort_types::{PartnershipId, PersonId};

/// A partnership and the children born into it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partnership {
    /// Unique identifier.
    pub id: PartnershipId,
    /// Male partner.
    pub male: PersonId,
    /// Female partner.
    pub female: PersonId,
    /// Date the partnership began.
    pub start_date: NaiveDate,
    /// Date the partners separated, if they did.
    pub separation_date: Option<NaiveDate>,
    /// Children of the partnership in birth order.
    pub children: Vec<PersonId>,
    /// A union outside the mother's partnership that only produced a
    /// birth. It starts and ends on the birth date.
    #[serde(default)]
    pub illegitimate: bool,
}

impl Partnership {
    /// Whether the partnership existed at any point in `year`.
    pub fn active_in_year(&self, year: i32) -> bool {
        self.start_date.year() <= year && self.separation_date.is_none_or(|d| d.year() >= year)
    }

    /// Whether the partnership exists on `date`.
    pub fn active_on(&self, date: NaiveDate) -> bool {
        self.start_date <= date && self.separation_date.is_none_or(|d| d > date)
    }

    /// Whether the partnership began in `year`.
    pub fn started_in_year(&self, year: i32) -> bool {
        self.start_date.year() == year
    }

    /// The other partner, if `person` is one of the partners.
    pub fn partner_of(&self, person: PersonId) -> Option<PersonId> {
        if person == self.male {
            Some(self.female)
        } else if person == self.female {
            Some(self.male)
        } else {
            None
        }
    }
}
