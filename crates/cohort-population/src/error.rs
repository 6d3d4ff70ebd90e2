//! Error types for the cohort-population crate.
//!
//! Every mutation of the population validates its inputs and returns a
//! typed error rather than leaving the store half-updated.

use chrono::NaiveDate;

use cohort_types::{PartnershipId, PersonId, Sex};

/// Errors raised by population mutations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PopulationError {
    /// No person with this identifier exists.
    #[error("person not found: {0}")]
    PersonNotFound(PersonId),

    /// No partnership with this identifier exists.
    #[error("partnership not found: {0}")]
    PartnershipNotFound(PartnershipId),

    /// The identifier space is exhausted.
    #[error("identifier space exhausted")]
    IdSpaceExhausted,

    /// The person is already dead.
    #[error("person {0} is already dead")]
    AlreadyDead(PersonId),

    /// An event was dated before the person was born.
    #[error("event on {date} precedes birth of person {person} on {birth}")]
    BeforeBirth {
        /// The person concerned.
        person: PersonId,
        /// Date of the rejected event.
        date: NaiveDate,
        /// The person's birth date.
        birth: NaiveDate,
    },

    /// A partnership needs one male and one female partner.
    #[error("partner {person} has sex {actual}, expected {expected}")]
    WrongPartnerSex {
        /// The offending partner.
        person: PersonId,
        /// Sex required for the role.
        expected: Sex,
        /// Sex the person has.
        actual: Sex,
    },

    /// The partnership has already ended.
    #[error("partnership {0} has already ended")]
    AlreadySeparated(PartnershipId),

    /// Separation dated before the partnership started.
    #[error("separation on {date} precedes start of partnership {partnership} on {start}")]
    SeparationBeforeStart {
        /// The partnership concerned.
        partnership: PartnershipId,
        /// Rejected separation date.
        date: NaiveDate,
        /// Partnership start date.
        start: NaiveDate,
    },
}
