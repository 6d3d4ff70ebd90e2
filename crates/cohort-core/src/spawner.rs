//! Seed population for the start of a run.
//!
//! The spawner creates `seed_size` people alive on the start date, with
//! ages spread uniformly over `[0, max_seed_age]` and sex drawn from the
//! sex ratio at birth. Seed people have no parents and no partnerships;
//! partnerships form as births need them.

use chrono::{Days, NaiveDate};
use rand::Rng;
use tracing::{debug, info};

use cohort_population::{PeopleCollection, PopulationError};
use cohort_stats::PopulationStatistics;
use cohort_types::{PersonId, Sex};

use crate::config::PopulationConfig;

/// Days per year used to spread seed birth dates.
const DAYS_PER_YEAR: u64 = 365;

/// Errors that can occur while seeding the population.
#[derive(Debug, thiserror::Error)]
pub enum SpawnError {
    /// A seed birth date fell outside the representable range.
    #[error("seed birth date out of range: {age} years before {start}")]
    DateOutOfRange {
        /// Age being assigned.
        age: u64,
        /// Start of the run.
        start: NaiveDate,
    },

    /// The population rejected a seed person.
    #[error("population error: {source}")]
    Population {
        /// The underlying population error.
        #[from]
        source: PopulationError,
    },
}

/// Create the seed population in `population`. Every birth date lies
/// strictly before `start`. Returns the ids created, in creation order.
///
/// # Errors
///
/// Returns [`SpawnError`] if a birth date cannot be represented or the
/// population rejects a person.
pub fn spawn_seed_population<R: Rng>(
    population: &mut PeopleCollection,
    statistics: &PopulationStatistics,
    config: &PopulationConfig,
    start: NaiveDate,
    rng: &mut R,
) -> Result<Vec<PersonId>, SpawnError> {
    let male_proportion = statistics.male_proportion_of_births(start);
    let max_age = u64::try_from(config.max_seed_age.max(0)).unwrap_or(0);

    let mut ids = Vec::new();
    for _ in 0..config.seed_size {
        let age: u64 = rng.random_range(0..=max_age);
        let day_in_year: u64 = rng.random_range(1..=DAYS_PER_YEAR);
        let birth_date = age
            .checked_mul(DAYS_PER_YEAR)
            .and_then(|d| d.checked_add(day_in_year))
            .and_then(|d| start.checked_sub_days(Days::new(d)))
            .ok_or(SpawnError::DateOutOfRange { age, start })?;

        let sex = random_sex(rng, male_proportion);
        let id = population.add_person(sex, birth_date, None)?;
        debug!(person = %id, %sex, %birth_date, "Spawned seed person");
        ids.push(id);
    }

    let counts = population.counts();
    info!(
        seed_size = config.seed_size,
        males = counts.living_males(),
        females = counts.living_females(),
        %start,
        "Seed population created"
    );
    Ok(ids)
}

/// Draw a sex with probability `male_proportion` of male.
pub fn random_sex(rng: &mut impl Rng, male_proportion: f64) -> Sex {
    if rng.random::<f64>() < male_proportion {
        Sex::Male
    } else {
        Sex::Female
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
