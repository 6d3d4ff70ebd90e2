//! Timestep driver: one step of the Cohort simulation.
//!
//! Each step covers `[current, current + time_step)` and runs three phases:
//!
//! 1. **Births** -- eligible women are grouped by age and number of
//!    children already born. The ordered birth table sizes each group's
//!    mothers. Mothers without a partner are paired with an unpartnered man
//!    by the partnering table. Up to the configured infidelity share of
//!    partnered mothers have the child by another man. The multiple birth
//!    table sizes each maternity.
//!
//! 2. **Separations** -- partnerships that just had a child are grouped by
//!    their number of children and the separation table decides how many
//!    end before the step is over.
//!
//! 3. **Deaths** -- everyone born before the step is grouped by sex and
//!    age and the death tables decide how many die.
//!
//! Every determination is handed back to the statistics with the count
//! actually achieved, so later steps make up for any shortfall. The step is
//! deterministic given the same population, statistics, and RNG state.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Days, NaiveDate};
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::Serialize;
use tracing::{debug, info};

use cohort_population::{PeopleCollection, Person, Population, PopulationError};
use cohort_stats::{LabeledValueSet, PopulationStatistics, StatsError, StatsKey};
use cohort_types::{CompoundTimeUnit, IntegerRange, PartnershipId, PersonId, Sex};

use crate::clock::{ClockError, SimulationClock};
use crate::config::{PopulationConfig, SimulationConfig};
use crate::spawner::random_sex;

/// Errors that can occur during tick execution.
#[derive(Debug, thiserror::Error)]
pub enum TickError {
    /// A clock operation failed.
    #[error("clock error: {source}")]
    Clock {
        /// The underlying clock error.
        #[from]
        source: ClockError,
    },

    /// A statistics lookup or report failed.
    #[error("statistics error: {source}")]
    Statistics {
        /// The underlying statistics error.
        #[from]
        source: StatsError,
    },

    /// The population rejected an event.
    #[error("population error: {source}")]
    Population {
        /// The underlying population error.
        #[from]
        source: PopulationError,
    },

    /// An event date fell outside the representable range.
    #[error("event date out of range: {days} days after {from}")]
    DateOutOfRange {
        /// Earliest admissible date.
        from: NaiveDate,
        /// Offset that could not be applied.
        days: u64,
    },
}

/// Summary of a single step's execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TickSummary {
    /// Number of the step that was executed (1-based).
    pub step: u64,
    /// First day of the step.
    pub date: NaiveDate,
    /// Mothers who gave birth.
    pub maternities: u64,
    /// Children born.
    pub births: u64,
    /// Partnerships formed for a birth.
    pub partnerships_formed: u64,
    /// Children fathered outside the mother's partnership.
    pub illegitimate_births: u64,
    /// Partnerships that ended.
    pub separations: u64,
    /// People who died.
    pub deaths: u64,
    /// Living population at the end of the step.
    pub living: u64,
}

/// The mutable simulation state passed through the step cycle.
#[derive(Debug)]
pub struct SimulationState {
    /// The simulation clock.
    pub clock: SimulationClock,
    /// Everyone ever simulated.
    pub population: PeopleCollection,
    /// Target statistics with their self-correction state.
    pub statistics: PopulationStatistics,
    /// Source of every random choice in the run.
    pub rng: StdRng,
    /// Demographic limits.
    pub config: PopulationConfig,
}

impl SimulationState {
    /// State at the configured start date, seeded from `config.run.seed`.
    ///
    /// # Errors
    ///
    /// Returns [`TickError::Clock`] if the time configuration is invalid.
    pub fn new(
        config: &SimulationConfig,
        statistics: PopulationStatistics,
        population: PeopleCollection,
    ) -> Result<Self, TickError> {
        Ok(Self {
            clock: SimulationClock::new(&config.time)?,
            population,
            statistics,
            rng: StdRng::seed_from_u64(config.run.seed),
            config: config.population.clone(),
        })
    }
}

/// Execute one complete step of the simulation and advance the clock.
///
/// # Phases
///
/// 1. Births (with partnering and maternity sizes)
/// 2. Separations
/// 3. Deaths
pub fn run_tick(state: &mut SimulationState) -> Result<TickSummary, TickError> {
    let window = StepWindow {
        start: state.clock.current(),
        end: state.clock.step_end()?,
        step: state.clock.step(),
    };
    debug!(date = %window.start, end = %window.end, "Step started");

    // --- Phase 1: Births ---
    let births = phase_births(state, &window)?;

    // --- Phase 2: Separations ---
    let separations = phase_separations(state, &window, &births.deliveries)?;

    // --- Phase 3: Deaths ---
    let deaths = phase_deaths(state, &window)?;

    state.clock.advance()?;

    let summary = TickSummary {
        step: state.clock.steps(),
        date: window.start,
        maternities: to_u64(births.deliveries.len()),
        births: births.children,
        partnerships_formed: births.partnerships_formed,
        illegitimate_births: births.illegitimate,
        separations,
        deaths,
        living: state.population.counts().living_population(),
    };
    info!(
        step = summary.step,
        date = %summary.date,
        births = summary.births,
        deaths = summary.deaths,
        partnerships = summary.partnerships_formed,
        separations = summary.separations,
        living = summary.living,
        "Step completed"
    );
    Ok(summary)
}

// ---------------------------------------------------------------------------
// Step window
// ---------------------------------------------------------------------------

/// The interval a step covers.
struct StepWindow {
    start: NaiveDate,
    end: NaiveDate,
    step: CompoundTimeUnit,
}

impl StepWindow {
    /// Person-years at risk for `n` people over the step.
    fn exposure(&self, n: usize) -> f64 {
        to_real(n) * self.step.as_years()
    }

    /// A uniformly random day in `[max(from, start), end)`, or `from` when
    /// that interval is empty.
    fn random_date(&self, rng: &mut impl Rng, from: NaiveDate) -> Result<NaiveDate, TickError> {
        let from = from.max(self.start);
        let span = self.end.signed_duration_since(from).num_days();
        let Ok(span) = u64::try_from(span) else {
            return Ok(from);
        };
        if span == 0 {
            return Ok(from);
        }
        let days = rng.random_range(0..span);
        from.checked_add_days(Days::new(days))
            .ok_or(TickError::DateOutOfRange { from, days })
    }
}

// ---------------------------------------------------------------------------
// Phase 1: Births
// ---------------------------------------------------------------------------

/// How a selected mother's child gets its parents' partnership.
#[derive(Debug, Clone, Copy)]
enum Parents {
    /// She is in a current partnership.
    Existing(PartnershipId),
    /// A partnership with this man is formed on the birth date.
    New(PersonId),
    /// She is partnered but this other man fathers the child.
    Illegitimate(PersonId),
}

/// A maternity that took place.
struct Delivery {
    partnership: PartnershipId,
    date: NaiveDate,
}

/// Result of the birth phase.
struct BirthOutcome {
    deliveries: Vec<Delivery>,
    children: u64,
    partnerships_formed: u64,
    illegitimate: u64,
}

fn phase_births(
    state: &mut SimulationState,
    window: &StepWindow,
) -> Result<BirthOutcome, TickError> {
    // 1a. Eligible women by (age, children already born)
    let spacing = state.statistics.constants().min_birth_spacing_days;
    let mut groups: BTreeMap<(i32, i32), Vec<PersonId>> = BTreeMap::new();
    for woman in state.population.living_people().filter(|p| p.is_female()) {
        let age = woman.age_on(window.start);
        if age < state.config.min_child_bearing_age || age >= state.config.max_child_bearing_age {
            continue;
        }
        if let Some(last) = last_birth(&state.population, woman)
            && window.start.signed_duration_since(last).num_days() < spacing
        {
            continue;
        }
        let order = to_label(
            state
                .population
                .total_children_born_before(woman, window.start),
        );
        groups.entry((age, order)).or_default().push(woman.id);
    }

    // 1b. Ordered birth counts pick the mothers
    let mut selections = Vec::with_capacity(groups.len());
    for ((age, order), mut women) in groups {
        let key = StatsKey::ordered_birth(
            age,
            order,
            window.exposure(women.len()),
            window.step,
            window.start,
        );
        let determination = state.statistics.determine_single(&key)?;
        let count = to_usize(*determination.determined()).min(women.len());
        women.shuffle(&mut state.rng);
        women.truncate(count);
        selections.push((determination, women));
    }

    // 1c. Partners for mothers not in a current partnership
    let mut parents: BTreeMap<PersonId, Parents> = BTreeMap::new();
    let mut unpartnered: BTreeMap<i32, Vec<PersonId>> = BTreeMap::new();
    for mother in selections.iter().flat_map(|(_, women)| women.iter().copied()) {
        let Some(person) = state.population.person(mother) else {
            return Err(PopulationError::PersonNotFound(mother).into());
        };
        match current_partnership(&state.population, person, window.start) {
            Some(partnership) => {
                parents.insert(mother, Parents::Existing(partnership));
            }
            None => unpartnered
                .entry(person.age_on(window.start))
                .or_default()
                .push(mother),
        }
    }
    let mut available = available_men(&state.population, window.start);
    for (age, mut women) in unpartnered {
        let key = StatsKey::partnering(age, to_real(women.len()), window.step, window.start);
        let mut determination = state.statistics.determine_multiple(&key)?;
        women.shuffle(&mut state.rng);
        let mut women = women.into_iter();
        let mut achieved = zeroed(determination.determined());
        for (label, count) in determination.determined().iter() {
            for mother in women.by_ref().take(to_usize(count)) {
                if let Some(father) = pick_partner(&mut available, *label, &mut state.rng) {
                    parents.insert(mother, Parents::New(father));
                    increment(&mut achieved, *label);
                }
            }
        }
        determination.set_fulfilled_count(LabeledValueSet::new(achieved));
        state.statistics.return_achieved_count(determination.into())?;
    }

    // 1d. Fathers from outside the partnership
    assign_illegitimate_fathers(state, window, &mut parents);

    // 1e. Maternity sizes for mothers with a partner
    let mut by_age: BTreeMap<i32, Vec<PersonId>> = BTreeMap::new();
    for mother in parents.keys() {
        if let Some(person) = state.population.person(*mother) {
            by_age
                .entry(person.age_on(window.start))
                .or_default()
                .push(*mother);
        }
    }
    let mut maternities = Vec::with_capacity(parents.len());
    for (age, mut mothers) in by_age {
        let key = StatsKey::multiple_birth(age, to_real(mothers.len()), window.step, window.start);
        let mut determination = state.statistics.determine_multiple(&key)?;
        let mut sizes: Vec<(IntegerRange, i32)> = determination
            .determined()
            .iter()
            .flat_map(|(label, count)| {
                std::iter::repeat_n((*label, label.min().max(1)), to_usize(count))
            })
            .collect();
        sizes.shuffle(&mut state.rng);
        mothers.shuffle(&mut state.rng);

        let mut achieved = zeroed(determination.determined());
        let mut sizes = sizes.into_iter();
        for mother in mothers {
            let size = match sizes.next() {
                Some((label, size)) => {
                    increment(&mut achieved, label);
                    size
                }
                None => 1,
            };
            maternities.push((mother, size));
        }
        determination.set_fulfilled_count(LabeledValueSet::new(achieved));
        state.statistics.return_achieved_count(determination.into())?;
    }

    // 1f. Apply births
    let male_proportion = state.statistics.male_proportion_of_births(window.start);
    let mut outcome = BirthOutcome {
        deliveries: Vec::with_capacity(maternities.len()),
        children: 0,
        partnerships_formed: 0,
        illegitimate: 0,
    };
    let mut delivered = BTreeSet::new();
    for (mother, size) in maternities {
        let Some(how) = parents.get(&mother).copied() else {
            continue;
        };
        let date = window.random_date(&mut state.rng, window.start)?;
        let partnership = match how {
            Parents::Existing(id) => id,
            Parents::New(father) => {
                outcome.partnerships_formed = outcome.partnerships_formed.saturating_add(1);
                state.population.form_partnership(father, mother, date)?
            }
            Parents::Illegitimate(father) => {
                state.population.form_illegitimate_union(father, mother, date)?
            }
        };
        for _ in 0..size {
            let sex = random_sex(&mut state.rng, male_proportion);
            state.population.add_person(sex, date, Some(partnership))?;
            outcome.children = outcome.children.saturating_add(1);
            if matches!(how, Parents::Illegitimate(_)) {
                outcome.illegitimate = outcome.illegitimate.saturating_add(1);
            }
        }
        delivered.insert(mother);
        outcome.deliveries.push(Delivery { partnership, date });
    }

    // 1g. Report achieved ordered births
    for (mut determination, mothers) in selections {
        let achieved = mothers.iter().filter(|m| delivered.contains(*m)).count();
        determination.set_fulfilled_count(to_count(achieved));
        state.statistics.return_achieved_count(determination.into())?;
    }

    debug!(
        maternities = outcome.deliveries.len(),
        children = outcome.children,
        partnerships = outcome.partnerships_formed,
        illegitimate = outcome.illegitimate,
        "Birth phase complete"
    );
    Ok(outcome)
}

/// Give up to the infidelity share of partnered mothers a father from
/// outside their partnership. Each mother is drawn with that probability
/// until the cap is reached; the father is any living man of
/// child-bearing age other than her partner.
fn assign_illegitimate_fathers(
    state: &mut SimulationState,
    window: &StepWindow,
    parents: &mut BTreeMap<PersonId, Parents>,
) {
    let share = state.statistics.constants().max_infidelity_proportion;
    let mut partnered: Vec<(PersonId, Option<PersonId>)> = parents
        .iter()
        .filter_map(|(mother, how)| match how {
            Parents::Existing(id) => Some((
                *mother,
                state
                    .population
                    .partnership(*id)
                    .and_then(|p| p.partner_of(*mother)),
            )),
            Parents::New(_) | Parents::Illegitimate(_) => None,
        })
        .collect();
    let limit = infidelity_limit(partnered.len(), share);
    if limit == 0 {
        return;
    }

    let men: Vec<PersonId> = state
        .population
        .living_people()
        .filter(|p| p.sex == Sex::Male && p.birth_date < window.start)
        .filter(|p| p.age_on(window.start) >= state.config.min_child_bearing_age)
        .map(|p| p.id)
        .collect();
    partnered.shuffle(&mut state.rng);

    let mut assigned: usize = 0;
    for (mother, partner) in partnered {
        if assigned >= limit {
            break;
        }
        if state.rng.random::<f64>() >= share {
            continue;
        }
        if let Some(father) = pick_other_man(&men, partner, &mut state.rng) {
            parents.insert(mother, Parents::Illegitimate(father));
            assigned = assigned.saturating_add(1);
        }
    }
}

/// Largest number of the `partnered` mothers allowed an illegitimate
/// birth.
fn infidelity_limit(partnered: usize, share: f64) -> usize {
    let limit = (to_real(partnered) * share.clamp(0.0, 1.0)).floor();
    // Bounded by `partnered` and non-negative.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let limit = limit as usize;
    limit.min(partnered)
}

/// A random man from `men` other than `excluded`.
fn pick_other_man(
    men: &[PersonId],
    excluded: Option<PersonId>,
    rng: &mut impl Rng,
) -> Option<PersonId> {
    let candidates: Vec<PersonId> = men
        .iter()
        .copied()
        .filter(|m| Some(*m) != excluded)
        .collect();
    candidates
        .get(rng.random_range(0..candidates.len().max(1)))
        .copied()
}

/// Latest birth date among `person`'s children.
fn last_birth(population: &PeopleCollection, person: &Person) -> Option<NaiveDate> {
    population
        .partnerships_of(person)
        .filter_map(|p| population.last_child(p))
        .map(|c| c.birth_date)
        .max()
}

/// The partnership `person` is in on `date` with a living partner.
fn current_partnership(
    population: &PeopleCollection,
    person: &Person,
    date: NaiveDate,
) -> Option<PartnershipId> {
    population
        .partnerships_of(person)
        .filter(|p| p.active_on(date))
        .filter(|p| {
            p.partner_of(person.id)
                .and_then(|id| population.person(id))
                .is_some_and(|partner| partner.alive_on(date))
        })
        .max_by_key(|p| (p.start_date, p.id))
        .map(|p| p.id)
}

/// Living men not in a current partnership, with their age on `date`.
fn available_men(population: &PeopleCollection, date: NaiveDate) -> BTreeMap<PersonId, i32> {
    population
        .living_people()
        .filter(|p| p.sex == Sex::Male && p.birth_date < date)
        .filter(|p| current_partnership(population, p, date).is_none())
        .map(|p| (p.id, p.age_on(date)))
        .collect()
}

/// Remove and return a random man whose age falls in `ages`.
fn pick_partner(
    available: &mut BTreeMap<PersonId, i32>,
    ages: IntegerRange,
    rng: &mut impl Rng,
) -> Option<PersonId> {
    let candidates: Vec<PersonId> = available
        .iter()
        .filter(|(_, age)| ages.contains(**age))
        .map(|(id, _)| *id)
        .collect();
    let chosen = candidates.get(rng.random_range(0..candidates.len().max(1))).copied()?;
    available.remove(&chosen);
    Some(chosen)
}

// ---------------------------------------------------------------------------
// Phase 2: Separations
// ---------------------------------------------------------------------------

fn phase_separations(
    state: &mut SimulationState,
    window: &StepWindow,
    deliveries: &[Delivery],
) -> Result<u64, TickError> {
    let mut groups: BTreeMap<i32, Vec<(PartnershipId, NaiveDate)>> = BTreeMap::new();
    for delivery in deliveries {
        let Some(partnership) = state.population.partnership(delivery.partnership) else {
            return Err(PopulationError::PartnershipNotFound(delivery.partnership).into());
        };
        if partnership.separation_date.is_some() {
            continue;
        }
        groups
            .entry(to_label(partnership.children.len()))
            .or_default()
            .push((delivery.partnership, delivery.date));
    }

    let mut separations: u64 = 0;
    for (children, mut partnerships) in groups {
        let key = StatsKey::separation(
            children,
            to_real(partnerships.len()),
            window.step,
            window.start,
        );
        let mut determination = state.statistics.determine_single(&key)?;
        let count = to_usize(*determination.determined()).min(partnerships.len());
        partnerships.shuffle(&mut state.rng);
        for (id, birth) in partnerships.iter().take(count) {
            let date = window.random_date(&mut state.rng, *birth)?;
            state.population.separate(*id, date)?;
        }
        determination.set_fulfilled_count(to_count(count));
        state.statistics.return_achieved_count(determination.into())?;
        separations = separations.saturating_add(to_u64(count));
    }
    Ok(separations)
}

// ---------------------------------------------------------------------------
// Phase 3: Deaths
// ---------------------------------------------------------------------------

fn phase_deaths(state: &mut SimulationState, window: &StepWindow) -> Result<u64, TickError> {
    let mut groups: BTreeMap<(Sex, i32), Vec<PersonId>> = BTreeMap::new();
    for person in state
        .population
        .living_people()
        .filter(|p| p.birth_date < window.start)
    {
        groups
            .entry((person.sex, person.age_on(window.start)))
            .or_default()
            .push(person.id);
    }

    let mut deaths: u64 = 0;
    for ((sex, age), mut people) in groups {
        let key = StatsKey::death(age, sex, window.exposure(people.len()), window.step, window.start);
        let mut determination = state.statistics.determine_single(&key)?;
        let count = to_usize(*determination.determined()).min(people.len());
        people.shuffle(&mut state.rng);
        for id in people.iter().take(count) {
            // Parents die no earlier than their latest child's birth.
            let earliest = state
                .population
                .person(*id)
                .and_then(|p| last_birth(&state.population, p))
                .unwrap_or(window.start);
            let date = window.random_date(&mut state.rng, earliest)?;
            state.population.record_death(*id, date)?;
        }
        determination.set_fulfilled_count(to_count(count));
        state.statistics.return_achieved_count(determination.into())?;
        deaths = deaths.saturating_add(to_u64(count));
    }
    Ok(deaths)
}

// ---------------------------------------------------------------------------
// Count helpers
// ---------------------------------------------------------------------------

fn zeroed(labels: &LabeledValueSet<IntegerRange, i64>) -> BTreeMap<IntegerRange, i64> {
    labels.labels().map(|label| (*label, 0)).collect()
}

fn increment(counts: &mut BTreeMap<IntegerRange, i64>, label: IntegerRange) {
    if let Some(count) = counts.get_mut(&label) {
        *count = count.saturating_add(1);
    }
}

/// Widen a head count to `f64`. Counts stay far below 2^52.
fn to_real(n: usize) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let real = n as f64;
    real
}

fn to_usize(count: i64) -> usize {
    usize::try_from(count.max(0)).unwrap_or(usize::MAX)
}

fn to_count(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn to_u64(n: usize) -> u64 {
    u64::try_from(n).unwrap_or(u64::MAX)
}

fn to_label(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::spawner::spawn_seed_population;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn statistics(config: &SimulationConfig) -> PopulationStatistics {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("data")
            .join("statistics");
        let mut stats = PopulationStatistics::load(&dir, config.load_options()).unwrap();
        stats
            .fill_to_input_width(config.time.start, config.time.end, config.time.input_width)
            .unwrap();
        stats
    }

    fn seeded_state(seed_size: u32, seed: u64) -> SimulationState {
        let mut config = SimulationConfig::default();
        config.population.seed_size = seed_size;
        config.run.seed = seed;
        let mut state =
            SimulationState::new(&config, statistics(&config), PeopleCollection::new()).unwrap();
        spawn_seed_population(
            &mut state.population,
            &state.statistics,
            &config.population,
            config.time.start,
            &mut state.rng,
        )
        .unwrap();
        state
    }

    #[test]
    fn tick_advances_clock() {
        let mut state = seeded_state(10, 1);
        let summary = run_tick(&mut state).unwrap();
        assert_eq!(summary.step, 1);
        assert_eq!(summary.date, d(1855, 1, 1));
        assert_eq!(state.clock.current(), d(1856, 1, 1));
    }

    #[test]
    fn empty_population_runs_without_events() {
        let config = SimulationConfig::default();
        let mut state =
            SimulationState::new(&config, statistics(&config), PeopleCollection::new()).unwrap();
        let summary = run_tick(&mut state).unwrap();
        assert_eq!(summary.births, 0);
        assert_eq!(summary.deaths, 0);
        assert_eq!(summary.living, 0);
    }

    #[test]
    fn summary_matches_population() {
        let mut state = seeded_state(1000, 42);
        let before = state.population.counts().living_population();
        let summary = run_tick(&mut state).unwrap();

        assert!(summary.births > 0, "a thousand people produce births");
        assert!(summary.deaths > 0, "a thousand people produce deaths");
        assert!(summary.births >= summary.maternities);
        assert!(summary.partnerships_formed <= summary.maternities);
        assert_eq!(summary.living + summary.deaths, before + summary.births);
        assert_eq!(summary.living, state.population.counts().living_population());
    }

    #[test]
    fn events_fall_inside_the_step() {
        let mut state = seeded_state(1000, 9);
        run_tick(&mut state).unwrap();
        let (start, end) = (d(1855, 1, 1), d(1856, 1, 1));

        for person in state.population.people() {
            if let Some(death) = person.death_date {
                assert!(death >= start && death < end);
                assert!(death >= person.birth_date);
            }
            if person.parents.is_some() {
                assert!(person.birth_date >= start && person.birth_date < end);
            }
        }
        for partnership in state.population.partnerships() {
            assert!(partnership.start_date >= start && partnership.start_date < end);
            assert!(!partnership.children.is_empty());
            if let Some(sep) = partnership.separation_date {
                assert!(sep >= partnership.start_date && sep < end);
            }
        }
    }

    #[test]
    fn mothers_are_of_child_bearing_age() {
        let mut state = seeded_state(1000, 5);
        run_tick(&mut state).unwrap();
        for partnership in state.population.partnerships() {
            let mother = state.population.person(partnership.female).unwrap();
            let age = mother.age_on(d(1855, 1, 1));
            assert!((15..50).contains(&age), "mother aged {age}");
            let father = state.population.person(partnership.male).unwrap();
            assert_eq!(father.sex, Sex::Male);
        }
    }

    #[test]
    fn same_seed_same_outcome() {
        let run = |seed| {
            let mut state = seeded_state(300, seed);
            let a = run_tick(&mut state).unwrap();
            let b = run_tick(&mut state).unwrap();
            (a, b)
        };
        assert_eq!(run(11), run(11));
    }

    #[test]
    fn birth_spacing_blocks_recent_mothers() {
        let config = SimulationConfig::default();
        let mut state =
            SimulationState::new(&config, statistics(&config), PeopleCollection::new()).unwrap();
        let pop = &mut state.population;
        let man = pop.add_person(Sex::Male, d(1825, 1, 1), None).unwrap();
        let woman = pop.add_person(Sex::Female, d(1830, 1, 1), None).unwrap();
        let partnership = pop.form_partnership(man, woman, d(1854, 1, 1)).unwrap();
        pop.add_person(Sex::Female, d(1854, 12, 1), Some(partnership))
            .unwrap();

        let summary = run_tick(&mut state).unwrap();
        assert_eq!(summary.maternities, 0);
    }

    #[test]
    fn illegitimate_births_stay_within_share() {
        let mut config = SimulationConfig::default();
        config.population.seed_size = 2000;
        config.population.max_infidelity_proportion = 0.5;
        config.run.seed = 17;
        let mut state =
            SimulationState::new(&config, statistics(&config), PeopleCollection::new()).unwrap();
        spawn_seed_population(
            &mut state.population,
            &state.statistics,
            &config.population,
            config.time.start,
            &mut state.rng,
        )
        .unwrap();

        let mut illegitimate: u64 = 0;
        for _ in 0..5 {
            let summary = run_tick(&mut state).unwrap();
            assert!(summary.illegitimate_births <= summary.births);
            illegitimate = illegitimate.saturating_add(summary.illegitimate_births);
        }
        assert!(illegitimate > 0, "a half share yields illegitimate births");
        assert_eq!(state.population.counts().illegitimate_births(), illegitimate);

        for union in state.population.partnerships().filter(|p| p.illegitimate) {
            assert_eq!(union.separation_date, Some(union.start_date));
            assert!(!union.children.is_empty());
            for child in &union.children {
                assert!(state.population.person(*child).unwrap().illegitimate);
            }
            let mother = state.population.person(union.female).unwrap();
            let standing = mother
                .partnerships
                .iter()
                .filter_map(|id| state.population.partnership(*id))
                .any(|p| !p.illegitimate && p.start_date <= union.start_date);
            assert!(standing, "the mother had a partnership of her own");
        }
    }

    #[test]
    fn zero_infidelity_share_keeps_births_legitimate() {
        let mut config = SimulationConfig::default();
        config.population.seed_size = 1000;
        config.population.max_infidelity_proportion = 0.0;
        let mut state =
            SimulationState::new(&config, statistics(&config), PeopleCollection::new()).unwrap();
        spawn_seed_population(
            &mut state.population,
            &state.statistics,
            &config.population,
            config.time.start,
            &mut state.rng,
        )
        .unwrap();
        for _ in 0..3 {
            assert_eq!(run_tick(&mut state).unwrap().illegitimate_births, 0);
        }
        assert_eq!(state.population.counts().illegitimate_births(), 0);
    }

    #[test]
    fn infidelity_limit_is_floored_share() {
        assert_eq!(infidelity_limit(10, 0.2), 2);
        assert_eq!(infidelity_limit(4, 0.2), 0);
        assert_eq!(infidelity_limit(3, 1.0), 3);
        assert_eq!(infidelity_limit(0, 0.5), 0);
    }

    #[test]
    fn other_man_is_never_the_partner() {
        let men = [PersonId::new(1), PersonId::new(2)];
        let mut rng = StdRng::seed_from_u64(4);
        for _ in 0..50 {
            assert_eq!(
                pick_other_man(&men, Some(PersonId::new(1)), &mut rng),
                Some(PersonId::new(2))
            );
        }
        assert_eq!(pick_other_man(&men[..1], Some(PersonId::new(1)), &mut rng), None);
    }

    #[test]
    fn random_date_stays_in_window() {
        let window = StepWindow {
            start: d(1855, 1, 1),
            end: d(1856, 1, 1),
            step: CompoundTimeUnit::years(1),
        };
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..200 {
            let date = window.random_date(&mut rng, d(1855, 6, 1)).unwrap();
            assert!(date >= d(1855, 6, 1) && date < d(1856, 1, 1));
        }
        // Empty interval returns the lower bound.
        assert_eq!(
            window.random_date(&mut rng, d(1856, 1, 1)).unwrap(),
            d(1856, 1, 1)
        );
        assert!((window.exposure(10) - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn pick_partner_respects_age_range() {
        let mut available: BTreeMap<PersonId, i32> = [
            (PersonId::new(1), 20),
            (PersonId::new(2), 30),
            (PersonId::new(3), 40),
        ]
        .into_iter()
        .collect();
        let mut rng = StdRng::seed_from_u64(1);

        let range = IntegerRange::new(25, 34).unwrap();
        assert_eq!(
            pick_partner(&mut available, range, &mut rng),
            Some(PersonId::new(2))
        );
        assert_eq!(pick_partner(&mut available, range, &mut rng), None);
        assert_eq!(available.len(), 2);
    }
}
