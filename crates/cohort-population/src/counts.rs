//! Running population totals.
//!
//! Updated by the store on every mutation so the runner can read living
//! counts and the peak population without scanning everyone.

use serde::Serialize;

use cohort_types::Sex;

/// Running totals of people and partnerships.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PopulationCounts {
    created_males: u64,
    created_females: u64,
    living_males: u64,
    living_females: u64,
    created_partnerships: u64,
    current_partnerships: u64,
    illegitimate_births: u64,
    peak_population: u64,
}

impl PopulationCounts {
    /// Record a newly created person.
    pub const fn new_person(&mut self, sex: Sex) {
        match sex {
            Sex::Male => {
                self.created_males = self.created_males.saturating_add(1);
                self.living_males = self.living_males.saturating_add(1);
            }
            Sex::Female => {
                self.created_females = self.created_females.saturating_add(1);
                self.living_females = self.living_females.saturating_add(1);
            }
        }
        self.update_peak();
    }

    /// Record a death.
    pub const fn death(&mut self, sex: Sex) {
        match sex {
            Sex::Male => self.living_males = self.living_males.saturating_sub(1),
            Sex::Female => self.living_females = self.living_females.saturating_sub(1),
        }
    }

    /// Record a new partnership.
    pub const fn new_partnership(&mut self) {
        self.created_partnerships = self.created_partnerships.saturating_add(1);
        self.current_partnerships = self.current_partnerships.saturating_add(1);
    }

    /// Record the end of a partnership.
    pub const fn partnership_ended(&mut self) {
        self.current_partnerships = self.current_partnerships.saturating_sub(1);
    }

    /// Record a child fathered outside the mother's partnership.
    pub const fn new_illegitimate_birth(&mut self) {
        self.illegitimate_births = self.illegitimate_births.saturating_add(1);
    }

    const fn update_peak(&mut self) {
        let living = self.living_population();
        if living > self.peak_population {
            self.peak_population = living;
        }
    }

    /// People alive now.
    pub const fn living_population(&self) -> u64 {
        self.living_males.saturating_add(self.living_females)
    }

    /// Living males.
    pub const fn living_males(&self) -> u64 {
        self.living_males
    }

    /// Living females.
    pub const fn living_females(&self) -> u64 {
        self.living_females
    }

    /// People ever created.
    pub const fn created_people(&self) -> u64 {
        self.created_males.saturating_add(self.created_females)
    }

    /// Partnerships ever created.
    pub const fn created_partnerships(&self) -> u64 {
        self.created_partnerships
    }

    /// Partnerships not yet ended.
    pub const fn current_partnerships(&self) -> u64 {
        self.current_partnerships
    }

    /// Children fathered outside the mother's partnership.
    pub const fn illegitimate_births(&self) -> u64 {
        self.illegitimate_births
    }

    /// Largest living population seen.
    pub const fn peak_population(&self) -> u64 {
        self.peak_population
    }

    /// Male share of everyone ever created, zero when nobody was.
    pub fn all_time_sex_ratio(&self) -> f64 {
        ratio(self.created_males, self.created_people())
    }

    /// Male share of the living, zero when nobody is alive.
    pub fn living_sex_ratio(&self) -> f64 {
        ratio(self.living_males, self.living_population())
    }
}

fn ratio(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    // Population sizes stay far below 2^52.
    #[allow(clippy::cast_precision_loss)]
    let r = part as f64 / whole as f64;
    r
}
