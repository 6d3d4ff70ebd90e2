//! Query descriptors for demographic rate lookups.
//!
//! A [`StatsKey`] names a row (`y_label`, usually age), optionally a column
//! (`x_label`, e.g. birth order), the population at risk, the period the
//! events are spread over, and the date whose table year applies. Keys are
//! immutable values; build them with the per-kind constructors.

use chrono::NaiveDate;
use serde::Serialize;

use cohort_types::{CompoundTimeUnit, Sex};

/// Which statistical table a key addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StatsKind {
    /// Death rates by age for one sex.
    Death {
        /// Sex whose table applies.
        sex: Sex,
    },
    /// Birth rates by mother's age and birth order.
    OrderedBirth,
    /// Proportions of maternities by number of children born.
    MultipleBirth,
    /// Separation rates by number of children in the partnership.
    Separation,
    /// Proportions of new partners by partner age, for a given own age.
    Partnering,
}

impl StatsKind {
    /// Short name used in logs and errors.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Death { sex: Sex::Male } => "male_death",
            Self::Death { sex: Sex::Female } => "female_death",
            Self::OrderedBirth => "ordered_birth",
            Self::MultipleBirth => "multiple_birth",
            Self::Separation => "separation",
            Self::Partnering => "partnering",
        }
    }

    /// Whether the table yields one count per key (rates) rather than a
    /// labeled set of counts (proportions).
    pub const fn is_single(self) -> bool {
        matches!(
            self,
            Self::Death { .. } | Self::OrderedBirth | Self::Separation
        )
    }
}

impl core::fmt::Display for StatsKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// An immutable query for a determined event count.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsKey {
    kind: StatsKind,
    y_label: i32,
    x_label: Option<i32>,
    max_x_label: Option<i32>,
    for_n_people: f64,
    considered_time_period: CompoundTimeUnit,
    date: NaiveDate,
    self_correction: bool,
}

impl StatsKey {
    const fn build(
        kind: StatsKind,
        y_label: i32,
        x_label: Option<i32>,
        for_n_people: f64,
        considered_time_period: CompoundTimeUnit,
        date: NaiveDate,
    ) -> Self {
        Self {
            kind,
            y_label,
            x_label,
            max_x_label: None,
            for_n_people,
            considered_time_period,
            date,
            self_correction: true,
        }
    }

    /// Deaths among `for_n_people` of `sex` aged `age`.
    pub const fn death(
        age: i32,
        sex: Sex,
        for_n_people: f64,
        period: CompoundTimeUnit,
        date: NaiveDate,
    ) -> Self {
        Self::build(StatsKind::Death { sex }, age, None, for_n_people, period, date)
    }

    /// Births of order `order` (children already born) among
    /// `for_n_people` women aged `age`.
    pub const fn ordered_birth(
        age: i32,
        order: i32,
        for_n_people: f64,
        period: CompoundTimeUnit,
        date: NaiveDate,
    ) -> Self {
        Self::build(
            StatsKind::OrderedBirth,
            age,
            Some(order),
            for_n_people,
            period,
            date,
        )
    }

    /// Maternity sizes among `for_n_people` mothers aged `age`.
    pub const fn multiple_birth(
        age: i32,
        for_n_people: f64,
        period: CompoundTimeUnit,
        date: NaiveDate,
    ) -> Self {
        Self::build(StatsKind::MultipleBirth, age, None, for_n_people, period, date)
    }

    /// Separations among `for_n_people` partnerships with `children`
    /// children.
    pub const fn separation(
        children: i32,
        for_n_people: f64,
        period: CompoundTimeUnit,
        date: NaiveDate,
    ) -> Self {
        Self::build(StatsKind::Separation, children, None, for_n_people, period, date)
    }

    /// Partner ages chosen for `for_n_people` people aged `age`.
    pub const fn partnering(
        age: i32,
        for_n_people: f64,
        period: CompoundTimeUnit,
        date: NaiveDate,
    ) -> Self {
        Self::build(StatsKind::Partnering, age, None, for_n_people, period, date)
    }

    /// Copy of this key with self-correction switched on or off.
    #[must_use]
    pub const fn with_self_correction(mut self, enabled: bool) -> Self {
        self.self_correction = enabled;
        self
    }

    /// Copy of this key admitting only columns starting at or below
    /// `max_x_label`.
    #[must_use]
    pub const fn with_max_x_label(mut self, max_x_label: i32) -> Self {
        self.max_x_label = Some(max_x_label);
        self
    }

    /// Table addressed.
    pub const fn kind(&self) -> StatsKind {
        self.kind
    }

    /// Row label.
    pub const fn y_label(&self) -> i32 {
        self.y_label
    }

    /// Column label, for two-dimensional tables.
    pub const fn x_label(&self) -> Option<i32> {
        self.x_label
    }

    /// Largest admissible column, for proportional tables.
    pub const fn max_x_label(&self) -> Option<i32> {
        self.max_x_label
    }

    /// Population at risk.
    pub const fn for_n_people(&self) -> f64 {
        self.for_n_people
    }

    /// Period the events are spread over.
    pub const fn considered_time_period(&self) -> CompoundTimeUnit {
        self.considered_time_period
    }

    /// Date whose nearest table year applies.
    pub const fn date(&self) -> NaiveDate {
        self.date
    }

    /// Whether prior shortfall or excess feeds back into the count.
    pub const fn self_correction(&self) -> bool {
        self.self_correction
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(1870, 1, 1).unwrap()
    }

    #[test]
    fn constructors_set_labels() {
        let k = StatsKey::ordered_birth(27, 2, 40.0, CompoundTimeUnit::years(1), date());
        assert_eq!(k.kind(), StatsKind::OrderedBirth);
        assert_eq!(k.y_label(), 27);
        assert_eq!(k.x_label(), Some(2));
        assert!(k.self_correction());

        let k = StatsKey::death(80, Sex::Female, 3.0, CompoundTimeUnit::years(1), date())
            .with_self_correction(false);
        assert_eq!(k.kind().name(), "female_death");
        assert!(!k.self_correction());
        assert_eq!(k.x_label(), None);
    }

    #[test]
    fn keys_compare_by_value() {
        let a = StatsKey::partnering(30, 5.0, CompoundTimeUnit::years(1), date());
        let b = StatsKey::partnering(30, 5.0, CompoundTimeUnit::years(1), date());
        assert_eq!(a, b);
        assert_ne!(a, b.clone().with_max_x_label(40));
    }

    #[test]
    fn single_kinds() {
        assert!(StatsKind::Separation.is_single());
        assert!(!StatsKind::Partnering.is_single());
        assert!(!StatsKind::MultipleBirth.is_single());
    }
}
