//! Compound time units and year-granular date arithmetic.
//!
//! Statistical tables are indexed by year; every lookup and gap-filling
//! step works on the first day of a year, advanced by a compound unit such
//! as `1y` or `6m`.

use core::str::FromStr;

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Base unit of a [`CompoundTimeUnit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    /// Calendar month.
    Month,
    /// Calendar year.
    Year,
}

/// A count of months or years, e.g. `1y` or `6m`. Negative counts step
/// backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CompoundTimeUnit {
    count: i32,
    unit: TimeUnit,
}

impl CompoundTimeUnit {
    /// Build a compound unit.
    pub const fn new(count: i32, unit: TimeUnit) -> Self {
        Self { count, unit }
    }

    /// `count` years.
    pub const fn years(count: i32) -> Self {
        Self::new(count, TimeUnit::Year)
    }

    /// `count` months.
    pub const fn months(count: i32) -> Self {
        Self::new(count, TimeUnit::Month)
    }

    /// Number of units.
    pub const fn count(&self) -> i32 {
        self.count
    }

    /// The base unit.
    pub const fn unit(&self) -> TimeUnit {
        self.unit
    }

    /// Total length in months, saturating.
    pub const fn total_months(&self) -> i32 {
        match self.unit {
            TimeUnit::Month => self.count,
            TimeUnit::Year => self.count.saturating_mul(12),
        }
    }

    /// Whether the unit moves time forward.
    pub const fn is_positive(&self) -> bool {
        self.count > 0
    }

    /// This unit multiplied by `factor`, saturating.
    pub const fn times(&self, factor: i32) -> Self {
        Self::new(self.count.saturating_mul(factor), self.unit)
    }

    /// Length as a fraction of a year.
    pub fn as_years(&self) -> f64 {
        f64::from(self.total_months()) / 12.0
    }
}

impl core::fmt::Display for CompoundTimeUnit {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let suffix = match self.unit {
            TimeUnit::Month => "m",
            TimeUnit::Year => "y",
        };
        write!(f, "{}{suffix}", self.count)
    }
}

impl FromStr for CompoundTimeUnit {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim().to_ascii_lowercase();
        let invalid = || ParseError::InvalidTimeUnit {
            input: String::from(s),
        };
        let (digits, unit) = if let Some(d) = text.strip_suffix('y') {
            (d, TimeUnit::Year)
        } else if let Some(d) = text.strip_suffix('m') {
            (d, TimeUnit::Month)
        } else {
            return Err(invalid());
        };
        let count = digits.trim().parse::<i32>().map_err(|_e| invalid())?;
        Ok(Self::new(count, unit))
    }
}

impl TryFrom<String> for CompoundTimeUnit {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CompoundTimeUnit> for String {
    fn from(unit: CompoundTimeUnit) -> Self {
        unit.to_string()
    }
}

// ---------------------------------------------------------------------------
// Date helpers
// ---------------------------------------------------------------------------

/// Advance `date` by `step`. Returns `None` if the result is out of range.
pub fn advance(date: NaiveDate, step: CompoundTimeUnit) -> Option<NaiveDate> {
    let months = step.total_months();
    let magnitude = Months::new(months.unsigned_abs());
    if months >= 0 {
        date.checked_add_months(magnitude)
    } else {
        date.checked_sub_months(magnitude)
    }
}

/// First day of `year`.
pub fn year_start(year: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, 1, 1)
}

/// Truncate `date` to the first day of its year.
pub fn truncate_to_year(date: NaiveDate) -> NaiveDate {
    date.with_ordinal(1).unwrap_or(date)
}

/// Absolute difference in whole calendar months between two dates.
pub fn months_between(a: NaiveDate, b: NaiveDate) -> i64 {
    let index = |d: NaiveDate| {
        i64::from(d.year())
            .saturating_mul(12)
            .saturating_add(i64::from(d.month0()))
    };
    index(a).saturating_sub(index(b)).saturating_abs()
}

/// Absolute difference in days between two dates.
pub fn days_between(a: NaiveDate, b: NaiveDate) -> i64 {
    a.signed_duration_since(b).num_days().saturating_abs()
}
