//! Integer ranges used as row and column labels in statistical tables.
//!
//! A range is written `5` (a single value), `0-14` (inclusive bounds), or
//! `85+` (open upper bound). Ranges order by lower bound first, which is the
//! natural label order used wherever tie-breaking by label is required.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// An inclusive integer range with an optional upper bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IntegerRange {
    min: i32,
    max: Option<i32>,
}

impl IntegerRange {
    /// Build a bounded range. Fails when `min > max`.
    pub const fn new(min: i32, max: i32) -> Result<Self, ParseError> {
        if min > max {
            return Err(ParseError::ReversedRange { min, max });
        }
        Ok(Self {
            min,
            max: Some(max),
        })
    }

    /// A range containing exactly one value.
    pub const fn single(value: i32) -> Self {
        Self {
            min: value,
            max: Some(value),
        }
    }

    /// A range with no upper bound (`min+`).
    pub const fn open(min: i32) -> Self {
        Self { min, max: None }
    }

    /// Lower bound (inclusive).
    pub const fn min(&self) -> i32 {
        self.min
    }

    /// Upper bound (inclusive), `None` when open-ended.
    pub const fn max(&self) -> Option<i32> {
        self.max
    }

    /// Whether `value` lies within the range.
    pub const fn contains(&self, value: i32) -> bool {
        if value < self.min {
            return false;
        }
        match self.max {
            Some(max) => value <= max,
            None => true,
        }
    }

    /// Find the first range in `labels` that contains `value`.
    pub fn find_containing<'a, I>(labels: I, value: i32) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Self>,
    {
        labels.into_iter().find(|r| r.contains(value)).copied()
    }
}

impl core::fmt::Display for IntegerRange {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.max {
            None => write!(f, "{}+", self.min),
            Some(max) if max == self.min => write!(f, "{}", self.min),
            Some(max) => write!(f, "{}-{max}", self.min),
        }
    }
}

impl FromStr for IntegerRange {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let invalid = || ParseError::InvalidRange {
            input: String::from(s),
        };
        let parse = |part: &str| part.trim().parse::<i32>().map_err(|_e| invalid());

        if let Some(lower) = text.strip_suffix('+') {
            return Ok(Self::open(parse(lower)?));
        }
        if let Some((lower, upper)) = text.split_once('-') {
            if lower.trim().is_empty() {
                return Err(invalid());
            }
            return Self::new(parse(lower)?, parse(upper)?);
        }
        Ok(Self::single(parse(text)?))
    }
}

impl TryFrom<String> for IntegerRange {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<IntegerRange> for String {
    fn from(range: IntegerRange) -> Self {
        range.to_string()
    }
}
