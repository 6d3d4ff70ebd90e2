//! Node labels: one tagged variant per classification dimension.

use serde::Serialize;

use cohort_types::{IntegerRange, Sex};

/// Which population a branch of the tree describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SourceType {
    /// The simulated population.
    Sim,
    /// Expected counts derived from the target statistics.
    Stat,
}

/// Separation outcome for a woman in a year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum SeparationOption {
    /// Separated after a birth in the year.
    Yes,
    /// In a partnership that continued.
    No,
    /// Not in a partnership.
    NotApplicable,
}

/// Classification dimensions in tree order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Dimension {
    /// SIM or STAT.
    Source,
    /// Year of birth.
    YearOfBirth,
    /// Sex.
    Sex,
    /// Age during the year.
    Age,
    /// Died during the year.
    Died,
    /// Children born into the current partnership before the year.
    PreviousChildrenInPartnership,
    /// Children born into any partnership before the year.
    PreviousChildrenInAnyPartnership,
    /// Whether any child was born in the year.
    ChildrenInYear,
    /// Number of children born in the year.
    NumberOfChildrenInYear,
    /// Children in the current partnership by the end of the year.
    ChildrenInPartnership,
    /// Separation outcome.
    Separation,
    /// Age of a partner taken during the year.
    NewPartnerAge,
}

impl Dimension {
    /// Column name in contingency table output.
    pub const fn column(self) -> &'static str {
        match self {
            Self::Source => "Source",
            Self::YearOfBirth => "YOB",
            Self::Sex => "Sex",
            Self::Age => "Age",
            Self::Died => "Died",
            Self::PreviousChildrenInPartnership => "PNCIP",
            Self::PreviousChildrenInAnyPartnership => "NPCIAP",
            Self::ChildrenInYear => "CIY",
            Self::NumberOfChildrenInYear => "NCIY",
            Self::ChildrenInPartnership => "NCIP",
            Self::Separation => "Separated",
            Self::NewPartnerAge => "NPA",
        }
    }
}

/// The value a node classifies on, tagged by dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum NodeLabel {
    /// Root of a branch.
    Source(SourceType),
    /// Year of birth.
    YearOfBirth(i32),
    /// Sex.
    Sex(Sex),
    /// Age during the year.
    Age(i32),
    /// Died during the year.
    Died(bool),
    /// Children in the current partnership before the year.
    PreviousChildrenInPartnership(IntegerRange),
    /// Children in any partnership before the year.
    PreviousChildrenInAnyPartnership(IntegerRange),
    /// Any child born in the year.
    ChildrenInYear(bool),
    /// Children born in the year.
    NumberOfChildrenInYear(IntegerRange),
    /// Children in the current partnership by the end of the year.
    ChildrenInPartnership(IntegerRange),
    /// Separation outcome.
    Separation(SeparationOption),
    /// Age of a new partner, `None` when no partnership began.
    NewPartnerAge(Option<IntegerRange>),
}

impl NodeLabel {
    /// Dimension this label belongs to.
    pub const fn dimension(&self) -> Dimension {
        match self {
            Self::Source(_) => Dimension::Source,
            Self::YearOfBirth(_) => Dimension::YearOfBirth,
            Self::Sex(_) => Dimension::Sex,
            Self::Age(_) => Dimension::Age,
            Self::Died(_) => Dimension::Died,
            Self::PreviousChildrenInPartnership(_) => Dimension::PreviousChildrenInPartnership,
            Self::PreviousChildrenInAnyPartnership(_) => {
                Dimension::PreviousChildrenInAnyPartnership
            }
            Self::ChildrenInYear(_) => Dimension::ChildrenInYear,
            Self::NumberOfChildrenInYear(_) => Dimension::NumberOfChildrenInYear,
            Self::ChildrenInPartnership(_) => Dimension::ChildrenInPartnership,
            Self::Separation(_) => Dimension::Separation,
            Self::NewPartnerAge(_) => Dimension::NewPartnerAge,
        }
    }
}

impl core::fmt::Display for NodeLabel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let yes_no = |b: bool| if b { "YES" } else { "NO" };
        match self {
            Self::Source(SourceType::Sim) => f.write_str("SIM"),
            Self::Source(SourceType::Stat) => f.write_str("STAT"),
            Self::YearOfBirth(v) | Self::Age(v) => write!(f, "{v}"),
            Self::Sex(s) => write!(f, "{s}"),
            Self::Died(b) | Self::ChildrenInYear(b) => f.write_str(yes_no(*b)),
            Self::PreviousChildrenInPartnership(r)
            | Self::PreviousChildrenInAnyPartnership(r)
            | Self::NumberOfChildrenInYear(r)
            | Self::ChildrenInPartnership(r) => write!(f, "{r}"),
            Self::Separation(SeparationOption::Yes) => f.write_str("YES"),
            Self::Separation(SeparationOption::No) => f.write_str("NO"),
            Self::Separation(SeparationOption::NotApplicable) => f.write_str("NA"),
            Self::NewPartnerAge(Some(r)) => write!(f, "{r}"),
            Self::NewPartnerAge(None) => f.write_str("na"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_know_their_dimension() {
        assert_eq!(NodeLabel::Age(3).dimension(), Dimension::Age);
        assert_eq!(
            NodeLabel::NewPartnerAge(None).dimension().column(),
            "NPA"
        );
    }

    #[test]
    fn display_values() {
        assert_eq!(NodeLabel::Died(true).to_string(), "YES");
        assert_eq!(NodeLabel::Separation(SeparationOption::NotApplicable).to_string(), "NA");
        assert_eq!(
            NodeLabel::ChildrenInPartnership(IntegerRange::open(3)).to_string(),
            "3+"
        );
        assert_eq!(NodeLabel::Sex(Sex::Female).to_string(), "F");
        assert_eq!(NodeLabel::Source(SourceType::Stat).to_string(), "STAT");
    }
}
