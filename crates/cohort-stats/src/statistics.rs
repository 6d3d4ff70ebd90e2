//! The statistics facade the simulation and the contingency tree query.
//!
//! [`PopulationStatistics`] owns every target table and dispatches each
//! [`StatsKey`] to the table its kind names. Keys whose labels fall outside
//! every bucket resolve to a zero count instead of an error, so callers can
//! query any age without pre-filtering.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDate;
use tracing::{info, trace, warn};

use cohort_types::{CompoundTimeUnit, IntegerRange, Sex};

use crate::determined::{Determined, MultipleDeterminedCount, SingleDeterminedCount};
use crate::input::{InputFile, input_files};
use crate::labeled::LabeledValueSet;
use crate::one_dimension::SelfCorrectingOneDimensionDistribution;
use crate::proportional::SelfCorrectingProportionalDistribution;
use crate::table::{DistributionTable, nearest_year};
use crate::two_dimension::SelfCorrectingTwoDimensionDistribution;
use crate::{StatsError, StatsKey, StatsKind};

/// Year of the default sex ratio used when no ratio file is supplied.
pub const DEFAULT_SEX_RATIO_YEAR: i32 = 1600;

/// Male proportion of births used when no ratio file is supplied.
pub const DEFAULT_MALE_PROPORTION: f64 = 0.5;

/// Input subdirectory names under the statistics input directory.
pub mod dirs {
    /// Male death rates by age.
    pub const MALE_DEATH: &str = "death_males";
    /// Female death rates by age.
    pub const FEMALE_DEATH: &str = "death_females";
    /// Birth rates by age and order.
    pub const ORDERED_BIRTH: &str = "ordered_birth";
    /// Maternity size proportions by age.
    pub const MULTIPLE_BIRTH: &str = "multiple_birth";
    /// Separation rates by children in partnership.
    pub const SEPARATION: &str = "separation";
    /// Partner age proportions by age.
    pub const PARTNERING: &str = "partnering";
    /// Male proportion of births by year.
    pub const SEX_RATIO: &str = "ratio_birth";
}

/// Fixed demographic constants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DemographicConstants {
    /// Minimum days between consecutive births to one mother.
    pub min_birth_spacing_days: i64,
    /// Largest share of a step's births to partnered mothers that may be
    /// fathered outside the partnership.
    pub max_infidelity_proportion: f64,
    /// Longest gestation in days.
    pub max_gestation_days: i64,
    /// Shortest gestation in days.
    pub min_gestation_days: i64,
}

impl Default for DemographicConstants {
    fn default() -> Self {
        Self {
            min_birth_spacing_days: 147,
            max_infidelity_proportion: 0.2,
            max_gestation_days: 280,
            min_gestation_days: 147,
        }
    }
}

/// Every target table, as loaded.
#[derive(Debug, Clone)]
pub struct StatisticsTables {
    /// Male death rates.
    pub male_death: DistributionTable<SelfCorrectingOneDimensionDistribution>,
    /// Female death rates.
    pub female_death: DistributionTable<SelfCorrectingOneDimensionDistribution>,
    /// Birth rates by age (rows) and order (columns).
    pub ordered_birth: DistributionTable<SelfCorrectingTwoDimensionDistribution>,
    /// Maternity size proportions by age.
    pub multiple_birth: DistributionTable<SelfCorrectingProportionalDistribution>,
    /// Separation rates by children in partnership.
    pub separation: DistributionTable<SelfCorrectingOneDimensionDistribution>,
    /// Partner age proportions by age.
    pub partnering: DistributionTable<SelfCorrectingProportionalDistribution>,
    /// Male proportion of births by year.
    pub sex_ratio_birth: BTreeMap<i32, f64>,
}

impl Default for StatisticsTables {
    fn default() -> Self {
        Self {
            male_death: DistributionTable::new(dirs::MALE_DEATH),
            female_death: DistributionTable::new(dirs::FEMALE_DEATH),
            ordered_birth: DistributionTable::new(dirs::ORDERED_BIRTH),
            multiple_birth: DistributionTable::new(dirs::MULTIPLE_BIRTH),
            separation: DistributionTable::new(dirs::SEPARATION),
            partnering: DistributionTable::new(dirs::PARTNERING),
            sex_ratio_birth: BTreeMap::from([(DEFAULT_SEX_RATIO_YEAR, DEFAULT_MALE_PROPORTION)]),
        }
    }
}

/// Options controlling how tables are loaded.
#[derive(Debug, Clone, Copy)]
pub struct LoadOptions {
    /// Allowed deviation of a proportional row sum from one.
    pub consistency_tolerance: f64,
    /// Demographic constants to attach.
    pub constants: DemographicConstants,
}

/// Target statistics with self-correcting lookups.
#[derive(Debug, Clone)]
pub struct PopulationStatistics {
    tables: StatisticsTables,
    constants: DemographicConstants,
}

impl PopulationStatistics {
    /// Wrap already-built tables.
    pub const fn new(tables: StatisticsTables, constants: DemographicConstants) -> Self {
        Self { tables, constants }
    }

    /// Load every table from the subdirectories of `dir`.
    ///
    /// Each rate and proportion directory must hold at least one file. The
    /// sex-ratio directory may be absent or empty (a default applies) but
    /// must not hold more than one file.
    pub fn load(dir: &Path, options: LoadOptions) -> Result<Self, StatsError> {
        let tolerance = options.consistency_tolerance;
        let mut tables = StatisticsTables::default();

        load_table(dir, &mut tables.male_death, InputFile::to_one_dimension)?;
        load_table(dir, &mut tables.female_death, InputFile::to_one_dimension)?;
        load_table(dir, &mut tables.ordered_birth, InputFile::to_two_dimension)?;
        load_table(dir, &mut tables.multiple_birth, |f| f.to_proportional(tolerance))?;
        load_table(dir, &mut tables.separation, InputFile::to_one_dimension)?;
        load_table(dir, &mut tables.partnering, |f| f.to_proportional(tolerance))?;

        let ratio_dir = dir.join(dirs::SEX_RATIO);
        if ratio_dir.is_dir() {
            let files = input_files(&ratio_dir)?;
            match files.as_slice() {
                [] => warn!(dir = %ratio_dir.display(), "No sex ratio file, using default"),
                [file] => {
                    let values = InputFile::read(file)?.yearly_values()?;
                    if !values.is_empty() {
                        tables.sex_ratio_birth = values;
                    }
                }
                _ => {
                    return Err(StatsError::AmbiguousInput {
                        dir: ratio_dir,
                        count: files.len(),
                    });
                }
            }
        }

        info!(dir = %dir.display(), "Loaded population statistics");
        Ok(Self::new(tables, options.constants))
    }

    /// Index extra years in every table so that consecutive years are at
    /// most `width` apart over `[start, end]`.
    pub fn fill_to_input_width(
        &mut self,
        start: NaiveDate,
        end: NaiveDate,
        width: CompoundTimeUnit,
    ) -> Result<(), StatsError> {
        let t = &mut self.tables;
        t.male_death.fill_to_input_width(start, end, width)?;
        t.female_death.fill_to_input_width(start, end, width)?;
        t.ordered_birth.fill_to_input_width(start, end, width)?;
        t.multiple_birth.fill_to_input_width(start, end, width)?;
        t.separation.fill_to_input_width(start, end, width)?;
        t.partnering.fill_to_input_width(start, end, width)?;
        Ok(())
    }

    /// The loaded tables.
    pub const fn tables(&self) -> &StatisticsTables {
        &self.tables
    }

    /// Demographic constants.
    pub const fn constants(&self) -> DemographicConstants {
        self.constants
    }

    // -----------------------------------------------------------------------
    // Determination
    // -----------------------------------------------------------------------

    /// Counts to apply for `key`, dispatched by the key's kind.
    pub fn determine_count(&self, key: &StatsKey) -> Result<Determined, StatsError> {
        let result = match key.kind() {
            StatsKind::Death { sex } => self
                .death_table(sex)
                .get(key.date())?
                .determine_count(key)
                .map(Determined::from),
            StatsKind::OrderedBirth => self
                .tables
                .ordered_birth
                .get(key.date())?
                .determine_count(key)
                .map(Determined::from),
            StatsKind::Separation => self
                .tables
                .separation
                .get(key.date())?
                .determine_count(key)
                .map(Determined::from),
            StatsKind::MultipleBirth => self
                .tables
                .multiple_birth
                .get(key.date())?
                .determine_count(key)
                .map(Determined::from),
            StatsKind::Partnering => self
                .tables
                .partnering
                .get(key.date())?
                .determine_count(key)
                .map(Determined::from),
        };

        match result {
            Err(StatsError::RangeNotCovered { value, year }) => {
                trace!(kind = %key.kind(), value, year, "Label not covered, zero count");
                Ok(zero_count(key))
            }
            other => other,
        }
    }

    /// Like [`Self::determine_count`] for rate tables.
    pub fn determine_single(&self, key: &StatsKey) -> Result<SingleDeterminedCount, StatsError> {
        self.determine_count(key)?.into_single()
    }

    /// Like [`Self::determine_count`] for proportional tables.
    pub fn determine_multiple(&self, key: &StatsKey) -> Result<MultipleDeterminedCount, StatsError> {
        self.determine_count(key)?.into_multiple()
    }

    /// Fold the fulfilled count of a determination back into the table it
    /// came from. The determination is consumed.
    pub fn return_achieved_count(&mut self, count: Determined) -> Result<(), StatsError> {
        let date = count.key().date();
        match (count.key().kind(), &count) {
            (StatsKind::Death { sex }, Determined::Single(c)) => {
                self.death_table_mut(sex).get_mut(date)?.return_achieved_count(c)
            }
            (StatsKind::OrderedBirth, Determined::Single(c)) => {
                self.tables.ordered_birth.get_mut(date)?.return_achieved_count(c)
            }
            (StatsKind::Separation, Determined::Single(c)) => {
                self.tables.separation.get_mut(date)?.return_achieved_count(c)
            }
            (StatsKind::MultipleBirth, Determined::Multiple(c)) => {
                self.tables.multiple_birth.get_mut(date)?.return_achieved_count(c)
            }
            (StatsKind::Partnering, Determined::Multiple(c)) => {
                self.tables.partnering.get_mut(date)?.return_achieved_count(c)
            }
            (kind, _) => Err(StatsError::CountShapeMismatch { kind }),
        }
    }

    // -----------------------------------------------------------------------
    // Labels and single values
    // -----------------------------------------------------------------------

    /// Children-in-partnership buckets of the separation table at `date`.
    pub fn separation_labels(&self, date: NaiveDate) -> Result<Vec<IntegerRange>, StatsError> {
        Ok(self.tables.separation.get(date)?.labels().copied().collect())
    }

    /// Birth order columns of the ordered birth table at `date`.
    pub fn birth_order_labels(&self, date: NaiveDate) -> Result<Vec<IntegerRange>, StatsError> {
        Ok(self.tables.ordered_birth.get(date)?.column_labels())
    }

    /// Maternity size columns for mothers aged `age` at `date`.
    pub fn multiple_birth_labels(
        &self,
        date: NaiveDate,
        age: i32,
    ) -> Result<Vec<IntegerRange>, StatsError> {
        Ok(self.tables.multiple_birth.get(date)?.column_labels(age))
    }

    /// Partner age columns for people aged `age` at `date`.
    pub fn partner_age_labels(
        &self,
        date: NaiveDate,
        age: i32,
    ) -> Result<Vec<IntegerRange>, StatsError> {
        Ok(self.tables.partnering.get(date)?.column_labels(age))
    }

    /// Proportion of births at `date` that are male.
    pub fn male_proportion_of_births(&self, date: NaiveDate) -> f64 {
        nearest_year(self.tables.sex_ratio_birth.keys().copied(), date)
            .and_then(|year| self.tables.sex_ratio_birth.get(&year).copied())
            .unwrap_or(DEFAULT_MALE_PROPORTION)
    }

    fn death_table(&self, sex: Sex) -> &DistributionTable<SelfCorrectingOneDimensionDistribution> {
        match sex {
            Sex::Male => &self.tables.male_death,
            Sex::Female => &self.tables.female_death,
        }
    }

    fn death_table_mut(
        &mut self,
        sex: Sex,
    ) -> &mut DistributionTable<SelfCorrectingOneDimensionDistribution> {
        match sex {
            Sex::Male => &mut self.tables.male_death,
            Sex::Female => &mut self.tables.female_death,
        }
    }
}

/// Zero determination of the right shape for `key`.
fn zero_count(key: &StatsKey) -> Determined {
    if key.kind().is_single() {
        Determined::Single(SingleDeterminedCount::new(key.clone(), 0, 0.0, 0.0))
    } else {
        Determined::Multiple(MultipleDeterminedCount::new(
            key.clone(),
            LabeledValueSet::default(),
            LabeledValueSet::default(),
            LabeledValueSet::default(),
        ))
    }
}

/// Read every file of the table's subdirectory into `table`.
fn load_table<D, F>(dir: &Path, table: &mut DistributionTable<D>, build: F) -> Result<(), StatsError>
where
    F: Fn(&InputFile) -> Result<D, StatsError>,
{
    let sub = dir.join(table.name());
    let files = if sub.is_dir() { input_files(&sub)? } else { Vec::new() };
    if files.is_empty() {
        return Err(StatsError::EmptyInput { dir: sub });
    }
    for path in &files {
        let file = InputFile::read(path)?;
        let year = file.metadata()?.year;
        table.insert(year, build(&file)?)?;
    }
    info!(table = table.name(), files = files.len(), "Loaded distribution table");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn date(y: i32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, 1, 1).unwrap()
    }

    fn stats() -> PopulationStatistics {
        let path = Path::new("inline.tsv");
        let one = |text: &str| InputFile::parse(path, text).unwrap().to_one_dimension().unwrap();
        let mut tables = StatisticsTables::default();
        tables
            .male_death
            .insert(1855, one("YEAR\t1855\nDATA\n0-50\t0.1\n51+\t0.3\n"))
            .unwrap();
        tables
            .separation
            .insert(1855, one("YEAR\t1855\nDATA\n0\t0\n1\t0.1\n2+\t0.2\n"))
            .unwrap();
        tables
            .partnering
            .insert(
                1855,
                InputFile::parse(path, "YEAR\t1855\nDATA\n\t15-29\t30+\n15+\t0.5\t0.5\n")
                    .unwrap()
                    .to_proportional(1e-6)
                    .unwrap(),
            )
            .unwrap();
        PopulationStatistics::new(tables, DemographicConstants::default())
    }

    fn death_key(age: i32) -> StatsKey {
        StatsKey::death(age, Sex::Male, 100.0, CompoundTimeUnit::years(1), date(1856))
    }

    #[test]
    fn dispatches_by_kind() {
        let s = stats();
        let c = s.determine_single(&death_key(60)).unwrap();
        assert_eq!(*c.determined(), 30);
        let p = s
            .determine_multiple(&StatsKey::partnering(
                20,
                10.0,
                CompoundTimeUnit::years(1),
                date(1855),
            ))
            .unwrap();
        assert_eq!(p.determined().sum(), 10);
    }

    #[test]
    fn uncovered_label_gives_zero_count() {
        let s = stats();
        let c = s.determine_single(&death_key(-5)).unwrap();
        assert_eq!(*c.determined(), 0);
        let p = s
            .determine_multiple(&StatsKey::partnering(
                3,
                10.0,
                CompoundTimeUnit::years(1),
                date(1855),
            ))
            .unwrap();
        assert!(p.determined().is_empty());
    }

    #[test]
    fn empty_table_is_an_error() {
        let s = stats();
        let key = StatsKey::death(30, Sex::Female, 5.0, CompoundTimeUnit::years(1), date(1855));
        assert!(matches!(
            s.determine_count(&key),
            Err(StatsError::NoDataAvailable { table: dirs::FEMALE_DEATH })
        ));
    }

    #[test]
    fn achieved_counts_feed_back() {
        let mut s = stats();
        let mut c = s.determine_single(&death_key(20)).unwrap();
        c.set_fulfilled_count(8);
        s.return_achieved_count(c.into()).unwrap();
        let next = s.determine_single(&death_key(20)).unwrap();
        assert_eq!(*next.determined(), 12);
    }

    #[test]
    fn sex_ratio_resolves_from_the_query_year() {
        let mut tables = StatisticsTables::default();
        tables.sex_ratio_birth = BTreeMap::from([(1860, 0.6), (1870, 0.4)]);
        let s = PopulationStatistics::new(tables, DemographicConstants::default());
        let mid = NaiveDate::from_ymd_opt(1865, 7, 1).unwrap();
        assert!((s.male_proportion_of_births(mid) - 0.6).abs() < f64::EPSILON);
        let late = NaiveDate::from_ymd_opt(1866, 2, 1).unwrap();
        assert!((s.male_proportion_of_births(late) - 0.4).abs() < f64::EPSILON);
    }

    #[test]
    fn shape_mismatch_is_rejected() {
        let mut s = stats();
        let mut wrong = SingleDeterminedCount::new(
            StatsKey::partnering(20, 1.0, CompoundTimeUnit::years(1), date(1855)),
            1,
            1.0,
            1.0,
        );
        wrong.set_fulfilled_count(1);
        assert!(matches!(
            s.return_achieved_count(wrong.into()),
            Err(StatsError::CountShapeMismatch { .. })
        ));
    }

    #[test]
    fn labels_and_sex_ratio() {
        let s = stats();
        assert_eq!(s.separation_labels(date(1900)).unwrap().len(), 3);
        assert_eq!(s.partner_age_labels(date(1900), 40).unwrap().len(), 2);
        assert!((s.male_proportion_of_births(date(1900)) - 0.5).abs() < f64::EPSILON);
        assert_eq!(s.constants().min_birth_spacing_days, 147);
        assert!((s.constants().max_infidelity_proportion - 0.2).abs() < f64::EPSILON);
    }
}
