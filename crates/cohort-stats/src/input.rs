//! Tab-separated statistics input files.
//!
//! A file opens with header lines (`YEAR`, `POPULATION`, `SOURCE`), then a
//! `DATA` marker, then the body. One-dimensional bodies are `label\tvalue`
//! rows; two-dimensional and proportional bodies start with a row of column
//! labels whose first cell is ignored. Sex-ratio files hold `year\tvalue`
//! rows. Blank lines and lines starting with `%` or `#` are skipped.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use cohort_types::IntegerRange;

use crate::StatsError;
use crate::labeled::LabeledValueSet;
use crate::one_dimension::SelfCorrectingOneDimensionDistribution;
use crate::proportional::SelfCorrectingProportionalDistribution;
use crate::table::TableMetadata;
use crate::two_dimension::SelfCorrectingTwoDimensionDistribution;

/// A parsed input file: its header and the tab-split body rows.
#[derive(Debug, Clone)]
pub struct InputFile {
    path: PathBuf,
    year: Option<i32>,
    source_population: String,
    source_organisation: String,
    rows: Vec<(usize, Vec<String>)>,
}

impl InputFile {
    /// Read and parse the file at `path`.
    pub fn read(path: &Path) -> Result<Self, StatsError> {
        let text = fs::read_to_string(path).map_err(|source| StatsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &text)
    }

    /// Parse `text`, attributing errors to `path`.
    pub fn parse(path: &Path, text: &str) -> Result<Self, StatsError> {
        let mut file = Self {
            path: path.to_path_buf(),
            year: None,
            source_population: String::new(),
            source_organisation: String::new(),
            rows: Vec::new(),
        };
        let mut in_data = false;

        for (index, line) in text.lines().enumerate() {
            let line_no = index.saturating_add(1);
            let trimmed = line.trim_end();
            if trimmed.trim().is_empty() || trimmed.starts_with('%') || trimmed.starts_with('#') {
                continue;
            }
            let cells: Vec<String> = trimmed
                .split('\t')
                .map(|c| String::from(c.trim()))
                .collect();

            if in_data {
                file.rows.push((line_no, cells));
                continue;
            }

            let field = cells.first().map_or("", String::as_str);
            let value = cells.get(1).map_or("", String::as_str);
            match field.to_ascii_uppercase().as_str() {
                "YEAR" => {
                    let year = value
                        .parse::<i32>()
                        .map_err(|_e| file.invalid(line_no, "YEAR is not an integer"))?;
                    file.year = Some(year);
                }
                "POPULATION" => file.source_population = String::from(value),
                "SOURCE" => file.source_organisation = String::from(value),
                "DATA" => in_data = true,
                _ => return Err(file.invalid(line_no, "unexpected header line")),
            }
        }

        if !in_data {
            return Err(file.invalid(0, "missing DATA line"));
        }
        Ok(file)
    }

    fn invalid(&self, line: usize, reason: &str) -> StatsError {
        StatsError::InvalidInput {
            path: self.path.clone(),
            line,
            reason: String::from(reason),
        }
    }

    /// Header metadata. The `YEAR` header is required.
    pub fn metadata(&self) -> Result<TableMetadata, StatsError> {
        let year = self.year.ok_or_else(|| self.invalid(0, "missing YEAR header"))?;
        Ok(TableMetadata {
            year,
            source_population: self.source_population.clone(),
            source_organisation: self.source_organisation.clone(),
        })
    }

    fn label(&self, line: usize, cell: &str) -> Result<IntegerRange, StatsError> {
        cell.parse()
            .map_err(|_e| self.invalid(line, "cell is not an integer range label"))
    }

    fn number(&self, line: usize, cell: &str) -> Result<f64, StatsError> {
        let value = cell
            .parse::<f64>()
            .map_err(|_e| self.invalid(line, "cell is not a number"))?;
        if !value.is_finite() || value < 0.0 {
            return Err(self.invalid(line, "value must be finite and non-negative"));
        }
        Ok(value)
    }

    /// Body as `label -> value`.
    pub fn one_dimension(&self) -> Result<BTreeMap<IntegerRange, f64>, StatsError> {
        let mut values = BTreeMap::new();
        for (line, cells) in &self.rows {
            let (Some(label), Some(value)) = (cells.first(), cells.get(1)) else {
                return Err(self.invalid(*line, "expected label and value"));
            };
            values.insert(self.label(*line, label)?, self.number(*line, value)?);
        }
        if values.is_empty() {
            return Err(self.invalid(0, "no data rows"));
        }
        Ok(values)
    }

    /// Body as `row label -> (column label -> value)`.
    pub fn two_dimension(
        &self,
    ) -> Result<BTreeMap<IntegerRange, LabeledValueSet<IntegerRange, f64>>, StatsError> {
        let mut rows = self.rows.iter();
        let Some((header_line, header)) = rows.next() else {
            return Err(self.invalid(0, "no column header row"));
        };
        let columns = header
            .iter()
            .skip(1)
            .map(|c| self.label(*header_line, c))
            .collect::<Result<Vec<_>, _>>()?;

        let mut table = BTreeMap::new();
        for (line, cells) in rows {
            let Some((row_label, values)) = cells.split_first() else {
                continue;
            };
            if values.len() != columns.len() {
                return Err(self.invalid(*line, "row width differs from column header"));
            }
            let mut row = BTreeMap::new();
            for (column, cell) in columns.iter().zip(values) {
                row.insert(*column, self.number(*line, cell)?);
            }
            table.insert(self.label(*line, row_label)?, LabeledValueSet::new(row));
        }
        if table.is_empty() {
            return Err(self.invalid(0, "no data rows"));
        }
        Ok(table)
    }

    /// Body as `year -> value`.
    pub fn yearly_values(&self) -> Result<BTreeMap<i32, f64>, StatsError> {
        let mut values = BTreeMap::new();
        for (line, cells) in &self.rows {
            let (Some(year), Some(value)) = (cells.first(), cells.get(1)) else {
                return Err(self.invalid(*line, "expected year and value"));
            };
            let year = year
                .parse::<i32>()
                .map_err(|_e| self.invalid(*line, "year is not an integer"))?;
            values.insert(year, self.number(*line, value)?);
        }
        Ok(values)
    }

    /// Build a one-dimensional distribution.
    pub fn to_one_dimension(&self) -> Result<SelfCorrectingOneDimensionDistribution, StatsError> {
        Ok(SelfCorrectingOneDimensionDistribution::new(
            self.metadata()?,
            self.one_dimension()?,
        ))
    }

    /// Build a two-dimensional distribution.
    pub fn to_two_dimension(&self) -> Result<SelfCorrectingTwoDimensionDistribution, StatsError> {
        Ok(SelfCorrectingTwoDimensionDistribution::new(
            self.metadata()?,
            self.two_dimension()?,
        ))
    }

    /// Build a proportional distribution, validating row sums.
    pub fn to_proportional(
        &self,
        tolerance: f64,
    ) -> Result<SelfCorrectingProportionalDistribution, StatsError> {
        SelfCorrectingProportionalDistribution::new(
            self.metadata()?,
            self.two_dimension()?,
            tolerance,
        )
    }
}

/// Regular, non-hidden files in `dir`, sorted by name.
pub fn input_files(dir: &Path) -> Result<Vec<PathBuf>, StatsError> {
    let io = |source| StatsError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(io)? {
        let path = entry.map_err(io)?.path();
        let hidden = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with('.'));
        if path.is_file() && !hidden {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
