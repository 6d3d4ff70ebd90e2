//! Flattened leaf rows for contingency table output.

use std::io::{self, Write};

use serde::Serialize;

use crate::TreeError;
use crate::label::{Dimension, SourceType};
use crate::node::ContingencyTree;

/// Output columns in tree order.
pub const COLUMNS: [Dimension; 12] = [
    Dimension::Source,
    Dimension::YearOfBirth,
    Dimension::Sex,
    Dimension::Age,
    Dimension::Died,
    Dimension::PreviousChildrenInPartnership,
    Dimension::PreviousChildrenInAnyPartnership,
    Dimension::ChildrenInYear,
    Dimension::NumberOfChildrenInYear,
    Dimension::ChildrenInPartnership,
    Dimension::Separation,
    Dimension::NewPartnerAge,
];

/// One variable of a row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowCell {
    /// Column name.
    pub variable: &'static str,
    /// Rendered label.
    pub value: String,
}

/// A root-to-leaf path and the count at the leaf.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContingencyRow {
    /// Labels along the path, root first.
    pub cells: Vec<RowCell>,
    /// Count at the leaf.
    pub count: f64,
}

impl ContingencyRow {
    /// Rendered value of `dimension`, if the path reaches it.
    pub fn value(&self, dimension: Dimension) -> Option<&str> {
        self.cells
            .iter()
            .find(|c| c.variable == dimension.column())
            .map(|c| c.value.as_str())
    }
}

impl ContingencyTree {
    /// One row per leaf below either source root.
    pub fn rows(&self) -> Result<Vec<ContingencyRow>, TreeError> {
        let mut rows = Vec::new();
        for leaf in self.leaves() {
            let node = self.node(leaf)?;
            if node.parent().is_none() {
                continue;
            }
            let cells = self
                .path(leaf)?
                .into_iter()
                .map(|label| RowCell {
                    variable: label.dimension().column(),
                    value: label.to_string(),
                })
                .collect();
            rows.push(ContingencyRow {
                cells,
                count: node.count(),
            });
        }
        Ok(rows)
    }

    /// Rows of one branch.
    pub fn rows_for(&self, source: SourceType) -> Result<Vec<ContingencyRow>, TreeError> {
        let name = if source == SourceType::Sim { "SIM" } else { "STAT" };
        Ok(self
            .rows()?
            .into_iter()
            .filter(|r| r.value(Dimension::Source) == Some(name))
            .collect())
    }
}

/// Write `rows` as tab-separated text with a header. Dimensions a path
/// does not reach are left empty.
pub fn write_tsv<W: Write>(rows: &[ContingencyRow], mut out: W) -> io::Result<()> {
    let header: Vec<&str> = COLUMNS.iter().map(|d| d.column()).collect();
    writeln!(out, "{}\tcount", header.join("\t"))?;
    for row in rows {
        let cells: Vec<&str> = COLUMNS.iter().map(|d| row.value(*d).unwrap_or("")).collect();
        writeln!(out, "{}\t{}", cells.join("\t"), row.count)?;
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use cohort_types::Sex;

    use super::*;
    use crate::label::NodeLabel;

    fn small_tree() -> ContingencyTree {
        let mut tree = ContingencyTree::new(1850, 1851);
        let root = tree.root(SourceType::Sim);
        let (yob, _) = tree.get_or_create_child(root, NodeLabel::YearOfBirth(1820)).unwrap();
        let (sex, _) = tree.get_or_create_child(yob, NodeLabel::Sex(Sex::Male)).unwrap();
        let (age, _) = tree.get_or_create_child(sex, NodeLabel::Age(30)).unwrap();
        let (died, _) = tree.get_or_create_child(age, NodeLabel::Died(false)).unwrap();
        tree.add_count(died, 4.0).unwrap();
        tree
    }

    #[test]
    fn rows_skip_empty_roots() {
        let rows = small_tree().rows().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows.first().unwrap().value(Dimension::Age), Some("30"));
        assert_eq!(rows.first().unwrap().value(Dimension::Died), Some("NO"));
        assert_eq!(rows.first().unwrap().value(Dimension::Separation), None);
        assert!(small_tree().rows_for(SourceType::Stat).unwrap().is_empty());
    }

    #[test]
    fn tsv_pads_short_paths() {
        let rows = small_tree().rows().unwrap();
        let mut out = Vec::new();
        write_tsv(&rows, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert!(lines.next().unwrap().starts_with("Source\tYOB\tSex\tAge\tDied\tPNCIP"));
        let row = lines.next().unwrap();
        assert!(row.starts_with("SIM\t1820\tM\t30\tNO\t\t"));
        assert!(row.ends_with("\t4"));
    }

    #[test]
    fn rows_serialise_as_cells_and_count() {
        let rows = small_tree().rows().unwrap();
        let json = serde_json::to_value(&rows).unwrap();
        let row = &json[0];
        assert_eq!(row["count"], 4.0);
        assert_eq!(row["cells"][0]["variable"], "Source");
        assert_eq!(row["cells"][0]["value"], "SIM");
        assert_eq!(row["cells"][3]["variable"], "Age");
        assert_eq!(row["cells"][3]["value"], "30");
        assert_eq!(row["cells"].as_array().unwrap().len(), 5);
    }
}
